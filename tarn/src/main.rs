use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use tarnlib::bytecode::{Compiler, Value};
use tarnlib::diagnostic::DiagnosticBag;
use tarnlib::lexer::lex;
use tarnlib::optimizer::Optimizer;
use tarnlib::parser::Parser;
use tarnlib::vm::{Profiler, StdIoHost, Vm, VmConfig};

struct RunnerConfig {
    input_file: Option<String>,
    optimize: bool,
    profile: bool,
    verbose: bool,
    dump_bytecode: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode, String> {
    let config = parse_args(env::args().skip(1))?;
    match &config.input_file {
        Some(path) => run_file(path, &config),
        None => run_shell(),
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<RunnerConfig, String> {
    let mut config = RunnerConfig {
        input_file: None,
        optimize: true,
        profile: false,
        verbose: false,
        dump_bytecode: false,
    };
    for arg in args {
        match arg.as_str() {
            "--no-opt" => config.optimize = false,
            "--profile" => config.profile = true,
            "--verbose" => config.verbose = true,
            "--dump" => config.dump_bytecode = true,
            flag if flag.starts_with('-') => {
                return Err(format!(
                    "Unknown flag: {flag}\nUsage: tarn [--no-opt] [--profile] [--verbose] [--dump] [file.tn]"
                ));
            }
            path => {
                if config.input_file.is_some() {
                    return Err("Usage: tarn [--no-opt] [--profile] [--verbose] [--dump] [file.tn]".to_string());
                }
                config.input_file = Some(path.to_string());
            }
        }
    }
    Ok(config)
}

fn vm_config() -> Result<VmConfig, String> {
    let mut config = VmConfig::default();
    if let Ok(v) = env::var("TARN_MAX_CALL_DEPTH") {
        config.max_call_depth = v
            .parse::<usize>()
            .map_err(|_| "TARN_MAX_CALL_DEPTH must be a positive integer".to_string())?;
    }
    Ok(config)
}

fn run_file(path: &str, config: &RunnerConfig) -> Result<ExitCode, String> {
    if config.verbose {
        println!("tarn v{}", env!("CARGO_PKG_VERSION"));
        println!("Input file: {path}");
        println!(
            "Optimization: {}",
            if config.optimize { "enabled" } else { "disabled" }
        );
        println!(
            "Profiling: {}\n",
            if config.profile { "enabled" } else { "disabled" }
        );
    }

    if config.verbose {
        println!("[1/5] Reading source file...");
    }
    let source = fs::read_to_string(path).map_err(|e| format!("Cannot open file `{path}`: {e}"))?;

    if config.verbose {
        println!("[2/5] Lexical analysis...");
    }
    let (tokens, lex_diags) = lex(&source);
    if !lex_diags.is_empty() {
        print_diags(&lex_diags);
        return Ok(ExitCode::from(1));
    }
    if config.verbose {
        println!("      Generated {} tokens", tokens.len());
    }

    if config.verbose {
        println!("[3/5] Parsing...");
    }
    let (mut program, parse_diags) = Parser::parse_tokens(tokens);
    if !parse_diags.is_empty() {
        print_diags(&parse_diags);
        return Ok(ExitCode::from(1));
    }
    if config.verbose {
        println!("      AST with {} top-level items", program.items.len());
    }

    if config.optimize {
        if config.verbose {
            println!("[4/5] Optimizing...");
        }
        let stats = Optimizer::new().run(&mut program);
        if config.verbose {
            println!("      Constants folded: {}", stats.constants_folded);
            println!("      Dead code removed: {}", stats.dead_code_removed);
        }
    } else if config.verbose {
        println!("[4/5] Skipping optimization");
    }

    if config.verbose {
        println!("[5/5] Generating bytecode...");
    }
    let bytecode = match Compiler::new().compile(&program) {
        Ok(b) => b,
        Err(diags) => {
            print_diags(&diags);
            return Ok(ExitCode::from(1));
        }
    };
    if config.verbose {
        println!("      Generated {} instructions", bytecode.code.len());
        println!("      Constants: {}", bytecode.constants.len());
        println!("      Functions: {}", bytecode.functions.len());
    }

    if config.dump_bytecode {
        println!();
        print!("{}", bytecode.disassemble());
        println!();
    }

    if config.verbose {
        println!("\n--- Execution ---");
    }

    let mut vm = Vm::with_config(vm_config()?);
    let mut host = StdIoHost;
    let mut profiler = Profiler::new();

    let result = if config.profile {
        profiler.start_timing();
        let result = vm.execute_profiled(&bytecode, &mut host, &mut profiler);
        profiler.stop_timing();
        result
    } else {
        vm.execute(&bytecode, &mut host)
    };

    match result {
        Ok(value) => {
            if config.verbose {
                println!("\n--- Result: {} ---", value.render());
            }
            if config.profile {
                println!();
                print!("{}", profiler.report());
            }
            Ok(ExitCode::from(0))
        }
        Err(e) => {
            eprintln!("[{}] runtime error: {e}", e.kind.code());
            Ok(ExitCode::from(1))
        }
    }
}

fn run_shell() -> Result<ExitCode, String> {
    println!("tarn shell v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' to quit.");

    let mut compiler = Compiler::new();
    let mut vm = Vm::with_config(vm_config()?);
    let mut host = StdIoHost;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().map_err(|e| e.to_string())?;

        let Some(line) = lines.next() else { break };
        let line = line.map_err(|e| e.to_string())?;
        if line == "exit" {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let fragment = match compiler.feed_fragment(&line) {
            Ok(fragment) => fragment,
            Err(diags) => {
                print_diags(&diags);
                continue;
            }
        };

        match vm.execute_incremental(&fragment, &mut host) {
            Ok(Value::Void) => {}
            Ok(Value::Str(s)) => println!("{s:?}"),
            Ok(value) => println!("{}", value.render()),
            Err(e) => eprintln!("[{}] runtime error: {e}", e.kind.code()),
        }
    }

    Ok(ExitCode::from(0))
}

fn print_diags(diags: &DiagnosticBag) {
    for d in diags.as_slice() {
        eprintln!("[{}] {d}", d.phase.code());
    }
}
