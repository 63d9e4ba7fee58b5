//! Syntax tree for tarn programs.
//!
//! Nodes are plain tagged enums walked with exhaustive `match`; there is no
//! visitor layer. The tree is built by the parser, read by the optimizer and
//! the bytecode compiler, and can be printed back to source with
//! [`Program::pretty`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i32),
    Str(String),
    Ident(String),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    ArrayLit(Vec<Expr>),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    EqEq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::EqEq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::AndAnd => "&&",
            BinaryOp::OrOr => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `let x = e;` and `x = e;` build the same node: the first write to a
    /// name defines its slot.
    Assign {
        name: String,
        value: Expr,
    },
    ArrayAssign {
        target: Expr,
        index: Expr,
        value: Expr,
    },
    Expr(Expr),
    Print(Expr),
    If {
        cond: Expr,
        body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Block(Vec<Stmt>),
}

impl Stmt {
    /// True for statements after which control never falls through to the
    /// next statement in the same list.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Stmt::Break | Stmt::Continue | Stmt::Return(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Function(FnDecl),
    Stmt(Stmt),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    /// Render the program back to parseable source. Binary and unary
    /// expressions are fully parenthesized, so reparsing the output yields a
    /// structurally identical tree.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                Item::Function(func) => pretty_fn(func, &mut out),
                Item::Stmt(stmt) => pretty_stmt(stmt, 0, &mut out),
            }
        }
        out
    }
}

fn pretty_fn(func: &FnDecl, out: &mut String) {
    out.push_str(&format!("fn {}({}) {{\n", func.name, func.params.join(", ")));
    for stmt in &func.body {
        pretty_stmt(stmt, 2, out);
    }
    out.push_str("}\n");
}

fn pretty_stmt(stmt: &Stmt, indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    match stmt {
        Stmt::Assign { name, value } => {
            out.push_str(&format!("{pad}{name} = {};\n", pretty_expr(value)));
        }
        Stmt::ArrayAssign {
            target,
            index,
            value,
        } => {
            out.push_str(&format!(
                "{pad}{}[{}] = {};\n",
                pretty_expr(target),
                pretty_expr(index),
                pretty_expr(value)
            ));
        }
        Stmt::Expr(expr) => {
            out.push_str(&format!("{pad}{};\n", pretty_expr(expr)));
        }
        Stmt::Print(expr) => {
            out.push_str(&format!("{pad}print({});\n", pretty_expr(expr)));
        }
        Stmt::If { cond, body } => {
            out.push_str(&format!("{pad}if ({}) {{\n", pretty_expr(cond)));
            for s in body {
                pretty_stmt(s, indent + 2, out);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Stmt::While { cond, body } => {
            out.push_str(&format!("{pad}while ({}) {{\n", pretty_expr(cond)));
            for s in body {
                pretty_stmt(s, indent + 2, out);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            out.push_str(&format!("{pad}for ("));
            if let Some(init) = init {
                pretty_clause(init, out);
            }
            out.push_str("; ");
            if let Some(cond) = cond {
                out.push_str(&pretty_expr(cond));
            }
            out.push_str("; ");
            if let Some(step) = step {
                pretty_clause(step, out);
            }
            out.push_str(") {\n");
            for s in body {
                pretty_stmt(s, indent + 2, out);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Stmt::Break => out.push_str(&format!("{pad}break;\n")),
        Stmt::Continue => out.push_str(&format!("{pad}continue;\n")),
        Stmt::Return(expr) => {
            if let Some(expr) = expr {
                out.push_str(&format!("{pad}return {};\n", pretty_expr(expr)));
            } else {
                out.push_str(&format!("{pad}return;\n"));
            }
        }
        Stmt::Block(stmts) => {
            out.push_str(&format!("{pad}{{\n"));
            for s in stmts {
                pretty_stmt(s, indent + 2, out);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
    }
}

/// `for` header clauses print without the trailing `;`.
fn pretty_clause(stmt: &Stmt, out: &mut String) {
    match stmt {
        Stmt::Assign { name, value } => {
            out.push_str(&format!("{name} = {}", pretty_expr(value)));
        }
        Stmt::Expr(expr) => out.push_str(&pretty_expr(expr)),
        other => {
            // The parser never puts anything else in a for header.
            let mut line = String::new();
            pretty_stmt(other, 0, &mut line);
            out.push_str(line.trim_end_matches(['\n', ';']));
        }
    }
}

fn pretty_expr(expr: &Expr) -> String {
    match expr {
        Expr::Number(v) => v.to_string(),
        Expr::Str(s) => format!(
            "\"{}\"",
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n")
                .replace('\t', "\\t")
                .replace('\r', "\\r")
        ),
        Expr::Ident(name) => name.clone(),
        Expr::Binary { left, op, right } => format!(
            "({} {} {})",
            pretty_expr(left),
            op.symbol(),
            pretty_expr(right)
        ),
        Expr::Unary { op, expr } => format!("({}{})", op.symbol(), pretty_expr(expr)),
        Expr::Call { name, args } => {
            let args = args.iter().map(pretty_expr).collect::<Vec<_>>().join(", ");
            format!("{name}({args})")
        }
        Expr::ArrayLit(elements) => {
            let elements = elements
                .iter()
                .map(pretty_expr)
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{elements}]")
        }
        Expr::Index { target, index } => {
            format!("{}[{}]", pretty_expr(target), pretty_expr(index))
        }
    }
}
