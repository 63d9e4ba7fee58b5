use core::fmt;

/// Pipeline phase an error belongs to. Every diagnostic printed by the CLI
/// carries the short code of its phase so failures are greppable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lex,
    Parse,
    Codegen,
    Opt,
    Vm,
}

impl Phase {
    pub fn code(self) -> &'static str {
        match self {
            Phase::Lex => "E-LEX",
            Phase::Parse => "E-PARSE",
            Phase::Codegen => "E-CODEGEN",
            Phase::Opt => "E-OPT",
            Phase::Vm => "E-VM",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Lex => "lexer",
            Phase::Parse => "parser",
            Phase::Codegen => "codegen",
            Phase::Opt => "optimizer",
            Phase::Vm => "runtime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self {
            start,
            end,
            line,
            col,
        }
    }

    pub fn merge(self, other: Span) -> Span {
        let (line, col) = if self.start <= other.start {
            (self.line, self.col)
        } else {
            (other.line, other.col)
        };

        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            col,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(phase: Phase, message: impl Into<String>, span: Span) -> Self {
        Self {
            phase,
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error at {}:{}: {}",
            self.phase.label(),
            self.span.line,
            self.span.col,
            self.message
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticBag {
    items: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, phase: Phase, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::new(phase, message, span));
    }

    pub fn extend(&mut self, other: DiagnosticBag) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
