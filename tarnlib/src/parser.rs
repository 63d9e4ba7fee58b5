use crate::ast::{BinaryOp, Expr, FnDecl, Item, Program, Stmt, UnaryOp};
use crate::diagnostic::{DiagnosticBag, Phase};
use crate::lexer::lex;
use crate::token::{Token, TokenKind};

/// Recursive-descent parser: statement dispatch on the leading token,
/// precedence climbing for expressions. Parse errors are fatal; the first
/// diagnostic stops the parse.
#[derive(Debug, Clone)]
pub struct Parser {
    tokens: Vec<Token>,
    idx: usize,
    diagnostics: DiagnosticBag,
}

impl Parser {
    pub fn parse_source(source: &str) -> (Program, DiagnosticBag) {
        let (tokens, diagnostics) = lex(source);
        if !diagnostics.is_empty() {
            return (Program::default(), diagnostics);
        }
        Self::parse_tokens(tokens)
    }

    /// Parse an already-lexed token stream (must end in `Eof`).
    pub fn parse_tokens(tokens: Vec<Token>) -> (Program, DiagnosticBag) {
        let mut parser = Parser {
            tokens,
            idx: 0,
            diagnostics: DiagnosticBag::new(),
        };
        let program = parser.parse_program();
        (program, parser.diagnostics)
    }

    fn parse_program(&mut self) -> Program {
        let mut items = Vec::new();

        while !self.at(TokenKind::Eof) {
            let item = if self.at(TokenKind::KwFn) {
                self.parse_function().map(Item::Function)
            } else {
                self.parse_stmt().map(Item::Stmt)
            };
            match item {
                Some(item) => items.push(item),
                None => break,
            }
        }

        Program { items }
    }

    fn parse_function(&mut self) -> Option<FnDecl> {
        self.expect(TokenKind::KwFn, "Expected `fn`")?;
        let name = self.expect_ident("Expected function name after `fn`")?;
        self.expect(TokenKind::LParen, "Expected `(` after function name")?;
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let param = self.expect_ident("Expected parameter name")?;
                params.push(param.lexeme);
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expected `)` after parameters")?;

        let body = self.parse_braced_body("Expected `{` before function body")?;
        Some(FnDecl {
            name: name.lexeme,
            params,
            body,
        })
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        if self.at(TokenKind::KwLet) {
            let stmt = self.parse_let()?;
            return Some(stmt);
        }

        if self.at(TokenKind::KwIf) {
            self.bump();
            self.expect(TokenKind::LParen, "Expected `(` after `if`")?;
            let cond = self.parse_expr()?;
            self.expect(TokenKind::RParen, "Expected `)` after if condition")?;
            let body = self.parse_braced_body("Expected `{` before if body")?;
            if self.at(TokenKind::KwElse) {
                self.error_here("`else` is not supported");
                return None;
            }
            return Some(Stmt::If { cond, body });
        }

        if self.at(TokenKind::KwWhile) {
            self.bump();
            self.expect(TokenKind::LParen, "Expected `(` after `while`")?;
            let cond = self.parse_expr()?;
            self.expect(TokenKind::RParen, "Expected `)` after while condition")?;
            let body = self.parse_braced_body("Expected `{` before while body")?;
            return Some(Stmt::While { cond, body });
        }

        if self.at(TokenKind::KwFor) {
            return self.parse_for();
        }

        if self.at(TokenKind::KwBreak) {
            self.bump();
            self.expect(TokenKind::Semi, "Expected `;` after `break`")?;
            return Some(Stmt::Break);
        }

        if self.at(TokenKind::KwContinue) {
            self.bump();
            self.expect(TokenKind::Semi, "Expected `;` after `continue`")?;
            return Some(Stmt::Continue);
        }

        if self.at(TokenKind::KwReturn) {
            self.bump();
            if self.at(TokenKind::Semi) {
                self.bump();
                return Some(Stmt::Return(None));
            }
            let expr = self.parse_expr()?;
            self.expect(TokenKind::Semi, "Expected `;` after return statement")?;
            return Some(Stmt::Return(Some(expr)));
        }

        if self.at(TokenKind::KwPrint) {
            self.bump();
            self.expect(TokenKind::LParen, "Expected `(` after `print`")?;
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RParen, "Expected `)` after print argument")?;
            self.expect(TokenKind::Semi, "Expected `;` after print statement")?;
            return Some(Stmt::Print(expr));
        }

        if self.at(TokenKind::LBrace) {
            let body = self.parse_braced_body("Expected `{` to start block")?;
            return Some(Stmt::Block(body));
        }

        // Expression statement or assignment; the parsed expression decides
        // which assignment targets are legal.
        let expr = self.parse_expr()?;
        if self.at(TokenKind::Assign) {
            self.bump();
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi, "Expected `;` after assignment")?;
            return match expr {
                Expr::Ident(name) => Some(Stmt::Assign { name, value }),
                Expr::Index { target, index } => Some(Stmt::ArrayAssign {
                    target: *target,
                    index: *index,
                    value,
                }),
                _ => {
                    self.error_here("Invalid assignment target");
                    None
                }
            };
        }
        self.expect(TokenKind::Semi, "Expected `;` after expression statement")?;
        Some(Stmt::Expr(expr))
    }

    fn parse_let(&mut self) -> Option<Stmt> {
        self.expect(TokenKind::KwLet, "Expected `let`")?;
        let name = self.expect_ident("Expected variable name after `let`")?;
        self.expect(TokenKind::Assign, "Expected `=` after variable name")?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semi, "Expected `;` after let declaration")?;
        Some(Stmt::Assign {
            name: name.lexeme,
            value,
        })
    }

    fn parse_for(&mut self) -> Option<Stmt> {
        self.expect(TokenKind::KwFor, "Expected `for`")?;
        self.expect(TokenKind::LParen, "Expected `(` after `for`")?;

        let init = if self.at(TokenKind::Semi) {
            self.bump();
            None
        } else if self.at(TokenKind::KwLet) {
            Some(Box::new(self.parse_let()?))
        } else if self.at(TokenKind::Ident) && self.peek_kind(1) == TokenKind::Assign {
            let name = self.bump().lexeme;
            self.bump();
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi, "Expected `;` after for initializer")?;
            Some(Box::new(Stmt::Assign { name, value }))
        } else {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::Semi, "Expected `;` after for initializer")?;
            Some(Box::new(Stmt::Expr(expr)))
        };

        let cond = if self.at(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semi, "Expected `;` after for condition")?;

        let step = if self.at(TokenKind::RParen) {
            None
        } else if self.at(TokenKind::Ident) && self.peek_kind(1) == TokenKind::Assign {
            let name = self.bump().lexeme;
            self.bump();
            let value = self.parse_expr()?;
            Some(Box::new(Stmt::Assign { name, value }))
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expr()?)))
        };
        self.expect(TokenKind::RParen, "Expected `)` after for clauses")?;

        let body = self.parse_braced_body("Expected `{` to start for body")?;
        Some(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_braced_body(&mut self, open_err: &str) -> Option<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, open_err)?;
        let mut body = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace, "Expected `}` after block")?;
        Some(body)
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Option<Expr> {
        let mut expr = self.parse_logical_and()?;
        while self.at(TokenKind::OrOr) {
            self.bump();
            let rhs = self.parse_logical_and()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::OrOr,
                right: Box::new(rhs),
            };
        }
        Some(expr)
    }

    fn parse_logical_and(&mut self) -> Option<Expr> {
        let mut expr = self.parse_equality()?;
        while self.at(TokenKind::AndAnd) {
            self.bump();
            let rhs = self.parse_equality()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::AndAnd,
                right: Box::new(rhs),
            };
        }
        Some(expr)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = if self.at(TokenKind::EqEq) {
                Some(BinaryOp::EqEq)
            } else if self.at(TokenKind::Neq) {
                Some(BinaryOp::Neq)
            } else {
                None
            };
            let Some(op) = op else { break };
            self.bump();
            let rhs = self.parse_comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(rhs),
            };
        }
        Some(expr)
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => Some(BinaryOp::Lt),
                TokenKind::Lte => Some(BinaryOp::Lte),
                TokenKind::Gt => Some(BinaryOp::Gt),
                TokenKind::Gte => Some(BinaryOp::Gte),
                _ => None,
            };
            let Some(op) = op else { break };
            self.bump();
            let rhs = self.parse_term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(rhs),
            };
        }
        Some(expr)
    }

    fn parse_term(&mut self) -> Option<Expr> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = if self.at(TokenKind::Plus) {
                Some(BinaryOp::Add)
            } else if self.at(TokenKind::Minus) {
                Some(BinaryOp::Sub)
            } else {
                None
            };
            let Some(op) = op else { break };
            self.bump();
            let rhs = self.parse_factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(rhs),
            };
        }
        Some(expr)
    }

    fn parse_factor(&mut self) -> Option<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => Some(BinaryOp::Mul),
                TokenKind::Slash => Some(BinaryOp::Div),
                TokenKind::Percent => Some(BinaryOp::Mod),
                _ => None,
            };
            let Some(op) = op else { break };
            self.bump();
            let rhs = self.parse_unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(rhs),
            };
        }
        Some(expr)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if self.at(TokenKind::Minus) {
            self.bump();
            let expr = self.parse_unary()?;
            return Some(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        if self.at(TokenKind::Bang) {
            self.bump();
            let expr = self.parse_unary()?;
            return Some(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        let expr = self.parse_primary()?;
        self.parse_postfix(expr)
    }

    /// Postfix `[index]` binds tighter than unary, so `-x[0]` is `-(x[0])`.
    fn parse_postfix(&mut self, mut expr: Expr) -> Option<Expr> {
        while self.at(TokenKind::LBracket) {
            self.bump();
            let index = self.parse_expr()?;
            self.expect(TokenKind::RBracket, "Expected `]` after index")?;
            expr = Expr::Index {
                target: Box::new(expr),
                index: Box::new(index),
            };
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        if self.at(TokenKind::Number) {
            let tok = self.bump();
            let Ok(value) = tok.lexeme.parse::<i32>() else {
                self.diagnostics.error(
                    Phase::Parse,
                    format!("Integer literal `{}` out of range", tok.lexeme),
                    tok.span,
                );
                return None;
            };
            return Some(Expr::Number(value));
        }
        if self.at(TokenKind::Str) {
            let tok = self.bump();
            return Some(Expr::Str(tok.lexeme));
        }
        if self.at(TokenKind::LBracket) {
            return self.parse_array_literal();
        }
        if self.at(TokenKind::Ident) {
            let name = self.bump().lexeme;
            if self.at(TokenKind::LParen) {
                self.bump();
                let args = self.parse_call_args()?;
                return Some(Expr::Call { name, args });
            }
            return Some(Expr::Ident(name));
        }
        if self.at(TokenKind::LParen) {
            self.bump();
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RParen, "Expected `)` after grouped expression")?;
            return Some(expr);
        }

        self.error_here("Expected expression");
        None
    }

    fn parse_array_literal(&mut self) -> Option<Expr> {
        self.expect(TokenKind::LBracket, "Expected `[`")?;
        let mut elements = Vec::new();
        if !self.at(TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expr()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                    if self.at(TokenKind::RBracket) {
                        self.error_here("Trailing comma is not allowed in array literal");
                        return None;
                    }
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBracket, "Expected `]` after array elements")?;
        Some(Expr::ArrayLit(elements))
    }

    fn parse_call_args(&mut self) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                    if self.at(TokenKind::RParen) {
                        self.error_here("Trailing comma is not allowed in call arguments");
                        return None;
                    }
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expected `)` after call arguments")?;
        Some(args)
    }

    fn expect_ident(&mut self, message: &str) -> Option<Token> {
        if self.at(TokenKind::Ident) {
            return Some(self.bump());
        }
        self.error_here(message);
        None
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Option<Token> {
        if self.at(kind) {
            return Some(self.bump());
        }
        self.error_here(message);
        None
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.idx.min(last)]
    }

    fn peek_kind(&self, n: usize) -> TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens[(self.idx + n).min(last)].kind
    }

    fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if self.idx < self.tokens.len() {
            self.idx += 1;
        }
        token
    }

    fn token_label(token: &Token) -> String {
        if token.kind == TokenKind::Eof {
            return "EOF".to_string();
        }
        if !token.lexeme.is_empty() {
            return format!("`{}`", token.lexeme);
        }
        format!("{:?}", token.kind)
    }

    fn error_here(&mut self, message: &str) {
        let found = Self::token_label(self.current());
        self.diagnostics.error(
            Phase::Parse,
            format!("{message}; found {found}"),
            self.current().span,
        );
    }
}

/// Parse helper for one-shot callers: either a program or the diagnostics.
pub fn parse(source: &str) -> Result<Program, DiagnosticBag> {
    let (program, diags) = Parser::parse_source(source);
    if diags.is_empty() {
        Ok(program)
    } else {
        Err(diags)
    }
}
