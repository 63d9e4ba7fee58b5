mod common;

use common::{assert_has_diag, parse_err, parse_ok};
use tarnlib::ast::{BinaryOp, Expr, Item, Stmt, UnaryOp};
use tarnlib::parser::Parser;

fn first_stmt(src: &str) -> Stmt {
    let program = parse_ok(src);
    let Some(Item::Stmt(stmt)) = program.items.into_iter().next() else {
        panic!("expected a statement item");
    };
    stmt
}

fn stmt_expr(src: &str) -> Expr {
    match first_stmt(src) {
        Stmt::Expr(expr) => expr,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

#[test]
fn parses_let_as_assignment_node() {
    let stmt = first_stmt("let x = 5;");
    assert_eq!(
        stmt,
        Stmt::Assign {
            name: "x".to_string(),
            value: Expr::Number(5),
        }
    );
}

#[test]
fn parses_plain_assignment_to_same_node() {
    assert_eq!(first_stmt("x = 5;"), first_stmt("let x = 5;"));
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expr = stmt_expr("2 + 3 * 4;");
    assert_eq!(
        expr,
        Expr::Binary {
            left: Box::new(Expr::Number(2)),
            op: BinaryOp::Add,
            right: Box::new(Expr::Binary {
                left: Box::new(Expr::Number(3)),
                op: BinaryOp::Mul,
                right: Box::new(Expr::Number(4)),
            }),
        }
    );
}

#[test]
fn parentheses_override_precedence() {
    let expr = stmt_expr("(2 + 3) * 4;");
    assert_eq!(
        expr,
        Expr::Binary {
            left: Box::new(Expr::Binary {
                left: Box::new(Expr::Number(2)),
                op: BinaryOp::Add,
                right: Box::new(Expr::Number(3)),
            }),
            op: BinaryOp::Mul,
            right: Box::new(Expr::Number(4)),
        }
    );
}

#[test]
fn comparison_binds_tighter_than_equality() {
    let expr = stmt_expr("a < b == c < d;");
    let Expr::Binary { op, left, right } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::EqEq);
    assert!(matches!(
        *left,
        Expr::Binary {
            op: BinaryOp::Lt,
            ..
        }
    ));
    assert!(matches!(
        *right,
        Expr::Binary {
            op: BinaryOp::Lt,
            ..
        }
    ));
}

#[test]
fn logical_or_is_loosest() {
    let expr = stmt_expr("a && b || c && d;");
    let Expr::Binary { op, .. } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::OrOr);
}

#[test]
fn binary_operators_are_left_associative() {
    let expr = stmt_expr("10 - 4 - 3;");
    assert_eq!(
        expr,
        Expr::Binary {
            left: Box::new(Expr::Binary {
                left: Box::new(Expr::Number(10)),
                op: BinaryOp::Sub,
                right: Box::new(Expr::Number(4)),
            }),
            op: BinaryOp::Sub,
            right: Box::new(Expr::Number(3)),
        }
    );
}

#[test]
fn postfix_index_binds_tighter_than_unary_minus() {
    let expr = stmt_expr("-x[0];");
    assert_eq!(
        expr,
        Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(Expr::Index {
                target: Box::new(Expr::Ident("x".to_string())),
                index: Box::new(Expr::Number(0)),
            }),
        }
    );
}

#[test]
fn index_chains_nest_left_to_right() {
    let expr = stmt_expr("m[1][2];");
    assert_eq!(
        expr,
        Expr::Index {
            target: Box::new(Expr::Index {
                target: Box::new(Expr::Ident("m".to_string())),
                index: Box::new(Expr::Number(1)),
            }),
            index: Box::new(Expr::Number(2)),
        }
    );
}

#[test]
fn parses_call_with_arguments() {
    let expr = stmt_expr("add(1, 2 + 3);");
    let Expr::Call { name, args } = expr else {
        panic!("expected call");
    };
    assert_eq!(name, "add");
    assert_eq!(args.len(), 2);
}

#[test]
fn parses_array_literal() {
    let expr = stmt_expr("[1, 2, 3];");
    assert_eq!(
        expr,
        Expr::ArrayLit(vec![Expr::Number(1), Expr::Number(2), Expr::Number(3)])
    );
}

#[test]
fn parses_empty_array_literal() {
    assert_eq!(stmt_expr("[];"), Expr::ArrayLit(vec![]));
}

#[test]
fn parses_array_assignment() {
    let stmt = first_stmt("arr[i + 1] = 5;");
    let Stmt::ArrayAssign {
        target,
        index,
        value,
    } = stmt
    else {
        panic!("expected array assignment");
    };
    assert_eq!(target, Expr::Ident("arr".to_string()));
    assert!(matches!(index, Expr::Binary { .. }));
    assert_eq!(value, Expr::Number(5));
}

#[test]
fn parses_if_without_else() {
    let stmt = first_stmt("if (x > 0) { print(x); }");
    let Stmt::If { cond, body } = stmt else {
        panic!("expected if");
    };
    assert!(matches!(cond, Expr::Binary { .. }));
    assert_eq!(body.len(), 1);
}

#[test]
fn rejects_else_branch() {
    let diags = parse_err("if (x) { print(1); } else { print(2); }");
    assert_has_diag(&diags, "`else` is not supported");
}

#[test]
fn parses_while_loop() {
    let stmt = first_stmt("while (i < 10) { i = i + 1; }");
    assert!(matches!(stmt, Stmt::While { .. }));
}

#[test]
fn parses_for_with_all_clauses() {
    let stmt = first_stmt("for (let i = 0; i < 5; i = i + 1) { print(i); }");
    let Stmt::For {
        init,
        cond,
        step,
        body,
    } = stmt
    else {
        panic!("expected for");
    };
    assert!(matches!(init.as_deref(), Some(Stmt::Assign { .. })));
    assert!(cond.is_some());
    assert!(matches!(step.as_deref(), Some(Stmt::Assign { .. })));
    assert_eq!(body.len(), 1);
}

#[test]
fn parses_for_with_empty_clauses() {
    let stmt = first_stmt("for (;;) { break; }");
    let Stmt::For {
        init, cond, step, ..
    } = stmt
    else {
        panic!("expected for");
    };
    assert!(init.is_none());
    assert!(cond.is_none());
    assert!(step.is_none());
}

#[test]
fn parses_for_with_expression_clauses() {
    let stmt = first_stmt("for (tick(); running(); tick()) { print(1); }");
    let Stmt::For { init, step, .. } = stmt else {
        panic!("expected for");
    };
    assert!(matches!(init.as_deref(), Some(Stmt::Expr(_))));
    assert!(matches!(step.as_deref(), Some(Stmt::Expr(_))));
}

#[test]
fn parses_bare_block() {
    let stmt = first_stmt("{ let x = 1; print(x); }");
    let Stmt::Block(stmts) = stmt else {
        panic!("expected block");
    };
    assert_eq!(stmts.len(), 2);
}

#[test]
fn parses_return_with_and_without_value() {
    let program = parse_ok("fn f() { return; }\nfn g() { return 1 + 2; }");
    let bodies: Vec<_> = program
        .items
        .iter()
        .filter_map(|i| match i {
            Item::Function(f) => Some(&f.body),
            _ => None,
        })
        .collect();
    assert_eq!(bodies[0][0], Stmt::Return(None));
    assert!(matches!(bodies[1][0], Stmt::Return(Some(_))));
}

#[test]
fn parses_function_declaration() {
    let program = parse_ok("fn add(a, b) { return a + b; }");
    let Item::Function(func) = &program.items[0] else {
        panic!("expected function");
    };
    assert_eq!(func.name, "add");
    assert_eq!(func.params, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(func.body.len(), 1);
}

#[test]
fn mixes_functions_and_top_level_statements() {
    let program = parse_ok("let x = 1;\nfn f() { return 0; }\nprint(x);");
    assert_eq!(program.items.len(), 3);
    assert!(matches!(program.items[0], Item::Stmt(_)));
    assert!(matches!(program.items[1], Item::Function(_)));
    assert!(matches!(program.items[2], Item::Stmt(_)));
}

#[test]
fn rejects_missing_semicolon() {
    let diags = parse_err("let x = 5");
    assert_has_diag(&diags, "Expected `;`");
}

#[test]
fn rejects_invalid_assignment_target() {
    let diags = parse_err("1 + 2 = 3;");
    assert_has_diag(&diags, "Invalid assignment target");

    let diags = parse_err("f() = 3;");
    assert_has_diag(&diags, "Invalid assignment target");
}

#[test]
fn rejects_trailing_comma_in_call() {
    let diags = parse_err("f(1, 2,);");
    assert_has_diag(&diags, "Trailing comma is not allowed in call arguments");
}

#[test]
fn rejects_trailing_comma_in_array_literal() {
    let diags = parse_err("let a = [1, 2,];");
    assert_has_diag(&diags, "Trailing comma is not allowed in array literal");
}

#[test]
fn rejects_malformed_for_header() {
    let diags = parse_err("for (let i = 0 i < 5; i = i + 1) { }");
    assert_has_diag(&diags, "Expected `;`");
}

#[test]
fn rejects_integer_literal_out_of_range() {
    let diags = parse_err("let x = 99999999999;");
    assert_has_diag(&diags, "out of range");
}

#[test]
fn stops_at_first_error() {
    // Fatal errors: the bag holds exactly one diagnostic.
    let diags = parse_err("let = 5; let = 6;");
    assert_eq!(diags.len(), 1);
}

#[test]
fn error_mentions_found_token() {
    let diags = parse_err("print(;);");
    assert_has_diag(&diags, "found `;`");
}

#[test]
fn pretty_print_round_trips() {
    let src = r#"
fn sum(arr, n) {
  let total = 0;
  for (let i = 0; i < n; i = i + 1) {
    total = total + arr[i];
  }
  return total;
}
let data = [3, 1, 4, 1, 5];
if (sum(data, 5) > 10) {
  print("big");
}
while (0) {
  break;
}
{
  let tmp = -data[0] * 2;
  print(!(tmp == 6) && 1 || 0);
}
print("done\n\ttabbed \"quoted\"");
"#;
    let program = parse_ok(src);
    let printed = program.pretty();
    let (reparsed, diags) = Parser::parse_source(&printed);
    assert!(
        diags.is_empty(),
        "pretty output failed to reparse:\n{printed}\n{:?}",
        diags.as_slice()
    );
    assert_eq!(program, reparsed, "pretty output:\n{printed}");
}
