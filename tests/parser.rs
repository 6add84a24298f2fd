mod common;

use common::strategies::*;
use eqsolve::ast::{BinOp, Expr, ParsedLine};
use eqsolve::names::NameCollector;
use eqsolve::parser::{parse_expression, parse_line};
use proptest::prelude::*;

fn equation(text: &str) -> Expr {
    match parse_line(text, 1).unwrap() {
        ParsedLine::Equation(tree) => tree,
        other => panic!("expected an equation, got {other:?}"),
    }
}

#[test]
fn test_equality_forms_are_equivalent() {
    assert_eq!(equation("x + y = 5"), equation("x+y==5"));
    assert_eq!(equation("x + y = 5").to_string(), "x + y = 5");
}

#[test]
fn test_precedence_and_associativity() {
    let tree = parse_expression("a - b - c").unwrap();
    assert_eq!(tree.to_string(), "a - b - c");
    assert_eq!(
        tree,
        Expr::binary(
            BinOp::Sub,
            Expr::binary(BinOp::Sub, Expr::name("a"), Expr::name("b")),
            Expr::name("c")
        )
    );

    let power = parse_expression("2^3^2").unwrap();
    assert_eq!(
        power,
        Expr::binary(
            BinOp::Pow,
            Expr::Number(2.0),
            Expr::binary(BinOp::Pow, Expr::Number(3.0), Expr::Number(2.0))
        )
    );

    // Unary minus binds looser than the power operator.
    let negated = parse_expression("-x**2").unwrap();
    assert_eq!(
        negated,
        Expr::neg(Expr::binary(BinOp::Pow, Expr::name("x"), Expr::Number(2.0)))
    );
    assert_eq!(negated.to_string(), "-x^2");
}

#[test]
fn test_canonical_text_keeps_needed_parentheses() {
    assert_eq!(parse_expression("a - (b + c)").unwrap().to_string(), "a - (b + c)");
    assert_eq!(parse_expression("(a*b)/(c*d)").unwrap().to_string(), "a*b/(c*d)");
    assert_eq!(parse_expression("(-a)^2").unwrap().to_string(), "(-a)^2");
    assert_eq!(parse_expression("((x))").unwrap().to_string(), "x");
}

#[test]
fn test_numbers() {
    assert_eq!(parse_expression("1.5e3").unwrap(), Expr::Number(1500.0));
    assert_eq!(parse_expression(".25").unwrap(), Expr::Number(0.25));
    assert_eq!(parse_expression("2E-2").unwrap(), Expr::Number(0.02));
    assert_eq!(parse_expression("1e308").unwrap(), Expr::Number(1e308));
}

#[test]
fn test_overflowing_literals_are_rejected() {
    assert!(parse_expression("1e400").is_err());
    assert!(parse_line("x = 1e400", 1).is_err());
}

#[test]
fn test_calls_and_names() {
    let tree = equation("y = f(x, 2*z) + sin(t)");
    let names = NameCollector::collect(&tree);
    let variables: Vec<&str> = names.variables.iter().map(String::as_str).collect();
    let functions: Vec<&str> = names.functions.iter().map(String::as_str).collect();
    assert_eq!(variables, ["t", "x", "y", "z"]);
    assert_eq!(functions, ["f", "sin"]);
}

#[test]
fn test_assignment_line() {
    match parse_line("k := 2*pi  # spring constant", 3).unwrap() {
        ParsedLine::Assignment(assignment) => {
            assert_eq!(assignment.target, "k");
            assert_eq!(assignment.to_string(), "k := 2*pi");
        }
        other => panic!("expected an assignment, got {other:?}"),
    }
}

#[test]
fn test_blank_and_comment_lines_are_empty() {
    assert_eq!(parse_line("", 1).unwrap(), ParsedLine::Empty);
    assert_eq!(parse_line("   # only a comment", 1).unwrap(), ParsedLine::Empty);
}

#[test]
fn test_errors_carry_line_number() {
    let error = parse_line("x + = 3", 7).unwrap_err();
    assert_eq!(error.line, 7);
    assert!(error.to_string().starts_with("Parse error on line 7:"));

    assert!(parse_line("x + y", 1).is_err(), "an expression alone is not an equation");
    assert!(parse_line("x = (y", 1).is_err());
    assert!(parse_line("2x = 1", 1).is_err());
}

proptest! {

#[test]
fn prop_canonical_text_reparses_to_same_tree(text in equation_strategy()) {
    let tree = equation(&text);
    let canonical = tree.to_string();
    let reparsed = equation(&canonical);
    prop_assert_eq!(&reparsed, &tree);
    prop_assert_eq!(reparsed.to_string(), canonical);
}

}
