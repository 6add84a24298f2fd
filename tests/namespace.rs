use approx::assert_relative_eq;
use eqsolve::NamespaceError;
use eqsolve::eval::{EmptyScope, evaluate};
use eqsolve::namespace::{Namespace, compile_and_exec};
use eqsolve::parser::parse_expression;
use eqsolve::EvalError;

fn eval(namespace: &Namespace, text: &str) -> Result<f64, EvalError> {
    evaluate(&parse_expression(text).unwrap(), &EmptyScope, namespace)
}

#[test]
fn test_constants_and_functions() {
    let script = "\
# physical constants
g = 9.81
half_g = g / 2

square(x) = x^2
fall(t) = half_g * square(t)
";
    let namespace = compile_and_exec(script).unwrap();
    assert_eq!(namespace.constant("g"), Some(9.81));
    assert_relative_eq!(eval(&namespace, "fall(2)").unwrap(), 19.62, epsilon = 1e-12);
    assert!(namespace.function("square").is_some());
    assert!(namespace.contains("pi"));
    assert_relative_eq!(eval(&namespace, "cos(pi)").unwrap(), -1.0, epsilon = 1e-12);
}

#[test]
fn test_user_functions_shadow_builtins() {
    let namespace = compile_and_exec("sqrt(x) = 2*x").unwrap();
    assert_eq!(eval(&namespace, "sqrt(4)").unwrap(), 8.0);
}

#[test]
fn test_unit_annotations() {
    let namespace = compile_and_exec("@unit(\"m/s\")\nv(d, t) = d/t\n@unit kg\nm0 = 3").unwrap();
    assert_eq!(namespace.function_units().get("v").map(String::as_str), Some("m/s"));
    assert_eq!(namespace.unit_annotation("m0"), Some("kg"));
    assert!(!namespace.function_units().contains_key("m0"));
}

#[test]
fn test_script_errors() {
    assert!(matches!(
        compile_and_exec("a = b + 1"),
        Err(NamespaceError::Eval { line: 1, source: EvalError::UnknownName(_) })
    ));
    assert!(matches!(compile_and_exec("\n\na = = 1"), Err(NamespaceError::Parse(e)) if e.line == 3));
    assert!(matches!(
        compile_and_exec("@unit(m)\n"),
        Err(NamespaceError::DanglingAnnotation { line: 1 })
    ));
}

#[test]
fn test_call_errors() {
    let namespace = compile_and_exec("f(x) = f(x)\ng(a, b) = a + b").unwrap();
    assert_eq!(
        eval(&namespace, "f(1)"),
        Err(EvalError::RecursionLimit("f".to_string()))
    );
    assert!(matches!(eval(&namespace, "g(1)"), Err(EvalError::Arity { expected: 2, found: 1, .. })));
    assert_eq!(eval(&namespace, "nope(1)"), Err(EvalError::UnknownFunction("nope".to_string())));
}
