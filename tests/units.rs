mod common;

use approx::assert_relative_eq;
use common::*;
use eqsolve::UnitError;
use eqsolve::units::{Dimensions, Unit, UnitRegistry};

#[test]
fn test_parse_derived_units() {
    let registry = UnitRegistry::default();
    let newton = registry.lookup("N").unwrap();
    let composed = registry.parse_unit("kg*m/s^2").unwrap();
    assert!(composed.is_compatible(newton));
    assert_eq!(composed.name(), "kg*m/s^2");

    let speed = registry.parse_unit("km/h").unwrap();
    assert_relative_eq!(speed.scale(), 1000.0 / 3600.0, epsilon = 1e-12);
    assert_eq!(speed.dimensions(), Dimensions::new([1, 0, -1, 0, 0, 0, 0]));
}

#[test]
fn test_parse_errors() {
    let registry = UnitRegistry::default();
    assert_eq!(
        registry.parse_unit("furlong"),
        Err(UnitError::UndefinedUnit("furlong".to_string()))
    );
    assert!(matches!(registry.parse_unit("m^x"), Err(UnitError::NonIntegerPower(_))));
    assert!(matches!(registry.parse_unit("m +"), Err(UnitError::Syntax { .. })));
    assert!(registry.parse_unit("").unwrap().is_dimensionless());
}

#[test]
fn test_dimension_display() {
    let registry = UnitRegistry::default();
    let force = registry.lookup("newton").unwrap();
    assert_eq!(force.dimensions().to_string(), "[length] * [mass] / [time] ** 2");
    assert_eq!(Unit::dimensionless().dimensions().to_string(), "dimensionless");
}

#[test]
fn test_mismatched_units_warn_once() {
    let mut system = system_from("x = y");
    system.set_variable_unit("x", "meter").unwrap();
    system.set_variable_unit("y", "second").unwrap();

    let warnings = system.validate_equation("x = y").unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("meter"), "{}", warnings[0]);
    assert!(warnings[0].contains("second"), "{}", warnings[0]);

    let report = system.validate_equation_system();
    assert!(!report.valid);
    assert_eq!(report.unit_warnings["x = y"], warnings);
}

#[test]
fn test_consistent_units_and_literals_pass() {
    let mut system = system_from("d = v*t + 2\nv = 3\nt = 4");
    system.set_variable_unit("d", "m").unwrap();
    system.set_variable_unit("v", "m/s").unwrap();
    system.set_variable_unit("t", "s").unwrap();
    assert!(system.validate_equation("d = v*t + 2").unwrap().is_empty());
    assert!(system.validate_equation_system().valid);
}

#[test]
fn test_variables_without_units_are_wildcards() {
    let mut system = system_from("x = y + z");
    system.set_variable_unit("x", "m").unwrap();
    system.set_variable_unit("y", "m").unwrap();
    assert!(system.validate_equation("x = y + z").unwrap().is_empty());
}

#[test]
fn test_nested_mismatch_reported_at_the_sum() {
    let mut system = system_from("x = (a + b)*c");
    system.set_variable_unit("a", "m").unwrap();
    system.set_variable_unit("b", "kg").unwrap();
    let warnings = system.validate_equation("x = (a + b)*c").unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("a + b:"), "{}", warnings[0]);
}

#[test]
fn test_transcendental_functions_need_dimensionless_arguments() {
    let mut system = system_from("y = sin(x)\nz = sqrt(w)");
    system.set_variable_unit("x", "m").unwrap();
    system.set_variable_unit("w", "m^2").unwrap();
    system.set_variable_unit("z", "m").unwrap();
    assert_eq!(system.validate_equation("y = sin(x)").unwrap().len(), 1);
    assert!(system.validate_equation("z = sqrt(w)").unwrap().is_empty());
}

#[test]
fn test_function_annotations() {
    let mut system = system_with("@unit(\"m/s\")\nspeed(d, t) = d/t\n@unit(bogus)\nh(a) = a", "v = speed(d, t)\nq = h(v)");
    system.set_variable_unit("v", "m/s").unwrap();
    system.set_variable_unit("q", "m/s").unwrap();
    assert!(system.validate_equation("v = speed(d, t)").unwrap().is_empty());

    let warnings = system.validate_equation("q = h(v)").unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("undefined unit 'bogus'"), "{}", warnings[0]);
}

#[test]
fn test_function_unit_override() {
    let mut system = system_with("f(a) = a", "y = f(x)");
    let registry = UnitRegistry::default();
    system.set_variable_unit("y", "m").unwrap();
    system.update_function("f", Some(registry.parse_unit("s").unwrap())).unwrap();
    assert_eq!(system.validate_equation("y = f(x)").unwrap().len(), 1);
    system.update_function("f", None).unwrap();
    assert!(system.validate_equation("y = f(x)").unwrap().is_empty());
}

#[test]
fn test_exponent_overflow_is_a_warning() {
    let mut system = system_from("y = L^2147483647*L");
    system.set_variable_unit("L", "meter").unwrap();
    let warnings = system.validate_equation("y = L^2147483647*L").unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("out of range"), "{}", warnings[0]);

    let registry = UnitRegistry::default();
    assert!(matches!(
        registry.parse_unit("m^2147483647*m"),
        Err(UnitError::ExponentOverflow(_))
    ));
    assert_eq!(
        Dimensions::base(0).checked_powi(i32::MAX).and_then(|dims| dims.checked_mul(Dimensions::base(0))),
        None
    );
}
