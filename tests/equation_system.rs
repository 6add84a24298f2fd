mod common;

use common::*;
use eqsolve::ast::ParsedLine;
use eqsolve::objects::AttributeKind;
use eqsolve::parser::parse_line;
use eqsolve::{Document, EquationSystem, Event, Factory, SystemError, Variable, VariableAttribute};

fn insert(system: &mut EquationSystem, text: &str) -> String {
    let ParsedLine::Equation(tree) = parse_line(text, 1).unwrap() else {
        panic!("not an equation: {text}");
    };
    let equation = Factory::create_equation(text, tree).unwrap();
    let id = equation.id().to_string();
    system.insert_equation(equation, Vec::new()).unwrap();
    id
}

#[test]
fn test_variables_follow_equations() {
    let mut system = EquationSystem::new();
    let first = insert(&mut system, "x + y = 5");
    insert(&mut system, "x - z = 1");
    assert_eq!(system.variable_names(), expected_variables(&system));
    assert_eq!(system.reference_count("x"), 2);

    system.delete_equation(&first).unwrap();
    let names: Vec<String> = system.variable_names().into_iter().collect();
    assert_eq!(names, ["x", "z"]);
}

#[test]
fn test_duplicate_equation_is_rejected() {
    let mut system = EquationSystem::new();
    insert(&mut system, "x = 1");
    let ParsedLine::Equation(tree) = parse_line("x == 1", 1).unwrap() else {
        unreachable!()
    };
    let equation = Factory::create_equation("x == 1", tree).unwrap();
    assert_eq!(
        system.insert_equation(equation, Vec::new()),
        Err(SystemError::DuplicateEquation("x = 1".to_string()))
    );
    assert_eq!(system.equation_count(), 1);
}

#[test]
fn test_unknown_equation_delete_fails() {
    let mut system = EquationSystem::new();
    assert!(matches!(
        system.delete_equation("x = 1"),
        Err(SystemError::UnknownEquation(_))
    ));
}

#[test]
fn test_implied_variables_seed_attributes() {
    let mut system = EquationSystem::new();
    let ParsedLine::Equation(tree) = parse_line("x^2 = 4", 1).unwrap() else {
        unreachable!()
    };
    let implied = Variable::new("x")
        .with(VariableAttribute::StartingGuess(-3.0))
        .unwrap();
    let equation = Factory::create_equation("x^2 = 4", tree).unwrap();
    system.insert_equation(equation, vec![implied]).unwrap();
    assert_eq!(system.variable("x").unwrap().starting_guess(), -3.0);
}

#[test]
fn test_implied_variables_cannot_carry_crossed_bounds() {
    let crossed = Variable::new("x")
        .with(VariableAttribute::LowerBound(5.0))
        .unwrap()
        .with(VariableAttribute::UpperBound(1.0));
    assert!(matches!(crossed, Err(SystemError::InvalidBounds { .. })));

    let pinned = Variable::new("x")
        .with(VariableAttribute::LowerBound(5.0))
        .unwrap()
        .with(VariableAttribute::UpperBound(5.0))
        .unwrap();
    let mut system = EquationSystem::new();
    let ParsedLine::Equation(tree) = parse_line("x = 3", 1).unwrap() else {
        unreachable!()
    };
    let equation = Factory::create_equation("x = 3", tree).unwrap();
    system.insert_equation(equation, vec![pinned]).unwrap();
    let variable = system.variable("x").unwrap();
    assert_eq!((variable.lower_bound(), variable.upper_bound()), (5.0, 5.0));
}

#[test]
fn test_edited_variable_survives_removal() {
    let mut system = EquationSystem::new();
    let id = insert(&mut system, "x = 2*y");
    system
        .update_variable("x", VariableAttribute::StartingGuess(42.0))
        .unwrap();
    system.delete_equation(&id).unwrap();
    assert!(system.variable("x").is_none());

    insert(&mut system, "x = 3");
    assert_eq!(system.variable("x").unwrap().starting_guess(), 42.0);
    // y was never edited and comes back with defaults.
    insert(&mut system, "y = 1");
    assert_eq!(system.variable("y").unwrap(), &Variable::new("y"));
}

#[test]
fn test_resetting_to_defaults_forgets_cached_edits() {
    let mut system = EquationSystem::new();
    let id = insert(&mut system, "x = 1");
    system
        .update_variable("x", VariableAttribute::LowerBound(0.0))
        .unwrap();
    system.delete_equation(&id).unwrap();

    let id = insert(&mut system, "x = 1");
    system
        .update_variable("x", VariableAttribute::LowerBound(f64::NEG_INFINITY))
        .unwrap();
    system.delete_equation(&id).unwrap();

    insert(&mut system, "x = 1");
    assert_eq!(system.variable("x").unwrap(), &Variable::new("x"));
}

#[test]
fn test_cache_capacity_bounds_remembered_variables() {
    let mut system = EquationSystem::with_cache_capacity(1);
    let a = insert(&mut system, "a = 1");
    let b = insert(&mut system, "b = 1");
    system.update_variable("a", VariableAttribute::StartingGuess(5.0)).unwrap();
    system.update_variable("b", VariableAttribute::StartingGuess(6.0)).unwrap();
    system.delete_equation(&a).unwrap();
    system.delete_equation(&b).unwrap();

    assert!(system.factory().cached_variable("a").is_none());
    assert_eq!(system.factory().cached_variable("b").unwrap().starting_guess(), 6.0);
}

#[test]
fn test_invalid_bounds_are_rejected() {
    let mut system = EquationSystem::new();
    insert(&mut system, "x = 1");
    system.update_variable("x", VariableAttribute::UpperBound(1.0)).unwrap();
    let error = system
        .update_variable("x", VariableAttribute::LowerBound(2.0))
        .unwrap_err();
    assert!(matches!(error, SystemError::InvalidBounds { .. }));
    assert_eq!(system.variable("x").unwrap().lower_bound(), f64::NEG_INFINITY);

    assert!(matches!(
        system.update_variable("nope", VariableAttribute::StartingGuess(1.0)),
        Err(SystemError::UnknownVariable(_))
    ));
}

#[test]
fn test_parameters_shadow_variables() {
    let mut system = EquationSystem::new();
    let mut document = Document::new();
    document.sync("y = k*x\nx = 2", &mut system).unwrap();
    assert!(system.variable("k").is_some());

    document.sync("k := 3\ny = k*x\nx = 2", &mut system).unwrap();
    assert!(system.variable("k").is_none());
    assert_eq!(system.parameter("k").unwrap().source_text(), "k := 3");
    assert_eq!(system.variable_names(), expected_variables(&system));

    document.sync("y = k*x\nx = 2", &mut system).unwrap();
    assert!(system.parameter("k").is_none());
    assert!(system.variable("k").is_some());
}

#[test]
fn test_latest_parameter_definition_is_active() {
    let mut system = system_from("p := 1\ny = p");
    let ParsedLine::Assignment(assignment) = parse_line("p := 2", 1).unwrap() else {
        unreachable!()
    };
    system.insert_parameter(Factory::create_parameter("p := 2", assignment));
    assert_eq!(system.parameter_definitions("p").len(), 2);
    assert_eq!(system.parameter("p").unwrap().value().to_string(), "2");

    system.delete_parameter("p").unwrap();
    assert_eq!(system.parameter("p").unwrap().value().to_string(), "1");
    assert!(system.variable("p").is_none());
}

#[test]
fn test_namespace_names_are_not_variables() {
    let mut system = system_from("y = g*t");
    assert!(system.variable("g").is_some());

    system.compile_namespace("g = 9.81").unwrap();
    assert!(system.variable("g").is_none());
    assert!(system.variable("pi").is_none());

    // A failing script keeps the previous namespace.
    assert!(system.compile_namespace("g = ").is_err());
    assert_eq!(system.namespace().constant("g"), Some(9.81));
    assert!(system.variable("g").is_none());
}

#[test]
fn test_parameter_equations_are_counted() {
    let mut system = system_from("p = 4\ny = 2*p");
    assert_eq!(system.parameter_equation_count("p"), 1);
    // The pinned name is still an unknown of the system.
    assert!(system.variable("p").is_some());
    assert_eq!(
        system.assign_grid("p", vec![1.0, 2.0]),
        Err(SystemError::GridParameterCollision("p".to_string()))
    );
}

#[test]
fn test_events_are_published() {
    let mut system = EquationSystem::new();
    let events = record_events(&mut system);
    insert(&mut system, "x = 1");
    system
        .update_variable("x", VariableAttribute::StartingGuess(2.0))
        .unwrap();
    system.assign_grid("T", vec![1.0]).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        [
            Event::DataChanged,
            Event::AttributeUpdated {
                name: "x".to_string(),
                attribute: AttributeKind::StartingGuess,
            },
            Event::DataChanged,
        ]
    );
}

#[test]
fn test_revision_tracks_changes() {
    let mut system = EquationSystem::new();
    let before = system.revision();
    let id = insert(&mut system, "x = 1");
    assert!(system.revision() > before);
    let after_insert = system.revision();
    let _ = system.validate_equation_system();
    assert_eq!(system.revision(), after_insert);
    system.delete_equation(&id).unwrap();
    assert!(system.revision() > after_insert);
}

#[test]
fn test_functions_are_tracked() {
    let mut system = EquationSystem::new();
    system.compile_namespace("f(a) = 2*a").unwrap();
    let mut document = Document::new();
    document.sync("y = f(x)\nz = f(y) + sin(x)", &mut system).unwrap();
    let names: Vec<&str> = system.functions().map(|f| f.name()).collect();
    assert_eq!(names, ["f", "sin"]);

    document.sync("z = f(y) + sin(x)", &mut system).unwrap();
    assert_eq!(system.functions().count(), 2);
    document.sync("", &mut system).unwrap();
    assert_eq!(system.functions().count(), 0);
    assert_eq!(system.variables().count(), 0);
}
