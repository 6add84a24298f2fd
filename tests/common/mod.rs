#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use eqsolve::{
    CancellationToken, Document, EquationSystem, Event, ResultsEntry, ResultsManager, SolveError, Solver,
    SolverSettings,
};

pub mod strategies;

/// Epsilon for solved values
///
/// The solvers stop at a residual norm of 1e-10, which for well conditioned
/// test systems puts the unknowns well within this tolerance.
/// Example: `x + y = 5`, `x - y = 1` gives `x = 3` to about 1e-12
pub const EPSILON_SOLVED: f64 = 1e-8;

/// Epsilon for values that pass through numerically differentiated
/// nonlinear functions
///
/// Example: `x^2 = 2` solved from a starting guess of 1
pub const EPSILON_NONLINEAR: f64 = 1e-6;

/// Builds a system from a namespace script and an equation document
///
/// # Arguments
/// * `script` - Namespace script, may be empty
/// * `equations` - Equation document, one equation or parameter per line
///
/// # Panics
/// Panics if the script fails to compile or any document line fails to parse
///
/// # Example
/// ```rust
/// let system = system_with("k = 2", "y = k*x\nx = 1");
/// assert_eq!(system.equation_count(), 2);
/// ```
pub fn system_with(script: &str, equations: &str) -> EquationSystem {
    let mut system = EquationSystem::new();
    system.compile_namespace(script).expect("script compiles");
    let mut document = Document::new();
    let diagnostics = document.sync(equations, &mut system).expect("document applies");
    assert!(diagnostics.is_empty(), "unexpected parse errors: {diagnostics:?}");
    system
}

/// Builds a system from an equation document alone
pub fn system_from(equations: &str) -> EquationSystem {
    system_with("", equations)
}

/// Variables the system should hold, recomputed from scratch
///
/// Every name referenced by an equation or parameter, minus parameter names
/// and namespace names. Compared against `EquationSystem::variable_names`
/// to check the incremental bookkeeping.
pub fn expected_variables(system: &EquationSystem) -> BTreeSet<String> {
    let parameters: BTreeSet<&str> = system.parameters().map(|p| p.name()).collect();
    system
        .equations()
        .flat_map(|equation| equation.variable_names().iter())
        .chain(system.parameters().flat_map(|p| p.variable_names().iter()))
        .filter(|name| !parameters.contains(name.as_str()))
        .filter(|name| !system.namespace().contains(name))
        .cloned()
        .collect()
}

/// Collects every event a system publishes
///
/// # Example
/// ```rust
/// let mut system = EquationSystem::new();
/// let events = record_events(&mut system);
/// system.assign_grid("T", vec![1.0]).unwrap();
/// assert_eq!(events.lock().unwrap().len(), 1);
/// ```
pub fn record_events(system: &mut EquationSystem) -> Arc<Mutex<Vec<Event>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    system.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

/// Solves with the given settings and returns the result entry along with
/// the solve outcome
///
/// The entry is returned even on failure so tests can inspect the rows
/// committed before the error.
pub fn solve_with(system: &EquationSystem, settings: SolverSettings) -> (Option<ResultsEntry>, Result<String, SolveError>) {
    let mut solver = Solver::new(settings);
    let mut results = ResultsManager::new();
    let outcome = solver.solve(system, &mut results, &CancellationToken::new());
    let entry = results.names().last().and_then(|name| results.entry(name)).cloned();
    (entry, outcome)
}

/// Solves with default settings, panicking on failure
pub fn solve(system: &EquationSystem) -> ResultsEntry {
    let (entry, outcome) = solve_with(system, SolverSettings::default());
    outcome.expect("system solves");
    entry.expect("results entry exists")
}

/// Asserts the value of `name` in row `row` of a results entry
///
/// # Panics
/// Panics if the column or row is missing, or the value differs from
/// `expected` by more than `epsilon`
pub fn assert_value(entry: &ResultsEntry, row: usize, name: &str, expected: f64, epsilon: f64) {
    let actual = entry
        .value(row, name)
        .unwrap_or_else(|| panic!("no value for '{name}' in row {row}"));
    assert_relative_eq!(actual, expected, epsilon = epsilon, max_relative = epsilon);
}
