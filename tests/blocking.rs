mod common;

use std::collections::{BTreeSet, HashSet};

use common::strategies::*;
use common::*;
use eqsolve::blocking::decompose;
use eqsolve::{BlockStatus, Document, EquationSystem};
use proptest::prelude::*;

fn block_equations(system: &EquationSystem) -> Vec<Vec<String>> {
    system.blocking().into_iter().map(|block| block.equations).collect()
}

#[test]
fn test_coupled_pair_is_one_block() {
    let system = system_from("x + y = 5\nx - y = 1");
    assert_eq!(block_equations(&system), [["x + y = 5", "x - y = 1"]]);

    let report = system.validate_equation_system();
    assert!(report.valid);
    assert_eq!(report.blocks[0].status, BlockStatus::Valid);
    assert_eq!(report.blocks[0].unknowns, ["x", "y"]);
}

#[test]
fn test_chain_is_ordered_sources_first() {
    // Inserted in reverse so order must come from the dependencies.
    let system = system_from("y = x + 1\nx = 3*a\na = 2");
    let blocks = system.blocking();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].equations, ["a = 2"]);
    assert_eq!(blocks[0].matched, ["a"]);
    assert_eq!(blocks[1].equations, ["x = 3*a"]);
    assert_eq!(blocks[2].equations, ["y = x + 1"]);
}

#[test]
fn test_independent_equations_keep_insertion_order() {
    let system = system_from("c = 3\na = 1\nb = 2");
    assert_eq!(block_equations(&system), [["c = 3"], ["a = 1"], ["b = 2"]]);
}

#[test]
fn test_over_and_under_determined() {
    let over = system_from("x = 1\nx = 2");
    let report = over.validate_equation_system();
    assert!(!report.valid);
    assert!(report.blocks.iter().any(|b| b.status == BlockStatus::OverDetermined));

    let under = system_from("x + y = 1");
    let report = under.validate_equation_system();
    assert!(!report.valid);
    assert_eq!(report.blocks[0].status, BlockStatus::UnderDetermined);
    assert_eq!(report.blocks[0].unknowns, ["x", "y"]);
}

#[test]
fn test_equation_over_fixed_inputs_is_determined() {
    let system = system_from("a := 2\na = 2\ny = a + 1");
    let report = system.validate_equation_system();
    assert!(report.valid, "{:?}", report.messages());
    assert_eq!(report.blocks[0].status, BlockStatus::Determined);
    assert_eq!(report.blocks[0].equations, ["a = 2"]);
    assert!(report.blocks[0].unknowns.is_empty());
    assert_eq!(report.blocks[1].status, BlockStatus::Valid);

    // Restating a value solved by an earlier block is still redundant.
    let system = system_from("x = 1\ny = x\ny = 2*x");
    assert!(!system.validate_equation_system().valid);
}

#[test]
fn test_grid_variables_are_not_unknowns() {
    let mut system = system_from("y = T*2");
    assert!(!system.validate_equation_system().valid);

    system.assign_grid("T", vec![1.0, 2.0, 3.0]).unwrap();
    let blocks = system.blocking();
    assert_eq!(blocks[0].matched, ["y"]);
    let report = system.validate_equation_system();
    assert!(report.valid, "{:?}", report.messages());
    assert_eq!(report.blocks[0].unknowns, ["y"]);
}

#[test]
fn test_grid_on_missing_variable_is_reported() {
    let mut system = system_from("y = 2");
    system.assign_grid("Q", vec![1.0]).unwrap();
    let report = system.validate_equation_system();
    assert!(!report.valid);
    assert_eq!(report.grid_errors.len(), 1);
}

#[test]
fn test_parameters_do_not_take_part() {
    let system = system_from("k := 2\ny = k*x\nx = 1");
    let report = system.validate_equation_system();
    assert!(report.valid, "{:?}", report.messages());
    let unknowns: BTreeSet<&str> = report
        .blocks
        .iter()
        .flat_map(|b| b.unknowns.iter().map(String::as_str))
        .collect();
    assert_eq!(unknowns, BTreeSet::from(["x", "y"]));
}

#[test]
fn test_decompose_without_unknowns() {
    let names = BTreeSet::from(["k".to_string()]);
    let blocks = decompose([("k = 1", &names)], |_| false);
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].matched.is_empty());
}

proptest! {

#[test]
fn prop_blocks_partition_equations(lines in prop::collection::vec(equation_strategy(), 1..12)) {
    let mut system = EquationSystem::new();
    let mut document = Document::new();
    document.sync(&lines.join("\n"), &mut system).unwrap();

    let blocks = system.blocking();
    let mut seen = HashSet::new();
    for block in &blocks {
        prop_assert!(!block.equations.is_empty());
        prop_assert!(block.matched.len() <= block.equations.len());
        for id in &block.equations {
            prop_assert!(seen.insert(id.clone()), "equation in two blocks: {}", id);
        }
    }
    prop_assert_eq!(seen.len(), system.equation_count());

    let matched: Vec<&String> = blocks.iter().flat_map(|b| &b.matched).collect();
    let distinct: HashSet<&&String> = matched.iter().collect();
    prop_assert_eq!(distinct.len(), matched.len());
}

#[test]
fn prop_validation_is_idempotent(lines in prop::collection::vec(equation_strategy(), 1..8)) {
    let mut system = EquationSystem::new();
    let mut document = Document::new();
    document.sync(&lines.join("\n"), &mut system).unwrap();

    let first = system.validate_equation_system();
    let second = system.validate_equation_system();
    prop_assert_eq!(first, second);
    prop_assert_eq!(system.blocking(), system.blocking());
}

#[test]
fn prop_matched_unknowns_precede_their_users((text, _) in chain_strategy()) {
    let system = system_from(&text);
    let blocks = system.blocking();
    prop_assert_eq!(blocks.len(), system.equation_count());
    for (i, block) in blocks.iter().enumerate() {
        prop_assert_eq!(&block.matched, &vec![format!("v{i}")]);
    }
}

}
