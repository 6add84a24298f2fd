/// strategies.rs
use proptest::prelude::*;

/// Names drawn from a small pool so generated lines share variables
pub const NAMES: [&str; 6] = ["a", "b", "c", "x", "y", "z"];

pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(NAMES.to_vec()).prop_map(str::to_string)
}

/// Generate arbitrary expression text over the name pool
pub fn expression_strategy() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        name_strategy(),
        (1u32..100).prop_map(|n| n.to_string()),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(vec!["+", "-", "*", "/", "^"]), inner.clone())
                .prop_map(|(l, op, r)| format!("({l} {op} {r})")),
            inner.clone().prop_map(|e| format!("-{e}")),
            inner.clone().prop_map(|e| format!("sin({e})")),
        ]
    })
}

/// Generate an equation line `lhs = rhs`
pub fn equation_strategy() -> impl Strategy<Value = String> {
    (expression_strategy(), expression_strategy()).prop_map(|(l, r)| format!("{l} = {r}"))
}

/// One edit applied to a live system
#[derive(Debug, Clone)]
pub enum Edit {
    InsertEquation(String),
    /// Index into the currently inserted equations, modulo their count.
    DeleteEquation(usize),
    InsertParameter(String, u32),
    /// Index into the parameter names, modulo their count.
    DeleteParameter(usize),
    Namespace(Vec<String>),
}

/// Generate arbitrary edit sequences mixing every kind of change
pub fn edit_sequence_strategy() -> impl Strategy<Value = Vec<Edit>> {
    let edit = prop_oneof![
        4 => equation_strategy().prop_map(Edit::InsertEquation),
        2 => any::<usize>().prop_map(Edit::DeleteEquation),
        2 => (name_strategy(), 1u32..10).prop_map(|(n, v)| Edit::InsertParameter(n, v)),
        1 => any::<usize>().prop_map(Edit::DeleteParameter),
        1 => prop::collection::vec(name_strategy(), 0..3).prop_map(Edit::Namespace),
    ];
    prop::collection::vec(edit, 1..30)
}

/// Generate an acyclic chain `v0 = c0`, `v1 = c1*v0 + 1`, ...
/// The returned values are the exact solution, in order.
pub fn chain_strategy() -> impl Strategy<Value = (String, Vec<(String, f64)>)> {
    prop::collection::vec(1u32..4, 1..6).prop_map(|coefficients| {
        let mut lines = Vec::new();
        let mut solution = Vec::new();
        let mut previous: Option<f64> = None;
        for (i, c) in coefficients.iter().enumerate() {
            let c = f64::from(*c);
            let name = format!("v{i}");
            let value = match previous {
                None => {
                    lines.push(format!("{name} = {c}"));
                    c
                }
                Some(p) => {
                    lines.push(format!("{name} = {c}*v{} + 1", i - 1));
                    c * p + 1.0
                }
            };
            solution.push((name, value));
            previous = Some(value);
        }
        (lines.join("\n"), solution)
    })
}
