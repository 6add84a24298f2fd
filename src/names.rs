use std::collections::BTreeSet;

use crate::ast::{Assignment, Expr, Visitor};

/// Referenced names of a tree, split by syntactic role. Names used as call
/// arguments count as variables; only the callee is a function.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameCollector {
    pub variables: BTreeSet<String>,
    pub functions: BTreeSet<String>,
}

impl NameCollector {
    pub fn collect(expr: &Expr) -> Self {
        let mut collector = Self::default();
        collector.visit_expr(expr);
        collector
    }

    /// Includes the assignment target among the variables.
    pub fn collect_assignment(assignment: &Assignment) -> Self {
        let mut collector = Self::collect(&assignment.value);
        collector.variables.insert(assignment.target.clone());
        collector
    }
}

impl Visitor for NameCollector {
    fn visit_name(&mut self, name: &str) {
        self.variables.insert(name.to_string());
    }

    fn visit_call(&mut self, name: &str, args: &[Expr]) {
        self.functions.insert(name.to_string());
        for arg in args {
            self.visit_expr(arg);
        }
    }
}
