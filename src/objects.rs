use std::collections::BTreeSet;
use std::fmt;

use crate::ast::{Assignment, Expr};
use crate::cache::LruCache;
use crate::errors::SystemError;
use crate::names::NameCollector;
use crate::residual::Residual;
use crate::units::Unit;

pub const DEFAULT_STARTING_GUESS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    id: String,
    source_text: String,
    tree: Expr,
    residual: Residual,
    variable_names: BTreeSet<String>,
    function_names: BTreeSet<String>,
    parameter_target: Option<String>,
}

impl Equation {
    /// Canonical text of the tree; unique within a system.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn tree(&self) -> &Expr {
        &self.tree
    }

    pub fn residual(&self) -> &Residual {
        &self.residual
    }

    pub fn variable_names(&self) -> &BTreeSet<String> {
        &self.variable_names
    }

    pub fn function_names(&self) -> &BTreeSet<String> {
        &self.function_names
    }

    /// Set for `p = <expr>` equations whose only name is `p`; such an
    /// equation pins a parameter rather than relating unknowns.
    pub fn parameter_target(&self) -> Option<&str> {
        self.parameter_target.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    source_text: String,
    assignment: Assignment,
    unit: Option<Unit>,
    variable_names: BTreeSet<String>,
    function_names: BTreeSet<String>,
}

impl Parameter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Right-hand side, evaluated once per solve run.
    pub fn value(&self) -> &Expr {
        &self.assignment.value
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn set_unit(&mut self, unit: Option<Unit>) {
        self.unit = unit;
    }

    /// Includes the parameter's own name.
    pub fn variable_names(&self) -> &BTreeSet<String> {
        &self.variable_names
    }

    pub fn function_names(&self) -> &BTreeSet<String> {
        &self.function_names
    }

    /// Names the value refers to, other than the parameter itself.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.variable_names
            .iter()
            .map(String::as_str)
            .filter(move |name| *name != self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    starting_guess: f64,
    lower_bound: f64,
    upper_bound: f64,
    unit: Option<Unit>,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            starting_guess: DEFAULT_STARTING_GUESS,
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
            unit: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn starting_guess(&self) -> f64 {
        self.starting_guess
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    /// Builder form of [`Variable::apply`].
    pub fn with(mut self, attribute: VariableAttribute) -> Result<Self, SystemError> {
        self.apply(attribute)?;
        Ok(self)
    }

    /// True once any attribute differs from the defaults.
    pub fn is_modified(&self) -> bool {
        *self != Variable::new(self.name.clone())
    }

    pub fn apply(&mut self, attribute: VariableAttribute) -> Result<(), SystemError> {
        let invalid = |attribute: AttributeKind, value: f64| SystemError::InvalidAttribute {
            name: self.name.clone(),
            attribute: attribute.name(),
            value,
        };
        match attribute {
            VariableAttribute::StartingGuess(value) => {
                if !value.is_finite() {
                    return Err(invalid(AttributeKind::StartingGuess, value));
                }
                self.starting_guess = value;
            }
            VariableAttribute::LowerBound(value) => {
                if value.is_nan() {
                    return Err(invalid(AttributeKind::LowerBound, value));
                }
                self.check_bounds(value, self.upper_bound)?;
                self.lower_bound = value;
            }
            VariableAttribute::UpperBound(value) => {
                if value.is_nan() {
                    return Err(invalid(AttributeKind::UpperBound, value));
                }
                self.check_bounds(self.lower_bound, value)?;
                self.upper_bound = value;
            }
            VariableAttribute::Unit(unit) => self.unit = unit,
        }
        Ok(())
    }

    fn check_bounds(&self, lower: f64, upper: f64) -> Result<(), SystemError> {
        if lower > upper {
            return Err(SystemError::InvalidBounds {
                name: self.name.clone(),
                lower,
                upper,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    pub unit: Option<Unit>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_modified(&self) -> bool {
        self.unit.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableAttribute {
    StartingGuess(f64),
    LowerBound(f64),
    UpperBound(f64),
    Unit(Option<Unit>),
}

impl VariableAttribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            VariableAttribute::StartingGuess(_) => AttributeKind::StartingGuess,
            VariableAttribute::LowerBound(_) => AttributeKind::LowerBound,
            VariableAttribute::UpperBound(_) => AttributeKind::UpperBound,
            VariableAttribute::Unit(_) => AttributeKind::Unit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    StartingGuess,
    LowerBound,
    UpperBound,
    Unit,
}

impl AttributeKind {
    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::StartingGuess => "starting_guess",
            AttributeKind::LowerBound => "lower_bound",
            AttributeKind::UpperBound => "upper_bound",
            AttributeKind::Unit => "unit",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds system objects. Variables and functions that leave the system
/// with user edits are remembered so reintroducing the name restores them.
#[derive(Debug, Clone, Default)]
pub struct Factory {
    variables: LruCache<Variable>,
    functions: LruCache<Function>,
}

impl Factory {
    pub fn new(capacity: usize) -> Self {
        Self {
            variables: LruCache::new(capacity),
            functions: LruCache::new(capacity),
        }
    }

    pub fn create_equation(source_text: &str, tree: Expr) -> Result<Equation, SystemError> {
        let Expr::Compare { lhs, .. } = &tree else {
            return Err(SystemError::NotAnEquation(source_text.to_string()));
        };
        let names = NameCollector::collect(&tree);
        let parameter_target = match lhs.as_name() {
            Some(name) if names.variables.len() == 1 && names.variables.contains(name) => {
                Some(name.to_string())
            }
            _ => None,
        };
        Ok(Equation {
            id: tree.to_string(),
            source_text: source_text.to_string(),
            residual: Residual::from_tree(&tree),
            tree,
            variable_names: names.variables,
            function_names: names.functions,
            parameter_target,
        })
    }

    pub fn create_parameter(source_text: &str, assignment: Assignment) -> Parameter {
        let names = NameCollector::collect_assignment(&assignment);
        Parameter {
            name: assignment.target.clone(),
            source_text: source_text.to_string(),
            assignment,
            unit: None,
            variable_names: names.variables,
            function_names: names.functions,
        }
    }

    /// A remembered variable wins over `proposed`, which wins over defaults.
    pub fn create_variable(&mut self, name: &str, proposed: Option<Variable>) -> Variable {
        if let Some(cached) = self.variables.get(name) {
            return cached.clone();
        }
        match proposed {
            Some(variable) if variable.name() == name => variable,
            _ => Variable::new(name),
        }
    }

    pub fn create_function(&mut self, name: &str) -> Function {
        self.functions
            .get(name)
            .cloned()
            .unwrap_or_else(|| Function::new(name))
    }

    /// Remembers a departing variable if it was edited, otherwise forgets
    /// any stale entry under its name.
    pub fn retire_variable(&mut self, variable: Variable) {
        if variable.is_modified() {
            let name = variable.name().to_string();
            if let Some((evicted, _)) = self.variables.put(name, variable) {
                tracing::debug!(variable = %evicted, "evicted from variable cache");
            }
        } else {
            self.variables.remove(variable.name());
        }
    }

    pub fn retire_function(&mut self, function: Function) {
        if function.is_modified() {
            let name = function.name().to_string();
            self.functions.put(name, function);
        } else {
            self.functions.remove(function.name());
        }
    }

    pub fn cached_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.peek(name)
    }
}
