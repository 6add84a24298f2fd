use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::{Definition, Expr};
use crate::builtins::{Builtin, CONSTANTS};
use crate::errors::NamespaceError;
use crate::eval::{EmptyScope, evaluate};
use crate::parser::{parse_definition, strip_comment};

#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceValue {
    Constant(f64),
    Function(Arc<UserFunction>),
}

/// Constants and user functions available to equations. Names defined here
/// are never equation unknowns.
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    entries: IndexMap<String, NamespaceValue>,
    /// Raw `@unit(...)` annotations, keyed by the annotated name.
    units: IndexMap<String, String>,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    /// A namespace holding only the seeded constants.
    pub fn new() -> Self {
        let entries = CONSTANTS
            .iter()
            .map(|(name, value)| (name.to_string(), NamespaceValue::Constant(*value)))
            .collect();
        Self {
            entries,
            units: IndexMap::new(),
        }
    }

    pub fn insert_constant(&mut self, name: impl Into<String>, value: f64) {
        self.entries.insert(name.into(), NamespaceValue::Constant(value));
    }

    pub fn insert_function(&mut self, function: UserFunction) {
        self.entries
            .insert(function.name.clone(), NamespaceValue::Function(Arc::new(function)));
    }

    pub fn annotate_unit(&mut self, name: impl Into<String>, unit: impl Into<String>) {
        self.units.insert(name.into(), unit.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&NamespaceValue> {
        self.entries.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        match self.entries.get(name)? {
            NamespaceValue::Constant(value) => Some(*value),
            NamespaceValue::Function(_) => None,
        }
    }

    pub fn function(&self, name: &str) -> Option<&Arc<UserFunction>> {
        match self.entries.get(name)? {
            NamespaceValue::Function(function) => Some(function),
            NamespaceValue::Constant(_) => None,
        }
    }

    /// True for user functions and builtins.
    pub fn is_callable(&self, name: &str) -> bool {
        self.function(name).is_some() || Builtin::lookup(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unit annotation of a name, as written in the script.
    pub fn unit_annotation(&self, name: &str) -> Option<&str> {
        self.units.get(name).map(String::as_str)
    }

    /// Unit annotations of the user functions.
    pub fn function_units(&self) -> IndexMap<String, String> {
        self.units
            .iter()
            .filter(|(name, _)| self.function(name).is_some())
            .map(|(name, unit)| (name.clone(), unit.clone()))
            .collect()
    }
}

/// `@unit("m/s")`, `@unit(m/s)` or `@unit m/s` yield `m/s`.
fn parse_annotation(code: &str) -> Option<String> {
    let rest = code.trim().strip_prefix("@unit")?.trim();
    let rest = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(rest)
        .trim();
    let rest = rest.trim_matches(|c| c == '"' || c == '\'');
    Some(rest.trim().to_string())
}

/// Executes a namespace script top to bottom. Each statement is
/// `name = expr`, `name(params) = expr` or a `@unit(...)` line annotating the
/// next definition.
pub fn compile_and_exec(script: &str) -> Result<Namespace, NamespaceError> {
    let mut namespace = Namespace::new();
    let mut pending_unit: Option<(usize, String)> = None;

    for (index, text) in script.lines().enumerate() {
        let line = index + 1;
        let code = strip_comment(text);
        if code.trim().is_empty() {
            continue;
        }
        if let Some(unit) = parse_annotation(code) {
            if let Some((line, _)) = pending_unit {
                return Err(NamespaceError::DanglingAnnotation { line });
            }
            pending_unit = Some((line, unit));
            continue;
        }

        let definition = parse_definition(code, line)?;
        if let Some((_, unit)) = pending_unit.take() {
            namespace.annotate_unit(definition.name(), unit);
        }
        match definition {
            Definition::Constant { name, value } => {
                let value = evaluate(&value, &EmptyScope, &namespace)
                    .map_err(|source| NamespaceError::Eval { line, source })?;
                namespace.insert_constant(name, value);
            }
            Definition::Function { name, params, body } => {
                namespace.insert_function(UserFunction { name, params, body });
            }
        }
    }

    if let Some((line, _)) = pending_unit {
        return Err(NamespaceError::DanglingAnnotation { line });
    }
    tracing::debug!(names = namespace.len(), "namespace compiled");
    Ok(namespace)
}
