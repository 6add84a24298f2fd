use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::blocking::{Block, decompose};
use crate::cache::DEFAULT_CAPACITY;
use crate::errors::{NamespaceError, SystemError, UnitError};
use crate::events::{Event, EventBus};
use crate::grid::Grid;
use crate::namespace::{Namespace, compile_and_exec};
use crate::objects::{Equation, Factory, Function, Parameter, Variable, VariableAttribute};
use crate::refcount::{RefCounter, Transition};
use crate::units::{Unit, UnitRegistry};
use crate::validate::{UnitLookup, validate_units};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Valid,
    /// Every name is a fixed input such as a parameter or grid value. The
    /// block is only checked for consistency when solving.
    Determined,
    OverDetermined,
    UnderDetermined,
}

impl BlockStatus {
    pub fn is_solvable(self) -> bool {
        matches!(self, BlockStatus::Valid | BlockStatus::Determined)
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockStatus::Valid => "valid",
            BlockStatus::Determined => "determined",
            BlockStatus::OverDetermined => "over-determined",
            BlockStatus::UnderDetermined => "under-determined",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockReport {
    pub status: BlockStatus,
    pub equations: Vec<String>,
    /// Unknowns first determined by this block, sorted.
    pub unknowns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemReport {
    pub blocks: Vec<BlockReport>,
    /// Unit warnings keyed by equation id.
    pub unit_warnings: IndexMap<String, Vec<String>>,
    pub grid_errors: Vec<String>,
    pub parameter_errors: Vec<String>,
    pub function_errors: Vec<String>,
    pub valid: bool,
}

impl SystemReport {
    /// Every problem as one line of text.
    pub fn messages(&self) -> Vec<String> {
        let blocks = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| !block.status.is_solvable())
            .map(|(i, block)| {
                format!(
                    "block {} is {}: {} equation(s) [{}], {} unknown(s) [{}]",
                    i + 1,
                    block.status,
                    block.equations.len(),
                    block.equations.join("; "),
                    block.unknowns.len(),
                    block.unknowns.join(", ")
                )
            });
        blocks
            .chain(self.unit_warnings.values().flatten().cloned())
            .chain(self.grid_errors.iter().cloned())
            .chain(self.parameter_errors.iter().cloned())
            .chain(self.function_errors.iter().cloned())
            .collect()
    }
}

/// The live equation system: equations, parameters and the variables they
/// imply, kept consistent under incremental edits.
///
/// Names referenced by equations and parameters are reference counted. A
/// referenced name is a [`Variable`] unless a parameter or the namespace
/// defines it.
pub struct EquationSystem {
    registry: UnitRegistry,
    factory: Factory,
    namespace: Arc<Namespace>,
    equations: IndexMap<String, Equation>,
    /// Every definition of a parameter name; the last one is active.
    parameters: IndexMap<String, Vec<Parameter>>,
    /// Number of `p = <expr>` equations per target name.
    parameter_equations: HashMap<String, usize>,
    variables: IndexMap<String, Variable>,
    functions: IndexMap<String, Function>,
    object_counter: RefCounter<Variable>,
    function_counter: RefCounter,
    grid: Grid,
    revision: u64,
    events: EventBus,
}

impl Default for EquationSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EquationSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquationSystem")
            .field("equations", &self.equations.len())
            .field("parameters", &self.parameters.len())
            .field("variables", &self.variables.len())
            .field("functions", &self.functions.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl EquationSystem {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            registry: UnitRegistry::default(),
            factory: Factory::new(capacity),
            namespace: Arc::new(Namespace::new()),
            equations: IndexMap::new(),
            parameters: IndexMap::new(),
            parameter_equations: HashMap::new(),
            variables: IndexMap::new(),
            functions: IndexMap::new(),
            object_counter: RefCounter::new(),
            function_counter: RefCounter::new(),
            grid: Grid::new(),
            revision: 0,
            events: EventBus::new(),
        }
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.events.subscribe(listener);
    }

    /// Incremented on every change; solve plans compare against it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn equations(&self) -> impl Iterator<Item = &Equation> {
        self.equations.values()
    }

    pub fn equation(&self, id: &str) -> Option<&Equation> {
        self.equations.get(id)
    }

    pub fn equation_count(&self) -> usize {
        self.equations.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variable_names(&self) -> BTreeSet<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Active (most recent) definition of each parameter.
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values().filter_map(|definitions| definitions.last())
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)?.last()
    }

    pub fn parameter_definitions(&self, name: &str) -> &[Parameter] {
        self.parameters.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn parameter_equation_count(&self, name: &str) -> usize {
        self.parameter_equations.get(name).copied().unwrap_or(0)
    }

    /// Referenced names, with multiplicity across equations and parameters.
    pub fn reference_count(&self, name: &str) -> usize {
        self.object_counter.count(name)
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.parameters.contains_key(name) || self.namespace.contains(name)
    }

    fn changed(&mut self) {
        self.revision += 1;
        self.events.publish(&Event::DataChanged);
    }

    fn reference_object(&mut self, name: &str, payload: Option<Variable>) {
        if let Transition::Added = self.object_counter.insert(name, payload) {
            if !self.is_shadowed(name) {
                self.add_variable(name);
            }
        }
    }

    fn release_object(&mut self, name: &str) {
        if let Transition::Removed(_) = self.object_counter.delete(name) {
            self.remove_variable(name);
        }
    }

    fn add_variable(&mut self, name: &str) {
        let proposed = self.object_counter.payload(name).cloned();
        let variable = self.factory.create_variable(name, proposed);
        tracing::trace!(variable = name, "variable added");
        self.variables.insert(name.to_string(), variable);
    }

    fn remove_variable(&mut self, name: &str) {
        if let Some(variable) = self.variables.shift_remove(name) {
            tracing::trace!(variable = name, "variable removed");
            self.factory.retire_variable(variable);
        }
    }

    fn reference_function(&mut self, name: &str) {
        if let Transition::Added = self.function_counter.insert(name, None) {
            let function = self.factory.create_function(name);
            self.functions.insert(name.to_string(), function);
        }
    }

    fn release_function(&mut self, name: &str) {
        if let Transition::Removed(_) = self.function_counter.delete(name) {
            if let Some(function) = self.functions.shift_remove(name) {
                self.factory.retire_function(function);
            }
        }
    }

    /// Adds an equation. `implied_variables` seed the attributes of names
    /// that become variables for the first time.
    pub fn insert_equation(
        &mut self,
        equation: Equation,
        implied_variables: Vec<Variable>,
    ) -> Result<(), SystemError> {
        if self.equations.contains_key(equation.id()) {
            return Err(SystemError::DuplicateEquation(equation.id().to_string()));
        }
        let mut implied: HashMap<String, Variable> = implied_variables
            .into_iter()
            .map(|variable| (variable.name().to_string(), variable))
            .collect();

        if let Some(target) = equation.parameter_target() {
            *self.parameter_equations.entry(target.to_string()).or_insert(0) += 1;
        }
        for name in equation.variable_names() {
            self.reference_object(name, implied.remove(name));
        }
        for name in equation.function_names() {
            self.reference_function(name);
        }
        tracing::debug!(equation = equation.id(), "equation inserted");
        self.equations.insert(equation.id().to_string(), equation);
        self.changed();
        Ok(())
    }

    pub fn delete_equation(&mut self, id: &str) -> Result<Equation, SystemError> {
        let equation = self
            .equations
            .shift_remove(id)
            .ok_or_else(|| SystemError::UnknownEquation(id.to_string()))?;

        if let Some(target) = equation.parameter_target() {
            if let Some(count) = self.parameter_equations.get_mut(target) {
                *count -= 1;
                if *count == 0 {
                    self.parameter_equations.remove(target);
                }
            }
        }
        for name in equation.variable_names() {
            self.release_object(name);
        }
        for name in equation.function_names() {
            self.release_function(name);
        }
        tracing::debug!(equation = id, "equation deleted");
        self.changed();
        Ok(equation)
    }

    /// Adds a parameter definition. A name may be defined several times;
    /// the most recent definition is active.
    pub fn insert_parameter(&mut self, parameter: Parameter) {
        let names: Vec<String> = parameter.variable_names().iter().cloned().collect();
        let functions: Vec<String> = parameter.function_names().iter().cloned().collect();
        let name = parameter.name().to_string();

        self.parameters.entry(name.clone()).or_default().push(parameter);
        for referenced in &names {
            self.reference_object(referenced, None);
        }
        for function in &functions {
            self.reference_function(function);
        }
        self.sync_variables();
        tracing::debug!(parameter = %name, "parameter inserted");
        self.changed();
    }

    /// Removes the most recent definition of `name`.
    pub fn delete_parameter(&mut self, name: &str) -> Result<Parameter, SystemError> {
        let definitions = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| SystemError::UnknownParameter(name.to_string()))?;
        let parameter = definitions
            .pop()
            .ok_or_else(|| SystemError::UnknownParameter(name.to_string()))?;
        self.finish_parameter_removal(parameter)
    }

    /// Removes the most recent definition of `name` whose source text is
    /// `source_text`, leaving other definitions in place.
    pub fn retract_parameter(&mut self, name: &str, source_text: &str) -> Result<Parameter, SystemError> {
        let definitions = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| SystemError::UnknownParameter(name.to_string()))?;
        let index = definitions
            .iter()
            .rposition(|parameter| parameter.source_text() == source_text)
            .ok_or_else(|| SystemError::UnknownParameter(name.to_string()))?;
        let parameter = definitions.remove(index);
        self.finish_parameter_removal(parameter)
    }

    fn finish_parameter_removal(&mut self, parameter: Parameter) -> Result<Parameter, SystemError> {
        let name = parameter.name();
        if self.parameters.get(name).is_some_and(Vec::is_empty) {
            self.parameters.shift_remove(name);
        }
        for referenced in parameter.variable_names() {
            self.release_object(referenced);
        }
        for function in parameter.function_names() {
            self.release_function(function);
        }
        self.sync_variables();
        tracing::debug!(parameter = name, "parameter deleted");
        self.changed();
        Ok(parameter)
    }

    pub fn set_namespace(&mut self, namespace: Namespace) {
        self.namespace = Arc::new(namespace);
        self.sync_variables();
        self.changed();
    }

    /// Compiles `script` and installs it. On failure the previous namespace
    /// stays in effect.
    pub fn compile_namespace(&mut self, script: &str) -> Result<(), NamespaceError> {
        match compile_and_exec(script) {
            Ok(namespace) => {
                self.set_namespace(namespace);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "namespace script rejected");
                Err(error)
            }
        }
    }

    /// Variables are exactly the referenced names not defined by a
    /// parameter or the namespace.
    pub fn sync_variables(&mut self) {
        let referenced: Vec<String> = self.object_counter.names().map(str::to_string).collect();
        for name in referenced {
            let shadowed = self.is_shadowed(&name);
            let present = self.variables.contains_key(&name);
            if shadowed && present {
                self.remove_variable(&name);
            } else if !shadowed && !present {
                self.add_variable(&name);
            }
        }
    }

    pub fn update_variable(&mut self, name: &str, attribute: VariableAttribute) -> Result<(), SystemError> {
        let variable = self
            .variables
            .get_mut(name)
            .ok_or_else(|| SystemError::UnknownVariable(name.to_string()))?;
        let kind = attribute.kind();
        variable.apply(attribute)?;
        self.revision += 1;
        self.events.publish(&Event::AttributeUpdated {
            name: name.to_string(),
            attribute: kind,
        });
        Ok(())
    }

    /// Parses `unit` with the system registry and assigns it to a variable.
    /// An empty string clears the unit.
    pub fn set_variable_unit(&mut self, name: &str, unit: &str) -> Result<(), SystemError> {
        let unit = self.parse_optional_unit(unit)?;
        self.update_variable(name, VariableAttribute::Unit(unit))
    }

    pub fn update_function(&mut self, name: &str, unit: Option<Unit>) -> Result<(), SystemError> {
        let function = self
            .functions
            .get_mut(name)
            .ok_or_else(|| SystemError::UnknownFunction(name.to_string()))?;
        function.unit = unit;
        self.revision += 1;
        self.events.publish(&Event::DataChanged);
        Ok(())
    }

    /// Sets the unit of the active definition of a parameter.
    pub fn update_parameter(&mut self, name: &str, unit: Option<Unit>) -> Result<(), SystemError> {
        let parameter = self
            .parameters
            .get_mut(name)
            .and_then(|definitions| definitions.last_mut())
            .ok_or_else(|| SystemError::UnknownParameter(name.to_string()))?;
        parameter.set_unit(unit);
        self.revision += 1;
        self.events.publish(&Event::DataChanged);
        Ok(())
    }

    pub fn parse_optional_unit(&self, text: &str) -> Result<Option<Unit>, UnitError> {
        if text.trim().is_empty() {
            Ok(None)
        } else {
            self.registry.parse_unit(text).map(Some)
        }
    }

    /// Sweeps `name` over `values`. Parameter names cannot be swept.
    pub fn assign_grid(&mut self, name: &str, values: Vec<f64>) -> Result<(), SystemError> {
        if self.parameters.contains_key(name) || self.parameter_equation_count(name) > 0 {
            return Err(SystemError::GridParameterCollision(name.to_string()));
        }
        self.grid.assign(name, values);
        self.changed();
        Ok(())
    }

    pub fn remove_grid(&mut self, name: &str) -> Result<Vec<f64>, SystemError> {
        let values = self
            .grid
            .remove(name)
            .ok_or_else(|| SystemError::UnknownGridVariable(name.to_string()))?;
        self.changed();
        Ok(values)
    }

    /// Unknowns still to be solved for: live variables not fixed by the grid.
    pub fn is_unknown(&self, name: &str) -> bool {
        self.variables.contains_key(name) && !self.grid.contains(name)
    }

    pub fn blocking(&self) -> Vec<Block> {
        decompose(
            self.equations
                .values()
                .map(|equation| (equation.id(), equation.variable_names())),
            |name| self.is_unknown(name),
        )
    }

    /// Unit warnings for one equation.
    pub fn validate_equation(&self, id: &str) -> Result<Vec<String>, SystemError> {
        let equation = self
            .equations
            .get(id)
            .ok_or_else(|| SystemError::UnknownEquation(id.to_string()))?;
        Ok(validate_units(equation.tree(), self))
    }

    /// Full structural and unit check. Pure: repeated calls on an unchanged
    /// system give the same report.
    pub fn validate_equation_system(&self) -> SystemReport {
        let mut report = SystemReport::default();

        let mut solved: BTreeSet<&str> = self.grid.names().collect();
        // Unknowns produced by earlier blocks, as opposed to grid inputs.
        let mut from_blocks: BTreeSet<&str> = BTreeSet::new();
        for block in self.blocking() {
            let mut unknowns: BTreeSet<&str> = BTreeSet::new();
            let mut reuses_block_output = false;
            for id in &block.equations {
                if let Some(equation) = self.equations.get(id) {
                    for name in equation.variable_names().iter().map(String::as_str) {
                        if !self.variables.contains_key(name) {
                            continue;
                        }
                        if !solved.contains(name) {
                            unknowns.insert(name);
                        } else if from_blocks.contains(name) {
                            reuses_block_output = true;
                        }
                    }
                }
            }
            let status = if unknowns.is_empty() && !reuses_block_output {
                BlockStatus::Determined
            } else {
                match block.equations.len().cmp(&unknowns.len()) {
                    std::cmp::Ordering::Equal => BlockStatus::Valid,
                    std::cmp::Ordering::Greater => BlockStatus::OverDetermined,
                    std::cmp::Ordering::Less => BlockStatus::UnderDetermined,
                }
            };
            solved.extend(unknowns.iter().copied());
            from_blocks.extend(unknowns.iter().copied());
            report.blocks.push(BlockReport {
                status,
                equations: block.equations,
                unknowns: unknowns.into_iter().map(str::to_string).collect(),
            });
        }

        for equation in self.equations.values() {
            let warnings = validate_units(equation.tree(), self);
            if !warnings.is_empty() {
                tracing::warn!(equation = equation.id(), count = warnings.len(), "unit warnings");
                report.unit_warnings.insert(equation.id().to_string(), warnings);
            }
        }

        for name in self.grid.names() {
            if !self.variables.contains_key(name) {
                report
                    .grid_errors
                    .push(format!("grid variable '{name}' is not a variable of the system"));
            }
            if self.parameters.contains_key(name) || self.parameter_equation_count(name) > 0 {
                report
                    .grid_errors
                    .push(format!("grid variable '{name}' collides with a parameter"));
            }
        }

        for (name, definitions) in &self.parameters {
            if let Some(active) = definitions.last() {
                let distinct: BTreeSet<String> = definitions
                    .iter()
                    .map(|parameter| parameter.value().to_string())
                    .collect();
                if distinct.len() > 1 {
                    report
                        .parameter_errors
                        .push(format!("parameter '{name}' has conflicting definitions"));
                }
                for dependency in active.dependencies() {
                    if self.is_unknown(dependency) {
                        report.parameter_errors.push(format!(
                            "parameter '{name}' depends on unknown '{dependency}'"
                        ));
                    }
                }
            }
        }

        let called = self
            .equations
            .values()
            .flat_map(|equation| equation.function_names())
            .chain(self.parameters().flat_map(|parameter| parameter.function_names()));
        let undefined: BTreeSet<&String> = called.filter(|name| !self.namespace.is_callable(name)).collect();
        report.function_errors = undefined
            .into_iter()
            .map(|name| format!("function '{name}' is not defined"))
            .collect();

        report.valid = report.blocks.iter().all(|block| block.status.is_solvable())
            && report.unit_warnings.is_empty()
            && report.grid_errors.is_empty()
            && report.parameter_errors.is_empty()
            && report.function_errors.is_empty();
        report
    }
}

impl UnitLookup for EquationSystem {
    fn name_unit(&self, name: &str) -> Option<Unit> {
        if let Some(variable) = self.variables.get(name) {
            return variable.unit().cloned();
        }
        if let Some(parameter) = self.parameter(name) {
            return parameter.unit().cloned();
        }
        let annotation = self.namespace.unit_annotation(name)?;
        self.registry.parse_unit(annotation).ok()
    }

    fn function_unit(&self, name: &str) -> Option<Result<Unit, UnitError>> {
        if let Some(unit) = self.functions.get(name).and_then(|function| function.unit.clone()) {
            return Some(Ok(unit));
        }
        self.namespace
            .function(name)
            .and_then(|_| self.namespace.unit_annotation(name))
            .map(|annotation| self.registry.parse_unit(annotation))
    }
}
