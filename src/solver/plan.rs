use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use nalgebra::DVector;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use super::{Bounds, CancellationToken, SolverSettings};
use crate::ast::Expr;
use crate::errors::SolveError;
use crate::eval::evaluate;
use crate::events::EventBus;
use crate::namespace::Namespace;
use crate::residual::{Binding, Bindings, Residual};
use crate::results::ResultsEntry;
use crate::system::EquationSystem;

#[derive(Debug, Clone)]
struct PlannedBlock {
    residuals: Vec<Residual>,
    unknowns: Vec<String>,
}

#[derive(Debug, Clone)]
struct PlannedVariable {
    name: String,
    starting_guess: f64,
    lower_bound: f64,
    upper_bound: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub runs: usize,
    pub blocks: usize,
}

/// An immutable snapshot of everything a solve needs. Building it checks
/// the system; running it touches nothing but the results entry, so it can
/// move to another thread.
#[derive(Debug, Clone)]
pub struct SolvePlan {
    revision: u64,
    settings: SolverSettings,
    namespace: Arc<Namespace>,
    blocks: Vec<PlannedBlock>,
    variables: Vec<PlannedVariable>,
    /// Active parameter values in evaluation order.
    parameters: Vec<(String, Expr)>,
    grid: Vec<IndexMap<String, f64>>,
}

/// Knowns of the current run plus the unknowns of one block.
struct RunBindings<'a> {
    known: &'a HashMap<String, f64>,
    unknowns: &'a [String],
}

impl Bindings for RunBindings<'_> {
    fn bind(&self, name: &str) -> Option<Binding> {
        if let Some(index) = self.unknowns.iter().position(|unknown| unknown == name) {
            return Some(Binding::Unknown(index));
        }
        self.known.get(name).copied().map(Binding::Known)
    }
}

impl SolvePlan {
    /// Fails with [`SolveError::InvalidSystem`] unless the system validates.
    pub fn build(system: &EquationSystem, settings: &SolverSettings) -> Result<Self, SolveError> {
        let report = system.validate_equation_system();
        if !report.valid {
            return Err(SolveError::InvalidSystem(report.messages()));
        }

        let blocks = report
            .blocks
            .into_iter()
            .filter(|block| block.status.is_solvable())
            .map(|block| PlannedBlock {
                residuals: block
                    .equations
                    .iter()
                    .filter_map(|id| system.equation(id))
                    .map(|equation| equation.residual().clone())
                    .collect(),
                unknowns: block.unknowns,
            })
            .collect();

        let variables = system
            .variables()
            .map(|variable| PlannedVariable {
                name: variable.name().to_string(),
                starting_guess: variable.starting_guess(),
                lower_bound: variable.lower_bound(),
                upper_bound: variable.upper_bound(),
            })
            .collect();

        Ok(Self {
            revision: system.revision(),
            settings: settings.clone(),
            namespace: Arc::clone(system.namespace()),
            blocks,
            variables,
            parameters: parameter_order(system)?,
            grid: system.grid().get_grid(),
        })
    }

    /// False once the system has changed since the plan was built.
    pub fn is_current(&self, system: &EquationSystem) -> bool {
        self.revision == system.revision()
    }

    pub fn ensure_current(&self, system: &EquationSystem) -> Result<(), SolveError> {
        if self.is_current(system) {
            Ok(())
        } else {
            Err(SolveError::StalePlan)
        }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Result columns, in system variable order.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|variable| variable.name.clone()).collect()
    }

    pub fn run_count(&self) -> usize {
        self.grid.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Solves every grid point, committing one row per point. On error or
    /// cancellation the current row is discarded and earlier rows are kept.
    pub fn run(
        &self,
        entry: &mut ResultsEntry,
        cancel: &CancellationToken,
        events: &mut EventBus,
    ) -> Result<RunSummary, SolveError> {
        let _span = tracing::info_span!("solve", runs = self.grid.len(), blocks = self.blocks.len()).entered();
        for (run, point) in self.grid.iter().enumerate() {
            let outcome = self.run_point(run, point, entry, cancel, events);
            if let Err(error) = outcome {
                entry.discard();
                return Err(error);
            }
        }
        tracing::info!(rows = entry.row_count(), "solve finished");
        Ok(RunSummary {
            runs: self.grid.len(),
            blocks: self.blocks.len(),
        })
    }

    fn run_point(
        &self,
        run: usize,
        point: &IndexMap<String, f64>,
        entry: &mut ResultsEntry,
        cancel: &CancellationToken,
        events: &mut EventBus,
    ) -> Result<(), SolveError> {
        if cancel.is_cancelled() {
            return Err(SolveError::Cancelled);
        }
        let mut known: HashMap<String, f64> = point.iter().map(|(name, value)| (name.clone(), *value)).collect();
        for (name, value) in &self.parameters {
            let value = evaluate(value, &known, &self.namespace).map_err(|source| SolveError::Parameter {
                name: name.clone(),
                source,
            })?;
            known.insert(name.clone(), value);
        }

        let finder = self.settings.root_finder();
        for (index, block) in self.blocks.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SolveError::Cancelled);
            }
            events.status(format!(
                "Solving run {}/{}, block {}/{}",
                run + 1,
                self.grid.len(),
                index + 1,
                self.blocks.len()
            ));
            let bindings = RunBindings {
                known: &known,
                unknowns: &block.unknowns,
            };
            let compiled = block
                .residuals
                .iter()
                .map(|residual| residual.compile(&bindings, &self.namespace))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| SolveError::from(error).in_block(run, index))?;

            if block.unknowns.is_empty() {
                let residuals = compiled
                    .iter()
                    .map(|equation| equation.eval(&[], &self.namespace))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|error| SolveError::from(error).in_block(run, index))?;
                let residual_norm = DVector::from_vec(residuals).norm();
                if !residual_norm.is_finite() || residual_norm >= self.settings.tolerance {
                    return Err(SolveError::Inconsistent { residual_norm }.in_block(run, index));
                }
                continue;
            }
            tracing::debug!(run, block = index, unknowns = ?block.unknowns, "solving block");

            let (x0, bounds) = self.initial_state(&block.unknowns);
            let namespace = &self.namespace;
            let mut residual = |x: &DVector<f64>| -> Result<DVector<f64>, SolveError> {
                let values = compiled
                    .iter()
                    .map(|equation| equation.eval(x.as_slice(), namespace))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DVector::from_vec(values))
            };
            let solution = finder
                .find_root(&mut residual, x0, &bounds)
                .map_err(|error| error.in_block(run, index))?;

            for (name, value) in block.unknowns.iter().zip(solution.iter()) {
                known.insert(name.clone(), *value);
            }
        }

        for name in &self.variables {
            if let Some(value) = known.get(&name.name) {
                entry.stage(&name.name, *value)?;
            }
        }
        entry.commit()?;
        Ok(())
    }

    fn initial_state(&self, unknowns: &[String]) -> (DVector<f64>, Bounds) {
        let mut bounds = Bounds::unbounded(unknowns.len());
        let mut x0 = DVector::from_element(unknowns.len(), 1.0);
        for (i, name) in unknowns.iter().enumerate() {
            if let Some(variable) = self.variables.iter().find(|variable| &variable.name == name) {
                x0[i] = variable.starting_guess;
                bounds.lower[i] = variable.lower_bound;
                bounds.upper[i] = variable.upper_bound;
            }
        }
        (x0, bounds)
    }
}

/// Active parameters ordered so each comes after the parameters it uses.
fn parameter_order(system: &EquationSystem) -> Result<Vec<(String, Expr)>, SolveError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let nodes: HashMap<&str, _> = system
        .parameters()
        .map(|parameter| (parameter.name(), graph.add_node(parameter.name())))
        .collect();
    for parameter in system.parameters() {
        for dependency in parameter.dependencies() {
            if let Some(&from) = nodes.get(dependency) {
                graph.add_edge(from, nodes[parameter.name()], ());
            }
        }
    }
    let order = toposort(&graph, None)
        .map_err(|cycle| SolveError::ParameterCycle(graph[cycle.node_id()].to_string()))?;
    Ok(order
        .into_iter()
        .filter_map(|node| system.parameter(graph[node]))
        .map(|parameter| (parameter.name().to_string(), parameter.value().clone()))
        .collect())
}
