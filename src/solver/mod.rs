mod job;
mod least_squares;
mod newton;
mod plan;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use crate::errors::SolveError;
use crate::events::{Event, EventBus};
use crate::results::ResultsManager;
use crate::system::EquationSystem;

pub use job::{CancellationToken, JobOutcome, SolveJob};
pub use least_squares::LevenbergMarquardt;
pub use newton::NewtonRaphson;
pub use plan::{RunSummary, SolvePlan};

/// Relative step of the central-difference Jacobian.
const JACOBIAN_STEP: f64 = 1e-6;

/// Singular values below this are treated as zero in the SVD fallback.
const SINGULAR_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverMethod {
    #[default]
    NewtonRaphson,
    LeastSquares,
}

impl FromStr for SolverMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newton" | "newton-raphson" | "hybr" => Ok(SolverMethod::NewtonRaphson),
            "least-squares" | "lm" | "levenberg-marquardt" => Ok(SolverMethod::LeastSquares),
            other => Err(format!("unknown solver method '{other}'")),
        }
    }
}

impl fmt::Display for SolverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolverMethod::NewtonRaphson => "newton-raphson",
            SolverMethod::LeastSquares => "least-squares",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    /// Convergence threshold on the residual 2-norm.
    pub tolerance: f64,
    pub max_iter: usize,
    pub method: SolverMethod,
    /// Backtracking line search for Newton steps.
    pub damping: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iter: 500,
            method: SolverMethod::NewtonRaphson,
            damping: true,
        }
    }
}

impl SolverSettings {
    pub fn root_finder(&self) -> Box<dyn RootFinder + Send + Sync> {
        match self.method {
            SolverMethod::NewtonRaphson => Box::new(NewtonRaphson {
                tolerance: self.tolerance,
                max_iter: self.max_iter,
                damping: self.damping,
            }),
            SolverMethod::LeastSquares => Box::new(LevenbergMarquardt {
                tolerance: self.tolerance,
                max_iter: self.max_iter,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Bounds {
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: DVector::from_element(n, f64::NEG_INFINITY),
            upper: DVector::from_element(n, f64::INFINITY),
        }
    }

    pub fn clamp(&self, x: &mut DVector<f64>) {
        for (i, value) in x.iter_mut().enumerate() {
            *value = value.clamp(self.lower[i], self.upper[i]);
        }
    }
}

pub type ResidualFn<'a> = dyn FnMut(&DVector<f64>) -> Result<DVector<f64>, SolveError> + 'a;

/// Solves `F(x) = 0` for one block.
pub trait RootFinder {
    fn find_root(
        &self,
        residual: &mut ResidualFn<'_>,
        x0: DVector<f64>,
        bounds: &Bounds,
    ) -> Result<DVector<f64>, SolveError>;
}

fn evaluate_finite(residual: &mut ResidualFn<'_>, x: &DVector<f64>) -> Result<DVector<f64>, SolveError> {
    let f = residual(x)?;
    if f.iter().all(|v| v.is_finite()) {
        Ok(f)
    } else {
        Err(SolveError::NonFiniteResidual)
    }
}

/// Central differences, falling back to one-sided differences where a
/// central probe is not finite.
fn numerical_jacobian(
    residual: &mut ResidualFn<'_>,
    x: &DVector<f64>,
    f0: &DVector<f64>,
) -> Result<DMatrix<f64>, SolveError> {
    let mut jacobian = DMatrix::zeros(f0.len(), x.len());
    for j in 0..x.len() {
        let h = JACOBIAN_STEP * x[j].abs().max(1.0);
        let mut forward = x.clone();
        forward[j] += h;
        let mut backward = x.clone();
        backward[j] -= h;

        let f_forward = residual(&forward)?;
        let f_backward = residual(&backward)?;
        let finite = |v: &DVector<f64>| v.iter().all(|e| e.is_finite());
        let column = match (finite(&f_forward), finite(&f_backward)) {
            (true, true) => (f_forward - f_backward) / (2.0 * h),
            (true, false) => (f_forward - f0) / h,
            (false, true) => (f0 - f_backward) / h,
            (false, false) => return Err(SolveError::NonFiniteResidual),
        };
        jacobian.set_column(j, &column);
    }
    Ok(jacobian)
}

/// Solves `a * x = b`, through LU when `a` is square and regular, otherwise
/// through the SVD pseudo-inverse.
fn solve_linear(a: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, SolveError> {
    if a.is_square() {
        if let Some(x) = a.clone().lu().solve(b) {
            if x.iter().all(|v| v.is_finite()) {
                return Ok(x);
            }
        }
    }
    a.svd(true, true)
        .solve(b, SINGULAR_EPS)
        .map_err(|message| SolveError::SingularJacobian(message.to_string()))
}

/// Synchronous solving against a live system, reporting through events.
#[derive(Debug, Default)]
pub struct Solver {
    settings: SolverSettings,
    events: EventBus,
}

impl Solver {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            events: EventBus::new(),
        }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SolverSettings {
        &mut self.settings
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.events.subscribe(listener);
    }

    /// Solves every grid point into a new results entry and returns the
    /// entry name. Rows committed before a failure stay in the entry.
    pub fn solve(
        &mut self,
        system: &EquationSystem,
        results: &mut ResultsManager,
        cancel: &CancellationToken,
    ) -> Result<String, SolveError> {
        let start = Instant::now();
        let plan = match SolvePlan::build(system, &self.settings) {
            Ok(plan) => plan,
            Err(error) => {
                report_error(&mut self.events, &error);
                return Err(error);
            }
        };

        let name = results.create_entry(plan.variable_names());
        let entry = results
            .entry_mut(&name)
            .ok_or_else(|| crate::errors::ResultsError::UnknownEntry(name.clone()))?;

        match plan.run(entry, cancel, &mut self.events) {
            Ok(summary) => {
                self.events.status(format!(
                    "Finished {} run(s) in {:.2} seconds",
                    summary.runs,
                    start.elapsed().as_secs_f64()
                ));
                Ok(name)
            }
            Err(error) => {
                report_error(&mut self.events, &error);
                self.events.status(format!(
                    "Failed after {:.2} seconds",
                    start.elapsed().as_secs_f64()
                ));
                Err(error)
            }
        }
    }
}

pub(crate) fn report_error(events: &mut EventBus, error: &SolveError) {
    tracing::warn!(%error, "solve failed");
    events.publish(&Event::SolveError {
        message: error.to_string(),
        tags: vec!["Output".to_string()],
    });
}
