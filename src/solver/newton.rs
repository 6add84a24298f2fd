use nalgebra::DVector;

use super::{Bounds, ResidualFn, RootFinder, evaluate_finite, numerical_jacobian, solve_linear};
use crate::errors::SolveError;

/// Step halvings tried by the line search before taking the best candidate.
const MAX_BACKTRACKS: usize = 10;

/// Newton-Raphson with a numerical Jacobian, optional backtracking and
/// projection onto the variable bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonRaphson {
    pub tolerance: f64,
    pub max_iter: usize,
    pub damping: bool,
}

impl NewtonRaphson {
    /// Largest fraction of `step` (1, 1/2, 1/4, ...) that lowers the
    /// residual norm, or the best finite candidate if none does.
    fn line_search(
        &self,
        residual: &mut ResidualFn<'_>,
        x: &DVector<f64>,
        step: &DVector<f64>,
        norm: f64,
        bounds: &Bounds,
    ) -> Result<(DVector<f64>, DVector<f64>), SolveError> {
        let mut best: Option<(DVector<f64>, DVector<f64>, f64)> = None;
        let mut lambda = 1.0;
        for _ in 0..=MAX_BACKTRACKS {
            let mut candidate = x - step * lambda;
            bounds.clamp(&mut candidate);
            if let Ok(f) = evaluate_finite(residual, &candidate) {
                let candidate_norm = f.norm();
                if candidate_norm < norm {
                    return Ok((candidate, f));
                }
                if best.as_ref().is_none_or(|(_, _, best_norm)| candidate_norm < *best_norm) {
                    best = Some((candidate, f, candidate_norm));
                }
            }
            lambda *= 0.5;
        }
        best.map(|(x, f, _)| (x, f)).ok_or(SolveError::NonFiniteResidual)
    }
}

impl RootFinder for NewtonRaphson {
    fn find_root(
        &self,
        residual: &mut ResidualFn<'_>,
        x0: DVector<f64>,
        bounds: &Bounds,
    ) -> Result<DVector<f64>, SolveError> {
        let mut x = x0;
        bounds.clamp(&mut x);
        let mut f = evaluate_finite(residual, &x)?;
        let mut norm = f.norm();
        if norm < self.tolerance {
            return Ok(x);
        }

        for iter in 0..self.max_iter {
            let _span = tracing::debug_span!("newton_iter", iter).entered();

            let jacobian = numerical_jacobian(residual, &x, &f)?;
            let step = solve_linear(jacobian, &f)?;

            let (x_new, f_new) = if self.damping {
                self.line_search(residual, &x, &step, norm, bounds)?
            } else {
                let mut candidate = &x - &step;
                bounds.clamp(&mut candidate);
                let f_new = evaluate_finite(residual, &candidate)?;
                (candidate, f_new)
            };
            x = x_new;
            f = f_new;
            norm = f.norm();
            tracing::trace!(norm, "residual");

            if norm < self.tolerance {
                tracing::debug!(iterations = iter + 1, "Newton converged");
                return Ok(x);
            }
        }

        Err(SolveError::NotConverged {
            iterations: self.max_iter,
            residual_norm: norm,
        })
    }
}
