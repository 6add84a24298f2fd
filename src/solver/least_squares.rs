use nalgebra::DVector;

use super::{Bounds, ResidualFn, RootFinder, evaluate_finite, numerical_jacobian, solve_linear};
use crate::errors::SolveError;

const INITIAL_LAMBDA: f64 = 1e-3;
const MAX_LAMBDA: f64 = 1e16;

/// Bounded Levenberg-Marquardt minimising `|F(x)|`. Converges only when the
/// residual norm falls below the tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct LevenbergMarquardt {
    pub tolerance: f64,
    pub max_iter: usize,
}

impl RootFinder for LevenbergMarquardt {
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

        let mut lambda = INITIAL_LAMBDA;
        let mut jacobian = numerical_jacobian(residual, &x, &f)?;

        for iter in 0..self.max_iter {
            let _span = tracing::debug_span!("lm_iter", iter, lambda).entered();

            let jt = jacobian.transpose();
            let gradient = &jt * &f;
            let mut damped = &jt * &jacobian;
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * (1.0 + damped[(i, i)]);
            }
            let step = solve_linear(damped, &gradient)?;

            let mut candidate = &x - &step;
            bounds.clamp(&mut candidate);
            match evaluate_finite(residual, &candidate) {
                Ok(f_new) if f_new.norm() < norm => {
                    x = candidate;
                    f = f_new;
                    norm = f.norm();
                    if norm < self.tolerance {
                        tracing::debug!(iterations = iter + 1, "Levenberg-Marquardt converged");
                        return Ok(x);
                    }
                    lambda = (lambda / 10.0).max(f64::EPSILON);
                    jacobian = numerical_jacobian(residual, &x, &f)?;
                }
                _ => {
                    lambda *= 10.0;
                    if lambda > MAX_LAMBDA {
                        break;
                    }
                }
            }
        }

        Err(SolveError::NotConverged {
            iterations: self.max_iter,
            residual_norm: norm,
        })
    }
}
