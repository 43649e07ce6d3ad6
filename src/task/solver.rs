//! Solver

use crate::task::{Coefficients, ComputeTask, Roots};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Turns a task into a result.
///
/// Implementations hold no shared mutable state: consumers call `solve`
/// concurrently on the same solver without any synchronization.
pub trait Solver: Send + Sync {
    /// Task type accepted by the solver
    type Task: Send;
    /// Result type produced by the solver
    type Output: Send;

    /// Solve a single task
    fn solve(&self, task: &Self::Task) -> crate::Result<Self::Output>;
}

/// Real-root solver for quadratic equations
#[derive(Debug, Clone, Copy)]
pub struct QuadraticSolver {
    epsilon: f64,
}

impl QuadraticSolver {
    /// Create a solver that treats values below `epsilon` as zero
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    fn is_zero(&self, value: f64) -> bool {
        value.abs() < self.epsilon
    }

    /// Linear case `b*x + c = 0`
    fn solve_linear(&self, b: f64, c: f64) -> Roots {
        if self.is_zero(b) {
            if self.is_zero(c) {
                Roots::Infinite
            } else {
                Roots::NoSolution
            }
        } else {
            Roots::One { root: -c / b }
        }
    }
}

impl Default for QuadraticSolver {
    fn default() -> Self {
        Self::new(f64::EPSILON)
    }
}

impl Solver for QuadraticSolver {
    type Task = Coefficients;
    type Output = Roots;

    fn solve(&self, task: &Coefficients) -> crate::Result<Roots> {
        let Coefficients { a, b, c } = *task;
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(crate::PipelineError::SolverFailed(format!(
                "non-finite coefficients {task}"
            )));
        }

        // Roots don't change when all coefficients are scaled together, and
        // with every magnitude at most 1 the discriminant cannot overflow.
        let scale = a.abs().max(b.abs()).max(c.abs());
        let (sa, sb, sc) = if scale > 0.0 {
            (a / scale, b / scale, c / scale)
        } else {
            (a, b, c)
        };

        let discriminant = sb * sb - 4.0 * sa * sc;
        if discriminant < 0.0 {
            return Ok(Roots::NoSolution);
        }

        if self.is_zero(a) {
            return Ok(self.solve_linear(b, c));
        }

        let roots = if discriminant > 0.0 {
            // q never cancels, so the smaller root stays accurate
            let q = -0.5 * (sb + sb.signum() * discriminant.sqrt());
            let r1 = q / sa;
            let r2 = sc / q;
            let (low, high) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
            Roots::Two { low, high }
        } else {
            Roots::One {
                root: -sb / (2.0 * sa),
            }
        };

        let finite = match roots {
            Roots::Two { low, high } => low.is_finite() && high.is_finite(),
            Roots::One { root } => root.is_finite(),
            _ => true,
        };
        if !finite {
            return Err(crate::PipelineError::SolverFailed(format!(
                "roots of {task} are out of range"
            )));
        }
        Ok(roots)
    }
}

/// Stand-in for a slow remote service that squares integers
#[derive(Debug, Clone, Copy)]
pub struct SquareSolver {
    latency: Duration,
}

impl SquareSolver {
    /// Create a solver that takes `latency` per call
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// Simulated latency per call
    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Default for SquareSolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl Solver for SquareSolver {
    type Task = ComputeTask;
    type Output = i64;

    fn solve(&self, task: &ComputeTask) -> crate::Result<i64> {
        if !self.latency.is_zero() {
            debug!("Computing {} (latency {:?})", task, self.latency);
            thread::sleep(self.latency);
        }

        task.value.checked_mul(task.value).ok_or_else(|| {
            crate::PipelineError::SolverFailed(format!("overflow squaring {}", task.value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve(a: f64, b: f64, c: f64) -> Roots {
        QuadraticSolver::default()
            .solve(&Coefficients::new(a, b, c))
            .unwrap()
    }

    #[test]
    fn test_two_roots_ordered() {
        assert_eq!(solve(1.0, 0.0, -4.0), Roots::Two { low: -2.0, high: 2.0 });
        assert_eq!(solve(-1.0, 0.0, 4.0), Roots::Two { low: -2.0, high: 2.0 });
    }

    #[test]
    fn test_double_root() {
        assert_eq!(solve(1.0, 2.0, 1.0), Roots::One { root: -1.0 });
    }

    #[test]
    fn test_no_real_roots() {
        assert_eq!(solve(1.0, 0.0, 1.0), Roots::NoSolution);
    }

    #[test]
    fn test_degenerate_cases() {
        assert_eq!(solve(0.0, 0.0, 0.0), Roots::Infinite);
        assert_eq!(solve(0.0, 0.0, 3.0), Roots::NoSolution);
        assert_eq!(solve(0.0, 2.0, -4.0), Roots::One { root: 2.0 });
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = QuadraticSolver::default().solve(&Coefficients::new(f64::NAN, 1.0, 1.0));
        assert!(matches!(result, Err(crate::PipelineError::SolverFailed(_))));
    }

    #[test]
    fn test_square_solver() {
        let solver = SquareSolver::new(Duration::ZERO);
        assert_eq!(solver.solve(&ComputeTask::new(1, -12)).unwrap(), 144);
        assert!(solver.solve(&ComputeTask::new(2, i64::MAX)).is_err());
    }
}
