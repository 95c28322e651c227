//! Affine index regression
//!
//! Recovers `index = intercept + row_coeff*out_row + col_coeff*out_col` from
//! the indices observed at one reference slot across every output cell.
//!
//! Trivial lanes (constant one, or equal to one of the output coordinates) are
//! matched exactly before falling back to a least-squares solve. The solve runs
//! an SVD of the centered design matrix itself rather than of its normal
//! equations, and the solution is snapped to integers whenever the snapped map
//! reproduces every observation. A fit is accepted only when the sum of squared
//! residuals stays under the configured tolerance.

use log::{debug, warn};
use nalgebra::{linalg::SVD, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::KernelConfig;

/// Relative cutoff below which singular values are treated as zero
const SINGULAR_CUTOFF: f64 = 1e-10;

/// Coefficients of an affine map from output coordinates to an index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineCoefficients {
    pub intercept: f64,
    pub row: f64,
    pub col: f64,
}

impl AffineCoefficients {
    pub fn new(intercept: f64, row: f64, col: f64) -> Self {
        Self {
            intercept,
            row,
            col,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Evaluate the map at an output coordinate
    pub fn eval(&self, out_row: f64, out_col: f64) -> f64 {
        self.intercept + self.row * out_row + self.col * out_col
    }
}

/// How a fit was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Observed lane equals one of the predictors
    ExactMatch,
    LeastSquares,
}

/// Outcome of fitting one observed index lane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineFit {
    pub fit_succeeded: bool,
    pub coefficients: AffineCoefficients,
    /// Sum of squared residuals of the rounded coefficients
    pub residual: f64,
    pub method: FitMethod,
}

/// Least-squares solver for affine index lanes
pub struct AffineSolver {
    tolerance: f64,
    decimals: i32,
}

impl AffineSolver {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            tolerance: config.residual_tolerance,
            decimals: config.rounding_decimals,
        }
    }

    /// Fit `observed` against the predictors `1`, `row_coords`, `col_coords`
    pub fn fit(&self, observed: &[f64], row_coords: &[f64], col_coords: &[f64]) -> AffineFit {
        debug_assert_eq!(observed.len(), row_coords.len());
        debug_assert_eq!(observed.len(), col_coords.len());

        if let Some(coefficients) = exact_match(observed, row_coords, col_coords) {
            return AffineFit {
                fit_succeeded: true,
                coefficients,
                residual: 0.0,
                method: FitMethod::ExactMatch,
            };
        }

        self.least_squares(observed, row_coords, col_coords)
    }

    fn least_squares(&self, observed: &[f64], row_coords: &[f64], col_coords: &[f64]) -> AffineFit {
        let n = observed.len();
        let row_mean = mean(row_coords);
        let col_mean = mean(col_coords);

        // centered predictors; the intercept is recovered afterwards
        let x = DMatrix::from_fn(n, 3, |r, c| match c {
            0 => 1.0,
            1 => row_coords[r] - row_mean,
            _ => col_coords[r] - col_mean,
        });
        let y = DVector::from_column_slice(observed);

        let svd = SVD::new(x, true, true);
        let cutoff = svd.singular_values.max() * SINGULAR_CUTOFF;
        let beta = match svd.solve(&y, cutoff) {
            Ok(beta) => beta,
            Err(msg) => {
                warn!("Least-squares solve failed: {}", msg);
                return AffineFit {
                    fit_succeeded: false,
                    coefficients: AffineCoefficients::zero(),
                    residual: f64::INFINITY,
                    method: FitMethod::LeastSquares,
                };
            }
        };
        let (row, col) = (beta[1], beta[2]);
        let intercept = beta[0] - row * row_mean - col * col_mean;

        // indices are integers: prefer the integral snap when it reproduces every observation
        let snapped = AffineCoefficients::new(intercept.round() + 0.0, row.round() + 0.0, col.round() + 0.0);
        let coefficients = if sum_squared_residuals(&snapped, observed, row_coords, col_coords) == 0.0 {
            snapped
        } else {
            AffineCoefficients::new(self.round(intercept), self.round(row), self.round(col))
        };
        let residual = sum_squared_residuals(&coefficients, observed, row_coords, col_coords);
        let fit_succeeded = residual < self.tolerance;

        debug!(
            "Least-squares fit {:?}: residual {:.3e} ({})",
            coefficients,
            residual,
            if fit_succeeded { "accepted" } else { "rejected" }
        );

        AffineFit {
            fit_succeeded,
            coefficients,
            residual,
            method: FitMethod::LeastSquares,
        }
    }

    fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.decimals);
        // adding 0.0 turns -0.0 into 0.0
        (value * scale).round() / scale + 0.0
    }
}

impl Default for AffineSolver {
    fn default() -> Self {
        Self::new(&KernelConfig::default())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sum of squared residuals of `coefficients` over the observations
fn sum_squared_residuals(coefficients: &AffineCoefficients, observed: &[f64], row_coords: &[f64], col_coords: &[f64]) -> f64 {
    observed
        .iter()
        .zip(row_coords.iter().zip(col_coords))
        .map(|(&v, (&r, &c))| {
            let e = coefficients.eval(r, c) - v;
            e * e
        })
        .sum()
}

/// Unit coefficients when `observed` equals a predictor, tried in the order
/// ones, rows, cols
fn exact_match(observed: &[f64], row_coords: &[f64], col_coords: &[f64]) -> Option<AffineCoefficients> {
    if observed.iter().all(|&v| v == 1.0) {
        Some(AffineCoefficients::new(1.0, 0.0, 0.0))
    } else if observed == row_coords {
        Some(AffineCoefficients::new(0.0, 1.0, 0.0))
    } else if observed == col_coords {
        Some(AffineCoefficients::new(0.0, 0.0, 1.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Row-major output coordinates of a rows x cols grid
    fn grid(rows: usize, cols: usize) -> (Vec<f64>, Vec<f64>) {
        let mut i = Vec::new();
        let mut j = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                i.push(r as f64);
                j.push(c as f64);
            }
        }
        (i, j)
    }

    #[test]
    fn test_exact_match_order() {
        let (i, j) = grid(3, 4);
        let solver = AffineSolver::default();

        let ones = vec![1.0; 12];
        let fit = solver.fit(&ones, &i, &j);
        assert_eq!(fit.method, FitMethod::ExactMatch);
        assert_eq!(fit.coefficients, AffineCoefficients::new(1.0, 0.0, 0.0));

        let fit = solver.fit(&i, &i, &j);
        assert_eq!(fit.coefficients, AffineCoefficients::new(0.0, 1.0, 0.0));

        let fit = solver.fit(&j, &i, &j);
        assert_eq!(fit.coefficients, AffineCoefficients::new(0.0, 0.0, 1.0));
        assert!(fit.fit_succeeded);
    }

    #[test]
    fn test_row_match_wins_over_col_on_diagonal() {
        // a single column has i != j, but a 1x1 grid has i == j == 0
        let solver = AffineSolver::default();
        let fit = solver.fit(&[0.0], &[0.0], &[0.0]);
        assert_eq!(fit.coefficients, AffineCoefficients::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_least_squares_affine() {
        let (i, j) = grid(5, 4);
        let observed: Vec<f64> = i.iter().zip(&j).map(|(r, c)| 3.0 + 2.0 * r + 5.0 * c).collect();

        let fit = AffineSolver::default().fit(&observed, &i, &j);
        assert!(fit.fit_succeeded);
        assert_eq!(fit.method, FitMethod::LeastSquares);
        assert_eq!(fit.coefficients, AffineCoefficients::new(3.0, 2.0, 5.0));
        assert!(fit.residual < 1e-8);
    }

    #[test]
    fn test_least_squares_constant_zero() {
        let (i, j) = grid(10, 10);
        let fit = AffineSolver::default().fit(&vec![0.0; 100], &i, &j);
        assert!(fit.fit_succeeded);
        assert_eq!(fit.coefficients, AffineCoefficients::zero());
        assert!(fit.coefficients.intercept.is_sign_positive());
    }

    #[test]
    fn test_least_squares_constant_on_single_row() {
        // the row predictor is all zero here, so X'X is singular
        let (i, j) = grid(1, 6);
        let fit = AffineSolver::default().fit(&vec![7.0; 6], &i, &j);
        assert!(fit.fit_succeeded);
        assert_eq!(fit.coefficients.eval(0.0, 3.0), 7.0);
        assert_eq!(fit.coefficients.col, 0.0);
    }

    #[test]
    fn test_negative_slope() {
        let (i, j) = grid(4, 4);
        let observed: Vec<f64> = j.iter().map(|c| 3.0 - c).collect();
        let fit = AffineSolver::default().fit(&observed, &i, &j);
        assert!(fit.fit_succeeded);
        assert_eq!(fit.coefficients, AffineCoefficients::new(3.0, 0.0, -1.0));
    }

    #[test]
    fn test_integer_affine_recovered_exactly_across_grid_sizes() {
        let shapes = [(1, 50), (50, 1), (7, 300), (64, 64), (200, 200)];
        let maps = [
            AffineCoefficients::new(3.0, 2.0, 5.0),
            AffineCoefficients::new(4.0, 0.0, 1.0),
            AffineCoefficients::new(24.0, 0.0, 0.0),
            AffineCoefficients::new(-7.0, 1.0, -3.0),
            AffineCoefficients::new(199.0, -1.0, 0.0),
        ];
        let solver = AffineSolver::default();

        for &(rows, cols) in &shapes {
            let (i, j) = grid(rows, cols);
            for map in &maps {
                let observed: Vec<f64> = i.iter().zip(&j).map(|(&r, &c)| map.eval(r, c)).collect();
                let fit = solver.fit(&observed, &i, &j);

                assert!(fit.fit_succeeded, "{}x{} {:?}", rows, cols, map);
                assert_eq!(fit.residual, 0.0, "{}x{} {:?}", rows, cols, map);
                for (r, c) in i.iter().zip(&j) {
                    assert_eq!(fit.coefficients.eval(*r, *c), map.eval(*r, *c));
                }
                for value in [fit.coefficients.intercept, fit.coefficients.row, fit.coefficients.col] {
                    assert_eq!(value.fract(), 0.0, "{}x{} {:?}", rows, cols, fit.coefficients);
                }
                // on grids with more than one row and column the map is unique
                if rows > 1 && cols > 1 && fit.method == FitMethod::LeastSquares {
                    assert_eq!(&fit.coefficients, map);
                }
            }
        }
    }

    #[test]
    fn test_shifted_column_on_large_grid() {
        let (i, j) = grid(100, 100);
        let observed: Vec<f64> = j.iter().map(|c| c + 4.0).collect();
        let fit = AffineSolver::default().fit(&observed, &i, &j);
        assert_eq!(fit.coefficients, AffineCoefficients::new(4.0, 0.0, 1.0));
    }

    #[test]
    fn test_quadratic_rejected() {
        let (i, j) = grid(6, 6);
        let observed: Vec<f64> = i.iter().map(|r| r * r).collect();
        let fit = AffineSolver::default().fit(&observed, &i, &j);
        assert!(!fit.fit_succeeded);
        assert!(fit.residual >= 1e-4);
    }

    #[test]
    fn test_product_of_coordinates_rejected() {
        let (i, j) = grid(4, 5);
        let observed: Vec<f64> = i.iter().zip(&j).map(|(r, c)| r * c).collect();
        let fit = AffineSolver::default().fit(&observed, &i, &j);
        assert!(!fit.fit_succeeded);
    }
}
