//! Standard scaler followed by an ordinary-least-squares linear model.
//!
//! Fitting works on `ndarray` matrices; the fitted state is kept as plain
//! per-feature vectors so it serializes as-is and can be shape-checked when
//! it is loaded back.

use crate::error::ForecastError;
use crate::features::FEATURE_COUNT;
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// A Cholesky pivot this small relative to its diagonal entry means the
/// normal equations are singular.
const CHOLESKY_RCOND: f64 = 1e-10;
/// Relative residual at which the minimum-norm solve stops early.
const PINV_TOL: f64 = 1e-10;

pub type FeatureVector = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Per-column mean and population standard deviation. A constant column
    /// gets a scale of 1.0 so it transforms to zeros instead of NaN.
    pub fn fit(x: &Array2<f64>) -> Result<Self, ForecastError> {
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            ForecastError::InsufficientData("cannot fit a scaler on zero rows".to_string())
        })?;
        let std = x.std_axis(Axis(0), 0.0);
        let scale = std.mapv(|value| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                1.0
            }
        });

        Ok(Self {
            mean: mean.to_vec(),
            scale: scale.to_vec(),
        })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean_view()) / &self.scale_view()
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        (&row - &self.mean_view()) / &self.scale_view()
    }

    fn mean_view(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(&self.mean[..])
    }

    fn scale_view(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(&self.scale[..])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    /// Least-squares fit with an intercept.
    ///
    /// Solves the normal equations `(X'X) b = X'y` over `[1 | X]` by Cholesky
    /// decomposition, falling back to the minimum-norm pseudoinverse solution
    /// when `X'X` is singular (collinear columns).
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self, ForecastError> {
        if x.nrows() != y.len() {
            return Err(ForecastError::InvalidArgument(format!(
                "feature rows ({}) and targets ({}) differ in length",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(ForecastError::InsufficientData(
                "cannot fit a linear model on zero rows".to_string(),
            ));
        }

        let ones = Array2::<f64>::ones((x.nrows(), 1));
        let design = concatenate(Axis(1), &[ones.view(), x.view()])
            .map_err(|err| ForecastError::InvalidArgument(err.to_string()))?;
        let xt = design.t();
        let xtx = xt.dot(&design);
        let xty = xt.dot(y);

        let beta = match cholesky_solve(&xtx, &xty) {
            Some(beta) => beta,
            None => pseudoinverse_solve(&xtx, &xty),
        };

        Ok(Self {
            intercept: beta[0],
            coefficients: beta.slice(s![1..]).to_vec(),
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&ArrayView1::from(&self.coefficients[..])) + self.intercept
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.intercept + row.dot(&ArrayView1::from(&self.coefficients[..]))
    }
}

/// The fitted scaler and linear model, applied in that order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainedPipeline {
    pub scaler: StandardScaler,
    pub model: LinearRegression,
}

impl TrainedPipeline {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self, ForecastError> {
        let scaler = StandardScaler::fit(x)?;
        let scaled = scaler.transform(x);
        let model = LinearRegression::fit(&scaled, y)?;
        Ok(Self { scaler, model })
    }

    pub fn predict_one(&self, row: &FeatureVector) -> f64 {
        let scaled = self.scaler.transform_row(ArrayView1::from(&row[..]));
        self.model.predict_row(scaled.view())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        self.model.predict(&self.scaler.transform(x))
    }

    /// Checks that every stage covers exactly the four model features with
    /// finite parameters.
    pub fn validate(&self) -> Result<(), String> {
        let shapes = [
            ("scaler mean", self.scaler.mean.len()),
            ("scaler scale", self.scaler.scale.len()),
            ("coefficients", self.model.coefficients.len()),
        ];
        for (label, len) in shapes {
            if len != FEATURE_COUNT {
                return Err(format!(
                    "{} has {} entries, expected {}",
                    label, len, FEATURE_COUNT
                ));
            }
        }

        let all_finite = self
            .scaler
            .mean
            .iter()
            .chain(self.scaler.scale.iter())
            .chain(self.model.coefficients.iter())
            .chain(std::iter::once(&self.model.intercept))
            .all(|value| value.is_finite());
        if !all_finite {
            return Err("pipeline contains non-finite parameters".to_string());
        }
        if self.scaler.scale.iter().any(|scale| *scale <= 0.0) {
            return Err("scaler contains a non-positive scale".to_string());
        }

        Ok(())
    }
}

/// `A = L L'` then forward and back substitution. `None` when a pivot
/// collapses, i.e. `A` is not numerically positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let pivot = a[[i, i]] - sum;
                if !pivot.is_finite() || pivot <= CHOLESKY_RCOND * a[[i, i]].abs() {
                    return None;
                }
                l[[i, i]] = pivot.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Minimum-norm solution of `A x = b` for a symmetric positive semi-definite
/// `A`, by conjugate gradients from zero.
///
/// Every iterate lies in the Krylov space of `b`, which is inside the range
/// of `A`, so null-space directions stay at zero. Exact arithmetic finishes in
/// at most `rank(A)` steps.
fn pseudoinverse_solve(a: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let mut x = Array1::<f64>::zeros(a.ncols());
    let mut residual = b.clone();
    let mut direction = residual.clone();
    let mut residual_sq = residual.dot(&residual);
    let b_norm = residual_sq.sqrt();
    if !b_norm.is_finite() || b_norm == 0.0 {
        return x;
    }

    for _ in 0..a.ncols() {
        let a_direction = a.dot(&direction);
        let curvature = direction.dot(&a_direction);
        if !curvature.is_finite() || curvature <= 0.0 {
            break;
        }
        let alpha = residual_sq / curvature;
        x = &x + &(&direction * alpha);
        residual = &residual - &(&a_direction * alpha);

        let next_residual_sq = residual.dot(&residual);
        if next_residual_sq.sqrt() <= PINV_TOL * b_norm {
            break;
        }
        direction = &residual + &(&direction * (next_residual_sq / residual_sq));
        residual_sq = next_residual_sq;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn noisy_rows(count: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((count, FEATURE_COUNT), |(i, j)| {
            let t = i as f64;
            match j {
                0 => t,
                1 => (t / 3.0).sin() * 5.0,
                2 => (t / 7.0).cos() * 2.0,
                _ => (t * 0.37).sin(),
            }
        });
        let y = x
            .rows()
            .into_iter()
            .map(|row| 3.0 + 0.5 * row[0] - 2.0 * row[1] + 1.5 * row[2] + 4.0 * row[3])
            .collect();
        (x, y)
    }

    #[test]
    fn scaler_uses_population_std_and_guards_constant_columns() {
        let x = array![[1.0, 5.0, 2.0, 0.0], [3.0, 5.0, 4.0, 0.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        assert_eq!(scaler.mean, vec![2.0, 5.0, 3.0, 0.0]);
        assert!((scaler.scale[0] - 1.0).abs() < 1e-12);
        assert_eq!(scaler.scale[1], 1.0);
        assert_eq!(scaler.scale[3], 1.0);

        let scaled = scaler.transform_row(ArrayView1::from(&[3.0, 5.0, 2.0, 0.0][..]));
        for (got, want) in scaled.iter().zip([1.0, 0.0, -1.0, 0.0].iter()) {
            assert!((got - want).abs() < 1e-12, "got {got}, want {want}");
        }
    }

    #[test]
    fn scaler_fit_is_deterministic() {
        let (x, _) = noisy_rows(40);
        let first = StandardScaler::fit(&x).unwrap();
        let second = StandardScaler::fit(&x).unwrap();
        for (a, b) in first.mean.iter().zip(second.mean.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        for (a, b) in first.scale.iter().zip(second.scale.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn ols_recovers_exact_linear_relation() {
        let (x, y) = noisy_rows(50);
        let model = LinearRegression::fit(&x, &y).unwrap();
        let expected = [0.5, -2.0, 1.5, 4.0];
        for (got, want) in model.coefficients.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-8, "got {got}, want {want}");
        }
        assert!((model.intercept - 3.0).abs() < 1e-8);
    }

    #[test]
    fn collinear_columns_still_predict_exactly() {
        let x = Array2::from_shape_fn((30, FEATURE_COUNT), |(i, j)| {
            let t = i as f64;
            if j == 0 {
                t
            } else {
                t + 10.0 - j as f64
            }
        });
        let y: Array1<f64> = (0..30).map(|i| 10.0 + i as f64).collect();

        let pipeline = TrainedPipeline::fit(&x, &y).unwrap();
        let fitted = pipeline.predict(&x);
        for (got, want) in fitted.iter().zip(y.iter()) {
            assert!((got - want).abs() < 1e-8, "got {got}, want {want}");
        }
        let next = [30.0, 39.0, 38.0, 37.0];
        assert!((pipeline.predict_one(&next) - 40.0).abs() < 1e-8);

        let c = &pipeline.model.coefficients;
        assert!((c[0] - c[3]).abs() < 1e-8, "minimum-norm spreads weight evenly");
    }

    #[test]
    fn constant_features_fit_the_mean() {
        let x = Array2::from_elem((6, FEATURE_COUNT), 7.0);
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let pipeline = TrainedPipeline::fit(&x, &y).unwrap();
        assert!((pipeline.predict_one(&[7.0; FEATURE_COUNT]) - 3.5).abs() < 1e-9);
        assert!(pipeline.model.coefficients.iter().all(|c| c.abs() < 1e-12));
    }

    #[test]
    fn predict_one_matches_batch_predict() {
        let (x, y) = noisy_rows(30);
        let pipeline = TrainedPipeline::fit(&x, &y).unwrap();
        let batch = pipeline.predict(&x);
        for (idx, row) in x.rows().into_iter().enumerate() {
            let single = pipeline.predict_one(&[row[0], row[1], row[2], row[3]]);
            assert!((single - batch[idx]).abs() < 1e-9);
        }
    }

    #[test]
    fn fit_rejects_mismatched_or_empty_input() {
        assert!(matches!(
            LinearRegression::fit(&Array2::zeros((1, FEATURE_COUNT)), &Array1::zeros(0)),
            Err(ForecastError::InvalidArgument(_))
        ));
        assert!(matches!(
            TrainedPipeline::fit(&Array2::zeros((0, FEATURE_COUNT)), &Array1::zeros(0)),
            Err(ForecastError::InsufficientData(_))
        ));
    }

    #[test]
    fn validate_checks_shape() {
        let (x, y) = noisy_rows(20);
        let mut pipeline = TrainedPipeline::fit(&x, &y).unwrap();
        assert!(pipeline.validate().is_ok());

        pipeline.model.coefficients.pop();
        assert!(pipeline.validate().is_err());
    }
}
