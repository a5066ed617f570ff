//! Regression metrics.

use crate::error::{ModelError, Result};
use ndarray::ArrayView1;

/// Root mean squared error.
pub fn rmse(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(ModelError::ShapeMismatch {
            expected: y_true.len(),
            found: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(ModelError::EmptyDataset("cannot score zero rows".to_string()));
    }
    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};

    #[test]
    fn test_rmse() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let p = array![1.0, 2.0, 3.0, 6.0];
        assert_relative_eq!(rmse(y.view(), p.view()).unwrap(), 1.0);
        assert_relative_eq!(rmse(y.view(), y.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_rmse_rejects_bad_input() {
        let y = array![1.0, 2.0];
        assert!(rmse(y.view(), array![1.0].view()).is_err());
        assert!(matches!(
            rmse(Array1::zeros(0).view(), Array1::zeros(0).view()),
            Err(ModelError::EmptyDataset(_))
        ));
    }
}
