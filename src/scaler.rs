use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

/// Per-feature standardisation (zero mean, unit variance), fit once on
/// training data and reused unchanged at inference time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(feature_names: &[&str], rows: &[Vec<f64>]) -> RiskResult<Self> {
        let width = feature_names.len();
        if rows.is_empty() {
            return Err(RiskError::ModelUnavailable(
                "cannot fit scaler on an empty training set".to_string(),
            ));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(RiskError::ModelUnavailable(format!(
                "training row has {} features, expected {width}",
                row.len()
            )));
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in means.iter_mut() {
            *mean /= n;
        }

        let mut variances = vec![0.0; width];
        for row in rows {
            for ((var, value), mean) in variances.iter_mut().zip(row).zip(&means) {
                let d = value - mean;
                *var += d * d;
            }
        }
        for var in variances.iter_mut() {
            *var /= n;
        }

        Ok(Self {
            feature_names: feature_names.iter().map(|name| name.to_string()).collect(),
            means,
            variances,
        })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, features: &[f64]) -> RiskResult<Vec<f64>> {
        if features.len() != self.n_features()
            || self.variances.len() != self.n_features()
        {
            return Err(RiskError::Inference(format!(
                "scaler fit on {} features cannot transform {}",
                self.n_features(),
                features.len()
            )));
        }
        Ok(features
            .iter()
            .zip(&self.means)
            .zip(&self.variances)
            .map(|((value, mean), var)| {
                // Constant columns keep unit scale.
                let std = if *var == 0.0 { 1.0 } else { var.sqrt() };
                (value - mean) / std
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_centres_and_scales_each_column() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![5.0, 10.0]];
        let scaler = StandardScaler::fit(&["a", "b"], &rows).unwrap();
        assert_eq!(scaler.means, vec![3.0, 10.0]);
        assert!((scaler.variances[0] - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(scaler.variances[1], 0.0);

        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r).unwrap()).collect();
        let mean: f64 = scaled.iter().map(|r| r[0]).sum::<f64>() / 3.0;
        let var: f64 = scaled.iter().map(|r| r[0] * r[0]).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
        assert!(scaled.iter().all(|r| r[1] == 0.0));
    }

    #[test]
    fn transform_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&["a", "b"], &[vec![1.0, 2.0]]).unwrap();
        let err = scaler.transform(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, RiskError::Inference(_)));
    }

    #[test]
    fn fit_rejects_ragged_rows() {
        let err = StandardScaler::fit(&["a", "b"], &[vec![1.0]]).unwrap_err();
        assert!(matches!(err, RiskError::ModelUnavailable(_)));
        assert!(StandardScaler::fit(&["a"], &[]).is_err());
    }
}
