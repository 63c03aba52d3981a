//! Scoring capability behind which the trained model sits.
//!
//! The analytics layer only sees [`Predictor`]; the artifact format lives in
//! [`LinearModel`] and can be swapped without touching callers.

use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{Features, Field, StudentRecord};

pub trait Predictor: Send + Sync {
    /// Scores each row, preserving input order.
    fn predict_many(&self, rows: &[Features]) -> AppResult<Vec<f64>>;

    fn predict_one(&self, row: &Features) -> AppResult<f64> {
        self.predict_many(std::slice::from_ref(row))?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Feature("predictor returned no score".to_string()))
    }
}

/// Scores every record; fails on the first record without usable features.
pub fn predict_records(
    predictor: &dyn Predictor,
    records: &[StudentRecord],
) -> AppResult<Vec<f64>> {
    let rows = records
        .iter()
        .map(Features::from_record)
        .collect::<AppResult<Vec<_>>>()?;
    predictor.predict_many(&rows)
}

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

/// Linear regression exported as JSON: `intercept + Σ coefficient·feature`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    coefficients: [f64; 5],
    intercept: f64,
}

impl LinearModel {
    pub fn new(coefficients: [f64; 5], intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| AppError::model(path, e))?;
        Self::from_json(&data).map_err(|reason| AppError::model(path, reason))
    }

    /// The artifact must name its features in training order; a reordered
    /// artifact is refused instead of scoring the wrong columns.
    fn from_json(data: &str) -> Result<Self, String> {
        let artifact: ModelArtifact = serde_json::from_str(data).map_err(|e| e.to_string())?;

        let expected: Vec<&str> = Field::ALL.iter().map(|field| field.column()).collect();
        if artifact.feature_names != expected {
            return Err(format!(
                "feature_names {:?} do not match expected order {:?}",
                artifact.feature_names, expected
            ));
        }

        let coefficients: [f64; 5] = artifact.coefficients.try_into().map_err(|got: Vec<f64>| {
            format!("expected 5 coefficients, found {}", got.len())
        })?;

        Ok(Self::new(coefficients, artifact.intercept))
    }
}

impl Predictor for LinearModel {
    fn predict_many(&self, rows: &[Features]) -> AppResult<Vec<f64>> {
        Ok(rows
            .iter()
            .map(|row| {
                row.as_slice()
                    .iter()
                    .zip(self.coefficients.iter())
                    .fold(self.intercept, |acc, (x, w)| acc + x * w)
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Returns the same score for every row.
    pub(crate) struct FixedPredictor(pub f64);

    impl Predictor for FixedPredictor {
        fn predict_many(&self, rows: &[Features]) -> AppResult<Vec<f64>> {
            Ok(vec![self.0; rows.len()])
        }
    }

    /// Scores a row as its first internal assessment.
    pub(crate) struct FirstAssessmentPredictor;

    impl Predictor for FirstAssessmentPredictor {
        fn predict_many(&self, rows: &[Features]) -> AppResult<Vec<f64>> {
            Ok(rows
                .iter()
                .map(|row| row.get(Field::InternalAssessment1))
                .collect())
        }
    }

    const ARTIFACT: &str = r#"{
        "feature_names": ["Internal_Assessment_1", "Internal_Assessment_2",
            "Attendance_Percentage", "Previous_Semester_Grade", "Participation_Score"],
        "coefficients": [0.3, 0.3, 0.05, 0.2, 0.1],
        "intercept": 1.0
    }"#;

    fn alice() -> StudentRecord {
        StudentRecord {
            name: "Alice".to_string(),
            student_id: None,
            internal_assessment_1: Some(18.0),
            internal_assessment_2: Some(20.0),
            attendance_percentage: Some(95.0),
            previous_semester_grade: Some(16.0),
            participation_score: Some(8.0),
        }
    }

    #[test]
    fn linear_model_weights_columns_in_order() {
        let model = LinearModel::from_json(ARTIFACT).unwrap();
        let features = Features::from_record(&alice()).unwrap();
        let score = model.predict_one(&features).unwrap();
        let expected = 1.0 + 0.3 * 18.0 + 0.3 * 20.0 + 0.05 * 95.0 + 0.2 * 16.0 + 0.1 * 8.0;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn reordered_artifact_is_rejected() {
        let swapped = ARTIFACT.replace(
            r#""Internal_Assessment_1", "Internal_Assessment_2""#,
            r#""Internal_Assessment_2", "Internal_Assessment_1""#,
        );
        let err = LinearModel::from_json(&swapped).unwrap_err();
        assert!(err.contains("do not match expected order"));
    }

    #[test]
    fn wrong_coefficient_count_is_rejected() {
        let short = ARTIFACT.replace("0.3, 0.3, 0.05, 0.2, 0.1", "0.3, 0.3");
        let err = LinearModel::from_json(&short).unwrap_err();
        assert_eq!(err, "expected 5 coefficients, found 2");
    }

    #[test]
    fn load_wraps_io_failure_as_model_error() {
        let err = LinearModel::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, AppError::Model { .. }));
    }

    #[test]
    fn predict_records_stops_on_missing_feature() {
        let mut broken = alice();
        broken.participation_score = None;
        let err = predict_records(&FixedPredictor(17.0), &[alice(), broken]).unwrap_err();
        assert!(matches!(err, AppError::Feature(_)));
    }
}
