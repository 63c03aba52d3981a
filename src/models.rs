use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, AppResult};

/// Scores at or above this value are predicted to pass.
pub const PASS_THRESHOLD: f64 = 15.0;

/// Reads a numeric cell, treating blanks, text such as `NA`, and
/// non-finite values (`NaN`, `inf`) as absent.
fn numeric_cell<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = csv::invalid_option(deserializer)?;
    Ok(value.filter(|v| v.is_finite()))
}

/// One row of the student dataset. Numeric cells that are blank or not a
/// number load as `None` so a single bad row cannot block the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Student_ID", default)]
    pub student_id: Option<String>,
    #[serde(
        rename = "Internal_Assessment_1",
        default,
        deserialize_with = "numeric_cell"
    )]
    pub internal_assessment_1: Option<f64>,
    #[serde(
        rename = "Internal_Assessment_2",
        default,
        deserialize_with = "numeric_cell"
    )]
    pub internal_assessment_2: Option<f64>,
    #[serde(
        rename = "Attendance_Percentage",
        default,
        deserialize_with = "numeric_cell"
    )]
    pub attendance_percentage: Option<f64>,
    #[serde(
        rename = "Previous_Semester_Grade",
        default,
        deserialize_with = "numeric_cell"
    )]
    pub previous_semester_grade: Option<f64>,
    #[serde(
        rename = "Participation_Score",
        default,
        deserialize_with = "numeric_cell"
    )]
    pub participation_score: Option<f64>,
}

/// The five numeric columns, in the order the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    InternalAssessment1,
    InternalAssessment2,
    AttendancePercentage,
    PreviousSemesterGrade,
    ParticipationScore,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::InternalAssessment1,
        Field::InternalAssessment2,
        Field::AttendancePercentage,
        Field::PreviousSemesterGrade,
        Field::ParticipationScore,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Field::InternalAssessment1 => "Internal_Assessment_1",
            Field::InternalAssessment2 => "Internal_Assessment_2",
            Field::AttendancePercentage => "Attendance_Percentage",
            Field::PreviousSemesterGrade => "Previous_Semester_Grade",
            Field::ParticipationScore => "Participation_Score",
        }
    }

    pub fn value(self, record: &StudentRecord) -> Option<f64> {
        match self {
            Field::InternalAssessment1 => record.internal_assessment_1,
            Field::InternalAssessment2 => record.internal_assessment_2,
            Field::AttendancePercentage => record.attendance_percentage,
            Field::PreviousSemesterGrade => record.previous_semester_grade,
            Field::ParticipationScore => record.participation_score,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Model input: the five numeric fields laid out in `Field::ALL` order.
/// Swapping positions silently produces wrong scores, so the only ways to
/// build one go through `Field`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features([f64; 5]);

impl Features {
    pub fn from_record(record: &StudentRecord) -> AppResult<Self> {
        let mut values = [0.0; 5];
        for field in Field::ALL {
            let value = field.value(record).filter(|v| v.is_finite());
            values[field.index()] = value.ok_or_else(|| {
                AppError::Feature(format!(
                    "student '{}' has no numeric {}",
                    record.name,
                    field.column()
                ))
            })?;
        }
        Ok(Self(values))
    }

    pub fn get(&self, field: Field) -> f64 {
        self.0[field.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// JSON body accepted by `POST /predict`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureInput {
    #[serde(rename = "Internal_Assessment_1", alias = "internal_assessment_1", default)]
    pub internal_assessment_1: Option<f64>,
    #[serde(rename = "Internal_Assessment_2", alias = "internal_assessment_2", default)]
    pub internal_assessment_2: Option<f64>,
    #[serde(rename = "Attendance_Percentage", alias = "attendance_percentage", default)]
    pub attendance_percentage: Option<f64>,
    #[serde(
        rename = "Previous_Semester_Grade",
        alias = "previous_semester_grade",
        default
    )]
    pub previous_semester_grade: Option<f64>,
    #[serde(rename = "Participation_Score", alias = "participation_score", default)]
    pub participation_score: Option<f64>,
}

impl TryFrom<FeatureInput> for Features {
    type Error = AppError;

    fn try_from(input: FeatureInput) -> AppResult<Self> {
        let raw = [
            (Field::InternalAssessment1, input.internal_assessment_1),
            (Field::InternalAssessment2, input.internal_assessment_2),
            (Field::AttendancePercentage, input.attendance_percentage),
            (Field::PreviousSemesterGrade, input.previous_semester_grade),
            (Field::ParticipationScore, input.participation_score),
        ];
        let mut values = [0.0; 5];
        for (field, value) in raw {
            values[field.index()] = value
                .ok_or_else(|| AppError::Feature(format!("missing field {}", field.column())))?;
        }
        Ok(Self(values))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn from_score(score: f64) -> Self {
        if score >= PASS_THRESHOLD {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub score: f64,
    pub result: Outcome,
}

impl PredictionResult {
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            result: Outcome::from_score(score),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PassFail {
    #[serde(rename = "Pass")]
    pub pass: usize,
    #[serde(rename = "Fail")]
    pub fail: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortAnalytics {
    pub performance_trend: Vec<Option<f64>>,
    pub subject_scores: BTreeMap<&'static str, f64>,
    pub attendance_distribution: BTreeMap<&'static str, usize>,
    pub pass_fail_distribution: PassFail,
}

/// A student's value next to the cohort mean for the same column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub student: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentInfo {
    pub name: String,
    pub id: Option<String>,
}

/// The five raw columns keyed by their dataset names.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldValues {
    #[serde(rename = "Internal_Assessment_1")]
    pub internal_assessment_1: f64,
    #[serde(rename = "Internal_Assessment_2")]
    pub internal_assessment_2: f64,
    #[serde(rename = "Attendance_Percentage")]
    pub attendance_percentage: f64,
    #[serde(rename = "Previous_Semester_Grade")]
    pub previous_semester_grade: f64,
    #[serde(rename = "Participation_Score")]
    pub participation_score: f64,
}

impl From<&Features> for FieldValues {
    fn from(features: &Features) -> Self {
        Self {
            internal_assessment_1: features.get(Field::InternalAssessment1),
            internal_assessment_2: features.get(Field::InternalAssessment2),
            attendance_percentage: features.get(Field::AttendancePercentage),
            previous_semester_grade: features.get(Field::PreviousSemesterGrade),
            participation_score: features.get(Field::ParticipationScore),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAnalytics {
    pub student_info: StudentInfo,
    pub individual_performance: FieldValues,
    pub performance_trend: [f64; 2],
    pub subject_comparison: BTreeMap<&'static str, Comparison>,
    pub prediction: PredictionResult,
    pub attendance_comparison: Comparison,
    pub class_averages: FieldValues,
    pub recommendations: Vec<String>,
}

/// Headline numbers shown at the top of the summary and report.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortSummary {
    pub dataset_size: usize,
    pub average_attendance: f64,
    pub predicted_pass: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentScore {
    pub name: String,
    pub student_id: Option<String>,
    pub prediction: PredictionResult,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StudentRecord {
        StudentRecord {
            name: "Alice".to_string(),
            student_id: Some("S1".to_string()),
            internal_assessment_1: Some(18.0),
            internal_assessment_2: Some(20.0),
            attendance_percentage: Some(95.0),
            previous_semester_grade: Some(16.0),
            participation_score: Some(8.0),
        }
    }

    #[test]
    fn features_follow_training_column_order() {
        let features = Features::from_record(&record()).unwrap();
        assert_eq!(features.as_slice(), &[18.0, 20.0, 95.0, 16.0, 8.0]);
    }

    #[test]
    fn missing_field_is_a_feature_error() {
        let mut student = record();
        student.previous_semester_grade = None;
        let err = Features::from_record(&student).unwrap_err();
        assert!(matches!(err, AppError::Feature(ref msg) if msg.contains("Previous_Semester_Grade")));
    }

    #[test]
    fn non_finite_field_is_a_feature_error() {
        let mut student = record();
        student.attendance_percentage = Some(f64::NAN);
        assert!(matches!(
            Features::from_record(&student),
            Err(AppError::Feature(_))
        ));
        student.attendance_percentage = Some(f64::INFINITY);
        assert!(Features::from_record(&student).is_err());
    }

    #[test]
    fn outcome_threshold_is_inclusive() {
        assert_eq!(Outcome::from_score(15.0), Outcome::Pass);
        assert_eq!(Outcome::from_score(14.999), Outcome::Fail);
        assert_eq!(Outcome::from_score(17.0), Outcome::Pass);
    }

    #[test]
    fn feature_input_accepts_both_key_styles() {
        let body = r#"{"Internal_Assessment_1": 10, "internal_assessment_2": 12,
            "Attendance_Percentage": 80, "Previous_Semester_Grade": 14,
            "participation_score": 6}"#;
        let input: FeatureInput = serde_json::from_str(body).unwrap();
        let features = Features::try_from(input).unwrap();
        assert_eq!(features.as_slice(), &[10.0, 12.0, 80.0, 14.0, 6.0]);
    }

    #[test]
    fn feature_input_reports_missing_field() {
        let input: FeatureInput =
            serde_json::from_str(r#"{"Internal_Assessment_1": 10}"#).unwrap();
        let err = Features::try_from(input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid feature input: missing field Internal_Assessment_2"
        );
    }

    #[test]
    fn prediction_result_serializes_label() {
        let json = serde_json::to_value(PredictionResult::from_score(17.0)).unwrap();
        assert_eq!(json["result"], "Pass");
        assert_eq!(json["score"], 17.0);
    }
}
