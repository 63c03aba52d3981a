use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::models::{
    CohortAnalytics, CohortSummary, Comparison, Features, Field, FieldValues, PassFail,
    PredictionResult, StudentAnalytics, StudentInfo, StudentRecord, StudentScore,
    PASS_THRESHOLD,
};
use crate::predictor::{predict_records, Predictor};
use crate::store::Dataset;

/// Subject labels shown to users and the raw column each one reads.
/// The pairing is historical and kept as-is for existing dashboards.
pub const SUBJECT_CHANNELS: [(&str, Field); 5] = [
    ("Math", Field::InternalAssessment1),
    ("Science", Field::InternalAssessment2),
    ("English", Field::PreviousSemesterGrade),
    ("History", Field::AttendancePercentage),
    ("Art", Field::ParticipationScore),
];

/// Attendance bins as `(label, lower, upper)`; lower bound inclusive,
/// upper exclusive except for the last bin.
pub const ATTENDANCE_BINS: [(&str, f64, f64); 5] = [
    ("0-60%", 0.0, 60.0),
    ("60-70%", 60.0, 70.0),
    ("70-80%", 70.0, 80.0),
    ("80-90%", 80.0, 90.0),
    ("90-100%", 90.0, 100.0),
];

pub fn attendance_bucket(value: f64) -> Option<&'static str> {
    let last = ATTENDANCE_BINS.len() - 1;
    ATTENDANCE_BINS
        .iter()
        .enumerate()
        .find(|(index, (_, lower, upper))| {
            value >= *lower && (value < *upper || (*index == last && value <= *upper))
        })
        .map(|(_, (label, _, _))| *label)
}

pub fn pass_fail_split(scores: &[f64], threshold: f64) -> PassFail {
    scores.iter().fold(PassFail::default(), |mut split, score| {
        if *score >= threshold {
            split.pass += 1;
        } else {
            split.fail += 1;
        }
        split
    })
}

/// Mean of the present values of one column.
pub fn column_mean(dataset: &Dataset, field: Field) -> AppResult<f64> {
    let (sum, count) = dataset
        .records()
        .iter()
        .filter_map(|record| field.value(record))
        .filter(|value| value.is_finite())
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        return Err(AppError::EmptyDataset(field.column().to_string()));
    }
    Ok(sum / count as f64)
}

fn column_means(dataset: &Dataset) -> AppResult<BTreeMap<Field, f64>> {
    Field::ALL
        .iter()
        .map(|field| column_mean(dataset, *field).map(|mean| (*field, mean)))
        .collect()
}

fn assessment_average(record: &StudentRecord) -> Option<f64> {
    let values: Vec<f64> = [record.internal_assessment_1, record.internal_assessment_2]
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn cohort_overview(dataset: &Dataset, predictor: &dyn Predictor) -> AppResult<CohortAnalytics> {
    if dataset.is_empty() {
        return Err(AppError::EmptyDataset("dataset".to_string()));
    }
    let performance_trend = dataset.records().iter().map(assessment_average).collect();

    let means = column_means(dataset)?;
    let subject_scores = SUBJECT_CHANNELS
        .iter()
        .map(|(label, field)| (*label, means[field]))
        .collect();

    let mut attendance_distribution: BTreeMap<&'static str, usize> = ATTENDANCE_BINS
        .iter()
        .map(|(label, _, _)| (*label, 0))
        .collect();
    for value in dataset
        .records()
        .iter()
        .filter_map(|record| record.attendance_percentage)
    {
        if let Some(label) = attendance_bucket(value) {
            *attendance_distribution.entry(label).or_insert(0) += 1;
        }
    }

    let scores = predict_records(predictor, dataset.records())?;

    Ok(CohortAnalytics {
        performance_trend,
        subject_scores,
        attendance_distribution,
        pass_fail_distribution: pass_fail_split(&scores, PASS_THRESHOLD),
    })
}

pub fn student_detail(
    dataset: &Dataset,
    predictor: &dyn Predictor,
    name: &str,
) -> AppResult<StudentAnalytics> {
    let record = dataset
        .find_by_name(name)
        .ok_or_else(|| AppError::NotFound(name.to_string()))?;
    let features = Features::from_record(record)?;
    let means = column_means(dataset)?;
    let compare = |field: Field| Comparison {
        student: features.get(field),
        average: means[&field],
    };

    let subject_comparison = SUBJECT_CHANNELS
        .iter()
        .map(|(label, field)| (*label, compare(*field)))
        .collect();
    let score = predictor.predict_one(&features)?;

    Ok(StudentAnalytics {
        student_info: StudentInfo {
            name: record.name.clone(),
            id: record.student_id.clone(),
        },
        individual_performance: FieldValues::from(&features),
        performance_trend: [
            features.get(Field::InternalAssessment1),
            features.get(Field::InternalAssessment2),
        ],
        subject_comparison,
        prediction: PredictionResult::from_score(score),
        attendance_comparison: compare(Field::AttendancePercentage),
        class_averages: FieldValues {
            internal_assessment_1: means[&Field::InternalAssessment1],
            internal_assessment_2: means[&Field::InternalAssessment2],
            attendance_percentage: means[&Field::AttendancePercentage],
            previous_semester_grade: means[&Field::PreviousSemesterGrade],
            participation_score: means[&Field::ParticipationScore],
        },
        recommendations: recommendations(record),
    })
}

/// Short coaching hints for a student, in a fixed order.
pub fn recommendations(record: &StudentRecord) -> Vec<String> {
    let mut tips = Vec::new();
    if record.attendance_percentage.is_some_and(|v| v < 60.0) {
        tips.push("Improve attendance.".to_string());
    }
    if record.internal_assessment_1.is_some_and(|v| v < 15.0) {
        tips.push("Focus on Internal 1 topics.".to_string());
    }
    if record.participation_score.is_some_and(|v| v < 5.0) {
        tips.push("Engage more in class.".to_string());
    }
    if tips.is_empty() {
        tips.push("On track.".to_string());
    }
    tips
}

pub fn cohort_summary(dataset: &Dataset, predictor: &dyn Predictor) -> AppResult<CohortSummary> {
    let average_attendance = column_mean(dataset, Field::AttendancePercentage)?;
    let scores = predict_records(predictor, dataset.records())?;

    Ok(CohortSummary {
        dataset_size: dataset.len(),
        average_attendance,
        predicted_pass: pass_fail_split(&scores, PASS_THRESHOLD).pass,
    })
}

/// Students ordered from lowest to highest predicted score.
pub fn rank_by_score(dataset: &Dataset, predictor: &dyn Predictor) -> AppResult<Vec<StudentScore>> {
    let scores = predict_records(predictor, dataset.records())?;
    let mut ranked: Vec<StudentScore> = dataset
        .records()
        .iter()
        .zip(scores)
        .map(|(record, score)| StudentScore {
            name: record.name.clone(),
            student_id: record.student_id.clone(),
            prediction: PredictionResult::from_score(score),
            recommendations: recommendations(record),
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.prediction
            .score
            .partial_cmp(&b.prediction.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(ranked)
}
