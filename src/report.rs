use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::analytics;
use crate::error::AppResult;
use crate::models::{Outcome, PASS_THRESHOLD};
use crate::predictor::Predictor;
use crate::store::Dataset;

pub fn build_report(
    dataset: &Dataset,
    predictor: &dyn Predictor,
    source: &str,
    generated_at: DateTime<Utc>,
) -> AppResult<String> {
    let summary = analytics::cohort_summary(dataset, predictor)?;
    let overview = analytics::cohort_overview(dataset, predictor)?;
    let ranked = analytics::rank_by_score(dataset, predictor)?;

    let mut output = String::new();

    let _ = writeln!(output, "# Student Performance Report");
    let _ = writeln!(
        output,
        "Generated from {} at {}",
        source,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Students: {}", summary.dataset_size);
    let _ = writeln!(
        output,
        "- Average attendance: {:.2}%",
        summary.average_attendance
    );
    let _ = writeln!(
        output,
        "- Predicted to pass (score >= {}): {}",
        PASS_THRESHOLD, summary.predicted_pass
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Averages");
    for (label, field) in analytics::SUBJECT_CHANNELS {
        let _ = writeln!(
            output,
            "- {} ({}): {:.2}",
            label,
            field.column(),
            overview.subject_scores[label]
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance Distribution");
    for (label, _, _) in analytics::ATTENDANCE_BINS {
        let _ = writeln!(
            output,
            "- {}: {}",
            label, overview.attendance_distribution[label]
        );
    }

    let at_risk: Vec<_> = ranked
        .iter()
        .filter(|student| student.prediction.result == Outcome::Fail)
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Predicted to Fail");

    if at_risk.is_empty() {
        let _ = writeln!(output, "No students are predicted to fail.");
    } else {
        for student in at_risk {
            let _ = writeln!(
                output,
                "- {} ({}) score {:.2}: {}",
                student.name,
                student.student_id.as_deref().unwrap_or("no id"),
                student.prediction.score,
                student.recommendations.join(" | ")
            );
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentRecord;
    use crate::predictor::tests::FirstAssessmentPredictor;
    use chrono::TimeZone;

    fn student(name: &str, ia1: f64, attendance: f64, participation: f64) -> StudentRecord {
        StudentRecord {
            name: name.to_string(),
            student_id: None,
            internal_assessment_1: Some(ia1),
            internal_assessment_2: Some(12.0),
            attendance_percentage: Some(attendance),
            previous_semester_grade: Some(13.0),
            participation_score: Some(participation),
        }
    }

    #[test]
    fn report_lists_failing_students_with_tips() {
        let dataset = Dataset::new(vec![
            student("Avery Lee", 19.0, 91.0, 8.0),
            student("Jules Moreno", 9.0, 55.0, 3.0),
        ]);
        let generated_at = Utc.with_ymd_and_hms(2026, 2, 3, 9, 30, 0).unwrap();

        let report =
            build_report(&dataset, &FirstAssessmentPredictor, "students.csv", generated_at)
                .unwrap();

        assert!(report.contains("Generated from students.csv at 2026-02-03 09:30 UTC"));
        assert!(report.contains("- Students: 2"));
        assert!(report.contains("- Predicted to pass (score >= 15): 1"));
        assert!(report.contains("- Math (Internal_Assessment_1): 14.00"));
        assert!(report.contains("- 0-60%: 1"));
        assert!(report.contains(
            "- Jules Moreno (no id) score 9.00: Improve attendance. | Focus on Internal 1 topics. | Engage more in class."
        ));
        assert!(!report.contains("Avery Lee (no id)"));
    }

    #[test]
    fn report_notes_when_nobody_fails() {
        let dataset = Dataset::new(vec![student("Avery Lee", 19.0, 91.0, 8.0)]);
        let report = build_report(
            &dataset,
            &FirstAssessmentPredictor,
            "students.csv",
            Utc::now(),
        )
        .unwrap();
        assert!(report.contains("No students are predicted to fail."));
    }
}
