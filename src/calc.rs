use serde::Serialize;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::store::{AssessmentKind, EntityStore, Grade, GradeFilter};

/// Half-up rounding at two decimals for reported marks:
/// `Int(100*x + 0.5) / 100`
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// One graded row feeding the weighted overall mark. Ungraded rows never
/// become entries; callers filter them out first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEntry {
    pub grade: f64,
    pub weight: f64,
}

/// Weighted overall mark on the 0-100 scale:
/// `Σ(grade/100 × weight) / Σweight × 100`, rounded to two decimals.
/// Returns 0.0 when the total weight is zero, including the empty case.
pub fn overall_mark<I>(entries: I) -> f64
where
    I: IntoIterator<Item = WeightedEntry>,
{
    let mut mark = 0.0_f64;
    let mut total_weight = 0.0_f64;
    for e in entries {
        mark += e.grade / 100.0 * e.weight;
        total_weight += e.weight;
    }
    if total_weight == 0.0 {
        return 0.0;
    }
    round_off_2_decimals(mark / total_weight * 100.0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGradeReport {
    /// Every grade row, grouped under its assessment name.
    pub by_assessment: HashMap<String, Vec<Grade>>,
    /// Mean of the marked values per assessment, two decimals. An assessment
    /// whose rows are all unmarked has no entry here.
    pub averages: HashMap<String, f64>,
}

pub fn class_averages(all_grades: &[Grade]) -> ClassGradeReport {
    let mut by_assessment: HashMap<String, Vec<Grade>> = HashMap::new();
    for g in all_grades {
        by_assessment
            .entry(g.assessment_name.clone())
            .or_default()
            .push(g.clone());
    }

    let mut averages: HashMap<String, f64> = HashMap::new();
    for (name, grades) in &by_assessment {
        let marked: Vec<f64> = grades.iter().filter_map(|g| g.value).collect();
        if marked.is_empty() {
            continue;
        }
        let mean = marked.iter().sum::<f64>() / (marked.len() as f64);
        averages.insert(name.clone(), round_off_2_decimals(mean));
    }

    ClassGradeReport {
        by_assessment,
        averages,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub assessment_name: String,
    pub assessment_kind: AssessmentKind,
    pub value: Option<f64>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMarkReport {
    pub entries: Vec<MarkEntry>,
    pub overall_mark: f64,
}

/// Builds a student's full mark sheet: every grade row joined with its
/// assessment's weight, plus the weighted overall mark over the marked rows.
/// A grade whose assessment row is gone is a data integrity failure, not a
/// row to skip.
pub fn student_mark_report(
    store: &dyn EntityStore,
    student_username: &str,
) -> Result<StudentMarkReport, EngineError> {
    let grades = store.grades(&GradeFilter {
        student_username: Some(student_username.to_string()),
        ..GradeFilter::default()
    })?;

    let mut entries: Vec<MarkEntry> = Vec::with_capacity(grades.len());
    let mut weighted: Vec<WeightedEntry> = Vec::new();
    for g in grades {
        let assessment = store.assessment(&g.assessment_name)?.ok_or_else(|| {
            EngineError::integrity(format!(
                "grade references missing assessment '{}'",
                g.assessment_name
            ))
        })?;
        if let Some(v) = g.value {
            weighted.push(WeightedEntry {
                grade: v,
                weight: assessment.weight,
            });
        }
        entries.push(MarkEntry {
            assessment_name: g.assessment_name,
            assessment_kind: g.assessment_kind,
            value: g.value,
            weight: assessment.weight,
        });
    }

    let overall = overall_mark(weighted);
    Ok(StudentMarkReport {
        entries,
        overall_mark: overall,
    })
}

pub fn class_grade_report(store: &dyn EntityStore) -> Result<ClassGradeReport, EngineError> {
    let all = store.grades(&GradeFilter::default())?;
    Ok(class_averages(&all))
}
