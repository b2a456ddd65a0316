use crate::anomaly::{AnomalyFinding, Severity};
use crate::resolver::ColumnMapping;
use serde::{Deserialize, Serialize};

const MAPPING_RATE_FLOOR: f64 = 80.0;
const MAPPING_PENALTY_PER_POINT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 70.0 {
            Grade::B
        } else if score >= 50.0 {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::A => "Excellent",
            Grade::B => "Good",
            Grade::C => "Fair",
            Grade::D => "Needs attention",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl AnomalyCounts {
    pub fn tally(anomalies: &[AnomalyFinding]) -> Self {
        anomalies
            .iter()
            .fold(Self::default(), |mut counts, finding| {
                match finding.severity {
                    Severity::High => counts.high += 1,
                    Severity::Medium => counts.medium += 1,
                    Severity::Low => counts.low += 1,
                }
                counts
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub score: f64,
    pub grade: Grade,
    pub grade_label: String,
    pub mapping_rate: f64,
    pub anomaly_counts: AnomalyCounts,
    pub details: Vec<String>,
}

impl QualityScore {
    pub fn assess(
        mapping: &ColumnMapping,
        observed_columns: usize,
        anomalies: &[AnomalyFinding],
    ) -> Self {
        Self::from_counts(mapping.len(), observed_columns, AnomalyCounts::tally(anomalies))
    }

    pub fn from_counts(mapped: usize, observed: usize, counts: AnomalyCounts) -> Self {
        let mapping_rate = if observed == 0 {
            0.0
        } else {
            mapped as f64 / observed as f64 * 100.0
        };

        let mut score = 100.0;
        let mut details = Vec::new();

        if mapping_rate < MAPPING_RATE_FLOOR {
            let penalty = (MAPPING_RATE_FLOOR - mapping_rate) * MAPPING_PENALTY_PER_POINT;
            score -= penalty;
            details.push(format!("Column mapping rate {:.1}% (-{:.1})", mapping_rate, penalty));
        }

        for (count, weight, label) in [
            (counts.high, 10, "High-severity anomalies"),
            (counts.medium, 5, "Medium-severity anomalies"),
            (counts.low, 2, "Low-severity anomalies"),
        ] {
            if count > 0 {
                let penalty = count * weight;
                score -= penalty as f64;
                details.push(format!("{}: {} (-{})", label, count, penalty));
            }
        }

        let score = round1(score.clamp(0.0, 100.0));
        let grade = Grade::from_score(score);

        Self {
            score,
            grade,
            grade_label: grade.label().to_string(),
            mapping_rate: round1(mapping_rate),
            anomaly_counts: counts,
            details,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
