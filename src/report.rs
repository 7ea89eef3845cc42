use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Duration, Utc};

use crate::models::{AssessmentRecord, RiskLevel, TierSummary};

pub fn cutoff(since_days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(since_days.max(1))
}

/// Every tier, including empty ones, from High down to Low.
pub fn summarize_by_tier(records: &[AssessmentRecord]) -> Vec<TierSummary> {
    let mut totals = [(0usize, 0u64); 3];
    for record in records {
        let entry = &mut totals[record.risk_level.index()];
        entry.0 += 1;
        entry.1 += u64::from(record.risk_score);
    }

    RiskLevel::ALL
        .into_iter()
        .rev()
        .map(|risk_level| {
            let (count, total_score) = totals[risk_level.index()];
            TierSummary {
                risk_level,
                count,
                avg_score: if count == 0 {
                    0.0
                } else {
                    total_score as f64 / count as f64
                },
            }
        })
        .collect()
}

/// Highest tier first, then highest confidence, then most recent.
pub fn rank_by_risk(records: &[AssessmentRecord]) -> Vec<&AssessmentRecord> {
    let mut ranked: Vec<&AssessmentRecord> = records.iter().collect();
    ranked.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then(b.risk_score.cmp(&a.risk_score))
            .then(b.recorded_at.cmp(&a.recorded_at))
    });
    ranked
}

/// Recommendation text with how many records received it, most common first.
pub fn recommendation_counts(records: &[AssessmentRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        for advice in &record.recommendations {
            *counts.entry(advice.as_str()).or_insert(0) += 1;
        }
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(advice, count)| (advice.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

pub fn build_report(since_days: i64, cutoff: DateTime<Utc>, records: &[AssessmentRecord]) -> String {
    let summaries = summarize_by_tier(records);
    let ranked = rank_by_risk(records);

    let mut output = String::new();

    let _ = writeln!(output, "# Dropout Risk Report");
    let _ = writeln!(
        output,
        "Assessments from the last {} days (since {})",
        since_days.max(1),
        cutoff.format("%Y-%m-%d")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Tier Mix");

    if records.is_empty() {
        let _ = writeln!(output, "No assessments recorded for this window.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} students (avg confidence {:.1}%)",
                summary.risk_level, summary.count, summary.avg_score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    if ranked.is_empty() {
        let _ = writeln!(output, "No students assessed in this window.");
    } else {
        for record in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({} risk, {}% confidence): attendance {:.0}%, GPA {:.1}, stress {:.0}/10",
                record.name,
                record.risk_level,
                record.risk_score,
                record.observation.attendance,
                record.observation.gpa,
                record.observation.stress
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Frequent Recommendations");

    let advice = recommendation_counts(records);
    if advice.is_empty() {
        let _ = writeln!(output, "No recommendations issued for this window.");
    } else {
        for (text, count) in advice.iter().take(5) {
            let _ = writeln!(output, "- ({count}) {text}");
        }
    }

    let mut recent: Vec<&AssessmentRecord> = records.iter().collect();
    recent.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Assessments");

    if recent.is_empty() {
        let _ = writeln!(output, "No assessments recorded for this window.");
    } else {
        for record in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} on {}: {} ({}%)",
                record.name,
                record.recorded_at.format("%Y-%m-%d %H:%M"),
                record.risk_level,
                record.risk_score
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentObservation;
    use uuid::Uuid;

    fn record(name: &str, level: RiskLevel, score: u8, hours_ago: i64) -> AssessmentRecord {
        AssessmentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            observation: StudentObservation::new(70.0, 6.5, 5.0, 6.0, 40_000.0).unwrap(),
            risk_level: level,
            risk_score: score,
            recommendations: vec![format!("advice for {}", level)],
            recorded_at: Utc::now() - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn tiers_summarize_counts_and_average_confidence() {
        let records = vec![
            record("Avery", RiskLevel::High, 80, 1),
            record("Jules", RiskLevel::High, 60, 2),
            record("Kiara", RiskLevel::Low, 90, 3),
        ];
        let summaries = summarize_by_tier(&records);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].risk_level, RiskLevel::High);
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].avg_score - 70.0).abs() < 1e-9);
        assert_eq!(summaries[1].count, 0);
        assert_eq!(summaries[1].avg_score, 0.0);
    }

    #[test]
    fn ranking_puts_high_tier_first() {
        let records = vec![
            record("Kiara", RiskLevel::Low, 99, 1),
            record("Jules", RiskLevel::High, 55, 2),
            record("Avery", RiskLevel::High, 75, 3),
            record("Sam", RiskLevel::Medium, 70, 4),
        ];
        let ranked = rank_by_risk(&records);
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Avery", "Jules", "Sam", "Kiara"]);
    }

    #[test]
    fn recommendation_counts_are_sorted() {
        let records = vec![
            record("Avery", RiskLevel::High, 80, 1),
            record("Jules", RiskLevel::High, 60, 2),
            record("Kiara", RiskLevel::Low, 90, 3),
        ];
        let counts = recommendation_counts(&records);
        assert_eq!(counts[0], ("advice for High".to_string(), 2));
        assert_eq!(counts[1], ("advice for Low".to_string(), 1));
    }

    #[test]
    fn report_lists_sections() {
        let records = vec![record("Avery", RiskLevel::High, 80, 1)];
        let report = build_report(30, cutoff(30), &records);
        assert!(report.starts_with("# Dropout Risk Report"));
        assert!(report.contains("- High: 1 students (avg confidence 80.0%)"));
        assert!(report.contains("- Avery (High risk, 80% confidence)"));
        assert!(report.contains("- (1) advice for High"));
    }

    #[test]
    fn empty_report_explains_itself() {
        let report = build_report(7, cutoff(7), &[]);
        assert!(report.contains("No assessments recorded for this window."));
        assert!(report.contains("No students assessed in this window."));
    }

    #[test]
    fn cutoff_respects_since_days() {
        let expected = Utc::now() - Duration::days(14);
        assert!((cutoff(14) - expected).num_seconds().abs() <= 1);
        assert!(cutoff(0) < Utc::now() - Duration::hours(23));
    }
}
