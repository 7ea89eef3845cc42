use crate::models::{RiskLevel, StudentObservation};

pub const MIN_RECOMMENDATIONS: usize = 3;
pub const MAX_RECOMMENDATIONS: usize = 5;

pub const ATTENDANCE_ADVICE: &str = "Improve attendance by setting up a consistent daily routine and identifying barriers to class participation.";
pub const TUTORING_ADVICE: &str = "Consider academic tutoring or study groups to improve your GPA and understanding of course material.";
pub const PARTICIPATION_ADVICE: &str = "Increase class participation by preparing questions beforehand and engaging with course discussions.";
pub const STRESS_ADVICE: &str = "Practice stress management techniques such as meditation, exercise, or speaking with a counselor.";
pub const FINANCIAL_AID_ADVICE: &str = "Explore financial aid options, scholarships, and part-time work opportunities to reduce financial stress.";

pub const HIGH_TIER_ADVICE: &str = "Schedule an immediate meeting with an academic advisor to create a comprehensive support plan.";
pub const MEDIUM_TIER_ADVICE: &str = "Consider joining study groups and utilizing campus support services proactively.";
pub const LOW_TIER_ADVICE: &str = "Continue your excellent work and consider mentoring other students who may need support.";

pub const GENERAL_ADVICE: [&str; 5] = [
    "Maintain a healthy work-life balance to support your academic success.",
    "Build strong relationships with professors and classmates for academic and social support.",
    "Take advantage of campus resources such as the library, career center, and wellness programs.",
    "Set specific, measurable academic goals and track your progress regularly.",
    "Develop effective time management skills to balance coursework and personal responsibilities.",
];

/// Signal rules, evaluated in this order.
fn signal_rules(o: &StudentObservation) -> [(bool, &'static str); 5] {
    [
        (o.attendance < 75.0, ATTENDANCE_ADVICE),
        (o.gpa < 6.0, TUTORING_ADVICE),
        (o.participation < 5.0, PARTICIPATION_ADVICE),
        (o.stress > 7.0, STRESS_ADVICE),
        (o.family_income < 30_000.0, FINANCIAL_AID_ADVICE),
    ]
}

pub fn tier_advice(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => HIGH_TIER_ADVICE,
        RiskLevel::Medium => MEDIUM_TIER_ADVICE,
        RiskLevel::Low => LOW_TIER_ADVICE,
    }
}

/// Ordered advice for one student: triggered signal rules, then the tier
/// advice, backfilled from the general pool to three and cut to five.
pub fn recommend(observation: &StudentObservation, level: RiskLevel) -> Vec<String> {
    let mut advice: Vec<&'static str> = signal_rules(observation)
        .into_iter()
        .filter_map(|(triggered, text)| triggered.then_some(text))
        .collect();
    advice.push(tier_advice(level));

    for general in GENERAL_ADVICE {
        if advice.len() >= MIN_RECOMMENDATIONS {
            break;
        }
        if !advice.contains(&general) {
            advice.push(general);
        }
    }

    advice.truncate(MAX_RECOMMENDATIONS);
    advice.into_iter().map(str::to_string).collect()
}
