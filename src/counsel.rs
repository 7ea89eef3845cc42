//! Keyword-matched counselling replies. A static table, first match wins.

use crate::synth::RandomSource;

pub const DEFAULT_RESPONSE: &str = "Thank you for sharing that with me. I'm here to support you through your academic journey. While I can provide general guidance and resources, please remember that for serious concerns, it's always best to speak with a human counselor or mental health professional. Is there a specific area you'd like to discuss, such as stress management, study techniques, or academic planning?";

const RESPONSES: &[(&str, &[&str])] = &[
    (
        "stress",
        &[
            "I understand you're feeling stressed. It's completely normal to feel overwhelmed sometimes. Here are some strategies that might help: 1) Take deep breaths and practice mindfulness, 2) Break large tasks into smaller, manageable steps, 3) Make sure you're getting enough sleep and exercise, 4) Don't hesitate to reach out to friends, family, or counselors for support.",
            "Stress is a common experience for students. Remember that it's okay to ask for help. Consider talking to a counselor, practicing relaxation techniques, or adjusting your study schedule to be more manageable.",
        ],
    ),
    (
        "exam",
        &[
            "Exam anxiety is very common! Here are some tips: 1) Create a study schedule and stick to it, 2) Use active learning techniques like flashcards or teaching others, 3) Take regular breaks during study sessions, 4) Get plenty of sleep before the exam, 5) Practice relaxation techniques if you feel anxious.",
            "Preparing for exams can be challenging. Try breaking your study material into smaller chunks, use the Pomodoro technique (25 minutes study, 5 minutes break), and don't forget to take care of your physical health too.",
        ],
    ),
    (
        "dropout",
        &[
            "I'm concerned to hear you're considering dropping out. This is a big decision that deserves careful consideration. Let's talk about what's making you feel this way. Are there specific challenges you're facing? Remember, there are often resources and support systems available to help you succeed. Would you like to discuss some alternatives or support options?",
            "Thinking about dropping out can be overwhelming. Before making this decision, let's explore what support is available to you. Many students face similar challenges, and there are often solutions we haven't considered yet. What specific issues are you dealing with?",
        ],
    ),
    (
        "time",
        &[
            "Time management is a crucial skill for academic success. Here are some strategies: 1) Use a planner or digital calendar, 2) Prioritize tasks using the Eisenhower Matrix (urgent/important), 3) Set specific goals for each study session, 4) Eliminate distractions during study time, 5) Don't forget to schedule breaks and self-care time.",
            "Managing time effectively can make a huge difference in your academic performance and stress levels. Try the time-blocking method: assign specific time slots for different activities, including study, meals, exercise, and relaxation.",
        ],
    ),
    (
        "help",
        &[
            "I'm here to support you! I can help with academic stress, study strategies, time management, and general student concerns. What specific area would you like to discuss?",
            "You've taken a great step by reaching out for help. I'm here to listen and provide guidance on various topics including stress management, academic challenges, and personal concerns. What's on your mind today?",
        ],
    ),
];

pub fn respond<R: RandomSource + ?Sized>(message: &str, rng: &mut R) -> &'static str {
    let message = message.to_lowercase();
    RESPONSES
        .iter()
        .find(|(keyword, _)| message.contains(keyword))
        .and_then(|(_, pool)| pool.get(rng.next_index(pool.len())).copied())
        .unwrap_or(DEFAULT_RESPONSE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SeededRandom;

    struct Pick(usize);

    impl RandomSource for Pick {
        fn next_f64(&mut self) -> f64 {
            0.0
        }

        fn next_index(&mut self, bound: usize) -> usize {
            self.0.min(bound - 1)
        }

        fn next_normal(&mut self) -> f64 {
            0.0
        }
    }

    #[test]
    fn matches_keyword_case_insensitively() {
        let reply = respond("My EXAM is tomorrow", &mut Pick(0));
        assert!(reply.starts_with("Exam anxiety"));
        let reply = respond("my exam is tomorrow", &mut Pick(1));
        assert!(reply.starts_with("Preparing for exams"));
    }

    #[test]
    fn earlier_keywords_win() {
        // "stress" precedes "exam" in the table.
        let reply = respond("exam stress is killing me", &mut Pick(0));
        assert!(reply.starts_with("I understand you're feeling stressed"));
    }

    #[test]
    fn unmatched_messages_get_the_default() {
        assert_eq!(respond("hello there", &mut SeededRandom::new(1)), DEFAULT_RESPONSE);
    }

    #[test]
    fn seeded_replies_are_reproducible() {
        let a = respond("I need help", &mut SeededRandom::new(11));
        let b = respond("I need help", &mut SeededRandom::new(11));
        assert_eq!(a, b);
    }
}
