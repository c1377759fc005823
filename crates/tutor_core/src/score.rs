//! crates/tutor_core/src/score.rs
//!
//! Extracts the awarded/maximum mark pair from the model's free-text reply.

use std::sync::OnceLock;

use regex::Regex;

fn score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)score:\s*(\d+)\s*/\s*(\d+)").unwrap())
}

/// Parses the awarded marks out of a reply.
///
/// Searches for a case-insensitive `Score: <awarded>/<max>` pattern anywhere
/// in the text. The first captured integer is the awarded marks; the echoed
/// denominator is informational only — the authoritative maximum is the
/// question's own `max_marks`, and the awarded value is clamped to it. No
/// match (or an unparseable number) defaults to 0: the extractor never
/// guesses partial credit from prose.
pub fn extract_score(reply: &str, max_marks: u32) -> u32 {
    let awarded = score_pattern()
        .captures(reply)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .unwrap_or(0);
    awarded.min(max_marks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_score_embedded_in_prose() {
        let reply = "Nice try! You covered most of it.\nScore: 2/3\nYou missed the role of sunlight. Next question: ...";
        assert_eq!(extract_score(reply, 3), 2);
    }

    #[test]
    fn matching_is_case_insensitive_and_whitespace_tolerant() {
        assert_eq!(extract_score("SCORE: 4 / 5", 5), 4);
        assert_eq!(extract_score("score:3/5", 5), 3);
    }

    #[test]
    fn round_trips_arbitrary_pairs() {
        for (awarded, max) in [(0u32, 1u32), (1, 1), (2, 3), (5, 5), (7, 10)] {
            let reply = format!("Well done. Score: {}/{} — keep going!", awarded, max);
            assert_eq!(extract_score(&reply, max), awarded);
        }
    }

    #[test]
    fn no_pattern_defaults_to_zero() {
        assert_eq!(extract_score("That was a great answer, full marks!", 5), 0);
        assert_eq!(extract_score("", 5), 0);
    }

    #[test]
    fn model_denominator_is_informational_only() {
        // The model echoed the wrong denominator; the question's own max rules.
        assert_eq!(extract_score("Score: 2/10", 3), 2);
    }

    #[test]
    fn awarded_is_clamped_to_the_question_max() {
        assert_eq!(extract_score("Score: 9/3", 3), 3);
    }

    #[test]
    fn first_occurrence_wins() {
        let reply = "Score: 1/3 ... and if you had added detail it could have been Score: 3/3.";
        assert_eq!(extract_score(reply, 3), 1);
    }
}
