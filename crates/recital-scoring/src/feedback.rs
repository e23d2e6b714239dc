//! Rule-based coaching lines derived from a score report.

use recital_core::{ScoreReport, ScoringConfig};

const MAX_LISTED_WORDS: usize = 5;

/// Deterministic coaching feedback. The first line always rates the overall
/// score; the rest only appear when the report gives a reason for them.
/// Pace advice follows the ideal speaking band of `config`.
pub fn suggestions(report: &ScoreReport, config: &ScoringConfig) -> Vec<String> {
    let b = &report.breakdown;
    let mut lines = Vec::new();

    lines.push(
        match b.overall {
            o if o >= 0.85 => "Excellent recitation!",
            o if o >= 0.70 => "Good recitation, with a few spots to polish.",
            o if o >= 0.55 => "Decent attempt. There is room to improve.",
            _ => "Keep practicing. Regular practice will raise your score.",
        }
        .to_string(),
    );

    if b.accuracy < 0.70 {
        lines.push("Review the text again so that every word is memorized.".to_string());
    } else if b.accuracy < 0.85 {
        lines.push("A few words differed from the text; go over them once more.".to_string());
    }

    if b.pronunciation < 0.70 {
        lines.push("Speak each word clearly; slowing down can help.".to_string());
    }
    if !report.mispronounced_words.is_empty() {
        lines.push(format!(
            "Pay attention to the pronunciation of: {}",
            listed(&report.mispronounced_words)
        ));
    }

    if b.fluency < 0.70 {
        match report.speaking_rate_wpm {
            Some(wpm) if wpm < config.ideal_wpm_min => lines.push(format!(
                "Your pace was {:.0} words per minute; try to speak a little faster and pause less.",
                wpm
            )),
            Some(wpm) if wpm > config.ideal_wpm_max => lines.push(format!(
                "Your pace was {:.0} words per minute; slow down so each word is clear.",
                wpm
            )),
            _ => lines.push("Reduce unnecessary pauses to make the recitation flow.".to_string()),
        }
    }

    if !report.missing_words.is_empty() {
        lines.push(format!(
            "Don't skip these words: {}",
            listed(&report.missing_words)
        ));
    }
    if !report.extra_words.is_empty() {
        lines.push("Avoid adding words that are not in the text.".to_string());
    }

    lines
}

fn listed(words: &[String]) -> String {
    words
        .iter()
        .take(MAX_LISTED_WORDS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
