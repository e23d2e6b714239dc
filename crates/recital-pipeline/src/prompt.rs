use recital_core::{ScoreReport, TranscriptionResult};
use std::fmt::Write;

/// Words listed per category before the prompt truncates.
const MAX_LISTED_WORDS: usize = 10;

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

fn word_list(words: &[String]) -> String {
    if words.is_empty() {
        return "none".to_string();
    }
    let mut listed = words
        .iter()
        .take(MAX_LISTED_WORDS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if words.len() > MAX_LISTED_WORDS {
        let _ = write!(listed, " (and {} more)", words.len() - MAX_LISTED_WORDS);
    }
    listed
}

/// Prompt asking the language model for a short coaching summary of one recitation.
pub fn build_summary_prompt(
    reference_text: &str,
    transcript: &TranscriptionResult,
    report: &ScoreReport,
) -> String {
    let scores = &report.breakdown;
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are a reading coach. A student recited the text below; review the result."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Reference text:\n{}", reference_text.trim());
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Recognized speech:\n{}", transcript.text.trim());
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Scores: overall {}, accuracy {}, fluency {}, pronunciation {}.",
        percent(scores.overall),
        percent(scores.accuracy),
        percent(scores.fluency),
        percent(scores.pronunciation)
    );
    if let Some(wpm) = report.speaking_rate_wpm {
        let _ = writeln!(
            prompt,
            "Speaking rate: {:.0} words per minute, {} long pauses.",
            wpm, report.long_pauses
        );
    }
    let _ = writeln!(prompt, "Missed words: {}.", word_list(&report.missing_words));
    let _ = writeln!(
        prompt,
        "Mispronounced words: {}.",
        word_list(&report.mispronounced_words)
    );
    let _ = writeln!(prompt, "Extra words: {}.", word_list(&report.extra_words));
    let _ = writeln!(prompt);
    let _ = write!(
        prompt,
        "Write an encouraging summary of three to five sentences addressed to the student. \
         Mention what went well and the most important thing to practise next. \
         Answer in the language of the reference text and do not repeat the scores verbatim."
    );

    prompt
}
