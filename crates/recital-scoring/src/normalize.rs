//! Text normalization shared by the reference and the transcript.

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Drop punctuation and lowercase. Alphanumerics, whitespace, `_` and CJK
/// ideographs survive.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_' || is_cjk(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize and split into words.
///
/// Text that is mostly CJK is split per ideograph since it carries no word
/// separators; everything else is split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);

    let mut visible = 0usize;
    let mut cjk = 0usize;
    for c in normalized.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if is_cjk(c) {
            cjk += 1;
        }
    }

    if visible > 0 && cjk * 2 > visible {
        normalized
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(String::from)
            .collect()
    } else {
        normalized.split_whitespace().map(str::to_string).collect()
    }
}
