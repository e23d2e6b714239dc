/// Ratcliff/Obershelp similarity of two words, in [0,1].
///
/// `2*M / (|a| + |b|)` where `M` is the number of characters in the matching
/// blocks found by repeatedly taking the longest common substring and
/// recursing on both sides of it. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_characters(&a[..i], &b[..j])
        + matching_characters(&a[i + len..], &b[j + len..])
}

/// Longest common substring as `(start_a, start_b, len)`. Ties go to the
/// earliest start in `a`, then in `b`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // run[j + 1] = length of the common run ending at a[i], b[j]
    let mut prev = vec![0usize; b.len() + 1];
    let mut run = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            run[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let len = run[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut run);
    }

    best
}
