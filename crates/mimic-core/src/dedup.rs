//! Content deduplication: bag-of-words overlap over whitespace/CJK-aware
//! tokens. No semantic model — determinism and testability over recall.

use std::collections::HashSet;

/// Window of the agent's most recent utterances checked at the strict
/// threshold.
pub const RECENT_WINDOW: usize = 5;
/// Overlap at or above this vs any recent utterance rejects the candidate.
pub const RECENT_THRESHOLD: f64 = 0.5;
/// Overlap at or above this vs any historical utterance rejects it.
pub const HISTORY_THRESHOLD: f64 = 0.6;

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'   // CJK Unified Ideographs
        | '\u{3400}'..='\u{4DBF}' // Extension A
        | '\u{F900}'..='\u{FAFF}' // Compatibility Ideographs
        | '\u{3040}'..='\u{30FF}' // Hiragana + Katakana
        | '\u{AC00}'..='\u{D7AF}' // Hangul Syllables
    )
}

/// Tokenize into lowercased ASCII-ish words (length > 1) plus CJK bigrams.
///
/// CJK runs become overlapping bigrams; a lone ideograph carries too little
/// signal and is dropped, matching the length-> 1 rule for words.
pub fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    let mut word = String::new();
    let mut cjk_run: Vec<char> = Vec::new();

    let mut flush_word = |word: &mut String, tokens: &mut HashSet<String>| {
        if word.chars().count() > 1 {
            tokens.insert(word.to_lowercase());
        }
        word.clear();
    };
    let mut flush_cjk = |run: &mut Vec<char>, tokens: &mut HashSet<String>| {
        for pair in run.windows(2) {
            tokens.insert(pair.iter().collect());
        }
        run.clear();
    };

    for c in text.chars() {
        if is_cjk(c) {
            flush_word(&mut word, &mut tokens);
            cjk_run.push(c);
        } else if c.is_alphanumeric() {
            flush_cjk(&mut cjk_run, &mut tokens);
            word.push(c);
        } else {
            flush_word(&mut word, &mut tokens);
            flush_cjk(&mut cjk_run, &mut tokens);
        }
    }
    flush_word(&mut word, &mut tokens);
    flush_cjk(&mut cjk_run, &mut tokens);
    tokens
}

/// Symmetric bag-of-words overlap: `|A ∩ B| / min(|A|, |B|)`.
pub fn overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / a.len().min(b.len()) as f64
}

/// Whether a candidate utterance is too close to what the agent already said.
///
/// Two independent checks: the strict-recency check against the last
/// [`RECENT_WINDOW`] utterances at [`RECENT_THRESHOLD`], and the historical
/// check against everything at [`HISTORY_THRESHOLD`].
pub fn is_too_similar(candidate: &str, recent: &[String], historical: &[String]) -> bool {
    let cand = tokenize(candidate);
    if cand.is_empty() {
        return false;
    }

    let recent_hit = recent
        .iter()
        .rev()
        .take(RECENT_WINDOW)
        .any(|prev| overlap_ratio(&cand, &tokenize(prev)) >= RECENT_THRESHOLD);
    if recent_hit {
        return true;
    }

    historical
        .iter()
        .any(|prev| overlap_ratio(&cand, &tokenize(prev)) >= HISTORY_THRESHOLD)
}
