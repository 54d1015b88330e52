//! Text normalization shared by question dedup and LV duplicate detection.

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "der", "die", "das", "den", "dem", "des", "ein", "eine", "einen", "einem", "einer", "und",
    "oder", "für", "mit", "von", "bei", "ist", "sind", "soll", "sollen", "werden", "wird", "sie",
    "ihr", "ihre", "ihren", "wie", "was", "welche", "welcher", "welches", "gibt", "bitte", "auch",
    "noch", "zum", "zur", "auf", "aus", "inkl", "inklusive",
];

/// Lowercase, collapse whitespace, drop punctuation.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Content tokens of a text, without stopwords and very short words.
pub fn tokens(text: &str) -> HashSet<String> {
    normalize(text)
        .split(' ')
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two token sets. Two empty sets are not similar.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_punctuation_and_case() {
        assert_eq!(normalize("  Wie groß ist die Fläche (in m²)? "), "wie groß ist die fläche in m²");
    }

    #[test]
    fn similar_questions_score_high() {
        let a = tokens("Welche Fliesenart wünschen Sie für die Wände?");
        let b = tokens("Welche Fliesenart wünschen Sie für die Wände im Bad?");
        assert!(jaccard(&a, &b) >= 0.6);
        let c = tokens("Soll die Dusche bodengleich sein?");
        assert!(jaccard(&a, &c) < 0.2);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }
}
