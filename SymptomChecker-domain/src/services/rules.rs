//! Keyword rule engine
//!
//! Free text is normalized (lowercased, common misspellings and lay phrases
//! mapped to canonical keywords, punctuation dropped) and then matched
//! against an ordered keyword → conditions table.

use once_cell::sync::Lazy;
use regex::Regex;

/// Lay phrases and misspellings, applied in order
const SYNONYMS: &[(&str, &str)] = &[
    ("throwing up", "vomiting"),
    ("throw up", "vomiting"),
    ("belly ache", "abdominal pain"),
    ("stomach ache", "abdominal pain"),
    ("feverish", "fever"),
    ("breathless", "shortness of breath"),
    ("light headed", "lightheaded"),
    ("soar throat", "sore throat"),
    ("soar", "sore"),
    ("feaver", "fever"),
    ("temprature", "temperature"),
];

/// Keyword → candidate conditions, in match order
const RULES: &[(&str, &[&str])] = &[
    ("fever", &["flu", "infection"]),
    ("sore throat", &["throat infection", "cold"]),
    ("vomiting", &["food poisoning", "gastroenteritis"]),
    ("cough", &["cold", "bronchitis"]),
    ("headache", &["migraine", "stress"]),
    ("fatigue", &["anemia", "stress", "sleep deprivation"]),
];

/// Score given to every keyword match
pub const RULE_MATCH_SCORE: f64 = 1.0;

static NON_LETTERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-z\s]").expect("static pattern is valid")
});

/// A condition suggested by the rule table
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub condition: &'static str,
    pub score: f64,
    /// Keyword that triggered the match
    pub keyword: &'static str,
}

/// Lowercase, map synonyms, and replace everything but letters and whitespace
pub fn normalize_text(text: &str) -> String {
    let mut text = text.to_lowercase();
    for (from, to) in SYNONYMS {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }
    NON_LETTERS.replace_all(&text, " ").trim().to_string()
}

/// Match normalized text against the rule table.
///
/// Conditions are returned in rule order. A condition shared by several
/// matching keywords appears once per keyword.
pub fn infer_conditions(symptoms: &str) -> Vec<RuleMatch> {
    let text = normalize_text(symptoms);
    let mut matches: Vec<RuleMatch> = Vec::new();

    for (keyword, conditions) in RULES {
        if !text.contains(keyword) {
            continue;
        }
        for condition in conditions.iter() {
            matches.push(RuleMatch {
                condition: *condition,
                score: RULE_MATCH_SCORE,
                keyword: *keyword,
            });
        }
    }

    matches
}
