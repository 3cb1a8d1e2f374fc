/// Phrases that short-circuit every other engine
pub const EMERGENCY_PHRASES: &[&str] = &[
    "chest pain",
    "severe chest pain",
    "difficulty breathing",
    "shortness of breath",
    "unconscious",
    "severe bleeding",
    "fainting",
];

/// Return the first emergency phrase contained in the lowercased input.
///
/// Runs on the raw text, before synonym normalization.
pub fn detect_emergency(symptoms: &str) -> Option<&'static str> {
    let text = symptoms.to_lowercase();
    EMERGENCY_PHRASES.iter().copied().find(|phrase| text.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_phrase_case_insensitively() {
        assert_eq!(detect_emergency("Sudden CHEST PAIN after running"), Some("chest pain"));
        assert_eq!(detect_emergency("felt like fainting"), Some("fainting"));
    }

    #[test]
    fn test_no_emergency() {
        assert_eq!(detect_emergency("mild fever and sore throat"), None);
    }

    #[test]
    fn test_synonyms_are_not_applied() {
        // "breathless" normalizes to "shortness of breath" for the rule engine only
        assert_eq!(detect_emergency("a bit breathless"), None);
    }
}
