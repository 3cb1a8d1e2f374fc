use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Disclaimer attached to every generated assessment
pub const DISCLAIMER: &str = "Educational only. Not medical advice.";

/// Condition name used when no engine could produce a confident answer
pub const UNCLEAR_CONDITION: &str = "Unclear — further questions required";

/// Confidence level reported for a probable condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Value")]
pub enum Confidence {
    Low,
    Medium,
    High,
    /// Any label the model produced that is not one of the above
    Unknown,
}

impl Confidence {
    /// Parse a confidence label, case-insensitively
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" => Confidence::Low,
            "medium" => Confidence::Medium,
            "high" => Confidence::High,
            _ => Confidence::Unknown,
        }
    }

    /// Relative score assumed when a condition arrives without one
    pub fn default_score(self) -> f64 {
        match self {
            Confidence::High => 0.75,
            Confidence::Medium => 0.5,
            Confidence::Low => 0.25,
            Confidence::Unknown => 0.33,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
            Confidence::Unknown => "unknown",
        }
    }
}

/// Labels arrive as strings, but models sometimes send numbers instead
impl From<Value> for Confidence {
    fn from(label: Value) -> Self {
        match label {
            Value::String(label) => Confidence::parse(&label),
            _ => Confidence::Unknown,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreValue {
    Number(f64),
    Text(String),
}

/// Accept a number, a numeric string, or null (scored 0.0)
fn deserialize_relative_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ScoreValue>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(ScoreValue::Number(score)) => Ok(score),
        Some(ScoreValue::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("relative_score is not a number: {:?}", text))),
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A probable condition with its rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Name of the condition
    pub condition: String,

    /// Short explanation of why it was suggested
    pub rationale: String,

    /// Qualitative confidence
    pub confidence: Confidence,

    /// Relative score in [0, 1]
    #[serde(default, deserialize_with = "deserialize_relative_score")]
    pub relative_score: f64,
}

impl Condition {
    pub fn new(condition: impl Into<String>, rationale: impl Into<String>, confidence: Confidence, relative_score: f64) -> Self {
        Self {
            condition: condition.into(),
            rationale: rationale.into(),
            confidence,
            relative_score,
        }
    }
}

/// Structured answer to a symptom check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomResponse {
    /// The symptoms as submitted
    pub input: String,

    /// Probable conditions, best first
    pub probable_conditions: Vec<Condition>,

    /// Suggested next steps
    pub recommended_next_steps: Vec<String>,

    /// Educational-use disclaimer
    pub disclaimer: String,

    /// Diagnostic notes from parsing, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SymptomResponse {
    /// The highest ranked condition, if any
    pub fn top_condition(&self) -> Option<&Condition> {
        self.probable_conditions.first()
    }
}

/// Engine that produced an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Emergency keyword short-circuit
    Emergency,
    /// Keyword rule table
    RuleBased,
    /// Language model answer that parsed and validated
    Llm,
    /// Language model was tried but its answer was unusable
    Fallback,
    /// Language model disabled for the request
    NoLlm,
}

impl Engine {
    pub const ALL: [Engine; 5] = [
        Engine::Emergency,
        Engine::RuleBased,
        Engine::Llm,
        Engine::Fallback,
        Engine::NoLlm,
    ];

    /// Stored name of the engine
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Emergency => "emergency",
            Engine::RuleBased => "rule_based",
            Engine::Llm => "llm",
            Engine::Fallback => "fallback",
            Engine::NoLlm => "no_llm",
        }
    }

    /// Parse a stored engine name
    pub fn parse(name: &str) -> Option<Self> {
        Engine::ALL.into_iter().find(|engine| engine.as_str() == name)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
