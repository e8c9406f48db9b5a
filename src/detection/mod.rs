pub mod fusion;
pub mod splicing;

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    /// Buckets a 0-100 confidence.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 20.0 => ConfidenceLevel::None,
            s if s < 40.0 => ConfidenceLevel::Low,
            s if s < 60.0 => ConfidenceLevel::Medium,
            s if s < 80.0 => ConfidenceLevel::High,
            _ => ConfidenceLevel::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    #[serde(rename = "copy-move")]
    CopyMove,
    #[serde(rename = "splicing")]
    Splicing,
    #[serde(rename = "authentic")]
    Authentic,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::CopyMove => "copy-move",
            ResultType::Splicing => "splicing",
            ResultType::Authentic => "authentic",
        }
    }

    pub fn is_tampered(&self) -> bool {
        !matches!(self, ResultType::Authentic)
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
