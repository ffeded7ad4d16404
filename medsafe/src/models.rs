use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Structured prescription analysis as declared by the analysis schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub summary: String,
    #[serde(default)]
    pub interactions: Vec<AnalysisInteraction>,
    #[serde(default)]
    pub medications: Vec<Medication>,
}

/// Interaction entry inside an [`AnalysisResult`]; severity is free text here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisInteraction {
    pub drugs: Vec<String>,
    pub severity: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default)]
    pub dosage_analysis: Option<DosageAnalysis>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl Medication {
    /// The verified status, or `None` when the verdict is missing, not text,
    /// or outside the closed set.
    pub fn dosage_status(&self) -> Option<DosageStatus> {
        self.dosage_analysis
            .as_ref()?
            .status
            .as_str()
            .and_then(DosageStatus::parse)
    }

    pub fn recommendation(&self) -> &str {
        self.dosage_analysis
            .as_ref()
            .map(|analysis| analysis.recommendation.as_str())
            .unwrap_or_default()
    }
}

/// Dosage verdict as received. `status` is kept as raw JSON so that a
/// missing, non-text or unknown value flags one medication instead of
/// failing the whole analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageAnalysis {
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DosageStatus {
    Correct,
    Warning,
    Incorrect,
}

impl DosageStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Correct" => Some(Self::Correct),
            "Warning" => Some(Self::Warning),
            "Incorrect" => Some(Self::Incorrect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "Correct",
            Self::Warning => "Warning",
            Self::Incorrect => "Incorrect",
        }
    }
}

impl fmt::Display for DosageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One drug-drug interaction returned by the grounded checker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    pub drugs: Vec<String>,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[serde(alias = "moderate", alias = "MODERATE")]
    Moderate,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::High => "High",
            Severity::Moderate => "Moderate",
            Severity::Low => "Low",
        };
        f.write_str(label)
    }
}

/// A web source that grounded a search-augmented answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl Citation {
    pub fn is_renderable(&self) -> bool {
        self.uri.as_deref().is_some_and(|uri| !uri.trim().is_empty())
    }

    /// Title when present, otherwise the uri.
    pub fn label(&self) -> Option<&str> {
        let uri = self.uri.as_deref().filter(|u| !u.trim().is_empty())?;
        Some(
            self.title
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(uri),
        )
    }
}

/// Keeps only citations that carry a uri, preserving order.
pub fn renderable_citations(citations: &[Citation]) -> Vec<Citation> {
    citations
        .iter()
        .filter(|c| c.is_renderable())
        .cloned()
        .collect()
}

/// Result of the grounded interaction check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionReport {
    pub interactions: Vec<InteractionRecord>,
    pub sources: Vec<Citation>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}
