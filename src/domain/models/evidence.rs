//! External evidence used for automatic verification and rating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of independently-checkable evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceKind {
    OlympiadResult,
    Assessment,
    Certificate,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OlympiadResult => "olympiad-result",
            Self::Assessment => "assessment",
            Self::Certificate => "certificate",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "olympiad-result" | "olympiad" => Some(Self::OlympiadResult),
            "assessment" | "test" => Some(Self::Assessment),
            "certificate" => Some(Self::Certificate),
            _ => None,
        }
    }
}

/// A reference from block content to a piece of evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceReference {
    pub kind: EvidenceKind,
    pub reference_id: String,
}

impl EvidenceReference {
    pub fn new(kind: EvidenceKind, reference_id: impl Into<String>) -> Self {
        Self {
            kind,
            reference_id: reference_id.into(),
        }
    }
}

/// A stored piece of evidence held by a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    pub kind: EvidenceKind,
    pub reference_id: String,
    pub student_id: Uuid,
    /// Normalized score in [0, 100] where the source provides one.
    pub score: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl EvidenceRecord {
    pub fn new(kind: EvidenceKind, reference_id: impl Into<String>, student_id: Uuid) -> Self {
        Self {
            kind,
            reference_id: reference_id.into(),
            student_id,
            score: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Result of looking a reference up in the evidence store.
#[derive(Debug, Clone, PartialEq)]
pub enum EvidenceLookup {
    Found(EvidenceRecord),
    NotFound,
}

/// Aggregated signals feeding the rating engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSignals {
    pub olympiad_results: u32,
    pub assessments: u32,
    pub average_assessment_score: Option<f64>,
    pub certificates: u32,
}
