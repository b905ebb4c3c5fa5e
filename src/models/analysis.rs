//! Structured financial analysis produced from an earnings-call transcript.
//!
//! The shape is fixed: every field the analyst prompt asks for has a typed
//! home here, and replies that do not fit are rejected during validation.
//! Enumerated labels are matched case-insensitively when reading model output
//! but always serialized in their canonical spelling.

use serde::{Deserialize, Serialize};

/// Declares a closed set of string labels with canonical serialization and
/// case-insensitive parsing.
macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            pub fn from_str(s: &str) -> Option<Self> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($label) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::from_str(&raw).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        raw
                    ))
                })
            }
        }
    };
}

label_enum! {
    /// Overall tone of management during the call.
    pub enum Sentiment {
        Optimistic => "optimistic",
        Cautious => "cautious",
        Neutral => "neutral",
        Pessimistic => "pessimistic",
        /// Only produced by the fallback result when no model answered.
        Error => "error",
    }
}

label_enum! {
    pub enum Confidence {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

label_enum! {
    /// Who raised a point on the call.
    pub enum Speaker {
        Ceo => "CEO",
        Cfo => "CFO",
        Other => "Other",
    }
}

label_enum! {
    pub enum Severity {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

label_enum! {
    pub enum Timeframe {
        NearTerm => "near-term",
        LongTerm => "long-term",
        Ongoing => "ongoing",
    }
}

/// Models often send `null` where an empty list or object is meant.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Management tone with the quotes that justify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementTone {
    pub sentiment: Sentiment,
    pub confidence: Confidence,
    #[serde(default, deserialize_with = "null_as_default")]
    pub supporting_quotes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPositive {
    pub topic: String,
    pub description: String,
    #[serde(default)]
    pub mentioned_by: Option<Speaker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConcern {
    pub topic: String,
    pub description: String,
    pub severity: Severity,
}

/// Outlook statements. Each is `None` when the call gave no explicit guidance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardGuidance {
    #[serde(default)]
    pub revenue_outlook: Option<String>,
    #[serde(default)]
    pub margin_outlook: Option<String>,
    #[serde(default)]
    pub capex_outlook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthInitiative {
    pub initiative: String,
    pub description: String,
    pub timeframe: Timeframe,
}

/// Complete analysis of one transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub management_tone: ManagementTone,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_positives: Vec<KeyPositive>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_concerns: Vec<KeyConcern>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub forward_guidance: ForwardGuidance,
    #[serde(default)]
    pub capacity_utilization: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub growth_initiatives: Vec<GrowthInitiative>,
    pub summary: String,
}

impl AnalysisResult {
    /// Result returned when every configured model failed to produce a
    /// usable analysis.
    pub fn unavailable() -> Self {
        Self {
            management_tone: ManagementTone {
                sentiment: Sentiment::Error,
                confidence: Confidence::Low,
                supporting_quotes: Vec::new(),
            },
            key_positives: Vec::new(),
            key_concerns: vec![KeyConcern {
                topic: "Analysis Error".to_string(),
                description: "All AI models failed. Please try again later.".to_string(),
                severity: Severity::High,
            }],
            forward_guidance: ForwardGuidance::default(),
            capacity_utilization: None,
            growth_initiatives: Vec::new(),
            summary: "Analysis could not be completed due to AI service errors.".to_string(),
        }
    }

    /// Whether this is the placeholder from [`AnalysisResult::unavailable`].
    pub fn is_unavailable(&self) -> bool {
        self.management_tone.sentiment == Sentiment::Error
    }
}
