//! Domain models.

mod analysis;
mod document;

pub use analysis::{
    AnalysisResult, Confidence, ForwardGuidance, GrowthInitiative, KeyConcern, KeyPositive,
    ManagementTone, Sentiment, Severity, Speaker, Timeframe,
};
pub use document::{sanitize_filename, Document, DocumentStatus};
