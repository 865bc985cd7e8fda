//! Breakdown Core
//!
//! Data model and pure transformations for per-symbol confluence breakdowns:
//! symbol normalization, component and interpretation normalization, record
//! building, and the bounded score history tracker.

pub mod components;
pub mod error;
pub mod history;
pub mod interpretation;
pub mod record;
pub mod symbol;
pub mod types;

pub use components::{normalize_components, ComponentScores, CANONICAL_COMPONENTS};
pub use error::{BreakdownError, BreakdownResult};
pub use history::{ScoreHistoryTracker, DEFAULT_HISTORY_CAPACITY};
pub use interpretation::{standardize_interpretations, Interpretation, RawInterpretations};
pub use record::{build_record, AnalysisResult, StoredBreakdown};
pub use symbol::{normalize, Symbol};
pub use types::*;
