//! Core domain model types for newsflow.
//!
//! This module contains the value types exchanged between agents:
//! - Extracted article data
//! - The analysis result
//! - The tri-state agent result

mod analysis;
mod article;
mod result;

pub use analysis::{AnalysisResult, CriticalAnalysis};
pub use article::ArticleData;
pub use result::{AgentOutcome, AgentResult};
