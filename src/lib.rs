//! Flags retailer identities created close together in space by the same
//! field traders: visits are collapsed per retailer, clustered with DBSCAN
//! over great-circle distance, checked for look-alike names and shared
//! phones, and scored per cluster.

pub mod clustering;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod export;
pub mod filters;
pub mod geodesy;
pub mod ingest;
pub mod models;
pub mod report;
pub mod risk;
pub mod similarity;
pub mod stats;

pub use config::AnalysisConfig;
pub use engine::{run_analysis, AnalysisResult};
pub use error::{EngineError, EngineResult};
pub use models::VisitRecord;
