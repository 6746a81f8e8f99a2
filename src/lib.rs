//! Retrieval Tuner - closed-loop performance optimizer for retrieval pipelines
//!
//! Collects per-query telemetry from a retrieval/RAG pipeline, analyzes it,
//! searches for better retrieval parameters, applies the winner as the live
//! configuration, and later measures whether the promised gain materialized.
//!
//! # Architecture
//!
//! - **Types**: parameters with their bound table, metrics, records, results
//! - **Storage**: durable event store and expiring cache behind traits
//!   (in-memory and libSQL backends)
//! - **Optimization**: collector, analyzer, search strategies, applier,
//!   impact monitor, recommendations, auto-tuning scheduler
//! - **Service**: [`RetrievalOptimizer`] facade for operators
//!
//! # Example
//!
//! ```ignore
//! use retrieval_tuner::{RetrievalOptimizer, TunerConfig, TunerContext};
//! use retrieval_tuner::types::{RetrievalParameters, RetrievalStrategy};
//!
//! #[tokio::main]
//! async fn main() -> retrieval_tuner::Result<()> {
//!     let ctx = TunerContext::libsql("tuner.db", TunerConfig::default()).await?;
//!     let tuner = RetrievalOptimizer::new(ctx);
//!
//!     let current = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);
//!     let result = tuner.optimize(&current, None).await?;
//!     tuner.apply(&result).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod optimization;
pub mod service;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::TunerConfig;
pub use context::TunerContext;
pub use error::{Result, TunerError};
pub use service::RetrievalOptimizer;
pub use types::{
    OptimizationResult, PerformanceMetrics, PerformanceRecord, RetrievalParameters,
    RetrievalStrategy, TargetMetrics,
};
