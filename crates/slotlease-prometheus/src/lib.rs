//! Prometheus metrics backend for the slot lease allocator.
//!
//! [`PrometheusMetrics`] implements [`slotlease_core::LeaseMetrics`] and is injected with
//! [`slotlease_core::LeaseAllocator::with_metrics`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use slotlease_core::{LeaseAllocator, MemoryLockService, MemoryPoolStore};
//! use slotlease_model::LeaseConfig;
//! use slotlease_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//!
//! let _allocator = LeaseAllocator::new(
//!     LeaseConfig::default(),
//!     Arc::new(MemoryPoolStore::new()),
//!     Arc::new(MemoryLockService::new()),
//! )
//! .with_metrics(Arc::new(metrics.clone()));
//!
//! let _text = metrics.encode_text()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `slotlease_scans_total` - Counter
//! - `slotlease_expired_slots_total` - Counter
//! - `slotlease_live_slots` - Gauge, live entries seen by the last scan
//! - `slotlease_claims_total{outcome}` - Counter
//! - `slotlease_heartbeats_total{outcome}` - Counter
//!
//! This crate does NOT serve `/metrics`; callers expose [`PrometheusMetrics::gather`]
//! through whatever HTTP stack they already run.
mod backend;

pub use backend::PrometheusMetrics;
