//! Housing-subsidy application workflow engine.
//!
//! The engine carries an application from draft through intake, control inspection,
//! technical and social assessment, director recommendation, and ministerial decision. It
//! enforces gate conditions on forward transitions, tracks per-state SLA deadlines, raises
//! monitoring alerts, and writes an append-only audit trail of every step.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
