// Data quality pipeline: rule evaluation, resolution, audit trail and run orchestration

pub mod audit;
pub mod orchestrator;
pub mod processing;

pub use audit::{AuditEntry, AuditLog};
pub use orchestrator::{Orchestrator, RunFailure, RunReport, RunState, Stage};
