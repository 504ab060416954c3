//! Vigil - Proxy Egress Health and Failover
//!
//! Probes websites through a local proxy gateway, classifies each egress as
//! optimal, tolerable, or unusable, and rewrites the routing engine's rules
//! to move broken routes onto working candidate outbounds.
//!
//! ## Features
//!
//! - Expectation-driven page classification (status, title, body, challenge keywords)
//! - Hard disqualifiers that always win over challenge tolerance
//! - Candidate scanning through an isolated trial inbound before promotion
//! - Atomic JSON state persistence with a freshness window for tolerable verdicts
//! - Telegram notifications for degradations, switches, and failed recoveries
//! - Dry-run mode that logs routing commands without executing them

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod probe;
pub mod routing;
pub mod store;

pub use config::Config;
pub use error::{Result, VigilError};
pub use orchestrator::FailoverOrchestrator;
