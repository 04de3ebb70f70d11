//! vpa-core — deterministic Volume-Price-Analysis signal pipeline.
//!
//! This crate contains the auditable, replay-identical core:
//! - Domain types (`Bar`, ids, config hash)
//! - Feature Engine (candle geometry, volume/spread baselines)
//! - Context Engine (trend, location, congestion, volume trend)
//! - Daily-Context Resolver
//! - Rule Engine (canonical VPA signal detectors)
//! - Context Gates (CTX-1/2/3)
//! - Setup Composer (stateful setup lifecycle)
//! - Risk Engine (stop placement, sizing, hard rejects)
//! - Pipeline Orchestrator
//! - Safety Guard (kill switch, daily-loss halt)
//! - `BarStore` / `ExecutionLedger` / `Journal` collaborator traits
//!
//! No I/O lives here; file and network access belong to `vpa-runner`.

pub mod config;
pub mod context;
pub mod daily_context;
pub mod domain;
pub mod features;
pub mod gates;
pub mod indicators;
pub mod interfaces;
pub mod pipeline;
pub mod risk;
pub mod rules;
pub mod safety;
pub mod setup;
