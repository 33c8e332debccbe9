//! Inbox Triage: dual-path ingestion, dedup and idempotent classification
//! of inbound message records.

pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod jobs;
pub mod mailbox;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod service;
pub mod store;
