//! Resilient watch-state store for course videos.
//!
//! The local JSON store is the durable source of truth: every mutation
//! lands there first, the remote mirror is written best-effort, and a
//! periodic reconciliation sweep repairs whatever drifted.

pub mod catalog;
pub mod config;
pub mod error;
pub mod logger;
pub mod model;
pub mod remote;
pub mod retry;
pub mod service;
pub mod store;
