//! Mooring Library
//!
//! Deployment orchestration for a self-hosted container platform: deployment
//! records and their state machine, image builds in helper containers,
//! workload launch, status reconciliation and reverse proxy configuration.

pub mod app;
pub mod build;
pub mod containers;
pub mod database;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod proxy;
pub mod reconcile;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod workers;
