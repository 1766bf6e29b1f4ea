//! Deployment lifecycle

pub mod executor;
pub mod fsm;
pub mod service;
pub mod workload;
