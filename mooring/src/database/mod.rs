//! Managed database instances

pub mod resolver;
pub mod service;
