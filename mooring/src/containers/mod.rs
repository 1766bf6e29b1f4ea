//! Container engine access

pub mod cli;
pub mod manager;
pub mod mock;
