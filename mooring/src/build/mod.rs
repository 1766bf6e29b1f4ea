//! Image builds

pub mod script;
pub mod service;
pub mod strategy;
pub mod types;
