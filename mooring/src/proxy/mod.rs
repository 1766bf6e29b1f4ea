//! Reverse proxy configuration

pub mod labels;
pub mod render;
pub mod service;
