//! Domain records

pub mod application;
pub mod database;
pub mod deployment;
pub mod proxy;
