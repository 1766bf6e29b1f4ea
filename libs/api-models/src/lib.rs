//! Request and response bodies of the mooring HTTP API

pub mod models;
