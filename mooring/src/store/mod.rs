//! Record persistence

pub mod catalog;
pub mod collection;
pub mod logbook;
pub mod repository;
