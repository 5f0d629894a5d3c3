//! taskorbit - task and project tracking with rewards and budget analytics
//!
//! The [`store::DataStore`] owns tasks, projects and users and persists them
//! to a local SQLite key-value table. [`query`] filters and sorts those
//! collections, [`analytics`] derives productivity and financial metrics
//! from them. Both engines are pure functions over borrowed slices.

pub mod access;
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod sample;
pub mod store;

pub use error::{Error, Result};
