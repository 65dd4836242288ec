//! Split AI coding-agent sessions into navigation and work phases and
//! compare two experimental conditions.
//!
//! Data flows one way: [`ingest`] extracts typed [`events`], [`classify`]
//! tags them and finds the first-edit boundary, [`summary`] reduces one run,
//! [`compare`] folds runs into a condition aggregate, and [`report`] renders.

pub mod classify;
pub mod compare;
pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod logging;
pub mod report;
pub mod summary;
