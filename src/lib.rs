//! Diff Gutter library
//!
//! Per-line change annotations of a live buffer against the last committed
//! version of its file, plus the small editor that shows them.

pub mod annotation;
pub mod app;
pub mod baseline;
pub mod config;
pub mod constant;
pub mod saver;
pub mod style;
pub mod ui;
