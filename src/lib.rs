#![allow(clippy::uninlined_format_args)]

pub mod aggregate;
pub mod api;
pub mod app;
pub mod clipboard;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod format;
pub mod logging;
pub mod timer;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
