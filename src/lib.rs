// src/lib.rs

#[macro_use]
pub mod macros;

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod model;
pub mod pages;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod runner;
pub mod source;
pub mod verify;

pub use error::{ Result, SyncError };
