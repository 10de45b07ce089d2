//! Sync SSH config hosts into Windows Terminal profiles.
//!
//! The pipeline is [`discovery`] → [`ssh_config`] → [`mapper`] →
//! [`settings`], driven by [`sync::run`].

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod mapper;
pub mod models;
pub mod paths;
pub mod settings;
pub mod ssh_config;
pub mod sync;

pub use error::SyncError;
