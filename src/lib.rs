//! Media acquisition and playback-control core
//!
//! - `model`: cache, playlist and playback modes
//! - `jobs`: cancellable single-flight extraction and download jobs
//! - `audio`: the player contract and its lock discipline
//! - `controller`: wires everything together and handles user commands

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod model;

pub use config::Config;
pub use controller::{AppController, Collaborators, Command};
pub use error::{Error, Result};
