//! courtside library
//!
//! Badminton rally analysis: a clip is validated, encoded and sent to a
//! multimodal model that returns shot-by-shot coaching feedback. The web UI
//! and the `analyze` subcommand both drive the same per-user [`session`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod logging;
pub mod media;
pub mod server;
pub mod session;
