//! The polling loop that ties capture, recognition, solving and drawing
//! together.

pub mod cache;
pub mod config;
pub mod runner;
pub mod state;
