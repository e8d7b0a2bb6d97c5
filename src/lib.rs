//! confab library.
//!
//! This module exports public APIs for testing and extension.

pub mod backend;
pub mod chat;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod log;
pub mod models;
pub mod paths;
pub mod registry;
pub mod renderer;
pub mod stream;
pub mod transcript;
