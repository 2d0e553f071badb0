// ABOUTME: Library root for kedge - exposes the pipeline, publish and deploy layers.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod context;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod hooks;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod publish;
pub mod types;
