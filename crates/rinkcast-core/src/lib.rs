// Core types for the rinkcast match client: the decoded event model, the
// local event log cache, display state, render frames and configuration.

pub mod config;
pub mod display;
pub mod event;
pub mod log;
pub mod render;
