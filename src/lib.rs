pub mod app;
pub mod cli;
pub mod display;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod plus_api;
pub mod types;
