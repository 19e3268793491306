//! TechCare Control - CLI client for the TechCare daemon

pub mod cli;
pub mod client;
pub mod commands;
pub mod display;
pub mod errors;
pub mod session;
