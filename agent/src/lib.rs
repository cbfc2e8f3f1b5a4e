//! Netauto Agent Library
//!
//! Core modules for the netauto provisioning agent.

pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod platform;
pub mod storage;
pub mod utils;
