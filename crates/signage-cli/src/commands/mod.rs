//! Command handlers

pub mod config;
pub mod order;
pub mod record;
pub mod timers;
