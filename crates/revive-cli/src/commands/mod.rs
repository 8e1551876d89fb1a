//! Command handlers

pub mod common;
pub mod record;
pub mod run;
