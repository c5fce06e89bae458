// src/lib.rs

pub mod backends;
pub mod config;
pub mod errors;
pub mod export;
pub mod logging;
pub mod lookup;
pub mod pipeline;
pub mod table;
