pub mod config;
pub mod error;
pub mod fetch;
pub mod process;
pub mod stats;
pub mod tracker;
