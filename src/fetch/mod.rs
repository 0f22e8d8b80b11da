// src/fetch/mod.rs
pub mod sheet;
pub mod sources;

pub use sheet::{fetch_sheet_data, RetryPolicy, SheetDefaults, SheetSource};
pub use sources::{builtin_sources, load_sources, select, SourceOption, ALL_SOURCES};
