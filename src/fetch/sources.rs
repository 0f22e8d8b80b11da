use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::TrackerError;
use crate::fetch::sheet::SheetSource;

pub const ALL_SOURCES: &str = "all";

/// One public tracker sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOption {
    pub key: String,
    pub label: String,
    pub sheet_id: String,
    pub gid: String,
    #[serde(default)]
    pub link: String,
}

impl SourceOption {
    pub fn sheet_source(&self) -> SheetSource {
        SheetSource::new(&self.sheet_id, &self.gid)
    }
}

/// (key, label, sheet id, gid)
static BUILTIN_SOURCES: &[(&str, &str, &str, &str)] = &[
    (
        "dec-new",
        "December sheet (new)",
        "1EPQOzLb40oqopWieywnMRieBarW7nWn9IIOk1l479w0",
        "0",
    ),
    (
        "dec-old",
        "December sheet (old)",
        "1ioxtqGnbHi6khSQ4ErvA1SgLgJgmo2LbPxEb01YRRx8",
        "397033753",
    ),
    (
        "nov",
        "November public sheet",
        "1vQ2OOq4aEjZYcAyGWKRBGWj7-6YKeFHP_4dsJTt-Py0",
        "342524790",
    ),
    (
        "oct",
        "October public sheet",
        "1V2pSzVcpuWTBT89SaaJaQ0nlLq85vTcfmOh8uhlgeIc",
        "0",
    ),
];

pub fn builtin_sources() -> Vec<SourceOption> {
    BUILTIN_SOURCES
        .iter()
        .map(|&(key, label, sheet_id, gid)| SourceOption {
            key: key.to_string(),
            label: label.to_string(),
            sheet_id: sheet_id.to_string(),
            gid: gid.to_string(),
            link: format!(
                "https://docs.google.com/spreadsheets/d/{}/edit?gid={}",
                sheet_id, gid
            ),
        })
        .collect()
}

/// Reads a YAML list of sources, replacing the built-in catalogue.
pub fn load_sources<P: AsRef<Path>>(path: P) -> Result<Vec<SourceOption>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading sources file {}", path.display()))?;
    let sources: Vec<SourceOption> = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing sources file {}", path.display()))?;
    if sources.is_empty() {
        return Err(TrackerError::Config(format!("{} lists no sources", path.display())).into());
    }
    Ok(sources)
}

/// `all` picks every source; anything else must match a key exactly.
pub fn select<'a>(
    sources: &'a [SourceOption],
    key: &str,
) -> Result<Vec<&'a SourceOption>, TrackerError> {
    let picked: Vec<&SourceOption> = if key == ALL_SOURCES {
        sources.iter().collect()
    } else {
        sources.iter().filter(|s| s.key == key).collect()
    };
    if picked.is_empty() {
        Err(TrackerError::UnknownSource(key.to_string()))
    } else {
        Ok(picked)
    }
}
