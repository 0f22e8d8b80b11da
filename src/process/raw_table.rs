use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, TrackerError};
use crate::process::cell::{parse_cell, CellValue};

/// One gviz cell: a literal `v` and a formatted fallback `f`.
#[derive(Debug, Default, Deserialize)]
pub struct GvizCell {
    #[serde(default)]
    pub v: Option<Value>,
    #[serde(default)]
    pub f: Option<Value>,
}

impl GvizCell {
    /// The literal wins; the formatted string is used only when it is null.
    pub fn literal(&self) -> Option<&Value> {
        match &self.v {
            Some(v) if !v.is_null() => Some(v),
            _ => self.f.as_ref().filter(|f| !f.is_null()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GvizRow {
    #[serde(default)]
    pub c: Vec<Option<GvizCell>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GvizTable {
    #[serde(default)]
    pub rows: Vec<GvizRow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GvizPayload {
    #[serde(default)]
    pub table: Option<GvizTable>,
}

/// Every row of the sheet as parsed scalars, before any header detection.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawTable {
    pub rows: Vec<Vec<Option<CellValue>>>,
}

impl RawTable {
    /// Strips the JSONP-style wrapper down to the outermost `{..}` and decodes it.
    pub fn from_response_text(text: &str) -> Result<Self> {
        let start = text.find('{').ok_or(TrackerError::PayloadNotFound)?;
        let end = text.rfind('}').ok_or(TrackerError::PayloadNotFound)?;
        if end < start {
            return Err(TrackerError::PayloadNotFound);
        }
        let payload: GvizPayload = serde_json::from_str(&text[start..=end])?;
        Ok(Self::from_payload(&payload))
    }

    pub fn from_payload(payload: &GvizPayload) -> Self {
        let rows = payload
            .table
            .as_ref()
            .map(|t| t.rows.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|row| {
                row.c
                    .iter()
                    .map(|cell| parse_cell(cell.as_ref().and_then(GvizCell::literal)))
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn cells(&self) -> impl Iterator<Item = &Option<CellValue>> {
        self.rows.iter().flatten()
    }
}
