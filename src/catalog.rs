// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Reading the remote app catalog into [`App`] records.

use serde::Deserialize;
use tracing::debug;

/// Visible markers the console uses when it cuts a long name short.
const ELLIPSIS_MARKERS: &[&str] = &["...", "\u{2026}"];

const ENABLED_FOR_PRODUCTION: &str = "Enabled for Production";
const CONFIGURABLE_FOR_PRODUCTION: &str = "Configurable for Production";

/// Production push state of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushStatus {
    NotConfigured,
    ConfigurableForProduction,
    EnabledForProduction,
}

impl PushStatus {
    /// Classify the status column text by substring containment.
    ///
    /// "Enabled" wins when both phrases are present.
    pub fn classify(text: &str) -> Self {
        if text.contains(ENABLED_FOR_PRODUCTION) {
            PushStatus::EnabledForProduction
        } else if text.contains(CONFIGURABLE_FOR_PRODUCTION) {
            PushStatus::ConfigurableForProduction
        } else {
            PushStatus::NotConfigured
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PushStatus::NotConfigured => "not configured",
            PushStatus::ConfigurableForProduction => "configurable",
            PushStatus::EnabledForProduction => "enabled",
        }
    }
}

/// The name control of a catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameCell {
    /// Rendered text, possibly truncated.
    pub text: String,
    /// Tooltip carrying the full name, if the console set one.
    #[serde(default)]
    pub title: Option<String>,
}

/// One raw row of the catalog table as read from the console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogRow {
    /// `None` for header, spacer and other rows without a name control.
    #[serde(default)]
    pub name: Option<NameCell>,
    #[serde(default)]
    pub status: String,
}

/// A registered application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    /// Bundle identifier; also names the PEM artifact.
    pub id: String,
    /// Name as rendered in the table.
    pub display_name: String,
    pub push_status: PushStatus,
    /// Index of the source row, used to open the app's configure page.
    pub row: usize,
}

fn is_truncated(text: &str) -> bool {
    ELLIPSIS_MARKERS.iter().any(|m| text.ends_with(m))
}

/// Resolve the full name of a row: the tooltip when the visible text is
/// truncated, the visible text otherwise.
pub fn resolve_name(cell: &NameCell) -> String {
    let visible = cell.text.trim();
    if is_truncated(visible) {
        match cell.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => return title.to_string(),
            _ => debug!(name = visible, "truncated name without a title attribute"),
        }
    }
    visible.to_string()
}

/// Turn table rows into apps, in table order.
///
/// Rows without a name control are skipped.
pub fn scan(rows: &[CatalogRow]) -> Vec<App> {
    rows.iter()
        .enumerate()
        .filter_map(|(row, raw)| {
            let cell = raw.name.as_ref()?;
            Some(App {
                id: resolve_name(cell),
                display_name: cell.text.trim().to_string(),
                push_status: PushStatus::classify(&raw.status),
                row,
            })
        })
        .collect()
}
