// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Mapping an app's push status to the work it needs.

use crate::catalog::{App, PushStatus};

/// What to do with one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Skip,
    ConfigureNew,
    RenewExisting,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Skip => "skip",
            Action::ConfigureNew => "configure",
            Action::RenewExisting => "renew",
        }
    }
}

/// Selects apps by bundle identifier suffix. An empty suffix selects every app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppFilter {
    suffix: String,
}

impl AppFilter {
    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn matches(&self, app_id: &str) -> bool {
        app_id.ends_with(&self.suffix)
    }
}

/// Run-wide decision inputs.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub refresh_existing: bool,
    pub filter: AppFilter,
}

impl Policy {
    pub fn decide(&self, app: &App) -> Action {
        decide(
            app.push_status,
            self.filter.matches(&app.id),
            self.refresh_existing,
        )
    }
}

/// The decision table.
pub fn decide(status: PushStatus, passes_filter: bool, refresh_existing: bool) -> Action {
    if !passes_filter {
        return Action::Skip;
    }
    match status {
        PushStatus::EnabledForProduction if refresh_existing => Action::RenewExisting,
        PushStatus::EnabledForProduction => Action::Skip,
        PushStatus::ConfigurableForProduction => Action::ConfigureNew,
        PushStatus::NotConfigured => Action::Skip,
    }
}
