// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Per-app certificate provisioning and the catalog run around it.

use crate::artifacts::CertificateArtifacts;
use crate::catalog::{self, App, PushStatus};
use crate::config::Config;
use crate::console::{text, Console, Control, Field};
use crate::decision::{Action, Policy};
use crate::error::Result;
use crate::keystore::{Keystore, KeystoreSession};
use crate::wait::{wait_for_file, Timeouts};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drives one app at a time from its configure page to a PEM file.
pub struct CertificateWorkflow<'a> {
    console: &'a mut dyn Console,
    keystore: &'a dyn Keystore,
    artifacts: &'a CertificateArtifacts,
    keychain: &'a str,
    console_url: &'a str,
    timeouts: Timeouts,
}

impl<'a> CertificateWorkflow<'a> {
    pub fn new(
        console: &'a mut dyn Console,
        keystore: &'a dyn Keystore,
        artifacts: &'a CertificateArtifacts,
        config: &'a Config,
    ) -> Self {
        Self {
            console,
            keystore,
            artifacts,
            keychain: &config.keychain,
            console_url: &config.console_url,
            timeouts: config.timeouts(),
        }
    }

    /// Carry out `action` for `app`, returning the PEM written, if any.
    ///
    /// The console must be showing the catalog `app` was scanned from. The
    /// PEM name is checked before the app is opened, so an identifier that
    /// cannot name a file fails without touching the console.
    pub fn execute(&mut self, app: &App, action: Action) -> Result<Option<PathBuf>> {
        let configure = match action {
            Action::Skip => return Ok(None),
            Action::ConfigureNew => true,
            Action::RenewExisting => false,
        };
        let pem_path = self.artifacts.pem_output_path(&app.id)?;
        self.console.open_app(app.row)?;
        if configure {
            self.configure_new(app, &pem_path)?;
        } else {
            self.renew_existing(app, &pem_path)?;
        }
        Ok(Some(pem_path))
    }

    /// Enable push for an app that never had it, then issue its certificate
    /// into `pem_path`.
    pub fn configure_new(&mut self, app: &App, pem_path: &Path) -> Result<()> {
        self.console.click(Control::EnablePush)?;
        self.console.click(Control::ConfigureProduction)?;
        self.configure_and_export_pem(app, pem_path)
    }

    /// Issue a replacement certificate before the current one expires.
    pub fn renew_existing(&mut self, app: &App, pem_path: &Path) -> Result<()> {
        self.console.click(Control::RenewProduction)?;
        self.configure_and_export_pem(app, pem_path)
    }

    fn configure_and_export_pem(&mut self, app: &App, pem_path: &Path) -> Result<()> {
        let session =
            KeystoreSession::acquire(self.keystore, self.keychain, &self.artifacts.rsa_key)?;

        let result = self.issue_and_export(app, pem_path, &session);

        self.artifacts.discard_transient();
        match (result, session.release()) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(keystore = self.keychain, error = %release_err, "failed to delete keystore");
                Err(e)
            }
        }
    }

    fn issue_and_export(
        &mut self,
        app: &App,
        pem_path: &Path,
        session: &KeystoreSession<'_>,
    ) -> Result<()> {
        let t = self.timeouts;

        self.wait_for(text::CSR_INSTRUCTIONS, t.page)?;
        self.console.click(Control::Continue)?;

        self.wait_for(text::CSR_SUBMIT, t.page)?;
        self.console.upload_file(Field::CsrUpload, &self.artifacts.csr)?;
        self.console.validate_upload()?;
        self.console.click(Control::SubmitCsr)?;

        debug!(app = %app.id, "waiting for certificate generation");
        self.wait_for(text::CERTIFICATE_GENERATED, t.issuance)?;
        self.console.click(Control::Continue)?;

        self.wait_for(text::DOWNLOAD_STEP, t.page)?;
        self.artifacts.clear_downloaded_certificate()?;
        self.console.click(Control::Download)?;
        wait_for_file(&self.artifacts.downloaded_cert, t.download, t.poll)?;

        self.wait_for(text::INSTALL_STEP, t.page)?;
        self.console.click(Control::Done)?;
        self.console.navigate(self.console_url)?;

        self.artifacts.import_and_export(session)?;
        self.artifacts.convert_bundle_to_pem(pem_path)
    }

    fn wait_for(&mut self, text: &str, timeout: Duration) -> Result<()> {
        self.console.wait_for_text(text, timeout, self.timeouts.poll)
    }
}

/// Outcome for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEntry {
    pub app_id: String,
    pub status: PushStatus,
    pub action: Action,
    pub pem: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub entries: Vec<RunEntry>,
}

impl RunReport {
    pub fn count(&self, action: Action) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// PEM files written during the run.
    pub fn produced(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|e| e.pem.as_deref())
    }
}

/// Scan the catalog currently shown and decide every app, without acting.
pub fn plan_catalog(console: &mut dyn Console, policy: &Policy) -> Result<Vec<(App, Action)>> {
    let apps = catalog::scan(&console.catalog_rows()?);
    debug!(apps = apps.len(), "scanned catalog");
    Ok(apps
        .into_iter()
        .map(|app| {
            let action = policy.decide(&app);
            (app, action)
        })
        .collect())
}

fn narrate(app: &App, action: Action) {
    match (action, app.push_status) {
        (Action::ConfigureNew, _) => info!("Configuring certificate for {}...", app.id),
        (Action::RenewExisting, _) => info!("Rebuilding push ssl cert for {}...", app.id),
        (Action::Skip, PushStatus::EnabledForProduction) => {
            info!("{} already enabled. Skipping...", app.id)
        }
        (Action::Skip, status) => debug!(app = %app.id, status = status.label(), "skipping"),
    }
}

/// Process every app of the catalog in table order.
///
/// Apps whose identifier cannot name a PEM file are logged and skipped.
/// Stops at the first failing app; its keystore and transient files are
/// already cleaned up by then.
pub fn process_catalog(
    console: &mut dyn Console,
    keystore: &dyn Keystore,
    artifacts: &CertificateArtifacts,
    config: &Config,
    policy: &Policy,
) -> Result<RunReport> {
    let plan = plan_catalog(console, policy)?;
    let mut workflow = CertificateWorkflow::new(console, keystore, artifacts, config);
    let mut report = RunReport::default();

    for (app, mut action) in plan {
        if action != Action::Skip {
            if let Err(e) = artifacts.pem_output_path(&app.id) {
                warn!("{}. Skipping...", e);
                action = Action::Skip;
            }
        }
        narrate(&app, action);
        let pem = workflow.execute(&app, action)?;
        if let Some(path) = &pem {
            info!("Wrote {}", path.display());
        }
        report.entries.push(RunEntry {
            app_id: app.id,
            status: app.push_status,
            action,
            pem,
        });
    }

    Ok(report)
}
