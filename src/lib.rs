// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Production push certificate provisioning for a catalog of apps.
//!
//! ```rust,no_run
//! use pushcert::{
//!     default_keystore, open_catalog, process_catalog, CertificateArtifacts, Config, Paths,
//!     WebDriverConsole,
//! };
//! use zeroize::Zeroizing;
//!
//! let paths = Paths::new()?;
//! let config = Config::load(&paths.config)?;
//!
//! let artifacts = CertificateArtifacts::new(&paths, &config);
//! artifacts.prepare(&config.user, &config.country_code, false)?;
//!
//! let mut console = WebDriverConsole::connect(
//!     &config.webdriver_url,
//!     &config.browser,
//!     &config.download_dir,
//!     config.timeouts().page,
//! )?;
//! open_catalog(&mut console, &config, || {
//!     Ok(Zeroizing::new(std::env::var("PUSHCERT_PASSWORD").unwrap_or_default()))
//! })?;
//!
//! let keystore = default_keystore();
//! let report = process_catalog(
//!     &mut console,
//!     keystore.as_ref(),
//!     &artifacts,
//!     &config,
//!     &config.policy(),
//! )?;
//! for pem in report.produced() {
//!     println!("{}", pem.display());
//! }
//! # Ok::<(), pushcert::Error>(())
//! ```

/// Key material and per-app output files.
pub mod artifacts;
/// Catalog table scanning.
pub mod catalog;
/// Configuration handling.
pub mod config;
/// Remote console interface and its WebDriver implementation.
pub mod console;
/// Status to action mapping.
pub mod decision;
/// Error types.
pub mod error;
/// Filesystem utilities.
pub mod fs;
/// Native keystore management.
pub mod keystore;
/// Bounded polling.
pub mod wait;
/// Per-app workflow and catalog run.
pub mod workflow;

pub use artifacts::{
    convert_bundle_to_pem, ensure_rsa_key, generate_certificate_request, generate_rsa_key,
    CertificateArtifacts,
};
pub use catalog::{resolve_name, scan, App, CatalogRow, NameCell, PushStatus};
pub use config::{Config, Paths, TimeoutConfig};
pub use console::{
    authenticate, detect_prompt, open_catalog, select_team, Console, Control, Field, Prompt,
    WebDriverConsole,
};
pub use decision::{decide, Action, AppFilter, Policy};
pub use error::{Error, Result};
pub use fs::{path_to_str, write_secret_file};
pub use keystore::{
    default_keystore, Keystore, KeystoreSession, SecurityKeychain, BUNDLE_PASSPHRASE,
};
pub use wait::{wait_for_file, wait_until, Timeouts};
pub use workflow::{plan_catalog, process_catalog, CertificateWorkflow, RunEntry, RunReport};
