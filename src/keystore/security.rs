// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::fs::path_to_str;
use crate::keystore::{Keystore, BUNDLE_PASSPHRASE};
use rand::distr::{Alphanumeric, SampleString};
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;
use zeroize::Zeroizing;

const SECURITY_TOOL: &str = "security";

/// macOS keychains driven through the `security` command-line tool.
///
/// Every keychain this process creates is locked with the same random
/// password, which only lives in memory.
pub struct SecurityKeychain {
    password: Zeroizing<String>,
}

impl SecurityKeychain {
    pub fn new() -> Self {
        Self {
            password: Zeroizing::new(Alphanumeric.sample_string(&mut rand::rng(), 32)),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(command = args.first().copied().unwrap_or_default(), "running security");
        Command::new(SECURITY_TOOL).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::CommandNotFound {
                    command: SECURITY_TOOL.to_string(),
                    hint: "The macOS 'security' tool is required; keychains are only supported on macOS."
                        .to_string(),
                }
            } else {
                Error::Command {
                    command: format!("{} {}", SECURITY_TOOL, args.first().unwrap_or(&"")),
                    stderr: e.to_string(),
                }
            }
        })
    }

    /// Run and require a zero exit status.
    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(Error::Command {
                command: format!("{} {}", SECURITY_TOOL, args.first().unwrap_or(&"")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl Default for SecurityKeychain {
    fn default() -> Self {
        Self::new()
    }
}

impl Keystore for SecurityKeychain {
    fn exists(&self, name: &str) -> Result<bool> {
        let output = self.run(&["show-keychain-info", name])?;
        Ok(output.status.success())
    }

    fn create(&self, name: &str) -> Result<()> {
        self.run_checked(&["create-keychain", "-p", self.password.as_str(), name])?;
        // Creation leaves it unlocked on most systems; be explicit for exports
        self.run_checked(&["unlock-keychain", "-p", self.password.as_str(), name])?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.run_checked(&["delete-keychain", name])?;
        Ok(())
    }

    fn import_rsa_key(&self, name: &str, key_path: &Path) -> Result<()> {
        let key = path_to_str(key_path)?;
        // -A: let the export below read the key without an access prompt
        self.run_checked(&["import", key, "-k", name, "-t", "priv", "-A"])
            .map_err(|e| Error::Keystore(format!("importing RSA key: {}", e)))?;
        Ok(())
    }

    fn import_certificate(&self, name: &str, cert_path: &Path) -> Result<()> {
        let cert = path_to_str(cert_path)?;
        self.run_checked(&["import", cert, "-k", name, "-t", "cert"])
            .map_err(|e| Error::Keystore(format!("importing certificate: {}", e)))?;
        Ok(())
    }

    fn export_identities(&self, name: &str, out_path: &Path) -> Result<()> {
        let out = path_to_str(out_path)?;
        self.run_checked(&[
            "export",
            "-k",
            name,
            "-t",
            "identities",
            "-f",
            "pkcs12",
            "-P",
            BUNDLE_PASSPHRASE,
            "-o",
            out,
        ])
        .map_err(|e| Error::Keystore(format!("exporting identities: {}", e)))?;
        Ok(())
    }

    fn label(&self) -> &'static str {
        "macOS Keychain"
    }
}
