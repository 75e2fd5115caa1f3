// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Well-known files of a run and the operations that produce them.
//!
//! The RSA key and signing request are made once per run and shared by every
//! app. The downloaded certificate and the identity bundle are transient: they
//! exist only while one app is being processed.

use crate::config::{Config, Paths};
use crate::error::{Error, Result};
use crate::fs::{atomic_write, atomic_write_secret, ensure_dir, remove_if_exists};
use crate::keystore::{KeystoreSession, BUNDLE_PASSPHRASE};
use rcgen::string::Ia5String;
use rcgen::{CertificateParams, DnType, DnValue, KeyPair, PKCS_RSA_SHA256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// OID of the PKCS#9 emailAddress attribute.
const EMAIL_ADDRESS_OID: [u64; 7] = [1, 2, 840, 113549, 1, 9, 1];

/// Generate a fresh 2048-bit RSA key and store it as PKCS#8 PEM.
pub fn generate_rsa_key(path: &Path) -> Result<()> {
    let key_pair = KeyPair::generate_for(&PKCS_RSA_SHA256)?;
    atomic_write_secret(path, key_pair.serialize_pem().as_bytes())?;
    debug!(path = %path.display(), "generated RSA key");
    Ok(())
}

/// Keep a readable RSA key at `path`, generating one only when there is none.
///
/// Returns true if a new key was written.
pub fn ensure_rsa_key(path: &Path) -> Result<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        match KeyPair::from_pem(&existing) {
            Ok(key_pair) if key_pair.algorithm() == &PKCS_RSA_SHA256 => {
                debug!(path = %path.display(), "reusing RSA key");
                return Ok(false);
            }
            _ => warn!(path = %path.display(), "existing key is unusable, replacing it"),
        }
    }
    generate_rsa_key(path)?;
    Ok(true)
}

/// Derive a certificate signing request for `user` from the key at `key_path`.
pub fn generate_certificate_request(
    user: &str,
    country_code: &str,
    key_path: &Path,
    out_path: &Path,
) -> Result<()> {
    let key_pem = fs::read_to_string(key_path).map_err(|e| Error::ReadFile {
        path: key_path.to_path_buf(),
        source: e,
    })?;
    let key_pair = KeyPair::from_pem(&key_pem)?;

    let mut params = CertificateParams::default();
    if user.contains('@') {
        params.distinguished_name.push(
            DnType::CustomDnType(EMAIL_ADDRESS_OID.to_vec()),
            DnValue::Ia5String(Ia5String::try_from(user.to_string())?),
        );
    }
    params.distinguished_name.push(DnType::CommonName, user);
    params
        .distinguished_name
        .push(DnType::CountryName, country_code.to_ascii_uppercase());

    let csr_pem = params.serialize_request(&key_pair)?.pem()?;
    atomic_write(out_path, csr_pem.as_bytes())?;
    debug!(path = %out_path.display(), "generated signing request");
    Ok(())
}

/// Rewrite a PKCS#12 identity bundle as PEM: certificates first, then the
/// private key.
pub fn convert_bundle_to_pem(p12_path: &Path, pem_path: &Path) -> Result<()> {
    use p12_keystore::{KeyStore, KeyStoreEntry};

    let data = fs::read(p12_path).map_err(|e| Error::ReadFile {
        path: p12_path.to_path_buf(),
        source: e,
    })?;
    let keystore = KeyStore::from_pkcs12(&data, BUNDLE_PASSPHRASE)
        .map_err(|e| Error::Pkcs12(e.to_string()))?;

    let mut certs = Vec::new();
    let mut key = None;
    for (_alias, entry) in keystore.entries() {
        match entry {
            KeyStoreEntry::PrivateKeyChain(chain) if key.is_none() => {
                key = Some(pem::Pem::new("PRIVATE KEY", chain.key().to_vec()));
                certs.extend(
                    chain
                        .chain()
                        .iter()
                        .map(|c| pem::Pem::new("CERTIFICATE", c.as_der().to_vec())),
                );
            }
            KeyStoreEntry::Certificate(cert) => {
                certs.push(pem::Pem::new("CERTIFICATE", cert.as_der().to_vec()));
            }
            _ => {}
        }
    }

    let key = key.ok_or_else(|| Error::Pkcs12("bundle contains no private key".into()))?;
    if certs.is_empty() {
        return Err(Error::Pkcs12("bundle contains no certificate".into()));
    }

    let mut blocks = certs;
    blocks.push(key);
    atomic_write_secret(pem_path, pem::encode_many(&blocks).as_bytes())
}

/// Keep identifiers usable as a single file name.
///
/// Only what would escape the certificate directory is refused: path
/// separators, NUL and the `.`/`..` components. Anything else a catalog can
/// show, ellipses and punctuation included, is a valid name.
fn sanitize_app_id_for_filename(app_id: &str) -> Result<String> {
    let reject = |reason: &str| Error::InvalidAppId {
        id: app_id.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = app_id.trim();
    if trimmed.is_empty() {
        return Err(reject("identifier cannot be empty"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(reject("identifier cannot be a relative path component"));
    }
    if let Some(c) = trimmed.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
        return Err(reject(&format!("identifier contains invalid character: {:?}", c)));
    }

    Ok(trimmed.to_string())
}

#[derive(Debug, Clone)]
pub struct CertificateArtifacts {
    pub rsa_key: PathBuf,
    pub csr: PathBuf,
    pub downloaded_cert: PathBuf,
    pub p12: PathBuf,
    pub cert_dir: PathBuf,
}

impl CertificateArtifacts {
    pub fn new(paths: &Paths, config: &Config) -> Self {
        Self {
            rsa_key: paths.rsa_key.clone(),
            csr: paths.csr.clone(),
            downloaded_cert: config.downloaded_cert_path(),
            p12: paths.p12.clone(),
            cert_dir: config.cert_dir.clone(),
        }
    }

    /// Create the output directory and the run's shared key material.
    ///
    /// An existing RSA key is reused unless `regenerate` is set; the signing
    /// request is always derived afresh.
    pub fn prepare(&self, user: &str, country_code: &str, regenerate: bool) -> Result<()> {
        ensure_dir(&self.cert_dir)?;
        if let Some(parent) = self.rsa_key.parent() {
            ensure_dir(parent)?;
        }
        if regenerate {
            generate_rsa_key(&self.rsa_key)?;
        } else {
            ensure_rsa_key(&self.rsa_key)?;
        }
        generate_certificate_request(user, country_code, &self.rsa_key, &self.csr)
    }

    /// `<cert_dir>/<app id>.pem`
    pub fn pem_output_path(&self, app_id: &str) -> Result<PathBuf> {
        let name = sanitize_app_id_for_filename(app_id)?;
        Ok(self.cert_dir.join(format!("{}.pem", name)))
    }

    /// Delete the downloaded certificate slot. Returns true if a file was there.
    pub fn clear_downloaded_certificate(&self) -> Result<bool> {
        let removed = remove_if_exists(&self.downloaded_cert)?;
        if removed {
            debug!(path = %self.downloaded_cert.display(), "removed stale downloaded certificate");
        }
        Ok(removed)
    }

    /// Import the issued certificate, drop the download and export the
    /// identity bundle.
    pub fn import_and_export(&self, session: &KeystoreSession<'_>) -> Result<()> {
        session.import_certificate(&self.downloaded_cert)?;
        self.clear_downloaded_certificate()?;
        session.export_identities(&self.p12)
    }

    /// Produce the PEM artifact at `pem_path` (see [`Self::pem_output_path`])
    /// from the bundle, then drop the bundle.
    pub fn convert_bundle_to_pem(&self, pem_path: &Path) -> Result<()> {
        convert_bundle_to_pem(&self.p12, pem_path)?;
        remove_if_exists(&self.p12)?;
        Ok(())
    }

    /// Best-effort removal of every transient slot.
    pub fn discard_transient(&self) {
        for path in [&self.downloaded_cert, &self.p12] {
            if let Err(e) = remove_if_exists(path) {
                warn!(path = %path.display(), error = %e, "failed to remove transient file");
            }
        }
    }
}
