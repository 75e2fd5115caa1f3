// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-ins for the developer console and the native keystore.

#![allow(dead_code)]

use p12_keystore::{Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain};
use pushcert::console::text;
use pushcert::{
    CatalogRow, CertificateArtifacts, Config, Console, Control, Error, Field, Keystore, NameCell,
    Paths, Result, TimeoutConfig, BUNDLE_PASSPHRASE,
};
use rcgen::{CertificateParams, KeyPair};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const KEYCHAIN: &str = "pushcert-test";
pub const CONSOLE_URL: &str = "https://console.test/ios/manage/bundles/index.action";

pub fn row(id: &str, status: &str) -> CatalogRow {
    CatalogRow {
        name: Some(NameCell {
            text: id.to_string(),
            title: None,
        }),
        status: status.to_string(),
    }
}

pub fn header_row() -> CatalogRow {
    CatalogRow {
        name: None,
        status: String::new(),
    }
}

/// A scratch directory with a config, key material and empty downloads.
pub struct Harness {
    _dir: TempDir,
    pub config: Config,
    pub artifacts: CertificateArtifacts,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let paths = Paths::with_base(dir.path().join("data"));
        paths.ensure_dir().expect("data dir should be created");

        let config = Config {
            user: "dev@example.com".into(),
            keychain: KEYCHAIN.into(),
            download_dir: dir.path().join("downloads"),
            cert_dir: dir.path().join("certs"),
            console_url: CONSOLE_URL.into(),
            timeouts: TimeoutConfig {
                page_secs: 5,
                issuance_secs: 1,
                download_secs: 1,
                poll_millis: 10,
            },
            ..Config::default()
        };
        fs::create_dir_all(&config.download_dir).expect("downloads dir should be created");

        let artifacts = CertificateArtifacts::new(&paths, &config);
        artifacts
            .prepare(&config.user, &config.country_code, false)
            .expect("key material should generate");

        Self {
            _dir: dir,
            config,
            artifacts,
        }
    }

    pub fn pem_for(&self, app_id: &str) -> PathBuf {
        self.config.cert_dir.join(format!("{}.pem", app_id))
    }

    pub fn cert_dir_entries(&self) -> usize {
        fs::read_dir(&self.config.cert_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Catalog,
    AppSettings,
    CsrInstructions,
    CsrSubmit,
    Generating,
    Generated,
    DownloadStep,
    InstallStep,
}

/// Walks the push assistant the way the real console does.
pub struct FakeConsole {
    pub rows: Vec<CatalogRow>,
    pub page: Page,
    pub downloaded_cert: PathBuf,
    /// Certificate generation never finishes.
    pub stall_issuance: bool,
    /// The download button does nothing.
    pub drop_download: bool,
    /// Set if a download was requested while an old file sat in its slot.
    pub saw_stale_download: bool,
    pub opened: Vec<usize>,
    pub clicks: Vec<Control>,
    pub uploaded: Option<PathBuf>,
    validated: bool,
}

impl FakeConsole {
    pub fn new(rows: Vec<CatalogRow>, downloaded_cert: &Path) -> Self {
        Self {
            rows,
            page: Page::Catalog,
            downloaded_cert: downloaded_cert.to_path_buf(),
            stall_issuance: false,
            drop_download: false,
            saw_stale_download: false,
            opened: Vec::new(),
            clicks: Vec::new(),
            uploaded: None,
            validated: false,
        }
    }

    fn expect_page(&self, page: Page, control: Control) -> Result<()> {
        if self.page != page {
            return Err(Error::UnexpectedPage {
                expected: format!("{:?} on {:?}, found {:?}", control, page, self.page),
            });
        }
        Ok(())
    }

    fn issue_certificate(&self) -> Result<()> {
        let key_pair = KeyPair::generate()?;
        let cert = CertificateParams::new(vec!["gateway.push.example.com".to_string()])?
            .self_signed(&key_pair)?;
        fs::write(&self.downloaded_cert, cert.der()).map_err(|e| Error::WriteFile {
            path: self.downloaded_cert.clone(),
            source: e,
        })
    }
}

impl Console for FakeConsole {
    fn navigate(&mut self, _url: &str) -> Result<()> {
        self.page = Page::Catalog;
        Ok(())
    }

    fn current_text(&mut self) -> Result<String> {
        let text = match self.page {
            Page::Catalog => "App IDs".to_string(),
            Page::AppSettings => "Apple Push Notification service SSL Certificates".to_string(),
            Page::CsrInstructions => format!("{}\nOpen Keychain Access", text::CSR_INSTRUCTIONS),
            Page::CsrSubmit => format!("{}\nChoose File", text::CSR_SUBMIT),
            Page::Generating => "Generating your certificate...".to_string(),
            Page::Generated => text::CERTIFICATE_GENERATED.to_string(),
            Page::DownloadStep => format!("{} Now", text::DOWNLOAD_STEP),
            Page::InstallStep => format!("Step 2: {}", text::INSTALL_STEP),
        };
        Ok(text)
    }

    fn click(&mut self, control: Control) -> Result<()> {
        self.clicks.push(control);
        match control {
            Control::EnablePush => self.expect_page(Page::AppSettings, control)?,
            Control::ConfigureProduction | Control::RenewProduction => {
                self.expect_page(Page::AppSettings, control)?;
                self.page = Page::CsrInstructions;
            }
            Control::Continue => {
                self.page = match self.page {
                    Page::CsrInstructions => Page::CsrSubmit,
                    Page::Generated => Page::DownloadStep,
                    other => {
                        return Err(Error::UnexpectedPage {
                            expected: format!("a Continue button, found {:?}", other),
                        })
                    }
                };
            }
            Control::SubmitCsr => {
                self.expect_page(Page::CsrSubmit, control)?;
                if self.uploaded.is_none() || !self.validated {
                    return Err(Error::Console("no validated signing request".into()));
                }
                self.page = if self.stall_issuance {
                    Page::Generating
                } else {
                    Page::Generated
                };
            }
            Control::Download => {
                self.expect_page(Page::DownloadStep, control)?;
                if self.downloaded_cert.exists() {
                    self.saw_stale_download = true;
                }
                if !self.drop_download {
                    self.issue_certificate()?;
                }
                self.page = Page::InstallStep;
            }
            Control::Done => {
                self.expect_page(Page::InstallStep, control)?;
                self.page = Page::Catalog;
            }
            Control::SignIn | Control::SaveTeam => {
                return Err(Error::Console(format!("already signed in, got {:?}", control)))
            }
        }
        Ok(())
    }

    fn set_field(&mut self, field: Field, _value: &str) -> Result<()> {
        Err(Error::Console(format!("unexpected field {:?}", field)))
    }

    fn upload_file(&mut self, field: Field, path: &Path) -> Result<()> {
        assert_eq!(field, Field::CsrUpload);
        let csr = fs::read_to_string(path).map_err(|e| Error::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        if !csr.contains("BEGIN CERTIFICATE REQUEST") {
            return Err(Error::Console("upload is not a signing request".into()));
        }
        self.uploaded = Some(path.to_path_buf());
        Ok(())
    }

    fn select_option(&mut self, field: Field, _visible_text: &str) -> Result<()> {
        Err(Error::Console(format!("unexpected select {:?}", field)))
    }

    fn validate_upload(&mut self) -> Result<()> {
        self.validated = self.uploaded.is_some();
        Ok(())
    }

    fn catalog_rows(&mut self) -> Result<Vec<CatalogRow>> {
        if self.page != Page::Catalog {
            return Err(Error::UnexpectedPage {
                expected: "the catalog".into(),
            });
        }
        Ok(self.rows.clone())
    }

    fn open_app(&mut self, row: usize) -> Result<()> {
        if self.page != Page::Catalog || row >= self.rows.len() {
            return Err(Error::UnexpectedPage {
                expected: format!("a configure link in catalog row {}", row),
            });
        }
        self.opened.push(row);
        self.uploaded = None;
        self.validated = false;
        self.page = Page::AppSettings;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct StoreContents {
    pub key_pem: Option<String>,
    pub certs: Vec<Vec<u8>>,
}

/// Keystore held in memory; exports real PKCS#12 bundles.
#[derive(Default)]
pub struct FakeKeystore {
    pub stores: RefCell<HashMap<String, StoreContents>>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeKeystore {
    pub fn with_leftover(name: &str) -> Self {
        let keystore = Self::default();
        keystore.stores.borrow_mut().insert(
            name.to_string(),
            StoreContents {
                key_pem: None,
                certs: vec![b"certificate from an earlier app".to_vec()],
            },
        );
        keystore
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn has_store(&self, name: &str) -> bool {
        self.stores.borrow().contains_key(name)
    }

    fn record(&self, call: &str, name: &str) {
        self.calls.borrow_mut().push(format!("{} {}", call, name));
    }

    fn with_store<T>(&self, name: &str, f: impl FnOnce(&mut StoreContents) -> T) -> Result<T> {
        let mut stores = self.stores.borrow_mut();
        let store = stores
            .get_mut(name)
            .ok_or_else(|| Error::Keystore(format!("no keystore named {}", name)))?;
        Ok(f(store))
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

impl Keystore for FakeKeystore {
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.has_store(name))
    }

    fn create(&self, name: &str) -> Result<()> {
        self.record("create", name);
        let mut stores = self.stores.borrow_mut();
        if stores.contains_key(name) {
            return Err(Error::Keystore(format!("{} already exists", name)));
        }
        stores.insert(name.to_string(), StoreContents::default());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.record("delete", name);
        self.stores
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::Keystore(format!("no keystore named {}", name)))
    }

    fn import_rsa_key(&self, name: &str, key_path: &Path) -> Result<()> {
        self.record("import-key", name);
        let key_pem = String::from_utf8_lossy(&read(key_path)?).into_owned();
        self.with_store(name, |store| store.key_pem = Some(key_pem))
    }

    fn import_certificate(&self, name: &str, cert_path: &Path) -> Result<()> {
        self.record("import-cert", name);
        let der = read(cert_path)?;
        Certificate::from_der(&der)
            .map_err(|e| Error::Keystore(format!("not a certificate: {:?}", e)))?;
        self.with_store(name, |store| store.certs.push(der))
    }

    fn export_identities(&self, name: &str, out_path: &Path) -> Result<()> {
        self.record("export", name);
        let contents = self.with_store(name, |store| store.clone())?;

        let key_pem = contents
            .key_pem
            .ok_or_else(|| Error::Keystore("no private key to export".into()))?;
        let key_der = pem::parse(key_pem)
            .map_err(|e| Error::Keystore(e.to_string()))?
            .into_contents();
        let chain = contents
            .certs
            .iter()
            .map(|der| {
                Certificate::from_der(der).map_err(|e| Error::Keystore(format!("{:?}", e)))
            })
            .collect::<Result<Vec<_>>>()?;
        if chain.is_empty() {
            return Err(Error::Keystore("no identity to export".into()));
        }

        let mut keystore = KeyStore::new();
        keystore.add_entry(
            "push",
            KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(&key_der, [], chain)),
        );
        let data = keystore
            .writer(BUNDLE_PASSPHRASE)
            .write()
            .map_err(|e| Error::Keystore(format!("{:?}", e)))?;
        fs::write(out_path, data).map_err(|e| Error::WriteFile {
            path: out_path.to_path_buf(),
            source: e,
        })
    }

    fn label(&self) -> &'static str {
        "in-memory"
    }
}
