// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

mod security;

pub use security::SecurityKeychain;

use crate::error::Result;
use std::path::Path;
use tracing::{debug, warn};

/// Passphrase protecting the transient identity bundle between export and
/// PEM conversion.
pub const BUNDLE_PASSPHRASE: &str = "pushcert";

/// A native credential store addressed by name.
pub trait Keystore {
    fn exists(&self, name: &str) -> Result<bool>;
    fn create(&self, name: &str) -> Result<()>;
    fn delete(&self, name: &str) -> Result<()>;
    fn import_rsa_key(&self, name: &str, key_path: &Path) -> Result<()>;
    fn import_certificate(&self, name: &str, cert_path: &Path) -> Result<()>;
    /// Export every identity (key + matching certificate) as PKCS#12,
    /// protected by [`BUNDLE_PASSPHRASE`].
    fn export_identities(&self, name: &str, out_path: &Path) -> Result<()>;
    fn label(&self) -> &'static str;
}

pub fn default_keystore() -> Box<dyn Keystore> {
    Box::new(SecurityKeychain::new())
}

/// One app's exclusive use of a freshly created store.
///
/// The store is deleted when the session is released or dropped, so no exit
/// path out of the per-app workflow leaks it.
pub struct KeystoreSession<'a> {
    store: &'a dyn Keystore,
    name: String,
    released: bool,
}

impl<'a> KeystoreSession<'a> {
    /// Delete any store named `name`, create an empty one and import the
    /// run's RSA key into it.
    pub fn acquire(store: &'a dyn Keystore, name: &str, rsa_key_path: &Path) -> Result<Self> {
        if store.exists(name)? {
            debug!(keystore = name, "deleting leftover keystore");
            store.delete(name)?;
        }
        store.create(name)?;

        // From here on the store is ours; Drop cleans it up if the import fails
        let session = Self {
            store,
            name: name.to_string(),
            released: false,
        };
        store.import_rsa_key(name, rsa_key_path)?;
        debug!(keystore = name, backend = store.label(), "keystore ready");
        Ok(session)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn import_certificate(&self, cert_path: &Path) -> Result<()> {
        self.store.import_certificate(&self.name, cert_path)
    }

    pub fn export_identities(&self, out_path: &Path) -> Result<()> {
        self.store.export_identities(&self.name, out_path)
    }

    /// Delete the store, reporting failure to the caller.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.store.delete(&self.name)
    }
}

impl Drop for KeystoreSession<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.store.delete(&self.name) {
            warn!(keystore = %self.name, error = %e, "failed to delete keystore");
        }
    }
}
