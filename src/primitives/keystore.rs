//! Keystore and truststore population via `openssl` and `keytool`.
//!
//! The keystore holds exactly one identity (alias `jmx`), the truststore one
//! entry per client certificate (aliases `client-0`, `client-1`, ...).
//! Both stores are owned entirely by jmxctl, so any drift is repaired by
//! rebuilding the store rather than patching individual entries.
//!
//! # Idempotence
//!
//! Before importing, the certificate currently stored under each alias is
//! exported and compared with the desired one. Only a mismatch triggers a
//! rebuild, so an unchanged definition causes no restart.
//!
//! # Secrets
//!
//! Store passwords reach the tools through `JMXCTL_STOREPASS`, never argv.
//! The private key is staged in a 0600 [`ScratchFile`] inside the config
//! directory and wiped on drop.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command_runner::run_command;
use crate::command_traits::CommandArgs;
use crate::error::{JmxError, Result};
use crate::logic::properties::{KeystoreImport, TruststoreImport};

/// Alias of the server identity in the keystore
pub const KEY_ALIAS: &str = "jmx";

/// Environment variable carrying the store password to keytool/openssl
const STOREPASS_ENV: &str = "JMXCTL_STOREPASS";

/// Keystore-import primitive used by the applier
pub trait KeystoreImporter {
    /// Ensure the keystore contains exactly the given identity
    fn import_key_pair(&self, import: &KeystoreImport) -> Result<bool>;

    /// Ensure the truststore contains exactly the given certificates
    fn import_trusted_certs(&self, import: &TruststoreImport) -> Result<bool>;
}

// ============================================================================
// Command contracts
// ============================================================================

/// `keytool -exportcert -rfc` for one alias
#[derive(Debug, Clone)]
pub struct KeytoolExportArgs {
    pub keystore: PathBuf,
    pub alias: String,
    pub password: String,
}

impl CommandArgs for KeytoolExportArgs {
    fn program(&self) -> &'static str {
        "keytool"
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "-exportcert".to_string(),
            "-rfc".to_string(),
            "-alias".to_string(),
            self.alias.clone(),
            "-keystore".to_string(),
            self.keystore.to_string_lossy().into_owned(),
            "-storepass:env".to_string(),
            STOREPASS_ENV.to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![(STOREPASS_ENV.to_string(), self.password.clone())]
    }
}

/// `openssl pkcs12 -export`: bundle a PEM certificate and key
#[derive(Debug, Clone)]
pub struct OpensslPkcs12Args {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub output: PathBuf,
    pub alias: String,
    pub password: String,
}

impl CommandArgs for OpensslPkcs12Args {
    fn program(&self) -> &'static str {
        "openssl"
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "pkcs12".to_string(),
            "-export".to_string(),
            "-in".to_string(),
            self.certificate.to_string_lossy().into_owned(),
            "-inkey".to_string(),
            self.private_key.to_string_lossy().into_owned(),
            "-name".to_string(),
            self.alias.clone(),
            "-out".to_string(),
            self.output.to_string_lossy().into_owned(),
            "-passout".to_string(),
            format!("env:{}", STOREPASS_ENV),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![(STOREPASS_ENV.to_string(), self.password.clone())]
    }
}

/// `keytool -importkeystore`: PKCS#12 bundle into a JKS keystore
#[derive(Debug, Clone)]
pub struct KeytoolImportKeystoreArgs {
    pub source: PathBuf,
    pub keystore: PathBuf,
    pub alias: String,
    pub password: String,
}

impl CommandArgs for KeytoolImportKeystoreArgs {
    fn program(&self) -> &'static str {
        "keytool"
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "-importkeystore".to_string(),
            "-noprompt".to_string(),
            "-srckeystore".to_string(),
            self.source.to_string_lossy().into_owned(),
            "-srcstoretype".to_string(),
            "PKCS12".to_string(),
            "-srcstorepass:env".to_string(),
            STOREPASS_ENV.to_string(),
            "-srcalias".to_string(),
            self.alias.clone(),
            "-destkeystore".to_string(),
            self.keystore.to_string_lossy().into_owned(),
            "-deststoretype".to_string(),
            "JKS".to_string(),
            "-deststorepass:env".to_string(),
            STOREPASS_ENV.to_string(),
            "-destkeypass:env".to_string(),
            STOREPASS_ENV.to_string(),
            "-destalias".to_string(),
            self.alias.clone(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![(STOREPASS_ENV.to_string(), self.password.clone())]
    }
}

/// `keytool -importcert`: one trusted certificate
#[derive(Debug, Clone)]
pub struct KeytoolImportCertArgs {
    pub certificate: PathBuf,
    pub keystore: PathBuf,
    pub alias: String,
    pub password: String,
}

impl CommandArgs for KeytoolImportCertArgs {
    fn program(&self) -> &'static str {
        "keytool"
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "-importcert".to_string(),
            "-noprompt".to_string(),
            "-alias".to_string(),
            self.alias.clone(),
            "-file".to_string(),
            self.certificate.to_string_lossy().into_owned(),
            "-keystore".to_string(),
            self.keystore.to_string_lossy().into_owned(),
            "-storetype".to_string(),
            "JKS".to_string(),
            "-storepass:env".to_string(),
            STOREPASS_ENV.to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![(STOREPASS_ENV.to_string(), self.password.clone())]
    }
}

// ============================================================================
// ScratchFile - staged key material
// ============================================================================

/// RAII wrapper for key material staged on disk for a tool invocation.
///
/// Created with mode 0600 next to the store it feeds, overwritten with zeros
/// and unlinked on drop, even if the import fails.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    size: usize,
}

impl ScratchFile {
    /// Create `dir/.<name>.<pid>` holding `content`, replacing a leftover from a crashed run
    pub fn new(dir: &Path, name: &str, content: &[u8]) -> std::io::Result<Self> {
        let path = dir.join(format!(".{}.{}", name, std::process::id()));
        let _ = fs::remove_file(&path);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)?;
        file.write_all(content)?;
        file.sync_all()?;

        Ok(Self {
            path,
            size: content.len(),
        })
    }

    /// Path of a scratch file that a tool will create itself
    pub fn reserve(dir: &Path, name: &str) -> Self {
        let path = dir.join(format!(".{}.{}", name, std::process::id()));
        let _ = fs::remove_file(&path);
        Self { path, size: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn secure_wipe(&self) {
        let size = fs::metadata(&self.path)
            .map(|m| m.len() as usize)
            .unwrap_or(self.size);
        if let Ok(mut file) = OpenOptions::new().write(true).open(&self.path) {
            let _ = file.write_all(&vec![0u8; size]);
            let _ = file.sync_all();
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.secure_wipe();
    }
}

// ============================================================================
// Certificate comparison
// ============================================================================

/// Base64 body of the first certificate in a PEM text, whitespace removed.
///
/// Used to compare what keytool exports with what was requested without
/// caring about line wrapping or trailing chain certificates.
pub fn certificate_body(pem: &str) -> Option<String> {
    let mut body = String::new();
    let mut inside = false;
    for line in pem.lines().map(str::trim) {
        if line == "-----BEGIN CERTIFICATE-----" {
            inside = true;
            continue;
        }
        if line == "-----END CERTIFICATE-----" {
            return inside.then_some(body);
        }
        if inside {
            body.push_str(line);
        }
    }
    None
}

fn store_dir(store: &Path) -> Result<&Path> {
    store
        .parent()
        .ok_or_else(|| JmxError::validation(format!("{:?} has no parent directory", store)))
}

// ============================================================================
// Keytool importer
// ============================================================================

/// [`KeystoreImporter`] shelling out to `openssl` and `keytool`
#[derive(Debug, Default, Clone, Copy)]
pub struct KeytoolImporter;

impl KeytoolImporter {
    pub fn new() -> Self {
        Self
    }

    /// Certificate body stored under `alias`, or `None` if absent/unreadable
    fn exported_body(&self, store: &Path, alias: &str, password: &str) -> Result<Option<String>> {
        if !store.exists() {
            return Ok(None);
        }
        let output = run_command(&KeytoolExportArgs {
            keystore: store.to_path_buf(),
            alias: alias.to_string(),
            password: password.to_string(),
        })?;
        if !output.success {
            debug!(store = %store.display(), alias, "alias not exportable");
            return Ok(None);
        }
        Ok(certificate_body(&output.stdout))
    }

    fn remove_store(store: &Path) -> Result<()> {
        match fs::remove_file(store) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeystoreImporter for KeytoolImporter {
    fn import_key_pair(&self, import: &KeystoreImport) -> Result<bool> {
        let wanted = certificate_body(&import.material.certificate)
            .ok_or_else(|| JmxError::key_material("server certificate is not PEM"))?;

        if self.exported_body(&import.path, KEY_ALIAS, &import.password)? == Some(wanted) {
            debug!(store = %import.path.display(), "keystore already holds identity");
            return Ok(false);
        }

        let dir = store_dir(&import.path)?;
        let cert = ScratchFile::new(dir, "jmx-cert.pem", import.material.certificate.as_bytes())?;
        let key = ScratchFile::new(dir, "jmx-key.pem", import.material.private_key.as_bytes())?;
        let bundle = ScratchFile::reserve(dir, "jmx.p12");

        run_command(&OpensslPkcs12Args {
            certificate: cert.path().to_path_buf(),
            private_key: key.path().to_path_buf(),
            output: bundle.path().to_path_buf(),
            alias: KEY_ALIAS.to_string(),
            password: import.password.clone(),
        })?
        .ensure_success("bundling certificate and key")?;

        Self::remove_store(&import.path)?;
        run_command(&KeytoolImportKeystoreArgs {
            source: bundle.path().to_path_buf(),
            keystore: import.path.clone(),
            alias: KEY_ALIAS.to_string(),
            password: import.password.clone(),
        })?
        .ensure_success("importing key pair into keystore")?;

        info!(store = %import.path.display(), "imported key pair");
        Ok(true)
    }

    fn import_trusted_certs(&self, import: &TruststoreImport) -> Result<bool> {
        let wanted = import
            .certificates
            .iter()
            .enumerate()
            .map(|(idx, pem)| {
                certificate_body(pem).ok_or_else(|| {
                    JmxError::key_material(format!("client certificate #{} is not PEM", idx))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut in_sync = import.path.exists();
        if in_sync {
            for (idx, body) in wanted.iter().enumerate() {
                let alias = format!("client-{}", idx);
                if self.exported_body(&import.path, &alias, &import.password)?.as_ref() != Some(body)
                {
                    in_sync = false;
                    break;
                }
            }
        }
        if in_sync {
            // A stale trailing alias means a certificate was dropped from the list
            let next = format!("client-{}", wanted.len());
            in_sync = self
                .exported_body(&import.path, &next, &import.password)?
                .is_none();
        }
        if in_sync {
            debug!(store = %import.path.display(), "truststore already in sync");
            return Ok(false);
        }

        let dir = store_dir(&import.path)?;
        Self::remove_store(&import.path)?;
        for (idx, pem) in import.certificates.iter().enumerate() {
            let alias = format!("client-{}", idx);
            let staged = ScratchFile::new(dir, &format!("{}.pem", alias), pem.as_bytes())?;
            run_command(&KeytoolImportCertArgs {
                certificate: staged.path().to_path_buf(),
                keystore: import.path.clone(),
                alias: alias.clone(),
                password: import.password.clone(),
            })?
            .ensure_success(&format!("importing {} into truststore", alias))?;
        }

        info!(
            store = %import.path.display(),
            count = import.certificates.len(),
            "rebuilt truststore"
        );
        Ok(true)
    }
}
