//! Option file handling: loading, validation and default resolution.
//!
//! The JSON option file mirrors the user-facing configuration surface. Every
//! field except `service` is optional; [`JmxOptions::resolve`] fills in the
//! defaults derived from the service name and loads key material from disk,
//! producing a [`ServiceJmxSpec`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{JmxError, Result};
use crate::types::{AccessLevel, Ensure, KeyMaterial, ServiceJmxSpec};

/// Paths to a PEM certificate and its PEM private key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyPairPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// JMX options for one service, as written in the option file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JmxOptions {
    pub service: String,
    #[serde(default)]
    pub ensure: Ensure,
    #[serde(default)]
    pub env_file: Option<PathBuf>,
    #[serde(default)]
    pub java_args_var: Option<String>,
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
    #[serde(default)]
    pub service_user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub rmi_hostname: Option<String>,
    #[serde(default)]
    pub rmi_port: Option<u16>,
    #[serde(default)]
    pub bind_address: Option<String>,
    #[serde(default = "default_local_only")]
    pub local_only: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    #[serde(default)]
    pub roles: BTreeMap<String, AccessLevel>,
    #[serde(default)]
    pub keypair: Option<KeyPairPaths>,
    #[serde(default)]
    pub client_certs: Vec<PathBuf>,
}

fn default_local_only() -> bool {
    true
}

impl JmxOptions {
    /// Options for `service` with every other field left at its default
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ensure: Ensure::Present,
            env_file: None,
            java_args_var: None,
            config_dir: None,
            service_user: None,
            port: None,
            rmi_hostname: None,
            rmi_port: None,
            bind_address: None,
            local_only: true,
            properties: BTreeMap::new(),
            users: BTreeMap::new(),
            roles: BTreeMap::new(),
            keypair: None,
            client_certs: Vec::new(),
        }
    }

    /// Save options to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize options to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write options to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load options from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read options from {:?}", path.as_ref()))?;

        let options: Self =
            serde_json::from_str(&content).context("Failed to parse options JSON")?;

        Ok(options)
    }

    /// Validate the options without touching the filesystem
    pub fn validate(&self) -> Result<()> {
        let service = self.service.trim();
        if service.is_empty() {
            return Err(JmxError::validation("Service name must be specified"));
        }
        if !service
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
        {
            return Err(JmxError::validation(format!(
                "Service name '{}' may only contain letters, digits, '-', '_', '.' and '@'",
                self.service
            )));
        }
        // Defaults derive paths from the name, so "." or ".." would point at /etc itself
        if service.starts_with('.') {
            return Err(JmxError::validation(format!(
                "Service name '{}' cannot start with '.'",
                self.service
            )));
        }

        if let Some(var) = &self.java_args_var {
            if !is_shell_identifier(var) {
                return Err(JmxError::validation(format!(
                    "Java args variable '{}' is not a valid shell variable name",
                    var
                )));
            }
        }

        for (label, path) in [("env_file", &self.env_file), ("config_dir", &self.config_dir)] {
            if let Some(path) = path {
                if !path.is_absolute() {
                    return Err(JmxError::validation(format!(
                        "{} must be an absolute path, got {:?}",
                        label, path
                    )));
                }
            }
        }

        // config_dir ends up inside the quoted config.file fragment
        if let Some(dir) = &self.config_dir {
            if has_unquotable_chars(&dir.to_string_lossy()) {
                return Err(JmxError::validation(format!(
                    "config_dir {:?} cannot contain whitespace or quotes",
                    dir
                )));
            }
        }

        if let Some(user) = &self.service_user {
            if user.trim().is_empty() || user.contains(char::is_whitespace) {
                return Err(JmxError::validation(format!(
                    "Service user '{}' is not a valid account name",
                    user
                )));
            }
        }

        for (label, host) in [
            ("rmi_hostname", &self.rmi_hostname),
            ("bind_address", &self.bind_address),
        ] {
            if let Some(host) = host {
                if host.is_empty() || has_unquotable_chars(host) {
                    return Err(JmxError::validation(format!(
                        "{} '{}' is not a valid host name or address",
                        label, host
                    )));
                }
            }
        }

        for (key, value) in &self.properties {
            if key.is_empty() || key.contains(char::is_whitespace) || key.contains(['=', ':']) {
                return Err(JmxError::validation(format!(
                    "Property key '{}' is not a valid properties key",
                    key
                )));
            }
            if value.contains(['\n', '\r']) {
                return Err(JmxError::validation(format!(
                    "Property '{}' value cannot span multiple lines",
                    key
                )));
            }
        }

        // jmxremote.password is "<name> <password>" per line
        for (name, password) in &self.users {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(JmxError::validation(format!(
                    "JMX user name '{}' cannot be empty or contain whitespace",
                    name
                )));
            }
            if password.is_empty() || password.contains(char::is_whitespace) {
                return Err(JmxError::validation(format!(
                    "Password for JMX user '{}' cannot be empty or contain whitespace",
                    name
                )));
            }
        }

        for principal in self.roles.keys() {
            if principal.is_empty() || principal.contains(char::is_whitespace) {
                return Err(JmxError::validation(format!(
                    "JMX role principal '{}' cannot be empty or contain whitespace",
                    principal
                )));
            }
        }

        Ok(())
    }

    /// Validate, apply defaults and load key material.
    ///
    /// Key material is only read when `ensure` is present: teardown must not
    /// depend on certificate files that may already be gone.
    pub fn resolve(&self) -> Result<ServiceJmxSpec> {
        self.validate()?;

        let mut spec = ServiceJmxSpec::new(self.service.trim());
        spec.ensure = self.ensure;
        if let Some(env_file) = &self.env_file {
            spec.env_file = env_file.clone();
        }
        if let Some(var) = &self.java_args_var {
            spec.java_args_var = var.clone();
        }
        if let Some(config_dir) = &self.config_dir {
            spec.config_dir = config_dir.clone();
        }
        if let Some(user) = &self.service_user {
            spec.os_user = user.clone();
        }
        spec.port = self.port;
        spec.rmi_hostname = self.rmi_hostname.clone();
        spec.rmi_port = self.rmi_port;
        spec.bind_address = self.bind_address.clone();
        spec.local_only = self.local_only;
        spec.properties = self.properties.clone();
        spec.users = self.users.clone();
        spec.roles = self.roles.clone();

        if self.ensure.is_present() {
            if let Some(pair) = &self.keypair {
                spec.keypair = Some(KeyMaterial {
                    certificate: read_pem(&pair.cert, PemKind::Certificate)?,
                    private_key: read_pem(&pair.key, PemKind::PrivateKey)?,
                });
            }
            spec.client_certs = self
                .client_certs
                .iter()
                .map(|path| read_pem(path, PemKind::Certificate))
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(spec)
    }
}

/// Characters that cannot appear inside a double-quoted env fragment
fn has_unquotable_chars(value: &str) -> bool {
    value.contains(char::is_whitespace) || value.contains(['"', '\''])
}

fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
enum PemKind {
    Certificate,
    PrivateKey,
}

fn read_pem(path: &Path, kind: PemKind) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| {
        JmxError::key_material(format!("cannot read {:?}: {}", path, e))
    })?;
    check_pem(&content, kind).map_err(|msg| JmxError::key_material(format!("{:?}: {}", path, msg)))?;
    Ok(content)
}

/// Check the PEM armour of certificate or key text.
///
/// This is a shape check only; keytool/openssl do the real parsing.
fn check_pem(content: &str, kind: PemKind) -> std::result::Result<(), &'static str> {
    let content = content.trim();
    if content.is_empty() {
        return Err("file is empty");
    }
    match kind {
        PemKind::Certificate => {
            if !content.contains("-----BEGIN CERTIFICATE-----")
                || !content.contains("-----END CERTIFICATE-----")
            {
                return Err("not a PEM certificate");
            }
        }
        PemKind::PrivateKey => {
            let begins = content
                .lines()
                .any(|l| l.starts_with("-----BEGIN") && l.ends_with("PRIVATE KEY-----"));
            let ends = content
                .lines()
                .any(|l| l.starts_with("-----END") && l.ends_with("PRIVATE KEY-----"));
            if !begins || !ends {
                return Err("not a PEM private key");
            }
        }
    }
    Ok(())
}
