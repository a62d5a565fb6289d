//! Type-safe domain types for jmxctl
//!
//! Option values that have a closed set of choices are enums rather than
//! strings, so the decision table can match on them exhaustively.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString};

/// Desired state of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl Ensure {
    pub fn is_present(self) -> bool {
        self == Self::Present
    }
}

/// Access level granted to a JMX principal in `jmxremote.access`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Readonly,
    Readwrite,
}

/// Generated file names under the config directory
pub mod layout {
    pub const MANAGEMENT_PROPERTIES: &str = "management.properties";
    pub const PASSWORD_FILE: &str = "jmxremote.password";
    pub const ACCESS_FILE: &str = "jmxremote.access";
    pub const SSL_PROPERTIES: &str = "ssl.properties";
    pub const KEYSTORE: &str = "jmx.ks";
    pub const TRUSTSTORE: &str = "jmx.ts";

    /// Every file jmxctl may create
    pub const ALL_FILES: &[&str] = &[
        MANAGEMENT_PROPERTIES,
        PASSWORD_FILE,
        ACCESS_FILE,
        SSL_PROPERTIES,
        KEYSTORE,
        TRUSTSTORE,
    ];
}

/// Password protecting the generated keystore and truststore.
///
/// A fixed literal, kept as-is for compatibility with existing deployments
/// that reference it. Anyone who can read `ssl.properties` can read it.
pub const STORE_PASSWORD: &str = "changeit";

/// Mode for `config_dir`
pub const DIR_MODE: u32 = 0o700;
/// Mode for every generated file
pub const FILE_MODE: u32 = 0o600;

/// A PEM certificate with its PEM private key, already loaded from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub certificate: String,
    pub private_key: String,
}

/// Fully resolved JMX target for one service.
///
/// Built fresh on every run by [`crate::config_file::JmxOptions::resolve`];
/// every default has already been filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceJmxSpec {
    pub service_name: String,
    pub ensure: Ensure,
    pub env_file: PathBuf,
    pub java_args_var: String,
    pub config_dir: PathBuf,
    pub port: Option<u16>,
    pub rmi_hostname: Option<String>,
    pub rmi_port: Option<u16>,
    pub bind_address: Option<String>,
    pub local_only: bool,
    pub properties: BTreeMap<String, String>,
    pub users: BTreeMap<String, String>,
    pub roles: BTreeMap<String, AccessLevel>,
    pub keypair: Option<KeyMaterial>,
    pub client_certs: Vec<String>,
    pub os_user: String,
}

impl ServiceJmxSpec {
    /// Minimal present definition with every default derived from `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let service_name = service_name.into();
        Self {
            env_file: PathBuf::from(format!("/etc/sysconfig/{}", service_name)),
            java_args_var: "JAVA_ARGS".to_string(),
            config_dir: PathBuf::from(format!("/etc/{}", service_name)),
            os_user: service_name.clone(),
            service_name,
            ensure: Ensure::Present,
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

    /// Path of a generated file under `config_dir`
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn ssl_enabled(&self) -> bool {
        self.keypair.is_some()
    }

    pub fn client_auth_enabled(&self) -> bool {
        !self.client_certs.is_empty()
    }
}
