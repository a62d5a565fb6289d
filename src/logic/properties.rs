//! JMX Property Derivation
//!
//! Translates a resolved [`ServiceJmxSpec`] into the management property set
//! plus the authentication and SSL artifacts it references.
//!
//! # Rules
//!
//! Each concern is an independent rule writing a disjoint set of keys, so the
//! order in which rules run does not affect the result.
//!
//! | Rule               | Input                   | Keys (`P` = `com.sun.management.jmxremote`) |
//! |--------------------|-------------------------|---------------------------------------------|
//! | `rule_listen`      | port, rmi_port, bind    | `P`, `P.port`, `P.rmi.port`, `P.host`, `P.local.only` |
//! | `rule_auth`        | users                   | `P.authenticate`, `P.password.file` |
//! | `rule_roles`       | roles                   | `P.access.file` |
//! | `rule_ssl`         | keypair                 | `P.ssl`, `P.registry.ssl`, `P.ssl.enabled.protocols` |
//! | `rule_client_auth` | client_certs            | `P.ssl.need.client.auth` |
//! | `rule_ssl_config`  | keypair or client_certs | `P.ssl.config.file` |
//!
//! Free-form `properties` overrides are merged last and win.
//!
//! Pure logic: no I/O.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::{KeyMaterial, STORE_PASSWORD, ServiceJmxSpec, layout};

/// Prefix shared by every JMX agent property
pub const JMXREMOTE: &str = "com.sun.management.jmxremote";

/// TLS protocols enabled on the connector when SSL is on
pub const ENABLED_PROTOCOLS: &str = "TLSv1.2,TLSv1.3";

/// Header written at the top of every generated file
pub const MANAGED_HEADER: &str = "# Managed by jmxctl. Local changes will be overwritten.";

type Property = (String, String);

fn jmx(suffix: &str) -> String {
    if suffix.is_empty() {
        JMXREMOTE.to_string()
    } else {
        format!("{}.{}", JMXREMOTE, suffix)
    }
}

fn path_value(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Derived Output Types
// ============================================================================

/// Everything derived from one service definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedConfig {
    /// Full content of `management.properties`
    pub management: BTreeMap<String, String>,
    pub auth: AuthArtifacts,
    pub ssl: SslArtifacts,
}

/// Rendered bodies of the authentication files; `None` means the file must not exist
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthArtifacts {
    pub password_file: Option<String>,
    pub access_file: Option<String>,
}

/// Key stores to populate and the `ssl.properties` subset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SslArtifacts {
    /// Content of `ssl.properties`; empty means the file must not exist
    pub properties: BTreeMap<String, String>,
    pub keystore: Option<KeystoreImport>,
    pub truststore: Option<TruststoreImport>,
}

/// Identity to import into the keystore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoreImport {
    pub path: PathBuf,
    pub password: String,
    pub material: KeyMaterial,
}

/// Client certificates to import into the truststore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruststoreImport {
    pub path: PathBuf,
    pub password: String,
    pub certificates: Vec<String>,
}

// ============================================================================
// Rules
// ============================================================================

fn rule_listen(spec: &ServiceJmxSpec) -> Vec<Property> {
    let mut props = vec![(jmx(""), "true".to_string())];
    if let Some(port) = spec.port {
        props.push((jmx("port"), port.to_string()));
    }
    if let Some(rmi_port) = spec.rmi_port {
        props.push((jmx("rmi.port"), rmi_port.to_string()));
    }
    if let Some(host) = &spec.bind_address {
        props.push((jmx("host"), host.clone()));
    }
    props.push((jmx("local.only"), spec.local_only.to_string()));
    props
}

fn rule_auth(spec: &ServiceJmxSpec) -> Vec<Property> {
    if spec.users.is_empty() {
        vec![(jmx("authenticate"), "false".to_string())]
    } else {
        vec![
            (jmx("authenticate"), "true".to_string()),
            (
                jmx("password.file"),
                path_value(spec.artifact_path(layout::PASSWORD_FILE)),
            ),
        ]
    }
}

fn rule_roles(spec: &ServiceJmxSpec) -> Vec<Property> {
    if spec.roles.is_empty() {
        vec![]
    } else {
        vec![(
            jmx("access.file"),
            path_value(spec.artifact_path(layout::ACCESS_FILE)),
        )]
    }
}

fn rule_ssl(spec: &ServiceJmxSpec) -> Vec<Property> {
    if spec.ssl_enabled() {
        vec![
            (jmx("ssl"), "true".to_string()),
            (jmx("registry.ssl"), "true".to_string()),
            (jmx("ssl.enabled.protocols"), ENABLED_PROTOCOLS.to_string()),
        ]
    } else {
        vec![
            (jmx("ssl"), "false".to_string()),
            (jmx("registry.ssl"), "false".to_string()),
        ]
    }
}

fn rule_client_auth(spec: &ServiceJmxSpec) -> Vec<Property> {
    vec![(
        jmx("ssl.need.client.auth"),
        spec.client_auth_enabled().to_string(),
    )]
}

fn rule_ssl_config(spec: &ServiceJmxSpec) -> Vec<Property> {
    if spec.ssl_enabled() || spec.client_auth_enabled() {
        vec![(
            jmx("ssl.config.file"),
            path_value(spec.artifact_path(layout::SSL_PROPERTIES)),
        )]
    } else {
        vec![]
    }
}

const RULES: &[fn(&ServiceJmxSpec) -> Vec<Property>] = &[
    rule_listen,
    rule_auth,
    rule_roles,
    rule_ssl,
    rule_client_auth,
    rule_ssl_config,
];

/// Properties for `ssl.properties`: keystore and truststore locations
fn ssl_subset(spec: &ServiceJmxSpec) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    if spec.ssl_enabled() {
        props.insert(
            "javax.net.ssl.keyStore".to_string(),
            path_value(spec.artifact_path(layout::KEYSTORE)),
        );
        props.insert(
            "javax.net.ssl.keyStorePassword".to_string(),
            STORE_PASSWORD.to_string(),
        );
    }
    if spec.client_auth_enabled() {
        props.insert(
            "javax.net.ssl.trustStore".to_string(),
            path_value(spec.artifact_path(layout::TRUSTSTORE)),
        );
        props.insert(
            "javax.net.ssl.trustStorePassword".to_string(),
            STORE_PASSWORD.to_string(),
        );
    }
    props
}

// ============================================================================
// Derivation
// ============================================================================

/// Build the management property mapping alone
pub fn management_properties(spec: &ServiceJmxSpec) -> BTreeMap<String, String> {
    let mut management: BTreeMap<String, String> =
        RULES.iter().flat_map(|rule| rule(spec)).collect();

    for (key, value) in &spec.properties {
        management.insert(key.clone(), value.clone());
    }
    management
}

/// Derive the complete configuration for a present service.
///
/// # What This Explicitly Refuses To Do
///
/// - Read or write files: key material must already be loaded into `ServiceJmxSpec`
/// - Handle teardown: an absent service derives nothing, see `engine::plan`
pub fn derive(spec: &ServiceJmxSpec) -> DerivedConfig {
    let auth = AuthArtifacts {
        password_file: (!spec.users.is_empty()).then(|| {
            render_pairs(spec.users.iter().map(|(name, password)| (name.as_str(), password.as_str())))
        }),
        access_file: (!spec.roles.is_empty()).then(|| {
            let levels: Vec<(String, String)> = spec
                .roles
                .iter()
                .map(|(principal, level)| (principal.clone(), level.to_string()))
                .collect();
            render_pairs(levels.iter().map(|(p, l)| (p.as_str(), l.as_str())))
        }),
    };

    let ssl = SslArtifacts {
        properties: ssl_subset(spec),
        keystore: spec.keypair.as_ref().map(|material| KeystoreImport {
            path: spec.artifact_path(layout::KEYSTORE),
            password: STORE_PASSWORD.to_string(),
            material: material.clone(),
        }),
        truststore: spec.client_auth_enabled().then(|| TruststoreImport {
            path: spec.artifact_path(layout::TRUSTSTORE),
            password: STORE_PASSWORD.to_string(),
            certificates: spec.client_certs.clone(),
        }),
    };

    DerivedConfig {
        management: management_properties(spec),
        auth,
        ssl,
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render a `.properties` body, one `key=value` per line in key order
pub fn render_properties(props: &BTreeMap<String, String>) -> String {
    let mut out = String::from(MANAGED_HEADER);
    out.push('\n');
    for (key, value) in props {
        out.push_str(key);
        out.push('=');
        out.push_str(&value.replace('\\', "\\\\"));
        out.push('\n');
    }
    out
}

/// Render whitespace-separated `name value` lines (password and access files)
fn render_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::from(MANAGED_HEADER);
    out.push('\n');
    for (name, value) in pairs {
        out.push_str(name);
        out.push(' ');
        out.push_str(value);
        out.push('\n');
    }
    out
}
