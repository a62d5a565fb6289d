//! Convergence Plan Engine
//!
//! Translates a resolved [`ServiceJmxSpec`] into an ordered sequence of
//! idempotent [`ConvergeOp`] operations that `apply` executes.
//!
//! # Shapes
//!
//! | ensure  | Operations generated |
//! |---------|----------------------|
//! | present | Dir → password → access → keystore → truststore → ssl.properties → management.properties → 3 env fragments |
//! | absent  | 3 env fragments removed → every file removed → dir removed (if empty) |
//!
//! Under `present`, each optional artifact is either ensured or removed, so
//! dropping a feature (say, clearing `roles`) cleans up its file.
//!
//! Pure logic: no I/O, no side effects. The plan is fully determined by its input.

use std::fmt;
use std::path::PathBuf;

use crate::logic::properties::{self, KeystoreImport, TruststoreImport, render_properties};
use crate::types::{DIR_MODE, Ensure, FILE_MODE, ServiceJmxSpec, layout};

/// Fragment keys managed inside the Java args variable
pub mod fragments {
    pub const JMXREMOTE: &str = "-Dcom.sun.management.jmxremote";
    pub const CONFIG_FILE: &str = "-Dcom.sun.management.config.file";
    pub const RMI_HOSTNAME: &str = "-Djava.rmi.server.hostname";
}

// ============================================================================
// Operation Types
// ============================================================================

/// A single idempotent operation in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergeOp {
    /// Create the config directory and enforce owner/mode
    EnsureDirectory { path: PathBuf, mode: u32 },

    /// Write a rendered file and enforce owner/mode
    EnsureFile {
        path: PathBuf,
        content: String,
        mode: u32,
        /// Content holds credentials and must not be printed
        sensitive: bool,
    },

    /// Populate the keystore with the server identity
    ImportKeyPair(KeystoreImport),

    /// Populate the truststore with client certificates
    ImportTrustedCerts(TruststoreImport),

    /// Remove a file if it exists
    RemoveFile { path: PathBuf },

    /// Remove a directory if it exists and is empty
    RemoveDirectory { path: PathBuf },

    /// Ensure `key[=value]` is present in the Java args variable
    EnsureFragment {
        env_file: PathBuf,
        variable: String,
        key: &'static str,
        value: Option<String>,
    },

    /// Ensure no fragment with `key` remains in the Java args variable
    RemoveFragment {
        env_file: PathBuf,
        variable: String,
        key: &'static str,
    },
}

impl fmt::Display for ConvergeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsureDirectory { path, mode } => {
                write!(f, "EnsureDirectory({}, mode={:o})", path.display(), mode)
            }
            Self::EnsureFile { path, content, mode, sensitive } => {
                if *sensitive {
                    write!(f, "EnsureFile({}, mode={:o}, <redacted {} bytes>)",
                        path.display(), mode, content.len())
                } else {
                    write!(f, "EnsureFile({}, mode={:o}, {} bytes)",
                        path.display(), mode, content.len())
                }
            }
            Self::ImportKeyPair(import) => {
                write!(f, "ImportKeyPair({})", import.path.display())
            }
            Self::ImportTrustedCerts(import) => {
                write!(f, "ImportTrustedCerts({}, {} certs)",
                    import.path.display(), import.certificates.len())
            }
            Self::RemoveFile { path } => write!(f, "RemoveFile({})", path.display()),
            Self::RemoveDirectory { path } => write!(f, "RemoveDirectory({})", path.display()),
            Self::EnsureFragment { env_file, variable, key, value } => match value {
                Some(v) => write!(f, "EnsureFragment({}:{} {}={})",
                    env_file.display(), variable, key, v),
                None => write!(f, "EnsureFragment({}:{} {})", env_file.display(), variable, key),
            },
            Self::RemoveFragment { env_file, variable, key } => {
                write!(f, "RemoveFragment({}:{} {})", env_file.display(), variable, key)
            }
        }
    }
}

/// A complete convergence plan for one service.
#[derive(Debug, Clone)]
pub struct ConvergePlan {
    pub service: String,
    /// Account owning every created artifact
    pub owner: String,
    pub ensure: Ensure,
    /// Ordered sequence of operations
    pub ops: Vec<ConvergeOp>,
}

impl ConvergePlan {
    /// Returns true if any operation needs an owner to be resolved
    pub fn creates_artifacts(&self) -> bool {
        self.ops.iter().any(|op| matches!(
            op,
            ConvergeOp::EnsureDirectory { .. }
                | ConvergeOp::EnsureFile { .. }
                | ConvergeOp::ImportKeyPair(_)
                | ConvergeOp::ImportTrustedCerts(_)
        ))
    }

    /// Returns a summary of the plan for logging/display.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("JMX Plan: {} ({})", self.service, self.ensure),
            format!("  Owner: {}", self.owner),
            format!("  Operations ({}):", self.ops.len()),
        ];
        for (i, op) in self.ops.iter().enumerate() {
            lines.push(format!("    {}. {}", i + 1, op));
        }
        lines.join("\n")
    }
}

// ============================================================================
// Plan Calculation
// ============================================================================

/// Calculate the convergence plan for a resolved service definition.
///
/// # What This Explicitly Refuses To Do
///
/// - Check the current state of the host: every op is idempotent, so the
///   plan is the same whether the host is fresh or already converged
/// - Remove unrelated files in `config_dir`: only the known artifacts are
///   removed, and the directory only if nothing else is left in it
pub fn calculate_plan(spec: &ServiceJmxSpec) -> ConvergePlan {
    let ops = match spec.ensure {
        Ensure::Present => plan_present(spec),
        Ensure::Absent => plan_absent(spec),
    };
    ConvergePlan {
        service: spec.service_name.clone(),
        owner: spec.os_user.clone(),
        ensure: spec.ensure,
        ops,
    }
}

fn ensure_or_remove(path: PathBuf, content: Option<String>, sensitive: bool) -> ConvergeOp {
    match content {
        Some(content) => ConvergeOp::EnsureFile {
            path,
            content,
            mode: FILE_MODE,
            sensitive,
        },
        None => ConvergeOp::RemoveFile { path },
    }
}

fn fragment(spec: &ServiceJmxSpec, key: &'static str, value: Option<String>) -> ConvergeOp {
    ConvergeOp::EnsureFragment {
        env_file: spec.env_file.clone(),
        variable: spec.java_args_var.clone(),
        key,
        value,
    }
}

fn remove_fragment(spec: &ServiceJmxSpec, key: &'static str) -> ConvergeOp {
    ConvergeOp::RemoveFragment {
        env_file: spec.env_file.clone(),
        variable: spec.java_args_var.clone(),
        key,
    }
}

fn plan_present(spec: &ServiceJmxSpec) -> Vec<ConvergeOp> {
    let derived = properties::derive(spec);
    let mut ops = vec![ConvergeOp::EnsureDirectory {
        path: spec.config_dir.clone(),
        mode: DIR_MODE,
    }];

    ops.push(ensure_or_remove(
        spec.artifact_path(layout::PASSWORD_FILE),
        derived.auth.password_file,
        true,
    ));
    ops.push(ensure_or_remove(
        spec.artifact_path(layout::ACCESS_FILE),
        derived.auth.access_file,
        false,
    ));

    ops.push(match derived.ssl.keystore {
        Some(import) => ConvergeOp::ImportKeyPair(import),
        None => ConvergeOp::RemoveFile {
            path: spec.artifact_path(layout::KEYSTORE),
        },
    });
    ops.push(match derived.ssl.truststore {
        Some(import) => ConvergeOp::ImportTrustedCerts(import),
        None => ConvergeOp::RemoveFile {
            path: spec.artifact_path(layout::TRUSTSTORE),
        },
    });

    let ssl_body = (!derived.ssl.properties.is_empty())
        .then(|| render_properties(&derived.ssl.properties));
    ops.push(ensure_or_remove(
        spec.artifact_path(layout::SSL_PROPERTIES),
        ssl_body,
        true,
    ));

    ops.push(ensure_or_remove(
        spec.artifact_path(layout::MANAGEMENT_PROPERTIES),
        Some(render_properties(&derived.management)),
        false,
    ));

    ops.push(fragment(spec, fragments::JMXREMOTE, None));
    ops.push(fragment(
        spec,
        fragments::CONFIG_FILE,
        Some(
            spec.artifact_path(layout::MANAGEMENT_PROPERTIES)
                .to_string_lossy()
                .into_owned(),
        ),
    ));
    ops.push(match &spec.rmi_hostname {
        Some(host) => fragment(spec, fragments::RMI_HOSTNAME, Some(host.clone())),
        None => remove_fragment(spec, fragments::RMI_HOSTNAME),
    });

    ops
}

fn plan_absent(spec: &ServiceJmxSpec) -> Vec<ConvergeOp> {
    let mut ops = vec![
        remove_fragment(spec, fragments::JMXREMOTE),
        remove_fragment(spec, fragments::CONFIG_FILE),
        remove_fragment(spec, fragments::RMI_HOSTNAME),
    ];
    ops.extend(layout::ALL_FILES.iter().map(|name| ConvergeOp::RemoveFile {
        path: spec.artifact_path(name),
    }));
    ops.push(ConvergeOp::RemoveDirectory {
        path: spec.config_dir.clone(),
    });
    ops
}
