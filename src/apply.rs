//! Plan execution and restart notification.
//!
//! `apply_plan` walks a [`ConvergePlan`] in order, routing each op to the
//! matching primitive and recording every op that changed something.
//! `converge` wraps it: plan, apply, and restart the service once if the
//! changed-set is non-empty.
//!
//! Errors stop the run immediately and propagate unmodified; ops already
//! applied stay applied. A rerun picks up where the failed one stopped, but
//! finds those ops in sync, so `converge` restarts the service for a partial
//! changed-set before returning the error.

use tracing::{debug, error, info, warn};

use crate::engine::plan::{ConvergeOp, ConvergePlan, calculate_plan};
use crate::error::{JmxError, Result};
use crate::primitives::{
    FileManager, KeystoreImporter, Owner, ServiceHandle, SubsettingEditor,
};
use crate::types::{Ensure, FILE_MODE, ServiceJmxSpec};

/// The primitives a plan is applied through
pub struct Primitives<'a> {
    pub files: &'a dyn FileManager,
    pub env: &'a dyn SubsettingEditor,
    pub keystore: &'a dyn KeystoreImporter,
}

/// Outcome of one convergence run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Display form of every op that changed the host, in order
    pub changed: Vec<String>,
    /// Whether the service restart was invoked
    pub restarted: bool,
}

impl ApplyReport {
    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

fn require_owner<'o>(owner: &'o Option<Owner>) -> Result<&'o Owner> {
    owner
        .as_ref()
        .ok_or_else(|| JmxError::validation("plan creates files but no owner was resolved"))
}

/// Execute every op of `plan`, returning the changed-set.
///
/// The owner account is looked up before the first op runs, so an unknown
/// user fails the run without side effects.
pub fn apply_plan(plan: &ConvergePlan, prims: &Primitives<'_>) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    apply_ops(plan, prims, &mut report)?;
    Ok(report)
}

/// Run the ops, recording changes into `report` as they happen so a caller
/// still sees the partial changed-set when an op fails
fn apply_ops(plan: &ConvergePlan, prims: &Primitives<'_>, report: &mut ApplyReport) -> Result<()> {
    let owner = if plan.creates_artifacts() {
        Some(Owner::lookup(&plan.owner)?)
    } else {
        None
    };

    for op in &plan.ops {
        let changed = match op {
            ConvergeOp::EnsureDirectory { path, mode } => {
                prims.files.ensure_directory(path, require_owner(&owner)?, *mode)?
            }
            ConvergeOp::EnsureFile { path, content, mode, .. } => {
                prims
                    .files
                    .ensure_file(path, content.as_bytes(), require_owner(&owner)?, *mode)?
            }
            ConvergeOp::ImportKeyPair(import) => {
                let imported = prims.keystore.import_key_pair(import)?;
                let fixed =
                    prims
                        .files
                        .ensure_attributes(&import.path, require_owner(&owner)?, FILE_MODE)?;
                imported || fixed
            }
            ConvergeOp::ImportTrustedCerts(import) => {
                let imported = prims.keystore.import_trusted_certs(import)?;
                let fixed =
                    prims
                        .files
                        .ensure_attributes(&import.path, require_owner(&owner)?, FILE_MODE)?;
                imported || fixed
            }
            ConvergeOp::RemoveFile { path } => prims.files.remove_file(path)?,
            ConvergeOp::RemoveDirectory { path } => prims.files.remove_directory(path)?,
            ConvergeOp::EnsureFragment { env_file, variable, key, value } => prims.env.set_subsetting(
                env_file,
                variable,
                key,
                value.as_deref(),
                Ensure::Present,
            )?,
            ConvergeOp::RemoveFragment { env_file, variable, key } => {
                prims
                    .env
                    .set_subsetting(env_file, variable, key, None, Ensure::Absent)?
            }
        };

        if changed {
            info!(op = %op, "changed");
            report.changed.push(op.to_string());
        } else {
            debug!(op = %op, "in sync");
        }
    }

    Ok(())
}

/// Plan, apply, and restart the service if anything changed.
///
/// With `restart` false the restart is skipped even on change and a warning
/// is logged, leaving the caller responsible for it.
///
/// If an op fails after others changed the host, the service is still
/// restarted (when allowed) before the op's error is returned. A failing
/// restart at that point is logged and the op's error wins.
pub fn converge(
    spec: &ServiceJmxSpec,
    prims: &Primitives<'_>,
    service: &dyn ServiceHandle,
    restart: bool,
) -> Result<ApplyReport> {
    let plan = calculate_plan(spec);
    info!(
        service = %plan.service,
        ensure = %plan.ensure,
        ops = plan.ops.len(),
        "converging JMX configuration"
    );

    let mut report = ApplyReport::default();
    if let Err(err) = apply_ops(&plan, prims, &mut report) {
        if report.is_changed() {
            if restart {
                warn!(
                    service = %spec.service_name,
                    changes = report.changed.len(),
                    error = %err,
                    "convergence failed part way; restarting for the changes already made"
                );
                if let Err(restart_err) = service.restart(&spec.service_name) {
                    error!(service = %spec.service_name, error = %restart_err, "restart failed");
                }
            } else {
                warn!(
                    service = %spec.service_name,
                    changes = report.changed.len(),
                    "convergence failed part way and restart is disabled"
                );
            }
        }
        return Err(err);
    }

    if report.is_changed() {
        if restart {
            service.restart(&spec.service_name)?;
            report.restarted = true;
        } else {
            warn!(
                service = %spec.service_name,
                changes = report.changed.len(),
                "configuration changed but restart is disabled"
            );
        }
    } else {
        info!(service = %spec.service_name, "already converged");
    }

    Ok(report)
}
