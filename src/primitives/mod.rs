//! System primitives for the side-effecting collaborators the applier drives.
//!
//! Each primitive is a trait with one real implementation, so convergence
//! logic can be exercised against fakes.
//!
//! # Modules
//!
//! - `files`: files and directories with owner and mode
//! - `env_file`: one fragment inside a shell variable of an env file
//! - `keystore`: keystore/truststore population via openssl and keytool
//! - `service`: service restart

pub mod env_file;
pub mod files;
pub mod keystore;
pub mod service;

pub use env_file::{EnvFileEditor, SubsettingEditor};
pub use files::{FileManager, LocalFiles, Owner};
pub use keystore::{KeystoreImporter, KeytoolImporter};
pub use service::{ServiceHandle, SystemdService};
