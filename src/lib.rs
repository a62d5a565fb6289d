//! jmxctl library
//!
//! Declarative JMX remote-monitoring configuration for Java services:
//! option resolution, property derivation, convergence planning and
//! idempotent application.

pub mod apply;
pub mod cli;
pub mod command_runner;
pub mod command_traits;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod logic;
pub mod primitives;
pub mod types;

// Re-export main types for convenience
pub use apply::{ApplyReport, Primitives, apply_plan, converge};
pub use config_file::{JmxOptions, KeyPairPaths};
pub use engine::plan::{ConvergeOp, ConvergePlan, calculate_plan};
pub use error::{JmxError, Result};
pub use logic::properties::{DerivedConfig, derive, management_properties};
pub use types::{AccessLevel, Ensure, KeyMaterial, ServiceJmxSpec};
