//! Engine modules: translate a resolved `ServiceJmxSpec` into an ordered plan.
//!
//! The engine layer sits between configuration (what the user wants) and
//! application (which primitives to call). It generates ordered,
//! deterministic operation plans.

pub mod plan;
