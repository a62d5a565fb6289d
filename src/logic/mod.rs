//! Logic modules: translate high-level options into concrete settings.
//!
//! # Modules
//!
//! - `properties`: JMX agent property derivation and file rendering

pub mod properties;
