//! Type-safe external command contracts.
//!
//! External tools (`keytool`, `openssl`, `systemctl`) are never invoked with
//! ad-hoc string vectors. Each invocation is a struct implementing
//! [`CommandArgs`], so flag names live in exactly one place.
//!
//! Secrets travel through environment variables, never argv, so they do not
//! show up in the process table.

/// Trait for typed command arguments.
///
/// # Contract
///
/// - `program()`: executable name, resolved through `PATH`.
/// - `to_args()`: arguments exactly as the tool expects them.
/// - `get_env_vars()`: environment the tool reads secrets from.
pub trait CommandArgs {
    /// Executable name (e.g. "keytool").
    fn program(&self) -> &'static str;

    /// Convert struct fields to command-line arguments.
    fn to_args(&self) -> Vec<String>;

    /// Environment variables to set for this invocation.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}
