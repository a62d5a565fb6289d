//! Fragment editing inside a quoted shell variable of an environment file.
//!
//! Manages one whitespace-separated fragment such as
//! `-Dcom.sun.management.config.file=/etc/tomcat/management.properties`
//! inside `JAVA_ARGS="..."` without touching sibling fragments, other
//! variables, comments or blank lines.
//!
//! A fragment is identified by its key, the text before the first `=`
//! (or the whole fragment for flags). `-Dfoo` and `-Dfoo.bar=1` are
//! different keys.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{JmxError, Result};
use crate::types::Ensure;

/// Line-editor primitive used by the applier
pub trait SubsettingEditor {
    /// Ensure the fragment `key[=value]` is present in (or absent from) `variable`.
    ///
    /// Returns whether the file changed. Removing from a missing file or
    /// missing variable is a no-op.
    fn set_subsetting(
        &self,
        path: &Path,
        variable: &str,
        key: &str,
        value: Option<&str>,
        ensure: Ensure,
    ) -> Result<bool>;
}

/// [`SubsettingEditor`] for `/etc/sysconfig`-style files
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvFileEditor;

impl EnvFileEditor {
    pub fn new() -> Self {
        Self
    }
}

impl SubsettingEditor for EnvFileEditor {
    fn set_subsetting(
        &self,
        path: &Path,
        variable: &str,
        key: &str,
        value: Option<&str>,
        ensure: Ensure,
    ) -> Result<bool> {
        let fragment = match value {
            Some(v) => format!("{}={}", key, v),
            None => key.to_string(),
        };
        if fragment.contains(char::is_whitespace) || fragment.contains(['"', '\'']) {
            return Err(JmxError::env_file(format!(
                "fragment '{}' cannot contain whitespace or quotes",
                fragment
            )));
        }

        let original = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !ensure.is_present() {
                    debug!(path = %path.display(), "env file missing, nothing to remove");
                    return Ok(false);
                }
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        let updated = edit_content(&original, variable, key, &fragment, ensure)?;
        if updated == original {
            debug!(path = %path.display(), variable, key, "fragment already in state");
            return Ok(false);
        }

        // Overwrite in place so the file keeps its owner and mode
        fs::write(path, &updated)?;
        info!(path = %path.display(), variable, key, %ensure, "updated env fragment");
        Ok(true)
    }
}

/// One `VAR=value` assignment line split into its parts
#[derive(Debug, PartialEq, Eq)]
struct Assignment<'a> {
    /// Everything up to and including `=`, e.g. `export JAVA_ARGS=`
    prefix: &'a str,
    quote: Option<char>,
    body: &'a str,
    /// Text after the closing quote (usually a trailing comment)
    trailer: &'a str,
}

fn parse_assignment<'a>(line: &'a str, variable: &str) -> Result<Option<Assignment<'a>>> {
    let trimmed = line.trim_start();
    let after_export = trimmed
        .strip_prefix("export")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim_start)
        .unwrap_or(trimmed);

    let Some(rest) = after_export.strip_prefix(variable) else {
        return Ok(None);
    };
    let Some(value) = rest.strip_prefix('=') else {
        return Ok(None);
    };

    let prefix_len = line.len() - value.len();
    let prefix = &line[..prefix_len];

    match value.chars().next() {
        Some(q @ ('"' | '\'')) => {
            let inner = &value[1..];
            let close = inner.find(q).ok_or_else(|| {
                JmxError::env_file(format!("unterminated quote in {} assignment", variable))
            })?;
            Ok(Some(Assignment {
                prefix,
                quote: Some(q),
                body: &inner[..close],
                trailer: &inner[close + 1..],
            }))
        }
        _ => {
            let end = value.find(char::is_whitespace).unwrap_or(value.len());
            Ok(Some(Assignment {
                prefix,
                quote: None,
                body: &value[..end],
                trailer: &value[end..],
            }))
        }
    }
}

fn fragment_key(token: &str) -> &str {
    token.split_once('=').map_or(token, |(k, _)| k)
}

/// Apply one fragment change to the whole file content.
///
/// When the variable is assigned more than once, the last assignment wins
/// in the shell, so that is the one edited.
fn edit_content(
    content: &str,
    variable: &str,
    key: &str,
    fragment: &str,
    ensure: Ensure,
) -> Result<String> {
    let lines: Vec<&str> = content.lines().collect();

    let mut target = None;
    for (idx, line) in lines.iter().enumerate() {
        if let Some(assignment) = parse_assignment(line, variable)? {
            target = Some((idx, assignment));
        }
    }

    let Some((idx, assignment)) = target else {
        if !ensure.is_present() {
            return Ok(content.to_string());
        }
        let mut out = content.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("{}=\"{}\"\n", variable, fragment));
        return Ok(out);
    };

    let original_tokens: Vec<&str> = assignment.body.split_whitespace().collect();
    let mut tokens = original_tokens.clone();
    match (ensure, tokens.iter().position(|t| fragment_key(t) == key)) {
        (Ensure::Present, Some(pos)) => {
            tokens[pos] = fragment;
            // Keep the first occurrence of the key, drop any repeats
            let mut seen = false;
            tokens.retain(|t| {
                if fragment_key(t) != key {
                    return true;
                }
                let keep = !seen;
                seen = true;
                keep
            });
        }
        (Ensure::Present, None) => tokens.push(fragment),
        (Ensure::Absent, _) => tokens.retain(|t| fragment_key(t) != key),
    }

    if tokens == original_tokens {
        // Keep the original spacing when nothing changed
        return Ok(content.to_string());
    }

    let new_body = tokens.join(" ");
    let quote = assignment.quote.unwrap_or('"');
    let new_line = format!(
        "{}{}{}{}{}",
        assignment.prefix, quote, new_body, quote, assignment.trailer
    );

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    out[idx] = new_line;
    let mut joined = out.join("\n");
    if content.ends_with('\n') || content.is_empty() {
        joined.push('\n');
    }
    Ok(joined)
}
