//! Fully-qualified name handling.
//!
//! FQN parts are joined with `.`; a part that itself contains a `.` is wrapped
//! in double quotes. Parts returned by [`split`] keep their quotes so that
//! `build(&split(fqn)) == fqn`.

use once_cell::sync::Lazy;
use regex::Regex;
use crate::core::error::{Error, ErrorKind, Result};

pub const SEPARATOR: char = '.';

static QUOTED_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^"([^"]+)"$"#).expect("valid regex"));

/// Quotes `name` when it contains the separator; strips needless quotes otherwise.
pub fn quote_name(name: &str) -> Result<String> {
    if let Some(captures) = QUOTED_NAME.captures(name) {
        let inner = &captures[1];
        return Ok(if inner.contains(SEPARATOR) {
            name.to_string()
        } else {
            inner.to_string()
        });
    }
    if name.contains('"') {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("invalid name {}: embedded quotes are not allowed", name),
        ));
    }
    if name.contains(SEPARATOR) {
        Ok(format!("\"{}\"", name))
    } else {
        Ok(name.to_string())
    }
}

pub fn unquote_name(name: &str) -> String {
    match QUOTED_NAME.captures(name) {
        Some(captures) => captures[1].to_string(),
        None => name.to_string(),
    }
}

pub fn split(fqn: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in fqn.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            SEPARATOR if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() || !parts.is_empty() {
        parts.push(current);
    }
    parts
}

pub fn build<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|part| part.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

pub fn add(prefix: &str, name: &str) -> Result<String> {
    let quoted = quote_name(name)?;
    if prefix.is_empty() {
        return Ok(quoted);
    }
    Ok(format!("{}{}{}", prefix, SEPARATOR, quoted))
}

pub fn parent(fqn: &str) -> Option<String> {
    let parts = split(fqn);
    if parts.len() <= 1 {
        return None;
    }
    Some(build(&parts[..parts.len() - 1]))
}
