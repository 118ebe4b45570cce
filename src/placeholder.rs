//! `${key:default}` placeholder resolution, matching `@Value` semantics.

use crate::error::InjectError;
use crate::properties::PropertySource;

const PREFIX: &[u8] = b"${";
const SUFFIX: u8 = b'}';
const SEPARATOR: u8 = b':';

/// Resolves every placeholder in `expression` against `props`.
///
/// Text outside placeholders is kept verbatim. Resolved values are themselves
/// resolved, so properties may refer to other properties.
pub fn resolve(expression: &str, props: &PropertySource) -> Result<String, InjectError> {
    if expression.trim_start().starts_with("#{") {
        return Err(InjectError::Unsupported(expression.to_string()));
    }
    let mut visiting = Vec::new();
    resolve_inner(expression, expression, props, &mut visiting)
}

fn resolve_inner(
    text: &str,
    expression: &str,
    props: &PropertySource,
    visiting: &mut Vec<String>,
) -> Result<String, InjectError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body_start = start + PREFIX.len();
        let Some(body_len) = matching_suffix(&rest[body_start..]) else {
            // Unterminated placeholders are left as literal text.
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let body = &rest[body_start..body_start + body_len];
        out.push_str(&resolve_placeholder(body, expression, props, visiting)?);
        rest = &rest[body_start + body_len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn resolve_placeholder(
    body: &str,
    expression: &str,
    props: &PropertySource,
    visiting: &mut Vec<String>,
) -> Result<String, InjectError> {
    // The key itself may contain placeholders.
    let (raw_key, default) = split_default(body);
    let key = resolve_inner(raw_key, expression, props, visiting)?;

    if visiting.contains(&key) {
        return Err(InjectError::Circular { key });
    }

    match props.get(&key) {
        Some(value) => {
            visiting.push(key);
            let resolved = resolve_inner(value, expression, props, visiting);
            visiting.pop();
            resolved
        }
        None => match default {
            Some(default) => resolve_inner(default, expression, props, visiting),
            None => Err(InjectError::Unresolved {
                key,
                expression: expression.to_string(),
            }),
        },
    }
}

/// Byte length of the placeholder body, honouring nested `${...}`.
fn matching_suffix(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(PREFIX) {
            depth += 1;
            i += PREFIX.len();
            continue;
        }
        if bytes[i] == SUFFIX {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
        i += 1;
    }
    None
}

/// Splits `key:default` at the first separator outside nested placeholders.
fn split_default(body: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(PREFIX) {
            depth += 1;
            i += PREFIX.len();
            continue;
        }
        match bytes[i] {
            SUFFIX => depth = depth.saturating_sub(1),
            SEPARATOR if depth == 0 => return (&body[..i], Some(&body[i + 1..])),
            _ => {}
        }
        i += 1;
    }
    (body, None)
}
