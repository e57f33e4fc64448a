//! Query string and urlencoded form parsing
//!
//! Keys map to every value they were given, in order of appearance. Parsing
//! keeps going past a bad pair so callers that ignore errors still see the
//! good pairs; the first error is reported alongside.

use crate::error::FormParseError;
use std::collections::BTreeMap;

/// Parsed query or form values
pub type Values = BTreeMap<String, Vec<String>>;

/// Media type that carries a form in the request body
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Parse `raw` as `application/x-www-form-urlencoded` pairs.
pub fn parse_urlencoded(raw: &str) -> (Values, Option<FormParseError>) {
    let mut values = Values::new();
    let mut first_error = None;

    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }

        let key_part = pair.split_once('=').map_or(pair, |(k, _)| k);
        let checked = if key_part.contains(';') {
            Err(FormParseError::SemicolonSeparator)
        } else {
            validate_escapes(pair)
        };

        if let Err(e) = checked {
            first_error.get_or_insert(e);
            continue;
        }

        for (key, value) in form_urlencoded::parse(pair.as_bytes()) {
            values
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }

    (values, first_error)
}

/// Parse a query string, silently dropping malformed pairs.
pub fn parse_query_lenient(raw: &str) -> Values {
    parse_urlencoded(raw).0
}

/// Append every value of `extra` after the existing values of `base`.
pub fn merge_values(base: &mut Values, extra: Values) {
    for (key, mut vals) in extra {
        base.entry(key).or_default().append(&mut vals);
    }
}

fn validate_escapes(s: &str) -> Result<(), FormParseError> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                let end = (i + 3).min(bytes.len());
                let escape = String::from_utf8_lossy(&bytes[i..end]).into_owned();
                return Err(FormParseError::InvalidEscape(escape));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Extract the lowercase `type/subtype` from a `Content-Type` header value.
///
/// Parameters are checked for shape (`; name=value`, where the value is a
/// token or a quoted string) and must not repeat; a single trailing `;` is
/// tolerated. A missing header is treated as `application/octet-stream`.
pub fn media_type(content_type: Option<&str>) -> Result<String, FormParseError> {
    let Some(raw) = content_type else {
        return Ok("application/octet-stream".to_string());
    };

    let (essence, params) = raw.split_once(';').map_or((raw, None), |(e, p)| (e, Some(p)));
    let essence = essence.trim();
    if essence.is_empty() {
        return Err(FormParseError::ContentType("no media type".to_string()));
    }

    let Some((kind, subtype)) = essence.split_once('/') else {
        return Err(FormParseError::ContentType(format!(
            "expected slash after first token in '{essence}'"
        )));
    };

    if !is_token(kind) || !is_token(subtype) {
        return Err(FormParseError::ContentType(format!(
            "invalid media type '{essence}'"
        )));
    }

    if let Some(params) = params {
        check_params(params)?;
    }

    Ok(essence.to_ascii_lowercase())
}

/// Walk `name=value` pairs following the first `;` of a content type.
fn check_params(mut rest: &str) -> Result<(), FormParseError> {
    let mut seen = Vec::new();

    loop {
        rest = rest.trim_start();
        if rest.is_empty() && seen.is_empty() {
            // lone trailing ';'
            return Ok(());
        }

        let (name, after_name) = take_token(rest);
        let after_eq = after_name.trim_start().strip_prefix('=');
        let (value_ok, tail) = match after_eq {
            Some(v) if !name.is_empty() => take_value(v.trim_start()),
            _ => (false, rest),
        };
        if !value_ok {
            return Err(FormParseError::ContentType(format!(
                "invalid media parameter '{}'",
                rest.trim()
            )));
        }

        let name = name.to_ascii_lowercase();
        if seen.contains(&name) {
            return Err(FormParseError::ContentType(format!(
                "duplicate parameter name '{name}'"
            )));
        }
        seen.push(name);

        let tail = tail.trim_start();
        if tail.is_empty() {
            return Ok(());
        }
        match tail.strip_prefix(';') {
            Some(next) if next.trim().is_empty() => return Ok(()),
            Some(next) => rest = next,
            None => {
                return Err(FormParseError::ContentType(format!(
                    "invalid media parameter '{}'",
                    tail.trim()
                )))
            }
        }
    }
}

fn take_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_token_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// Consume a token or quoted-string value. Returns whether one was found
/// and what follows it.
fn take_value(s: &str) -> (bool, &str) {
    let Some(quoted) = s.strip_prefix('"') else {
        let (value, tail) = take_token(s);
        return (!value.is_empty(), tail);
    };

    let mut escaped = false;
    for (i, c) in quoted.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return (true, &quoted[i + 1..]),
            _ => {}
        }
    }
    (false, s)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}
