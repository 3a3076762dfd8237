//! URL normalization applied to every accepted write.
//!
//! Upstream sanitizers sometimes collapse `://` into `/` or `:/`, so
//! `https://a.com` can arrive as `https/a.com` or `https:/a.com`. The
//! normalizer repairs those, defaults bare hosts to `http://`, and rejects
//! empty input.

use crate::error::ValidationError;

/// Parameter name reported by [`ValidationError::EmptyInput`].
pub const FULL_URL_PARAMETER: &str = "full_url";

/// Damaged scheme prefixes, longest first so `https:/` never falls through
/// to `http:/`.
const MANGLED_SCHEMES: [(&str, &str); 4] = [
    ("https:/", "https://"),
    ("https/", "https://"),
    ("http:/", "http://"),
    ("http/", "http://"),
];

/// Normalize a raw URL into an absolute `http://` or `https://` URL.
///
/// Accepts `&str` or `Option<&str>`; `None` is rejected the same way as an
/// empty string.
///
/// ```
/// use moonlink::normalize::normalize;
///
/// assert_eq!(normalize("a.com").unwrap(), "http://a.com");
/// assert_eq!(normalize("https:/a.com").unwrap(), "https://a.com");
/// let missing: Option<&str> = None;
/// assert!(normalize(missing).is_err());
/// ```
pub fn normalize<'a>(raw: impl Into<Option<&'a str>>) -> Result<String, ValidationError> {
    let trimmed = raw.into().map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput {
            parameter: FULL_URL_PARAMETER,
        });
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(trimmed.to_string());
    }

    for (prefix, scheme) in MANGLED_SCHEMES {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return Ok(format!("{scheme}{rest}"));
        }
    }

    Ok(format!("http://{trimmed}"))
}
