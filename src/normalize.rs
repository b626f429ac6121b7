//! Canonical path and URL forms.
//!
//! A canonical path has exactly one leading slash and no trailing slash unless
//! it is the root. Absolute URLs are rebuilt as `origin + canonical path + query`.

use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Invalid base URL '{url}': {source}")]
    InvalidBase {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Cannot resolve '{value}' against base URL: {source}")]
    Unresolvable {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Canonicalize a path. Idempotent.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        // Collapse any run of leading slashes to one
        format!("/{}", trimmed.trim_start_matches('/'))
    } else {
        format!("/{}", trimmed)
    }
}

/// Parse and validate a base URL.
pub fn parse_base_url(base_url: &str) -> Result<Url, NormalizeError> {
    Url::parse(base_url.trim()).map_err(|source| NormalizeError::InvalidBase {
        url: base_url.to_string(),
        source,
    })
}

/// Canonicalize an absolute URL, or resolve a relative path against `base`.
pub fn normalize_absolute_url(value: &str, base: &Url) -> Result<String, NormalizeError> {
    let parsed = match Url::parse(value) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let relative = if value.starts_with('/') {
                value.to_string()
            } else {
                format!("/{}", value)
            };
            base.join(&relative).map_err(|source| NormalizeError::Unresolvable {
                value: value.to_string(),
                source,
            })?
        }
        Err(source) => {
            return Err(NormalizeError::Unresolvable {
                value: value.to_string(),
                source,
            })
        }
    };

    let mut out = parsed.origin().ascii_serialization();
    out.push_str(&normalize_path(parsed.path()));
    if let Some(query) = parsed.query() {
        out.push('?');
        out.push_str(query);
    }
    Ok(out)
}

/// Whether a canonical path may be published.
///
/// Rejects empty paths and anything carrying a literal `undefined`, which is
/// what a missing foreign key renders as upstream.
pub fn is_publishable(path: &str) -> bool {
    !path.is_empty() && path.starts_with('/') && !path.contains("undefined")
}
