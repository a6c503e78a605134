//! JSON parsing helpers with consistent warning logs.

use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::warn;

/// Parse `raw` as `T`, falling back to `T::default()` with a warning when the
/// content is malformed. Used for side files where a corrupt document should
/// not take the queue down.
pub fn parse_or_default<T>(raw: &str, source: &Path, what: &'static str) -> T
where
    T: DeserializeOwned + Default,
{
    if raw.trim().is_empty() {
        return T::default();
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(error) => {
            warn!(
                path = %source.display(),
                raw_len = raw.len(),
                error = %error,
                "Malformed {what}, treating as empty"
            );
            T::default()
        }
    }
}
