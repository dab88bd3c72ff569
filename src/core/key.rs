//! Purpose: Derive the concrete channel/event names sent to the pub/sub service.
//! Exports: `scoped_name`.
//! Role: Shared naming contract between the subscribe and trigger surfaces.
//! Invariants: Derivation is deterministic for a given prefix and input value.
//! Invariants: An input serializing to JSON null yields the bare prefix.

use serde::Serialize;

use super::error::{Error, ErrorKind};

/// Scopes `prefix` by the JSON encoding of `input`.
///
/// Unparameterized channels and messages declare `()` as their input
/// type, which serializes to JSON null and keeps the bare prefix.
pub fn scoped_name(prefix: &str, input: &impl Serialize) -> Result<String, Error> {
    let value = serde_json::to_value(input).map_err(|err| {
        Error::new(ErrorKind::Schema)
            .with_message("input is not representable as json")
            .with_source(err)
    })?;
    if value.is_null() {
        return Ok(prefix.to_string());
    }
    let encoded = serde_json::to_string(&value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode input json")
            .with_source(err)
    })?;
    Ok(format!("{prefix}-{encoded}"))
}
