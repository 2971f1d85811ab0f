use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpecError>;

/// Crate-wide error taxonomy.
///
/// Per-hypothesis decode mismatches are *data* (see `spec_blob::AttemptStatus`),
/// never errors: other hypotheses may still succeed, and a fully failed decode
/// is reported together with its diagnostics. Unresolvable cross-references
/// during rendering degrade to best-effort text and are not represented here
/// at all.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Direct misuse of a parse/decode entry point: a required argument is
    /// blank. Fails fast, never partially constructs a result.
    #[error("required argument `{name}` is blank")]
    MissingArgument { name: &'static str },

    /// The metadata collaborator has no document for the requested key.
    #[error("no spec document found for `{key}`")]
    SpecNotFound { key: String },

    /// The object catalog returned zero business functions for the derived
    /// search pattern.
    #[error("no business function in the object catalog matches `{pattern}`")]
    BusinessFunctionNotFound { pattern: String },

    /// No decode hypothesis produced a structurally valid spec stream.
    /// Full per-attempt diagnostics were emitted on the `debug` log target.
    #[error("no decode hypothesis produced a valid spec stream for `{key}` ({attempts} attempts)")]
    DecodeFailed { key: String, attempts: usize },

    /// The unpacked payload could not be decoded to text under the declared
    /// code page or the configured fallback codec.
    #[error("failed to decode payload text for `{key}`: {message}")]
    PayloadDecode { key: String, message: String },

    /// The spec payload is not parseable XML at all (malformed beyond the
    /// tolerance of payload normalization).
    #[error("spec payload for `{key}` is not parseable XML: {message}")]
    XmlParse { key: String, message: String },

    /// A failure inside the metadata collaborator, propagated unchanged.
    /// Retry/backoff, if any, belongs to the collaborator.
    #[error("metadata query failed: {message}")]
    Metadata { message: String },
}

impl SpecError {
    pub(crate) fn xml_parse(key: &str, err: impl std::fmt::Display) -> Self {
        SpecError::XmlParse {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        SpecError::Metadata {
            message: message.into(),
        }
    }
}
