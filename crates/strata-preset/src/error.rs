//! Preset loading errors.

/// Why a preset was rejected. Every variant is fatal: an engine is never
/// built from a preset that failed to load.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the preset file from disk.
    #[error("failed to read preset: {0}")]
    Io(#[source] std::io::Error),

    /// The document is not well-formed.
    #[error("failed to parse preset: {0}")]
    Parse(#[source] ron::error::SpannedError),

    /// The document is well-formed but does not match the preset schema.
    #[error("preset does not match the schema: {0}")]
    Schema(#[source] serde_json::Error),

    /// The stored version is newer than this build understands, or invalid.
    #[error("preset version {found} is not supported (this build reads 1..={supported})")]
    UnsupportedVersion { found: i64, supported: u32 },

    /// The noise graph is not acyclic.
    #[error("noise graph contains a cycle through: {}", nodes.join(", "))]
    CyclicGraph { nodes: Vec<String> },

    /// A node, port, curve or id reference does not resolve to exactly one target.
    #[error("{context}: unresolved reference `{name}`")]
    UnresolvedReference { context: String, name: String },

    /// A numeric parameter is outside its allowed range.
    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: String,
        value: f64,
        expected: String,
    },
}

impl ConfigError {
    pub(crate) fn unresolved(context: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            context: context.into(),
            name: name.into(),
        }
    }

    pub(crate) fn out_of_range(
        field: impl Into<String>,
        value: f64,
        expected: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value,
            expected: expected.into(),
        }
    }

    /// A schema error with a custom message.
    pub(crate) fn schema(message: impl std::fmt::Display) -> Self {
        Self::Schema(<serde_json::Error as serde::de::Error>::custom(message))
    }
}
