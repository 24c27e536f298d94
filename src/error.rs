//! Error types for the parley crate

use thiserror::Error;

/// Result type for parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for parley operations
///
/// Only caller misuse (bad roles, duplicate tool names, driving a finished
/// streaming parser, bad configuration) surfaces from the public API. The
/// malformed tool-call variants are produced while decoding model output and
/// are logged and dropped rather than returned.
#[derive(Debug, Error)]
pub enum Error {
    /// A turn was given a role outside system/user/assistant/tool
    #[error("Invalid role: {0:?}")]
    InvalidRole(String),

    /// A turn was given a channel outside analysis/commentary/final
    #[error("Invalid channel: {0:?}")]
    InvalidChannel(String),

    /// Two declarations in one catalog share a name
    #[error("Duplicate tool name: {0:?}")]
    DuplicateToolName(String),

    /// The streaming parser was fed or finalized after finalization
    #[error("Parser already finalized")]
    ParserAlreadyFinalized,

    /// A tool-call block is missing its name or parameters tag
    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),

    /// A tool-call block's parameters payload is not a JSON object
    #[error("Malformed parameters for tool call {name:?}: {source}")]
    MalformedToolCallParameters {
        /// Name of the tool the block addressed
        name: String,
        /// Underlying decode failure
        #[source]
        source: serde_json::Error,
    },

    /// Protocol configuration is unusable
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error while loading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tag pattern failed to compile
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}
