//! # Parley - Channel-Tagged Wire Protocol for Tool-Augmented Conversations
//!
//! This crate frames structured conversations into the flat, token-delimited
//! text a channel-aware model expects, and parses that model's output, whole or
//! streamed, back into channels and tool-call requests.
//!
//! ## Features
//!
//! - Encoding of system/user/assistant/tool turns with optional channel tags
//! - Tool catalogs rendered as interface declarations in the system turn
//! - Batch parsing of complete responses into analysis/commentary/final channels
//! - Incremental parsing that tolerates tokens split across network reads
//! - Best-effort tool-call extraction: malformed blocks are dropped, not fatal
//! - Configurable token vocabulary, passed explicitly, never global
//!
//! The crate never opens connections or runs tools. Feeding it fragments and
//! dispatching the tool calls it returns is the caller's job.
//!
//! ## Example
//!
//! ```rust
//! use parley::{Channel, Encoder, Parser, ProtocolConfig, Turn};
//!
//! # fn main() -> parley::Result<()> {
//! let config = ProtocolConfig::default();
//! let wire = Encoder::new(&config).encode(
//!     &[Turn::assistant_on(Channel::Final, "Here's the answer")],
//!     None,
//! );
//!
//! let parser = Parser::new(&config)?;
//! let mut streaming = parser.streaming();
//! for piece in ["<|channel|>fi", "nal<|message|>Here's the answer"] {
//!     streaming.feed(piece)?;
//! }
//! let streamed = streaming.finalize()?;
//!
//! assert_eq!(parser.parse(wire.as_str()), streamed);
//! assert_eq!(streamed.final_answer.as_deref(), Some("Here's the answer"));
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod conversation;
mod encoder;
mod error;
pub mod parser;
pub mod stream;

pub use catalog::{ParamType, ToolCatalog, ToolDeclaration, ToolParameter};
pub use config::{ProtocolConfig, TagPair, ToolCallTags, WireTokens};
pub use conversation::{Channel, Role, Turn};
pub use encoder::{Encoder, WireText, render_tool_catalog};
pub use error::{Error, Result};
pub use parser::{ParsedResult, Parser, StreamingParser, ToolCallRequest};

/// Re-export of the commonly used types
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::{
        Channel, Encoder, ParsedResult, Parser, ProtocolConfig, Role, StreamingParser,
        ToolCallRequest, ToolCatalog, ToolDeclaration, Turn,
    };
}
