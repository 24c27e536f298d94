//! # Protocol Configuration
//!
//! Token literals, tool-call tags, and the channel preamble are plain values
//! handed to [`Encoder::new`](crate::Encoder::new) and
//! [`Parser::new`](crate::Parser::new). Two conversations can run with
//! different vocabularies side by side; nothing here is global.
//!
//! ## Key Components
//!
//! - `WireTokens`: the four boundary markers framing every turn
//! - `ToolCallTags`: tag pairs wrapping a tool-call block, its name, and its parameters
//! - `ProtocolConfig`: the full vocabulary plus the system preamble
//! - `ProtocolConfigBuilder`: fluent construction on top of the defaults
//!
//! Configuration can also be loaded from JSON, where every field is optional
//! and falls back to the defaults below.

use crate::conversation::Channel;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const DEFAULT_PREAMBLE: &str = "\
Your reply is split into channels. Start each section with the channel marker.
- analysis: private step-by-step reasoning. Never shown to the user.
- commentary: plans, progress notes, and tool calls.
- final: the complete answer shown to the user.";

/// Boundary markers used to frame turns and channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireTokens {
    /// Opens every rendered turn
    pub boundary_open: String,

    /// Precedes the role literal
    pub message_start: String,

    /// Precedes a channel literal
    pub channel: String,

    /// Ends the turn header; content follows
    pub boundary_close: String,
}

impl Default for WireTokens {
    fn default() -> Self {
        Self {
            boundary_open: "<|start|>".to_string(),
            message_start: "<|msg|>".to_string(),
            channel: "<|channel|>".to_string(),
            boundary_close: "<|message|>".to_string(),
        }
    }
}

/// An opening/closing literal pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPair {
    pub open: String,
    pub close: String,
}

impl TagPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Wrap `inner` in this tag pair
    pub fn wrap(&self, inner: &str) -> String {
        format!("{}{}{}", self.open, inner, self.close)
    }
}

/// Tags delimiting a tool-call block in model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallTags {
    /// Outer wrapper around the whole block
    pub call: TagPair,

    /// Wraps the tool name
    pub name: TagPair,

    /// Wraps the JSON object of arguments
    pub parameters: TagPair,
}

impl Default for ToolCallTags {
    fn default() -> Self {
        Self {
            call: TagPair::new("<tool_call>", "</tool_call>"),
            name: TagPair::new("<name>", "</name>"),
            parameters: TagPair::new("<parameters>", "</parameters>"),
        }
    }
}

impl ToolCallTags {
    /// Literal instructions telling the model how to emit a tool call
    pub fn instructions(&self) -> String {
        format!(
            "To call a tool, emit exactly:\n{}\n{}\n{}\n{}",
            self.call.open,
            self.name.wrap("TOOL_NAME"),
            self.parameters.wrap(r#"{"argument": "value"}"#),
            self.call.close,
        )
    }
}

/// Complete protocol vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Turn and channel markers
    pub tokens: WireTokens,

    /// Tool-call block tags
    pub tool_tags: ToolCallTags,

    /// Channel description merged into the system turn when tools are offered
    pub preamble: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            tokens: WireTokens::default(),
            tool_tags: ToolCallTags::default(),
            preamble: DEFAULT_PREAMBLE.to_string(),
        }
    }
}

impl ProtocolConfig {
    /// Create a new builder
    pub fn builder() -> ProtocolConfigBuilder {
        ProtocolConfigBuilder::new()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file
    pub async fn read_config(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading protocol config from {}", path.display());
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }

    /// Reject vocabularies the parser cannot scan unambiguously
    pub fn validate(&self) -> Result<()> {
        let tokens = [
            ("boundary_open", &self.tokens.boundary_open),
            ("message_start", &self.tokens.message_start),
            ("channel", &self.tokens.channel),
            ("boundary_close", &self.tokens.boundary_close),
        ];
        for (field, literal) in tokens {
            if literal.is_empty() {
                return Err(Error::InvalidConfig(format!("token {field} is empty")));
            }
        }
        for (i, (field, literal)) in tokens.iter().enumerate() {
            if let Some((other, _)) = tokens[i + 1..].iter().find(|(_, l)| l == literal) {
                return Err(Error::InvalidConfig(format!(
                    "tokens {field} and {other} are both {literal:?}"
                )));
            }
        }

        // A channel token starting inside a channel header would be skipped
        // by the streaming parser but found by the batch parser
        let channel = self.tokens.channel.as_str();
        for name in Channel::ALL.iter().map(|c| c.as_str()) {
            let marker = format!("{channel}{name}{}", self.tokens.boundary_close);
            let overlaps = marker.char_indices().skip(1).any(|(i, _)| {
                let rest = &marker[i..];
                rest.starts_with(channel) || channel.starts_with(rest)
            });
            if overlaps {
                return Err(Error::InvalidConfig(format!(
                    "channel token {channel:?} overlaps the {name} channel header"
                )));
            }
        }

        let tags = [
            ("call", &self.tool_tags.call),
            ("name", &self.tool_tags.name),
            ("parameters", &self.tool_tags.parameters),
        ];
        for (field, pair) in tags {
            if pair.open.is_empty() || pair.close.is_empty() {
                return Err(Error::InvalidConfig(format!("tag pair {field} has an empty literal")));
            }
            if pair.open == pair.close {
                return Err(Error::InvalidConfig(format!(
                    "tag pair {field} opens and closes with {:?}",
                    pair.open
                )));
            }
        }

        Ok(())
    }
}

/// Builder for ProtocolConfig
#[derive(Debug, Default)]
pub struct ProtocolConfigBuilder {
    config: ProtocolConfig,
}

impl ProtocolConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ProtocolConfig::default(),
        }
    }

    /// Replace all four wire tokens
    pub fn tokens(mut self, tokens: WireTokens) -> Self {
        self.config.tokens = tokens;
        self
    }

    /// Set the token that opens a turn
    pub fn boundary_open(mut self, boundary_open: impl Into<String>) -> Self {
        self.config.tokens.boundary_open = boundary_open.into();
        self
    }

    /// Set the token between the boundary and the role
    pub fn message_start(mut self, message_start: impl Into<String>) -> Self {
        self.config.tokens.message_start = message_start.into();
        self
    }

    /// Set the channel-boundary token
    pub fn channel_token(mut self, channel: impl Into<String>) -> Self {
        self.config.tokens.channel = channel.into();
        self
    }

    /// Set the closing boundary token
    pub fn boundary_close(mut self, boundary_close: impl Into<String>) -> Self {
        self.config.tokens.boundary_close = boundary_close.into();
        self
    }

    /// Replace the tool-call tags
    pub fn tool_tags(mut self, tool_tags: ToolCallTags) -> Self {
        self.config.tool_tags = tool_tags;
        self
    }

    /// Set the channel preamble
    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.config.preamble = preamble.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ProtocolConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProtocolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config =
            ProtocolConfig::from_json_str(r#"{"tokens": {"channel": "<|ch|>"}}"#).unwrap();

        assert_eq!(config.tokens.channel, "<|ch|>");
        assert_eq!(config.tokens.boundary_close, "<|message|>");
        assert_eq!(config.tool_tags, ToolCallTags::default());
        assert_eq!(config.preamble, DEFAULT_PREAMBLE);
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let config = ProtocolConfig::builder().channel_token("").build();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_colliding_tokens() {
        let config = ProtocolConfig::builder()
            .channel_token("<|x|>")
            .boundary_close("<|x|>")
            .build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("channel"));
    }

    #[test]
    fn test_builder_sets_every_token() {
        let config = ProtocolConfig::builder()
            .boundary_open("[[")
            .message_start("|")
            .channel_token("#")
            .boundary_close("]]")
            .build();

        assert_eq!(
            config.tokens,
            WireTokens {
                boundary_open: "[[".to_string(),
                message_start: "|".to_string(),
                channel: "#".to_string(),
                boundary_close: "]]".to_string(),
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_token_overlapping_header() {
        // "l:" reappears at the end of "l:final:"
        let config = ProtocolConfig::builder()
            .channel_token("l:")
            .boundary_close(":")
            .build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("final"));

        // ":x" may begin at the closing ":" of a header
        let config = ProtocolConfig::builder()
            .channel_token(":x")
            .boundary_close(":")
            .build();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        // Self-overlap alone is scanned correctly
        let config = ProtocolConfig::builder()
            .channel_token("@@")
            .boundary_close(":")
            .build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_symmetric_tag_pair() {
        let config = ProtocolConfig::builder()
            .tool_tags(ToolCallTags {
                call: TagPair::new("```", "```"),
                ..ToolCallTags::default()
            })
            .build();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_instructions_follow_configured_tags() {
        let tags = ToolCallTags {
            name: TagPair::new("<fn>", "</fn>"),
            ..ToolCallTags::default()
        };
        let instructions = tags.instructions();

        assert!(instructions.contains("<fn>TOOL_NAME</fn>"));
        assert!(instructions.contains(r#"<parameters>{"argument": "value"}</parameters>"#));
        assert!(instructions.ends_with("</tool_call>"));
    }

    #[tokio::test]
    async fn test_read_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"preamble": "Use channels."}}"#).unwrap();

        let config = ProtocolConfig::read_config(file.path()).await.unwrap();
        assert_eq!(config.preamble, "Use channels.");
        assert_eq!(config.tokens, WireTokens::default());
    }

    #[tokio::test]
    async fn test_read_config_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tokens": {{"message_start": ""}}}}"#).unwrap();

        let err = ProtocolConfig::read_config(file.path()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
