//! # Response Parser
//!
//! Turns model output back into structured channels and tool-call requests.
//!
//! ## Key Components
//!
//! - `Parser`: compiled grammar for one protocol vocabulary; parses complete responses
//! - `StreamingParser`: incremental variant fed one transport fragment at a time
//! - `ParsedResult`: per-channel text plus the ordered tool calls
//!
//! ## Parsing Rules
//!
//! A channel section starts at `<channel>NAME<boundary_close>` and runs up to the
//! next channel-boundary token or the end of the response. Its text is trimmed.
//! When a channel appears more than once, the first section wins.
//!
//! Tool-call blocks are matched against the whole response, independent of
//! channel boundaries. A block whose name or parameters cannot be decoded is
//! dropped without failing the parse; model output is untrusted, so the parser
//! returns fewer populated fields instead of an error.

mod streaming;
mod tool_call;

pub use streaming::StreamingParser;
pub use tool_call::ToolCallRequest;

use crate::config::ProtocolConfig;
use crate::conversation::Channel;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tool_call::ToolCallGrammar;
use tracing::{debug, instrument};

/// Structured view of one model response
///
/// Channels the model never opened stay `None`, which is distinct from an
/// opened channel with empty text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentary: Option<String>,

    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,

    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ParsedResult {
    /// Text of a channel, if it was emitted
    pub fn channel(&self, channel: Channel) -> Option<&str> {
        self.slot(channel).as_deref()
    }

    fn slot(&self, channel: Channel) -> &Option<String> {
        match channel {
            Channel::Analysis => &self.analysis,
            Channel::Commentary => &self.commentary,
            Channel::Final => &self.final_answer,
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Option<String> {
        match channel {
            Channel::Analysis => &mut self.analysis,
            Channel::Commentary => &mut self.commentary,
            Channel::Final => &mut self.final_answer,
        }
    }

    /// Store a channel's text unless an earlier section already filled it
    fn fill(&mut self, channel: Channel, text: &str) {
        let slot = self.slot_mut(channel);
        if slot.is_none() {
            *slot = Some(text.trim().to_string());
        }
    }
}

/// Everything the parsers need to recognize one vocabulary
#[derive(Debug)]
pub(crate) struct Grammar {
    /// Channel-boundary token
    channel_token: String,
    /// `NAME<boundary_close>` for each channel
    headers: Vec<(Channel, String)>,
    tool_calls: ToolCallGrammar,
}

impl Grammar {
    fn new(config: &ProtocolConfig) -> Result<Self> {
        config.validate()?;
        let headers = Channel::ALL
            .iter()
            .map(|&channel| {
                (
                    channel,
                    format!("{}{}", channel.as_str(), config.tokens.boundary_close),
                )
            })
            .collect();

        Ok(Self {
            channel_token: config.tokens.channel.clone(),
            headers,
            tool_calls: ToolCallGrammar::new(&config.tool_tags)?,
        })
    }
}

/// Parser for one protocol vocabulary
///
/// Cheap to clone; clones share the compiled grammar.
#[derive(Debug, Clone)]
pub struct Parser {
    grammar: Arc<Grammar>,
}

impl Parser {
    /// Compile a parser for the given vocabulary
    pub fn new(config: &ProtocolConfig) -> Result<Self> {
        Ok(Self {
            grammar: Arc::new(Grammar::new(config)?),
        })
    }

    /// Parse a complete response
    #[instrument(skip_all, fields(len = response.len()))]
    pub fn parse(&self, response: &str) -> ParsedResult {
        let grammar = &self.grammar;
        let mut result = ParsedResult::default();

        for (channel, header) in &grammar.headers {
            let marker = format!("{}{}", grammar.channel_token, header);
            if let Some(start) = response.find(&marker) {
                let body = &response[start + marker.len()..];
                let end = body.find(&grammar.channel_token).unwrap_or(body.len());
                result.fill(*channel, &body[..end]);
            }
        }

        result.tool_calls = grammar.tool_calls.extract_all(response);

        debug!(
            "Parsed response: analysis={} commentary={} final={} tool_calls={}",
            result.analysis.is_some(),
            result.commentary.is_some(),
            result.final_answer.is_some(),
            result.tool_calls.len()
        );
        result
    }

    /// Start incremental parsing of a new response
    pub fn streaming(&self) -> StreamingParser {
        StreamingParser::new(self.grammar.clone())
    }
}
