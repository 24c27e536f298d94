//! # Conversation Encoder
//!
//! Flattens an ordered list of turns, plus an optional tool catalog, into the
//! token-delimited wire text the backend expects.
//!
//! Every turn renders as
//!
//! ```text
//! <boundary_open><message_start>ROLE[<channel>CHANNEL]<boundary_close>CONTENT
//! ```
//!
//! and rendered turns are joined with a single newline. When a catalog is
//! supplied, the channel preamble, the rendered catalog, and the tool-call
//! instructions are merged into the first system turn (or a new system turn is
//! placed at the front).
//!
//! Encoding is a pure, deterministic function of its inputs.

mod tools;

pub use tools::render_tool_catalog;

use crate::catalog::ToolCatalog;
use crate::config::{ProtocolConfig, ToolCallTags, WireTokens};
use crate::conversation::{Channel, Role, Turn};
use std::fmt;
use tracing::{debug, instrument};

/// Flattened conversation ready for the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireText(String);

impl WireText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for WireText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WireText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<WireText> for String {
    fn from(text: WireText) -> Self {
        text.0
    }
}

/// Renders conversations with one protocol vocabulary
#[derive(Debug, Clone)]
pub struct Encoder {
    tokens: WireTokens,
    tool_tags: ToolCallTags,
    preamble: String,
}

impl Encoder {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            tokens: config.tokens.clone(),
            tool_tags: config.tool_tags.clone(),
            preamble: config.preamble.clone(),
        }
    }

    /// Encode a conversation, advertising `tools` when given
    #[instrument(skip_all, fields(turns = turns.len(), tools = tools.map(ToolCatalog::len)))]
    pub fn encode(&self, turns: &[Turn], tools: Option<&ToolCatalog>) -> WireText {
        let mut rendered = Vec::with_capacity(turns.len() + 1);

        match tools {
            None => rendered.extend(turns.iter().map(|turn| self.render_turn(turn))),
            Some(catalog) => {
                let tool_block = self.tool_block(catalog);
                let system_index = turns.iter().position(|turn| turn.role == Role::System);

                if system_index.is_none() {
                    rendered.push(self.render(Role::System, None, &tool_block));
                }
                for (index, turn) in turns.iter().enumerate() {
                    if Some(index) == system_index {
                        let content = if turn.content.is_empty() {
                            tool_block.clone()
                        } else {
                            format!("{}\n\n{}", tool_block, turn.content)
                        };
                        rendered.push(self.render(turn.role, turn.channel, &content));
                    } else {
                        rendered.push(self.render_turn(turn));
                    }
                }
            }
        }

        let wire = WireText(rendered.join("\n"));
        debug!("Encoded {} turns into {} bytes of wire text", rendered.len(), wire.len());
        wire
    }

    /// Render a single turn exactly as it appears inside the wire text
    pub fn render_turn(&self, turn: &Turn) -> String {
        self.render(turn.role, turn.channel, &turn.content)
    }

    fn render(&self, role: Role, channel: Option<Channel>, content: &str) -> String {
        let mut out = String::with_capacity(content.len() + 48);
        out.push_str(&self.tokens.boundary_open);
        out.push_str(&self.tokens.message_start);
        out.push_str(role.as_str());
        if let Some(channel) = channel {
            out.push_str(&self.tokens.channel);
            out.push_str(channel.as_str());
        }
        out.push_str(&self.tokens.boundary_close);
        out.push_str(content);
        out
    }

    /// Preamble, catalog, and tool-call instructions for the system turn
    fn tool_block(&self, catalog: &ToolCatalog) -> String {
        let mut sections = vec![self.preamble.clone()];
        if !catalog.is_empty() {
            sections.push(format!("# Tools\n\n{}", render_tool_catalog(catalog)));
        }
        sections.push(self.tool_tags.instructions());
        sections.join("\n\n")
    }
}
