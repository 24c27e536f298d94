//! # Conversation Model
//!
//! Turns are the unit the encoder renders. A conversation is simply an ordered
//! slice of them; order defines the context the model sees.
//!
//! Roles and channels are closed sets. Text from outside the crate (JSON files,
//! user input) is validated when it is turned into a [`Role`] or [`Channel`], so
//! a constructed [`Turn`] is always renderable.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// The literal written to the wire after the message-start token
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Section of an assistant turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    /// Internal reasoning, never shown to the user
    Analysis,
    /// Planning notes and tool calls
    Commentary,
    /// The user-facing answer
    Final,
}

impl Channel {
    /// Every channel, in the order the parser reports them
    pub const ALL: [Channel; 3] = [Channel::Analysis, Channel::Commentary, Channel::Final];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Analysis => "analysis",
            Channel::Commentary => "commentary",
            Channel::Final => "final",
        }
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "analysis" => Ok(Channel::Analysis),
            "commentary" => Ok(Channel::Commentary),
            "final" => Ok(Channel::Final),
            other => Err(Error::InvalidChannel(other.to_string())),
        }
    }
}

impl TryFrom<String> for Channel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.as_str().to_string()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn
    pub role: Role,

    /// Raw text content, written to the wire verbatim
    pub content: String,

    /// Channel tag; only meaningful on assistant turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

impl Turn {
    /// Create a turn from a role literal, rejecting unknown roles
    pub fn new(role: &str, content: impl Into<String>) -> Result<Self> {
        Ok(Self {
            role: role.parse()?,
            content: content.into(),
            channel: None,
        })
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Assistant turn tagged with a channel
    pub fn assistant_on(channel: Channel, content: impl Into<String>) -> Self {
        Self::assistant(content).with_channel(channel)
    }

    /// Tool output fed back into the conversation by the caller
    pub fn tool(content: impl Into<String>) -> Self {
        Self::with_role(Role::Tool, content)
    }

    /// Set the channel for this turn
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            channel: None,
        }
    }
}
