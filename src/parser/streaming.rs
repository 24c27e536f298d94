//! Incremental parsing over transport fragments.
//!
//! The streaming parser produces exactly what [`Parser::parse`](super::Parser::parse)
//! would produce for the concatenation of every fragment, however the text was
//! split. Tokens cut in half by a fragment boundary are held back until the
//! next fragment settles them.

use super::tool_call::ToolCallRequest;
use super::{Grammar, ParsedResult};
use crate::conversation::Channel;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, trace};

/// Where the channel scanner stands relative to the last channel token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Outside any known channel; text is discarded
    Outside,
    /// Buffer starts with a channel token; waiting for `NAME<boundary_close>`
    Header,
    /// Inside a known channel; text accumulates
    Open(Channel),
}

/// Result of matching the buffer against the channel headers
enum HeaderMatch {
    Known(Channel, usize),
    Incomplete,
    Unknown,
}

/// Incremental parser for one response
///
/// Feed fragments in arrival order with [`feed`](Self::feed) and call
/// [`finalize`](Self::finalize) once when the stream ends. Dropping the parser
/// without finalizing cancels the parse.
#[derive(Debug)]
pub struct StreamingParser {
    grammar: Arc<Grammar>,
    /// Unconsumed text awaiting a token boundary
    buffer: String,
    cursor: Cursor,
    /// Text of the open channel so far
    channel_text: String,
    completed: ParsedResult,
    /// Unconsumed text awaiting a complete tool-call block
    tool_call_buffer: String,
    /// Bytes of the pending block body already searched for the close tag
    close_search_from: usize,
    finalized: bool,
}

impl StreamingParser {
    pub(crate) fn new(grammar: Arc<Grammar>) -> Self {
        Self {
            grammar,
            buffer: String::new(),
            cursor: Cursor::Outside,
            channel_text: String::new(),
            completed: ParsedResult::default(),
            tool_call_buffer: String::new(),
            close_search_from: 0,
            finalized: false,
        }
    }

    /// Consume the next fragment of the response
    pub fn feed(&mut self, fragment: &str) -> Result<()> {
        if self.finalized {
            return Err(Error::ParserAlreadyFinalized);
        }
        trace!("Feeding {} bytes", fragment.len());

        self.buffer.push_str(fragment);
        self.tool_call_buffer.push_str(fragment);
        self.scan_channels();
        self.scan_tool_calls();
        Ok(())
    }

    /// End the stream and return the parsed response
    ///
    /// A channel still open at the end of the stream is closed as if a
    /// channel token had arrived.
    pub fn finalize(&mut self) -> Result<ParsedResult> {
        if self.finalized {
            return Err(Error::ParserAlreadyFinalized);
        }
        self.finalized = true;

        if let Cursor::Open(channel) = self.cursor {
            self.channel_text.push_str(&self.buffer);
            self.close_channel(channel);
        }
        self.buffer.clear();
        self.tool_call_buffer.clear();
        self.close_search_from = 0;
        self.cursor = Cursor::Outside;

        let result = std::mem::take(&mut self.completed);
        debug!(
            "Finalized streamed response: analysis={} commentary={} final={} tool_calls={}",
            result.analysis.is_some(),
            result.commentary.is_some(),
            result.final_answer.is_some(),
            result.tool_calls.len()
        );
        Ok(result)
    }

    /// Channel currently receiving text, if any
    pub fn open_channel(&self) -> Option<Channel> {
        match self.cursor {
            Cursor::Open(channel) => Some(channel),
            _ => None,
        }
    }

    /// Tool calls completed so far, in order of appearance
    pub fn completed_tool_calls(&self) -> &[ToolCallRequest] {
        &self.completed.tool_calls
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn scan_channels(&mut self) {
        let grammar = Arc::clone(&self.grammar);
        let token = grammar.channel_token.as_str();

        loop {
            match self.cursor {
                Cursor::Header => match self.match_header(&self.buffer[token.len()..]) {
                    HeaderMatch::Known(channel, header_len) => {
                        self.buffer.drain(..token.len() + header_len);
                        self.channel_text.clear();
                        self.cursor = Cursor::Open(channel);
                    }
                    HeaderMatch::Incomplete => return,
                    HeaderMatch::Unknown => {
                        // Another token may start inside this one
                        let step = self.buffer.chars().next().map_or(0, char::len_utf8);
                        self.buffer.drain(..step);
                        self.cursor = Cursor::Outside;
                    }
                },
                Cursor::Outside | Cursor::Open(_) => {
                    match self.buffer.find(token) {
                        Some(at) => {
                            if let Cursor::Open(channel) = self.cursor {
                                self.channel_text.push_str(&self.buffer[..at]);
                                self.close_channel(channel);
                            }
                            self.buffer.drain(..at);
                            self.cursor = Cursor::Header;
                        }
                        None => {
                            let keep = partial_token_suffix(&self.buffer, token);
                            let cut = self.buffer.len() - keep;
                            if let Cursor::Open(_) = self.cursor {
                                self.channel_text.push_str(&self.buffer[..cut]);
                            }
                            self.buffer.drain(..cut);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn match_header(&self, rest: &str) -> HeaderMatch {
        let mut incomplete = false;
        for (channel, header) in &self.grammar.headers {
            if rest.starts_with(header.as_str()) {
                return HeaderMatch::Known(*channel, header.len());
            }
            if header.starts_with(rest) {
                incomplete = true;
            }
        }
        if incomplete {
            HeaderMatch::Incomplete
        } else {
            HeaderMatch::Unknown
        }
    }

    fn close_channel(&mut self, channel: Channel) {
        trace!("Closing channel {}", channel);
        let text = std::mem::take(&mut self.channel_text);
        self.completed.fill(channel, &text);
        self.cursor = Cursor::Outside;
    }

    fn scan_tool_calls(&mut self) {
        let tool_calls = &self.grammar.tool_calls;
        let open = tool_calls.open_tag();
        let close = tool_calls.close_tag();

        loop {
            let Some(start) = self.tool_call_buffer.find(open) else {
                let keep = partial_token_suffix(&self.tool_call_buffer, open);
                let cut = self.tool_call_buffer.len() - keep;
                self.tool_call_buffer.drain(..cut);
                return;
            };

            let body_start = start + open.len();
            let search_from = body_start + self.close_search_from;
            let Some(len) = self.tool_call_buffer[search_from..].find(close) else {
                // Block still arriving; only its tail can begin the close tag
                self.tool_call_buffer.drain(..start);
                let body = &self.tool_call_buffer[open.len()..];
                self.close_search_from =
                    floor_char_boundary(body, body.len().saturating_sub(close.len() - 1));
                return;
            };

            let body_end = search_from + len;
            if let Some(call) = tool_calls.decode_or_skip(&self.tool_call_buffer[body_start..body_end]) {
                debug!("Tool call {} completed mid-stream", call.name);
                self.completed.tool_calls.push(call);
            }
            self.tool_call_buffer.drain(..body_end + close.len());
            self.close_search_from = 0;
        }
    }
}

/// Length of the longest suffix of `buffer` that is a proper prefix of `token`
fn partial_token_suffix(buffer: &str, token: &str) -> usize {
    (1..token.len().min(buffer.len() + 1))
        .rev()
        .filter(|&len| token.is_char_boundary(len))
        .find(|&len| buffer.ends_with(&token[..len]))
        .unwrap_or(0)
}

fn floor_char_boundary(text: &str, mut at: usize) -> usize {
    while !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}
