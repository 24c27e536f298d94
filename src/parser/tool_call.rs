//! Tool-call block grammar shared by the batch and streaming parsers.

use crate::config::{TagPair, ToolCallTags};
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A tool invocation requested by the model
///
/// The name is not checked against any catalog; dispatching it is the
/// caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub parameters: Map<String, Value>,
}

/// Compiled patterns for one set of tool-call tags
#[derive(Debug, Clone)]
pub(crate) struct ToolCallGrammar {
    call: TagPair,
    block: Regex,
    name: Regex,
    parameters: Regex,
}

impl ToolCallGrammar {
    pub(crate) fn new(tags: &ToolCallTags) -> Result<Self> {
        Ok(Self {
            call: tags.call.clone(),
            block: lazy_pair_regex(&tags.call)?,
            name: lazy_pair_regex(&tags.name)?,
            parameters: lazy_pair_regex(&tags.parameters)?,
        })
    }

    pub(crate) fn open_tag(&self) -> &str {
        &self.call.open
    }

    pub(crate) fn close_tag(&self) -> &str {
        &self.call.close
    }

    /// Decode every complete block in `text`, left to right, skipping bad ones
    pub(crate) fn extract_all(&self, text: &str) -> Vec<ToolCallRequest> {
        self.block
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|inner| self.decode_or_skip(inner.as_str()))
            .collect()
    }

    /// Decode the text between an outer open and close tag
    pub(crate) fn decode(&self, inner: &str) -> Result<ToolCallRequest> {
        let name = self
            .name
            .captures(inner)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::MalformedToolCall("missing tool name".to_string()))?
            .to_string();

        let payload = self
            .parameters
            .captures(inner)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .ok_or_else(|| {
                Error::MalformedToolCall(format!("tool call {name:?} has no parameters tag"))
            })?;

        let parameters = if payload.is_empty() {
            Map::new()
        } else {
            serde_json::from_str::<Map<String, Value>>(payload).map_err(|source| {
                Error::MalformedToolCallParameters {
                    name: name.clone(),
                    source,
                }
            })?
        };

        Ok(ToolCallRequest { name, parameters })
    }

    /// Decode a block, logging and dropping it on failure
    pub(crate) fn decode_or_skip(&self, inner: &str) -> Option<ToolCallRequest> {
        match self.decode(inner) {
            Ok(call) => Some(call),
            Err(e) => {
                warn!("Dropping tool call block: {}", e);
                None
            }
        }
    }
}

fn lazy_pair_regex(pair: &TagPair) -> Result<Regex> {
    let pattern = format!(
        "(?s){}(.*?){}",
        regex::escape(&pair.open),
        regex::escape(&pair.close)
    );
    Ok(Regex::new(&pattern)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grammar() -> ToolCallGrammar {
        ToolCallGrammar::new(&ToolCallTags::default()).unwrap()
    }

    #[test]
    fn test_decode_block() {
        let call = grammar()
            .decode("\n<name> get_time </name>\n<parameters>{\"tz\": \"UTC\"}</parameters>\n")
            .unwrap();

        assert_eq!(call.name, "get_time");
        assert_eq!(Value::Object(call.parameters), json!({"tz": "UTC"}));
    }

    #[test]
    fn test_decode_nested_parameters() {
        let call = grammar()
            .decode(r#"<name>plan</name><parameters>{"steps": [{"id": 1, "deps": []}], "opts": {"dry": true}}</parameters>"#)
            .unwrap();
        assert_eq!(call.parameters["steps"][0]["id"], json!(1));
        assert_eq!(call.parameters["opts"]["dry"], json!(true));
    }

    #[test]
    fn test_decode_empty_payload_is_empty_object() {
        let call = grammar()
            .decode("<name>ping</name><parameters> </parameters>")
            .unwrap();
        assert!(call.parameters.is_empty());
    }

    #[test]
    fn test_decode_errors() {
        let g = grammar();

        assert!(matches!(
            g.decode("<parameters>{}</parameters>"),
            Err(Error::MalformedToolCall(_))
        ));
        assert!(matches!(
            g.decode("<name>  </name><parameters>{}</parameters>"),
            Err(Error::MalformedToolCall(_))
        ));
        assert!(matches!(
            g.decode("<name>ping</name>"),
            Err(Error::MalformedToolCall(_))
        ));
        assert!(matches!(
            g.decode("<name>ping</name><parameters>{not json</parameters>"),
            Err(Error::MalformedToolCallParameters { ref name, .. }) if name == "ping"
        ));
        // Valid JSON, but not an object
        assert!(matches!(
            g.decode("<name>ping</name><parameters>[1, 2]</parameters>"),
            Err(Error::MalformedToolCallParameters { .. })
        ));
    }

    #[test]
    fn test_extract_all_skips_malformed() {
        let text = "<tool_call><name>a</name><parameters>{oops</parameters></tool_call>\
                    <tool_call><name>b</name><parameters>{\"n\": 2}</parameters></tool_call>\
                    <tool_call><name>c</name><parameters>{}</parameters>";
        let calls = grammar().extract_all(text);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "b");
    }
}
