//! End-to-end checks of the encode → transport → parse loop through the public API.

use parley::prelude::*;
use parley::{ParamType, stream::parse_stream};
use serde_json::{Value, json};

fn config() -> ProtocolConfig {
    ProtocolConfig::default()
}

#[test]
fn test_final_turn_round_trip() {
    let config = config();
    let wire = Encoder::new(&config).encode(
        &[Turn::assistant_on(Channel::Final, "Here's the answer")],
        None,
    );
    let result = Parser::new(&config).unwrap().parse(wire.as_str());

    assert_eq!(result.final_answer.as_deref(), Some("Here's the answer"));
    assert!(result.analysis.is_none());
    assert!(result.commentary.is_none());
    assert!(result.tool_calls.is_empty());
}

#[test]
fn test_round_trip_every_channel() {
    let config = config();
    let encoder = Encoder::new(&config);
    let parser = Parser::new(&config).unwrap();

    for channel in Channel::ALL {
        let content = format!("  text for {channel}\nacross lines  ");
        let wire = encoder.encode(&[Turn::assistant_on(channel, content.clone())], None);
        let result = parser.parse(wire.as_str());

        assert_eq!(result.channel(channel), Some(content.trim()));
        for other in Channel::ALL.into_iter().filter(|c| *c != channel) {
            assert_eq!(result.channel(other), None);
        }
    }
}

#[test]
fn test_assistant_turns_in_one_wire_text() {
    let config = config();
    let wire = Encoder::new(&config).encode(
        &[
            Turn::system("You are helpful."),
            Turn::user("Time?"),
            Turn::assistant_on(Channel::Analysis, "Need the clock."),
            Turn::assistant_on(Channel::Final, "Noon."),
        ],
        None,
    );
    let result = Parser::new(&config).unwrap().parse(wire.as_str());

    // The next turn's header is not a channel token, so it stays in the text
    assert!(result.analysis.unwrap().starts_with("Need the clock.\n<|start|>"));
    assert_eq!(result.final_answer.as_deref(), Some("Noon."));
}

#[test]
fn test_tool_call_loop() {
    let config = config();
    let catalog = ToolCatalog::new(vec![
        ToolDeclaration::new("get_time", "Current time")
            .with_parameter("tz", ParamType::String, "IANA timezone"),
    ])
    .unwrap();
    let encoder = Encoder::new(&config);
    let parser = Parser::new(&config).unwrap();

    let mut conversation = vec![Turn::user("What time is it in Tokyo?")];
    let prompt = encoder.encode(&conversation, Some(&catalog));
    assert!(prompt.as_str().contains("type get_time = (_: {"));

    let response = "<|channel|>analysis<|message|>Use the clock tool.\
        <|channel|>commentary<|message|><tool_call><name>get_time</name>\
        <parameters>{\"tz\": \"Asia/Tokyo\"}</parameters></tool_call>";
    let result = parser.parse(response);
    assert_eq!(result.tool_calls.len(), 1);

    let call = &result.tool_calls[0];
    assert!(catalog.get(&call.name).is_some());
    assert_eq!(call.parameters["tz"], json!("Asia/Tokyo"));

    conversation.push(Turn::assistant_on(
        Channel::Commentary,
        result.commentary.clone().unwrap(),
    ));
    conversation.push(Turn::tool(r#"{"time": "21:00"}"#));
    let follow_up = encoder.encode(&conversation, Some(&catalog));

    assert!(follow_up.as_str().ends_with(
        "<|start|><|msg|>tool<|message|>{\"time\": \"21:00\"}"
    ));
}

#[test]
fn test_malformed_and_wellformed_tool_calls() {
    let parser = Parser::new(&config()).unwrap();

    let malformed_only = parser.parse(
        "<tool_call><name>search</name><parameters>{not json</parameters></tool_call>",
    );
    assert!(malformed_only.tool_calls.is_empty());

    for response in [
        "<tool_call><name>search</name><parameters>{not json</parameters></tool_call>\
         <tool_call><name>get_time</name><parameters>{\"x\": 1}</parameters></tool_call>",
        "<tool_call><name>get_time</name><parameters>{\"x\": 1}</parameters></tool_call>\
         <tool_call><name>search</name><parameters>{not json</parameters></tool_call>",
    ] {
        let result = parser.parse(response);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "get_time");
        assert_eq!(
            Value::Object(result.tool_calls[0].parameters.clone()),
            json!({"x": 1})
        );
    }
}

#[tokio::test]
async fn test_streamed_response_matches_batch() {
    let response = "<|channel|>analysis<|message|>Thinking...\n\
        <|channel|>commentary<|message|><tool_call><name>a</name><parameters>{\"k\": [1, {\"n\": null}]}</parameters></tool_call>\n\
        <|channel|>final<|message|>Done";
    let parser = Parser::new(&config()).unwrap();
    let expected = parser.parse(response);

    let bytes: Vec<char> = response.chars().collect();
    for size in 1..=17 {
        let fragments: Vec<String> = bytes.chunks(size).map(|c| c.iter().collect()).collect();
        let streamed = parse_stream(parser.streaming(), futures::stream::iter(fragments))
            .await
            .unwrap();
        assert_eq!(streamed, expected, "fragment size {size}");
    }
}

#[test]
fn test_custom_vocabulary_round_trip() {
    let config: ProtocolConfig = ProtocolConfig::from_json_str(
        r#"{
            "tokens": {
                "boundary_open": "<<",
                "message_start": "!",
                "channel": "<<ch>>",
                "boundary_close": ">>"
            },
            "tool_tags": {"call": {"open": "[call]", "close": "[/call]"}}
        }"#,
    )
    .unwrap();
    let wire = Encoder::new(&config).encode(&[Turn::assistant_on(Channel::Commentary, "plan")], None);
    assert_eq!(wire.as_str(), "<<!assistant<<ch>>commentary>>plan");

    let parser = Parser::new(&config).unwrap();
    let result = parser.parse(
        "<<ch>>commentary>>plan [call]<name>t</name><parameters>{}</parameters>[/call]",
    );
    assert_eq!(result.tool_calls[0].name, "t");
    assert!(result.commentary.unwrap().starts_with("plan [call]"));
}
