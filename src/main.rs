//! # Parley CLI Application
//!
//! Command-line access to the parley wire protocol.
//!
//! ## Subcommands
//!
//! - `encode`: render a JSON conversation (and optional tool catalog) as wire text
//! - `decode`: read model output incrementally and print the parsed channels and
//!   tool calls as JSON
//!
//! `decode --sse` stands in for a transport client: it unwraps `data:` lines
//! from a server-sent event stream, stops at `[DONE]`, and feeds only the
//! generated text to the parser.

mod telemetry;

use anyhow::{Context, anyhow};
use async_stream::try_stream;
use clap::{Args, Parser, Subcommand};
use futures::{Stream, StreamExt};
use parley::stream::try_parse_stream;
use parley::{Encoder, ProtocolConfig, ToolCatalog, Turn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, instrument};

/// Bytes requested from the input per read
const READ_CHUNK: usize = 4096;

#[derive(Parser)]
#[command(author, version, about = "Channel-tagged wire framing for tool-augmented LLM conversations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a conversation as wire text
    Encode(EncodeArgs),

    /// Parse model output into channels and tool calls
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// JSON array of turns ({"role", "content", "channel"?})
    #[arg(short, long, required = true)]
    conversation: PathBuf,

    /// JSON array of tool declarations to advertise
    #[arg(short, long)]
    tools: Option<PathBuf>,

    /// Protocol configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Read model output from a file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Input is a server-sent event stream
    #[arg(long)]
    sse: bool,

    /// Protocol configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing_subscriber();

    match cli.command {
        Commands::Encode(args) => encode_command(args).await?,
        Commands::Decode(args) => decode_command(args).await?,
    }

    Ok(())
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<ProtocolConfig> {
    match path {
        Some(path) => ProtocolConfig::read_config(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ProtocolConfig::default()),
    }
}

#[instrument]
async fn encode_command(args: EncodeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref()).await?;

    let json = tokio::fs::read_to_string(&args.conversation).await?;
    let turns: Vec<Turn> = serde_json::from_str(&json)
        .with_context(|| format!("Invalid conversation in {}", args.conversation.display()))?;

    let catalog = match &args.tools {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            let catalog: ToolCatalog = serde_json::from_str(&json)
                .with_context(|| format!("Invalid tool catalog in {}", path.display()))?;
            Some(catalog)
        }
        None => None,
    };

    let wire = Encoder::new(&config).encode(&turns, catalog.as_ref());
    println!("{}", wire);

    Ok(())
}

#[instrument]
async fn decode_command(args: DecodeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref()).await?;
    let parser = parley::Parser::new(&config)?;

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    let result = if args.sse {
        try_parse_stream(parser.streaming(), sse_fragments(reader)).await?
    } else {
        try_parse_stream(parser.streaming(), text_fragments(reader)).await?
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Raw UTF-8 text in the order it is read, never splitting a character
fn text_fragments<R>(mut reader: R) -> impl Stream<Item = anyhow::Result<String>>
where
    R: AsyncRead + Unpin,
{
    try_stream! {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut pending: Vec<u8> = Vec::new();

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            pending.extend_from_slice(&buf[..n]);

            let valid = complete_utf8_prefix(&pending)?;
            let rest = pending.split_off(valid);
            let text = String::from_utf8(std::mem::replace(&mut pending, rest))?;
            if !text.is_empty() {
                yield text;
            }
        }

        ensure_no_truncated_char(&pending)?;
    }
}

/// Length of the longest prefix that is complete UTF-8
///
/// An incomplete sequence at the very end is left for the next read.
fn complete_utf8_prefix(bytes: &[u8]) -> anyhow::Result<usize> {
    match std::str::from_utf8(bytes) {
        Ok(_) => Ok(bytes.len()),
        Err(e) if e.error_len().is_none() => Ok(e.valid_up_to()),
        Err(e) => Err(anyhow!("Input is not valid UTF-8 at byte {}", e.valid_up_to())),
    }
}

fn ensure_no_truncated_char(pending: &[u8]) -> anyhow::Result<()> {
    if pending.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("Input ends inside a UTF-8 sequence"))
    }
}

/// Generated text carried by a server-sent event stream
fn sse_fragments<R>(reader: R) -> impl Stream<Item = anyhow::Result<String>>
where
    R: AsyncRead + Unpin,
{
    try_stream! {
        let mut lines = LinesStream::new(BufReader::new(reader).lines());

        while let Some(line) = lines.next().await {
            let line = line?;
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();

            if data == "[DONE]" {
                debug!("SSE stream [DONE] marker received");
                break;
            }
            if let Some(text) = sse_text(data) {
                yield text;
            }
        }
    }
}

/// Extract generated text from one `data:` payload
///
/// Completion-style JSON payloads carry the text in `choices[0].delta.content`
/// or `choices[0].text`; anything that is not JSON is taken verbatim.
fn sse_text(data: &str) -> Option<String> {
    let value = match serde_json::from_str::<Value>(data) {
        Ok(value) => value,
        Err(_) => return Some(data.to_string()),
    };

    match value {
        Value::String(text) => Some(text),
        value => {
            let choice = value.get("choices")?.get(0)?;
            choice
                .pointer("/delta/content")
                .or_else(|| choice.get("text"))
                .and_then(Value::as_str)
                .map(str::to_string)
        }
    }
}
