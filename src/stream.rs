//! Async adaptors that drive a [`StreamingParser`] from a transport stream.
//!
//! The transport owns all waiting; these helpers only pull fragments in
//! arrival order, feed them, and finalize once the stream ends.

use crate::error::Error;
use crate::parser::{ParsedResult, StreamingParser};
use futures::{Stream, StreamExt, TryStreamExt, pin_mut};
use tracing::instrument;

/// Feed every fragment of `fragments` into `parser`, then finalize it
#[instrument(skip_all)]
pub async fn parse_stream<S>(
    mut parser: StreamingParser,
    fragments: S,
) -> Result<ParsedResult, Error>
where
    S: Stream,
    S::Item: AsRef<str>,
{
    pin_mut!(fragments);
    while let Some(fragment) = fragments.next().await {
        parser.feed(fragment.as_ref())?;
    }
    parser.finalize()
}

/// Like [`parse_stream`], for transports whose reads can fail
///
/// The first transport error aborts the parse and is returned as-is.
#[instrument(skip_all)]
pub async fn try_parse_stream<S, T, E>(
    mut parser: StreamingParser,
    fragments: S,
) -> Result<ParsedResult, E>
where
    S: Stream<Item = Result<T, E>>,
    T: AsRef<str>,
    E: From<Error>,
{
    pin_mut!(fragments);
    while let Some(fragment) = fragments.try_next().await? {
        parser.feed(fragment.as_ref())?;
    }
    Ok(parser.finalize()?)
}
