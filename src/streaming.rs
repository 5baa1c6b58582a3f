//! Upstream-to-client stream relay.
//!
//! One relay task per request: reads newline-delimited frames off the
//! upstream HTTP response, decodes them, applies per-chunk repair in
//! completion mode, and pushes [`OutboundEvent`]s into the channel the SSE
//! response is built from. The client always sees either text events followed
//! by the done sentinel, or one error event followed by the done sentinel.

use crate::constants::DONE_SENTINEL;
use crate::decoder::{decode_line, DecodedLine};
use crate::logging::StreamMetric;
use crate::repair;
use crate::types::OutboundEvent;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};

/// Hard cap on upstream lines per session. A runaway upstream is cut off
/// rather than relayed forever.
const MAX_STREAM_LINES: usize = 100_000;

/// How the relay shapes outbound events.
#[derive(Debug, Clone)]
pub enum RelayMode {
    /// Pass each delta fragment through untouched as a `content` event.
    Chat,
    /// Accumulate fragments and emit the repaired whole as a `text` event on
    /// every step. `prefix` is the original prompt, needed for closure
    /// repair.
    Completion { prefix: String },
}

enum StreamOutcome {
    Finished,
    Failed(String),
}

pub struct StreamHandler;

impl StreamHandler {
    /// Relay one upstream session to the client channel.
    ///
    /// Returns when the upstream ends (sentinel or close), fails, or the
    /// client disconnects (channel closed). On client disconnect the
    /// upstream response body is dropped, which releases the connection.
    pub async fn relay<R>(
        mut lines: FramedRead<tokio_util::io::StreamReader<R, Bytes>, LinesCodec>,
        mode: RelayMode,
        tx: mpsc::Sender<OutboundEvent>,
        idle_timeout: Duration,
    ) where
        R: Stream<Item = std::result::Result<Bytes, std::io::Error>> + Unpin + Send,
    {
        let mut metric = StreamMetric::new();
        let mut accumulated = String::new();
        let mut line_count = 0usize;

        let outcome = loop {
            let next = match tokio::time::timeout(idle_timeout, lines.next()).await {
                Ok(n) => n,
                Err(_) => {
                    break StreamOutcome::Failed(format!(
                        "upstream idle for {}s, closing stream",
                        idle_timeout.as_secs()
                    ))
                }
            };

            let line_result = match next {
                Some(r) => r,
                None => break StreamOutcome::Finished,
            };

            line_count += 1;
            if line_count > MAX_STREAM_LINES {
                break StreamOutcome::Failed(format!(
                    "stream exceeded max line limit ({})",
                    MAX_STREAM_LINES
                ));
            }

            let line = match line_result {
                Ok(line) => line,
                Err(e) => break StreamOutcome::Failed(format!("upstream read failed: {}", e)),
            };

            match decode_line(&line) {
                DecodedLine::Done => {
                    tracing::debug!("[relay] end marker {} received", DONE_SENTINEL);
                    break StreamOutcome::Finished;
                }
                DecodedLine::Skip => metric.record_skip(),
                DecodedLine::Fragments(fragments) => {
                    for fragment in fragments {
                        metric.record_fragment(&fragment);
                        if fragment.is_empty() {
                            continue;
                        }
                        let event = match &mode {
                            RelayMode::Chat => OutboundEvent::Content(fragment),
                            RelayMode::Completion { prefix } => {
                                accumulated.push_str(&fragment);
                                OutboundEvent::Text(repair::apply(prefix, &accumulated))
                            }
                        };
                        if tx.send(event).await.is_err() {
                            tracing::trace!("[relay] client disconnected, stopping stream");
                            return;
                        }
                    }
                }
            }
        };

        if let StreamOutcome::Failed(message) = outcome {
            tracing::error!("[relay] stream error: {}", message);
            if tx.send(OutboundEvent::Error(message)).await.is_err() {
                return;
            }
        }

        metric.log_summary();
        if tx.send(OutboundEvent::Done).await.is_err() {
            tracing::trace!("[relay] client disconnected before done sentinel");
        }
    }
}
