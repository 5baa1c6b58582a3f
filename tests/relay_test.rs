//! End-to-end tests for the stream relay: feed synthetic upstream bytes
//! through the line framer and assert the exact event sequence the client
//! would see.

use bytes::Bytes;
use futures_util::Stream;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use veristream::streaming::{RelayMode, StreamHandler};
use veristream::types::OutboundEvent;

type ByteResult = std::result::Result<Bytes, std::io::Error>;

fn lines_from<S>(stream: S) -> FramedRead<StreamReader<S, Bytes>, LinesCodec>
where
    S: Stream<Item = ByteResult> + Unpin,
{
    FramedRead::new(
        StreamReader::new(stream),
        LinesCodec::new_with_max_length(1024 * 1024),
    )
}

fn chunks(lines: &[&str]) -> impl Stream<Item = ByteResult> + Unpin {
    let owned: Vec<ByteResult> = lines
        .iter()
        .map(|l| Ok(Bytes::from(format!("{}\n", l))))
        .collect();
    futures_util::stream::iter(owned)
}

fn delta_line(content: &str) -> String {
    format!(
        r#"data: {{"choices": [{{"delta": {{"content": {}}}}}]}}"#,
        serde_json::json!(content)
    )
}

async fn collect_events<S>(
    stream: S,
    mode: RelayMode,
    idle_timeout: Duration,
) -> Vec<OutboundEvent>
where
    S: Stream<Item = ByteResult> + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel(100);
    StreamHandler::relay(lines_from(stream), mode, tx, idle_timeout).await;
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    events
}

#[tokio::test]
async fn chat_relays_fragments_in_order() {
    let upstream = chunks(&[&delta_line("mod"), &delta_line("ule"), "data: [DONE]"]);
    let events = collect_events(upstream, RelayMode::Chat, Duration::from_secs(5)).await;

    assert_eq!(
        events,
        vec![
            OutboundEvent::Content("mod".into()),
            OutboundEvent::Content("ule".into()),
            OutboundEvent::Done,
        ]
    );
}

#[tokio::test]
async fn malformed_line_is_skipped_not_fatal() {
    let upstream = chunks(&[
        &delta_line("always"),
        "data: {not json at all",
        &delta_line(" @(posedge clk)"),
        "data: [DONE]",
    ]);
    let events = collect_events(upstream, RelayMode::Chat, Duration::from_secs(5)).await;

    assert_eq!(
        events,
        vec![
            OutboundEvent::Content("always".into()),
            OutboundEvent::Content(" @(posedge clk)".into()),
            OutboundEvent::Done,
        ]
    );
}

#[tokio::test]
async fn json_array_lines_expand_in_order() {
    let line = r#"data: [{"choices": [{"delta": {"content": "a"}}]}, {"choices": [{"delta": {"content": "b"}}]}]"#;
    let upstream = chunks(&[line, "data: [DONE]"]);
    let events = collect_events(upstream, RelayMode::Chat, Duration::from_secs(5)).await;

    assert_eq!(
        events,
        vec![
            OutboundEvent::Content("a".into()),
            OutboundEvent::Content("b".into()),
            OutboundEvent::Done,
        ]
    );
}

#[tokio::test]
async fn completion_mode_accumulates_and_repairs() {
    let upstream = chunks(&[&delta_line("modu"), &delta_line("le m;"), "data: [DONE]"]);
    let mode = RelayMode::Completion {
        prefix: String::new(),
    };
    let events = collect_events(upstream, mode, Duration::from_secs(5)).await;

    // First snapshot carries no recognizable content and cleans to empty;
    // the second is a real module opener and gets its closer appended.
    assert_eq!(
        events,
        vec![
            OutboundEvent::Text("".into()),
            OutboundEvent::Text("module m;\nendmodule".into()),
            OutboundEvent::Done,
        ]
    );
}

#[tokio::test]
async fn completion_mode_counts_prefix_openers() {
    let upstream = chunks(&[&delta_line("q <= d; // update"), "data: [DONE]"]);
    let mode = RelayMode::Completion {
        prefix: "module m;\nalways @(posedge clk) begin".into(),
    };
    let events = collect_events(upstream, mode, Duration::from_secs(5)).await;

    assert_eq!(
        events,
        vec![
            OutboundEvent::Text("q <= d; // update\nendmodule\nend".into()),
            OutboundEvent::Done,
        ]
    );
}

#[tokio::test]
async fn upstream_end_without_sentinel_still_finishes_clean() {
    let upstream = chunks(&[&delta_line("wire w;")]);
    let events = collect_events(upstream, RelayMode::Chat, Duration::from_secs(5)).await;

    assert_eq!(
        events,
        vec![OutboundEvent::Content("wire w;".into()), OutboundEvent::Done]
    );
}

#[tokio::test]
async fn transport_error_becomes_error_event_then_done() {
    let parts: Vec<ByteResult> = vec![
        Ok(Bytes::from(format!("{}\n", delta_line("assign")))),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )),
    ];
    let upstream = futures_util::stream::iter(parts);
    let events = collect_events(upstream, RelayMode::Chat, Duration::from_secs(5)).await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], OutboundEvent::Content("assign".into()));
    match &events[1] {
        OutboundEvent::Error(msg) => assert!(msg.contains("read failed")),
        other => panic!("expected error event, got {:?}", other),
    }
    assert_eq!(events[2], OutboundEvent::Done);
}

#[tokio::test]
async fn silent_upstream_times_out_with_error_event() {
    let upstream = futures_util::stream::pending::<ByteResult>();
    let events = collect_events(upstream, RelayMode::Chat, Duration::from_millis(50)).await;

    assert_eq!(events.len(), 2);
    match &events[0] {
        OutboundEvent::Error(msg) => assert!(msg.contains("idle")),
        other => panic!("expected error event, got {:?}", other),
    }
    assert_eq!(events[1], OutboundEvent::Done);
}

#[tokio::test]
async fn client_disconnect_stops_relay_quietly() {
    let upstream = chunks(&[&delta_line("a"), &delta_line("b"), "data: [DONE]"]);
    let (tx, rx) = mpsc::channel(100);
    drop(rx);
    // Must return promptly instead of looping or panicking.
    StreamHandler::relay(
        lines_from(upstream),
        RelayMode::Chat,
        tx,
        Duration::from_secs(5),
    )
    .await;
}

#[tokio::test]
async fn message_content_fallback_reaches_client() {
    let line = r#"data: {"choices": [{"delta": {}, "message": {"content": "fallback text"}}]}"#;
    let upstream = chunks(&[line, "data: [DONE]"]);
    let events = collect_events(upstream, RelayMode::Chat, Duration::from_secs(5)).await;

    assert_eq!(
        events,
        vec![
            OutboundEvent::Content("fallback text".into()),
            OutboundEvent::Done,
        ]
    );
}
