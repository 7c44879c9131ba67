//! Parsing of the store's server-sent-event change stream.
//!
//! Frames arrive as line groups terminated by a blank line:
//!
//! ```text
//! event: put
//! data: {"path":"/B1","data":{"status":"Completed"}}
//! ```
//!
//! `put`/`patch` carry a path relative to the watched collection and the new
//! value at that path. Everything here is pure so the frame grammar and its
//! edge cases are testable without a live stream.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{BookingId, StoreRecord};

/// A raw server-sent event: its event name and joined data lines.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Assembles a frame from the lines between two blank lines.
///
/// Returns `None` for comment-only or fieldless groups. Multiple `data:`
/// lines are joined with newlines per the SSE grammar.
pub fn parse_frame(lines: &[String]) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in lines {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // Comment lines (leading ':') and unknown fields are ignored.
    }

    event.map(|event| SseFrame {
        event,
        data: data.join("\n"),
    })
}

/// What a frame means for the watch.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotice {
    /// Records whose current value the frame carries. A root-path `put`
    /// expands to one entry per record.
    Records(Vec<StoreRecord>),

    /// A nested field changed; the record must be re-read to get its full
    /// current value.
    Reread(BookingId),

    /// The server revoked the subscription; the stream is dead.
    Revoked(String),

    /// Heartbeat or frame with nothing actionable.
    Ignore,
}

#[derive(Debug, Deserialize)]
struct ChangeBody {
    path: String,
    data: Value,
}

/// Interprets one frame.
pub fn interpret_frame(frame: &SseFrame) -> ChangeNotice {
    match frame.event.as_str() {
        "put" | "patch" => {
            let Ok(body) = serde_json::from_str::<ChangeBody>(&frame.data) else {
                return ChangeNotice::Ignore;
            };
            interpret_change(&body.path, body.data)
        }
        "cancel" => ChangeNotice::Revoked("subscription cancelled by server".to_string()),
        "auth_revoked" => ChangeNotice::Revoked("subscription credentials revoked".to_string()),
        // keep-alive and anything unrecognized
        _ => ChangeNotice::Ignore,
    }
}

fn interpret_change(path: &str, data: Value) -> ChangeNotice {
    let mut segments = path.trim_matches('/').split('/').filter(|s| !s.is_empty());

    match (segments.next(), segments.next()) {
        // Root put: the full collection state.
        (None, _) => match data {
            Value::Object(map) => ChangeNotice::Records(
                map.into_iter()
                    .map(|(key, value)| StoreRecord::new(key, value))
                    .collect(),
            ),
            _ => ChangeNotice::Records(Vec::new()),
        },
        // One record changed. A null value is the echo of a deletion and
        // carries nothing to relay.
        (Some(id), None) => {
            if data.is_null() {
                ChangeNotice::Records(Vec::new())
            } else {
                ChangeNotice::Records(vec![StoreRecord::new(id, data)])
            }
        }
        // A field inside a record changed; the frame doesn't carry the
        // record's full value.
        (Some(id), Some(_)) => ChangeNotice::Reread(BookingId::new(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn frame_parsing_reads_event_and_data() {
        let frame = parse_frame(&lines(&["event: put", "data: {\"x\":1}"])).unwrap();
        assert_eq!(frame.event, "put");
        assert_eq!(frame.data, "{\"x\":1}");
    }

    #[test]
    fn frame_parsing_joins_multiple_data_lines() {
        let frame = parse_frame(&lines(&["event: put", "data: {\"a\":", "data: 1}"])).unwrap();
        assert_eq!(frame.data, "{\"a\":\n1}");
    }

    #[test]
    fn frame_parsing_ignores_comments_and_unknown_fields() {
        let frame = parse_frame(&lines(&[
            ": heartbeat comment",
            "event: keep-alive",
            "id: 42",
            "data: null",
        ]))
        .unwrap();
        assert_eq!(frame.event, "keep-alive");
    }

    #[test]
    fn eventless_group_yields_no_frame() {
        assert_eq!(parse_frame(&lines(&[": just a comment"])), None);
        assert_eq!(parse_frame(&[]), None);
    }

    #[test]
    fn root_put_expands_to_one_record_per_entry() {
        let frame = SseFrame {
            event: "put".to_string(),
            data: json!({
                "path": "/",
                "data": {
                    "B1": {"status": "Completed"},
                    "B2": {"status": "Pending"},
                }
            })
            .to_string(),
        };

        match interpret_frame(&frame) {
            ChangeNotice::Records(mut records) => {
                records.sort_by(|a, b| a.key.cmp(&b.key));
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].key, "B1");
                assert_eq!(records[1].key, "B2");
            }
            other => panic!("expected records, got {:?}", other),
        }
    }

    #[test]
    fn root_put_with_null_data_is_empty() {
        let frame = SseFrame {
            event: "put".to_string(),
            data: json!({"path": "/", "data": null}).to_string(),
        };
        assert_eq!(interpret_frame(&frame), ChangeNotice::Records(Vec::new()));
    }

    #[test]
    fn single_record_put_yields_that_record() {
        let frame = SseFrame {
            event: "put".to_string(),
            data: json!({"path": "/B1", "data": {"status": "Completed"}}).to_string(),
        };

        assert_eq!(
            interpret_frame(&frame),
            ChangeNotice::Records(vec![StoreRecord::new(
                "B1",
                json!({"status": "Completed"})
            )])
        );
    }

    #[test]
    fn deletion_echo_is_dropped() {
        let frame = SseFrame {
            event: "put".to_string(),
            data: json!({"path": "/B1", "data": null}).to_string(),
        };
        assert_eq!(interpret_frame(&frame), ChangeNotice::Records(Vec::new()));
    }

    #[test]
    fn nested_change_requests_a_reread() {
        let frame = SseFrame {
            event: "patch".to_string(),
            data: json!({"path": "/B1/status", "data": "Completed"}).to_string(),
        };
        assert_eq!(
            interpret_frame(&frame),
            ChangeNotice::Reread(BookingId::new("B1"))
        );
    }

    #[test]
    fn cancel_and_auth_revoked_kill_the_stream() {
        for event in ["cancel", "auth_revoked"] {
            let frame = SseFrame {
                event: event.to_string(),
                data: "null".to_string(),
            };
            assert!(matches!(interpret_frame(&frame), ChangeNotice::Revoked(_)));
        }
    }

    #[test]
    fn keep_alive_and_garbage_are_ignored() {
        let keep_alive = SseFrame {
            event: "keep-alive".to_string(),
            data: "null".to_string(),
        };
        assert_eq!(interpret_frame(&keep_alive), ChangeNotice::Ignore);

        let garbage = SseFrame {
            event: "put".to_string(),
            data: "not json".to_string(),
        };
        assert_eq!(interpret_frame(&garbage), ChangeNotice::Ignore);
    }
}
