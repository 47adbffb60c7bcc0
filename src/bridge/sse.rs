//! Server-sent event framing
//!
//! One `data:` record per traffic event. Field names follow what the traffic
//! dashboard reads: outbound records carry `toAddr`/`timeSent`, inbound
//! records carry `fromAddr`/`timeRecv`. Timestamps are microsecond strings.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::Result;
use crate::hub::{Direction, TrafficEvent};

/// Comment record sent to keep idle connections alive
pub const KEEP_ALIVE: &[u8] = b": keep-alive\n\n";

#[derive(Serialize)]
struct SentRecord<'a> {
    message: String,
    #[serde(rename = "toAddr")]
    to_addr: &'a str,
    #[serde(rename = "timeSent")]
    time_sent: String,
    id: &'a str,
}

#[derive(Serialize)]
struct RecvRecord<'a> {
    message: String,
    #[serde(rename = "fromAddr")]
    from_addr: &'a str,
    #[serde(rename = "timeRecv")]
    time_recv: String,
    id: &'a str,
}

/// JSON payload of one event
pub fn event_json(event: &TrafficEvent) -> Result<String> {
    let json = match event.direction {
        Direction::Outbound => serde_json::to_string(&SentRecord {
            message: event.summary_text(),
            to_addr: &event.peer_address,
            time_sent: event.timestamp_micros.to_string(),
            id: &event.packet_id,
        })?,
        Direction::Inbound => serde_json::to_string(&RecvRecord {
            message: event.summary_text(),
            from_addr: &event.peer_address,
            time_recv: event.timestamp_micros.to_string(),
            id: &event.packet_id,
        })?,
    };

    Ok(json)
}

/// Complete `data:` record for one event, terminated by a blank line
pub fn encode_event(event: &TrafficEvent) -> Result<Bytes> {
    let json = event_json(event)?;

    let mut buf = BytesMut::with_capacity(json.len() + 7);
    buf.put_slice(b"data:");
    buf.put_slice(json.as_bytes());
    buf.put_slice(b"\n\n");

    Ok(buf.freeze())
}

/// Keep-alive comment record
pub fn keep_alive() -> Bytes {
    Bytes::from_static(KEEP_ALIVE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_outbound() {
        let event = TrafficEvent::outbound("127.0.0.1:5001", Bytes::from_static(b"ping"), "pkt-7")
            .at(1_700_000_000_123_456);

        let record = encode_event(&event).unwrap();
        assert_eq!(
            &record[..],
            b"data:{\"message\":\"ping\",\"toAddr\":\"127.0.0.1:5001\",\"timeSent\":\"1700000000123456\",\"id\":\"pkt-7\"}\n\n"
        );
    }

    #[test]
    fn test_encode_inbound() {
        let event = TrafficEvent::inbound("127.0.0.1:5002", Bytes::from_static(b"pong"), "pkt-8").at(5);

        let json: serde_json::Value = serde_json::from_str(&event_json(&event).unwrap()).unwrap();
        assert_eq!(json["fromAddr"], "127.0.0.1:5002");
        assert_eq!(json["timeRecv"], "5");
        assert_eq!(json["id"], "pkt-8");
        assert_eq!(json["message"], "pong");
        assert!(json.get("toAddr").is_none());
    }

    #[test]
    fn test_message_is_escaped() {
        let event = TrafficEvent::outbound("a", Bytes::from_static(b"line\n\"quoted\""), "p");

        let record = encode_event(&event).unwrap();
        let text = std::str::from_utf8(&record).unwrap();

        // A single record: the only blank line is the terminator
        assert_eq!(text.matches("\n\n").count(), 1);
        assert!(text.ends_with("\n\n"));
        assert!(text.contains("line\\n\\\"quoted\\\""));
    }

    #[test]
    fn test_keep_alive_is_comment() {
        assert!(keep_alive().starts_with(b":"));
        assert!(keep_alive().ends_with(b"\n\n"));
    }
}
