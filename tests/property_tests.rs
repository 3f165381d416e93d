//! Property tests for the assembler, request ids and stream framing.

use amlink::protocol::{Assembled, Frame, MessageAssembler, DEFAULT_MAX_FRAMES};
use amlink::transport::{channel, encode_event, EventBuffer};
use amlink::Connection;
use proptest::prelude::*;
use serde_json::json;

fn frame_strategy() -> impl Strategy<Value = Frame> {
    prop_oneof![
        ".{0,24}".prop_map(Frame::Text),
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(Frame::from),
    ]
}

// ── Assembler ─────────────────────────────────────────────────

proptest! {
    /// A header declaring k frames followed by k events yields exactly one
    /// message, on the last event, with frames in arrival order.
    #[test]
    fn header_plus_k_frames_yields_one_message(
        frames in proptest::collection::vec(frame_strategy(), 0..=DEFAULT_MAX_FRAMES as usize),
        request in 1u64..=u64::from(u32::MAX),
    ) {
        let mut assembler = MessageAssembler::new();
        let header = json!({"cmd": "sceneupdate", "frames": frames.len(), "request": request});

        let mut completed = Vec::new();
        if let Some(out) = assembler.push(Frame::Text(header.to_string())) {
            completed.push(out);
        }
        for (i, frame) in frames.iter().enumerate() {
            prop_assert!(completed.is_empty(), "completed early at frame {}", i);
            if let Some(out) = assembler.push(frame.clone()) {
                completed.push(out);
            }
        }

        prop_assert_eq!(completed.len(), 1);
        match completed.remove(0) {
            Assembled::Message(message) => {
                prop_assert_eq!(message.request_id(), request);
                prop_assert_eq!(message.frames, frames);
            }
            Assembled::Diagnostic(d) => prop_assert!(false, "unexpected diagnostic {:?}", d),
        }
        prop_assert!(assembler.is_awaiting_header());
    }

    /// Garbage while awaiting a header never produces a message and never
    /// leaves the assembler mid-message.
    #[test]
    fn garbage_headers_are_discarded(text in "[^{]{0,64}") {
        let mut assembler = MessageAssembler::new();
        prop_assert!(assembler.push(Frame::Text(text)).is_none());
        prop_assert!(assembler.is_awaiting_header());
    }
}

// ── Request ids ───────────────────────────────────────────────

proptest! {
    /// Ids are strictly increasing and failed sends do not consume one.
    #[test]
    fn request_ids_strictly_increase(valid in proptest::collection::vec(any::<bool>(), 1..64)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let ids: Vec<u64> = rt.block_on(async {
            let (transport, _to_module) = channel();
            let conn = Connection::open(transport);
            valid
                .iter()
                .filter_map(|&ok| {
                    let cmd = if ok { "stepscene" } else { "" };
                    conn.send(cmd, &json!({}), Vec::<Frame>::new()).ok()
                })
                .collect()
        });

        let expected: Vec<u64> = (1..=valid.iter().filter(|&&ok| ok).count() as u64).collect();
        prop_assert_eq!(ids, expected);
    }
}

// ── Stream framing ────────────────────────────────────────────

proptest! {
    /// Events survive arbitrary fragmentation of the byte stream.
    #[test]
    fn event_buffer_survives_fragmentation(
        events in proptest::collection::vec(frame_strategy(), 1..8),
        chunk in 1usize..32,
    ) {
        let mut stream = Vec::new();
        for event in &events {
            stream.extend_from_slice(&encode_event(event).unwrap());
        }

        let mut buffer = EventBuffer::new();
        let mut decoded = Vec::new();
        for piece in stream.chunks(chunk) {
            decoded.extend(buffer.push(piece).unwrap());
        }

        prop_assert_eq!(decoded, events);
        prop_assert!(buffer.is_empty());
    }
}
