use proptest::prelude::*;

use omni_stream::{Frame, Interpreter, Mode, Role, Session, DEFAULT_FENCE_MARKER};

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Marker,
}

fn arb_segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        3 => "[a-z` \n]{0,12}".prop_map(Segment::Text),
        1 => Just(Segment::Marker),
    ]
}

fn join_wire(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => text.as_str(),
            Segment::Marker => DEFAULT_FENCE_MARKER,
        })
        .collect()
}

struct Expected {
    markers: usize,
    prose: String,
    code_newlines: u64,
}

/// Classifies the whole wire in one pass. Stray backticks next to a marker
/// stay literal text, and markers are matched leftmost first.
fn classify(wire: &str) -> Expected {
    let mut out = Expected {
        markers: 0,
        prose: String::new(),
        code_newlines: 0,
    };
    for (index, piece) in wire.split(DEFAULT_FENCE_MARKER).enumerate() {
        out.markers = index;
        if index % 2 == 0 {
            out.prose.push_str(piece);
        } else {
            out.code_newlines += piece.matches('\n').count() as u64;
        }
    }
    out
}

/// Splits `wire` into frames at the given cut points (ASCII only, so any byte offset is valid).
fn split_into_frames(wire: &str, mut cuts: Vec<usize>) -> Vec<String> {
    cuts.retain(|cut| *cut > 0 && *cut < wire.len());
    cuts.sort_unstable();
    cuts.dedup();

    let mut frames = Vec::new();
    let mut start = 0;
    for cut in cuts {
        frames.push(wire[start..cut].to_string());
        start = cut;
    }
    frames.push(wire[start..].to_string());
    frames
}

fn assistant_content(session: &Session) -> String {
    session
        .messages()
        .iter()
        .filter(|message| message.role == Role::Assistant)
        .map(|message| message.content.clone())
        .collect()
}

proptest! {
    #[test]
    fn marker_parity_decides_mode_under_any_split(
        segments in prop::collection::vec(arb_segment(), 0..24),
        cuts in prop::collection::vec(0usize..400, 0..12),
    ) {
        let wire = join_wire(&segments);
        let expected = classify(&wire);
        let mut session = Session::new();
        let mut interpreter = Interpreter::default();
        session.begin_turn("prompt");

        for text in split_into_frames(&wire, cuts) {
            interpreter.apply(&mut session, Frame::token(text)).unwrap();
        }

        let parity_mode = if expected.markers % 2 == 0 { Mode::Prose } else { Mode::Code };
        prop_assert_eq!(session.mode(), parity_mode);
        if session.mode() == Mode::Prose {
            prop_assert!(session.code_buffer().is_empty());
        }
    }

    #[test]
    fn prose_and_line_counts_match_classified_segments(
        segments in prop::collection::vec(arb_segment(), 0..24),
        cuts in prop::collection::vec(0usize..400, 0..12),
    ) {
        let wire = join_wire(&segments);
        let expected = classify(&wire);
        let mut session = Session::new();
        let mut interpreter = Interpreter::default();
        session.begin_turn("prompt");
        session.start_stream();

        let mut previous_loc = 0;
        for text in split_into_frames(&wire, cuts) {
            interpreter.apply(&mut session, Frame::token(text)).unwrap();
            prop_assert!(session.counters().loc_session() >= previous_loc);
            previous_loc = session.counters().loc_session();
        }
        interpreter.apply(&mut session, Frame::Done).unwrap();

        prop_assert_eq!(assistant_content(&session), expected.prose);
        prop_assert_eq!(session.counters().loc_session(), expected.code_newlines);
        prop_assert_eq!(session.mode(), Mode::Prose);
        prop_assert!(!session.is_loading());
    }
}
