//! Chunk-boundary invariance of the streaming classifier.
//!
//! Feeding the same text in any split must produce the same coalesced
//! visible/internal output as feeding it whole.

use researcher::core::classifier::{Markers, StreamClassifier, classify_all, coalesce};
use researcher::core::types::{Span, SpanMode};

const SAMPLES: &[&str] = &[
    "plain text with no markers",
    "Hello <think>weighing sources</think>world",
    "<think>all internal</think>",
    "a</think>b<think>c</think>d",
    "before <think>unterminated reasoning",
    "<thi is not a marker </thin either",
    "repeat <think>one</think> mid <think>two</think> after",
    "émoji ✓ <think>ünïcode</think> tail",
];

fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).skip(1).collect()
}

fn classify_chunks(chunks: &[&str]) -> Vec<Span> {
    let mut classifier = StreamClassifier::default();
    let mut spans = Vec::new();
    for chunk in chunks {
        spans.extend(classifier.push(chunk));
    }
    spans.extend(classifier.finish());
    coalesce(spans)
}

fn visible(spans: &[Span]) -> String {
    spans
        .iter()
        .filter(|s| s.mode == SpanMode::Visible)
        .map(|s| s.text.as_str())
        .collect()
}

#[test]
fn every_two_way_split_matches_whole_input() {
    let markers = Markers::default();
    for text in SAMPLES {
        let whole = classify_all(&markers, text);
        for at in char_boundaries(text) {
            let (a, b) = text.split_at(at);
            assert_eq!(classify_chunks(&[a, b]), whole, "split {a:?} | {b:?}");
        }
    }
}

#[test]
fn every_three_way_split_matches_whole_input() {
    let markers = Markers::default();
    for text in SAMPLES {
        let whole = classify_all(&markers, text);
        let cuts = char_boundaries(text);
        for (i, &first) in cuts.iter().enumerate() {
            for &second in &cuts[i + 1..] {
                let chunks = [&text[..first], &text[first..second], &text[second..]];
                assert_eq!(classify_chunks(&chunks), whole, "chunks {chunks:?}");
            }
        }
    }
}

#[test]
fn character_by_character_streaming_matches_whole_input() {
    let markers = Markers::default();
    for text in SAMPLES {
        let chars: Vec<String> = text.chars().map(String::from).collect();
        let chunks: Vec<&str> = chars.iter().map(String::as_str).collect();
        assert_eq!(classify_chunks(&chunks), classify_all(&markers, text));
    }
}

#[test]
fn markers_never_reach_output() {
    for text in SAMPLES {
        let spans = classify_all(&Markers::default(), text);
        for span in &spans {
            assert!(!span.text.contains("<think>"), "{text:?} leaked {span:?}");
            assert!(!span.text.contains("</think>"), "{text:?} leaked {span:?}");
            assert!(!span.text.is_empty());
        }
    }
    assert_eq!(
        visible(&classify_all(&Markers::default(), "a</think>b")),
        "ab"
    );
}
