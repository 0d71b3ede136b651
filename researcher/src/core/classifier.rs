//! Incremental visible/internal classification of streamed model output.
//!
//! Text arrives in fragments of arbitrary size. Spans between a start and an
//! end marker (by default `<think>` and `</think>`) are internal; everything
//! else is visible. Markers may be split across any number of fragments, so a
//! trailing partial marker stays buffered until more input decides it.

use anyhow::{Result, anyhow};

use crate::core::types::{Span, SpanMode};

pub const DEFAULT_START_MARKER: &str = "<think>";
pub const DEFAULT_END_MARKER: &str = "</think>";

/// Delimiter pair bounding internal spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    start: String,
    end: String,
}

impl Markers {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self> {
        let start = start.into();
        let end = end.into();
        if start.is_empty() || end.is_empty() {
            return Err(anyhow!("markers must not be empty"));
        }
        if start == end {
            return Err(anyhow!("start and end markers must differ (got {start:?})"));
        }
        if start.contains(end.as_str()) || end.contains(start.as_str()) {
            return Err(anyhow!(
                "markers must not contain each other (got {start:?} and {end:?})"
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_MARKER.to_string(),
            end: DEFAULT_END_MARKER.to_string(),
        }
    }
}

/// Per-response classifier state.
#[derive(Debug, Clone)]
pub struct StreamClassifier {
    markers: Markers,
    buffer: String,
    mode: SpanMode,
}

impl StreamClassifier {
    pub fn new(markers: Markers) -> Self {
        Self {
            markers,
            buffer: String::new(),
            mode: SpanMode::Visible,
        }
    }

    pub fn mode(&self) -> SpanMode {
        self.mode
    }

    /// Text held back because it may be the beginning of a marker.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Discard state before classifying a new response.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.mode = SpanMode::Visible;
    }

    /// Feed one fragment and return the spans it resolved, in order.
    pub fn push(&mut self, fragment: &str) -> Vec<Span> {
        self.buffer.push_str(fragment);
        let mut spans = Vec::new();
        loop {
            let progressed = match self.mode {
                SpanMode::Visible => self.scan_visible(&mut spans),
                SpanMode::Internal => self.scan_internal(&mut spans),
            };
            if !progressed {
                break;
            }
        }
        spans
    }

    /// Flush whatever is buffered under the current mode and close any open
    /// internal span.
    pub fn finish(&mut self) -> Vec<Span> {
        let mut spans = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        emit(&mut spans, self.mode, &rest);
        self.mode = SpanMode::Visible;
        spans
    }

    /// Returns true when a marker was consumed and scanning should continue.
    fn scan_visible(&mut self, spans: &mut Vec<Span>) -> bool {
        let start = self.buffer.find(self.markers.start.as_str());
        let end = self.buffer.find(self.markers.end.as_str());

        match (start, end) {
            // Stray end marker with no open span: drop it.
            (start, Some(end_at)) if start.is_none_or(|s| end_at < s) => {
                let before = self.buffer[..end_at].to_string();
                emit(spans, SpanMode::Visible, &before);
                self.consume(end_at + self.markers.end.len());
                true
            }
            (Some(start_at), _) => {
                let before = self.buffer[..start_at].to_string();
                emit(spans, SpanMode::Visible, &before);
                self.consume(start_at + self.markers.start.len());
                self.mode = SpanMode::Internal;
                true
            }
            _ => {
                let held = partial_suffix_len(&self.buffer, &[&self.markers.start, &self.markers.end]);
                self.flush_except(spans, SpanMode::Visible, held);
                false
            }
        }
    }

    fn scan_internal(&mut self, spans: &mut Vec<Span>) -> bool {
        match self.buffer.find(self.markers.end.as_str()) {
            Some(end_at) => {
                let inside = self.buffer[..end_at].to_string();
                emit(spans, SpanMode::Internal, &inside);
                self.consume(end_at + self.markers.end.len());
                self.mode = SpanMode::Visible;
                true
            }
            None => {
                let held = partial_suffix_len(&self.buffer, &[&self.markers.end]);
                self.flush_except(spans, SpanMode::Internal, held);
                false
            }
        }
    }

    fn consume(&mut self, upto: usize) {
        self.buffer.drain(..upto);
    }

    fn flush_except(&mut self, spans: &mut Vec<Span>, mode: SpanMode, held: usize) {
        let cut = self.buffer.len() - held;
        let ready: String = self.buffer.drain(..cut).collect();
        emit(spans, mode, &ready);
    }
}

impl Default for StreamClassifier {
    fn default() -> Self {
        Self::new(Markers::default())
    }
}

/// Merge adjacent spans of the same mode.
///
/// Emission boundaries depend on how the input was chunked; the merged form
/// does not.
pub fn coalesce(spans: impl IntoIterator<Item = Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for span in spans {
        match merged.last_mut() {
            Some(last) if last.mode == span.mode => last.text.push_str(&span.text),
            _ => merged.push(span),
        }
    }
    merged
}

/// Classify a complete text in one go.
pub fn classify_all(markers: &Markers, text: &str) -> Vec<Span> {
    let mut classifier = StreamClassifier::new(markers.clone());
    let mut spans = classifier.push(text);
    spans.extend(classifier.finish());
    coalesce(spans)
}

fn emit(spans: &mut Vec<Span>, mode: SpanMode, text: &str) {
    if text.is_empty() {
        return;
    }
    spans.push(Span {
        mode,
        text: text.to_string(),
    });
}

/// Length of the longest proper suffix of `buffer` that is a prefix of any
/// marker.
fn partial_suffix_len(buffer: &str, markers: &[&str]) -> usize {
    let longest = markers.iter().map(|m| m.len()).max().unwrap_or(0);
    let floor = buffer.len().saturating_sub(longest.saturating_sub(1));
    buffer
        .char_indices()
        .map(|(idx, _)| idx)
        .filter(|idx| *idx >= floor)
        .find(|idx| {
            let tail = &buffer[*idx..];
            markers
                .iter()
                .any(|marker| tail.len() < marker.len() && marker.starts_with(tail))
        })
        .map_or(0, |idx| buffer.len() - idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> Vec<Span> {
        let mut classifier = StreamClassifier::default();
        let mut spans = Vec::new();
        for fragment in fragments {
            spans.extend(classifier.push(fragment));
        }
        spans.extend(classifier.finish());
        coalesce(spans)
    }

    #[test]
    fn markers_split_across_fragments() {
        let spans = run(&["Hel", "lo <th", "ink>sec", "ret</think> wor", "ld"]);
        assert_eq!(
            spans,
            vec![
                Span::visible("Hello "),
                Span::internal("secret"),
                Span::visible(" world"),
            ]
        );
    }

    #[test]
    fn partial_marker_is_not_emitted_early() {
        let mut classifier = StreamClassifier::default();
        let spans = classifier.push("answer <thi");
        assert_eq!(spans, vec![Span::visible("answer ")]);
        assert_eq!(classifier.pending(), "<thi");

        let spans = classifier.push("nk>x");
        assert_eq!(spans, vec![Span::internal("x")]);
        assert_eq!(classifier.mode(), SpanMode::Internal);
    }

    #[test]
    fn stray_end_marker_is_dropped() {
        assert_eq!(run(&["a</think>b"]), vec![Span::visible("ab")]);
        assert_eq!(run(&["a</th", "ink>b"]), vec![Span::visible("ab")]);
    }

    #[test]
    fn lookalike_prefix_is_released() {
        let mut classifier = StreamClassifier::default();
        assert_eq!(classifier.push("a <th"), vec![Span::visible("a ")]);
        assert_eq!(classifier.push("e end"), vec![Span::visible("<the end")]);
        assert_eq!(classifier.pending(), "");
    }

    #[test]
    fn finish_flushes_and_closes_internal_span() {
        let mut classifier = StreamClassifier::default();
        let mut spans = classifier.push("<think>still thinking </thi");
        assert_eq!(classifier.pending(), "</thi");
        spans.extend(classifier.finish());
        assert_eq!(
            coalesce(spans),
            vec![Span::internal("still thinking </thi")]
        );
        assert_eq!(classifier.mode(), SpanMode::Visible);
    }

    #[test]
    fn finish_releases_partial_start_marker_as_visible() {
        let mut classifier = StreamClassifier::default();
        let mut spans = classifier.push("tail <");
        spans.extend(classifier.finish());
        assert_eq!(coalesce(spans), vec![Span::visible("tail <")]);
    }

    #[test]
    fn multiple_internal_spans() {
        let spans = run(&["<think>a</think>b<think>c</think>d"]);
        assert_eq!(
            spans,
            vec![
                Span::internal("a"),
                Span::visible("b"),
                Span::internal("c"),
                Span::visible("d"),
            ]
        );
    }

    #[test]
    fn reset_clears_state_between_responses() {
        let mut classifier = StreamClassifier::default();
        classifier.push("<think>open");
        classifier.reset();
        assert_eq!(classifier.mode(), SpanMode::Visible);
        assert_eq!(classifier.push("fresh"), vec![Span::visible("fresh")]);
    }

    #[test]
    fn custom_markers_with_multibyte_text() {
        let markers = Markers::new("«", "»").expect("markers");
        let spans = classify_all(&markers, "héllo «ïnner» wörld");
        assert_eq!(
            spans,
            vec![
                Span::visible("héllo "),
                Span::internal("ïnner"),
                Span::visible(" wörld"),
            ]
        );
    }

    #[test]
    fn rejects_degenerate_markers() {
        assert!(Markers::new("", "</x>").is_err());
        assert!(Markers::new("<x>", "<x>").is_err());
        assert!(Markers::new("ab", "xaby").is_err());
        assert!(Markers::new("<think>", "think").is_err());
        assert!(Markers::new("<think>", "</think>").is_ok());
    }

    #[test]
    fn accepted_markers_classify_the_same_across_splits() {
        let markers = Markers::new("[[", "]]").expect("markers");
        let whole = classify_all(&markers, "x[[ab]]yZ");
        let mut classifier = StreamClassifier::new(markers);
        let mut spans = classifier.push("x[");
        spans.extend(classifier.push("[ab]"));
        spans.extend(classifier.push("]yZ"));
        spans.extend(classifier.finish());
        assert_eq!(coalesce(spans), whole);
        assert_eq!(
            whole,
            vec![Span::visible("x"), Span::internal("ab"), Span::visible("yZ")]
        );
    }

    #[test]
    fn partial_suffix_matches_longest_candidate() {
        assert_eq!(partial_suffix_len("abc</", &["<think>", "</think>"]), 2);
        assert_eq!(partial_suffix_len("abc", &["<think>"]), 0);
        assert_eq!(partial_suffix_len("<", &["<think>"]), 1);
    }
}
