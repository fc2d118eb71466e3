//! Streaming response assembler for grounded answers.
//!
//! Consumes raw text deltas and re-emits a clean event stream. Before the
//! section sentinel the text passes through as preamble; after it, output
//! is buffered line by line so that school-logo and program-link annotation
//! lines can be suppressed from the text and re-emitted as typed events.
//!
//! Implemented as a small explicit state machine over an accumulating
//! buffer, flushed on newline boundaries; the regexes only ever run on a
//! single complete line.

use crate::streaming::events::StreamEvent;
use regex::Regex;

/// Literal sentinel the grounded prompt instructs the model to emit
/// between its conversational introduction and the program section.
pub const SECTION_MARKER: &str = "----program start----";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionState {
    /// Passing text through, watching for the sentinel
    Preamble,
    /// Inside the program section, buffering line by line
    InSection,
}

/// Inline-annotation aware re-assembly of a grounded token stream
pub struct ResponseAssembler {
    state: SectionState,
    buffer: String,
    logo_pattern: Regex,
    link_pattern: Regex,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self {
            state: SectionState::Preamble,
            buffer: String::new(),
            logo_pattern: Regex::new(r"(?i)school logo\s*:\s*(https?://[^\s]+)")
                .expect("logo pattern is valid"),
            link_pattern: Regex::new(r"(?i)program link\s*:\s*(https?://[^\s]+)")
                .expect("link pattern is valid"),
        }
    }

    /// Feed one raw text delta, producing zero or more output events
    pub fn feed(&mut self, delta: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        self.buffer.push_str(delta);

        if self.state == SectionState::Preamble {
            if let Some(idx) = self.buffer.find(SECTION_MARKER) {
                if idx > 0 {
                    events.push(StreamEvent::text(self.buffer[..idx].to_string()));
                }
                // Keep the sentinel as a text anchor for clients
                events.push(StreamEvent::text(format!("{}\n", SECTION_MARKER)));
                self.buffer.drain(..idx + SECTION_MARKER.len());
                self.state = SectionState::InSection;
            } else {
                // Flush all but a possible sentinel prefix straddling the
                // chunk boundary
                let hold = marker_suffix_len(&self.buffer);
                let flush_to = self.buffer.len() - hold;
                if flush_to > 0 {
                    let text: String = self.buffer.drain(..flush_to).collect();
                    events.push(StreamEvent::text(text));
                }
                return events;
            }
        }

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            events.extend(self.emit_line(&line));
        }

        events
    }

    /// Flush any trailing buffered text at end of stream
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let remainder = std::mem::take(&mut self.buffer);
        match self.state {
            SectionState::Preamble => vec![StreamEvent::text(remainder)],
            SectionState::InSection => self.emit_line(&remainder),
        }
    }

    /// Classify one complete line: annotation lines become typed events and
    /// never appear as text deltas; everything else is plain text.
    fn emit_line(&self, line: &str) -> Vec<StreamEvent> {
        let lowered = line.to_lowercase();

        if lowered.contains("school logo") {
            return match self.logo_pattern.captures(line) {
                Some(captures) => vec![StreamEvent::SchoolLogo {
                    school_logo: captures[1].to_string(),
                }],
                // Malformed annotation line: suppress rather than leak
                None => Vec::new(),
            };
        }

        if lowered.contains("program link") {
            return match self.link_pattern.captures(line) {
                Some(captures) => vec![StreamEvent::ProgramLink {
                    program_link: captures[1].to_string(),
                }],
                None => Vec::new(),
            };
        }

        vec![StreamEvent::text(line.to_string())]
    }
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the longest buffer suffix that is a proper prefix of the
/// section sentinel, so a sentinel split across deltas is not leaked as
/// preamble text.
fn marker_suffix_len(buffer: &str) -> usize {
    let max = SECTION_MARKER.len().min(buffer.len());
    for len in (1..=max).rev() {
        if !buffer.is_char_boundary(buffer.len() - len) {
            continue;
        }
        if SECTION_MARKER.starts_with(&buffer[buffer.len() - len..]) {
            return len;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_text(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_preamble_passes_through() {
        let mut assembler = ResponseAssembler::new();
        let events = assembler.feed("Hello, here are some ideas. ");
        assert_eq!(collect_text(&events), "Hello, here are some ideas. ");
    }

    #[test]
    fn test_logo_line_becomes_event_not_text() {
        let mut assembler = ResponseAssembler::new();
        let mut events = Vec::new();
        events.extend(
            assembler.feed("preamble ----program start---- school logo: http://x\nbody"),
        );
        events.extend(assembler.finish());

        let logo_pos = events
            .iter()
            .position(|e| {
                matches!(e, StreamEvent::SchoolLogo { school_logo } if school_logo == "http://x")
            })
            .expect("logo event missing");

        // Preamble text precedes the logo event, body follows it
        let text_before: String = events[..logo_pos]
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(text_before.starts_with("preamble "));

        let text_after = collect_text(&events[logo_pos + 1..]);
        assert_eq!(text_after, "body");

        // The logo line itself never appears as a text delta
        assert!(!collect_text(&events).contains("school logo"));
    }

    #[test]
    fn test_program_link_extraction() {
        let mut assembler = ResponseAssembler::new();
        let mut events = assembler.feed("----program start----\n");
        events.extend(assembler.feed("Program Link: http://example.com/msc\n"));

        assert!(events.iter().any(|e| {
            matches!(e, StreamEvent::ProgramLink { program_link } if program_link == "http://example.com/msc")
        }));
        assert!(!collect_text(&events).to_lowercase().contains("program link"));
    }

    #[test]
    fn test_annotation_detection_is_case_insensitive() {
        let mut assembler = ResponseAssembler::new();
        assembler.feed("----program start----\n");
        let events = assembler.feed("SCHOOL LOGO : http://cdn.example/a.png\n");
        assert!(events.iter().any(|e| {
            matches!(e, StreamEvent::SchoolLogo { school_logo } if school_logo == "http://cdn.example/a.png")
        }));
    }

    #[test]
    fn test_marker_split_across_deltas() {
        let mut assembler = ResponseAssembler::new();
        let mut events = Vec::new();
        events.extend(assembler.feed("intro ----program "));
        events.extend(assembler.feed("start---- line one\n"));
        events.extend(assembler.finish());

        let text = collect_text(&events);
        assert!(text.contains("intro "));
        assert!(text.contains(SECTION_MARKER));
        assert!(text.contains("line one"));
    }

    #[test]
    fn test_section_text_flushes_on_newlines() {
        let mut assembler = ResponseAssembler::new();
        assembler.feed("----program start----\n");
        let events = assembler.feed("Program: MSc Data\nPrice: 15000\n");
        let texts: Vec<_> = events.iter().filter(|e| e.is_text()).collect();
        assert_eq!(texts.len(), 2);
    }

    #[test]
    fn test_finish_flushes_trailing_text() {
        let mut assembler = ResponseAssembler::new();
        assembler.feed("----program start----\npartial line without newline");
        let events = assembler.finish();
        assert_eq!(collect_text(&events), "partial line without newline");
    }

    #[test]
    fn test_finish_extracts_trailing_annotation() {
        let mut assembler = ResponseAssembler::new();
        assembler.feed("----program start----\nschool logo: http://x");
        let events = assembler.finish();
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::SchoolLogo { .. })));
        assert!(collect_text(&events).is_empty());
    }

    #[test]
    fn test_malformed_annotation_line_is_suppressed() {
        let mut assembler = ResponseAssembler::new();
        assembler.feed("----program start----\n");
        let events = assembler.feed("school logo: (not available)\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_no_marker_stream_stays_preamble() {
        let mut assembler = ResponseAssembler::new();
        let mut events = assembler.feed("just a plain answer ");
        events.extend(assembler.feed("with no sections"));
        events.extend(assembler.finish());
        assert_eq!(
            collect_text(&events),
            "just a plain answer with no sections"
        );
    }
}
