//! Line tokenizer
//!
//! Splits one ingestion line into a timestamp token followed by measurement
//! segment tokens. The grammar is a two-state machine:
//!
//! ```text
//! Timestamp --';'--> Segment --';'--> Segment ... --end--> Done
//! ```
//!
//! The first segment is always emitted as [`Token::Timestamp`], even when it
//! is empty or when no delimiter follows it. Empty segments after the
//! timestamp carry no information and are skipped, so a trailing `;` is
//! harmless. Surrounding whitespace is trimmed from every token.

/// Separates the timestamp and the measurement segments.
pub const SEGMENT_DELIMITER: char = ';';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing consumed yet; the next token is the timestamp
    Timestamp,
    /// Timestamp consumed; remaining tokens are measurement segments
    Segment,
    /// Input exhausted
    Done,
}

/// A lexical token of an ingestion line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Raw text of the leading timestamp segment
    Timestamp(&'a str),
    /// Raw text of one non-empty measurement segment
    Segment(&'a str),
}

/// Iterator over the tokens of one ingestion line.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    rest: &'a str,
    state: State,
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            rest: line,
            state: State::Timestamp,
        }
    }

    /// Cut the next raw segment off the input. Moves to `Done` once the last
    /// segment (the one without a trailing delimiter) has been taken.
    fn take_segment(&mut self) -> &'a str {
        match self.rest.split_once(SEGMENT_DELIMITER) {
            Some((segment, rest)) => {
                self.rest = rest;
                segment.trim()
            }
            None => {
                let segment = self.rest;
                self.rest = "";
                self.state = State::Done;
                segment.trim()
            }
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::Timestamp => {
                    self.state = State::Segment;
                    return Some(Token::Timestamp(self.take_segment()));
                }
                State::Segment => {
                    let segment = self.take_segment();
                    if !segment.is_empty() {
                        return Some(Token::Segment(segment));
                    }
                }
                State::Done => return None,
            }
        }
    }
}
