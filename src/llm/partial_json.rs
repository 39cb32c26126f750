//! Best-effort parsing of truncated JSON
//!
//! Models stream their JSON answer a few characters at a time. [`parse`]
//! turns any prefix of a JSON document into the most complete value it can:
//! an open string value is closed, open containers are closed, and members
//! that cannot be completed (a key without a value, a half-typed `tru`) are
//! dropped back to the last complete member. A string cut inside a `\u`
//! escape, or after the first half of a surrogate pair, loses only that
//! escape.

use serde_json::Value;

/// Parse a possibly-truncated JSON document.
///
/// Returns `None` when no prefix of `text` forms a usable value.
pub fn parse(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let scan = Scan::run(text);
    scan.candidates(text)
        .into_iter()
        .find_map(|candidate| serde_json::from_str(&candidate).ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Key,
    Value,
}

/// A `\uXXXX` escape still being read
#[derive(Debug, Clone, Copy)]
struct UnicodeEscape {
    /// Byte offset of the backslash
    start: usize,
    digits: u8,
    code: u32,
}

#[derive(Debug)]
struct Frame {
    closer: char,
    expecting_key: bool,
}

/// Scanner state after consuming the whole input
#[derive(Debug, Default)]
struct Scan {
    stack: Vec<Frame>,
    string: Option<StringKind>,
    escaped: bool,
    unicode: Option<UnicodeEscape>,
    /// Start of a high surrogate escape whose low half has not been read
    high_surrogate: Option<usize>,
    in_primitive: bool,
    /// Byte offset just past the last complete member, with the closers
    /// that were open at that point
    safe: Option<(usize, String)>,
}

impl Scan {
    fn run(text: &str) -> Self {
        let mut scan = Self::default();
        for (i, c) in text.char_indices() {
            scan.step(i, c);
        }
        scan
    }

    fn step(&mut self, i: usize, c: char) {
        let end = i + c.len_utf8();

        if let Some(kind) = self.string {
            self.step_in_string(kind, i, c);
            return;
        }

        if self.in_primitive && (c == ',' || c == '}' || c == ']' || c.is_whitespace()) {
            self.in_primitive = false;
            self.mark(i);
        }

        match c {
            '"' => {
                let is_key = self.stack.last().is_some_and(|f| f.closer == '}' && f.expecting_key);
                self.string = Some(if is_key { StringKind::Key } else { StringKind::Value });
            }
            '{' => {
                self.stack.push(Frame {
                    closer: '}',
                    expecting_key: true,
                });
                self.mark(end);
            }
            '[' => {
                self.stack.push(Frame {
                    closer: ']',
                    expecting_key: false,
                });
                self.mark(end);
            }
            '}' | ']' => {
                self.stack.pop();
                self.mark(end);
            }
            ':' => {
                if let Some(frame) = self.stack.last_mut() {
                    frame.expecting_key = false;
                }
            }
            ',' => {
                if let Some(frame) = self.stack.last_mut() {
                    frame.expecting_key = frame.closer == '}';
                }
            }
            c if c.is_whitespace() => {}
            _ => self.in_primitive = true,
        }
    }

    fn step_in_string(&mut self, kind: StringKind, i: usize, c: char) {
        if let Some(mut escape) = self.unicode.take() {
            let Some(digit) = c.to_digit(16) else {
                self.high_surrogate = None;
                return;
            };
            escape.code = escape.code * 16 + digit;
            escape.digits += 1;
            if escape.digits < 4 {
                self.unicode = Some(escape);
            } else if (0xD800..0xDC00).contains(&escape.code) {
                self.high_surrogate = Some(escape.start);
            } else {
                self.high_surrogate = None;
            }
            return;
        }

        if self.escaped {
            self.escaped = false;
            if c == 'u' {
                self.unicode = Some(UnicodeEscape {
                    start: i - 1,
                    digits: 0,
                    code: 0,
                });
            } else {
                self.high_surrogate = None;
            }
        } else if c == '\\' {
            self.escaped = true;
        } else {
            self.high_surrogate = None;
            if c == '"' {
                self.string = None;
                if kind == StringKind::Value {
                    self.mark(i + 1);
                }
            }
        }
    }

    /// Byte length of the open string's text that can be closed as is
    fn closable_len(&self, text: &str) -> usize {
        let mut len = text.len();
        if self.escaped {
            len -= 1;
        }
        if let Some(escape) = self.unicode {
            len = escape.start;
        }
        if let Some(start) = self.high_surrogate {
            len = len.min(start);
        }
        len
    }

    fn closers(&self) -> String {
        self.stack.iter().rev().map(|f| f.closer).collect()
    }

    fn mark(&mut self, offset: usize) {
        self.safe = Some((offset, self.closers()));
    }

    /// Completions to try, most complete first
    fn candidates(&self, text: &str) -> Vec<String> {
        let mut candidates = Vec::with_capacity(2);

        match self.string {
            Some(StringKind::Value) => {
                let mut closed = text.to_string();
                closed.truncate(self.closable_len(text));
                closed.push('"');
                closed.push_str(&self.closers());
                candidates.push(closed);
            }
            // A half-written key can only be dropped
            Some(StringKind::Key) => {}
            None => {
                let mut closed = text.to_string();
                closed.push_str(&self.closers());
                candidates.push(closed);
            }
        }

        if let Some((offset, closers)) = &self.safe {
            let mut cut = text.to_string();
            cut.truncate(*offset);
            cut.push_str(closers);
            candidates.push(cut);
        }

        candidates
    }
}
