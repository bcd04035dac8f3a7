//! Byte-driven, chunk-boundary-resumable lexer (spec §3, §4.1).
//!
//! The lexer never looks ahead beyond the current byte except to finish a
//! lexeme already in progress, and it never buffers more than the partial
//! lexeme currently being built — full chunks are fed in, completed tokens
//! are drained out, and state survives between calls to [`Lexer::feed`].

use crate::error::{Error, Span};

/// The kind of a scalar lexeme. The lexer itself does not validate
/// semantics beyond shape; this tag only distinguishes strings (which may
/// serve as object keys) from the other scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// A JSON string, including its surrounding quotes.
    String,
    /// A JSON number.
    Number,
    /// The literal `true`.
    True,
    /// The literal `false`.
    False,
    /// The literal `null`.
    Null,
}

/// A scalar lexeme: its kind and its exact source bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    /// Which kind of scalar this is.
    pub kind: ScalarKind,
    /// The verbatim source bytes, including (for strings) the quotes.
    pub raw: Vec<u8>,
}

/// A lexical token (spec §3 Token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `{`
    BeginObject,
    /// `}`
    EndObject,
    /// `[`
    BeginArray,
    /// `]`
    EndArray,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// A complete string, number, or keyword lexeme.
    Scalar(Scalar),
}

/// Number sub-state, mirroring the grammar in spec §4.1: optional `-`,
/// then `0` or `1-9` followed by digits, optional `.` and digits,
/// optional `e`/`E` with optional sign and digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberState {
    /// Just consumed the leading `-`; a digit must follow.
    LeadingMinus,
    /// The integer part is a single `0`.
    Zero,
    /// The integer part is `1-9` followed by zero or more digits.
    Int,
    /// Just consumed `.`; a fraction digit must follow.
    FracStart,
    /// In the fraction digits.
    Frac,
    /// Just consumed `e`/`E`; a sign or digit must follow.
    ExpStart,
    /// Just consumed the exponent sign; a digit must follow.
    ExpSign,
    /// In the exponent digits.
    Exp,
}

impl NumberState {
    fn can_terminate(self) -> bool {
        matches!(
            self,
            NumberState::Zero | NumberState::Int | NumberState::Frac | NumberState::Exp
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Expecting whitespace, a structural byte, or the start of a scalar.
    WsOrStruct,
    /// Inside a string, not immediately after a backslash.
    InString,
    /// Just consumed `\` inside a string; the next byte completes an
    /// escape (or, for `\u`, starts a 4-hex-digit sequence).
    InStringEscape,
    /// Inside a `\uXXXX` escape; counts remaining hex digits.
    InUnicodeEscape(u8),
    /// Inside a number.
    InNumber(NumberState),
    /// Inside `true`, `false`, or `null`.
    InKeyword {
        expected: &'static [u8],
        matched: usize,
    },
}

/// Byte-driven lexer. Owns only the partial lexeme currently in progress.
pub struct Lexer {
    state: State,
    buf: Vec<u8>,
    token_start: usize,
    /// Total bytes consumed so far, from the start of the stream.
    position: usize,
    /// An error detected mid-chunk, held back so that tokens completed
    /// earlier in the same `feed` call are still returned. Surfaces on the
    /// next call to `feed` or `finish`, never retracted.
    pending_error: Option<(usize, String)>,
}

impl Lexer {
    /// Creates a new lexer positioned at the start of the stream.
    pub fn new() -> Self {
        Lexer {
            state: State::WsOrStruct,
            buf: Vec::new(),
            token_start: 0,
            position: 0,
            pending_error: None,
        }
    }

    /// The number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Feeds one chunk of input, returning every token it completes.
    ///
    /// A lexeme split across two calls to `feed` is emitted only once it
    /// is complete; the lexer's internal state carries the partial bytes
    /// between calls. If a byte earlier in this call (or a previous one)
    /// was invalid, the tokens completed before it are still returned;
    /// the error itself surfaces on the next call instead, so a consumer
    /// that stops reading once it has what it needs never sees it.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<(Token, Span)>, Error> {
        if let Some((offset, message)) = self.pending_error.clone() {
            return Err(Error::Lexical { offset, message });
        }
        let mut out = Vec::new();
        let mut i = 0;
        while i < chunk.len() {
            let b = chunk[i];
            match self.state {
                State::WsOrStruct => {
                    match b {
                        0x20 | 0x09 | 0x0A | 0x0D => {}
                        b'{' => out.push((Token::BeginObject, Span::at(self.position))),
                        b'}' => out.push((Token::EndObject, Span::at(self.position))),
                        b'[' => out.push((Token::BeginArray, Span::at(self.position))),
                        b']' => out.push((Token::EndArray, Span::at(self.position))),
                        b',' => out.push((Token::Comma, Span::at(self.position))),
                        b':' => out.push((Token::Colon, Span::at(self.position))),
                        b'"' => {
                            self.token_start = self.position;
                            self.buf.clear();
                            self.buf.push(b);
                            self.state = State::InString;
                        }
                        b'-' | b'0'..=b'9' => {
                            self.token_start = self.position;
                            self.buf.clear();
                            self.buf.push(b);
                            self.state = State::InNumber(if b == b'-' {
                                NumberState::LeadingMinus
                            } else if b == b'0' {
                                NumberState::Zero
                            } else {
                                NumberState::Int
                            });
                        }
                        b't' => self.start_keyword(b"true"),
                        b'f' => self.start_keyword(b"false"),
                        b'n' => self.start_keyword(b"null"),
                        other => {
                            self.pending_error = Some((
                                self.position,
                                format!("unexpected byte 0x{other:02x}"),
                            ));
                            break;
                        }
                    }
                    self.position += 1;
                    i += 1;
                }

                State::InString => {
                    self.buf.push(b);
                    self.position += 1;
                    i += 1;
                    if b == b'"' {
                        out.push((
                            Token::Scalar(Scalar {
                                kind: ScalarKind::String,
                                raw: std::mem::take(&mut self.buf),
                            }),
                            Span::new(self.token_start, self.position),
                        ));
                        self.state = State::WsOrStruct;
                    } else if b == b'\\' {
                        self.state = State::InStringEscape;
                    }
                }

                State::InStringEscape => {
                    self.buf.push(b);
                    self.position += 1;
                    i += 1;
                    match b {
                        b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' => {
                            self.state = State::InString;
                        }
                        b'u' => {
                            self.state = State::InUnicodeEscape(4);
                        }
                        other => {
                            self.pending_error = Some((
                                self.position - 1,
                                format!("invalid escape sequence '\\{}'", other as char),
                            ));
                            break;
                        }
                    }
                }

                State::InUnicodeEscape(remaining) => {
                    if !b.is_ascii_hexdigit() {
                        self.pending_error = Some((
                            self.position,
                            "invalid \\u escape: expected a hex digit".to_string(),
                        ));
                        break;
                    }
                    self.buf.push(b);
                    self.position += 1;
                    i += 1;
                    self.state = if remaining == 1 {
                        State::InString
                    } else {
                        State::InUnicodeEscape(remaining - 1)
                    };
                }

                State::InNumber(ns) => {
                    if ns == NumberState::Zero && b.is_ascii_digit() {
                        // A leading `0` must not be followed by another
                        // digit ("01" is not "0" then a new token "1").
                        self.pending_error = Some((
                            self.position,
                            "malformed number: a leading zero cannot be followed by another digit"
                                .to_string(),
                        ));
                        break;
                    }
                    let next = match (ns, b) {
                        (NumberState::LeadingMinus, b'0') => Some(NumberState::Zero),
                        (NumberState::LeadingMinus, b'1'..=b'9') => Some(NumberState::Int),
                        (NumberState::Zero, b'.') => Some(NumberState::FracStart),
                        (NumberState::Zero, b'e' | b'E') => Some(NumberState::ExpStart),
                        (NumberState::Int, b'0'..=b'9') => Some(NumberState::Int),
                        (NumberState::Int, b'.') => Some(NumberState::FracStart),
                        (NumberState::Int, b'e' | b'E') => Some(NumberState::ExpStart),
                        (NumberState::FracStart, b'0'..=b'9') => Some(NumberState::Frac),
                        (NumberState::Frac, b'0'..=b'9') => Some(NumberState::Frac),
                        (NumberState::Frac, b'e' | b'E') => Some(NumberState::ExpStart),
                        (NumberState::ExpStart, b'+' | b'-') => Some(NumberState::ExpSign),
                        (NumberState::ExpStart, b'0'..=b'9') => Some(NumberState::Exp),
                        (NumberState::ExpSign, b'0'..=b'9') => Some(NumberState::Exp),
                        (NumberState::Exp, b'0'..=b'9') => Some(NumberState::Exp),
                        _ => None,
                    };
                    match next {
                        Some(ns2) => {
                            self.buf.push(b);
                            self.state = State::InNumber(ns2);
                            self.position += 1;
                            i += 1;
                        }
                        None => {
                            if !ns.can_terminate() {
                                self.pending_error = Some((
                                    self.position,
                                    "malformed number".to_string(),
                                ));
                                break;
                            }
                            out.push((
                                Token::Scalar(Scalar {
                                    kind: ScalarKind::Number,
                                    raw: std::mem::take(&mut self.buf),
                                }),
                                Span::new(self.token_start, self.position),
                            ));
                            self.state = State::WsOrStruct;
                            // Do not consume `b`; it starts the next token.
                        }
                    }
                }

                State::InKeyword { expected, matched } => {
                    if b != expected[matched] {
                        self.pending_error = Some((
                            self.token_start,
                            format!(
                                "unknown keyword (expected {:?})",
                                std::str::from_utf8(expected).unwrap_or("?")
                            ),
                        ));
                        break;
                    }
                    self.position += 1;
                    i += 1;
                    let matched = matched + 1;
                    if matched == expected.len() {
                        let kind = match expected {
                            b"true" => ScalarKind::True,
                            b"false" => ScalarKind::False,
                            _ => ScalarKind::Null,
                        };
                        out.push((
                            Token::Scalar(Scalar {
                                kind,
                                raw: expected.to_vec(),
                            }),
                            Span::new(self.token_start, self.position),
                        ));
                        self.state = State::WsOrStruct;
                    } else {
                        self.state = State::InKeyword { expected, matched };
                    }
                }
            }
        }
        Ok(out)
    }

    fn start_keyword(&mut self, expected: &'static [u8]) {
        self.token_start = self.position;
        self.state = State::InKeyword {
            expected,
            matched: 0,
        };
    }

    /// Signals end of input. Returns a final token if one was pending
    /// (e.g. a number that only a terminator byte would otherwise close),
    /// or an error if the stream ended mid-lexeme.
    pub fn finish(&mut self) -> Result<Option<(Token, Span)>, Error> {
        if let Some((offset, message)) = self.pending_error.clone() {
            return Err(Error::Lexical { offset, message });
        }
        match self.state {
            State::WsOrStruct => Ok(None),
            State::InNumber(ns) if ns.can_terminate() => {
                let tok = (
                    Token::Scalar(Scalar {
                        kind: ScalarKind::Number,
                        raw: std::mem::take(&mut self.buf),
                    }),
                    Span::new(self.token_start, self.position),
                );
                self.state = State::WsOrStruct;
                Ok(Some(tok))
            }
            _ => Err(Error::Lexical {
                offset: self.position,
                message: "premature end of input".to_string(),
            }),
        }
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new();
        let mut tokens = lexer.feed(input).unwrap();
        if let Some(t) = lexer.finish().unwrap() {
            tokens.push(t);
        }
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn structural_tokens() {
        let toks = lex_all(b"{}[],:");
        assert_eq!(
            toks,
            vec![
                Token::BeginObject,
                Token::EndObject,
                Token::BeginArray,
                Token::EndArray,
                Token::Comma,
                Token::Colon,
            ]
        );
    }

    #[test]
    fn whitespace_is_skipped() {
        let toks = lex_all(b"  {  \t\r\n}  ");
        assert_eq!(toks, vec![Token::BeginObject, Token::EndObject]);
    }

    #[test]
    fn string_with_escapes() {
        let toks = lex_all(br#""a\"b\\cAd""#);
        match &toks[0] {
            Token::Scalar(s) => {
                assert_eq!(s.kind, ScalarKind::String);
                assert_eq!(s.raw, br#""a\"b\\cAd""#.to_vec());
            }
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn numbers() {
        for (input, _) in [
            ("0", 0.0),
            ("-0", 0.0),
            ("123", 123.0),
            ("-123.45", -123.45),
            ("1e10", 1e10),
            ("1.5E-3", 1.5e-3),
        ] {
            let toks = lex_all(input.as_bytes());
            match &toks[0] {
                Token::Scalar(s) => {
                    assert_eq!(s.kind, ScalarKind::Number);
                    assert_eq!(std::str::from_utf8(&s.raw).unwrap(), input);
                }
                _ => panic!("expected scalar for {input}"),
            }
        }
    }

    #[test]
    fn number_terminates_before_following_byte() {
        let toks = lex_all(b"[1,2]");
        assert_eq!(
            toks,
            vec![
                Token::BeginArray,
                Token::Scalar(Scalar {
                    kind: ScalarKind::Number,
                    raw: b"1".to_vec()
                }),
                Token::Comma,
                Token::Scalar(Scalar {
                    kind: ScalarKind::Number,
                    raw: b"2".to_vec()
                }),
                Token::EndArray,
            ]
        );
    }

    #[test]
    fn keywords() {
        let toks = lex_all(b"true false null");
        assert_eq!(
            toks,
            vec![
                Token::Scalar(Scalar {
                    kind: ScalarKind::True,
                    raw: b"true".to_vec()
                }),
                Token::Scalar(Scalar {
                    kind: ScalarKind::False,
                    raw: b"false".to_vec()
                }),
                Token::Scalar(Scalar {
                    kind: ScalarKind::Null,
                    raw: b"null".to_vec()
                }),
            ]
        );
    }

    #[test]
    fn byte_at_a_time_matches_whole_chunk() {
        let input = br#"{"a": [1, 2.5, true, null, "x\ty"]}"#;
        let whole = lex_all(input);

        let mut lexer = Lexer::new();
        let mut byte_by_byte = Vec::new();
        for &b in input {
            byte_by_byte.extend(lexer.feed(&[b]).unwrap());
        }
        if let Some(t) = lexer.finish().unwrap() {
            byte_by_byte.push(t);
        }
        let byte_by_byte: Vec<Token> = byte_by_byte.into_iter().map(|(t, _)| t).collect();
        assert_eq!(whole, byte_by_byte);
    }

    #[test]
    fn rejects_stray_byte() {
        // The bad byte poisons the lexer, but doesn't retroactively fail
        // a `feed` call that completed before reaching it.
        let mut lexer = Lexer::new();
        assert!(lexer.feed(b"x").is_ok());
        assert!(lexer.finish().is_err());
    }

    #[test]
    fn rejects_bad_keyword() {
        let mut lexer = Lexer::new();
        assert!(lexer.feed(b"tru}").is_ok());
        assert!(lexer.finish().is_err());
    }

    #[test]
    fn defers_error_past_already_completed_tokens() {
        // Tokens completed earlier in the same chunk survive; the error
        // from the later bad byte only surfaces on the next call.
        let mut lexer = Lexer::new();
        let toks = lexer.feed(b"[1]x").unwrap();
        assert_eq!(
            toks,
            vec![
                (Token::BeginArray, Span::new(0, 1)),
                (
                    Token::Scalar(Scalar {
                        kind: ScalarKind::Number,
                        raw: b"1".to_vec()
                    }),
                    Span::new(1, 2)
                ),
                (Token::EndArray, Span::new(2, 3)),
            ]
        );
        assert!(lexer.feed(b"more").is_err());
    }

    #[test]
    fn rejects_premature_eof_in_string() {
        let mut lexer = Lexer::new();
        lexer.feed(b"\"abc").unwrap();
        assert!(lexer.finish().is_err());
    }

    #[test]
    fn rejects_malformed_number() {
        let mut lexer = Lexer::new();
        assert!(lexer.feed(b"1.").is_ok());
        assert!(lexer.finish().is_err());
    }

    #[test]
    fn rejects_leading_zero_followed_by_digit() {
        // "01" is two separate tokens under a naive terminate-on-mismatch
        // reading, but a leading zero must not be followed by another
        // digit at all.
        let mut lexer = Lexer::new();
        lexer.feed(b"01").unwrap();
        assert!(lexer.finish().is_err());

        let mut lexer = Lexer::new();
        lexer.feed(b"-01").unwrap();
        assert!(lexer.finish().is_err());
    }
}
