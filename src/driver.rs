//! The push-down driver: container stack, path, pointer matcher, raw
//! value capture, and decode-and-yield (spec §4.2, §4.3).

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;

use crate::config::DriverOptions;
use crate::decode::{SerdeJsonDecoder, ValueDecoder};
use crate::error::{Error, Span};
use crate::lexer::{Lexer, ScalarKind, Token};
use crate::pointer::Pointer;
use crate::source::{ByteSource, FileSource, ReaderSource, SliceSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Object, nothing consumed yet: a key or `}` may follow.
    ExpectKeyOrEnd,
    /// Object, after a comma: only a key may follow.
    ExpectKey,
    /// Object, after a key: only `:` may follow.
    ExpectColon,
    /// Array, nothing consumed yet: a value or `]` may follow.
    ExpectValueOrEnd,
    /// After `:` or a comma: only a value may follow.
    ExpectValue,
    /// After a value: only `,` or the closing bracket may follow.
    ExpectCommaOrEnd,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    phase: Phase,
    /// Whether this frame is the one container the Pointer selected.
    /// Its direct children are yielded instead of being traversed.
    is_target: bool,
    key: Option<String>,
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// The target container has not yet been found (or confirmed absent).
    Searching,
    /// The target container was found and has since been closed.
    Exhausted,
}

enum ValueOutcome {
    Pushed,
    ScalarConsumed,
}

enum FrameStepOutcome<V> {
    Continue,
    Yielded((String, V)),
}

/// A streaming iterator over the direct children of the container a JSON
/// Pointer selects within a JSON document (spec §1, §4.3).
///
/// Each call to [`next`](Iterator::next) consumes only as much input as
/// is needed to decode one more child; memory use is bounded by the
/// current nesting depth and the size of the child currently being
/// decoded, never by the size of the whole document.
pub struct JsonPointerIter<S, D = SerdeJsonDecoder> {
    source: S,
    decoder: D,
    lexer: Lexer,
    pending: VecDeque<(Token, Span)>,
    source_exhausted: bool,
    lexer_finished: bool,
    /// Every byte fed to the lexer from `raw_base` onward. Trimmed from
    /// the front as tokens are consumed, except while `capturing` holds
    /// it open for an in-progress target value (spec §3 Raw value
    /// buffer, §4.3: the exact source substring from the value's first
    /// byte to its last).
    raw_buf: Vec<u8>,
    raw_base: usize,
    capturing: bool,
    pointer: Pointer,
    pointer_display: String,
    options: DriverOptions,
    stack: Vec<Frame>,
    path: Vec<String>,
    mode: Mode,
    root_consumed: bool,
    done: bool,
}

impl<'a> JsonPointerIter<SliceSource<'a>, SerdeJsonDecoder> {
    /// Iterates the direct children of the container `pointer` selects
    /// within an in-memory buffer.
    pub fn from_slice(data: &'a [u8], pointer: &str) -> Result<Self, Error> {
        Self::from_slice_with_options(data, pointer, DriverOptions::default())
    }

    /// As [`from_slice`](Self::from_slice), with explicit [`DriverOptions`].
    pub fn from_slice_with_options(
        data: &'a [u8],
        pointer: &str,
        options: DriverOptions,
    ) -> Result<Self, Error> {
        Self::new(SliceSource::new(data), SerdeJsonDecoder, pointer, options)
    }
}

impl JsonPointerIter<FileSource, SerdeJsonDecoder> {
    /// Iterates the direct children of the container `pointer` selects
    /// within the file at `path`.
    pub fn from_path(path: impl AsRef<Path>, pointer: &str) -> Result<Self, Error> {
        Self::from_path_with_options(path, pointer, DriverOptions::default())
    }

    /// As [`from_path`](Self::from_path), with explicit [`DriverOptions`].
    pub fn from_path_with_options(
        path: impl AsRef<Path>,
        pointer: &str,
        options: DriverOptions,
    ) -> Result<Self, Error> {
        Self::new(FileSource::open(path)?, SerdeJsonDecoder, pointer, options)
    }
}

impl<R: Read> JsonPointerIter<ReaderSource<R>, SerdeJsonDecoder> {
    /// Iterates the direct children of the container `pointer` selects
    /// while reading from `reader`.
    pub fn from_reader(reader: R, pointer: &str) -> Result<Self, Error> {
        Self::from_reader_with_options(reader, pointer, DriverOptions::default())
    }

    /// As [`from_reader`](Self::from_reader), with explicit [`DriverOptions`].
    pub fn from_reader_with_options(
        reader: R,
        pointer: &str,
        options: DriverOptions,
    ) -> Result<Self, Error> {
        Self::new(ReaderSource::new(reader), SerdeJsonDecoder, pointer, options)
    }
}

impl<S: ByteSource, D: ValueDecoder> JsonPointerIter<S, D> {
    /// Builds a driver from any [`ByteSource`]/[`ValueDecoder`] pair.
    pub fn new(source: S, decoder: D, pointer: &str, options: DriverOptions) -> Result<Self, Error> {
        let parsed = Pointer::parse(pointer)?;
        Ok(JsonPointerIter {
            source,
            decoder,
            lexer: Lexer::new(),
            pending: VecDeque::new(),
            source_exhausted: false,
            lexer_finished: false,
            raw_buf: Vec::new(),
            raw_base: 0,
            capturing: false,
            pointer: parsed,
            pointer_display: pointer.to_string(),
            options,
            stack: Vec::new(),
            path: Vec::new(),
            mode: Mode::Searching,
            root_consumed: false,
            done: false,
        })
    }

    /// Produces the next child, or `Ok(None)` once the target container
    /// has been fully consumed.
    pub fn advance(&mut self) -> Result<Option<(String, D::Value)>, Error> {
        if self.done {
            return Ok(None);
        }
        loop {
            if matches!(self.mode, Mode::Exhausted) {
                self.done = true;
                return Ok(None);
            }

            if self.stack.is_empty() {
                if self.root_consumed {
                    // The root was a scalar that didn't match the Pointer.
                    // A JSON document holds exactly one top-level value, so
                    // anything else the stream still has to offer is
                    // either a lexical/structural problem or trailing
                    // content — either way NOT_FOUND can't be reported
                    // until the stream has actually been confirmed to end
                    // cleanly here.
                    self.done = true;
                    return match self.next_internal_token() {
                        Ok(Some((tok, span))) => Err(Error::Structural {
                            offset: span.start,
                            message: format!(
                                "unexpected trailing content after the document root, found {}",
                                describe(&tok)
                            ),
                        }),
                        Ok(None) => Err(self.not_found()),
                        Err(e) => Err(e),
                    };
                }
                let (tok, span) = match self.next_internal_token()? {
                    Some(t) => t,
                    None => {
                        self.done = true;
                        return Err(self.not_found());
                    }
                };
                match self.resolve_value_token(tok, span) {
                    Ok(ValueOutcome::Pushed) => continue,
                    Ok(ValueOutcome::ScalarConsumed) => {
                        self.root_consumed = true;
                        continue;
                    }
                    Err(e) => {
                        self.done = true;
                        return Err(e);
                    }
                }
            }

            match self.step_frame() {
                Ok(FrameStepOutcome::Continue) => {
                    if self.stack.is_empty() {
                        self.root_consumed = true;
                    }
                    continue;
                }
                Ok(FrameStepOutcome::Yielded(item)) => return Ok(Some(item)),
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
    }

    fn not_found(&self) -> Error {
        Error::PointerNotFound {
            pointer: self.pointer_display.clone(),
            offset: self.lexer.position(),
        }
    }

    fn matches_pointer_prefix(&self, depth: usize) -> bool {
        if self.pointer.len() != depth {
            return false;
        }
        (0..depth).all(|i| Some(self.path[i].as_str()) == self.pointer.token(i))
    }

    /// Resolves the token occupying a value slot at the current depth
    /// (`self.stack.len()`), for slots that are *not* direct children of
    /// an already-found target (those go through [`capture_value`]
    /// instead). Pushes a new frame for a container value, or reports
    /// that a scalar occupies the slot the Pointer was trying to match.
    fn resolve_value_token(&mut self, tok: Token, span: Span) -> Result<ValueOutcome, Error> {
        let depth = self.stack.len();
        let match_here = matches!(self.mode, Mode::Searching) && self.matches_pointer_prefix(depth);
        match tok {
            Token::BeginObject | Token::BeginArray => {
                if depth + 1 > self.options.max_depth {
                    return Err(Error::Structural {
                        offset: span.start,
                        message: "maximum nesting depth exceeded".to_string(),
                    });
                }
                let kind = if matches!(tok, Token::BeginObject) {
                    FrameKind::Object
                } else {
                    FrameKind::Array
                };
                let phase = match kind {
                    FrameKind::Object => Phase::ExpectKeyOrEnd,
                    FrameKind::Array => Phase::ExpectValueOrEnd,
                };
                if match_here {
                    log::debug!("target container matched at byte {}", span.start);
                }
                self.stack.push(Frame {
                    kind,
                    phase,
                    is_target: match_here,
                    key: None,
                    index: 0,
                });
                self.path.push(String::new());
                Ok(ValueOutcome::Pushed)
            }
            Token::Scalar(_) => {
                if match_here {
                    return Err(Error::PointerNotIterable {
                        pointer: self.pointer_display.clone(),
                        offset: span.start,
                    });
                }
                Ok(ValueOutcome::ScalarConsumed)
            }
            other => Err(Error::Structural {
                offset: span.start,
                message: format!("expected a value, found {}", describe(&other)),
            }),
        }
    }

    /// Advances one step of the frame at the top of the stack. Direct
    /// children of a target frame are decoded and yielded here; every
    /// other value is traversed generically so the path stays accurate.
    fn step_frame(&mut self) -> Result<FrameStepOutcome<D::Value>, Error> {
        let depth = self.stack.len();
        let phase = self.stack[depth - 1].phase;
        match phase {
            Phase::ExpectKeyOrEnd | Phase::ExpectKey => {
                let (tok, span) = self.next_required_token()?;
                match tok {
                    Token::EndObject if phase == Phase::ExpectKeyOrEnd => {
                        self.pop_frame();
                        Ok(FrameStepOutcome::Continue)
                    }
                    Token::Scalar(s) if s.kind == ScalarKind::String => {
                        let key = decode_key(&s.raw, span.start)?;
                        self.path[depth - 1] = key.clone();
                        let frame = &mut self.stack[depth - 1];
                        frame.key = Some(key);
                        frame.phase = Phase::ExpectColon;
                        Ok(FrameStepOutcome::Continue)
                    }
                    other => Err(Error::Structural {
                        offset: span.start,
                        message: format!("expected an object key, found {}", describe(&other)),
                    }),
                }
            }
            Phase::ExpectColon => {
                let (tok, span) = self.next_required_token()?;
                if !matches!(tok, Token::Colon) {
                    return Err(Error::Structural {
                        offset: span.start,
                        message: format!("expected ':', found {}", describe(&tok)),
                    });
                }
                self.stack[depth - 1].phase = Phase::ExpectValue;
                Ok(FrameStepOutcome::Continue)
            }
            Phase::ExpectValueOrEnd | Phase::ExpectValue => {
                if self.stack[depth - 1].kind == FrameKind::Array {
                    let idx = self.stack[depth - 1].index;
                    self.path[depth - 1] = idx.to_string();
                }
                let (tok, span) = self.next_required_token()?;
                if matches!(tok, Token::EndArray)
                    && phase == Phase::ExpectValueOrEnd
                    && self.stack[depth - 1].kind == FrameKind::Array
                {
                    self.pop_frame();
                    return Ok(FrameStepOutcome::Continue);
                }

                if self.stack[depth - 1].is_target {
                    let offset = span.start;
                    let raw = self.capture_value((tok, span))?;
                    let decoded = self
                        .decoder
                        .decode(&raw)
                        .map_err(|source| Error::Decode { offset, source })?;
                    let slot = self.slot_for_current(depth);
                    self.advance_after_value(depth);
                    return Ok(FrameStepOutcome::Yielded((slot, decoded)));
                }

                self.resolve_value_token(tok, span)?;
                self.advance_after_value(depth);
                Ok(FrameStepOutcome::Continue)
            }
            Phase::ExpectCommaOrEnd => {
                let (tok, span) = self.next_required_token()?;
                let kind = self.stack[depth - 1].kind;
                match tok {
                    Token::Comma => {
                        self.stack[depth - 1].phase = match kind {
                            FrameKind::Object => Phase::ExpectKey,
                            FrameKind::Array => Phase::ExpectValue,
                        };
                        Ok(FrameStepOutcome::Continue)
                    }
                    Token::EndObject if kind == FrameKind::Object => {
                        self.pop_frame();
                        Ok(FrameStepOutcome::Continue)
                    }
                    Token::EndArray if kind == FrameKind::Array => {
                        self.pop_frame();
                        Ok(FrameStepOutcome::Continue)
                    }
                    other => Err(Error::Structural {
                        offset: span.start,
                        message: format!(
                            "expected ',' or a closing bracket, found {}",
                            describe(&other)
                        ),
                    }),
                }
            }
        }
    }

    fn advance_after_value(&mut self, depth: usize) {
        let frame = &mut self.stack[depth - 1];
        frame.phase = Phase::ExpectCommaOrEnd;
        if frame.kind == FrameKind::Array {
            frame.index += 1;
        }
    }

    fn slot_for_current(&mut self, depth: usize) -> String {
        let frame = &mut self.stack[depth - 1];
        match frame.kind {
            FrameKind::Object => frame
                .key
                .take()
                .expect("object value resolved without a preceding key"),
            FrameKind::Array => frame.index.to_string(),
        }
    }

    fn pop_frame(&mut self) {
        let frame = self.stack.pop().expect("pop_frame called on an empty stack");
        self.path.pop();
        if frame.is_target {
            self.mode = Mode::Exhausted;
            log::debug!("target container closed; iteration complete");
        }
    }

    /// Consumes one complete value (whatever token starts it) and
    /// returns its exact source bytes, verbatim from the first byte of
    /// `first` to the last byte of its matching close. For a scalar this
    /// is just its own lexeme; for a container, `raw_buf` already holds
    /// every byte fed to the lexer since `first` was popped (nothing
    /// trims it while `capturing` is set), so the whole span is sliced
    /// straight out of it rather than reassembled token by token.
    fn capture_value(&mut self, first: (Token, Span)) -> Result<Vec<u8>, Error> {
        let (tok, span) = first;
        match tok {
            Token::Scalar(s) => Ok(s.raw),
            Token::BeginObject | Token::BeginArray => {
                let start = span.start;
                debug_assert_eq!(self.raw_base, start);
                self.capturing = true;
                let mut depth: i64 = 1;
                let mut end = span.end;
                loop {
                    let (t, s) = match self.next_required_token() {
                        Ok(t) => t,
                        Err(e) => {
                            self.capturing = false;
                            return Err(e);
                        }
                    };
                    match &t {
                        Token::BeginObject | Token::BeginArray => depth += 1,
                        Token::EndObject | Token::EndArray => depth -= 1,
                        _ => {}
                    }
                    end = s.end;
                    if depth == 0 {
                        break;
                    }
                }
                self.capturing = false;
                let raw = self.raw_buf[..end - start].to_vec();
                self.trim_raw_to(end);
                Ok(raw)
            }
            other => Err(Error::Structural {
                offset: span.start,
                message: format!("expected a value, found {}", describe(&other)),
            }),
        }
    }

    /// Drops bytes strictly before `offset` from `raw_buf`. Safe to call
    /// whenever no in-progress capture still needs them: tokens are
    /// produced in stream order, so nothing later ever asks for bytes
    /// earlier than the most recently consumed token's own start.
    fn trim_raw_to(&mut self, offset: usize) {
        let drop = offset - self.raw_base;
        self.raw_buf.drain(0..drop);
        self.raw_base = offset;
    }

    fn next_required_token(&mut self) -> Result<(Token, Span), Error> {
        match self.next_internal_token()? {
            Some(t) => Ok(t),
            None => Err(Error::Structural {
                offset: self.lexer.position(),
                message: "unexpected end of input".to_string(),
            }),
        }
    }

    fn next_internal_token(&mut self) -> Result<Option<(Token, Span)>, Error> {
        loop {
            if let Some(t) = self.pending.pop_front() {
                if !self.capturing {
                    self.trim_raw_to(t.1.start);
                }
                return Ok(Some(t));
            }
            if self.source_exhausted {
                if !self.lexer_finished {
                    self.lexer_finished = true;
                    if let Some(t) = self.lexer.finish()? {
                        if !self.capturing {
                            self.trim_raw_to(t.1.start);
                        }
                        return Ok(Some(t));
                    }
                }
                return Ok(None);
            }
            match self.source.read_chunk()? {
                Some(chunk) => {
                    log::trace!("fed {} bytes to lexer", chunk.len());
                    self.raw_buf.extend_from_slice(&chunk);
                    let tokens = self.lexer.feed(&chunk)?;
                    self.pending.extend(tokens);
                }
                None => self.source_exhausted = true,
            }
        }
    }
}

impl<S: ByteSource, D: ValueDecoder> Iterator for JsonPointerIter<S, D> {
    type Item = Result<(String, D::Value), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

fn decode_key(raw: &[u8], offset: usize) -> Result<String, Error> {
    serde_json::from_slice(raw).map_err(|e| Error::Lexical {
        offset,
        message: format!("invalid object key: {e}"),
    })
}

fn describe(tok: &Token) -> &'static str {
    match tok {
        Token::BeginObject => "'{'",
        Token::EndObject => "'}'",
        Token::BeginArray => "'['",
        Token::EndArray => "']'",
        Token::Comma => "','",
        Token::Colon => "':'",
        Token::Scalar(s) => match s.kind {
            ScalarKind::String => "a string",
            ScalarKind::Number => "a number",
            ScalarKind::True | ScalarKind::False => "a boolean",
            ScalarKind::Null => "null",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(data: &[u8], pointer: &str) -> Result<Vec<(String, serde_json::Value)>, Error> {
        JsonPointerIter::from_slice(data, pointer)?.collect()
    }

    #[test]
    fn iterates_root_object() {
        let items = collect(br#"{"a": 1, "b": 2}"#, "").unwrap();
        assert_eq!(
            items,
            vec![
                ("a".to_string(), json!(1)),
                ("b".to_string(), json!(2)),
            ]
        );
    }

    #[test]
    fn iterates_root_array() {
        let items = collect(br#"[10, 20, 30]"#, "").unwrap();
        assert_eq!(
            items,
            vec![
                ("0".to_string(), json!(10)),
                ("1".to_string(), json!(20)),
                ("2".to_string(), json!(30)),
            ]
        );
    }

    #[test]
    fn nested_pointer_selects_subtree() {
        let items = collect(br#"[{"items": ["a", "b", "c"]}]"#, "/0/items").unwrap();
        assert_eq!(
            items,
            vec![
                ("0".to_string(), json!("a")),
                ("1".to_string(), json!("b")),
                ("2".to_string(), json!("c")),
            ]
        );
    }

    #[test]
    fn sibling_subtrees_are_skipped_without_being_yielded() {
        let items = collect(br#"{"skip": {"deep": [1, 2, 3]}, "take": [9]}"#, "/take").unwrap();
        assert_eq!(items, vec![("0".to_string(), json!(9))]);
    }

    #[test]
    fn empty_string_key_is_distinct_from_root() {
        let items = collect(br#"{"": {"x": 1}}"#, "/").unwrap();
        assert_eq!(items, vec![("x".to_string(), json!(1))]);
    }

    #[test]
    fn pointer_not_found_when_stream_ends_without_match() {
        let err = collect(br#"{"a": 1}"#, "/missing").unwrap_err();
        assert!(matches!(err, Error::PointerNotFound { .. }));
    }

    #[test]
    fn pointer_not_iterable_on_scalar_match() {
        let err = collect(br#"{"a": 1}"#, "/a").unwrap_err();
        assert!(matches!(err, Error::PointerNotIterable { .. }));
    }

    #[test]
    fn root_pointer_on_scalar_document_is_not_iterable() {
        let err = collect(b"42", "").unwrap_err();
        assert!(matches!(err, Error::PointerNotIterable { .. }));
    }

    #[test]
    fn malformed_input_is_a_lexical_error() {
        let err = collect(b"{\"a\": tru}", "").unwrap_err();
        assert!(matches!(err, Error::Lexical { .. }));
    }

    #[test]
    fn unbalanced_brackets_are_a_structural_or_lexical_error() {
        let err = collect(b"{\"a\": 1", "").unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
    }

    #[test]
    fn duplicate_keys_are_yielded_in_source_order() {
        let items = collect(br#"{"a": 1, "a": 2}"#, "").unwrap();
        assert_eq!(
            items,
            vec![("a".to_string(), json!(1)), ("a".to_string(), json!(2))]
        );
    }

    #[test]
    fn respects_max_depth() {
        // Reaching the target requires descending through 4 ancestor
        // arrays, each a generic (non-target) push that is checked
        // against `max_depth`.
        let data = b"[[[[[1]]]]]";
        let opts = DriverOptions::new().with_max_depth(3);
        let err: Error =
            JsonPointerIter::from_slice_with_options(data, "/0/0/0/0", opts)
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
    }

    #[test]
    fn iteration_stops_once_target_closes() {
        // Trailing malformed bytes after the target closes are never acted
        // on: the driver stops asking the source for more input once the
        // target container closes, even though the lexer already queued
        // tokens for everything up to the first bad byte in this chunk.
        let data = br#"{"a": [1, 2]}this is not json"#;
        let source = SliceSource::new(data);
        let items: Vec<_> =
            JsonPointerIter::new(source, SerdeJsonDecoder, "/a", DriverOptions::default())
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
        assert_eq!(items, vec![("0".to_string(), json!(1)), ("1".to_string(), json!(2))]);
    }

    #[test]
    fn chunk_partition_does_not_change_the_result() {
        let data = br#"{"a": [1, {"x": "y\n"}, [true, false, null], 3.5e2]}"#;
        let whole = collect(data, "/a").unwrap();
        for chunk_size in [1usize, 2, 7, data.len()] {
            let source = SliceSource::with_chunk_size(data, chunk_size);
            let items: Vec<_> =
                JsonPointerIter::new(source, SerdeJsonDecoder, "/a", DriverOptions::default())
                    .unwrap()
                    .collect::<Result<Vec<_>, _>>()
                    .unwrap();
            assert_eq!(items, whole, "mismatch at chunk_size={chunk_size}");
        }
    }
}
