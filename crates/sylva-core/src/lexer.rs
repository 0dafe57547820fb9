// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The lexer: buffered character access over an [`Input`], and the token
//! recognition loop the parser drives.
//!
//! [`Lexer`] is the narrow interface handed to a language's lex functions
//! and external scanner: one character of lookahead, [`advance`](Lexer::advance)
//! (optionally treating the consumed character as token padding),
//! [`mark_end`](Lexer::mark_end), and [`set_result`](Lexer::set_result).
//!
//! [`lex_token`] implements the recognition strategy: try the external
//! scanner when the current lex mode allows external tokens, then the
//! internal lex function; on failure retry once in error mode, and as a
//! last resort skip unrecognized characters one at a time until a
//! recognizer succeeds or input ends, producing an `ERROR` leaf covering
//! the skipped span.

use crate::input::Input;
use crate::language::{
    ERROR_STATE, Language, SERIALIZATION_BUFFER_SIZE, StateId, SYM_END, SYM_ERROR, Symbol,
};
use crate::length::Length;
use crate::logging::{LogKind, LogSink};
use crate::tree::{self, Tree, TreeData};

/// Buffered character-at-a-time reader over an [`Input`].
pub struct Lexer<'i> {
    input: &'i mut dyn Input,
    chunk: Vec<u8>,
    chunk_start: u32,
    current_position: Length,
    token_start_position: Length,
    token_end_position: Option<Length>,
    lookahead: Option<char>,
    lookahead_size: u32,
    lookahead_valid: bool,
    result_symbol: Option<Symbol>,
}

impl<'i> Lexer<'i> {
    pub(crate) fn new(input: &'i mut dyn Input) -> Self {
        Self {
            input,
            chunk: Vec::new(),
            chunk_start: 0,
            current_position: Length::ZERO,
            token_start_position: Length::ZERO,
            token_end_position: None,
            lookahead: None,
            lookahead_size: 0,
            lookahead_valid: false,
            result_symbol: None,
        }
    }

    // ========================================================================
    // Interface for lex functions and external scanners
    // ========================================================================

    /// The character at the current position; `None` at end of input.
    #[must_use]
    pub fn lookahead(&self) -> Option<char> {
        self.lookahead
    }

    /// Whether the current position is at the end of the input.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.lookahead_valid && self.lookahead.is_none()
    }

    /// Consumes the current character. With `skip`, the character becomes
    /// padding: the token is treated as starting after it.
    pub fn advance(&mut self, skip: bool) {
        if self.lookahead_size > 0 {
            if self.lookahead == Some('\n') {
                self.current_position.extent.row += 1;
                self.current_position.extent.column = 0;
            } else {
                self.current_position.extent.column += self.lookahead_size;
            }
            self.current_position.bytes += self.lookahead_size;
        }
        if skip {
            self.token_start_position = self.current_position;
        }
        self.fill_lookahead();
    }

    /// Marks the current position as the end of the token being
    /// recognized. Characters consumed afterwards are lookahead only.
    pub fn mark_end(&mut self) {
        self.token_end_position = Some(self.current_position);
    }

    /// Records the recognized token. For external scanners this is an
    /// index into the language's external symbol map.
    pub fn set_result(&mut self, symbol: Symbol) {
        self.result_symbol = Some(symbol);
    }

    // ========================================================================
    // Driver-side interface
    // ========================================================================

    pub(crate) fn current_position(&self) -> Length {
        self.current_position
    }

    pub(crate) fn token_start_position(&self) -> Length {
        self.token_start_position
    }

    pub(crate) fn token_end_position(&self) -> Option<Length> {
        self.token_end_position
    }

    pub(crate) fn result_symbol(&self) -> Option<Symbol> {
        self.result_symbol
    }

    /// Moves to `position` unless already there, discarding lookahead.
    pub(crate) fn reset(&mut self, position: Length) {
        if position.bytes != self.current_position.bytes {
            self.current_position = position;
            self.lookahead = None;
            self.lookahead_size = 0;
            self.lookahead_valid = false;
        }
    }

    /// Prepares to recognize a token at the current position.
    pub(crate) fn start(&mut self) {
        self.token_start_position = self.current_position;
        self.token_end_position = None;
        self.result_symbol = None;
        if !self.lookahead_valid {
            self.fill_lookahead();
        }
    }

    /// Consumes the rest of the input, tracking positions.
    pub(crate) fn advance_to_end(&mut self) {
        if !self.lookahead_valid {
            self.fill_lookahead();
        }
        while self.lookahead.is_some() {
            self.advance(false);
        }
    }

    fn fill_lookahead(&mut self) {
        let position = self.current_position.bytes;
        if !self.chunk_contains(position) {
            self.refill_chunk(position);
        }
        if self.chunk.is_empty() {
            self.lookahead = None;
            self.lookahead_size = 0;
            self.lookahead_valid = true;
            return;
        }

        let offset = (position - self.chunk_start) as usize;
        let (lookahead, width) = decode_utf8(&self.chunk[offset..]);
        if lookahead.is_none() && width > 0 {
            // The chunk may have ended mid-character; a fresh read starting
            // exactly here can complete it.
            self.refill_chunk(position);
            if self.chunk.is_empty() {
                self.lookahead = None;
                self.lookahead_size = 0;
                self.lookahead_valid = true;
                return;
            }
            let (retry, retry_width) = decode_utf8(&self.chunk);
            self.lookahead = Some(retry.unwrap_or(char::REPLACEMENT_CHARACTER));
            self.lookahead_size = if retry.is_some() { retry_width } else { 1 };
        } else {
            self.lookahead = Some(lookahead.unwrap_or(char::REPLACEMENT_CHARACTER));
            self.lookahead_size = if lookahead.is_some() { width } else { 1 };
        }
        self.lookahead_valid = true;
    }

    fn chunk_contains(&self, position: u32) -> bool {
        !self.chunk.is_empty()
            && position >= self.chunk_start
            && position < self.chunk_start + self.chunk.len() as u32
    }

    fn refill_chunk(&mut self, position: u32) {
        let bytes = self.input.read(position);
        self.chunk.clear();
        self.chunk.extend_from_slice(bytes);
        self.chunk_start = position;
    }
}

/// Decodes one UTF-8 character. Returns `(None, width)` for an incomplete
/// sequence (`width` is the expected length) and `(None, 0)` for an
/// outright invalid leading byte.
fn decode_utf8(bytes: &[u8]) -> (Option<char>, u32) {
    let Some(&first) = bytes.first() else {
        return (None, 0);
    };
    let width = match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return (None, 0),
    };
    if bytes.len() < width {
        return (None, width as u32);
    }
    match std::str::from_utf8(&bytes[..width]) {
        Ok(text) => (text.chars().next(), width as u32),
        Err(_) => (None, 0),
    }
}

/// A single-slot memo of the most recently lexed token, keyed by byte
/// position and external-scanner state.
#[derive(Default)]
pub(crate) struct TokenCache {
    token: Option<Tree>,
    byte_index: u32,
    last_external_token: Option<Tree>,
}

impl TokenCache {
    pub(crate) fn get(&self, byte_index: u32, last_external_token: Option<&Tree>) -> Option<Tree> {
        let token = self.token.as_ref()?;
        if self.byte_index == byte_index
            && tree::external_state_eq(self.last_external_token.as_ref(), last_external_token)
        {
            Some(token.clone())
        } else {
            None
        }
    }

    pub(crate) fn set(
        &mut self,
        byte_index: u32,
        last_external_token: Option<Tree>,
        token: Tree,
    ) {
        self.token = Some(token);
        self.byte_index = byte_index;
        self.last_external_token = last_external_token;
    }

    pub(crate) fn clear(&mut self) {
        self.token = None;
        self.byte_index = 0;
        self.last_external_token = None;
    }
}

/// Everything the lex loop needs from the parser.
pub(crate) struct LexContext<'a> {
    pub language: &'a Language,
    pub scanner: Option<&'a mut (dyn crate::language::ExternalScanner + 'static)>,
    pub last_external_token: Option<&'a Tree>,
    pub logger: &'a mut LogSink,
    pub serialization_buffer: &'a mut [u8; SERIALIZATION_BUFFER_SIZE],
}

/// Recognizes the next token at `start_position` for a stack head in
/// `parse_state`, producing a token tree or an `ERROR` leaf.
pub(crate) fn lex_token(
    lexer: &mut Lexer<'_>,
    mut ctx: LexContext<'_>,
    start_position: Length,
    parse_state: StateId,
) -> Tree {
    let mut lex_mode = ctx.language.lex_mode(parse_state);
    let mut external_state = lex_mode.external_lex_state;
    let mut error_mode = parse_state == ERROR_STATE;
    let mut found_external_token = false;
    let mut skipped_error = false;
    let mut first_error_char = None;
    let mut error_start_position = Length::ZERO;
    let mut error_end_position = Length::ZERO;
    let mut last_byte_scanned = start_position.bytes;
    lexer.reset(start_position);

    loop {
        let current_position = lexer.current_position();

        if let Some(scanner) = ctx.scanner.as_mut() {
            if let Some(valid_tokens) = ctx.language.enabled_external_tokens(external_state) {
                ctx.logger.log(LogKind::Lex, || {
                    format!(
                        "lex_external state:{external_state}, row:{}, column:{}",
                        current_position.extent.row, current_position.extent.column
                    )
                });
                lexer.start();
                let restored = ctx
                    .last_external_token
                    .map(|token| token.external_state())
                    .unwrap_or(&[]);
                scanner.deserialize(restored);
                if scanner.scan(lexer, valid_tokens) {
                    if lexer.token_end_position().is_none() {
                        lexer.mark_end();
                    }
                    let token_end = lexer.token_end_position().unwrap_or(current_position);
                    if !error_mode || token_end.bytes > current_position.bytes {
                        found_external_token = true;
                        break;
                    }
                }
                last_byte_scanned = last_byte_scanned.max(lexer.current_position().bytes);
                lexer.reset(current_position);
            }
        }

        ctx.logger.log(LogKind::Lex, || {
            format!(
                "lex_internal state:{}, row:{}, column:{}",
                lex_mode.lex_state, current_position.extent.row, current_position.extent.column
            )
        });
        lexer.start();
        if (ctx.language.lex_fn())(lexer, lex_mode.lex_state) {
            break;
        }

        if !error_mode {
            error_mode = true;
            lex_mode = ctx.language.lex_mode(ERROR_STATE);
            external_state = lex_mode.external_lex_state;
            last_byte_scanned = last_byte_scanned.max(lexer.current_position().bytes);
            lexer.reset(start_position);
            continue;
        }

        if !skipped_error {
            ctx.logger
                .log(LogKind::Lex, || String::from("skip_unrecognized_character"));
            skipped_error = true;
            error_start_position = lexer.token_start_position();
            error_end_position = lexer.token_start_position();
            first_error_char = lexer.lookahead();
        }

        if lexer.current_position().bytes == error_end_position.bytes {
            if lexer.lookahead().is_none() {
                lexer.set_result(SYM_ERROR);
                break;
            }
            lexer.advance(false);
        }
        error_end_position = lexer.current_position();
    }

    last_byte_scanned = last_byte_scanned.max(lexer.current_position().bytes);

    let mut result = if skipped_error {
        let padding = error_start_position - start_position;
        let size = error_end_position - error_start_position;
        TreeData::error_leaf(padding, size, first_error_char)
    } else {
        let mut token_start = lexer.token_start_position();
        let token_end = lexer
            .token_end_position()
            .unwrap_or_else(|| lexer.current_position());
        if token_end.bytes < token_start.bytes {
            token_start = token_end;
        }

        let mut symbol = lexer.result_symbol().unwrap_or(SYM_END);
        let padding = token_start - start_position;
        let size = token_end - token_start;

        if found_external_token {
            symbol = ctx.language.external_symbol(symbol);
        } else if Some(symbol) == ctx.language.keyword_capture_token() {
            if let Some(keyword_lex_fn) = ctx.language.keyword_lex_fn() {
                lexer.reset(token_start);
                lexer.start();
                if keyword_lex_fn(lexer, 0) {
                    let keyword_end = lexer
                        .token_end_position()
                        .unwrap_or_else(|| lexer.current_position());
                    if keyword_end.bytes == token_end.bytes {
                        if let Some(keyword_symbol) = lexer.result_symbol() {
                            if ctx.language.has_actions(parse_state, keyword_symbol) {
                                symbol = keyword_symbol;
                            }
                        }
                    }
                }
            }
        }

        let mut data = TreeData::leaf(symbol, padding, size, ctx.language);
        if found_external_token {
            data.has_external_tokens = true;
            if let Some(scanner) = ctx.scanner.as_mut() {
                let written = scanner.serialize(&mut ctx.serialization_buffer[..]);
                let written = written.min(SERIALIZATION_BUFFER_SIZE);
                data.external_state = Some(Box::from(&ctx.serialization_buffer[..written]));
            }
        }
        data
    };

    result.bytes_scanned = last_byte_scanned - start_position.bytes + 1;
    result.parse_state = parse_state;
    result.first_leaf.lex_mode = lex_mode;

    let symbol_name = ctx.language.symbol_name(result.symbol()).to_string();
    let size_bytes = result.size().bytes;
    ctx.logger.log(LogKind::Lex, || {
        format!("lexed_lookahead sym:{symbol_name}, size:{size_bytes}")
    });
    Tree::seal(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::length::Point;

    #[test]
    fn advance_tracks_rows_and_columns() {
        let mut input = "ab\ncd";
        let mut lexer = Lexer::new(&mut input);
        lexer.start();
        assert_eq!(lexer.lookahead(), Some('a'));

        lexer.advance(false);
        lexer.advance(false);
        assert_eq!(lexer.lookahead(), Some('\n'));
        lexer.advance(false);
        assert_eq!(lexer.current_position(), Length::new(3, Point::new(1, 0)));
        assert_eq!(lexer.lookahead(), Some('c'));

        lexer.advance(false);
        lexer.advance(false);
        assert!(lexer.eof());
        assert_eq!(lexer.lookahead(), None);
    }

    #[test]
    fn skip_moves_token_start() {
        let mut input = "  xy";
        let mut lexer = Lexer::new(&mut input);
        lexer.start();
        lexer.advance(true);
        lexer.advance(true);
        assert_eq!(lexer.token_start_position().bytes, 2);
        lexer.advance(false);
        lexer.mark_end();
        assert_eq!(lexer.token_end_position().map(|l| l.bytes), Some(3));
    }

    #[test]
    fn multibyte_characters_advance_by_width() {
        let mut input = "é!";
        let mut lexer = Lexer::new(&mut input);
        lexer.start();
        assert_eq!(lexer.lookahead(), Some('é'));
        lexer.advance(false);
        assert_eq!(lexer.current_position().bytes, 2);
        assert_eq!(lexer.lookahead(), Some('!'));
    }

    #[test]
    fn invalid_bytes_decode_as_replacement() {
        struct Garbage;
        impl Input for Garbage {
            fn read(&mut self, byte_offset: u32) -> &[u8] {
                if byte_offset == 0 { &[0xFF, b'a'] } else if byte_offset == 1 { &[b'a'] } else { &[] }
            }
        }
        let mut input = Garbage;
        let mut lexer = Lexer::new(&mut input);
        lexer.start();
        assert_eq!(lexer.lookahead(), Some(char::REPLACEMENT_CHARACTER));
        lexer.advance(false);
        assert_eq!(lexer.current_position().bytes, 1);
        assert_eq!(lexer.lookahead(), Some('a'));
    }

    #[test]
    fn token_cache_is_keyed_by_position_and_external_state() {
        let mut input = "x";
        let mut lexer = Lexer::new(&mut input);
        lexer.start();
        lexer.advance(false);
        lexer.mark_end();

        let language = Language::new("cache-test", 2, 2, 2, |_, _| false);
        let token = Tree::seal(TreeData::leaf(
            1,
            Length::ZERO,
            Length::new(1, Point::new(0, 1)),
            &language,
        ));

        let mut cache = TokenCache::default();
        cache.set(5, None, token.clone());
        assert!(cache.get(5, None).is_some());
        assert!(cache.get(6, None).is_none());
        cache.clear();
        assert!(cache.get(5, None).is_none());
    }
}
