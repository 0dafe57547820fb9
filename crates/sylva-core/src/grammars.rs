// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Hand-built language tables shared by the parser tests.
//!
//! Each function assembles the LR(1) tables a grammar compiler would
//! normally generate. State 0 is reserved for error recovery and state 1
//! is the start state throughout; lex state 0 is the only internal lex
//! state, used for every parse state including recovery.

use std::sync::Arc;

use crate::language::{
    ActionEntry, ExternalScanner, ExternalTokens, Language, LexMode, ParseAction, StateId,
    SymbolMetadata, Symbol,
};
use crate::lexer::Lexer;

const NAMED: SymbolMetadata = SymbolMetadata {
    visible: true,
    named: true,
    supertype: false,
};
const HIDDEN: SymbolMetadata = SymbolMetadata {
    visible: false,
    named: false,
    supertype: false,
};

fn shift(state: StateId) -> ParseAction {
    ParseAction::Shift {
        state,
        is_extra: false,
        is_repetition: false,
    }
}

fn reduce(symbol: Symbol, child_count: u16) -> ParseAction {
    ParseAction::Reduce {
        symbol,
        child_count,
        dynamic_precedence: 0,
        alias_sequence_id: 0,
    }
}

fn reduce_prec(symbol: Symbol, child_count: u16, dynamic_precedence: i32) -> ParseAction {
    ParseAction::Reduce {
        symbol,
        child_count,
        dynamic_precedence,
        alias_sequence_id: 0,
    }
}

fn skip_blanks(lexer: &mut Lexer<'_>) {
    while matches!(lexer.lookahead(), Some(' ' | '\t' | '\n')) {
        lexer.advance(true);
    }
}

// ============================================================================
// idents: program := identifier*
// ============================================================================

pub(crate) mod idents {
    pub(crate) const ID: u16 = 1;
    pub(crate) const PROGRAM: u16 = 2;
}

fn idents_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    if lexer.eof() {
        lexer.mark_end();
        lexer.set_result(crate::language::SYM_END);
        return true;
    }
    if lexer.lookahead().is_some_and(|c| c.is_ascii_alphabetic()) {
        while lexer.lookahead().is_some_and(|c| c.is_ascii_alphabetic()) {
            lexer.advance(false);
        }
        lexer.mark_end();
        lexer.set_result(idents::ID);
        return true;
    }
    false
}

/// `program := identifier*` over `[A-Za-z]+` words with blank padding.
pub(crate) fn idents_language() -> Arc<Language> {
    use idents::{ID, PROGRAM};
    let mut language = Language::new("idents", 2, 3, 5, idents_lex);
    language.set_symbol(ID, "identifier", NAMED);
    language.set_symbol(PROGRAM, "program", NAMED);

    // program := identifier program | <empty>
    language.add_action(1, ID, shift(2));
    language.add_action(1, 0, reduce(PROGRAM, 0));
    language.add_goto(1, PROGRAM, 3);

    language.add_action(2, ID, shift(2));
    language.add_action(2, 0, reduce(PROGRAM, 0));
    language.add_goto(2, PROGRAM, 4);

    language.add_action(3, 0, ParseAction::Accept);
    language.add_action(4, 0, reduce(PROGRAM, 2));

    Arc::new(language)
}

// ============================================================================
// pairs: root := pair_a | pair_b, both `( )`, differing only in
// dynamic precedence
// ============================================================================

pub(crate) mod pairs {
    pub(crate) const LPAREN: u16 = 1;
    pub(crate) const RPAREN: u16 = 2;
    pub(crate) const ROOT: u16 = 3;
    pub(crate) const PAIR_A: u16 = 4;
    pub(crate) const PAIR_B: u16 = 5;
}

fn pairs_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        None => {
            lexer.mark_end();
            lexer.set_result(crate::language::SYM_END);
            true
        }
        Some('(') => {
            lexer.advance(false);
            lexer.mark_end();
            lexer.set_result(pairs::LPAREN);
            true
        }
        Some(')') => {
            lexer.advance(false);
            lexer.mark_end();
            lexer.set_result(pairs::RPAREN);
            true
        }
        Some(_) => false,
    }
}

/// An ambiguous grammar: `( )` reduces to both `pair_a` and `pair_b`;
/// `pair_b` carries the higher dynamic precedence.
pub(crate) fn pairs_language() -> Arc<Language> {
    use pairs::{LPAREN, PAIR_A, PAIR_B, ROOT, RPAREN};
    let mut language = Language::new("pairs", 3, 6, 7, pairs_lex);
    language.set_symbol(LPAREN, "\"(\"", SymbolMetadata {
        visible: true,
        named: false,
        supertype: false,
    });
    language.set_symbol(RPAREN, "\")\"", SymbolMetadata {
        visible: true,
        named: false,
        supertype: false,
    });
    language.set_symbol(ROOT, "root", NAMED);
    language.set_symbol(PAIR_A, "pair_a", NAMED);
    language.set_symbol(PAIR_B, "pair_b", NAMED);

    language.add_action(1, LPAREN, shift(2));
    language.add_goto(1, ROOT, 5);
    language.add_goto(1, PAIR_A, 3);
    language.add_goto(1, PAIR_B, 4);

    language.add_action(2, RPAREN, shift(6));

    language.add_entry(6, 0, ActionEntry {
        actions: vec![reduce_prec(PAIR_A, 2, 1), reduce_prec(PAIR_B, 2, 5)],
        is_reusable: true,
        depends_on_lookahead: false,
    });

    language.add_action(3, 0, reduce(ROOT, 1));
    language.add_action(4, 0, reduce(ROOT, 1));
    language.add_action(5, 0, ParseAction::Accept);

    Arc::new(language)
}

// ============================================================================
// exprs: expr := expr expr | "x" — ambiguous grouping that forks on
// every token after the second
// ============================================================================

pub(crate) mod exprs {
    pub(crate) const X: u16 = 1;
    pub(crate) const EXPR: u16 = 2;
}

fn exprs_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        None => {
            lexer.mark_end();
            lexer.set_result(crate::language::SYM_END);
            true
        }
        Some('x') => {
            lexer.advance(false);
            lexer.mark_end();
            lexer.set_result(exprs::X);
            true
        }
        Some(_) => false,
    }
}

/// `expr := expr expr | "x"`. Every `x` past the second hits a
/// shift/reduce conflict, so long inputs fork stack versions over and
/// over; the conflicting reduction comes first in the entry, as a
/// generated table would order it.
pub(crate) fn exprs_language() -> Arc<Language> {
    use exprs::{EXPR, X};
    let mut language = Language::new("exprs", 2, 3, 5, exprs_lex);
    language.set_symbol(X, "\"x\"", SymbolMetadata {
        visible: true,
        named: false,
        supertype: false,
    });
    language.set_symbol(EXPR, "expr", NAMED);

    language.add_action(1, X, shift(2));
    language.add_goto(1, EXPR, 3);

    language.add_action(2, 0, reduce(EXPR, 1));
    language.add_action(2, X, reduce(EXPR, 1));

    language.add_action(3, 0, ParseAction::Accept);
    language.add_action(3, X, shift(2));
    language.add_goto(3, EXPR, 4);

    language.add_action(4, 0, reduce(EXPR, 2));
    language.add_entry(4, X, ActionEntry {
        actions: vec![reduce(EXPR, 2), shift(2)],
        is_reusable: true,
        depends_on_lookahead: false,
    });
    language.add_goto(4, EXPR, 4);

    Arc::new(language)
}

// ============================================================================
// keywords: statement := "if" identifier, with `if` recognized by
// re-lexing captured identifiers
// ============================================================================

pub(crate) mod keywords {
    pub(crate) const IDENT: u16 = 1;
    pub(crate) const KW_IF: u16 = 2;
    pub(crate) const STATEMENT: u16 = 3;
}

fn keywords_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    if lexer.eof() {
        lexer.mark_end();
        lexer.set_result(crate::language::SYM_END);
        return true;
    }
    if lexer.lookahead().is_some_and(|c| c.is_ascii_alphabetic()) {
        while lexer.lookahead().is_some_and(|c| c.is_ascii_alphabetic()) {
            lexer.advance(false);
        }
        lexer.mark_end();
        lexer.set_result(keywords::IDENT);
        return true;
    }
    false
}

fn keywords_keyword_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    if lexer.lookahead() != Some('i') {
        return false;
    }
    lexer.advance(false);
    if lexer.lookahead() != Some('f') {
        return false;
    }
    lexer.advance(false);
    lexer.mark_end();
    lexer.set_result(keywords::KW_IF);
    true
}

/// `statement := "if" identifier`, where `if` is captured out of
/// ordinary identifiers by the keyword lex function.
pub(crate) fn keywords_language() -> Arc<Language> {
    use keywords::{IDENT, KW_IF, STATEMENT};
    let mut language = Language::new("keywords", 3, 4, 5, keywords_lex);
    language.set_symbol(IDENT, "identifier", NAMED);
    language.set_symbol(KW_IF, "\"if\"", SymbolMetadata {
        visible: true,
        named: false,
        supertype: false,
    });
    language.set_symbol(STATEMENT, "statement", NAMED);
    language.set_keywords(IDENT, keywords_keyword_lex);

    language.add_action(1, KW_IF, shift(2));
    language.add_goto(1, STATEMENT, 4);
    language.add_action(2, IDENT, shift(3));
    language.add_action(3, 0, reduce(STATEMENT, 2));
    language.add_action(4, 0, ParseAction::Accept);

    Arc::new(language)
}

// ============================================================================
// arith: expr := expr plus_op expr | number; plus_op := "+"
// ============================================================================

pub(crate) mod arith {
    pub(crate) const NUMBER: u16 = 1;
    pub(crate) const PLUS: u16 = 2;
    pub(crate) const EXPR: u16 = 3;
    pub(crate) const PLUS_OP: u16 = 4;
}

fn arith_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        None => {
            lexer.mark_end();
            lexer.set_result(crate::language::SYM_END);
            true
        }
        Some('+') => {
            lexer.advance(false);
            lexer.mark_end();
            lexer.set_result(arith::PLUS);
            true
        }
        Some(c) if c.is_ascii_digit() => {
            while lexer.lookahead().is_some_and(|c| c.is_ascii_digit()) {
                lexer.advance(false);
            }
            lexer.mark_end();
            lexer.set_result(arith::NUMBER);
            true
        }
        Some(_) => false,
    }
}

/// Left-recursive addition with a separate `plus_op` rule, so a missing
/// `+` can be synthesized during recovery.
pub(crate) fn arith_language() -> Arc<Language> {
    use arith::{EXPR, NUMBER, PLUS, PLUS_OP};
    let mut language = Language::new("arith", 3, 5, 7, arith_lex);
    language.set_symbol(NUMBER, "number", NAMED);
    language.set_symbol(PLUS, "\"+\"", SymbolMetadata {
        visible: true,
        named: false,
        supertype: false,
    });
    language.set_symbol(EXPR, "expr", NAMED);
    language.set_symbol(PLUS_OP, "plus_op", HIDDEN);

    language.add_action(1, NUMBER, shift(2));
    language.add_goto(1, EXPR, 3);

    language.add_action(2, 0, reduce(EXPR, 1));
    language.add_action(2, PLUS, reduce(EXPR, 1));

    language.add_action(3, PLUS, shift(6));
    language.add_action(3, 0, ParseAction::Accept);
    language.add_goto(3, PLUS_OP, 4);

    language.add_action(6, NUMBER, reduce(PLUS_OP, 1));

    language.add_action(4, NUMBER, shift(2));
    language.add_goto(4, EXPR, 5);

    language.add_action(5, 0, reduce(EXPR, 3));
    language.add_action(5, PLUS, reduce(EXPR, 3));

    Arc::new(language)
}

// ============================================================================
// strings: string := '"' contents '"', contents scanned externally
// ============================================================================

pub(crate) mod strings {
    pub(crate) const DQUOTE: u16 = 1;
    pub(crate) const CONTENTS: u16 = 2;
    pub(crate) const STRING: u16 = 3;
}

fn strings_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        None => {
            lexer.mark_end();
            lexer.set_result(crate::language::SYM_END);
            true
        }
        Some('"') => {
            lexer.advance(false);
            lexer.mark_end();
            lexer.set_result(strings::DQUOTE);
            true
        }
        Some(_) => false,
    }
}

/// Scans string bodies, remembering the last body length as its state.
pub(crate) struct StringBodyScanner {
    pub(crate) last_length: u8,
}

impl ExternalScanner for StringBodyScanner {
    fn scan(&mut self, lexer: &mut Lexer<'_>, valid_tokens: &[bool]) -> bool {
        if !valid_tokens.first().copied().unwrap_or(false) {
            return false;
        }
        let mut length: u8 = 0;
        while lexer.lookahead().is_some_and(|c| c != '"') {
            lexer.advance(false);
            length = length.saturating_add(1);
        }
        if length == 0 {
            return false;
        }
        lexer.mark_end();
        lexer.set_result(0);
        self.last_length = length;
        true
    }

    fn serialize(&mut self, buffer: &mut [u8]) -> usize {
        if buffer.is_empty() {
            return 0;
        }
        buffer[0] = self.last_length;
        1
    }

    fn deserialize(&mut self, data: &[u8]) {
        self.last_length = data.first().copied().unwrap_or(0);
    }
}

/// `string := '"' contents '"'`, with the body produced by an external
/// scanner that serializes its state into the token.
pub(crate) fn strings_language() -> Arc<Language> {
    use strings::{CONTENTS, DQUOTE, STRING};
    let mut language = Language::new("strings", 3, 4, 6, strings_lex);
    language.set_symbol(DQUOTE, "\"\\\"\"", SymbolMetadata {
        visible: true,
        named: false,
        supertype: false,
    });
    language.set_symbol(CONTENTS, "contents", NAMED);
    language.set_symbol(STRING, "string", NAMED);

    language.set_external_tokens(ExternalTokens {
        factory: || Box::new(StringBodyScanner { last_length: 0 }),
        symbol_map: vec![CONTENTS],
        enabled_tokens: vec![Vec::new(), vec![true]],
    });

    language.add_action(1, DQUOTE, shift(2));
    language.add_goto(1, STRING, 5);

    language.add_action(2, CONTENTS, shift(3));
    language.set_lex_mode(2, LexMode {
        lex_state: 0,
        external_lex_state: 1,
    });

    language.add_action(3, DQUOTE, shift(4));
    language.add_action(4, 0, reduce(STRING, 3));
    language.add_action(5, 0, ParseAction::Accept);

    Arc::new(language)
}
