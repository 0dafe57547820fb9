// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! An incremental, error-tolerant GLR parser runtime.
//!
//! `sylva-core` drives a precompiled LR(1) [`Language`] table over any
//! [`Input`] and always produces a concrete syntax [`Tree`] — malformed
//! input yields a tree with `ERROR` and `MISSING` nodes rather than a
//! failure. Ambiguous grammars are handled with a graph-structured stack
//! that explores competing parses in parallel and selects a winner by
//! error cost and dynamic precedence.
//!
//! Handing a previous tree (after [`Tree::edit`]) back to
//! [`Parser::parse`] reparses incrementally: subtrees whose bytes were
//! not touched by any edit are reused by handle instead of being re-lexed
//! and re-parsed.
//!
//! ```
//! use sylva_core::{Language, ParseAction, Parser, ParseOptions, SymbolMetadata};
//! use std::sync::Arc;
//!
//! // A one-token language: the whole input is a single `word`.
//! fn lex(lexer: &mut sylva_core::Lexer<'_>, _state: u16) -> bool {
//!     if lexer.eof() {
//!         lexer.mark_end();
//!         lexer.set_result(0);
//!         return true;
//!     }
//!     let mut consumed = false;
//!     while lexer.lookahead().is_some_and(|c| c.is_ascii_alphabetic()) {
//!         lexer.advance(false);
//!         consumed = true;
//!     }
//!     if consumed {
//!         lexer.mark_end();
//!         lexer.set_result(1);
//!     }
//!     consumed
//! }
//!
//! let mut language = Language::new("words", 2, 3, 4, lex);
//! language.set_symbol(1, "word", SymbolMetadata { visible: true, named: true, supertype: false });
//! language.set_symbol(2, "source", SymbolMetadata { visible: true, named: true, supertype: false });
//! language.add_action(1, 1, ParseAction::Shift { state: 2, is_extra: false, is_repetition: false });
//! language.add_action(2, 0, ParseAction::Reduce { symbol: 2, child_count: 1, dynamic_precedence: 0, alias_sequence_id: 0 });
//! language.add_goto(1, 2, 3);
//! language.add_action(3, 0, ParseAction::Accept);
//!
//! let mut parser = Parser::new();
//! parser.set_language(Arc::new(language)).unwrap();
//! let tree = parser.parse(&mut "hello", None, ParseOptions::default()).unwrap();
//! assert_eq!(tree.total_bytes(), 5);
//! assert_eq!(tree.error_cost(), 0);
//! ```

pub mod diagnostics;
mod error_cost;
mod input;
mod language;
mod length;
mod lexer;
mod logging;
mod parser;
mod reuse;
mod stack;
mod tree;

#[cfg(test)]
mod grammars;

pub use error_cost::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY, ERROR_COST_PER_SKIPPED_CHAR,
    ERROR_COST_PER_SKIPPED_LINE, ERROR_COST_PER_SKIPPED_TREE,
};
pub use input::{Input, InputEdit};
pub use language::{
    ActionEntry, ERROR_STATE, ExternalScanner, ExternalTokens, Language, LanguageError, LexFn,
    LexMode, ParseAction, SERIALIZATION_BUFFER_SIZE, START_STATE, STATE_NONE, StateId, SYM_END,
    SYM_ERROR, SYM_ERROR_REPEAT, Symbol, SymbolMetadata, TableEntry,
};
pub use length::{Length, Point};
pub use lexer::Lexer;
pub use logging::{LogKind, Logger, TraceLogger};
pub use parser::{ParseOptions, Parser};
pub use tree::{FirstLeaf, Tree, TreeData};
