// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Language tables: the pluggable grammar description driving the parser.
//!
//! A [`Language`] is a read-only bundle of precompiled LR(1) tables — parse
//! actions, goto transitions, lexer dispatch modes — plus symbol metadata
//! and the lex functions themselves. The runtime never builds these tables;
//! a host assembles them (typically from generated code) with
//! [`Language::new`] and the `add_*` methods, then hands the finished value
//! to [`Parser::set_language`](crate::Parser::set_language).
//!
//! # Reserved ids
//!
//! Symbol 0 is the end-of-input token. The two highest symbol values are
//! reserved for error nodes ([`SYM_ERROR`]) and for the internal nodes that
//! group skipped tokens during recovery ([`SYM_ERROR_REPEAT`]). State 0 is
//! the error-recovery state; state 1 is the initial (and accepting) state.

use std::collections::HashMap;

use ecow::EcoString;
use thiserror::Error;

use crate::lexer::Lexer;

/// A terminal or nonterminal id. Terminals occupy `0..token_count`.
pub type Symbol = u16;

/// An LR automaton state id.
pub type StateId = u16;

/// The end-of-input token.
pub const SYM_END: Symbol = 0;

/// The reserved symbol for error nodes.
pub const SYM_ERROR: Symbol = u16::MAX;

/// The reserved symbol for internal nodes grouping skipped tokens.
pub const SYM_ERROR_REPEAT: Symbol = u16::MAX - 1;

/// The reserved error-recovery state.
pub const ERROR_STATE: StateId = 0;

/// The initial parse state. Acceptance pushes the finished root here.
pub const START_STATE: StateId = 1;

/// Marker for a tree whose recorded parse state is unusable (fragile
/// reductions, error leaves).
pub const STATE_NONE: StateId = u16::MAX;

/// Size of the scratch buffer shared between the lexer and external
/// scanner state serialization.
pub const SERIALIZATION_BUFFER_SIZE: usize = 1024;

/// A lex function: drives the [`Lexer`] interface from the given internal
/// lex state, returning true when a token was recognized.
pub type LexFn = fn(&mut Lexer<'_>, u16) -> bool;

/// How the lexer should be dispatched for a given parse state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexMode {
    /// State passed to the internal lex function.
    pub lex_state: u16,
    /// External-scanner state; 0 means no external tokens are valid here.
    pub external_lex_state: u16,
}

/// Display metadata for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolMetadata {
    /// Whether nodes with this symbol appear in the visible tree.
    pub visible: bool,
    /// Whether the symbol has a name (as opposed to being an anonymous
    /// literal).
    pub named: bool,
    /// Whether the symbol is a supertype grouping other symbols.
    pub supertype: bool,
}

/// One action in a parse-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAction {
    /// Push the lookahead and move to `state`.
    Shift {
        /// Target state.
        state: StateId,
        /// The lookahead is an extra (trivia) token; the state is unchanged.
        is_extra: bool,
        /// Table-internal repetition marker; skipped by the driver.
        is_repetition: bool,
    },
    /// Pop `child_count` trees, wrap them in `symbol`, and follow the goto.
    Reduce {
        /// Nonterminal to construct.
        symbol: Symbol,
        /// Number of stack entries consumed.
        child_count: u16,
        /// Precedence contributed to the new node for ambiguity resolution.
        dynamic_precedence: i32,
        /// Alias sequence applied to the children.
        alias_sequence_id: u16,
    },
    /// The root is complete; finish this stack version.
    Accept,
    /// Enter error recovery with the current lookahead.
    Recover,
}

/// The actions stored for one `(state, symbol)` pair.
#[derive(Debug, Clone, Default)]
pub struct ActionEntry {
    /// Actions in table order; with more than one, the parser forks.
    pub actions: Vec<ParseAction>,
    /// Whether tokens with this entry may be reused across lex states.
    pub is_reusable: bool,
    /// Whether the entry's interpretation depends on following lookahead.
    pub depends_on_lookahead: bool,
}

/// A borrowed view of a table entry; empty for `(state, symbol)` pairs the
/// table does not mention.
#[derive(Debug, Clone, Copy)]
pub struct TableEntry<'a> {
    /// Actions in table order.
    pub actions: &'a [ParseAction],
    /// Whether tokens with this entry may be reused across lex states.
    pub is_reusable: bool,
    /// Whether the entry's interpretation depends on following lookahead.
    pub depends_on_lookahead: bool,
}

impl TableEntry<'_> {
    const EMPTY: TableEntry<'static> = TableEntry {
        actions: &[],
        is_reusable: false,
        depends_on_lookahead: false,
    };
}

/// A scanner for tokens the table-driven lexer cannot recognize
/// (heredocs, indentation, nested comments).
///
/// One instance is created per parser when the language is installed and
/// dropped when the language changes or the parser is dropped. Scanner
/// state that must survive across tokens is carried *inside the syntax
/// tree*: after each successful external scan the runtime calls
/// [`serialize`](ExternalScanner::serialize) and stores the bytes in the
/// new token; before each scan it calls
/// [`deserialize`](ExternalScanner::deserialize) with the bytes saved in
/// the last external token to the left of the scan position.
pub trait ExternalScanner {
    /// Attempts to recognize one of the `valid_tokens` at the lexer's
    /// current position. On success, sets the result symbol on the lexer
    /// (an index into the language's external symbol map) and returns true.
    fn scan(&mut self, lexer: &mut Lexer<'_>, valid_tokens: &[bool]) -> bool;

    /// Writes the scanner's current state into `buffer`, returning the
    /// number of bytes written (at most `buffer.len()`).
    fn serialize(&mut self, buffer: &mut [u8]) -> usize;

    /// Restores state previously produced by
    /// [`serialize`](ExternalScanner::serialize). An empty slice restores
    /// the initial state.
    fn deserialize(&mut self, data: &[u8]);
}

/// The external-token portion of a language table.
pub struct ExternalTokens {
    /// Creates the per-parser scanner instance.
    pub factory: fn() -> Box<dyn ExternalScanner>,
    /// Maps external token ids (as set by the scanner) to grammar symbols.
    pub symbol_map: Vec<Symbol>,
    /// Per external-lex-state rows of valid external tokens. Row 0 is
    /// unused (external lex state 0 means "none valid").
    pub enabled_tokens: Vec<Vec<bool>>,
}

/// A rejected language table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    /// The table declares no states beyond the reserved ones.
    #[error("language `{0}` has no parse states")]
    NoStates(EcoString),

    /// More terminals than symbols.
    #[error("language `{0}` declares {1} tokens but only {2} symbols")]
    TokenCountExceedsSymbols(EcoString, u16, u16),

    /// The lex-mode table must cover every state.
    #[error("language `{0}` has lex modes for {1} states but declares {2}")]
    LexModesTooShort(EcoString, usize, u16),

    /// Symbol metadata must cover every symbol.
    #[error("language `{0}` has metadata for {1} symbols but declares {2}")]
    MetadataTooShort(EcoString, usize, u16),
}

/// A complete language table.
///
/// All fields are fixed once the table is installed in a parser; a
/// `Language` may be shared between parsers (and threads) freely.
pub struct Language {
    name: EcoString,
    token_count: u16,
    symbol_count: u16,
    state_count: u16,
    entries: HashMap<(StateId, Symbol), ActionEntry>,
    next_states: HashMap<(StateId, Symbol), StateId>,
    lex_modes: Vec<LexMode>,
    lex_fn: LexFn,
    keyword_lex_fn: Option<LexFn>,
    keyword_capture_token: Option<Symbol>,
    metadata: Vec<SymbolMetadata>,
    symbol_names: Vec<EcoString>,
    alias_sequences: Vec<Vec<Option<Symbol>>>,
    external: Option<ExternalTokens>,
}

impl Language {
    /// Creates an empty table shell; populate it with the `add_*` methods.
    #[must_use]
    pub fn new(
        name: impl Into<EcoString>,
        token_count: u16,
        symbol_count: u16,
        state_count: u16,
        lex_fn: LexFn,
    ) -> Self {
        Self {
            name: name.into(),
            token_count,
            symbol_count,
            state_count,
            entries: HashMap::new(),
            next_states: HashMap::new(),
            lex_modes: vec![LexMode::default(); state_count as usize],
            lex_fn,
            keyword_lex_fn: None,
            keyword_capture_token: None,
            metadata: vec![SymbolMetadata::default(); symbol_count as usize],
            symbol_names: vec![EcoString::new(); symbol_count as usize],
            alias_sequences: vec![Vec::new()],
            external: None,
        }
    }

    /// Checks the table for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns a [`LanguageError`] describing the first inconsistency found.
    pub fn validate(&self) -> Result<(), LanguageError> {
        if self.state_count < 2 {
            return Err(LanguageError::NoStates(self.name.clone()));
        }
        if self.token_count > self.symbol_count {
            return Err(LanguageError::TokenCountExceedsSymbols(
                self.name.clone(),
                self.token_count,
                self.symbol_count,
            ));
        }
        if self.lex_modes.len() < self.state_count as usize {
            return Err(LanguageError::LexModesTooShort(
                self.name.clone(),
                self.lex_modes.len(),
                self.state_count,
            ));
        }
        if self.metadata.len() < self.symbol_count as usize {
            return Err(LanguageError::MetadataTooShort(
                self.name.clone(),
                self.metadata.len(),
                self.symbol_count,
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Table assembly
    // ========================================================================

    /// Records the actions for a `(state, symbol)` pair. Shift actions also
    /// populate the terminal goto used by stack breakdown and recovery.
    pub fn add_entry(&mut self, state: StateId, symbol: Symbol, entry: ActionEntry) {
        for action in &entry.actions {
            if let ParseAction::Shift {
                state: next,
                is_extra: false,
                is_repetition: false,
            } = *action
            {
                self.next_states.insert((state, symbol), next);
            }
        }
        self.entries.insert((state, symbol), entry);
    }

    /// Shorthand for a single-action reusable entry.
    pub fn add_action(&mut self, state: StateId, symbol: Symbol, action: ParseAction) {
        self.add_entry(
            state,
            symbol,
            ActionEntry {
                actions: vec![action],
                is_reusable: true,
                depends_on_lookahead: false,
            },
        );
    }

    /// Records a nonterminal goto transition.
    pub fn add_goto(&mut self, state: StateId, symbol: Symbol, next: StateId) {
        self.next_states.insert((state, symbol), next);
    }

    /// Sets the lexer dispatch mode for a parse state.
    pub fn set_lex_mode(&mut self, state: StateId, mode: LexMode) {
        self.lex_modes[state as usize] = mode;
    }

    /// Sets a symbol's metadata and display name.
    pub fn set_symbol(
        &mut self,
        symbol: Symbol,
        name: impl Into<EcoString>,
        metadata: SymbolMetadata,
    ) {
        self.metadata[symbol as usize] = metadata;
        self.symbol_names[symbol as usize] = name.into();
    }

    /// Installs the keyword re-lex hook: tokens lexed as `capture_token`
    /// are re-scanned with `lex_fn` to discover keywords.
    pub fn set_keywords(&mut self, capture_token: Symbol, lex_fn: LexFn) {
        self.keyword_capture_token = Some(capture_token);
        self.keyword_lex_fn = Some(lex_fn);
    }

    /// Registers an alias sequence, returning its id for use in reduce
    /// actions.
    pub fn add_alias_sequence(&mut self, aliases: Vec<Option<Symbol>>) -> u16 {
        self.alias_sequences.push(aliases);
        u16::try_from(self.alias_sequences.len() - 1).unwrap_or(0)
    }

    /// Installs the external scanner definition.
    pub fn set_external_tokens(&mut self, external: ExternalTokens) {
        self.external = Some(external);
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// The language's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of terminal symbols.
    #[must_use]
    pub fn token_count(&self) -> u16 {
        self.token_count
    }

    /// Total number of symbols (terminals and nonterminals).
    #[must_use]
    pub fn symbol_count(&self) -> u16 {
        self.symbol_count
    }

    /// Number of parse states.
    #[must_use]
    pub fn state_count(&self) -> u16 {
        self.state_count
    }

    /// The table entry for `(state, symbol)`; empty when the pair has no
    /// actions. Error symbols never have actions.
    #[must_use]
    pub fn table_entry(&self, state: StateId, symbol: Symbol) -> TableEntry<'_> {
        if symbol == SYM_ERROR || symbol == SYM_ERROR_REPEAT {
            return TableEntry::EMPTY;
        }
        match self.entries.get(&(state, symbol)) {
            Some(entry) => TableEntry {
                actions: &entry.actions,
                is_reusable: entry.is_reusable,
                depends_on_lookahead: entry.depends_on_lookahead,
            },
            None => TableEntry::EMPTY,
        }
    }

    /// Whether any action exists for `(state, symbol)`.
    #[must_use]
    pub fn has_actions(&self, state: StateId, symbol: Symbol) -> bool {
        !self.table_entry(state, symbol).actions.is_empty()
    }

    /// Whether the first action for `(state, symbol)` is a reduction.
    #[must_use]
    pub fn has_reduce_action(&self, state: StateId, symbol: Symbol) -> bool {
        matches!(
            self.table_entry(state, symbol).actions.first(),
            Some(ParseAction::Reduce { .. })
        )
    }

    /// The goto transition for `(state, symbol)`; 0 when none exists.
    #[must_use]
    pub fn next_state(&self, state: StateId, symbol: Symbol) -> StateId {
        self.next_states.get(&(state, symbol)).copied().unwrap_or(0)
    }

    /// The lexer dispatch mode for a parse state.
    #[must_use]
    pub fn lex_mode(&self, state: StateId) -> LexMode {
        self.lex_modes[state as usize]
    }

    /// The internal lex function.
    #[must_use]
    pub fn lex_fn(&self) -> LexFn {
        self.lex_fn
    }

    /// The keyword re-lex function, if the language captures keywords.
    #[must_use]
    pub fn keyword_lex_fn(&self) -> Option<LexFn> {
        self.keyword_lex_fn
    }

    /// The token that triggers keyword re-lexing.
    #[must_use]
    pub fn keyword_capture_token(&self) -> Option<Symbol> {
        self.keyword_capture_token
    }

    /// Metadata for a symbol, including the reserved error symbols.
    #[must_use]
    pub fn symbol_metadata(&self, symbol: Symbol) -> SymbolMetadata {
        match symbol {
            SYM_ERROR => SymbolMetadata {
                visible: true,
                named: true,
                supertype: false,
            },
            SYM_ERROR_REPEAT => SymbolMetadata::default(),
            _ => self
                .metadata
                .get(symbol as usize)
                .copied()
                .unwrap_or_default(),
        }
    }

    /// Display name for a symbol.
    #[must_use]
    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        match symbol {
            SYM_ERROR => "ERROR",
            SYM_ERROR_REPEAT => "_error_repeat",
            SYM_END => "end",
            _ => self
                .symbol_names
                .get(symbol as usize)
                .map_or("", EcoString::as_str),
        }
    }

    /// The alias applied to child `child_index` under `alias_sequence_id`.
    #[must_use]
    pub fn alias_at(&self, alias_sequence_id: u16, child_index: usize) -> Option<Symbol> {
        self.alias_sequences
            .get(alias_sequence_id as usize)
            .and_then(|seq| seq.get(child_index))
            .copied()
            .flatten()
    }

    /// The external-token definition, if any.
    #[must_use]
    pub fn external_tokens(&self) -> Option<&ExternalTokens> {
        self.external.as_ref()
    }

    /// The valid external tokens for an external lex state; `None` when the
    /// state is 0 or the language has no external scanner.
    #[must_use]
    pub fn enabled_external_tokens(&self, external_lex_state: u16) -> Option<&[bool]> {
        if external_lex_state == 0 {
            return None;
        }
        self.external
            .as_ref()
            .and_then(|ext| ext.enabled_tokens.get(external_lex_state as usize))
            .map(Vec::as_slice)
    }

    /// Maps an external token id to its grammar symbol.
    #[must_use]
    pub fn external_symbol(&self, external_id: Symbol) -> Symbol {
        self.external
            .as_ref()
            .and_then(|ext| ext.symbol_map.get(external_id as usize))
            .copied()
            .unwrap_or(external_id)
    }
}

impl std::fmt::Debug for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name)
            .field("token_count", &self.token_count)
            .field("symbol_count", &self.symbol_count)
            .field("state_count", &self.state_count)
            .finish_non_exhaustive()
    }
}
