// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Structured error extraction from finished trees.
//!
//! Parsing never fails; errors live inside the tree as `ERROR` and
//! `MISSING` nodes. [`collect`] walks a finished tree and turns those
//! nodes into [`SyntaxError`] values with source spans, ready for
//! [`miette`]-based reporting in a host application.

// Spurious warnings from miette derive macro expansion
#![allow(unused_assignments)]

use ecow::EcoString;
use miette::Diagnostic;
use thiserror::Error;

use crate::language::Language;
use crate::tree::Tree;

/// A byte range within the parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// Start byte offset.
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl ByteRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl From<ByteRange> for miette::SourceSpan {
    fn from(range: ByteRange) -> Self {
        (range.start as usize, (range.end - range.start) as usize).into()
    }
}

/// One error materialized in a syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SyntaxError {
    /// A span of input the parser could not fit into the grammar.
    #[error("unexpected input")]
    #[diagnostic(code(sylva::unexpected))]
    Skipped {
        /// The skipped bytes.
        #[label("not recognized here")]
        span: ByteRange,
    },

    /// A token the grammar requires but the input lacks; the parser
    /// synthesized a zero-width stand-in.
    #[error("missing {symbol}")]
    #[diagnostic(code(sylva::missing))]
    Missing {
        /// Display name of the synthesized token.
        symbol: EcoString,
        /// The insertion point.
        #[label("inserted here")]
        span: ByteRange,
    },
}

impl SyntaxError {
    /// The error's byte range.
    #[must_use]
    pub fn span(&self) -> ByteRange {
        match self {
            SyntaxError::Skipped { span } | SyntaxError::Missing { span, .. } => *span,
        }
    }
}

/// Collects every error node in `tree`, in document order.
#[must_use]
pub fn collect(tree: &Tree, language: &Language) -> Vec<SyntaxError> {
    let mut errors = Vec::new();
    walk(tree, 0, language, &mut errors);
    errors
}

fn walk(tree: &Tree, start: u32, language: &Language, errors: &mut Vec<SyntaxError>) {
    let content_start = start + tree.padding().bytes;
    let content_end = content_start + tree.size().bytes;

    if tree.is_missing() {
        errors.push(SyntaxError::Missing {
            symbol: language.symbol_name(tree.symbol()).into(),
            span: ByteRange::new(content_start, content_end),
        });
        return;
    }
    if tree.is_error() {
        errors.push(SyntaxError::Skipped {
            span: ByteRange::new(content_start, content_end),
        });
        return;
    }

    let mut offset = start;
    for child in tree.children() {
        walk(child, offset, language, errors);
        offset += child.total_bytes();
    }
}
