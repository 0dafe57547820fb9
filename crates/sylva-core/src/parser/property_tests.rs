// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the parser.
//!
//! These use `proptest` to verify the runtime's quantified invariants
//! over generated inputs:
//!
//! 1. **Totality** — every input produces a tree, never a panic
//! 2. **Coverage** — leaf extents tile the input exactly, no gap or overlap
//! 3. **Cost consistency** — every node's error cost is its children's
//!    costs plus the intrinsic penalty for error nodes
//! 4. **Clean inputs parse cleanly** — grammatical inputs have zero cost
//! 5. **Incremental equivalence** — reparsing after an edit produces the
//!    same tree as parsing the edited text from scratch
//! 6. **Version bound** — even under repeated ambiguity the stack never
//!    holds more than `MAX_VERSION_COUNT` versions

use proptest::prelude::*;

use crate::error_cost::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY, ERROR_COST_PER_SKIPPED_CHAR,
    ERROR_COST_PER_SKIPPED_LINE,
};
use crate::grammars;
use crate::input::InputEdit;
use crate::language::{Language, SYM_ERROR, SYM_ERROR_REPEAT};
use crate::parser::{ParseOptions, Parser};
use crate::tree::Tree;

use std::sync::Arc;

fn parse_text(language: &Arc<Language>, text: &str) -> Tree {
    let mut parser = Parser::new();
    parser.set_language(Arc::clone(language)).expect("valid grammar");
    let mut input = text;
    parser
        .parse(&mut input, None, ParseOptions::default())
        .expect("language is installed")
}

fn leaf_extent_sum(tree: &Tree) -> u32 {
    if tree.children().is_empty() {
        return tree.total_bytes();
    }
    tree.children().iter().map(leaf_extent_sum).sum()
}

fn assert_cost_consistent(tree: &Tree) {
    if tree.children().is_empty() {
        if tree.is_missing() {
            assert_eq!(
                tree.error_cost(),
                ERROR_COST_PER_MISSING_TREE + ERROR_COST_PER_RECOVERY
            );
        }
        return;
    }

    let child_sum: u32 = tree.children().iter().map(|c| c.error_cost()).sum();
    let intrinsic = if tree.symbol() == SYM_ERROR || tree.symbol() == SYM_ERROR_REPEAT {
        ERROR_COST_PER_RECOVERY
            + ERROR_COST_PER_SKIPPED_CHAR * tree.size().bytes
            + ERROR_COST_PER_SKIPPED_LINE * tree.size().extent.row
    } else {
        0
    };
    assert_eq!(
        tree.error_cost(),
        child_sum + intrinsic,
        "error cost must be the children's sum plus the intrinsic penalty"
    );

    let child_extent: u32 = tree.children().iter().map(|child| child.total_bytes()).sum();
    assert_eq!(
        tree.total_bytes(),
        child_extent,
        "node extent must equal the concatenation of its children"
    );

    for child in tree.children() {
        assert_cost_consistent(child);
    }
}

fn structural_eq(a: &Tree, b: &Tree) -> bool {
    a.symbol() == b.symbol()
        && a.padding().bytes == b.padding().bytes
        && a.size().bytes == b.size().bytes
        && a.is_missing() == b.is_missing()
        && a.is_extra() == b.is_extra()
        && a.children().len() == b.children().len()
        && a.children()
            .iter()
            .zip(b.children())
            .all(|(x, y)| structural_eq(x, y))
}

/// Default is 256 cases; override via `PROPTEST_CASES` for longer runs.
fn proptest_config() -> ProptestConfig {
    let default = ProptestConfig::default();
    ProptestConfig {
        cases: default.cases.max(256),
        ..default
    }
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Properties 1-3 over arbitrary bytes for the identifier grammar.
    #[test]
    fn idents_parse_covers_any_input(text in "[a-z0-9 .()]{0,40}") {
        let tree = parse_text(&grammars::idents_language(), &text);
        prop_assert_eq!(tree.total_bytes() as usize, text.len());
        prop_assert_eq!(leaf_extent_sum(&tree) as usize, text.len());
        assert_cost_consistent(&tree);
    }

    /// Properties 1-3 for the arithmetic grammar, which exercises the
    /// missing-token recovery path.
    #[test]
    fn arith_parse_covers_any_input(text in "[0-9+ ]{0,30}") {
        let tree = parse_text(&grammars::arith_language(), &text);
        prop_assert_eq!(tree.total_bytes() as usize, text.len());
        prop_assert_eq!(leaf_extent_sum(&tree) as usize, text.len());
        assert_cost_consistent(&tree);
    }

    /// Property 6: the exprs grammar forks on every token past the
    /// second, and garbage bytes add recovery versions on top; the
    /// version set must stay within the bound throughout.
    #[test]
    fn ambiguous_parses_stay_within_the_version_bound(text in "[x .]{0,24}") {
        let language = grammars::exprs_language();
        let mut parser = Parser::new();
        parser.set_language(Arc::clone(&language)).expect("valid grammar");
        let mut input = text.as_str();
        let tree = parser
            .parse(&mut input, None, ParseOptions::default())
            .expect("language is installed");

        prop_assert_eq!(tree.total_bytes() as usize, text.len());
        prop_assert_eq!(leaf_extent_sum(&tree) as usize, text.len());
        prop_assert!(parser.peak_condensed_version_count() <= super::MAX_VERSION_COUNT);
    }

    /// Property 4: inputs in the grammar parse without error cost.
    #[test]
    fn clean_identifier_sequences_have_no_errors(
        words in prop::collection::vec("[a-z]{1,6}", 0..6),
    ) {
        let text = words.join(" ");
        let tree = parse_text(&grammars::idents_language(), &text);
        prop_assert_eq!(tree.error_cost(), 0);
        prop_assert_eq!(tree.total_bytes() as usize, text.len());
    }

    /// Property 4 for arithmetic: `n (+ n)*` is always clean.
    #[test]
    fn clean_sums_have_no_errors(numbers in prop::collection::vec("[0-9]{1,4}", 1..5)) {
        let text = numbers.join("+");
        let tree = parse_text(&grammars::arith_language(), &text);
        prop_assert_eq!(tree.error_cost(), 0);
    }

    /// Property 5: incremental equivalence. An edited reparse must be
    /// structurally identical to a from-scratch parse of the new text.
    #[test]
    fn incremental_reparse_matches_fresh_parse(
        base in "[a-z ]{0,24}",
        start_fraction in 0.0f64..1.0,
        delete in 0usize..8,
        insert in "[a-z ]{0,8}",
    ) {
        let language = grammars::idents_language();
        let mut parser = Parser::new();
        parser.set_language(Arc::clone(&language)).expect("valid grammar");

        let mut input = base.as_str();
        let old_tree = parser
            .parse(&mut input, None, ParseOptions::default())
            .expect("language is installed");

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let start = ((base.len() as f64) * start_fraction) as usize;
        let start = start.min(base.len());
        let old_end = (start + delete).min(base.len());

        let mut new_text = String::new();
        new_text.push_str(&base[..start]);
        new_text.push_str(&insert);
        new_text.push_str(&base[old_end..]);

        #[allow(clippy::cast_possible_truncation)]
        let edit = InputEdit::single_row(
            0,
            start as u32,
            old_end as u32,
            (start + insert.len()) as u32,
            0,
        );
        let edited = old_tree.edit(&edit);

        let mut input = new_text.as_str();
        let incremental = parser
            .parse(&mut input, Some(&edited), ParseOptions::default())
            .expect("language is installed");

        let fresh = parse_text(&language, &new_text);
        prop_assert!(
            structural_eq(&fresh, &incremental),
            "incremental tree diverged from fresh parse of {:?}",
            new_text
        );
    }

    /// Editing is position-sound: the edited tree's extent matches the
    /// new text length even before reparsing.
    #[test]
    fn edit_adjusts_the_root_extent(
        base in "[a-z ]{1,24}",
        start_fraction in 0.0f64..1.0,
        delete in 0usize..8,
        insert in "[a-z ]{0,8}",
    ) {
        let language = grammars::idents_language();
        let tree = parse_text(&language, &base);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let start = ((base.len() as f64) * start_fraction) as usize;
        let start = start.min(base.len());
        let old_end = (start + delete).min(base.len());
        let new_len = base.len() - (old_end - start) + insert.len();

        #[allow(clippy::cast_possible_truncation)]
        let edit = InputEdit::single_row(
            0,
            start as u32,
            old_end as u32,
            (start + insert.len()) as u32,
            0,
        );
        let edited = tree.edit(&edit);
        prop_assert_eq!(edited.total_bytes() as usize, new_len);
    }
}
