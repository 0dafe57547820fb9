// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Traversal of a previous tree during incremental reparsing.
//!
//! The cursor walks the old tree in document order, always standing on the
//! subtree that begins at or after the parser's current position. The
//! parser either takes the whole subtree as its next lookahead (reuse),
//! descends into it when only part is salvageable ([`ReusableNode::descend`]),
//! or steps past it ([`ReusableNode::advance`]).
//!
//! The cursor also tracks the external-scanner state in force at its
//! position, since a token is only reusable when the scanner would have
//! been in the same state when it was first produced.

use crate::tree::Tree;

#[derive(Clone)]
struct CursorEntry {
    tree: Tree,
    child_index: usize,
    byte_offset: u32,
}

/// A cursor over the reusable subtrees of a previous parse.
#[derive(Clone, Default)]
pub(crate) struct ReusableNode {
    stack: Vec<CursorEntry>,
    last_external_token: Option<Tree>,
}

impl ReusableNode {
    pub(crate) fn new(tree: Option<Tree>) -> Self {
        let mut stack = Vec::new();
        if let Some(tree) = tree {
            stack.push(CursorEntry {
                tree,
                child_index: 0,
                byte_offset: 0,
            });
        }
        Self {
            stack,
            last_external_token: None,
        }
    }

    /// The subtree the cursor currently stands on.
    pub(crate) fn tree(&self) -> Option<&Tree> {
        self.stack.last().map(|entry| &entry.tree)
    }

    /// Byte position where the current subtree (including padding) begins.
    pub(crate) fn byte_index(&self) -> u32 {
        self.stack.last().map_or(u32::MAX, |entry| entry.byte_offset)
    }

    /// External token in force just before the current subtree.
    pub(crate) fn last_external_token(&self) -> Option<&Tree> {
        self.last_external_token.as_ref()
    }

    /// Steps past the current subtree to its in-order successor.
    pub(crate) fn advance(&mut self) {
        let Some(last) = self.stack.last() else {
            return;
        };
        let byte_offset = last.byte_offset + last.tree.total_bytes();
        if last.tree.has_external_tokens() {
            self.last_external_token = last.tree.last_external_token();
        }

        loop {
            let Some(popped) = self.stack.pop() else {
                return;
            };
            let next_index = popped.child_index + 1;
            if let Some(parent) = self.stack.last() {
                if let Some(sibling) = parent.tree.children().get(next_index) {
                    self.stack.push(CursorEntry {
                        tree: sibling.clone(),
                        child_index: next_index,
                        byte_offset,
                    });
                    return;
                }
            }
        }
    }

    /// Descends into the current subtree's first child. Fails on leaves.
    pub(crate) fn descend(&mut self) -> bool {
        let Some(last) = self.stack.last() else {
            return false;
        };
        let Some(child) = last.tree.children().first().cloned() else {
            return false;
        };
        let byte_offset = last.byte_offset;
        self.stack.push(CursorEntry {
            tree: child,
            child_index: 0,
            byte_offset,
        });
        true
    }

    /// A cursor positioned just after the first leaf of the current
    /// subtree.
    pub(crate) fn after_leaf(&self) -> ReusableNode {
        let mut cursor = self.clone();
        while cursor.descend() {}
        cursor.advance();
        cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{Language, SymbolMetadata};
    use crate::length::{Length, Point};
    use crate::tree::TreeData;

    fn noop_lex(_lexer: &mut crate::lexer::Lexer<'_>, _state: u16) -> bool {
        false
    }

    fn test_language() -> Language {
        let mut language = Language::new("cursor-test", 3, 6, 4, noop_lex);
        for symbol in 1..6 {
            language.set_symbol(
                symbol,
                format!("sym{symbol}"),
                SymbolMetadata {
                    visible: true,
                    named: true,
                    supertype: false,
                },
            );
        }
        language
    }

    fn leaf(language: &Language, symbol: u16, padding: u32, size: u32) -> Tree {
        let data = TreeData::leaf(
            symbol,
            Length::new(padding, Point::new(0, padding)),
            Length::new(size, Point::new(0, size)),
            language,
        );
        Tree::seal(data)
    }

    /// Builds ((a b) c) with a=0..2, b=2..4, c=4..6.
    fn sample_tree(language: &Language) -> Tree {
        let a = leaf(language, 1, 0, 2);
        let b = leaf(language, 2, 0, 2);
        let c = leaf(language, 3, 0, 2);
        let inner = Tree::seal(TreeData::node(4, vec![a, b], 0, language));
        Tree::seal(TreeData::node(5, vec![inner, c], 0, language))
    }

    #[test]
    fn advance_walks_in_document_order() {
        let language = test_language();
        let root = sample_tree(&language);
        let mut cursor = ReusableNode::new(Some(root.clone()));

        assert!(Tree::same_node(cursor.tree().unwrap(), &root));
        assert_eq!(cursor.byte_index(), 0);

        cursor.advance();
        assert!(cursor.tree().is_none());
    }

    #[test]
    fn descend_then_advance_reaches_siblings() {
        let language = test_language();
        let root = sample_tree(&language);
        let mut cursor = ReusableNode::new(Some(root.clone()));

        assert!(cursor.descend());
        assert_eq!(cursor.tree().unwrap().symbol(), 4);
        assert_eq!(cursor.byte_index(), 0);

        cursor.advance();
        assert_eq!(cursor.tree().unwrap().symbol(), 3);
        assert_eq!(cursor.byte_index(), 4);

        cursor.advance();
        assert!(cursor.tree().is_none());
    }

    #[test]
    fn descend_into_leaves_fails() {
        let language = test_language();
        let root = sample_tree(&language);
        let mut cursor = ReusableNode::new(Some(root));
        assert!(cursor.descend());
        assert!(cursor.descend());
        assert_eq!(cursor.tree().unwrap().symbol(), 1);
        assert!(!cursor.descend());
    }

    #[test]
    fn after_leaf_skips_the_first_token() {
        let language = test_language();
        let root = sample_tree(&language);
        let cursor = ReusableNode::new(Some(root));
        let after = cursor.after_leaf();
        assert_eq!(after.tree().unwrap().symbol(), 2);
        assert_eq!(after.byte_index(), 2);
    }
}
