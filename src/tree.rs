//! The concrete parse tree and its shaping policy.
//!
//! Productions collapse to a single pass-through child whenever no operator
//! (or separator) is present at their level, so an operator-free input walks
//! down the whole precedence chain as a spine of one-child nodes. The node
//! variants make the shape contracts structural: a `Chain` node has exactly
//! one child, a `Binary` node exactly three, and only list-shaped rules
//! (statement lists, argument lists, array literals, unary prefixes) produce
//! `Sequence` nodes.

use std::fmt::{Display, Write};

use crate::grammar::{Rule, Terminal};
use crate::tokenizer::LiteralValue;
use crate::{SourcePosition, SourceSpan};

const DISPLAY_INDENT: &str = "    ";

/// A node of the concrete parse tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseNode {
    /// A terminal leaf; has no children.
    Leaf {
        /// The terminal category that produced this leaf.
        terminal: Terminal,
        /// The raw token text.
        text: String,
        /// The decoded value, for literal leaves.
        value: Option<LiteralValue>,
        /// The source extent of the token.
        span: SourceSpan,
    },
    /// A pass-through node delegating to exactly one child: no operator was
    /// present at this rule's level.
    Chain {
        /// The rule that produced this node.
        rule: Rule,
        /// The single child.
        child: Box<ParseNode>,
        /// The source extent of the node.
        span: SourceSpan,
    },
    /// A binary form: left operand, operator leaf, right operand.
    Binary {
        /// The rule that produced this node.
        rule: Rule,
        /// The left operand; a node of the same rule.
        left: Box<ParseNode>,
        /// The operator leaf.
        operator: Box<ParseNode>,
        /// The right operand; a node of the next-tighter rule.
        right: Box<ParseNode>,
        /// The source extent of the node.
        span: SourceSpan,
    },
    /// An ordered sequence of sibling children (separators stripped).
    Sequence {
        /// The rule that produced this node.
        rule: Rule,
        /// The children, in source order.
        children: Vec<ParseNode>,
        /// The source extent of the node.
        span: SourceSpan,
    },
}

impl ParseNode {
    pub(crate) fn leaf(
        terminal: Terminal,
        text: impl Into<String>,
        value: Option<LiteralValue>,
        span: SourceSpan,
    ) -> Self {
        Self::Leaf {
            terminal,
            text: text.into(),
            value,
            span,
        }
    }

    pub(crate) fn chain(rule: Rule, child: Self) -> Self {
        let span = *child.span();
        Self::Chain {
            rule,
            child: Box::new(child),
            span,
        }
    }

    pub(crate) fn binary(rule: Rule, left: Self, operator: Self, right: Self) -> Self {
        let span = SourceSpan::within(left.span(), right.span());
        Self::Binary {
            rule,
            left: Box::new(left),
            operator: Box::new(operator),
            right: Box::new(right),
            span,
        }
    }

    pub(crate) fn sequence(rule: Rule, children: Vec<Self>) -> Self {
        let span = match (children.first(), children.last()) {
            (Some(first), Some(last)) => SourceSpan::within(first.span(), last.span()),
            _ => SourceSpan::default(),
        };
        Self::Sequence {
            rule,
            children,
            span,
        }
    }

    /// Returns the rule that produced this node, or `None` for a leaf.
    pub const fn rule(&self) -> Option<Rule> {
        match self {
            Self::Leaf { .. } => None,
            Self::Chain { rule, .. }
            | Self::Binary { rule, .. }
            | Self::Sequence { rule, .. } => Some(*rule),
        }
    }

    /// Returns the terminal that produced this node, or `None` for a
    /// non-leaf.
    pub const fn terminal(&self) -> Option<Terminal> {
        match self {
            Self::Leaf { terminal, .. } => Some(*terminal),
            _ => None,
        }
    }

    /// Returns the name of the producing rule or terminal.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Leaf { terminal, .. } => terminal.name(),
            Self::Chain { rule, .. }
            | Self::Binary { rule, .. }
            | Self::Sequence { rule, .. } => rule.name(),
        }
    }

    /// Returns the source extent of the node.
    pub const fn span(&self) -> &SourceSpan {
        match self {
            Self::Leaf { span, .. }
            | Self::Chain { span, .. }
            | Self::Binary { span, .. }
            | Self::Sequence { span, .. } => span,
        }
    }

    /// Returns the node's children in source order; empty for a leaf.
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Leaf { .. } => vec![],
            Self::Chain { child, .. } => vec![child],
            Self::Binary {
                left,
                operator,
                right,
                ..
            } => vec![left, operator, right],
            Self::Sequence { children, .. } => children.iter().collect(),
        }
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        match self {
            Self::Leaf { .. } => 0,
            Self::Chain { .. } => 1,
            Self::Binary { .. } => 3,
            Self::Sequence { children, .. } => children.len(),
        }
    }

    /// Returns the single child of a pass-through node, if this is one.
    pub fn single_child(&self) -> Option<&Self> {
        match self {
            Self::Chain { child, .. } => Some(child),
            _ => None,
        }
    }

    /// Returns the raw text of a leaf node.
    pub fn leaf_text(&self) -> Option<&str> {
        match self {
            Self::Leaf { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Returns the decoded value of a literal leaf node.
    pub const fn leaf_value(&self) -> Option<&LiteralValue> {
        match self {
            Self::Leaf { value, .. } => value.as_ref(),
            _ => None,
        }
    }
}

impl Display for ParseNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Self::Leaf { text, .. } = self {
            writeln!(f, "{} '{}'", self.name(), text.escape_debug())
        } else {
            writeln!(f, "{}", self.name())?;
            for child in self.children() {
                write!(
                    indenter::indented(f).with_str(DISPLAY_INDENT),
                    "{child}"
                )?;
            }
            Ok(())
        }
    }
}

/// A parse-time problem, carrying the offending position and a message naming
/// the expected construct.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Where in the input the problem was detected.
    pub position: SourcePosition,
    /// A human-readable description.
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

/// The result of one parse: a tree rooted at `interactive_input` plus any
/// diagnostics produced along the way.
///
/// Callers must check [`ParseTree::has_errors`] before evaluating: a tree
/// with errors may contain partially-formed, non-conformant subtrees.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseTree {
    /// The root node.
    pub root: ParseNode,
    /// Diagnostics, in input order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseTree {
    pub(crate) fn new(root: ParseNode, diagnostics: Vec<Diagnostic>) -> Self {
        Self { root, diagnostics }
    }

    /// Returns true if any lexical or syntactic error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

impl Display for ParseTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "error: {diagnostic}")?;
        }
        self.root.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn literal_leaf(text: &str) -> ParseNode {
        ParseNode::leaf(
            Terminal::Literal,
            text,
            Some(LiteralValue::Str(text.to_owned())),
            SourceSpan::default(),
        )
    }

    #[test]
    fn child_counts_by_shape() {
        let leaf = literal_leaf("x");
        assert_eq!(leaf.child_count(), 0);
        assert_eq!(leaf.terminal(), Some(Terminal::Literal));
        assert_eq!(leaf.rule(), None);

        let chain = ParseNode::chain(Rule::Value, leaf.clone());
        assert_eq!(chain.child_count(), 1);
        assert_eq!(chain.rule(), Some(Rule::Value));
        assert_eq!(chain.single_child(), Some(&leaf));

        let operator = ParseNode::leaf(
            Terminal::AdditiveOperator,
            "+",
            None,
            SourceSpan::default(),
        );
        let binary = ParseNode::binary(
            Rule::AdditiveExpression,
            chain.clone(),
            operator,
            literal_leaf("y"),
        );
        assert_eq!(binary.child_count(), 3);
        assert_eq!(binary.children().len(), 3);

        let sequence =
            ParseNode::sequence(Rule::StatementList, vec![chain.clone(), chain.clone()]);
        assert_eq!(sequence.child_count(), 2);
    }

    #[test]
    fn display_indents_children() {
        let tree = ParseNode::chain(
            Rule::Value,
            literal_leaf("hi"),
        );
        let rendered = tree.to_string();
        assert_eq!(rendered, "value\n    literal 'hi'\n");
    }

    #[test]
    fn tree_error_flag_tracks_diagnostics() {
        let clean = ParseTree::new(literal_leaf("x"), vec![]);
        assert!(!clean.has_errors());

        let broken = ParseTree::new(
            literal_leaf("x"),
            vec![Diagnostic {
                position: SourcePosition::default(),
                message: "expected a statement".into(),
            }],
        );
        assert!(broken.has_errors());
        assert_eq!(broken.diagnostics.len(), 1);
    }
}
