//! Drives the token-level grammar: a PEG over the token stream, with each
//! precedence level implemented as iterative precedence climbing (parse the
//! next-tighter level, then fold left over same-level operators).
//!
//! Statement-position ambiguity is resolved from the leading token: a
//! bareword starts a pipeline, anything else an expression. The same policy
//! applies inside parentheses, so `(Get-Location)` nests a pipeline while
//! `(1 + 2)` nests an expression.

use crate::grammar::{Grammar, Rule, Terminal};
use crate::tokenizer::{Token, Tokenizer, TokenizerOptions};
use crate::tree::{Diagnostic, ParseNode, ParseTree};
use crate::SourcePosition;

/// Options used to control the behavior of the parser.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ParserOptions {
    /// Whether operator names (`-and`, `-eq`, ...) are recognized without
    /// regard to case.
    pub case_insensitive_operators: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            case_insensitive_operators: true,
        }
    }
}

impl ParserOptions {
    /// Returns the tokenizer options implied by these parser options.
    pub const fn tokenizer_options(&self) -> TokenizerOptions {
        TokenizerOptions {
            case_insensitive_operators: self.case_insensitive_operators,
        }
    }
}

/// Implements parsing for shell input: one interactive submission or script
/// file per parse call.
pub struct Parser<R> {
    reader: R,
    options: ParserOptions,
    grammar: Grammar,
}

impl<R: std::io::BufRead> Parser<R> {
    /// Returns a new parser instance over the given reader.
    pub fn new(reader: R, options: &ParserOptions) -> Self {
        Self {
            reader,
            options: options.clone(),
            grammar: Grammar::new(),
        }
    }

    /// Returns the grammar registry backing this parser.
    pub const fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Parses the input into a parse tree rooted at `interactive_input`.
    ///
    /// Lexical and syntactic errors do not fail the call; they are recorded
    /// as diagnostics on the returned tree.
    pub fn parse(&mut self) -> ParseTree {
        let (tokens, diagnostics) = self.tokenize();
        parse_tokens_with_diagnostics(&tokens, diagnostics)
    }

    fn tokenize(&mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokenizer = Tokenizer::new(&mut self.reader, &self.options.tokenizer_options());

        tracing::debug!(target: "tokenize", "Tokenizing...");

        let mut tokens = vec![];
        let mut diagnostics = vec![];
        loop {
            match tokenizer.next_token() {
                Ok(Some(token)) => {
                    tracing::debug!(target: "tokenize", "TOKEN {}: {token:?}", tokens.len());
                    tokens.push(token);
                }
                Ok(None) => break,
                Err(e) => {
                    // Record the lexical error and parse what we have.
                    let position = e
                        .position()
                        .copied()
                        .unwrap_or_else(|| tokenizer.current_location());
                    diagnostics.push(Diagnostic {
                        position,
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }

        tracing::debug!(target: "tokenize", "  => {} token(s)", tokens.len());

        (tokens, diagnostics)
    }
}

/// Parses a string as one interactive submission or script.
pub fn parse_str(input: &str, options: &ParserOptions) -> ParseTree {
    let mut reader = input.as_bytes();
    Parser::new(&mut reader, options).parse()
}

/// Parses a pre-tokenized input into a parse tree rooted at
/// `interactive_input`.
pub fn parse_tokens(tokens: &[Token]) -> ParseTree {
    parse_tokens_with_diagnostics(tokens, vec![])
}

fn parse_tokens_with_diagnostics(tokens: &[Token], diagnostics: Vec<Diagnostic>) -> ParseTree {
    match token_parser::interactive_input(&Tokens { tokens }) {
        Ok(root) => {
            tracing::debug!(target: "parse", "TREE:\n{root}");
            ParseTree::new(root, diagnostics)
        }
        Err(parse_error) => {
            tracing::debug!(target: "parse", "Parse error: {parse_error:?}; resynchronizing");
            parse_with_recovery(tokens, diagnostics)
        }
    }
}

// Best-effort recovery: re-parse statement by statement, resynchronizing at
// the next top-level statement terminator after each failure, so one
// submission can report several errors.
fn parse_with_recovery(tokens: &[Token], mut diagnostics: Vec<Diagnostic>) -> ParseTree {
    let mut statements = vec![];

    for group in statement_groups(tokens) {
        match token_parser::statement(&Tokens { tokens: group }) {
            Ok(statement) => statements.push(statement),
            Err(e) => diagnostics.push(syntax_diagnostic(&e, group)),
        }
    }

    if statements.is_empty() && diagnostics.is_empty() {
        diagnostics.push(Diagnostic {
            position: end_position(tokens),
            message: "expected a statement".to_owned(),
        });
    }

    ParseTree::new(script_root(statements), diagnostics)
}

// Splits the token stream into per-statement slices at terminators outside
// any parentheses. Terminators themselves are discarded.
fn statement_groups(tokens: &[Token]) -> Vec<&[Token]> {
    let mut groups = vec![];
    let mut depth = 0_usize;
    let mut start = 0;

    for (i, token) in tokens.iter().enumerate() {
        if let Token::Operator(o, _) = token {
            match o.as_str() {
                "(" => depth += 1,
                ")" => depth = depth.saturating_sub(1),
                "\n" | ";" if depth == 0 => {
                    if i > start {
                        groups.push(&tokens[start..i]);
                    }
                    start = i + 1;
                }
                _ => (),
            }
        }
    }

    if start < tokens.len() {
        groups.push(&tokens[start..]);
    }

    groups
}

fn syntax_diagnostic(err: &peg::error::ParseError<usize>, group: &[Token]) -> Diagnostic {
    match group.get(err.location) {
        Some(token) => Diagnostic {
            position: token.location().start,
            message: format!(
                "unexpected '{}'; expected {}",
                token.to_str(),
                err.expected
            ),
        },
        None => Diagnostic {
            position: end_position(group),
            message: format!("expected {}", err.expected),
        },
    }
}

fn end_position(tokens: &[Token]) -> SourcePosition {
    tokens
        .last()
        .map(|t| t.location().end)
        .unwrap_or_default()
}

impl peg::Parse for Tokens<'_> {
    type PositionRepr = usize;

    fn start(&self) -> usize {
        0
    }

    fn is_eof(&self, p: usize) -> bool {
        p >= self.tokens.len()
    }

    fn position_repr(&self, p: usize) -> Self::PositionRepr {
        p
    }
}

impl<'a> peg::ParseElem<'a> for Tokens<'a> {
    type Element = &'a Token;

    fn parse_elem(&'a self, pos: usize) -> peg::RuleResult<Self::Element> {
        match self.tokens.get(pos) {
            Some(c) => peg::RuleResult::Matched(pos + 1, c),
            None => peg::RuleResult::Failed,
        }
    }
}

/// Encapsulates a sequence of tokens.
#[derive(Debug)]
pub(crate) struct Tokens<'a> {
    /// Sequence of tokens.
    pub tokens: &'a [Token],
}

peg::parser! {
    grammar token_parser<'a>() for Tokens<'a> {
        pub(crate) rule interactive_input() -> ParseNode =
            terminator()* b:script_block() {
                ParseNode::chain(Rule::InteractiveInput, b)
            }

        rule script_block() -> ParseNode =
            b:script_block_body() { ParseNode::chain(Rule::ScriptBlock, b) }

        rule script_block_body() -> ParseNode =
            l:statement_list() { ParseNode::chain(Rule::ScriptBlockBody, l) }

        rule statement_list() -> ParseNode =
            first:statement() rest:(terminator()+ s:statement() { s })* terminator()* {
                let mut statements = vec![first];
                statements.extend(rest);
                statement_list_node(statements)
            }

        pub(crate) rule statement() -> ParseNode =
            p:pipeline() { ParseNode::chain(Rule::Statement, p) } /
            e:expression() { ParseNode::chain(Rule::Statement, e) } /
            expected!("statement")

        //
        // Commands and pipelines
        //

        rule pipeline() -> ParseNode =
            first:command() rest:(op:pipe() c:command() { (op, c) })* {
                fold_binary(Rule::Pipeline, Terminal::Pipe, first, rest)
            }

        rule command() -> ParseNode =
            name:command_name() args:command_argument()* { command_node(name, args) }

        rule command_name() -> ParseNode =
            t:bareword() { ParseNode::chain(Rule::CommandName, token_leaf(Terminal::Bareword, t)) }

        rule command_argument() -> ParseNode =
            t:literal() { ParseNode::chain(Rule::CommandArgument, token_leaf(Terminal::Literal, t)) } /
            t:variable() { ParseNode::chain(Rule::CommandArgument, token_leaf(Terminal::Variable, t)) } /
            t:bareword() { ParseNode::chain(Rule::CommandArgument, token_leaf(Terminal::Bareword, t)) } /
            g:parenthesized() { ParseNode::chain(Rule::CommandArgument, g) }

        //
        // The expression precedence chain, loosest to tightest. Each level
        // parses the next-tighter level and folds left over its own
        // operators; with no operator present it collapses to a single-child
        // pass-through node.
        //

        rule expression() -> ParseNode =
            e:logical_expression() { ParseNode::chain(Rule::Expression, e) }

        rule logical_expression() -> ParseNode =
            first:bitwise_expression() rest:(op:logical_operator() r:bitwise_expression() { (op, r) })* {
                fold_binary(Rule::LogicalExpression, Terminal::LogicalOperator, first, rest)
            }

        rule bitwise_expression() -> ParseNode =
            first:comparison_expression() rest:(op:bitwise_operator() r:comparison_expression() { (op, r) })* {
                fold_binary(Rule::BitwiseExpression, Terminal::BitwiseOperator, first, rest)
            }

        rule comparison_expression() -> ParseNode =
            first:additive_expression() rest:(op:comparison_operator() r:additive_expression() { (op, r) })* {
                fold_binary(Rule::ComparisonExpression, Terminal::ComparisonOperator, first, rest)
            }

        rule additive_expression() -> ParseNode =
            first:multiplicative_expression() rest:(op:additive_operator() r:multiplicative_expression() { (op, r) })* {
                fold_binary(Rule::AdditiveExpression, Terminal::AdditiveOperator, first, rest)
            }

        rule multiplicative_expression() -> ParseNode =
            first:format_expression() rest:(op:multiplicative_operator() r:format_expression() { (op, r) })* {
                fold_binary(Rule::MultiplicativeExpression, Terminal::MultiplicativeOperator, first, rest)
            }

        rule format_expression() -> ParseNode =
            first:array_literal_expression() rest:(op:format_operator() r:array_literal_expression() { (op, r) })* {
                fold_binary(Rule::FormatExpression, Terminal::FormatOperator, first, rest)
            }

        rule array_literal_expression() -> ParseNode =
            first:unary_expression() rest:(comma() u:unary_expression() { u })* {
                array_literal_node(first, rest)
            }

        rule unary_expression() -> ParseNode =
            op:unary_operator() operand:unary_expression() { unary_node(op, operand) } /
            p:primary_expression() { ParseNode::chain(Rule::UnaryExpression, p) }

        rule primary_expression() -> ParseNode =
            v:value() { ParseNode::chain(Rule::PrimaryExpression, v) } /
            g:parenthesized() { ParseNode::chain(Rule::PrimaryExpression, g) }

        rule value() -> ParseNode =
            t:literal() { ParseNode::chain(Rule::Value, token_leaf(Terminal::Literal, t)) } /
            t:variable() { ParseNode::chain(Rule::Value, token_leaf(Terminal::Variable, t)) }

        // Parenthesized grouping strips the parens and yields the inner
        // subtree unmodified.
        rule parenthesized() -> ParseNode =
            left_paren() inner:paren_body() right_paren() { inner }

        rule paren_body() -> ParseNode =
            p:pipeline() { p } /
            e:expression() { e }

        //
        // Token interpretation
        //

        rule literal() -> &'input Token =
            quiet!{ [Token::Literal(_, _, _)] } / expected!("literal")

        rule variable() -> &'input Token =
            quiet!{ [Token::Variable(_, _)] } / expected!("variable")

        rule bareword() -> &'input Token =
            quiet!{ [Token::Word(_, _)] } / expected!("bareword")

        rule logical_operator() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if Terminal::LogicalOperator.matches_operator(o.as_str())] } /
            expected!("logical operator")

        rule bitwise_operator() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if Terminal::BitwiseOperator.matches_operator(o.as_str())] } /
            expected!("bitwise operator")

        rule comparison_operator() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if Terminal::ComparisonOperator.matches_operator(o.as_str())] } /
            expected!("comparison operator")

        rule additive_operator() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if Terminal::AdditiveOperator.matches_operator(o.as_str())] } /
            expected!("additive operator")

        rule multiplicative_operator() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if Terminal::MultiplicativeOperator.matches_operator(o.as_str())] } /
            expected!("multiplicative operator")

        rule format_operator() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if Terminal::FormatOperator.matches_operator(o.as_str())] } /
            expected!("format operator")

        rule unary_operator() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if Terminal::UnaryOperator.matches_operator(o.as_str())] } /
            expected!("unary operator")

        rule pipe() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if o.as_str() == "|"] } / expected!("'|'")

        rule comma() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if o.as_str() == ","] } / expected!("','")

        rule left_paren() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if o.as_str() == "("] } / expected!("'('")

        rule right_paren() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if o.as_str() == ")"] } / expected!("')'")

        rule terminator() -> &'input Token =
            quiet!{ [Token::Operator(o, _) if o.as_str() == "\n" || o.as_str() == ";"] } /
            expected!("statement terminator")
    }
}

//
// Tree shaping
//

fn token_leaf(terminal: Terminal, token: &Token) -> ParseNode {
    let value = match token {
        Token::Literal(_, value, _) => Some(value.clone()),
        _ => None,
    };
    ParseNode::leaf(terminal, token.to_str(), value, *token.location())
}

// One pass through the fold per same-level operator, nesting to the left; no
// operators leaves a single-child pass-through node.
fn fold_binary(
    rule: Rule,
    level: Terminal,
    first: ParseNode,
    rest: Vec<(&Token, ParseNode)>,
) -> ParseNode {
    let mut node = ParseNode::chain(rule, first);
    for (op, right) in rest {
        let operator = token_leaf(level, op);
        node = ParseNode::binary(rule, node, operator, right);
    }
    node
}

fn array_literal_node(first: ParseNode, rest: Vec<ParseNode>) -> ParseNode {
    if rest.is_empty() {
        ParseNode::chain(Rule::ArrayLiteralExpression, first)
    } else {
        let mut children = vec![first];
        children.extend(rest);
        ParseNode::sequence(Rule::ArrayLiteralExpression, children)
    }
}

fn unary_node(op: &Token, operand: ParseNode) -> ParseNode {
    ParseNode::sequence(
        Rule::UnaryExpression,
        vec![token_leaf(Terminal::UnaryOperator, op), operand],
    )
}

fn command_node(name: ParseNode, args: Vec<ParseNode>) -> ParseNode {
    if args.is_empty() {
        ParseNode::chain(Rule::Command, name)
    } else {
        let mut children = vec![name];
        children.extend(args);
        ParseNode::sequence(Rule::Command, children)
    }
}

fn statement_list_node(statements: Vec<ParseNode>) -> ParseNode {
    if statements.len() == 1 {
        let mut statements = statements;
        ParseNode::chain(Rule::StatementList, statements.remove(0))
    } else {
        ParseNode::sequence(Rule::StatementList, statements)
    }
}

fn script_root(statements: Vec<ParseNode>) -> ParseNode {
    ParseNode::chain(
        Rule::InteractiveInput,
        ParseNode::chain(
            Rule::ScriptBlock,
            ParseNode::chain(Rule::ScriptBlockBody, statement_list_node(statements)),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{tokenize_str, LiteralValue};
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    const STATEMENT_SPINE: &[Rule] = &[
        Rule::InteractiveInput,
        Rule::ScriptBlock,
        Rule::ScriptBlockBody,
        Rule::StatementList,
        Rule::Statement,
    ];

    fn parse(input: &str) -> ParseTree {
        parse_str(input, &ParserOptions::default())
    }

    // Walks single children through the expected rules, asserting each node
    // is a pass-through, and returns the node below the last one.
    fn verify_singles<'a>(mut node: &'a ParseNode, expected: &[Rule]) -> &'a ParseNode {
        for rule in expected {
            assert_eq!(node.rule(), Some(*rule), "wrong rule in chain:\n{node}");
            assert_eq!(node.child_count(), 1, "wrong child count:\n{node}");
            node = node.single_child().expect("single child");
        }
        node
    }

    fn spine_plus(rest: &[Rule]) -> Vec<Rule> {
        let mut rules = STATEMENT_SPINE.to_vec();
        rules.extend_from_slice(rest);
        rules
    }

    const EXPRESSION_TO_VALUE: &[Rule] = &[
        Rule::Expression,
        Rule::LogicalExpression,
        Rule::BitwiseExpression,
        Rule::ComparisonExpression,
        Rule::AdditiveExpression,
        Rule::MultiplicativeExpression,
        Rule::FormatExpression,
        Rule::ArrayLiteralExpression,
        Rule::UnaryExpression,
        Rule::PrimaryExpression,
        Rule::Value,
    ];

    #[test]
    fn parse_simple_command() {
        let tree = parse("Get-ChildItem\n");
        assert!(!tree.has_errors(), "{tree}");

        let node = verify_singles(
            &tree.root,
            &spine_plus(&[Rule::Pipeline, Rule::Command, Rule::CommandName]),
        );

        assert_eq!(node.child_count(), 0, "{node}");
        assert_eq!(node.terminal(), Some(Terminal::Bareword));
        assert_eq!(node.leaf_text(), Some("Get-ChildItem"));
    }

    #[test]
    fn parse_trivial_prompt_expression() {
        let tree = parse("\"PS> \"\n");
        assert!(!tree.has_errors(), "{tree}");

        let node = verify_singles(&tree.root, &spine_plus(EXPRESSION_TO_VALUE));

        assert_eq!(node.child_count(), 0, "{node}");
        assert_eq!(node.terminal(), Some(Terminal::Literal));
        assert_eq!(node.leaf_value(), Some(&LiteralValue::Str("PS> ".into())));
    }

    #[test]
    fn parse_default_prompt_expression() {
        let tree = parse("\"PS> \" + (Get-Location)\n");
        assert!(!tree.has_errors(), "{tree}");

        // The three looser binary levels collapse; the first branching node
        // is the additive expression.
        let node = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
            ]),
        );
        assert_eq!(node.rule(), Some(Rule::AdditiveExpression));
        assert_eq!(node.child_count(), 3, "{node}");

        let children = node.children();
        assert_eq!(children[1].terminal(), Some(Terminal::AdditiveOperator));
        assert_eq!(children[1].leaf_text(), Some("+"));

        // The right operand re-enters the grammar through the parens and
        // holds a nested pipeline.
        let inner = verify_singles(
            children[2],
            &[
                Rule::MultiplicativeExpression,
                Rule::FormatExpression,
                Rule::ArrayLiteralExpression,
                Rule::UnaryExpression,
                Rule::PrimaryExpression,
                Rule::Pipeline,
                Rule::Command,
                Rule::CommandName,
            ],
        );
        assert_eq!(inner.leaf_text(), Some("Get-Location"));
    }

    #[test]
    fn parse_bareword_operand_in_parens() {
        let tree = parse("\"a\" + (b)\n");
        assert!(!tree.has_errors(), "{tree}");

        let node = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
            ]),
        );
        assert_eq!(node.rule(), Some(Rule::AdditiveExpression));
        assert_eq!(node.child_count(), 3, "{node}");
    }

    #[test]
    fn additive_operators_are_left_associative() {
        let tree = parse("1 - 2 - 3\n");
        assert!(!tree.has_errors(), "{tree}");

        let outer = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
            ]),
        );
        assert_eq!(outer.rule(), Some(Rule::AdditiveExpression));
        assert_eq!(outer.child_count(), 3, "{outer}");

        let left = outer.children()[0];
        assert_eq!(left.rule(), Some(Rule::AdditiveExpression));
        assert_eq!(left.child_count(), 3, "{left}");

        assert_eq!(left.children()[0].rule(), Some(Rule::AdditiveExpression));
        assert_eq!(left.children()[0].child_count(), 1);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let tree = parse("1 + 2 * 3\n");
        assert!(!tree.has_errors(), "{tree}");

        let additive = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
            ]),
        );
        assert_eq!(additive.rule(), Some(Rule::AdditiveExpression));
        assert_eq!(additive.child_count(), 3);

        let right = additive.children()[2];
        assert_eq!(right.rule(), Some(Rule::MultiplicativeExpression));
        assert_eq!(right.child_count(), 3, "{right}");
    }

    #[test]
    fn logical_operators_bind_loosest() {
        let tree = parse("1 -lt 2 -and 3 -gt 2\n");
        assert!(!tree.has_errors(), "{tree}");

        let logical = verify_singles(&tree.root, &spine_plus(&[Rule::Expression]));
        assert_eq!(logical.rule(), Some(Rule::LogicalExpression));
        assert_eq!(logical.child_count(), 3, "{logical}");

        let comparison = verify_singles(
            logical.children()[0],
            &[Rule::LogicalExpression, Rule::BitwiseExpression],
        );
        assert_eq!(comparison.rule(), Some(Rule::ComparisonExpression));
        assert_eq!(comparison.child_count(), 3, "{comparison}");
    }

    #[test]
    fn format_operator_level() {
        let tree = parse("'{0}' -f $x\n");
        assert!(!tree.has_errors(), "{tree}");

        let format = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
                Rule::AdditiveExpression,
                Rule::MultiplicativeExpression,
            ]),
        );
        assert_eq!(format.rule(), Some(Rule::FormatExpression));
        assert_eq!(format.child_count(), 3, "{format}");
        assert_eq!(
            format.children()[1].terminal(),
            Some(Terminal::FormatOperator)
        );
    }

    #[test]
    fn parse_array_literal() {
        let tree = parse("1, 2, 3\n");
        assert!(!tree.has_errors(), "{tree}");

        let array = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
                Rule::AdditiveExpression,
                Rule::MultiplicativeExpression,
                Rule::FormatExpression,
            ]),
        );
        assert_eq!(array.rule(), Some(Rule::ArrayLiteralExpression));
        assert_eq!(array.child_count(), 3, "{array}");
        for element in array.children() {
            assert_eq!(element.rule(), Some(Rule::UnaryExpression));
            assert_eq!(element.child_count(), 1);
        }
    }

    #[test]
    fn parse_unary_prefix() {
        let tree = parse("-not $flag\n");
        assert!(!tree.has_errors(), "{tree}");

        let unary = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
                Rule::AdditiveExpression,
                Rule::MultiplicativeExpression,
                Rule::FormatExpression,
                Rule::ArrayLiteralExpression,
            ]),
        );
        assert_eq!(unary.rule(), Some(Rule::UnaryExpression));
        assert_eq!(unary.child_count(), 2, "{unary}");

        let children = unary.children();
        assert_eq!(children[0].terminal(), Some(Terminal::UnaryOperator));
        assert_eq!(children[0].leaf_text(), Some("-not"));
        assert_eq!(children[1].rule(), Some(Rule::UnaryExpression));
    }

    #[test]
    fn parse_parenthesized_grouping() {
        let tree = parse("(1 + 2) * 3\n");
        assert!(!tree.has_errors(), "{tree}");

        let multiplicative = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
                Rule::AdditiveExpression,
            ]),
        );
        assert_eq!(multiplicative.rule(), Some(Rule::MultiplicativeExpression));
        assert_eq!(multiplicative.child_count(), 3, "{multiplicative}");

        // The parens are stripped; the primary's single child is the nested
        // expression subtree.
        let inner = verify_singles(
            multiplicative.children()[0],
            &[
                Rule::MultiplicativeExpression,
                Rule::FormatExpression,
                Rule::ArrayLiteralExpression,
                Rule::UnaryExpression,
                Rule::PrimaryExpression,
            ],
        );
        assert_eq!(inner.rule(), Some(Rule::Expression));

        let additive = verify_singles(
            inner,
            &[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
            ],
        );
        assert_eq!(additive.rule(), Some(Rule::AdditiveExpression));
        assert_eq!(additive.child_count(), 3);
    }

    #[test]
    fn pipelines_fold_left() {
        let tree = parse("Get-Process | Sort-Object | Select-Object\n");
        assert!(!tree.has_errors(), "{tree}");

        let outer = verify_singles(&tree.root, STATEMENT_SPINE);
        assert_eq!(outer.rule(), Some(Rule::Pipeline));
        assert_eq!(outer.child_count(), 3, "{outer}");

        let children = outer.children();
        assert_eq!(children[0].rule(), Some(Rule::Pipeline));
        assert_eq!(children[0].child_count(), 3);
        assert_eq!(children[1].terminal(), Some(Terminal::Pipe));
        assert_eq!(children[2].rule(), Some(Rule::Command));
        assert_eq!(children[2].child_count(), 1);
    }

    #[test]
    fn parse_command_with_arguments() {
        let tree = parse("Write-Output 42 -NoEnumerate $x\n");
        assert!(!tree.has_errors(), "{tree}");

        let command = verify_singles(&tree.root, &spine_plus(&[Rule::Pipeline]));
        assert_eq!(command.rule(), Some(Rule::Command));
        assert_eq!(command.child_count(), 4, "{command}");

        let children = command.children();
        assert_eq!(children[0].rule(), Some(Rule::CommandName));
        for argument in &children[1..] {
            assert_eq!(argument.rule(), Some(Rule::CommandArgument));
            assert_eq!(argument.child_count(), 1);
        }
    }

    #[test]
    fn parse_multiple_statements() {
        let tree = parse("Get-Date; Get-Location\n");
        assert!(!tree.has_errors(), "{tree}");

        let list = verify_singles(
            &tree.root,
            &[Rule::InteractiveInput, Rule::ScriptBlock, Rule::ScriptBlockBody],
        );
        assert_eq!(list.rule(), Some(Rule::StatementList));
        assert_eq!(list.child_count(), 2, "{list}");
        for statement in list.children() {
            assert_eq!(statement.rule(), Some(Rule::Statement));
            assert_eq!(statement.child_count(), 1);
        }
    }

    #[test]
    fn trailing_terminators_are_tolerated() {
        let tree = parse("Get-Date;\n\n");
        assert!(!tree.has_errors(), "{tree}");

        let list = verify_singles(
            &tree.root,
            &[Rule::InteractiveInput, Rule::ScriptBlock, Rule::ScriptBlockBody],
        );
        assert_eq!(list.rule(), Some(Rule::StatementList));
        assert_eq!(list.child_count(), 1);
    }

    #[test]
    fn binary_node_spans_cover_operands() {
        let tree = parse("1 + 2\n");
        assert!(!tree.has_errors(), "{tree}");

        let additive = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
                Rule::ComparisonExpression,
            ]),
        );
        assert_eq!(additive.span().start.index, 0);
        assert_eq!(additive.span().end.index, 5);
    }

    #[test]
    fn reparsing_is_idempotent() {
        let input = "\"PS> \" + (Get-Location)\n";
        let first = parse(input);
        let second = parse(input);
        assert_eq!(first, second);
    }

    #[test]
    fn parse_pretokenized_input() -> Result<()> {
        let tokens = tokenize_str("Get-Date\n")?;
        let tree = parse_tokens(&tokens);
        assert!(!tree.has_errors(), "{tree}");
        Ok(())
    }

    #[test]
    fn statement_rule_parses_a_single_statement() -> Result<()> {
        let tokens = tokenize_str("Get-Date")?;
        let statement = token_parser::statement(&Tokens {
            tokens: tokens.as_slice(),
        })?;
        assert_eq!(statement.rule(), Some(Rule::Statement));
        assert_eq!(statement.child_count(), 1);
        Ok(())
    }

    #[test]
    fn grammar_is_exposed_by_the_parser() {
        let mut reader = "".as_bytes();
        let parser = Parser::new(&mut reader, &ParserOptions::default());
        assert!(parser.grammar().rule("pipeline").is_some());
        assert_eq!(parser.grammar().root().rule, Rule::InteractiveInput);
    }

    #[test]
    fn empty_input_reports_missing_statement() {
        let tree = parse("");
        assert!(tree.has_errors());
        assert_eq!(tree.diagnostics.len(), 1);
        assert!(tree.diagnostics[0].message.contains("statement"));

        let tree = parse("\n\n");
        assert!(tree.has_errors());
    }

    #[test]
    fn syntax_error_recovers_at_next_terminator() {
        let tree = parse("1 +\nGet-Date\n");
        assert!(tree.has_errors(), "{tree}");
        assert_eq!(tree.diagnostics.len(), 1);
        assert!(tree.diagnostics[0].message.contains("expected"));
        assert_eq!(tree.diagnostics[0].position.line, 1);

        // The statement after the bad one still parses into the tree.
        let node = verify_singles(
            &tree.root,
            &spine_plus(&[Rule::Pipeline, Rule::Command, Rule::CommandName]),
        );
        assert_eq!(node.leaf_text(), Some("Get-Date"));
    }

    #[test]
    fn multiple_errors_are_reported_together() {
        let tree = parse("1 +\n2 *\nGet-Date\n");
        assert!(tree.has_errors());
        assert_eq!(tree.diagnostics.len(), 2);
        assert_eq!(tree.diagnostics[0].position.line, 1);
        assert_eq!(tree.diagnostics[1].position.line, 2);
    }

    #[test]
    fn trailing_tokens_are_reported() {
        // Two values with no operator or terminator between them do not
        // silently drop the second one.
        let tree = parse("1 2\n");
        assert!(tree.has_errors(), "{tree}");
    }

    #[test]
    fn degenerate_inputs_do_not_panic() {
        for input in ["(", ")", "0x", "$", "| |", "-", ",", "(((", "1 +", "; ;"] {
            let tree = parse(input);
            let _ = tree.to_string();
        }
    }

    #[test]
    fn unterminated_literal_is_reported_without_fault() {
        let tree = parse("\"PS> \n");
        assert!(tree.has_errors());
        assert!(!tree.diagnostics.is_empty());
        assert_eq!(tree.diagnostics[0].position.line, 1);
        assert_eq!(tree.diagnostics[0].position.column, 1);
    }

    #[test]
    fn case_sensitive_operators_reject_uppercase_names() {
        let options = ParserOptions {
            case_insensitive_operators: false,
        };

        let tree = parse_str("1 -EQ 2\n", &options);
        assert!(tree.has_errors(), "{tree}");

        let tree = parse_str("1 -eq 2\n", &options);
        assert!(!tree.has_errors(), "{tree}");
    }

    #[test]
    fn comparison_operators_match_case_insensitively_by_default() {
        let tree = parse("1 -EQ 2\n");
        assert!(!tree.has_errors(), "{tree}");

        let comparison = verify_singles(
            &tree.root,
            &spine_plus(&[
                Rule::Expression,
                Rule::LogicalExpression,
                Rule::BitwiseExpression,
            ]),
        );
        assert_eq!(comparison.rule(), Some(Rule::ComparisonExpression));
        assert_eq!(comparison.child_count(), 3);
    }
}
