//! The grammar registry: the authoritative, immutable table of terminals,
//! rules, and productions for the shell language, built once and validated at
//! construction time.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

/// A lexical terminal category. Terminals are the leaves of the parse tree.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Terminal {
    /// String and numeric literals, carrying a decoded value.
    Literal,
    /// Bareword tokens usable as command names and arguments.
    Bareword,
    /// `$name` variable references.
    Variable,
    /// `-and`, `-or`, `-xor`.
    LogicalOperator,
    /// `-band`, `-bor`, `-bxor`.
    BitwiseOperator,
    /// `-eq`, `-ne`, `-lt`, ... including `-i`/`-c` case-variant prefixes.
    ComparisonOperator,
    /// `+`, `-`.
    AdditiveOperator,
    /// `*`, `/`, `%`.
    MultiplicativeOperator,
    /// `-f`.
    FormatOperator,
    /// Prefix `-not`, `-bnot`, `!`, `+`, `-`.
    UnaryOperator,
    /// `,` separating array literal elements.
    Comma,
    /// `|` chaining pipeline commands.
    Pipe,
    /// `(` opening a parenthesized sub-expression.
    LeftParen,
    /// `)` closing a parenthesized sub-expression.
    RightParen,
    /// Newline or `;` ending a statement.
    StatementTerminator,
}

impl Terminal {
    /// All declared terminals, in lexicon order.
    pub const ALL: &'static [Self] = &[
        Self::Literal,
        Self::Bareword,
        Self::Variable,
        Self::LogicalOperator,
        Self::BitwiseOperator,
        Self::ComparisonOperator,
        Self::AdditiveOperator,
        Self::MultiplicativeOperator,
        Self::FormatOperator,
        Self::UnaryOperator,
        Self::Comma,
        Self::Pipe,
        Self::LeftParen,
        Self::RightParen,
        Self::StatementTerminator,
    ];

    /// Returns the stable name of the terminal.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Bareword => "bareword",
            Self::Variable => "variable",
            Self::LogicalOperator => "logical_operator",
            Self::BitwiseOperator => "bitwise_operator",
            Self::ComparisonOperator => "comparison_operator",
            Self::AdditiveOperator => "additive_operator",
            Self::MultiplicativeOperator => "multiplicative_operator",
            Self::FormatOperator => "format_operator",
            Self::UnaryOperator => "unary_operator",
            Self::Comma => "comma",
            Self::Pipe => "pipe",
            Self::LeftParen => "left_paren",
            Self::RightParen => "right_paren",
            Self::StatementTerminator => "statement_terminator",
        }
    }

    /// Returns a human-readable description of the terminal's recognition
    /// pattern.
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Literal => "\"...\" | '...' | [0-9]+ | 0x[0-9a-f]+ | [0-9]+.[0-9]+",
            Self::Bareword => "[A-Za-z_][A-Za-z0-9_.-]*",
            Self::Variable => "$[A-Za-z0-9_]+",
            Self::LogicalOperator => "-and | -or | -xor",
            Self::BitwiseOperator => "-band | -bor | -bxor",
            Self::ComparisonOperator => "-eq | -ne | -lt | -le | -gt | -ge | ...",
            Self::AdditiveOperator => "+ | -",
            Self::MultiplicativeOperator => "* | / | %",
            Self::FormatOperator => "-f",
            Self::UnaryOperator => "-not | -bnot | ! | + | -",
            Self::Comma => ",",
            Self::Pipe => "|",
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::StatementTerminator => "\\n | ;",
        }
    }

    /// Returns true if the given operator token text belongs to this operator
    /// category. Matching is case-insensitive; case-sensitive rejection of
    /// operator names happens at the lexical level.
    pub fn matches_operator(self, text: &str) -> bool {
        match self {
            Self::LogicalOperator => matches_any(text, LOGICAL_OPERATORS),
            Self::BitwiseOperator => matches_any(text, BITWISE_OPERATORS),
            Self::ComparisonOperator => matches_comparison(text),
            Self::AdditiveOperator => matches!(text, "+" | "-"),
            Self::MultiplicativeOperator => matches!(text, "*" | "/" | "%"),
            Self::FormatOperator => matches_any(text, FORMAT_OPERATORS),
            Self::UnaryOperator => {
                matches!(text, "!" | "+" | "-") || matches_any(text, UNARY_DASH_OPERATORS)
            }
            Self::Pipe => text == "|",
            Self::Comma => text == ",",
            Self::LeftParen => text == "(",
            Self::RightParen => text == ")",
            Self::StatementTerminator => matches!(text, "\n" | ";"),
            Self::Literal | Self::Bareword | Self::Variable => false,
        }
    }
}

impl Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const LOGICAL_OPERATORS: &[&str] = &["-and", "-or", "-xor"];
const BITWISE_OPERATORS: &[&str] = &["-band", "-bor", "-bxor"];
const COMPARISON_OPERATORS: &[&str] = &[
    "-eq",
    "-ne",
    "-lt",
    "-le",
    "-gt",
    "-ge",
    "-like",
    "-notlike",
    "-match",
    "-notmatch",
    "-contains",
    "-notcontains",
    "-replace",
];
const FORMAT_OPERATORS: &[&str] = &["-f"];
const UNARY_DASH_OPERATORS: &[&str] = &["-not", "-bnot"];

fn matches_any(text: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|c| text.eq_ignore_ascii_case(c))
}

// Comparison operators accept -i (explicitly case-insensitive) and -c
// (case-sensitive) prefixed variants: -ieq, -ceq, and so on.
fn matches_comparison(text: &str) -> bool {
    if matches_any(text, COMPARISON_OPERATORS) {
        return true;
    }

    let lower = text.to_ascii_lowercase();
    if let Some(rest) = lower
        .strip_prefix("-i")
        .or_else(|| lower.strip_prefix("-c"))
    {
        let mut candidate = String::from("-");
        candidate.push_str(rest);
        return COMPARISON_OPERATORS.contains(&candidate.as_str());
    }

    false
}

/// Returns true if a dash-word lexes as an operator rather than a
/// parameter-style bareword.
pub(crate) fn is_dash_operator(text: &str, case_insensitive: bool) -> bool {
    let lower;
    let text = if case_insensitive {
        lower = text.to_ascii_lowercase();
        lower.as_str()
    } else {
        text
    };

    LOGICAL_OPERATORS.contains(&text)
        || BITWISE_OPERATORS.contains(&text)
        || FORMAT_OPERATORS.contains(&text)
        || UNARY_DASH_OPERATORS.contains(&text)
        || COMPARISON_OPERATORS.contains(&text)
        || matches_comparison_exact(text)
}

fn matches_comparison_exact(text: &str) -> bool {
    if let Some(rest) = text.strip_prefix("-i").or_else(|| text.strip_prefix("-c")) {
        let mut candidate = String::from("-");
        candidate.push_str(rest);
        return COMPARISON_OPERATORS.contains(&candidate.as_str());
    }
    false
}

/// A syntactic non-terminal of the grammar.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Rule {
    /// The grammar root: one interactive submission or script file.
    InteractiveInput,
    /// A script block wrapping a script block body.
    ScriptBlock,
    /// The body of a script block.
    ScriptBlockBody,
    /// A non-empty, ordered sequence of statements.
    StatementList,
    /// A single statement: a pipeline or an expression.
    Statement,
    /// One or more commands chained left-to-right via `|`.
    Pipeline,
    /// A command invocation: a command name plus zero or more arguments.
    Command,
    /// The bareword naming an invocable command.
    CommandName,
    /// One argument to a command; an open extension point.
    CommandArgument,
    /// The loosest expression level.
    Expression,
    /// `-and` / `-or` / `-xor` level.
    LogicalExpression,
    /// `-band` / `-bor` / `-bxor` level.
    BitwiseExpression,
    /// `-eq` / `-ne` / `-lt` / ... level.
    ComparisonExpression,
    /// `+` / `-` level.
    AdditiveExpression,
    /// `*` / `/` / `%` level.
    MultiplicativeExpression,
    /// `-f` level.
    FormatExpression,
    /// Comma-separated array literal level.
    ArrayLiteralExpression,
    /// Prefix operator level.
    UnaryExpression,
    /// Values and parenthesized re-entry into the chain.
    PrimaryExpression,
    /// A literal or variable value.
    Value,
}

impl Rule {
    /// All declared rules, root first.
    pub const ALL: &'static [Self] = &[
        Self::InteractiveInput,
        Self::ScriptBlock,
        Self::ScriptBlockBody,
        Self::StatementList,
        Self::Statement,
        Self::Pipeline,
        Self::Command,
        Self::CommandName,
        Self::CommandArgument,
        Self::Expression,
        Self::LogicalExpression,
        Self::BitwiseExpression,
        Self::ComparisonExpression,
        Self::AdditiveExpression,
        Self::MultiplicativeExpression,
        Self::FormatExpression,
        Self::ArrayLiteralExpression,
        Self::UnaryExpression,
        Self::PrimaryExpression,
        Self::Value,
    ];

    /// Returns the stable name of the rule.
    pub const fn name(self) -> &'static str {
        match self {
            Self::InteractiveInput => "interactive_input",
            Self::ScriptBlock => "script_block",
            Self::ScriptBlockBody => "script_block_body",
            Self::StatementList => "statement_list",
            Self::Statement => "statement",
            Self::Pipeline => "pipeline",
            Self::Command => "command",
            Self::CommandName => "command_name",
            Self::CommandArgument => "command_argument",
            Self::Expression => "expression",
            Self::LogicalExpression => "logical_expression",
            Self::BitwiseExpression => "bitwise_expression",
            Self::ComparisonExpression => "comparison_expression",
            Self::AdditiveExpression => "additive_expression",
            Self::MultiplicativeExpression => "multiplicative_expression",
            Self::FormatExpression => "format_expression",
            Self::ArrayLiteralExpression => "array_literal_expression",
            Self::UnaryExpression => "unary_expression",
            Self::PrimaryExpression => "primary_expression",
            Self::Value => "value",
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A reference to a rule or terminal within a production.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Symbol {
    /// A non-terminal reference.
    Rule(Rule),
    /// A terminal reference.
    Terminal(Terminal),
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rule(r) => r.fmt(f),
            Self::Terminal(t) => t.fmt(f),
        }
    }
}

/// One alternative expansion of a rule into a sequence of symbols.
///
/// List-shaped constructs (statement lists, pipelines, argument lists, array
/// literals) are expressed with left recursion here; the tree shaper flattens
/// or folds them per its own policy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Production {
    /// The ordered symbols this production expands to.
    pub symbols: Vec<Symbol>,
}

/// A rule together with its alternative productions.
#[derive(Clone, Debug)]
pub struct RuleDef {
    /// The rule being defined.
    pub rule: Rule,
    /// The rule's alternative productions; never empty.
    pub productions: Vec<Production>,
}

/// The precedence chain levels that carry a binary form, loosest first:
/// (rule, its operator terminal, the next-tighter rule).
pub const PRECEDENCE_CHAIN: &[(Rule, Terminal, Rule)] = &[
    (
        Rule::LogicalExpression,
        Terminal::LogicalOperator,
        Rule::BitwiseExpression,
    ),
    (
        Rule::BitwiseExpression,
        Terminal::BitwiseOperator,
        Rule::ComparisonExpression,
    ),
    (
        Rule::ComparisonExpression,
        Terminal::ComparisonOperator,
        Rule::AdditiveExpression,
    ),
    (
        Rule::AdditiveExpression,
        Terminal::AdditiveOperator,
        Rule::MultiplicativeExpression,
    ),
    (
        Rule::MultiplicativeExpression,
        Terminal::MultiplicativeOperator,
        Rule::FormatExpression,
    ),
    (
        Rule::FormatExpression,
        Terminal::FormatOperator,
        Rule::ArrayLiteralExpression,
    ),
];

/// The grammar registry: every declared rule and terminal, keyed by name,
/// with a distinguished root. Built once; immutable thereafter.
#[derive(Debug)]
pub struct Grammar {
    rules: Vec<RuleDef>,
    index: HashMap<&'static str, usize>,
}

impl Grammar {
    /// Builds and validates the grammar. Construction is pure and
    /// deterministic; validation failures are programming defects in the
    /// grammar definition itself and abort via assertion.
    pub fn new() -> Self {
        let rules = declare_rules();

        let mut index = HashMap::new();
        for (i, def) in rules.iter().enumerate() {
            let previous = index.insert(def.rule.name(), i);
            assert!(previous.is_none(), "duplicate rule '{}'", def.rule);
        }

        let grammar = Self { rules, index };
        grammar.validate();
        grammar
    }

    /// Returns the distinguished root rule.
    pub fn root(&self) -> &RuleDef {
        self.rule(Rule::InteractiveInput.name())
            .unwrap_or_else(|| unreachable!("root rule is always registered"))
    }

    /// Looks up a rule definition by name.
    pub fn rule(&self, name: &str) -> Option<&RuleDef> {
        self.index.get(name).map(|i| &self.rules[*i])
    }

    /// Returns all rule definitions, root first.
    pub fn rules(&self) -> impl Iterator<Item = &RuleDef> {
        self.rules.iter()
    }

    /// Returns all declared terminals.
    pub fn terminals(&self) -> &'static [Terminal] {
        Terminal::ALL
    }

    fn validate(&self) {
        assert_eq!(
            self.rules.len(),
            Rule::ALL.len(),
            "registry entries must correspond one-to-one with the declared rule set"
        );
        for rule in Rule::ALL {
            assert!(
                self.rule(rule.name()).is_some(),
                "rule '{rule}' is not registered"
            );
        }

        for def in &self.rules {
            assert!(
                !def.productions.is_empty(),
                "rule '{}' has no productions",
                def.rule
            );
            for production in &def.productions {
                assert!(
                    !production.symbols.is_empty(),
                    "rule '{}' has an empty production",
                    def.rule
                );
            }
        }

        self.assert_all_reachable();
        self.assert_chain_well_formed();
    }

    fn assert_all_reachable(&self) {
        let mut reached = HashSet::new();
        let mut pending = vec![Rule::InteractiveInput];

        while let Some(rule) = pending.pop() {
            if !reached.insert(rule) {
                continue;
            }
            if let Some(def) = self.rule(rule.name()) {
                for production in &def.productions {
                    for symbol in &production.symbols {
                        if let Symbol::Rule(referenced) = symbol {
                            pending.push(*referenced);
                        }
                    }
                }
            }
        }

        for rule in Rule::ALL {
            assert!(
                reached.contains(rule),
                "rule '{rule}' is not reachable from the root"
            );
        }
    }

    fn assert_chain_well_formed(&self) {
        // A production consisting solely of a self-reference is a trivial
        // cycle.
        for def in &self.rules {
            for production in &def.productions {
                assert!(
                    production.symbols != [Symbol::Rule(def.rule)],
                    "rule '{}' has a trivial self-cycle",
                    def.rule
                );
            }
        }

        for (rule, operator, next) in PRECEDENCE_CHAIN {
            let def = self
                .rule(rule.name())
                .unwrap_or_else(|| unreachable!("chain rules are always registered"));
            let expected = vec![
                Production {
                    symbols: vec![Symbol::Rule(*next)],
                },
                Production {
                    symbols: vec![
                        Symbol::Rule(*rule),
                        Symbol::Terminal(*operator),
                        Symbol::Rule(*next),
                    ],
                },
            ];
            assert_eq!(
                def.productions, expected,
                "chain rule '{rule}' must have exactly a pass-through and a binary form"
            );
        }
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

fn def(rule: Rule, productions: &[&[Symbol]]) -> RuleDef {
    RuleDef {
        rule,
        productions: productions
            .iter()
            .map(|symbols| Production {
                symbols: symbols.to_vec(),
            })
            .collect(),
    }
}

fn declare_rules() -> Vec<RuleDef> {
    use Rule as R;
    use Symbol::Rule as r;
    use Symbol::Terminal as t;
    use Terminal as T;

    let mut rules = vec![
        def(R::InteractiveInput, &[&[r(R::ScriptBlock)]]),
        def(R::ScriptBlock, &[&[r(R::ScriptBlockBody)]]),
        def(R::ScriptBlockBody, &[&[r(R::StatementList)]]),
        def(
            R::StatementList,
            &[
                &[r(R::Statement)],
                &[
                    r(R::StatementList),
                    t(T::StatementTerminator),
                    r(R::Statement),
                ],
            ],
        ),
        def(R::Statement, &[&[r(R::Pipeline)], &[r(R::Expression)]]),
        def(
            R::Pipeline,
            &[
                &[r(R::Command)],
                &[r(R::Pipeline), t(T::Pipe), r(R::Command)],
            ],
        ),
        def(
            R::Command,
            &[
                &[r(R::CommandName)],
                &[r(R::Command), r(R::CommandArgument)],
            ],
        ),
        def(R::CommandName, &[&[t(T::Bareword)]]),
        def(
            R::CommandArgument,
            &[
                &[t(T::Literal)],
                &[t(T::Variable)],
                &[t(T::Bareword)],
                &[t(T::LeftParen), r(R::Pipeline), t(T::RightParen)],
                &[t(T::LeftParen), r(R::Expression), t(T::RightParen)],
            ],
        ),
        def(R::Expression, &[&[r(R::LogicalExpression)]]),
    ];

    for (rule, operator, next) in PRECEDENCE_CHAIN {
        rules.push(def(
            *rule,
            &[&[r(*next)], &[r(*rule), t(*operator), r(*next)]],
        ));
    }

    rules.extend([
        def(
            R::ArrayLiteralExpression,
            &[
                &[r(R::UnaryExpression)],
                &[
                    r(R::ArrayLiteralExpression),
                    t(T::Comma),
                    r(R::UnaryExpression),
                ],
            ],
        ),
        def(
            R::UnaryExpression,
            &[
                &[r(R::PrimaryExpression)],
                &[t(T::UnaryOperator), r(R::UnaryExpression)],
            ],
        ),
        def(
            R::PrimaryExpression,
            &[
                &[r(R::Value)],
                &[t(T::LeftParen), r(R::Pipeline), t(T::RightParen)],
                &[t(T::LeftParen), r(R::Expression), t(T::RightParen)],
            ],
        ),
        def(R::Value, &[&[t(T::Literal)], &[t(T::Variable)]]),
    ]);

    rules
}
