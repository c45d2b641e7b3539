//! Implements a tokenizer and grammar for a PowerShell-like shell scripting
//! language: literals, commands, pipelines, binary expressions, statement
//! lists, and script blocks, parsed into a deterministically shaped concrete
//! parse tree.

pub mod grammar;
pub mod tree;

mod parser;
mod source;
mod tokenizer;

pub use parser::{parse_str, parse_tokens, Parser, ParserOptions};
pub use source::{SourcePosition, SourceSpan};
pub use tokenizer::{tokenize_str, LiteralValue, Token, TokenizerError, TokenizerOptions};
