//! AST types for recipe files
//!
//! Split into:
//! - `syntax`: What the parser produces (Ruby-subset syntax tree)
//! - `ir`: What the translator produces (portable install instructions)

pub mod ir;
pub mod syntax;

use serde::{Deserialize, Serialize};

// Shared types used by both the syntax tree and the IR

/// Byte range of a node in the normalized recipe source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// `if` vs `unless`, shared by block conditionals, modifiers, and the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CondKind {
    If,
    Unless,
}

impl CondKind {
    pub fn keyword(self) -> &'static str {
        match self {
            CondKind::If => "if",
            CondKind::Unless => "unless",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,

    // Bitwise / shovel
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,

    // Comparison
    Lt,
    Le,
    Gt,
    Ge,
    Cmp,
    Eq,
    CaseEq,
    Ne,
    Match,
    NotMatch,

    // Logical
    AndAnd,
    OrOr,
    And,
    Or,
}

impl BinOp {
    /// Source token, exactly as written in the recipe.
    pub fn token(self) -> &'static str {
        match self {
            BinOp::Pow => "**",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Cmp => "<=>",
            BinOp::Eq => "==",
            BinOp::CaseEq => "===",
            BinOp::Ne => "!=",
            BinOp::Match => "=~",
            BinOp::NotMatch => "!~",
            BinOp::AndAnd => "&&",
            BinOp::OrOr => "||",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    /// Keyword form: `not x`
    KwNot,
}

impl UnaryOp {
    pub fn token(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::BitNot => "~",
            UnaryOp::KwNot => "not",
        }
    }
}
