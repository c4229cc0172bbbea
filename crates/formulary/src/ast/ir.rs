//! Install IR - what the translator produces
//!
//! A small, ordered, language-agnostic instruction set. Nothing here refers
//! back to Ruby: names are plain strings, operators are kept as their source
//! tokens, and predicate/bang method names are already mangled.

use serde::{Deserialize, Serialize};

use super::CondKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Receiver-less call with arguments: `system "make", "install"`
    Command { name: String, args: Vec<Expression> },

    /// `if`/`unless`, block or modifier form; `elsif` nests in `else_branch`
    Conditional {
        kind: CondKind,
        cond: Expression,
        then_branch: Vec<Instruction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_branch: Option<Vec<Instruction>>,
    },

    /// A call that owns a block: `cd "src" do ... end`
    Block {
        head: Box<Instruction>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        params: Vec<String>,
        body: Vec<Instruction>,
    },

    /// Any other expression evaluated for effect: `bin.install "jq"`
    Expr { expr: Expression },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expression {
    StringLiteral {
        parts: Vec<StringPart>,
    },

    /// Local variable, constant, instance variable, or keyword value
    VarRef {
        name: String,
    },

    /// Receiver-less call with no arguments: `prefix`
    BareCall {
        name: String,
    },

    /// Receiver-less call with arguments in expression position
    Call {
        name: String,
        args: Vec<Expression>,
    },

    MethodCall {
        receiver: Box<Expression>,
        method: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Expression>,
    },

    Binary {
        op: String,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    Unary {
        op: String,
        operand: Box<Expression>,
    },

    /// Array literal; elements are not carried
    ArrayLiteral,

    HashLiteral {
        entries: Vec<HashEntry>,
    },

    Index {
        base: Box<Expression>,
        subscript: Box<Expression>,
    },

    SymbolLiteral {
        name: String,
    },

    IntLiteral {
        value: i64,
    },

    /// `*value` in an argument list
    Splat {
        value: Box<Expression>,
    },

    Assign {
        target: Box<Expression>,
        value: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashEntry {
    pub key: Expression,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StringPart {
    Text { value: String },
    /// Substitution point for a bare variable reference, rendered `$name`
    Var { name: String },
    Embedded { expr: Expression },
}

impl Expression {
    pub fn string(text: impl Into<String>) -> Self {
        Expression::StringLiteral {
            parts: vec![StringPart::Text { value: text.into() }],
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expression::VarRef { name: name.into() }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Expression::BareCall { name: name.into() }
    }

    pub fn method(self, method: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::MethodCall {
            receiver: Box::new(self),
            method: method.into(),
            args,
        }
    }
}

impl Instruction {
    pub fn command(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Instruction::Command {
            name: name.into(),
            args,
        }
    }
}
