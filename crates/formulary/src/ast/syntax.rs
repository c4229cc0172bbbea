//! Syntax tree - what the parser produces
//!
//! This mirrors the recipe source closely: one node per Ruby construct the
//! grammar accepts, with no interpretation applied. Statements carry spans so
//! later passes can point back at the source.

use super::{BinOp, CondKind, Span, UnaryOp};

/// A parsed recipe file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement: commands, calls, assignments
    Expr(Expr),

    /// Block conditional: `if c ... elsif ... else ... end`, `unless c ... end`
    If(IfStmt),

    /// Statement modifier: `stmt if cond`, `stmt unless cond`
    Modifier {
        kind: CondKind,
        cond: Expr,
        body: Box<Stmt>,
    },

    /// `while`/`until` loops, block or modifier form
    Loop {
        kind: LoopKind,
        cond: Expr,
        body: Vec<Stmt>,
    },

    /// `for a, b in items ... end`
    For {
        vars: Vec<String>,
        iter: Expr,
        body: Vec<Stmt>,
    },

    /// `case subject when ... else ... end`
    Case {
        subject: Option<Expr>,
        whens: Vec<WhenClause>,
        else_body: Option<Vec<Stmt>>,
    },

    /// `begin ... rescue ... ensure ... end`
    Begin {
        body: Vec<Stmt>,
        rescues: Vec<RescueClause>,
        ensure: Option<Vec<Stmt>>,
    },

    /// `stmt rescue fallback`
    RescueModifier { body: Box<Stmt>, fallback: Expr },

    /// `return`, `break`, `next` with an optional value
    Jump { kind: JumpKind, value: Option<Expr> },

    Def(Def),

    Class(ClassDecl),

    Module { name: String, body: Vec<Stmt> },
}

impl StmtKind {
    /// Stable node-kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            StmtKind::Expr(expr) => expr.kind_name(),
            StmtKind::If(stmt) => stmt.kind.keyword(),
            StmtKind::Modifier {
                kind: CondKind::If, ..
            } => "if_modifier",
            StmtKind::Modifier {
                kind: CondKind::Unless,
                ..
            } => "unless_modifier",
            StmtKind::Loop {
                kind: LoopKind::While,
                ..
            } => "while",
            StmtKind::Loop {
                kind: LoopKind::Until,
                ..
            } => "until",
            StmtKind::For { .. } => "for",
            StmtKind::Case { .. } => "case",
            StmtKind::Begin { .. } => "begin",
            StmtKind::RescueModifier { .. } => "rescue_modifier",
            StmtKind::Jump { kind, .. } => kind.keyword(),
            StmtKind::Def(_) => "def",
            StmtKind::Class(_) => "class",
            StmtKind::Module { .. } => "module",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub kind: CondKind,
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    pub else_branch: Option<ElseBranch>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    /// `elsif cond ...`, carrying its own span for diagnostics
    Elsif { stmt: Box<IfStmt>, span: Span },
    Else(Vec<Stmt>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    Until,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Return,
    Break,
    Next,
}

impl JumpKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JumpKind::Return => "return",
            JumpKind::Break => "break",
            JumpKind::Next => "next",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub patterns: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RescueClause {
    pub exceptions: Vec<Expr>,
    pub binding: Option<String>,
    pub body: Vec<Stmt>,
}

/// Method definition: `def name(params) ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub name: String,
    /// `def self.name`
    pub singleton: bool,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// Class definition: `class Name < Superclass ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// Constant path as written, e.g. `Jq` or `Homebrew::Jq`
    pub name: String,
    pub superclass: Option<Expr>,
    pub body: Vec<Stmt>,
}

impl ClassDecl {
    /// Last segment of the constant path.
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String literal, possibly interpolated: `"--prefix=#{prefix}"`
    Str(Vec<StrPart>),

    /// `:name`
    Sym(String),

    Int(i64),

    Float(f64),

    /// `nil`, `true`, `false`, `self`
    Pseudo(Pseudo),

    /// Bare identifier: a local variable or a receiver-less, argument-less call
    Ident(String),

    /// `@name`
    IVar(String),

    /// `Name`
    Const(String),

    /// `Base::Name`
    ScopedConst(Box<Expr>, String),

    /// `[a, b]`
    Array(Vec<Expr>),

    /// `%w[a b]`
    WordArray(Vec<String>),

    /// `%i[a b]`
    SymbolArray(Vec<String>),

    /// `{ key => value, label: value }`
    Hash(Vec<(Expr, Expr)>),

    /// Any call with a name: commands, method calls, block calls
    Call(Call),

    /// `base[args]`
    Index(Box<Expr>, Vec<Arg>),

    /// `a + b`, `a && b`, `a and b`
    Binary(Box<Expr>, BinOp, Box<Expr>),

    /// `!a`, `-a`, `not a`
    Unary(UnaryOp, Box<Expr>),

    /// `target = value`
    Assign(Box<Expr>, Box<Expr>),

    /// `target += value`, `target ||= value`; operator token without the `=`
    OpAssign(Box<Expr>, String, Box<Expr>),

    /// `cond ? a : b`
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),

    /// `a..b`, `a...b`
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        exclusive: bool,
    },

    /// `(expr)`
    Paren(Box<Expr>),

    /// `/pattern/flags`, `%r{pattern}`
    Regex { pattern: String, flags: String },

    /// `$stdout`
    Global(String),

    /// `-> (x) { ... }`
    Lambda(Block),

    /// `` `cmd` ``, `%x(cmd)`
    Shell(Vec<StrPart>),
}

impl Expr {
    /// Stable node-kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Str(_) => "string",
            Expr::Sym(_) => "symbol",
            Expr::Int(_) => "integer",
            Expr::Float(_) => "float",
            Expr::Pseudo(_) => "keyword",
            Expr::Ident(_) => "identifier",
            Expr::IVar(_) => "instance_variable",
            Expr::Const(_) => "constant",
            Expr::ScopedConst(..) => "scoped_constant",
            Expr::Array(_) => "array",
            Expr::WordArray(_) => "word_array",
            Expr::SymbolArray(_) => "symbol_array",
            Expr::Hash(_) => "hash",
            Expr::Call(call) if call.block.is_some() => "block_call",
            Expr::Call(call) if call.receiver.is_some() => "method_call",
            Expr::Call(_) => "command",
            Expr::Index(..) => "index",
            Expr::Binary(..) => "binary",
            Expr::Unary(..) => "unary",
            Expr::Assign(..) => "assign",
            Expr::OpAssign(..) => "op_assign",
            Expr::Ternary(..) => "ternary",
            Expr::Range { .. } => "range",
            Expr::Paren(_) => "paren",
            Expr::Regex { .. } => "regex",
            Expr::Global(_) => "global_variable",
            Expr::Lambda(_) => "lambda",
            Expr::Shell(_) => "shell_command",
        }
    }

    pub fn binop(self, op: BinOp, rhs: Expr) -> Self {
        Expr::Binary(Box::new(self), op, Box::new(rhs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    Nil,
    True,
    False,
    SelfRef,
}

impl Pseudo {
    pub fn keyword(self) -> &'static str {
        match self {
            Pseudo::Nil => "nil",
            Pseudo::True => "true",
            Pseudo::False => "false",
            Pseudo::SelfRef => "self",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Lit(String),
    Interp(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub args: Vec<Arg>,
    pub block: Option<Block>,
    /// Arguments were written inside parentheses
    pub parens: bool,
    /// `recv&.name`
    pub safe_nav: bool,
}

impl Call {
    pub fn new(receiver: Option<Expr>, name: impl Into<String>) -> Self {
        Call {
            receiver: receiver.map(Box::new),
            name: name.into(),
            args: Vec::new(),
            block: None,
            parens: false,
            safe_nav: false,
        }
    }

    pub fn with_args(mut self, args: Vec<Arg>) -> Self {
        self.args = args;
        self
    }

    /// A call that could still take space-separated command arguments.
    pub fn accepts_command_args(&self) -> bool {
        self.args.is_empty() && self.block.is_none() && !self.parens
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    /// `key => value` or `label: value`
    Pair(Expr, Expr),
    /// `*items`
    Splat(Expr),
    /// `**opts`
    DoubleSplat(Expr),
    /// `&block`
    BlockPass(Expr),
}

impl Arg {
    pub fn pos(expr: Expr) -> Self {
        Arg::Positional(expr)
    }
}

/// `do |params| ... end` or `{ |params| ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}
