//! Expression grammar
//!
//! Precedence, loosest first:
//! - `and`, `or` (statement level), `not`
//! - commands: `name arg, arg` without parentheses
//! - assignment `=`, `op=` (right associative)
//! - ternary `?:`
//! - range `..`, `...`
//! - `||`, `&&`
//! - equality `<=> == === != =~ !~`, comparison `< <= > >=`
//! - `|` `^`, `&`, `<<` `>>`, `+` `-`, `*` `/` `%`
//! - unary minus, `**` (right associative), `!` `~`
//! - postfix: `.method`, `&.method`, `::Name`, `[index]`
//!
//! Ruby decides between `foo -1` (command with a negative argument) and
//! `foo - 1` (subtraction) by whitespace; [`binary_operator`] and
//! [`command_args_ahead`] encode that rule.

use winnow::combinator::{alt, delimited, not, opt, peek, preceded, separated, terminated};
use winnow::prelude::*;
use winnow::token::{any, literal, one_of, take_till, take_while};

use super::lexical::{
    Input, PResult, at_arg_stop_word, at_keyword, backtrack, commit, constant_name, fail_with,
    identifier, is_ident_char, keyword, label, method_name, nested, number, rest, sp, word, ws,
};
use super::stmt;
use crate::ast::syntax::{Arg, Block, Call, Expr, Pseudo, StrPart};
use crate::ast::{BinOp, UnaryOp};

// ============ Statement-level expressions ============

/// Expression usable as a statement or condition: `and`/`or`/`not` over
/// commands and operator expressions. `allow_do` is false in loop and
/// conditional headers, where `do` belongs to the construct.
pub(super) fn statement_expr(input: &mut Input<'_>, allow_do: bool) -> PResult<Expr> {
    let mut left = not_expr(input, allow_do)?;
    loop {
        let checkpoint = input.checkpoint();
        sp(input)?;
        let op = opt(alt((
            keyword("and").value(BinOp::And),
            keyword("or").value(BinOp::Or),
        )))
        .parse_next(input)?;
        let Some(op) = op else {
            input.reset(&checkpoint);
            break;
        };
        ws(input)?;
        let right = commit(not_expr(input, allow_do))?;
        left = left.binop(op, right);
    }
    Ok(left)
}

fn not_expr(input: &mut Input<'_>, allow_do: bool) -> PResult<Expr> {
    if opt(terminated(keyword("not"), sp)).parse_next(input)?.is_some() {
        let operand = commit(nested(input, |input| not_expr(input, allow_do)))?;
        return Ok(Expr::Unary(UnaryOp::KwNot, Box::new(operand)));
    }
    command_or_arg(input, allow_do)
}

/// `allow_do = true` form of [`statement_expr`], for use as a plain parser.
pub(super) fn full_expr(input: &mut Input<'_>) -> PResult<Expr> {
    statement_expr(input, true)
}

/// `allow_do = false` form of [`statement_expr`].
pub(super) fn header_expr(input: &mut Input<'_>) -> PResult<Expr> {
    statement_expr(input, false)
}

// ============ Commands ============

fn command_or_arg(input: &mut Input<'_>, allow_do: bool) -> PResult<Expr> {
    let head = arg(input)?;
    let expr = extend_command(input, head)?;
    if allow_do {
        attach_do_block(input, expr)
    } else {
        Ok(expr)
    }
}

/// Turn `name` or `recv.name` into a command when arguments follow after a
/// space. Assignments extend their right-hand side: `x = foo "a"`.
fn extend_command(input: &mut Input<'_>, expr: Expr) -> PResult<Expr> {
    match expr {
        Expr::Ident(name) if command_args_ahead(input) => {
            let args = command_args(input)?;
            Ok(Expr::Call(Call::new(None, name).with_args(args)))
        }
        Expr::Call(call) if call.accepts_command_args() && command_args_ahead(input) => {
            let args = command_args(input)?;
            Ok(Expr::Call(Call { args, ..call }))
        }
        Expr::Assign(target, value) => {
            let value = extend_command(input, *value)?;
            Ok(Expr::Assign(target, Box::new(value)))
        }
        other => Ok(other),
    }
}

/// Peek: at least one blank, then something that can only start an argument.
fn command_args_ahead(input: &Input<'_>) -> bool {
    let text = rest(input);
    let trimmed = text.trim_start_matches([' ', '\t']);
    if trimmed.len() == text.len() {
        return false;
    }
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let second = chars.next();
    match first {
        '"' | '\'' | '@' | '[' | '(' | '$' | '`' => true,
        ':' => second.is_some_and(|c| c == '"' || c.is_ascii_alphabetic() || c == '_'),
        '?' => {
            second.is_some_and(|c| !c.is_whitespace()) && !chars.next().is_some_and(is_ident_char)
        }
        '/' => second.is_some_and(|c| !c.is_whitespace() && c != '='),
        '-' if trimmed.starts_with("->") => true,
        '-' | '*' | '&' | '!' | '+' => {
            second.is_some_and(|c| !c.is_whitespace() && c != '=' && c != '>')
                && !trimmed.starts_with("&&")
        }
        '%' => second.is_some_and(|c| {
            matches!(c, 'w' | 'i' | 'W' | 'I' | 'q' | 'Q' | 'r' | 'x' | 's' | '(' | '[' | '{')
        }),
        c if c.is_ascii_digit() => true,
        c if c.is_ascii_alphabetic() || c == '_' => !at_arg_stop_word(trimmed),
        _ => false,
    }
}

/// Space-separated arguments: `"a", "b" => :build, key: value`.
fn command_args(input: &mut Input<'_>) -> PResult<Vec<Arg>> {
    sp(input)?;
    let mut args = vec![commit(call_arg(input))?];
    loop {
        let checkpoint = input.checkpoint();
        sp(input)?;
        if opt(',').parse_next(input)?.is_none() {
            input.reset(&checkpoint);
            break;
        }
        ws(input)?;
        args.push(commit(call_arg(input))?);
    }
    Ok(args)
}

/// Attach a trailing `do ... end` to the call it follows.
fn attach_do_block(input: &mut Input<'_>, expr: Expr) -> PResult<Expr> {
    let checkpoint = input.checkpoint();
    sp(input)?;
    if !at_keyword(input, "do") {
        input.reset(&checkpoint);
        return Ok(expr);
    }
    match expr {
        Expr::Ident(name) => {
            let block = do_block(input)?;
            Ok(Expr::Call(Call {
                block: Some(block),
                ..Call::new(None, name)
            }))
        }
        Expr::Call(mut call) if call.block.is_none() => {
            call.block = Some(do_block(input)?);
            Ok(Expr::Call(call))
        }
        Expr::Assign(target, value) => {
            input.reset(&checkpoint);
            let value = attach_do_block(input, *value)?;
            Ok(Expr::Assign(target, Box::new(value)))
        }
        // `do` with nothing to attach to
        _ => commit(backtrack()),
    }
}

// ============ Arguments ============

fn call_arg(input: &mut Input<'_>) -> PResult<Arg> {
    if opt("**").parse_next(input)?.is_some() {
        return commit(arg(input)).map(Arg::DoubleSplat);
    }
    if opt('*').parse_next(input)?.is_some() {
        return commit(arg(input)).map(Arg::Splat);
    }
    if opt(terminated('&', not('&'))).parse_next(input)?.is_some() {
        return commit(arg(input)).map(Arg::BlockPass);
    }
    if let Some(key) = opt(label).parse_next(input)? {
        ws(input)?;
        let value = commit(arg(input))?;
        return Ok(Arg::Pair(Expr::Sym(key), value));
    }

    let value = arg(input)?;
    let checkpoint = input.checkpoint();
    sp(input)?;
    if opt("=>").parse_next(input)?.is_some() {
        ws(input)?;
        let mapped = commit(arg(input))?;
        return Ok(Arg::Pair(value, mapped));
    }
    input.reset(&checkpoint);
    Ok(Arg::Positional(value))
}

/// `( args )`, trailing comma and newlines allowed.
fn paren_args(input: &mut Input<'_>) -> PResult<Vec<Arg>> {
    delimited_args(input, '(', ')')
}

fn bracket_args(input: &mut Input<'_>) -> PResult<Vec<Arg>> {
    delimited_args(input, '[', ']')
}

fn delimited_args(input: &mut Input<'_>, open: char, close: char) -> PResult<Vec<Arg>> {
    literal(open).parse_next(input)?;
    ws(input)?;
    let mut args = Vec::new();
    loop {
        if opt(literal(close)).parse_next(input)?.is_some() {
            return Ok(args);
        }
        args.push(commit(call_arg(input))?);
        ws(input)?;
        if opt(',').parse_next(input)?.is_some() {
            ws(input)?;
        } else {
            commit(literal(close).parse_next(input))?;
            return Ok(args);
        }
    }
}

// ============ Assignment, ternary, range ============

/// Single argument expression: everything except commands and `and`/`or`.
pub(super) fn arg(input: &mut Input<'_>) -> PResult<Expr> {
    let left = ternary(input)?;
    if !is_assignable(&left) {
        return Ok(left);
    }
    let checkpoint = input.checkpoint();
    sp(input)?;
    match opt(assign_op).parse_next(input)? {
        Some(op) => {
            ws(input)?;
            let value = commit(nested(input, arg))?;
            Ok(match op {
                None => Expr::Assign(Box::new(left), Box::new(value)),
                Some(op) => Expr::OpAssign(Box::new(left), op.to_string(), Box::new(value)),
            })
        }
        None => {
            input.reset(&checkpoint);
            Ok(left)
        }
    }
}

fn is_assignable(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) | Expr::IVar(_) | Expr::Const(_) | Expr::ScopedConst(..) | Expr::Index(..) => {
            true
        }
        Expr::Call(call) => call.receiver.is_some() && call.accepts_command_args(),
        _ => false,
    }
}

/// `=` gives `None`; `+=` and friends give the operator without `=`.
fn assign_op<'i>(input: &mut Input<'i>) -> PResult<Option<&'i str>> {
    alt((
        terminated('=', not(one_of(['=', '~', '>']))).value(None),
        terminated(
            alt((
                "||", "&&", "**", "<<", ">>", "+", "-", "*", "/", "%", "|", "&", "^",
            )),
            '=',
        )
        .map(Some),
    ))
    .parse_next(input)
}

fn ternary(input: &mut Input<'_>) -> PResult<Expr> {
    let cond = range(input)?;
    let checkpoint = input.checkpoint();
    sp(input)?;
    if opt(terminated('?', peek(one_of([' ', '\t', '\n', '\r']))))
        .parse_next(input)?
        .is_none()
    {
        input.reset(&checkpoint);
        return Ok(cond);
    }
    ws(input)?;
    let then_value = commit(arg(input))?;
    ws(input)?;
    commit(terminated(':', not(':')).parse_next(input))?;
    ws(input)?;
    let else_value = commit(nested(input, arg))?;
    Ok(Expr::Ternary(
        Box::new(cond),
        Box::new(then_value),
        Box::new(else_value),
    ))
}

fn range(input: &mut Input<'_>) -> PResult<Expr> {
    let start = oror(input)?;
    let checkpoint = input.checkpoint();
    sp(input)?;
    let exclusive = opt(alt((
        "...".value(true),
        terminated("..", not('.')).value(false),
    )))
    .parse_next(input)?;
    let Some(exclusive) = exclusive else {
        input.reset(&checkpoint);
        return Ok(start);
    };
    ws(input)?;
    let end = commit(oror(input))?;
    Ok(Expr::Range {
        start: Box::new(start),
        end: Box::new(end),
        exclusive,
    })
}

// ============ Binary operators ============

/// Operator token, its meaning, and characters that must not follow it
/// (so `<` does not split `<<`, and `+` does not split `+=`).
struct OpSpec(&'static str, BinOp, &'static [char]);

const OROR: &[OpSpec] = &[OpSpec("||", BinOp::OrOr, &['='])];
const ANDAND: &[OpSpec] = &[OpSpec("&&", BinOp::AndAnd, &['='])];
const EQUALITY: &[OpSpec] = &[
    OpSpec("<=>", BinOp::Cmp, &[]),
    OpSpec("===", BinOp::CaseEq, &[]),
    OpSpec("==", BinOp::Eq, &[]),
    OpSpec("!=", BinOp::Ne, &[]),
    OpSpec("=~", BinOp::Match, &[]),
    OpSpec("!~", BinOp::NotMatch, &[]),
];
const COMPARISON: &[OpSpec] = &[
    OpSpec("<=", BinOp::Le, &['>']),
    OpSpec(">=", BinOp::Ge, &[]),
    OpSpec("<", BinOp::Lt, &['<', '=']),
    OpSpec(">", BinOp::Gt, &['>', '=']),
];
const BITOR: &[OpSpec] = &[
    OpSpec("|", BinOp::BitOr, &['|', '=']),
    OpSpec("^", BinOp::BitXor, &['=']),
];
const BITAND: &[OpSpec] = &[OpSpec("&", BinOp::BitAnd, &['&', '.', '='])];
const SHIFT: &[OpSpec] = &[
    OpSpec("<<", BinOp::Shl, &['=']),
    OpSpec(">>", BinOp::Shr, &['=']),
];
const ADDITIVE: &[OpSpec] = &[
    OpSpec("+", BinOp::Add, &['=']),
    OpSpec("-", BinOp::Sub, &['=', '>']),
];
const MULTIPLICATIVE: &[OpSpec] = &[
    OpSpec("*", BinOp::Mul, &['*', '=']),
    OpSpec("/", BinOp::Div, &['=']),
    OpSpec("%", BinOp::Mod, &['=']),
];
const POW: &[OpSpec] = &[OpSpec("**", BinOp::Pow, &['='])];

/// Tokens that read as a prefix on an argument when written `foo -x`.
const PREFIX_LIKE: &[&str] = &["-", "+", "*", "**", "&", "%", "/"];

fn oror(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, OROR, andand)
}

fn andand(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, ANDAND, equality)
}

fn equality(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, EQUALITY, comparison)
}

fn comparison(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, COMPARISON, bitor)
}

fn bitor(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, BITOR, bitand)
}

fn bitand(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, BITAND, shift)
}

fn shift(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, SHIFT, additive)
}

fn additive(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, ADDITIVE, multiplicative)
}

fn multiplicative(input: &mut Input<'_>) -> PResult<Expr> {
    left_assoc(input, MULTIPLICATIVE, unary_minus)
}

fn left_assoc(
    input: &mut Input<'_>,
    ops: &[OpSpec],
    operand: fn(&mut Input<'_>) -> PResult<Expr>,
) -> PResult<Expr> {
    let mut left = operand(input)?;
    while let Some(op) = binary_operator(input, ops, &left)? {
        ws(input)?;
        let right = commit(operand(input))?;
        left = left.binop(op, right);
    }
    Ok(left)
}

/// Consume the next binary operator from `ops`, or leave the input untouched.
fn binary_operator(input: &mut Input<'_>, ops: &[OpSpec], left: &Expr) -> PResult<Option<BinOp>> {
    let checkpoint = input.checkpoint();
    let spaced = !sp.take().parse_next(input)?.is_empty();
    let text = rest(input);
    for OpSpec(token, op, not_before) in ops {
        let Some(after) = text.strip_prefix(token) else {
            continue;
        };
        let next = after.chars().next();
        if next.is_some_and(|c| not_before.contains(&c)) {
            continue;
        }
        let tight_after = next.is_some_and(|c| !c.is_whitespace());
        if spaced && tight_after && PREFIX_LIKE.contains(token) && is_command_head(left) {
            continue;
        }
        literal(*token).parse_next(input)?;
        return Ok(Some(*op));
    }
    input.reset(&checkpoint);
    Ok(None)
}

fn is_command_head(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) => true,
        Expr::Call(call) => call.accepts_command_args(),
        _ => false,
    }
}

// ============ Unary ============

fn unary_minus(input: &mut Input<'_>) -> PResult<Expr> {
    if opt(terminated('-', not(one_of([' ', '\t', '=', '>']))))
        .parse_next(input)?
        .is_some()
    {
        let operand = commit(nested(input, unary_minus))?;
        return Ok(match operand {
            Expr::Int(n) => Expr::Int(-n),
            Expr::Float(f) => Expr::Float(-f),
            other => Expr::Unary(UnaryOp::Neg, Box::new(other)),
        });
    }
    pow(input)
}

fn pow(input: &mut Input<'_>) -> PResult<Expr> {
    let base = prefix_unary(input)?;
    match binary_operator(input, POW, &base)? {
        Some(op) => {
            ws(input)?;
            let exponent = commit(nested(input, unary_minus))?;
            Ok(base.binop(op, exponent))
        }
        None => Ok(base),
    }
}

fn prefix_unary(input: &mut Input<'_>) -> PResult<Expr> {
    let op = opt(alt((
        terminated('!', not(one_of(['=', '~']))).value(UnaryOp::Not),
        '~'.value(UnaryOp::BitNot),
        terminated('+', not(one_of([' ', '\t', '=']))).value(UnaryOp::Plus),
    )))
    .parse_next(input)?;
    match op {
        Some(op) => {
            sp(input)?;
            let operand = commit(nested(input, prefix_unary))?;
            Ok(Expr::Unary(op, Box::new(operand)))
        }
        None => postfix(input),
    }
}

// ============ Postfix ============

enum Postfix {
    Method {
        name: String,
        args: Option<Vec<Arg>>,
        block: Option<Block>,
        safe_nav: bool,
    },
    Scope(String),
    Index(Vec<Arg>),
}

fn postfix(input: &mut Input<'_>) -> PResult<Expr> {
    let mut expr = primary(input)?;
    while let Some(op) = postfix_op(input)? {
        expr = match op {
            Postfix::Method {
                name,
                args,
                block,
                safe_nav,
            } => Expr::Call(Call {
                receiver: Some(Box::new(expr)),
                name,
                parens: args.is_some(),
                args: args.unwrap_or_default(),
                block,
                safe_nav,
            }),
            Postfix::Scope(name) => Expr::ScopedConst(Box::new(expr), name),
            Postfix::Index(args) => Expr::Index(Box::new(expr), args),
        };
    }
    Ok(expr)
}

fn postfix_op(input: &mut Input<'_>) -> PResult<Option<Postfix>> {
    // `.name` may continue on the next line
    let checkpoint = input.checkpoint();
    ws(input)?;
    let dot = opt(alt((
        "&.".value(true),
        terminated('.', not('.')).value(false),
    )))
    .parse_next(input)?;
    if let Some(safe_nav) = dot {
        ws(input)?;
        let name = commit(method_name(input))?;
        let (args, block) = call_suffix(input)?;
        return Ok(Some(Postfix::Method {
            name,
            args,
            block,
            safe_nav,
        }));
    }
    input.reset(&checkpoint);

    if opt("::").parse_next(input)?.is_some() {
        if let Some(name) = opt(constant_name).parse_next(input)? {
            if rest(input).starts_with('(') {
                let args = paren_args(input)?;
                return Ok(Some(Postfix::Method {
                    name,
                    args: Some(args),
                    block: None,
                    safe_nav: false,
                }));
            }
            return Ok(Some(Postfix::Scope(name)));
        }
        let name = commit(method_name(input))?;
        let (args, block) = call_suffix(input)?;
        return Ok(Some(Postfix::Method {
            name,
            args,
            block,
            safe_nav: false,
        }));
    }

    if rest(input).starts_with('[') {
        return bracket_args(input).map(|args| Some(Postfix::Index(args)));
    }
    Ok(None)
}

/// Optional `(args)` written tight against the name, then an optional brace block.
fn call_suffix(input: &mut Input<'_>) -> PResult<(Option<Vec<Arg>>, Option<Block>)> {
    let args = if rest(input).starts_with('(') {
        Some(paren_args(input)?)
    } else {
        None
    };
    let block = opt(preceded(sp, brace_block)).parse_next(input)?;
    Ok((args, block))
}

// ============ Primary ============

fn primary(input: &mut Input<'_>) -> PResult<Expr> {
    nested(input, primary_kind)
}

fn primary_kind(input: &mut Input<'_>) -> PResult<Expr> {
    let text = rest(input);
    let Some(first) = text.chars().next() else {
        return backtrack();
    };
    match first {
        '"' | '\'' => string_literal(input),
        '`' => shell_command(input),
        '%' => percent_literal(input),
        '/' => regex_literal(input),
        ':' => symbol(input),
        '?' => character_literal(input),
        '$' => global_variable(input),
        '-' if text.starts_with("->") => lambda(input),
        '0'..='9' => number(input),
        '[' => array_literal(input),
        '{' => hash_literal(input),
        '(' => paren_expr(input),
        '@' => instance_variable(input),
        'A'..='Z' => constant_or_call(input),
        c if c.is_ascii_lowercase() || c == '_' => identifier_or_call(input),
        _ => backtrack(),
    }
}

fn identifier_or_call(input: &mut Input<'_>) -> PResult<Expr> {
    let pseudo = opt(alt((
        keyword("nil").value(Pseudo::Nil),
        keyword("true").value(Pseudo::True),
        keyword("false").value(Pseudo::False),
        keyword("self").value(Pseudo::SelfRef),
    )))
    .parse_next(input)?;
    if let Some(pseudo) = pseudo {
        return Ok(Expr::Pseudo(pseudo));
    }

    let name = identifier(input)?;
    let (args, block) = call_suffix(input)?;
    if args.is_none() && block.is_none() {
        return Ok(Expr::Ident(name));
    }
    Ok(Expr::Call(Call {
        parens: args.is_some(),
        args: args.unwrap_or_default(),
        block,
        ..Call::new(None, name)
    }))
}

/// `Name`, or `Name(args)` for capitalized methods like `Pathname("x")`.
fn constant_or_call(input: &mut Input<'_>) -> PResult<Expr> {
    let name = constant_name(input)?;
    if rest(input).starts_with('(') {
        let args = paren_args(input)?;
        return Ok(Expr::Call(Call {
            parens: true,
            ..Call::new(None, name).with_args(args)
        }));
    }
    Ok(Expr::Const(name))
}

fn instance_variable(input: &mut Input<'_>) -> PResult<Expr> {
    preceded('@', word)
        .map(|name: &str| Expr::IVar(name.to_string()))
        .parse_next(input)
}

fn paren_expr(input: &mut Input<'_>) -> PResult<Expr> {
    delimited(('(', ws), full_expr, (ws, ')'))
        .map(|inner| Expr::Paren(Box::new(inner)))
        .parse_next(input)
}

fn array_literal(input: &mut Input<'_>) -> PResult<Expr> {
    delimited(
        ('[', ws),
        opt(terminated(separated(1.., arg, (ws, ',', ws)), opt((ws, ',')))),
        (ws, ']'),
    )
    .map(|items: Option<Vec<Expr>>| Expr::Array(items.unwrap_or_default()))
    .parse_next(input)
}

fn hash_literal(input: &mut Input<'_>) -> PResult<Expr> {
    delimited(
        ('{', ws),
        opt(terminated(separated(1.., hash_pair, (ws, ',', ws)), opt((ws, ',')))),
        (ws, '}'),
    )
    .map(|pairs: Option<Vec<(Expr, Expr)>>| Expr::Hash(pairs.unwrap_or_default()))
    .parse_next(input)
}

fn hash_pair(input: &mut Input<'_>) -> PResult<(Expr, Expr)> {
    if let Some(key) = opt(label).parse_next(input)? {
        ws(input)?;
        let value = commit(arg(input))?;
        return Ok((Expr::Sym(key), value));
    }
    let key = arg(input)?;
    (ws, "=>", ws).parse_next(input)?;
    let value = commit(arg(input))?;
    Ok((key, value))
}

// ============ Literals ============

/// One or more adjacent string literals, concatenated.
pub(super) fn string_literal(input: &mut Input<'_>) -> PResult<Expr> {
    let mut parts = string_piece(input)?;
    loop {
        let checkpoint = input.checkpoint();
        sp(input)?;
        match opt(string_piece).parse_next(input)? {
            Some(more) => {
                for part in more {
                    push_part(&mut parts, part);
                }
            }
            None => {
                input.reset(&checkpoint);
                break;
            }
        }
    }
    Ok(Expr::Str(parts))
}

fn push_part(parts: &mut Vec<StrPart>, part: StrPart) {
    if let (Some(StrPart::Lit(last)), StrPart::Lit(text)) = (parts.last_mut(), &part) {
        last.push_str(text);
        return;
    }
    parts.push(part);
}

fn string_piece(input: &mut Input<'_>) -> PResult<Vec<StrPart>> {
    alt((double_quoted, single_quoted)).parse_next(input)
}

fn double_quoted(input: &mut Input<'_>) -> PResult<Vec<StrPart>> {
    '"'.parse_next(input)?;
    interpolated(input, '"', '"')
}

/// Body of an interpolating literal, after its opening delimiter and through
/// `close`. Bracket delimiters nest: `%Q(a (b))`.
fn interpolated(input: &mut Input<'_>, open: char, close: char) -> PResult<Vec<StrPart>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        let Some(c) = rest(input).chars().next() else {
            // unterminated
            return commit(backtrack());
        };
        match c {
            '\\' => escape(input, &mut text)?,
            '#' if rest(input).starts_with("#{") => {
                "#{".parse_next(input)?;
                ws(input)?;
                if opt('}').parse_next(input)?.is_some() {
                    continue;
                }
                let inner = commit(full_expr(input))?;
                ws(input)?;
                commit('}'.parse_next(input))?;
                if !text.is_empty() {
                    parts.push(StrPart::Lit(std::mem::take(&mut text)));
                }
                parts.push(StrPart::Interp(Box::new(inner)));
            }
            c if c == close && depth == 0 => {
                any.parse_next(input)?;
                break;
            }
            c if c == close || c == open || c == '#' => {
                any.parse_next(input)?;
                if c == close {
                    depth -= 1;
                } else if c == open {
                    depth += 1;
                }
                text.push(c);
            }
            _ => {
                let stop = |c: char| matches!(c, '\\' | '#') || c == open || c == close;
                let chunk = take_till(1.., stop).parse_next(input)?;
                text.push_str(chunk);
            }
        }
    }
    if !text.is_empty() || parts.is_empty() {
        parts.push(StrPart::Lit(text));
    }
    Ok(parts)
}

/// Decode one backslash escape into `text`. Control and meta escapes
/// (`\cx`, `\C-x`, `\M-x`) and malformed `\x`/`\u` forms are errors.
fn escape(input: &mut Input<'_>, text: &mut String) -> PResult<()> {
    let start = input.checkpoint();
    '\\'.parse_next(input)?;
    let Some(c) = opt(any).parse_next(input)? else {
        return commit(backtrack());
    };
    let decoded = match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        's' => Some(' '),
        'e' => Some('\x1b'),
        'a' => Some('\x07'),
        'b' => Some('\x08'),
        'f' => Some('\x0c'),
        'v' => Some('\x0b'),
        // line continuation
        '\n' => return Ok(()),
        '0'..='7' => {
            let more = take_while(0..=2, |d: char| d.is_digit(8)).parse_next(input)?;
            let value = radix_value(c.to_digit(8).unwrap_or_default(), more, 8);
            Some(char::from((value & 0xff) as u8))
        }
        'x' => opt(take_while(1..=2, |d: char| d.is_ascii_hexdigit()))
            .parse_next(input)?
            .map(|digits| char::from(radix_value(0, digits, 16) as u8)),
        'u' => {
            if unicode_escape(input, text)? {
                return Ok(());
            }
            None
        }
        'c' | 'C' | 'M' => None,
        other => Some(other),
    };
    match decoded {
        Some(c) => {
            text.push(c);
            Ok(())
        }
        None => {
            input.reset(&start);
            fail_with("invalid escape sequence")
        }
    }
}

/// `\uXXXX`, or `\u{...}` holding space-separated code points. False when
/// malformed or not a valid scalar value.
fn unicode_escape(input: &mut Input<'_>, text: &mut String) -> PResult<bool> {
    let hex = |d: char| d.is_ascii_hexdigit();
    if opt('{').parse_next(input)?.is_none() {
        let Some(digits) = opt(take_while(4, hex)).parse_next(input)? else {
            return Ok(false);
        };
        return Ok(push_code_point(text, digits));
    }
    let mut decoded_any = false;
    loop {
        take_while(0.., [' ', '\t']).parse_next(input)?;
        if opt('}').parse_next(input)?.is_some() {
            return Ok(decoded_any);
        }
        let Some(digits) = opt(take_while(1..=6, hex)).parse_next(input)? else {
            return Ok(false);
        };
        if !push_code_point(text, digits) {
            return Ok(false);
        }
        decoded_any = true;
    }
}

fn push_code_point(text: &mut String, digits: &str) -> bool {
    match char::from_u32(radix_value(0, digits, 16)) {
        Some(c) => {
            text.push(c);
            true
        }
        None => false,
    }
}

fn radix_value(seed: u32, digits: &str, radix: u32) -> u32 {
    digits
        .chars()
        .filter_map(|d| d.to_digit(radix))
        .fold(seed, |acc, d| acc * radix + d)
}

fn single_quoted(input: &mut Input<'_>) -> PResult<Vec<StrPart>> {
    '\''.parse_next(input)?;
    let mut text = String::new();
    loop {
        let Some(c) = rest(input).chars().next() else {
            return commit(backtrack());
        };
        match c {
            '\'' => {
                any.parse_next(input)?;
                break;
            }
            '\\' => {
                any.parse_next(input)?;
                let escaped = commit(any.parse_next(input))?;
                if escaped != '\\' && escaped != '\'' {
                    text.push('\\');
                }
                text.push(escaped);
            }
            _ => {
                let chunk = take_till(1.., ['\'', '\\']).parse_next(input)?;
                text.push_str(chunk);
            }
        }
    }
    Ok(vec![StrPart::Lit(text)])
}

/// `%w[]`, `%i[]` and the other percent literals: `%q()`, `%Q()`, `%()`,
/// `%r{}`, `%x()`, `%s()`.
fn percent_literal(input: &mut Input<'_>) -> PResult<Expr> {
    '%'.parse_next(input)?;
    let kind = opt(one_of(['w', 'W', 'i', 'I', 'q', 'Q', 'r', 'x', 's'])).parse_next(input)?;
    let open = one_of(['[', '(', '{', '<', '|', '!', '/', '^']).parse_next(input)?;
    let close = match open {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        '<' => '>',
        other => other,
    };
    let expr = match kind {
        Some('w' | 'W') => Expr::WordArray(words(&commit(raw_until(input, open, close))?)),
        Some('i' | 'I') => Expr::SymbolArray(words(&commit(raw_until(input, open, close))?)),
        Some('q') => {
            let raw = commit(raw_until(input, open, close))?;
            Expr::Str(vec![StrPart::Lit(unescape_quoted(&raw, close))])
        }
        Some('s') => Expr::Sym(unescape_quoted(&commit(raw_until(input, open, close))?, close)),
        Some('r') => {
            let pattern = commit(raw_until(input, open, close))?;
            let flags = regex_flags(input)?;
            Expr::Regex { pattern, flags }
        }
        Some('x') => Expr::Shell(interpolated(input, open, close)?),
        _ => Expr::Str(interpolated(input, open, close)?),
    };
    Ok(expr)
}

fn words(body: &str) -> Vec<String> {
    body.split_whitespace().map(str::to_string).collect()
}

/// Text up to the unescaped `close`, escapes kept as written. Bracket
/// delimiters nest.
fn raw_until(input: &mut Input<'_>, open: char, close: char) -> PResult<String> {
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        let c = any.parse_next(input)?;
        match c {
            '\\' => {
                text.push(c);
                text.push(any.parse_next(input)?);
            }
            c if c == close && depth == 0 => return Ok(text),
            c if c == close => {
                depth -= 1;
                text.push(c);
            }
            c if c == open => {
                depth += 1;
                text.push(c);
            }
            c => text.push(c),
        }
    }
}

/// Single-quote rules: only `\\` and an escaped delimiter lose the backslash.
fn unescape_quoted(raw: &str, close: char) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match (c, chars.clone().next()) {
            ('\\', Some(next)) if next == '\\' || next == close => {
                text.push(next);
                chars.next();
            }
            _ => text.push(c),
        }
    }
    text
}

fn regex_flags(input: &mut Input<'_>) -> PResult<String> {
    take_while(0.., ['i', 'm', 'x', 'o', 'u', 'e', 's', 'n'])
        .map(str::to_string)
        .parse_next(input)
}

/// `/pattern/flags`, pattern kept as written.
fn regex_literal(input: &mut Input<'_>) -> PResult<Expr> {
    '/'.parse_next(input)?;
    let pattern = commit(raw_until(input, '/', '/'))?;
    let flags = regex_flags(input)?;
    Ok(Expr::Regex { pattern, flags })
}

/// `` `uname -m` ``
fn shell_command(input: &mut Input<'_>) -> PResult<Expr> {
    '`'.parse_next(input)?;
    interpolated(input, '`', '`').map(Expr::Shell)
}

/// `?a`, a one-character string.
fn character_literal(input: &mut Input<'_>) -> PResult<Expr> {
    '?'.parse_next(input)?;
    let mut text = String::new();
    if rest(input).starts_with('\\') {
        escape(input, &mut text)?;
    } else {
        text.push(any.verify(|c: &char| !c.is_whitespace()).parse_next(input)?);
    }
    not(one_of(is_ident_char)).parse_next(input)?;
    Ok(Expr::Str(vec![StrPart::Lit(text)]))
}

/// `$stdout`, `$1`, `$?`
fn global_variable(input: &mut Input<'_>) -> PResult<Expr> {
    preceded(
        '$',
        alt((
            (
                one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
                take_while(0.., is_ident_char),
            )
                .take(),
            take_while(1.., |c: char| c.is_ascii_digit()),
            one_of([
                '!', '@', '&', '`', '\'', '+', '~', '=', '/', '\\', ',', ';', '.', '<', '>', '*',
                '$', '?', ':', '"',
            ])
            .take(),
        )),
    )
    .map(|name: &str| Expr::Global(name.to_string()))
    .parse_next(input)
}

/// `-> { }`, `->(x) do ... end`
fn lambda(input: &mut Input<'_>) -> PResult<Expr> {
    "->".parse_next(input)?;
    sp(input)?;
    let params = opt(lambda_params).parse_next(input)?.unwrap_or_default();
    sp(input)?;
    let block = commit(alt((brace_block, do_block)).parse_next(input))?;
    Ok(Expr::Lambda(Block {
        params: [params, block.params].concat(),
        body: block.body,
    }))
}

fn lambda_params(input: &mut Input<'_>) -> PResult<Vec<String>> {
    delimited(
        ('(', sp),
        separated(0.., block_param, (sp, ',', sp)),
        (sp, ')'),
    )
    .parse_next(input)
}

/// `:name`, `:name?`, `:"quoted"`.
fn symbol(input: &mut Input<'_>) -> PResult<Expr> {
    ':'.parse_next(input)?;
    if rest(input).starts_with('"') {
        let parts = double_quoted(input)?;
        return match parts.as_slice() {
            [StrPart::Lit(text)] => Ok(Expr::Sym(text.clone())),
            _ => commit(backtrack()),
        };
    }
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
        opt(one_of(['?', '!', '='])),
    )
        .take()
        .map(|name: &str| Expr::Sym(name.to_string()))
        .parse_next(input)
}

// ============ Blocks ============

pub(super) fn brace_block(input: &mut Input<'_>) -> PResult<Block> {
    '{'.parse_next(input)?;
    sp(input)?;
    let params = opt(block_params).parse_next(input)?.unwrap_or_default();
    let body = commit(stmt::body(input, &["}"]))?;
    commit('}'.parse_next(input))?;
    Ok(Block { params, body })
}

pub(super) fn do_block(input: &mut Input<'_>) -> PResult<Block> {
    keyword("do").parse_next(input)?;
    sp(input)?;
    let params = opt(block_params).parse_next(input)?.unwrap_or_default();
    let body = commit(stmt::body(input, &["end"]))?;
    commit(keyword("end").parse_next(input))?;
    Ok(Block { params, body })
}

fn block_params(input: &mut Input<'_>) -> PResult<Vec<String>> {
    delimited(
        ('|', sp),
        separated(0.., block_param, (sp, ',', sp)),
        (sp, '|'),
    )
    .parse_next(input)
}

fn block_param(input: &mut Input<'_>) -> PResult<String> {
    preceded(opt(alt(("**", "*", "&"))), word)
        .map(str::to_string)
        .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::super::lexical::new_input;
    use super::*;

    fn parse_arg(text: &str) -> Expr {
        let mut input = new_input(text);
        let expr = full_expr(&mut input).unwrap();
        assert_eq!(rest(&input).trim(), "", "leftover input for {text:?}");
        expr
    }

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.into())
    }

    fn lit(text: &str) -> Expr {
        Expr::Str(vec![StrPart::Lit(text.into())])
    }

    #[test]
    fn precedence() {
        let expr = parse_arg("a + b * c");
        assert_eq!(
            expr,
            ident("a").binop(BinOp::Add, ident("b").binop(BinOp::Mul, ident("c")))
        );
        let expr = parse_arg("a || b && c");
        assert_eq!(
            expr,
            ident("a").binop(BinOp::OrOr, ident("b").binop(BinOp::AndAnd, ident("c")))
        );
        let expr = parse_arg("2 ** 3 ** 2");
        assert_eq!(
            expr,
            Expr::Int(2).binop(BinOp::Pow, Expr::Int(3).binop(BinOp::Pow, Expr::Int(2)))
        );
    }

    #[test]
    fn whitespace_decides_command_or_operator() {
        let expr = parse_arg("foo -1");
        let Expr::Call(call) = expr else {
            panic!("expected command")
        };
        assert_eq!(call.args, vec![Arg::pos(Expr::Int(-1))]);

        assert_eq!(parse_arg("foo - 1"), ident("foo").binop(BinOp::Sub, Expr::Int(1)));
        assert_eq!(parse_arg("foo-1"), ident("foo").binop(BinOp::Sub, Expr::Int(1)));
    }

    #[test]
    fn path_division_and_shovel() {
        let expr = parse_arg("bin/\"jq\"");
        assert_eq!(expr, ident("bin").binop(BinOp::Div, lit("jq")));
        let expr = parse_arg("args << \"--with-x\"");
        assert_eq!(expr, ident("args").binop(BinOp::Shl, lit("--with-x")));
    }

    #[test]
    fn trailing_hash_arguments() {
        let expr = parse_arg("depends_on \"bar\" => :build");
        let Expr::Call(call) = expr else {
            panic!("expected command")
        };
        assert_eq!(call.args, vec![Arg::Pair(lit("bar"), Expr::Sym("build".into()))]);

        let expr = parse_arg("sha256 cellar: :any, arm64_big_sur: \"abc\"");
        let Expr::Call(call) = expr else {
            panic!("expected command")
        };
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[0], Arg::Pair(Expr::Sym("cellar".into()), Expr::Sym("any".into())));
    }

    #[test]
    fn chained_commands_and_predicates() {
        let expr = parse_arg("build.with? \"feature\"");
        let expected = Expr::Call(
            Call::new(Some(ident("build")), "with?").with_args(vec![Arg::pos(lit("feature"))]),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn leading_dot_continuation() {
        let expr = parse_arg("foo\n  .bar\n  .baz");
        let Expr::Call(call) = expr else {
            panic!("expected call")
        };
        assert_eq!(call.name, "baz");
    }

    #[test]
    fn multiline_parenthesized_args() {
        let expr = parse_arg("system(\"cmake\",\n  \"-S\", \".\",\n)");
        let Expr::Call(call) = expr else {
            panic!("expected call")
        };
        assert!(call.parens);
        assert_eq!(call.args.len(), 3);
    }

    #[test]
    fn assignment_with_command_value() {
        let expr = parse_arg("x = which \"cc\"");
        let Expr::Assign(target, value) = expr else {
            panic!("expected assignment")
        };
        assert_eq!(*target, ident("x"));
        assert!(matches!(*value, Expr::Call(ref call) if call.name == "which"));
    }

    #[test]
    fn do_block_with_params() {
        let expr = parse_arg("inreplace \"Makefile\" do |s|\n  s.gsub! \"a\", \"b\"\nend");
        let Expr::Call(call) = expr else {
            panic!("expected call")
        };
        let block = call.block.unwrap();
        assert_eq!(block.params, vec!["s".to_string()]);
        assert_eq!(block.body.len(), 1);
    }

    #[test]
    fn index_vs_array_argument() {
        assert_eq!(
            parse_arg("ENV[\"CC\"]"),
            Expr::Index(Box::new(Expr::Const("ENV".into())), vec![Arg::pos(lit("CC"))])
        );
        let Expr::Call(call) = parse_arg("foo [1]") else {
            panic!("expected command")
        };
        assert_eq!(call.args, vec![Arg::pos(Expr::Array(vec![Expr::Int(1)]))]);
    }

    #[test]
    fn strings_and_literals() {
        assert_eq!(parse_arg("'a\\'b\\n'"), lit("a'b\\n"));
        assert_eq!(parse_arg("\"a\\tb\""), lit("a\tb"));
        assert_eq!(parse_arg("\"a\" \"b\""), lit("ab"));
        assert_eq!(
            parse_arg("%w[a b  c]"),
            Expr::WordArray(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(parse_arg(":\"foo-bar\""), Expr::Sym("foo-bar".into()));
        assert_eq!(parse_arg("\"\""), lit(""));
    }

    #[test]
    fn escape_sequences_decode() {
        assert_eq!(parse_arg(r#""\e[0m""#), lit("\x1b[0m"));
        assert_eq!(parse_arg(r#""\033[1m\0""#), lit("\x1b[1m\0"));
        assert_eq!(parse_arg(r#""\x41\x7""#), lit("A\x07"));
        assert_eq!(parse_arg(r#""\u00e9\u{1F600 41}""#), lit("é😀A"));
        assert_eq!(parse_arg(r#""\#{x} \" \q""#), lit("#{x} \" q"));
        assert_eq!(parse_arg(r#"?\t"#), lit("\t"));
    }

    #[test]
    fn regex_and_other_literal_forms() {
        let Expr::Call(call) = parse_arg("inreplace \"Makefile\", /-O2/, \"-O3\"") else {
            panic!("expected command")
        };
        assert_eq!(
            call.args[1],
            Arg::pos(Expr::Regex {
                pattern: "-O2".into(),
                flags: String::new()
            })
        );
        let Expr::Call(call) = parse_arg("foo /a\\/b/i") else {
            panic!("expected command")
        };
        assert_eq!(
            call.args,
            vec![Arg::pos(Expr::Regex {
                pattern: "a\\/b".into(),
                flags: "i".into()
            })]
        );
        assert_eq!(
            parse_arg("%r{x{2}}"),
            Expr::Regex {
                pattern: "x{2}".into(),
                flags: String::new()
            }
        );
        assert_eq!(parse_arg("$stdout"), Expr::Global("stdout".into()));
        assert_eq!(parse_arg("?a"), lit("a"));
        assert_eq!(parse_arg("%q(a (b) \\) c)"), lit("a (b) ) c"));
        assert_eq!(
            parse_arg("%Q[v#{x}]"),
            Expr::Str(vec![
                StrPart::Lit("v".into()),
                StrPart::Interp(Box::new(ident("x")))
            ])
        );
        assert!(matches!(parse_arg("`uname -m`"), Expr::Shell(_)));
        let Expr::Lambda(block) = parse_arg("->(a, b) { a }") else {
            panic!("expected lambda")
        };
        assert_eq!(block.params, vec!["a".to_string(), "b".to_string()]);
        // Spaced on both sides it is still division
        assert_eq!(parse_arg("a / b"), ident("a").binop(BinOp::Div, ident("b")));
    }

    #[test]
    fn ternary_and_range() {
        assert!(matches!(parse_arg("a ? b : c"), Expr::Ternary(..)));
        assert!(matches!(parse_arg("1..3"), Expr::Range { exclusive: false, .. }));
        assert!(matches!(parse_arg("x ||= 1"), Expr::OpAssign(_, ref op, _) if op == "||"));
    }

    #[test]
    fn keyword_operators() {
        let expr = parse_arg("a and not b");
        assert_eq!(
            expr,
            ident("a").binop(BinOp::And, Expr::Unary(UnaryOp::KwNot, Box::new(ident("b"))))
        );
    }
}
