//! Tokens shared by the statement and expression grammars: whitespace,
//! comments, identifiers, keywords and numeric literals.

use winnow::ascii::{digit1, hex_digit1, multispace1};
use winnow::combinator::{alt, not, opt, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::stream::{LocatingSlice, Stateful};
use winnow::token::{literal, one_of, take_till, take_while};

use crate::ast::syntax::Expr;

pub(crate) type Input<'i> = Stateful<LocatingSlice<&'i str>, Nesting>;
pub(crate) type PResult<T> = winnow::ModalResult<T>;

/// Deepest expression or statement nesting a recipe may use.
pub(crate) const MAX_NESTING: usize = 64;

/// Current nesting level, carried alongside the input.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Nesting(usize);

pub(crate) fn new_input(text: &str) -> Input<'_> {
    Stateful {
        input: LocatingSlice::new(text),
        state: Nesting::default(),
    }
}

const KEYWORDS: &[&str] = &[
    "alias", "and", "begin", "break", "case", "class", "def", "defined?", "do", "else", "elsif",
    "end", "ensure", "false", "for", "if", "in", "module", "next", "nil", "not", "or", "redo",
    "rescue", "retry", "return", "self", "super", "then", "true", "undef", "unless", "until",
    "when", "while", "yield",
];

/// Keywords that end a command's argument list when they follow it.
const ARG_STOP_WORDS: &[&str] = &[
    "if", "unless", "while", "until", "and", "or", "then", "do", "rescue", "end", "else", "elsif",
    "when", "in", "ensure",
];

pub(crate) fn backtrack<T>() -> PResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// Hard failure whose message names what was malformed.
pub(crate) fn fail_with<T>(label: &'static str) -> PResult<T> {
    let mut error = ContextError::new();
    error.push(StrContext::Label(label));
    Err(ErrMode::Cut(error))
}

/// Label attached by [`fail_with`], if any.
pub(crate) fn failure_label(error: &ErrMode<ContextError>) -> Option<&'static str> {
    let (ErrMode::Backtrack(inner) | ErrMode::Cut(inner)) = error else {
        return None;
    };
    inner.context().find_map(|context| match context {
        StrContext::Label(label) => Some(*label),
        _ => None,
    })
}

/// Run `parser` one level deeper, failing past [`MAX_NESTING`].
pub(crate) fn nested<'i, T>(
    input: &mut Input<'i>,
    parser: impl FnOnce(&mut Input<'i>) -> PResult<T>,
) -> PResult<T> {
    if input.state.0 >= MAX_NESTING {
        return fail_with("nesting too deep");
    }
    input.state.0 += 1;
    let result = parser(input);
    input.state.0 -= 1;
    result
}

/// Turn a backtrack into a hard failure once a construct is committed to.
pub(crate) fn commit<T>(result: PResult<T>) -> PResult<T> {
    result.map_err(|e| match e {
        ErrMode::Backtrack(inner) => ErrMode::Cut(inner),
        other => other,
    })
}

/// Unconsumed input.
pub(crate) fn rest<'a>(input: &'a Input<'_>) -> &'a str {
    input
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn continues_word(c: char) -> bool {
    is_ident_char(c) || c == '?' || c == '!' || c == ':'
}

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

// ============ Whitespace ============

fn line_continuation(input: &mut Input<'_>) -> PResult<()> {
    ('\\', opt('\r'), '\n').void().parse_next(input)
}

/// Horizontal space and `\` continuations; never crosses a bare newline.
pub(crate) fn sp(input: &mut Input<'_>) -> PResult<()> {
    repeat::<_, _, (), _, _>(
        0..,
        alt((take_while(1.., [' ', '\t']).void(), line_continuation)),
    )
    .parse_next(input)
}

pub(crate) fn comment(input: &mut Input<'_>) -> PResult<()> {
    ('#', take_till(0.., '\n')).void().parse_next(input)
}

/// Any whitespace, newlines and comments included.
pub(crate) fn ws(input: &mut Input<'_>) -> PResult<()> {
    repeat::<_, _, (), _, _>(0.., alt((multispace1.void(), comment, line_continuation)))
        .parse_next(input)
}

/// Statement separators: whitespace, comments and `;`.
pub(crate) fn terms(input: &mut Input<'_>) -> PResult<()> {
    repeat::<_, _, (), _, _>(
        0..,
        alt((multispace1.void(), comment, ';'.void(), line_continuation)),
    )
    .parse_next(input)
}

/// True at a newline, `;`, comment, or end of input.
pub(crate) fn at_line_end(input: &Input<'_>) -> bool {
    let r = rest(input);
    r.is_empty() || r.starts_with(['\n', '\r', ';', '#'])
}

// ============ Keywords ============

pub(crate) fn keyword<'i>(
    word: &'static str,
) -> impl Parser<Input<'i>, &'i str, ErrMode<ContextError>> {
    terminated(literal(word), not(one_of(continues_word)))
}

/// Peek for `word` as a whole keyword.
pub(crate) fn at_keyword(input: &Input<'_>, word: &str) -> bool {
    let r = rest(input);
    r.strip_prefix(word)
        .is_some_and(|after| !after.starts_with(continues_word))
}

/// True when the next word would end a command's argument list.
pub(crate) fn at_arg_stop_word(text: &str) -> bool {
    ARG_STOP_WORDS.iter().any(|word| {
        text.strip_prefix(word)
            .is_some_and(|after| !after.starts_with(continues_word))
    })
}

// ============ Identifiers ============

/// Raw word: `[a-z_][A-Za-z0-9_]*`, no keyword filtering.
pub(crate) fn word<'i>(input: &mut Input<'i>) -> PResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_lowercase() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)
}

/// Trailing `?` or `!` of a predicate or bang method name.
fn method_suffix(input: &mut Input<'_>) -> PResult<Option<char>> {
    opt(terminated(one_of(['?', '!']), not(one_of(['=', '~'])))).parse_next(input)
}

/// Local variable or receiver-less method name: `prefix`, `which?`
pub(crate) fn identifier(input: &mut Input<'_>) -> PResult<String> {
    let checkpoint = input.checkpoint();
    let base = word(input)?;
    let mut name = base.to_string();
    if let Some(suffix) = method_suffix(input)? {
        name.push(suffix);
    }
    if is_keyword(base) || is_keyword(&name) {
        input.reset(&checkpoint);
        return backtrack();
    }
    Ok(name)
}

/// Method name after `.` or `::`; keywords are allowed here (`x.class`).
pub(crate) fn method_name(input: &mut Input<'_>) -> PResult<String> {
    let base = (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)?;
    let mut name = base.to_string();
    if let Some(suffix) = method_suffix(input)? {
        name.push(suffix);
    }
    Ok(name)
}

pub(crate) fn constant_name(input: &mut Input<'_>) -> PResult<String> {
    (
        one_of(|c: char| c.is_ascii_uppercase()),
        take_while(0.., is_ident_char),
    )
        .take()
        .map(str::to_string)
        .parse_next(input)
}

/// `Foo::Bar::Baz` as written.
pub(crate) fn constant_path(input: &mut Input<'_>) -> PResult<String> {
    let mut path = constant_name(input)?;
    while let Some(segment) = opt(preceded("::", constant_name)).parse_next(input)? {
        path.push_str("::");
        path.push_str(&segment);
    }
    Ok(path)
}

/// Hash label: `cellar:` in `sha256 cellar: :any`. Must be followed by space.
pub(crate) fn label(input: &mut Input<'_>) -> PResult<String> {
    let name = (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
        opt(one_of(['?', '!'])),
    )
        .take()
        .parse_next(input)?;
    (':', not(':'), winnow::combinator::peek(one_of([' ', '\t', '\n', '\r']))).parse_next(input)?;
    Ok(name.to_string())
}

// ============ Numbers ============

fn digits<'i>(input: &mut Input<'i>) -> PResult<&'i str> {
    (digit1, repeat::<_, _, (), _, _>(0.., ('_', digit1)))
        .take()
        .parse_next(input)
}

fn radix_digits<'i>(input: &mut Input<'i>) -> PResult<&'i str> {
    take_while(1.., |c: char| c.is_ascii_hexdigit() || c == '_').parse_next(input)
}

fn decimal_or_octal(text: &str) -> Result<i64, std::num::ParseIntError> {
    let cleaned = text.replace('_', "");
    if cleaned.len() > 1 && cleaned.starts_with('0') {
        i64::from_str_radix(&cleaned[1..], 8)
    } else {
        cleaned.parse::<i64>()
    }
}

/// Integer (decimal, `0755` octal, `0x`, `0o`, `0b`) or float literal.
pub(crate) fn number(input: &mut Input<'_>) -> PResult<Expr> {
    alt((
        preceded(alt(("0x", "0X")), hex_digit1)
            .try_map(|s: &str| i64::from_str_radix(s, 16))
            .map(Expr::Int),
        preceded(alt(("0o", "0O")), radix_digits)
            .try_map(|s: &str| i64::from_str_radix(&s.replace('_', ""), 8))
            .map(Expr::Int),
        preceded(alt(("0b", "0B")), radix_digits)
            .try_map(|s: &str| i64::from_str_radix(&s.replace('_', ""), 2))
            .map(Expr::Int),
        (digits, '.', digits)
            .take()
            .try_map(|s: &str| s.replace('_', "").parse::<f64>())
            .map(Expr::Float),
        digits.try_map(decimal_or_octal).map(Expr::Int),
    ))
    .parse_next(input)
}
