//! Statement grammar: bodies, compound statements, modifiers

use winnow::combinator::{alt, not, opt, preceded, separated, terminated};
use winnow::prelude::*;

use super::expr::{arg, full_expr, header_expr};
use super::lexical::{
    Input, PResult, at_keyword, at_line_end, backtrack, comment, commit, constant_path, keyword,
    method_name, nested, rest, sp, terms, word, ws,
};
use crate::ast::syntax::{
    ClassDecl, Def, ElseBranch, IfStmt, JumpKind, LoopKind, Program, RescueClause, Stmt, StmtKind,
    WhenClause,
};
use crate::ast::{CondKind, Span};

pub(super) fn program(input: &mut Input<'_>) -> PResult<Program> {
    let body = body(input, &[])?;
    Ok(Program { body })
}

/// Statements up to end of input or one of `closers` (left unconsumed).
pub(super) fn body(input: &mut Input<'_>, closers: &[&str]) -> PResult<Vec<Stmt>> {
    let mut stmts = Vec::new();
    loop {
        terms(input)?;
        if rest(input).is_empty() || at_closer(input, closers) {
            return Ok(stmts);
        }
        stmts.push(commit(nested(input, statement))?);

        sp(input)?;
        opt(comment).parse_next(input)?;
        if !(at_line_end(input) || at_closer(input, closers)) {
            return commit(backtrack());
        }
    }
}

fn at_closer(input: &Input<'_>, closers: &[&str]) -> bool {
    closers.iter().any(|closer| match *closer {
        "}" => rest(input).starts_with('}'),
        word => at_keyword(input, word),
    })
}

#[derive(Clone, Copy)]
enum Modifier {
    Cond(CondKind),
    Loop(LoopKind),
    Rescue,
}

/// A statement with any trailing modifiers: `stmt if cond`, `stmt rescue x`.
fn statement(input: &mut Input<'_>) -> PResult<Stmt> {
    let (kind, span) = statement_kind.with_span().parse_next(input)?;
    let mut stmt = Stmt {
        kind,
        span: span.into(),
    };
    loop {
        let checkpoint = input.checkpoint();
        sp(input)?;
        let modifier = opt(alt((
            keyword("if").value(Modifier::Cond(CondKind::If)),
            keyword("unless").value(Modifier::Cond(CondKind::Unless)),
            keyword("while").value(Modifier::Loop(LoopKind::While)),
            keyword("until").value(Modifier::Loop(LoopKind::Until)),
            keyword("rescue").value(Modifier::Rescue),
        )))
        .parse_next(input)?;
        let Some(modifier) = modifier else {
            input.reset(&checkpoint);
            return Ok(stmt);
        };
        ws(input)?;
        let (cond, cond_span) = commit(header_expr.with_span().parse_next(input))?;
        let span = Span::new(stmt.span.start, cond_span.end);
        let kind = match modifier {
            Modifier::Cond(kind) => StmtKind::Modifier {
                kind,
                cond,
                body: Box::new(stmt),
            },
            Modifier::Loop(kind) => StmtKind::Loop {
                kind,
                cond,
                body: vec![stmt],
            },
            Modifier::Rescue => StmtKind::RescueModifier {
                body: Box::new(stmt),
                fallback: cond,
            },
        };
        stmt = Stmt { kind, span };
    }
}

type StmtParser = fn(&mut Input<'_>) -> PResult<StmtKind>;

/// Statements introduced by a keyword.
const COMPOUND: &[(&str, StmtParser)] = &[
    ("if", if_stmt),
    ("unless", unless_stmt),
    ("while", while_stmt),
    ("until", until_stmt),
    ("for", for_stmt),
    ("case", case_stmt),
    ("begin", begin_stmt),
    ("def", def_stmt),
    ("class", class_stmt),
    ("module", module_stmt),
    ("return", return_stmt),
    ("break", break_stmt),
    ("next", next_stmt),
];

fn statement_kind(input: &mut Input<'_>) -> PResult<StmtKind> {
    match COMPOUND.iter().find(|(word, _)| at_keyword(input, word)) {
        Some((_, parser)) => commit(parser(input)),
        None => full_expr.map(StmtKind::Expr).parse_next(input),
    }
}

/// `then`, a newline, or `;` after a condition.
fn then_separator(input: &mut Input<'_>) -> PResult<()> {
    sp(input)?;
    if opt(keyword("then")).parse_next(input)?.is_some() {
        return Ok(());
    }
    opt(comment).parse_next(input)?;
    if at_line_end(input) {
        Ok(())
    } else {
        backtrack()
    }
}

fn end_keyword(input: &mut Input<'_>) -> PResult<()> {
    keyword("end").void().parse_next(input)
}

// ============ Conditionals ============

fn if_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("if").parse_next(input)?;
    let stmt = if_tail(input, CondKind::If)?;
    end_keyword(input)?;
    Ok(StmtKind::If(stmt))
}

fn unless_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("unless").parse_next(input)?;
    let stmt = if_tail(input, CondKind::Unless)?;
    end_keyword(input)?;
    Ok(StmtKind::If(stmt))
}

/// Condition, body and else branch, up to but not including `end`.
fn if_tail(input: &mut Input<'_>, kind: CondKind) -> PResult<IfStmt> {
    sp(input)?;
    let cond = header_expr(input)?;
    then_separator(input)?;
    let then_body = body(input, &["elsif", "else", "end"])?;
    let else_branch = if kind == CondKind::If && at_keyword(input, "elsif") {
        let (stmt, span) = nested(input, |input| elsif_clause.with_span().parse_next(input))?;
        Some(ElseBranch::Elsif {
            stmt: Box::new(stmt),
            span: span.into(),
        })
    } else if opt(keyword("else")).parse_next(input)?.is_some() {
        Some(ElseBranch::Else(body(input, &["end"])?))
    } else {
        None
    };
    Ok(IfStmt {
        kind,
        cond,
        then_body,
        else_branch,
    })
}

fn elsif_clause(input: &mut Input<'_>) -> PResult<IfStmt> {
    keyword("elsif").parse_next(input)?;
    if_tail(input, CondKind::If)
}

// ============ Loops ============

fn while_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("while").parse_next(input)?;
    loop_tail(input, LoopKind::While)
}

fn until_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("until").parse_next(input)?;
    loop_tail(input, LoopKind::Until)
}

fn loop_tail(input: &mut Input<'_>, kind: LoopKind) -> PResult<StmtKind> {
    sp(input)?;
    let cond = header_expr(input)?;
    loop_body_start(input)?;
    let body = body(input, &["end"])?;
    end_keyword(input)?;
    Ok(StmtKind::Loop { kind, cond, body })
}

/// Optional `do`, then a line end.
fn loop_body_start(input: &mut Input<'_>) -> PResult<()> {
    sp(input)?;
    opt(keyword("do")).parse_next(input)?;
    sp(input)?;
    opt(comment).parse_next(input)?;
    if at_line_end(input) {
        Ok(())
    } else {
        backtrack()
    }
}

fn for_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("for").parse_next(input)?;
    sp(input)?;
    let vars: Vec<&str> = separated(1.., word, (sp, ',', sp)).parse_next(input)?;
    (sp, keyword("in"), sp).parse_next(input)?;
    let iter = header_expr(input)?;
    loop_body_start(input)?;
    let body = body(input, &["end"])?;
    end_keyword(input)?;
    Ok(StmtKind::For {
        vars: vars.into_iter().map(str::to_string).collect(),
        iter,
        body,
    })
}

// ============ case / begin ============

fn case_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("case").parse_next(input)?;
    sp(input)?;
    let subject = if at_line_end(input) {
        None
    } else {
        Some(header_expr(input)?)
    };
    terms(input)?;

    let mut whens = Vec::new();
    while opt(keyword("when")).parse_next(input)?.is_some() {
        sp(input)?;
        let patterns = separated(1.., arg, (sp, ',', ws)).parse_next(input)?;
        then_separator(input)?;
        let body = body(input, &["when", "else", "end"])?;
        whens.push(WhenClause { patterns, body });
    }
    if whens.is_empty() {
        return backtrack();
    }
    let else_body = if opt(keyword("else")).parse_next(input)?.is_some() {
        Some(body(input, &["end"])?)
    } else {
        None
    };
    end_keyword(input)?;
    Ok(StmtKind::Case {
        subject,
        whens,
        else_body,
    })
}

const BEGIN_CLOSERS: &[&str] = &["rescue", "ensure", "end"];

fn begin_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("begin").parse_next(input)?;
    let main = body(input, BEGIN_CLOSERS)?;

    let mut rescues = Vec::new();
    while opt(keyword("rescue")).parse_next(input)?.is_some() {
        sp(input)?;
        let exceptions = if rest(input).starts_with("=>") || at_line_end(input) {
            Vec::new()
        } else {
            separated(1.., arg, (sp, ',', ws)).parse_next(input)?
        };
        let binding = opt(preceded((sp, "=>", sp), word))
            .parse_next(input)?
            .map(str::to_string);
        then_separator(input)?;
        let body = body(input, BEGIN_CLOSERS)?;
        rescues.push(RescueClause {
            exceptions,
            binding,
            body,
        });
    }
    let ensure = if opt(keyword("ensure")).parse_next(input)?.is_some() {
        Some(body(input, &["end"])?)
    } else {
        None
    };
    end_keyword(input)?;
    Ok(StmtKind::Begin {
        body: main,
        rescues,
        ensure,
    })
}

// ============ Jumps ============

fn return_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    jump(input, "return", JumpKind::Return)
}

fn break_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    jump(input, "break", JumpKind::Break)
}

fn next_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    jump(input, "next", JumpKind::Next)
}

fn jump(input: &mut Input<'_>, word: &'static str, kind: JumpKind) -> PResult<StmtKind> {
    keyword(word).parse_next(input)?;
    let value = opt(preceded(sp, arg)).parse_next(input)?;
    Ok(StmtKind::Jump { kind, value })
}

// ============ Definitions ============

fn def_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("def").parse_next(input)?;
    sp(input)?;
    let singleton = opt((keyword("self"), '.')).parse_next(input)?.is_some();
    let name = method_name(input)?;
    let params = if rest(input).starts_with('(') {
        ('(', ws).parse_next(input)?;
        let params: Vec<String> = separated(0.., def_param, (ws, ',', ws)).parse_next(input)?;
        (ws, opt((',', ws)), ')').parse_next(input)?;
        params
    } else {
        sp(input)?;
        if at_line_end(input) {
            Vec::new()
        } else {
            separated(1.., def_param, (sp, ',', sp)).parse_next(input)?
        }
    };
    let body = body(input, &["end"])?;
    end_keyword(input)?;
    Ok(StmtKind::Def(Def {
        name,
        singleton,
        params,
        body,
    }))
}

/// `name`, `*rest`, `&block`, `name = default`, `key:`, `key: default`.
fn def_param(input: &mut Input<'_>) -> PResult<String> {
    let name = preceded(opt(alt(("**", "*", "&"))), word).parse_next(input)?;
    if opt((sp, terminated('=', not('=')))).parse_next(input)?.is_some() {
        ws(input)?;
        arg(input)?;
    } else if opt(terminated(':', not(':'))).parse_next(input)?.is_some() {
        opt(preceded(sp, arg)).parse_next(input)?;
    }
    Ok(name.to_string())
}

fn class_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("class").parse_next(input)?;
    sp(input)?;
    let name = constant_path(input)?;
    let superclass = opt(preceded((sp, terminated('<', not('<')), sp), arg))
        .parse_next(input)?;
    let body = body(input, &["end"])?;
    end_keyword(input)?;
    Ok(StmtKind::Class(ClassDecl {
        name,
        superclass,
        body,
    }))
}

fn module_stmt(input: &mut Input<'_>) -> PResult<StmtKind> {
    keyword("module").parse_next(input)?;
    sp(input)?;
    let name = constant_path(input)?;
    let body = body(input, &["end"])?;
    end_keyword(input)?;
    Ok(StmtKind::Module { name, body })
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;
    use crate::ast::syntax::Expr;

    fn statements(src: &str) -> Vec<Stmt> {
        parse(src).unwrap().program().body.clone()
    }

    #[test]
    fn class_with_superclass_and_methods() {
        let body = statements(
            "class Jq < Formula\n  desc \"x\"\n\n  def install\n    system \"make\"\n  end\nend\n",
        );
        let StmtKind::Class(class) = &body[0].kind else {
            panic!("expected class")
        };
        assert_eq!(class.name, "Jq");
        assert_eq!(class.superclass, Some(Expr::Const("Formula".into())));
        assert_eq!(class.body.len(), 2);
        assert!(matches!(&class.body[1].kind, StmtKind::Def(def) if def.name == "install"));
    }

    #[test]
    fn elsif_chain_nests() {
        let body = statements("if a\n  x\nelsif b\n  y\nelse\n  z\nend\n");
        let StmtKind::If(stmt) = &body[0].kind else {
            panic!("expected if")
        };
        let Some(ElseBranch::Elsif { stmt: inner, .. }) = &stmt.else_branch else {
            panic!("expected elsif")
        };
        assert!(matches!(inner.else_branch, Some(ElseBranch::Else(_))));
    }

    #[test]
    fn modifiers_chain_left_to_right() {
        let body = statements("bin.install \"foo\" if build.with? \"feature\"\n");
        assert_eq!(body.len(), 1);
        let StmtKind::Modifier { kind, body: inner, .. } = &body[0].kind else {
            panic!("expected modifier")
        };
        assert_eq!(*kind, CondKind::If);
        assert!(matches!(inner.kind, StmtKind::Expr(Expr::Call(_))));
    }

    #[test]
    fn loops_case_and_begin() {
        let body = statements(
            "while x do\n  y\nend\nfor a in b\n  c\nend\ncase os\nwhen :mac then 1\nelse 2\nend\nbegin\n  x\nrescue Foo => e\n  y\nensure\n  z\nend\n",
        );
        let kinds: Vec<&str> = body.iter().map(|stmt| stmt.kind.kind_name()).collect();
        assert_eq!(kinds, vec!["while", "for", "case", "begin"]);
    }

    #[test]
    fn def_params() {
        let body = statements("def foo(a, b = 1, *rest, key: 2, &blk)\nend\ndef self.bar x, y\nend\n");
        let StmtKind::Def(first) = &body[0].kind else {
            panic!("expected def")
        };
        assert_eq!(first.params, vec!["a", "b", "rest", "key", "blk"]);
        let StmtKind::Def(second) = &body[1].kind else {
            panic!("expected def")
        };
        assert!(second.singleton);
        assert_eq!(second.params, vec!["x", "y"]);
    }

    #[test]
    fn semicolons_and_one_line_bodies() {
        let body = statements("def caveats; \"text\"; end\nif x then y end\n");
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn junk_after_statement_is_rejected() {
        assert!(parse("foo(1) bar\n").is_err());
        assert!(parse("end\n").is_err());
    }

    #[test]
    fn statement_spans() {
        let recipe = parse("  foo 1\n  bar 2 if x\n").unwrap();
        let body = &recipe.program().body;
        assert_eq!(recipe.excerpt(body[0].span), "foo 1");
        assert_eq!(recipe.excerpt(body[1].span), "bar 2 if x");
    }
}
