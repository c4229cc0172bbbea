//! Translate an install body into the install IR
//!
//! This pass:
//! - Turns receiver-less commands into `Command`, other expressions into `Expr`
//! - Folds `if`/`unless`/`elsif` and statement modifiers into `Conditional`
//! - Tracks assigned locals, so a bare identifier becomes `VarRef` or `BareCall`
//!   the same way Ruby decides at parse time
//! - Rejects everything outside the supported subset with the node kind and
//!   the enclosing statement; no partial output is returned

use std::collections::HashSet;

use crate::ast::Span;
use crate::ast::ir::{Expression, HashEntry, Instruction, StringPart};
use crate::ast::syntax::{Arg, Call, ElseBranch, Expr, IfStmt, Stmt, StmtKind, StrPart};
use crate::naming::mangle_method_name;
use crate::parse::Recipe;

/// An install body construct outside the supported subset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported {node_kind} at line {line}: `{context}`")]
pub struct TranslateError {
    pub node_kind: &'static str,
    pub line: usize,
    /// First line of the nearest enclosing statement
    pub context: String,
}

/// Translate statements of `recipe` (normally an install body) into IR.
pub fn translate_statements(
    recipe: &Recipe,
    body: &[Stmt],
) -> Result<Vec<Instruction>, TranslateError> {
    Translator::new(recipe).stmts(body)
}

struct Translator<'r> {
    recipe: &'r Recipe,
    locals: HashSet<String>,
    /// Span of the statement being translated, for diagnostics
    current: Span,
}

impl<'r> Translator<'r> {
    fn new(recipe: &'r Recipe) -> Self {
        Translator {
            recipe,
            locals: HashSet::new(),
            current: Span::default(),
        }
    }

    fn unsupported<T>(&self, node_kind: &'static str) -> Result<T, TranslateError> {
        Err(TranslateError {
            node_kind,
            line: self.recipe.line_of(self.current.start),
            context: self.recipe.excerpt(self.current).to_string(),
        })
    }

    fn method_name(&self, name: &str) -> Result<String, TranslateError> {
        match mangle_method_name(name) {
            Some(mangled) => Ok(mangled),
            None => self.unsupported("reserved_method_name"),
        }
    }

    fn stmts(&mut self, body: &[Stmt]) -> Result<Vec<Instruction>, TranslateError> {
        body.iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Instruction, TranslateError> {
        let outer = std::mem::replace(&mut self.current, stmt.span);
        let result = self.stmt_kind(&stmt.kind);
        self.current = outer;
        result
    }

    fn stmt_kind(&mut self, kind: &StmtKind) -> Result<Instruction, TranslateError> {
        match kind {
            StmtKind::Expr(expr) => self.expr_stmt(expr),
            StmtKind::If(stmt) => self.conditional(stmt),
            StmtKind::Modifier { kind, cond, body } => {
                // The body comes first so its assignments are visible to the
                // condition, as in Ruby
                let then_branch = vec![self.stmt(body)?];
                let cond = self.expr(cond)?;
                Ok(Instruction::Conditional {
                    kind: *kind,
                    cond,
                    then_branch,
                    else_branch: None,
                })
            }
            other => self.unsupported(other.kind_name()),
        }
    }

    fn conditional(&mut self, stmt: &IfStmt) -> Result<Instruction, TranslateError> {
        let cond = self.expr(&stmt.cond)?;
        let then_branch = self.stmts(&stmt.then_body)?;
        let else_branch = match &stmt.else_branch {
            None => None,
            Some(ElseBranch::Else(body)) => Some(self.stmts(body)?),
            Some(ElseBranch::Elsif { stmt, span }) => {
                let outer = std::mem::replace(&mut self.current, *span);
                let nested = self.conditional(stmt);
                self.current = outer;
                Some(vec![nested?])
            }
        };
        Ok(Instruction::Conditional {
            kind: stmt.kind,
            cond,
            then_branch,
            else_branch,
        })
    }

    fn expr_stmt(&mut self, expr: &Expr) -> Result<Instruction, TranslateError> {
        match expr {
            Expr::Call(call) if call.block.is_some() => self.block_call(call),
            Expr::Call(call) if call.receiver.is_none() => self.command(call),
            other => Ok(Instruction::Expr {
                expr: self.expr(other)?,
            }),
        }
    }

    fn command(&mut self, call: &Call) -> Result<Instruction, TranslateError> {
        Ok(Instruction::Command {
            name: self.method_name(&call.name)?,
            args: self.args(&call.args)?,
        })
    }

    /// `head do |params| body end`; params are locals only inside the body.
    fn block_call(&mut self, call: &Call) -> Result<Instruction, TranslateError> {
        let Some(block) = &call.block else {
            return self.command(call);
        };
        let head_call = Call {
            block: None,
            ..call.clone()
        };
        let head = if head_call.receiver.is_none() {
            self.command(&head_call)?
        } else {
            Instruction::Expr {
                expr: self.call_expr(&head_call)?,
            }
        };

        let saved = self.locals.clone();
        self.locals.extend(block.params.iter().cloned());
        let body = self.stmts(&block.body);
        self.locals = saved;

        Ok(Instruction::Block {
            head: Box::new(head),
            params: block.params.clone(),
            body: body?,
        })
    }

    fn expr(&mut self, expr: &Expr) -> Result<Expression, TranslateError> {
        Ok(match expr {
            Expr::Str(parts) => Expression::StringLiteral {
                parts: self.string_parts(parts)?,
            },
            Expr::Sym(name) => Expression::SymbolLiteral { name: name.clone() },
            Expr::Int(value) => Expression::IntLiteral { value: *value },
            Expr::Pseudo(pseudo) => Expression::var(pseudo.keyword()),
            Expr::Ident(name) if self.locals.contains(name) => Expression::var(name.clone()),
            Expr::Ident(name) => Expression::bare(self.method_name(name)?),
            Expr::IVar(name) => Expression::var(format!("@{name}")),
            Expr::Const(name) => Expression::var(name.clone()),
            Expr::ScopedConst(..) => match constant_path(expr) {
                Some(path) => Expression::var(path),
                None => return self.unsupported("scoped_constant"),
            },
            // Elements are not carried
            Expr::Array(_) | Expr::WordArray(_) | Expr::SymbolArray(_) => Expression::ArrayLiteral,
            Expr::Hash(pairs) => Expression::HashLiteral {
                entries: pairs
                    .iter()
                    .map(|(key, value)| self.hash_entry(key, value))
                    .collect::<Result<_, _>>()?,
            },
            Expr::Call(call) => self.call_expr(call)?,
            Expr::Index(base, args) => match args.as_slice() {
                [Arg::Positional(subscript)] => Expression::Index {
                    base: Box::new(self.expr(base)?),
                    subscript: Box::new(self.expr(subscript)?),
                },
                _ => return self.unsupported("multi_subscript_index"),
            },
            Expr::Binary(left, op, right) => Expression::Binary {
                op: op.token().to_string(),
                left: Box::new(self.expr(left)?),
                right: Box::new(self.expr(right)?),
            },
            Expr::Unary(op, operand) => Expression::Unary {
                op: op.token().to_string(),
                operand: Box::new(self.expr(operand)?),
            },
            Expr::Assign(target, value) => {
                if let Expr::Ident(name) = target.as_ref() {
                    self.locals.insert(name.clone());
                }
                Expression::Assign {
                    target: Box::new(self.expr(target)?),
                    value: Box::new(self.expr(value)?),
                }
            }
            Expr::Paren(inner) => self.expr(inner)?,
            other => return self.unsupported(other.kind_name()),
        })
    }

    fn call_expr(&mut self, call: &Call) -> Result<Expression, TranslateError> {
        if call.block.is_some() {
            return self.unsupported("block_call");
        }
        if call.safe_nav {
            return self.unsupported("safe_navigation");
        }
        let method = self.method_name(&call.name)?;
        let args = self.args(&call.args)?;
        Ok(match &call.receiver {
            Some(receiver) => Expression::MethodCall {
                receiver: Box::new(self.expr(receiver)?),
                method,
                args,
            },
            None => Expression::Call { name: method, args },
        })
    }

    /// Consecutive `key => value` arguments collapse into one hash.
    fn args(&mut self, args: &[Arg]) -> Result<Vec<Expression>, TranslateError> {
        let mut out = Vec::with_capacity(args.len());
        let mut pending: Vec<HashEntry> = Vec::new();
        for arg in args {
            let value = match arg {
                Arg::Pair(key, value) => {
                    pending.push(self.hash_entry(key, value)?);
                    continue;
                }
                Arg::Positional(expr) => self.expr(expr)?,
                Arg::Splat(expr) => Expression::Splat {
                    value: Box::new(self.expr(expr)?),
                },
                Arg::DoubleSplat(_) => return self.unsupported("double_splat"),
                Arg::BlockPass(_) => return self.unsupported("block_pass"),
            };
            if !pending.is_empty() {
                out.push(Expression::HashLiteral {
                    entries: std::mem::take(&mut pending),
                });
            }
            out.push(value);
        }
        if !pending.is_empty() {
            out.push(Expression::HashLiteral { entries: pending });
        }
        Ok(out)
    }

    fn hash_entry(&mut self, key: &Expr, value: &Expr) -> Result<HashEntry, TranslateError> {
        Ok(HashEntry {
            key: self.expr(key)?,
            value: self.expr(value)?,
        })
    }

    fn string_parts(&mut self, parts: &[StrPart]) -> Result<Vec<StringPart>, TranslateError> {
        parts
            .iter()
            .map(|part| match part {
                StrPart::Lit(text) => Ok(StringPart::Text {
                    value: text.clone(),
                }),
                StrPart::Interp(inner) => match inner.as_ref() {
                    Expr::Ident(name) if self.locals.contains(name) => {
                        Ok(StringPart::Var { name: name.clone() })
                    }
                    // `#{foo?}` is a call and gets the mangled name
                    Expr::Ident(name) => {
                        let method = self.method_name(name)?;
                        if method == *name {
                            Ok(StringPart::Var { name: method })
                        } else {
                            Ok(StringPart::Embedded {
                                expr: Expression::bare(method),
                            })
                        }
                    }
                    Expr::Const(name) => Ok(StringPart::Var { name: name.clone() }),
                    Expr::IVar(name) => Ok(StringPart::Var {
                        name: format!("@{name}"),
                    }),
                    other => Ok(StringPart::Embedded {
                        expr: self.expr(other)?,
                    }),
                },
            })
            .collect()
    }
}

/// `A::B::C` for constant-only paths.
fn constant_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Const(name) => Some(name.clone()),
        Expr::ScopedConst(base, name) => constant_path(base).map(|base| format!("{base}::{name}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CondKind;
    use crate::parse::parse;

    fn translate(src: &str) -> Result<Vec<Instruction>, TranslateError> {
        let recipe = parse(src).unwrap();
        let body = recipe.program().body.clone();
        translate_statements(&recipe, &body)
    }

    #[test]
    fn command_with_string_args() {
        let ir = translate("system \"make\", \"install\"\n").unwrap();
        assert_eq!(
            ir,
            vec![Instruction::command(
                "system",
                vec![Expression::string("make"), Expression::string("install")]
            )]
        );
    }

    #[test]
    fn modifier_with_predicate_condition() {
        let ir = translate("bin.install \"foo\" if build.with? \"feature\"\n").unwrap();
        let expected = Instruction::Conditional {
            kind: CondKind::If,
            cond: Expression::bare("build").method("with_query", vec![Expression::string("feature")]),
            then_branch: vec![Instruction::Expr {
                expr: Expression::bare("bin").method("install", vec![Expression::string("foo")]),
            }],
            else_branch: None,
        };
        assert_eq!(ir, vec![expected]);
    }

    #[test]
    fn interpolation_marks_bare_variables() {
        let ir = translate("system \"./configure\", \"--prefix=#{prefix}\", \"#{lib/\"x\"}\"\n").unwrap();
        let Instruction::Command { args, .. } = &ir[0] else {
            panic!("expected command")
        };
        assert_eq!(
            args[1],
            Expression::StringLiteral {
                parts: vec![
                    StringPart::Text {
                        value: "--prefix=".into()
                    },
                    StringPart::Var {
                        name: "prefix".into()
                    },
                ]
            }
        );
        assert!(matches!(
            &args[2],
            Expression::StringLiteral { parts } if matches!(parts[0], StringPart::Embedded { .. })
        ));
    }

    #[test]
    fn interpolated_predicates_are_mangled_calls() {
        let ir = translate("ohai \"#{foo?} #{bar!} #{name}\"\n").unwrap();
        let Instruction::Command { args, .. } = &ir[0] else {
            panic!("expected command")
        };
        let Expression::StringLiteral { parts } = &args[0] else {
            panic!("expected string")
        };
        assert_eq!(
            parts[0],
            StringPart::Embedded {
                expr: Expression::bare("foo_query")
            }
        );
        assert_eq!(
            parts[2],
            StringPart::Embedded {
                expr: Expression::bare("bar_bang")
            }
        );
        assert_eq!(
            parts[4],
            StringPart::Var {
                name: "name".into()
            }
        );

        let err = translate("ohai \"#{bar_query}\"\n").unwrap_err();
        assert_eq!(err.node_kind, "reserved_method_name");
    }

    #[test]
    fn literal_forms_without_ir_fail_by_kind() {
        let err = translate("inreplace \"Makefile\", /-O2/, \"-O3\"\n").unwrap_err();
        assert_eq!(err.node_kind, "regex");
        let err = translate("ohai $stdout\n").unwrap_err();
        assert_eq!(err.node_kind, "global_variable");
        let err = translate("x = -> { 1 }\n").unwrap_err();
        assert_eq!(err.node_kind, "lambda");
        let err = translate("x = `uname`\n").unwrap_err();
        assert_eq!(err.node_kind, "shell_command");
        // Character and `%q` literals are plain strings
        assert_eq!(
            translate("ohai ?a, %q(b)\n").unwrap(),
            vec![Instruction::command(
                "ohai",
                vec![Expression::string("a"), Expression::string("b")]
            )]
        );
    }

    #[test]
    fn locals_resolve_after_assignment() {
        let ir = translate("args = std_configure_args\nsystem \"./configure\", *args\n").unwrap();
        assert_eq!(
            ir[0],
            Instruction::Expr {
                expr: Expression::Assign {
                    target: Box::new(Expression::var("args")),
                    value: Box::new(Expression::bare("std_configure_args")),
                }
            }
        );
        let Instruction::Command { args, .. } = &ir[1] else {
            panic!("expected command")
        };
        assert_eq!(
            args[1],
            Expression::Splat {
                value: Box::new(Expression::var("args"))
            }
        );
    }

    #[test]
    fn elsif_nests_in_else() {
        let ir = translate("if OS.mac?\n  a\nelsif OS.linux?\n  b\nelse\n  c\nend\n").unwrap();
        let Instruction::Conditional { else_branch, .. } = &ir[0] else {
            panic!("expected conditional")
        };
        let nested = else_branch.as_ref().unwrap();
        assert_eq!(nested.len(), 1);
        let Instruction::Conditional {
            cond, else_branch, ..
        } = &nested[0]
        else {
            panic!("expected nested conditional")
        };
        assert_eq!(*cond, Expression::var("OS").method("linux_query", vec![]));
        assert_eq!(
            else_branch.as_deref(),
            Some(&[Instruction::Expr {
                expr: Expression::bare("c")
            }][..])
        );
    }

    #[test]
    fn block_params_are_scoped_locals() {
        let ir = translate("inreplace \"Makefile\" do |s|\n  s.gsub! \"a\", \"b\"\nend\ns\n").unwrap();
        let Instruction::Block { head, params, body } = &ir[0] else {
            panic!("expected block")
        };
        assert_eq!(**head, Instruction::command("inreplace", vec![Expression::string("Makefile")]));
        assert_eq!(params, &vec!["s".to_string()]);
        assert_eq!(
            body[0],
            Instruction::Expr {
                expr: Expression::var("s").method(
                    "gsub_bang",
                    vec![Expression::string("a"), Expression::string("b")]
                )
            }
        );
        // Outside the block `s` is unknown again
        assert_eq!(
            ir[1],
            Instruction::Expr {
                expr: Expression::bare("s")
            }
        );
    }

    #[test]
    fn trailing_pairs_become_one_hash() {
        let ir = translate("foo \"a\", \"b\" => \"c\", d: 1\n").unwrap();
        let Instruction::Command { args, .. } = &ir[0] else {
            panic!("expected command")
        };
        assert_eq!(args.len(), 2);
        let Expression::HashLiteral { entries } = &args[1] else {
            panic!("expected hash")
        };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn unsupported_constructs_fail_with_kind_and_context() {
        let err = translate("system \"a\"\nwhile x\n  y\nend\n").unwrap_err();
        assert_eq!(err.node_kind, "while");
        assert_eq!(err.line, 2);
        assert_eq!(err.context, "while x");

        let err = translate("x = cond ? 1 : 2\n").unwrap_err();
        assert_eq!(err.node_kind, "ternary");

        let err = translate("foo 1.5\n").unwrap_err();
        assert_eq!(err.node_kind, "float");

        let err = translate("names = items.map { |i| i.name }\n").unwrap_err();
        assert_eq!(err.node_kind, "block_call");

        let err = translate("ask_query\n").unwrap_err();
        assert_eq!(err.node_kind, "reserved_method_name");

        let err = translate("x ||= 1\n").unwrap_err();
        assert_eq!(err.node_kind, "op_assign");
    }

    #[test]
    fn error_in_nested_statement_points_at_it() {
        let err = translate("if x\n  a\n  b rescue nil\nend\n").unwrap_err();
        assert_eq!(err.node_kind, "rescue_modifier");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn translation_is_repeatable() {
        let src = "system \"make\"\nbin.install \"x\" unless build.head?\n";
        assert_eq!(translate(src).unwrap(), translate(src).unwrap());
    }
}
