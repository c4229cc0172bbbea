//! Text rendering for the install IR
//!
//! Expressions render on one line (`Display`). Instructions render one per
//! line, with conditional and block bodies indented four spaces:
//!
//! ```text
//! system("make", "install")
//! if build.with_query("docs"):
//!     doc.install("README")
//! else:
//!     ohai("skipping docs")
//! ```

use std::fmt::{self, Display, Write};

use crate::ast::ir::{Expression, Instruction, StringPart};

const INDENT: &str = "    ";

// ============ Display (single-line) ============

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::StringLiteral { parts } => {
                write!(f, "\"")?;
                for part in parts {
                    match part {
                        StringPart::Text { value } => write!(f, "{}", escape_string(value))?,
                        StringPart::Var { name } => write!(f, "${name}")?,
                        StringPart::Embedded { expr } => write!(f, "${{{expr}}}")?,
                    }
                }
                write!(f, "\"")
            }
            Expression::VarRef { name } | Expression::BareCall { name } => write!(f, "{name}"),
            Expression::Call { name, args } => {
                write!(f, "{name}(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                write_operand(f, receiver)?;
                write!(f, ".{method}")?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    write_args(f, args)?;
                    write!(f, ")")?;
                }
                Ok(())
            }
            Expression::Binary { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {op} ")?;
                write_operand(f, right)
            }
            Expression::Unary { op, operand } => {
                if op.chars().all(char::is_alphabetic) {
                    write!(f, "{op} ")?;
                } else {
                    write!(f, "{op}")?;
                }
                write_operand(f, operand)
            }
            Expression::ArrayLiteral => write!(f, "[...]"),
            Expression::HashLiteral { entries } => {
                write!(f, "{{")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} => {}", entry.key, entry.value)?;
                }
                write!(f, "}}")
            }
            Expression::Index { base, subscript } => {
                write_operand(f, base)?;
                write!(f, "[{subscript}]")
            }
            Expression::SymbolLiteral { name } => write!(f, ":{name}"),
            Expression::IntLiteral { value } => write!(f, "{value}"),
            Expression::Splat { value } => {
                write!(f, "*")?;
                write_operand(f, value)
            }
            Expression::Assign { target, value } => write!(f, "{target} = {value}"),
        }
    }
}

/// Nested operators and assignments get parentheses.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expression) -> fmt::Result {
    match expr {
        Expression::Binary { .. } | Expression::Assign { .. } | Expression::Unary { .. } => {
            write!(f, "({expr})")
        }
        _ => write!(f, "{expr}"),
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expression]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

/// Escape text so `$` never reads as a substitution.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

// ============ Instructions (multi-line) ============

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        render_instruction(&mut out, self, 0)?;
        // Drop the final newline so `{}` composes like other Display impls
        write!(f, "{}", out.trim_end_matches('\n'))
    }
}

/// An instruction list in its multi-line form.
struct Listing<'a>(&'a [Instruction]);

impl Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for instruction in self.0 {
            render_instruction(&mut out, instruction, 0)?;
        }
        f.write_str(&out)
    }
}

/// Render an instruction list, one line per step.
pub fn render_instructions(instructions: &[Instruction]) -> String {
    Listing(instructions).to_string()
}

fn render_instruction(out: &mut String, instruction: &Instruction, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match instruction {
        Instruction::Command { name, args } => {
            write!(out, "{pad}{name}(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write!(out, "{arg}")?;
            }
            out.push_str(")\n");
        }
        Instruction::Expr { expr } => writeln!(out, "{pad}{expr}")?,
        Instruction::Conditional {
            kind,
            cond,
            then_branch,
            else_branch,
        } => {
            writeln!(out, "{pad}{} {cond}:", kind.keyword())?;
            render_body(out, then_branch, depth + 1)?;
            if let Some(else_branch) = else_branch {
                writeln!(out, "{pad}else:")?;
                render_body(out, else_branch, depth + 1)?;
            }
        }
        Instruction::Block { head, params, body } => {
            let mut head_line = String::new();
            render_instruction(&mut head_line, head, 0)?;
            write!(out, "{pad}{} do", head_line.trim_end())?;
            if !params.is_empty() {
                write!(out, " |{}|", params.join(", "))?;
            }
            out.push_str(":\n");
            render_body(out, body, depth + 1)?;
        }
    }
    Ok(())
}

fn render_body(out: &mut String, body: &[Instruction], depth: usize) -> fmt::Result {
    if body.is_empty() {
        writeln!(out, "{}pass", INDENT.repeat(depth))?;
    }
    for instruction in body {
        render_instruction(out, instruction, depth)?;
    }
    Ok(())
}
