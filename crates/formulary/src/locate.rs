//! Find the formula class and its `install` method in a parsed recipe.

use crate::ast::syntax::{ClassDecl, Expr, Program, Stmt, StmtKind};

const FORMULA_BASE: &str = "Formula";

/// The last class deriving from `Formula` (or `Some::Formula`), searched at
/// top level and inside modules.
pub fn formula_class(program: &Program) -> Option<&ClassDecl> {
    last_formula_class(&program.body)
}

fn last_formula_class(body: &[Stmt]) -> Option<&ClassDecl> {
    body.iter().rev().find_map(|stmt| match &stmt.kind {
        StmtKind::Class(class) if is_formula_base(class.superclass.as_ref()) => Some(class),
        StmtKind::Module { body, .. } => last_formula_class(body),
        _ => None,
    })
}

fn is_formula_base(superclass: Option<&Expr>) -> bool {
    match superclass {
        Some(Expr::Const(name)) => name == FORMULA_BASE,
        Some(Expr::ScopedConst(_, name)) => name == FORMULA_BASE,
        _ => false,
    }
}

/// Body of the last instance `def install` in the class.
pub fn install_body(class: &ClassDecl) -> Option<&[Stmt]> {
    class.body.iter().rev().find_map(|stmt| match &stmt.kind {
        StmtKind::Def(def) if def.name == "install" && !def.singleton => Some(def.body.as_slice()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn picks_last_formula_class() {
        let recipe = parse(
            "class Helper\nend\nclass Old < Formula\nend\nmodule Homebrew\n  class Jq < Homebrew::Formula\n  end\nend\nclass Other < Base\nend\n",
        )
        .unwrap();
        let class = formula_class(recipe.program()).unwrap();
        assert_eq!(class.short_name(), "Jq");
    }

    #[test]
    fn no_formula_class() {
        let recipe = parse("class Helper < Base\nend\nputs 1\n").unwrap();
        assert!(formula_class(recipe.program()).is_none());
    }

    #[test]
    fn last_install_wins() {
        let recipe = parse(
            "class A < Formula\n  def install\n    system \"one\"\n  end\n  def self.install\n  end\n  def install\n    system \"two\"\n    system \"three\"\n  end\n  def caveats\n  end\nend\n",
        )
        .unwrap();
        let class = formula_class(recipe.program()).unwrap();
        assert_eq!(install_body(class).unwrap().len(), 2);
    }

    #[test]
    fn missing_install() {
        let recipe = parse("class A < Formula\n  desc \"x\"\nend\n").unwrap();
        let class = formula_class(recipe.program()).unwrap();
        assert!(install_body(class).is_none());
    }
}
