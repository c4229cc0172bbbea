//! Directive interpreter: the declarative class body to a [`FormulaRecord`]
//!
//! A static walk with closed dispatch. Every call in the class body must name
//! a known directive; directives that carry no field (`license`, `livecheck`,
//! `test`, ...) are accepted and ignored, anything else is an error.
//! Platform blocks (`on_linux do ... end`) are walked too: their dependencies
//! land in [`FormulaRecord::platforms`] under the block's scope.
//! Argument values are evaluated without running anything: string literals,
//! symbols, integers and arrays, plus `#{version}` interpolation.

use crate::ast::syntax::{Arg, Block, ClassDecl, Expr, Stmt, StmtKind, StrPart};
use crate::parse::Recipe;
use crate::record::{BottleInfo, Dependencies, DependencyKind, FormulaRecord, SourceSpec};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("unknown directive `{name}` at line {line}")]
    UnknownDirective { name: String, line: usize },

    #[error("invalid arguments to `{directive}` at line {line}: {reason}")]
    InvalidArguments {
        directive: String,
        line: usize,
        reason: String,
    },

    #[error("unsupported {kind} in formula body at line {line}")]
    UnsupportedDeclaration { kind: &'static str, line: usize },
}

/// Class-body directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Desc,
    Homepage,
    Url,
    Sha256,
    Version,
    Revision,
    DependsOn,
    Bottle,
    Head,
    Stable,
    /// `on_macos`, `on_linux`, `on_arm`, `on_intel`, with the scope they open
    Platform(&'static str),
    /// Accepted, no effect on the record
    Inert,
}

const INERT_DIRECTIVES: &[&str] = &[
    "resource",
    "mirror",
    "uses_from_macos",
    "version_scheme",
    "test",
    "patch",
    "license",
    "livecheck",
    "option",
    "conflicts_with",
    "keg_only",
    "fails_with",
    "deprecate!",
    "disable!",
    "plist_options",
    "pour_bottle?",
    "skip_clean",
    "cxxstdlib_check",
    "link_overwrite",
    "service",
    "include",
];

impl Directive {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "desc" => Directive::Desc,
            "homepage" => Directive::Homepage,
            "url" => Directive::Url,
            "sha256" => Directive::Sha256,
            "version" => Directive::Version,
            "revision" => Directive::Revision,
            "depends_on" => Directive::DependsOn,
            "bottle" => Directive::Bottle,
            "head" => Directive::Head,
            "stable" => Directive::Stable,
            "on_macos" => Directive::Platform("macos"),
            "on_linux" => Directive::Platform("linux"),
            "on_arm" => Directive::Platform("arm"),
            "on_intel" => Directive::Platform("intel"),
            name if INERT_DIRECTIVES.contains(&name) => Directive::Inert,
            _ => return None,
        })
    }
}

/// A receiver-less call in a directive body.
struct DirectiveCall<'a> {
    name: &'a str,
    args: &'a [Arg],
    block: Option<&'a Block>,
    line: usize,
}

impl DirectiveCall<'_> {
    fn invalid(&self, reason: impl Into<String>) -> DirectiveError {
        DirectiveError::InvalidArguments {
            directive: self.name.to_string(),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn unknown(&self) -> DirectiveError {
        DirectiveError::UnknownDirective {
            name: self.name.to_string(),
            line: self.line,
        }
    }

    /// First argument as a string; trailing `key: value` options are allowed.
    fn string_arg(&self, version: Option<&str>) -> Result<String, DirectiveError> {
        match self.args {
            [Arg::Positional(expr), options @ ..]
                if options.iter().all(|arg| matches!(arg, Arg::Pair(..))) =>
            {
                eval_string(expr, version).map_err(|reason| self.invalid(reason))
            }
            _ => Err(self.invalid("expected a string argument")),
        }
    }

    fn int_arg(&self) -> Result<i64, DirectiveError> {
        match self.args {
            [Arg::Positional(Expr::Int(value))] => Ok(*value),
            _ => Err(self.invalid("expected an integer argument")),
        }
    }
}

/// Build the record for a formula class; `version` and `install` are left for
/// the loader.
pub fn interpret_class(recipe: &Recipe, class: &ClassDecl) -> Result<FormulaRecord, DirectiveError> {
    let mut record = FormulaRecord::new(class.short_name().to_lowercase());
    for call in directive_calls(recipe, &class.body, true)? {
        apply(recipe, &mut record, &call)?;
    }
    if let Some(rebuild) = record.bottle.as_ref().and_then(|bottle| bottle.rebuild) {
        record.rebuild = Some(rebuild);
    }
    Ok(record)
}

/// Statements of a directive body as calls. Method definitions are skipped
/// when `skip_defs` is set.
fn directive_calls<'a>(
    recipe: &Recipe,
    body: &'a [Stmt],
    skip_defs: bool,
) -> Result<Vec<DirectiveCall<'a>>, DirectiveError> {
    let mut calls = Vec::with_capacity(body.len());
    for stmt in body {
        let line = recipe.line_of(stmt.span.start);
        match &stmt.kind {
            StmtKind::Def(_) if skip_defs => {}
            StmtKind::Expr(Expr::Call(call)) if call.receiver.is_none() => {
                calls.push(DirectiveCall {
                    name: &call.name,
                    args: &call.args,
                    block: call.block.as_ref(),
                    line,
                });
            }
            StmtKind::Expr(Expr::Ident(name)) => calls.push(DirectiveCall {
                name: name.as_str(),
                args: &[],
                block: None,
                line,
            }),
            other => {
                return Err(DirectiveError::UnsupportedDeclaration {
                    kind: other.kind_name(),
                    line,
                });
            }
        }
    }
    Ok(calls)
}

fn apply(
    recipe: &Recipe,
    record: &mut FormulaRecord,
    call: &DirectiveCall<'_>,
) -> Result<(), DirectiveError> {
    let directive = Directive::from_name(call.name).ok_or_else(|| call.unknown())?;
    let version = record.version.clone();
    match directive {
        Directive::Desc => record.desc = Some(call.string_arg(version.as_deref())?),
        Directive::Homepage => record.homepage = Some(call.string_arg(version.as_deref())?),
        Directive::Url => record.url = Some(call.string_arg(version.as_deref())?),
        Directive::Sha256 => record.sha256 = Some(call.string_arg(version.as_deref())?),
        Directive::Version => record.version = Some(call.string_arg(None)?),
        Directive::Revision => record.revision = Some(call.int_arg()?),
        Directive::DependsOn => depends_on(call, &mut record.dependencies, &mut record.requirements)?,
        Directive::Bottle => {
            if let Some(bottle) = bottle(recipe, call)? {
                record.bottle = Some(bottle);
            }
        }
        Directive::Head => record.head = Some(source_spec(recipe, call, version.as_deref())?),
        Directive::Stable => {
            let spec = source_spec(recipe, call, version.as_deref())?;
            record.url = Some(spec.url.clone());
            if spec.sha256.is_some() {
                record.sha256.clone_from(&spec.sha256);
            }
            if spec.version.is_some() {
                record.version.clone_from(&spec.version);
            }
            record.stable = Some(spec);
        }
        Directive::Platform(scope) => platform_block(recipe, record, call, scope)?,
        Directive::Inert => {}
    }
    Ok(())
}

/// `on_linux do ... end` and friends. Only dependencies and inert directives
/// may appear inside; nested blocks join their scopes (`macos_arm`).
fn platform_block(
    recipe: &Recipe,
    record: &mut FormulaRecord,
    call: &DirectiveCall<'_>,
    scope: &str,
) -> Result<(), DirectiveError> {
    let Some(block) = call.block else {
        return Err(call.invalid("expected a block"));
    };
    for inner in directive_calls(recipe, &block.body, false)? {
        match Directive::from_name(inner.name).ok_or_else(|| inner.unknown())? {
            Directive::DependsOn => {
                let platform = record.platforms.entry(scope.to_string()).or_default();
                depends_on(&inner, &mut platform.dependencies, &mut platform.requirements)?;
            }
            Directive::Platform(nested) => {
                platform_block(recipe, record, &inner, &join_scope(scope, nested))?;
            }
            Directive::Inert => {}
            _ => return Err(inner.invalid(format!("not supported inside `{}`", call.name))),
        }
    }
    Ok(())
}

fn join_scope(outer: &str, inner: &str) -> String {
    if outer.split('_').any(|segment| segment == inner) {
        outer.to_string()
    } else {
        format!("{outer}_{inner}")
    }
}

/// `depends_on "x"`, `depends_on "x" => :build`, `depends_on "x" => [:build, :test]`,
/// `depends_on :xcode`, `depends_on xcode: :build`.
fn depends_on(
    call: &DirectiveCall<'_>,
    dependencies: &mut Dependencies,
    requirements: &mut Vec<String>,
) -> Result<(), DirectiveError> {
    let (target, tags) = match call.args.first() {
        Some(Arg::Positional(target)) => (target, None),
        Some(Arg::Pair(target, tags)) => (target, Some(tags)),
        _ => return Err(call.invalid("expected a dependency name")),
    };

    match target {
        Expr::Sym(name) => {
            requirements.push(name.clone());
            Ok(())
        }
        Expr::Str(_) => {
            let name = eval_string(target, None).map_err(|reason| call.invalid(reason))?;
            let kinds = match tags {
                None => vec![DependencyKind::Runtime],
                Some(tags) => dependency_kinds(call, tags)?,
            };
            for kind in kinds {
                dependencies.entry(kind).or_default().push(name.clone());
            }
            Ok(())
        }
        _ => Err(call.invalid("dependency name must be a string or symbol")),
    }
}

fn dependency_kinds(
    call: &DirectiveCall<'_>,
    tags: &Expr,
) -> Result<Vec<DependencyKind>, DirectiveError> {
    let names: Vec<&str> = match tags {
        Expr::Sym(tag) => vec![tag.as_str()],
        Expr::Array(items) => items
            .iter()
            .map(|item| match item {
                Expr::Sym(tag) => Ok(tag.as_str()),
                _ => Err(call.invalid("dependency tags must be symbols")),
            })
            .collect::<Result<_, _>>()?,
        Expr::SymbolArray(items) => items.iter().map(String::as_str).collect(),
        _ => return Err(call.invalid("dependency tags must be symbols")),
    };
    names
        .into_iter()
        .map(|tag| {
            DependencyKind::from_tag(tag)
                .ok_or_else(|| call.invalid(format!("unknown dependency tag `:{tag}`")))
        })
        .collect()
}

/// `bottle do ... end`; `bottle :unneeded` contributes nothing.
fn bottle(recipe: &Recipe, call: &DirectiveCall<'_>) -> Result<Option<BottleInfo>, DirectiveError> {
    let Some(block) = call.block else {
        return match call.args {
            [Arg::Positional(Expr::Sym(_))] => Ok(None),
            _ => Err(call.invalid("expected a block")),
        };
    };

    let mut info = BottleInfo::default();
    for inner in directive_calls(recipe, &block.body, false)? {
        match inner.name {
            "cellar" => info.cellar = Some(scalar(&inner)?),
            "rebuild" => info.rebuild = Some(inner.int_arg()?),
            "root_url" => info.root_url = Some(inner.string_arg(None)?),
            "prefix" => info.prefix = Some(inner.string_arg(None)?),
            "sha256" => bottle_sha256(&inner, &mut info)?,
            _ => return Err(inner.unknown()),
        }
    }
    Ok(Some(info))
}

/// `sha256 "abc" => :big_sur` or `sha256 cellar: :any, arm64_sonoma: "abc"`.
fn bottle_sha256(call: &DirectiveCall<'_>, info: &mut BottleInfo) -> Result<(), DirectiveError> {
    if call.args.is_empty() {
        return Err(call.invalid("expected checksums"));
    }
    for arg in call.args {
        let Arg::Pair(key, value) = arg else {
            return Err(call.invalid("expected `checksum => :platform` or `platform: checksum`"));
        };
        match (key, value) {
            (Expr::Str(_), Expr::Sym(platform)) => {
                let sha = eval_string(key, None).map_err(|reason| call.invalid(reason))?;
                info.releases.insert(platform.clone(), sha);
            }
            (Expr::Sym(field), value) if field == "cellar" => {
                info.cellar = Some(scalar_value(value).map_err(|reason| call.invalid(reason))?);
            }
            (Expr::Sym(platform), value) => {
                let sha = eval_string(value, None).map_err(|reason| call.invalid(reason))?;
                info.releases.insert(platform.clone(), sha);
            }
            _ => return Err(call.invalid("unrecognized checksum entry")),
        }
    }
    Ok(())
}

/// `head "url"`, `head "url", branch: "main"`, or a `head`/`stable` block.
fn source_spec(
    recipe: &Recipe,
    call: &DirectiveCall<'_>,
    version: Option<&str>,
) -> Result<SourceSpec, DirectiveError> {
    let mut spec = SourceSpec::default();
    let mut has_url = false;
    if !call.args.is_empty() {
        spec.url = call.string_arg(version)?;
        has_url = true;
    }

    if let Some(block) = call.block {
        let mut dependencies = Dependencies::new();
        // Requirements inside alternate sources are not recorded
        let mut requirements = Vec::new();
        for inner in directive_calls(recipe, &block.body, false)? {
            let scoped_version = spec.version.as_deref().or(version);
            match inner.name {
                "url" => {
                    spec.url = inner.string_arg(scoped_version)?;
                    has_url = true;
                }
                "sha256" => spec.sha256 = Some(inner.string_arg(scoped_version)?),
                "version" => spec.version = Some(inner.string_arg(None)?),
                "depends_on" => depends_on(&inner, &mut dependencies, &mut requirements)?,
                "mirror" | "patch" | "resource" => {}
                _ => return Err(inner.unknown()),
            }
        }
        if !dependencies.is_empty() {
            spec.dependencies = Some(dependencies);
        }
    }

    if has_url {
        Ok(spec)
    } else {
        Err(call.invalid("missing url"))
    }
}

fn scalar(call: &DirectiveCall<'_>) -> Result<String, DirectiveError> {
    match call.args {
        [Arg::Positional(value)] => scalar_value(value).map_err(|reason| call.invalid(reason)),
        _ => Err(call.invalid("expected one value")),
    }
}

/// A string or symbol value; symbols keep no colon (`:any` gives `any`).
fn scalar_value(expr: &Expr) -> Result<String, String> {
    match expr {
        Expr::Sym(name) => Ok(name.clone()),
        other => eval_string(other, None),
    }
}

/// Static value of a string literal. `#{version}` resolves to `version`.
fn eval_string(expr: &Expr, version: Option<&str>) -> Result<String, String> {
    let Expr::Str(parts) = expr else {
        return Err(format!("expected a string literal, found {}", expr.kind_name()));
    };
    let mut out = String::new();
    for part in parts {
        match part {
            StrPart::Lit(text) => out.push_str(text),
            StrPart::Interp(inner) => match (inner.as_ref(), version) {
                (Expr::Ident(name), Some(version)) if name == "version" => out.push_str(version),
                (Expr::Ident(name), None) if name == "version" => {
                    return Err("`version` interpolated before it is declared".to_string());
                }
                _ => return Err("only `#{version}` may be interpolated".to_string()),
            },
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn interpret(body: &str) -> Result<FormulaRecord, DirectiveError> {
        let src = format!("class Demo < Formula\n{body}\nend\n");
        let recipe = parse(&src).unwrap();
        let StmtKind::Class(class) = &recipe.program().body[0].kind else {
            panic!("expected class")
        };
        interpret_class(&recipe, class)
    }

    #[test]
    fn scalar_fields() {
        let record = interpret(
            "  desc \"A tool\"\n  homepage \"https://x\"\n  url \"https://x/pkg-1.2.tar.gz\", using: :homebrew_curl\n  sha256 \"abcd\"\n  revision 2\n  license \"MIT\"",
        )
        .unwrap();
        assert_eq!(record.name, "demo");
        assert_eq!(record.desc.as_deref(), Some("A tool"));
        assert_eq!(record.url.as_deref(), Some("https://x/pkg-1.2.tar.gz"));
        assert_eq!(record.sha256.as_deref(), Some("abcd"));
        assert_eq!(record.revision, Some(2));
        assert_eq!(record.version, None);
    }

    #[test]
    fn dependency_forms() {
        let record = interpret(
            "  depends_on \"foo\"\n  depends_on \"bar\" => :build\n  depends_on \"baz\" => [:build, :test]\n  depends_on :xcode\n  depends_on macos: :catalina",
        )
        .unwrap();
        let deps = &record.dependencies;
        assert_eq!(deps[&DependencyKind::Runtime], vec!["foo"]);
        assert_eq!(deps[&DependencyKind::Build], vec!["bar", "baz"]);
        assert_eq!(deps[&DependencyKind::Test], vec!["baz"]);
        assert_eq!(record.requirements, vec!["xcode", "macos"]);
    }

    #[test]
    fn unknown_dependency_tag() {
        let err = interpret("  depends_on \"x\" => :linked").unwrap_err();
        assert!(matches!(err, DirectiveError::InvalidArguments { ref directive, .. } if directive == "depends_on"));
    }

    #[test]
    fn bottle_both_checksum_forms() {
        let record = interpret(
            "  bottle do\n    rebuild 1\n    root_url \"https://ghcr.io/v2\"\n    sha256 \"aaa\" => :big_sur\n    sha256 cellar: :any, arm64_sonoma: \"bbb\"\n  end",
        )
        .unwrap();
        let bottle = record.bottle.unwrap();
        assert_eq!(bottle.rebuild, Some(1));
        assert_eq!(record.rebuild, Some(1));
        assert_eq!(bottle.cellar.as_deref(), Some("any"));
        assert_eq!(bottle.root_url.as_deref(), Some("https://ghcr.io/v2"));
        assert_eq!(bottle.releases["big_sur"], "aaa");
        assert_eq!(bottle.releases["arm64_sonoma"], "bbb");
    }

    #[test]
    fn bottle_unneeded() {
        let record = interpret("  bottle :unneeded").unwrap();
        assert!(record.bottle.is_none());
    }

    #[test]
    fn head_and_stable() {
        let record = interpret(
            "  url \"https://x/a-1.0.tar.gz\"\n  head do\n    url \"https://git/x.git\"\n    depends_on \"autoconf\" => :build\n  end\n  stable do\n    url \"https://x/a-2.0.tar.gz\"\n    sha256 \"ffff\"\n  end",
        )
        .unwrap();
        let head = record.head.unwrap();
        assert_eq!(head.url, "https://git/x.git");
        assert_eq!(
            head.dependencies.unwrap()[&DependencyKind::Build],
            vec!["autoconf"]
        );
        assert_eq!(record.url.as_deref(), Some("https://x/a-2.0.tar.gz"));
        assert_eq!(record.sha256.as_deref(), Some("ffff"));

        let record = interpret("  url \"https://x/a-1.0.tar.gz\"\n  head \"https://git/x.git\", branch: \"main\"").unwrap();
        assert_eq!(record.url.as_deref(), Some("https://x/a-1.0.tar.gz"));
        assert_eq!(record.head.unwrap().url, "https://git/x.git");
    }

    #[test]
    fn version_interpolation() {
        let record = interpret("  version \"1.4\"\n  url \"https://x/a-#{version}.tgz\"").unwrap();
        assert_eq!(record.url.as_deref(), Some("https://x/a-1.4.tgz"));

        let err = interpret("  url \"https://x/a-#{version}.tgz\"").unwrap_err();
        assert!(matches!(err, DirectiveError::InvalidArguments { .. }));
        let err = interpret("  url \"https://x/#{name}.tgz\"").unwrap_err();
        assert!(matches!(err, DirectiveError::InvalidArguments { .. }));
    }

    #[test]
    fn unknown_and_unsupported() {
        let err = interpret("  frobnicate \"x\"").unwrap_err();
        assert_eq!(
            err,
            DirectiveError::UnknownDirective {
                name: "frobnicate".into(),
                line: 2
            }
        );
        let err = interpret("  if OS.mac?\n    desc \"x\"\n  end").unwrap_err();
        assert!(matches!(err, DirectiveError::UnsupportedDeclaration { kind: "if", line: 2 }));
    }

    #[test]
    fn platform_blocks_scope_dependencies() {
        let record = interpret(
            "  uses_from_macos \"zlib\"\n  on_linux do\n    depends_on \"gcc\"\n    depends_on \"patchelf\" => :build\n    uses_from_macos \"bzip2\"\n  end\n  on_macos do\n    depends_on :xcode\n    on_arm do\n      depends_on \"llvm\"\n    end\n    keg_only :provided_by_macos\n  end",
        )
        .unwrap();
        assert!(record.dependencies.is_empty());
        let linux = &record.platforms["linux"];
        assert_eq!(linux.dependencies[&DependencyKind::Runtime], vec!["gcc"]);
        assert_eq!(linux.dependencies[&DependencyKind::Build], vec!["patchelf"]);
        assert_eq!(record.platforms["macos"].requirements, vec!["xcode"]);
        assert_eq!(
            record.platforms["macos_arm"].dependencies[&DependencyKind::Runtime],
            vec!["llvm"]
        );
    }

    #[test]
    fn source_fields_inside_platform_blocks_fail() {
        let err = interpret("  on_macos do\n    url \"https://x/a-1.0.tar.gz\"\n  end").unwrap_err();
        assert!(
            matches!(err, DirectiveError::InvalidArguments { ref directive, line: 3, .. } if directive == "url"),
            "{err:?}"
        );
        let err = interpret("  on_linux do\n    frobnicate\n  end").unwrap_err();
        assert!(matches!(err, DirectiveError::UnknownDirective { line: 3, .. }));
        let err = interpret("  on_linux").unwrap_err();
        assert!(matches!(err, DirectiveError::InvalidArguments { .. }));
    }

    #[test]
    fn inert_directives_and_methods() {
        let record = interpret(
            "  livecheck do\n    url :stable\n  end\n  uses_from_macos \"zlib\"\n  keg_only :provided_by_macos\n  def caveats\n    \"x\"\n  end\n  test do\n    system \"true\"\n  end",
        )
        .unwrap();
        assert!(record.dependencies.is_empty());
    }
}
