//! Formulary - static loader for Homebrew-style formula recipes
//!
//! Reads Ruby formula files without a Ruby interpreter. The declarative class
//! body becomes a [`FormulaRecord`]; the `install` method becomes a portable
//! [`Instruction`] list that other tools can inspect or render.
//!
//! ## Quick Start
//!
//! ```ignore
//! use formulary::{FormulaLoader, FormulaMap, LoadOptions, TranslationPolicy};
//!
//! let loader = FormulaLoader::new()
//!     .with_options(LoadOptions::new().with_translation_policy(TranslationPolicy::KeepMetadata));
//!
//! // One file
//! let jq = loader.load_file("Formula/jq.rb".as_ref())?;
//! println!("{}", formulary::render_instructions(jq.install.as_deref().unwrap_or_default()));
//!
//! // A file and its runtime dependencies, resolved from sibling files
//! let mut formulae = FormulaMap::new();
//! loader.load_closure("Formula/jq.rb".as_ref(), &mut formulae)?;
//! ```
//!
//! ## Pipeline
//!
//! - `parse`: heredoc normalization, then a winnow grammar for the Ruby subset
//! - `locate`: the formula class and its `install` method
//! - `directives`: `desc`, `url`, `depends_on`, `bottle`, ... into the record
//! - `translate`: the install body into IR; unsupported constructs fail loudly
//! - `resolve`: the runtime dependency closure over sibling files

mod ast;
mod config;
mod directives;
mod locate;
pub mod naming;
mod parse;
mod record;
mod render;
mod resolve;
mod translate;
mod version;

use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

// ============ Primary Public API ============

pub use ast::CondKind;
pub use ast::ir::{Expression, HashEntry, Instruction, StringPart};
pub use config::{LoadOptions, TranslationPolicy};
pub use record::{
    BottleInfo, Dependencies, DependencyKind, FormulaMap, FormulaRecord, PlatformSpec, SourceSpec,
};
pub use render::render_instructions;
pub use version::{UrlVersion, VersionParser};

pub use directives::DirectiveError;
pub use parse::ParseError;
pub use translate::TranslateError;

/// Load one recipe file with default options.
pub fn load_formula(path: impl AsRef<Path>) -> Result<FormulaRecord, FormulaError> {
    FormulaLoader::new().load_file(path.as_ref())
}

/// Load a recipe and its runtime dependency closure with default options.
pub fn load_closure(root: impl AsRef<Path>) -> Result<FormulaMap, FormulaError> {
    let mut formulae = FormulaMap::new();
    FormulaLoader::new().load_closure(root.as_ref(), &mut formulae)?;
    Ok(formulae)
}

// ============ Loader ============

/// Single-file pipeline plus closure loading (see [`FormulaLoader::load_closure`]).
#[derive(Debug, Clone, Default)]
pub struct FormulaLoader<V = UrlVersion> {
    options: LoadOptions,
    version_parser: V,
}

impl FormulaLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: VersionParser> FormulaLoader<V> {
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the collaborator used when a recipe declares no version.
    pub fn with_version_parser<W: VersionParser>(self, version_parser: W) -> FormulaLoader<W> {
        FormulaLoader {
            options: self.options,
            version_parser,
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn load_file(&self, path: &Path) -> Result<FormulaRecord, FormulaError> {
        debug!("loading {}", path.display());
        let source = std::fs::read_to_string(path).map_err(|source| FormulaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_source(path, &source)
    }

    /// Run the pipeline over `source`; `path` is only used in errors and logs.
    pub fn load_source(&self, path: &Path, source: &str) -> Result<FormulaRecord, FormulaError> {
        let recipe = parse::parse(source).map_err(|source| FormulaError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let class = locate::formula_class(recipe.program()).ok_or_else(|| {
            FormulaError::NoFormulaClass {
                path: path.to_path_buf(),
            }
        })?;

        let mut record =
            directives::interpret_class(&recipe, class).map_err(|source| FormulaError::Directive {
                path: path.to_path_buf(),
                source,
            })?;
        self.derive_version(path, &mut record);

        let Some(body) = locate::install_body(class) else {
            return self.missing_install(path, record);
        };
        match translate::translate_statements(&recipe, body) {
            Ok(instructions) => record.install = Some(instructions),
            Err(err) => match self.options.translation_policy {
                TranslationPolicy::Fail => {
                    return Err(FormulaError::Translation {
                        path: path.to_path_buf(),
                        source: err,
                    });
                }
                TranslationPolicy::KeepMetadata => {
                    warn!("{}: keeping metadata only: {err}", path.display());
                    record.install_error = Some(err.to_string());
                }
            },
        }
        Ok(record)
    }

    fn derive_version(&self, path: &Path, record: &mut FormulaRecord) {
        if record.version.is_some() {
            return;
        }
        let Some(url) = record.url.as_deref() else {
            return;
        };
        record.version = self.version_parser.parse(url);
        if record.version.is_none() {
            warn!("{}: no version derivable from {url}", path.display());
        }
    }

    fn missing_install(
        &self,
        path: &Path,
        mut record: FormulaRecord,
    ) -> Result<FormulaRecord, FormulaError> {
        match self.options.translation_policy {
            TranslationPolicy::Fail => Err(FormulaError::MissingInstallBlock {
                path: path.to_path_buf(),
                formula: record.name,
            }),
            TranslationPolicy::KeepMetadata => {
                warn!("{}: `{}` has no install method", path.display(), record.name);
                record.install_error = Some("no install method".to_string());
                Ok(record)
            }
        }
    }
}

// ============ Errors ============

#[derive(Error, Debug)]
pub enum FormulaError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: parse error: {source}", .path.display())]
    Parse { path: PathBuf, source: ParseError },

    #[error("{}: {source}", .path.display())]
    Directive {
        path: PathBuf,
        source: DirectiveError,
    },

    #[error("{}: no class deriving from Formula", .path.display())]
    NoFormulaClass { path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Translation {
        path: PathBuf,
        source: TranslateError,
    },

    #[error("{}: formula `{formula}` has no install method", .path.display())]
    MissingInstallBlock { path: PathBuf, formula: String },

    #[error("`{required_by}` depends on `{name}`, but {} does not exist", .expected_path.display())]
    MissingDependencyFile {
        name: String,
        expected_path: PathBuf,
        required_by: String,
    },

    #[error("dependency chain deeper than {limit} at `{name}`")]
    DepthExceeded { name: String, limit: usize },
}

/// Building blocks of the pipeline, for tools that need the syntax tree.
#[doc(hidden)]
pub mod advanced {
    pub use crate::ast::Span;
    pub use crate::ast::syntax;
    pub use crate::directives::{Directive, interpret_class};
    pub use crate::locate::{formula_class, install_body};
    pub use crate::parse::{Recipe, parse};
    pub use crate::translate::translate_statements;
}
