//! Formula records: the structured output for one recipe file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::ir::Instruction;

/// Records keyed by formula name, in first-resolved order.
pub type FormulaMap = IndexMap<String, FormulaRecord>;

/// Dependency names grouped by tag, in declaration order.
pub type Dependencies = IndexMap<DependencyKind, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Runtime,
    Build,
    Test,
    Recommended,
    Optional,
}

impl DependencyKind {
    /// Parse a `depends_on "x" => :tag` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "run" | "runtime" => Some(DependencyKind::Runtime),
            "build" => Some(DependencyKind::Build),
            "test" => Some(DependencyKind::Test),
            "recommended" => Some(DependencyKind::Recommended),
            "optional" => Some(DependencyKind::Optional),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::Runtime => "runtime",
            DependencyKind::Build => "build",
            DependencyKind::Test => "test",
            DependencyKind::Recommended => "recommended",
            DependencyKind::Optional => "optional",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormulaRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebuild: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottle: Option<BottleInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable: Option<SourceSpec>,
    #[serde(default)]
    pub dependencies: Dependencies,
    /// Symbol-named requirements such as `:xcode`; never formula files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    /// Declarations from `on_linux`-style blocks, keyed by scope (`linux`,
    /// `macos_arm`)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub platforms: IndexMap<String, PlatformSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<Vec<Instruction>>,
    /// Translation failure kept under the lenient policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_error: Option<String>,
}

impl FormulaRecord {
    pub fn new(name: impl Into<String>) -> Self {
        FormulaRecord {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn runtime_dependencies(&self) -> &[String] {
        self.dependencies
            .get(&DependencyKind::Runtime)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Runtime dependencies plus those of every platform scope whose parts
    /// are all in `platforms`, without repeats.
    pub fn runtime_dependencies_on(&self, platforms: &[String]) -> Vec<String> {
        let scoped = self
            .platforms
            .iter()
            .filter(|(scope, _)| scope.split('_').all(|part| platforms.iter().any(|p| p == part)))
            .filter_map(|(_, spec)| spec.dependencies.get(&DependencyKind::Runtime))
            .flatten();
        let mut names: Vec<String> = Vec::new();
        for name in self.runtime_dependencies().iter().chain(scoped) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// What one platform block declares.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlatformSpec {
    #[serde(default)]
    pub dependencies: Dependencies,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
}

/// Prebuilt binary descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BottleInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cellar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebuild: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Platform tag to checksum
    #[serde(default)]
    pub releases: IndexMap<String, String>,
}

/// Alternate source: `head` or `stable`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceSpec {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
}
