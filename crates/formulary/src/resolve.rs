//! Runtime dependency closure over sibling recipe files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::record::FormulaMap;
use crate::version::VersionParser;
use crate::{FormulaError, FormulaLoader};

struct Closure<'m> {
    visited: HashSet<PathBuf>,
    out: &'m mut FormulaMap,
}

impl<V: VersionParser> FormulaLoader<V> {
    /// Load `root` and, recursively, every runtime dependency found next to it
    /// as `<name>.<extension>`. Records go into `out` keyed by name. Each file
    /// is loaded once per call, so diamonds and cycles terminate.
    pub fn load_closure(&self, root: &Path, out: &mut FormulaMap) -> Result<(), FormulaError> {
        let before = out.len();
        let mut closure = Closure {
            visited: HashSet::new(),
            out,
        };
        self.resolve(root, 0, &mut closure)?;
        info!(
            "resolved {} formulae ({} new) from {}",
            closure.visited.len(),
            closure.out.len() - before,
            root.display()
        );
        Ok(())
    }

    fn resolve(&self, path: &Path, depth: usize, closure: &mut Closure<'_>) -> Result<(), FormulaError> {
        let key = std::fs::canonicalize(path).map_err(|source| FormulaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !closure.visited.insert(key) {
            debug!("skipping {}, already loaded", path.display());
            return Ok(());
        }

        let record = self.load_file(path)?;
        let name = record.name.clone();
        let dependencies = record.runtime_dependencies_on(&self.options().platforms);
        closure.out.insert(name.clone(), record);

        let dir = path.parent().unwrap_or(Path::new(""));
        for dependency in dependencies {
            let expected_path = dir.join(self.options().file_name(&dependency));
            if !expected_path.is_file() {
                return Err(FormulaError::MissingDependencyFile {
                    name: dependency,
                    expected_path,
                    required_by: name,
                });
            }
            if depth >= self.options().max_depth {
                return Err(FormulaError::DepthExceeded {
                    name: dependency,
                    limit: self.options().max_depth,
                });
            }
            self.resolve(&expected_path, depth + 1, closure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoadOptions;
    use std::fs;

    fn recipe(class: &str, deps: &[&str]) -> String {
        let mut src = format!("class {class} < Formula\n  url \"https://x/{class}-1.0.tar.gz\"\n");
        for dep in deps {
            src.push_str(&format!("  depends_on \"{dep}\"\n"));
        }
        src.push_str("  def install\n    system \"make\"\n  end\nend\n");
        src
    }

    #[test]
    fn cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rb"), recipe("A", &["b"])).unwrap();
        fs::write(dir.path().join("b.rb"), recipe("B", &["a"])).unwrap();

        let mut out = FormulaMap::new();
        FormulaLoader::new()
            .load_closure(&dir.path().join("a.rb"), &mut out)
            .unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rb"), recipe("A", &["b"])).unwrap();
        fs::write(dir.path().join("b.rb"), recipe("B", &["c"])).unwrap();
        fs::write(dir.path().join("c.rb"), recipe("C", &[])).unwrap();

        let loader = FormulaLoader::new().with_options(LoadOptions::new().with_max_depth(1));
        let mut out = FormulaMap::new();
        let err = loader
            .load_closure(&dir.path().join("a.rb"), &mut out)
            .unwrap_err();
        assert!(matches!(err, FormulaError::DepthExceeded { ref name, limit: 1 } if name == "c"));
    }

    #[test]
    fn platform_dependencies_only_with_platform_selected() {
        let dir = tempfile::tempdir().unwrap();
        let root = "class A < Formula\n  url \"https://x/a-1.0.tar.gz\"\n  on_linux do\n    depends_on \"b\"\n  end\n  def install\n    system \"make\"\n  end\nend\n";
        fs::write(dir.path().join("a.rb"), root).unwrap();
        fs::write(dir.path().join("b.rb"), recipe("B", &[])).unwrap();

        let mut out = FormulaMap::new();
        FormulaLoader::new()
            .load_closure(&dir.path().join("a.rb"), &mut out)
            .unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["a"]);

        let loader = FormulaLoader::new().with_options(LoadOptions::new().with_platform("linux"));
        let mut out = FormulaMap::new();
        loader.load_closure(&dir.path().join("a.rb"), &mut out).unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn missing_sibling() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rb"), recipe("A", &["ghost"])).unwrap();

        let mut out = FormulaMap::new();
        let err = FormulaLoader::new()
            .load_closure(&dir.path().join("a.rb"), &mut out)
            .unwrap_err();
        match err {
            FormulaError::MissingDependencyFile {
                name,
                expected_path,
                required_by,
            } => {
                assert_eq!(name, "ghost");
                assert_eq!(required_by, "a");
                assert_eq!(expected_path, dir.path().join("ghost.rb"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
