//! Version derivation from source URLs
//!
//! The loader asks a [`VersionParser`] for a version whenever a recipe does not
//! declare one. [`UrlVersion`] covers the common archive naming schemes:
//!
//! - `https://x/pkg-1.2.tar.gz` gives `1.2`
//! - `https://x/pkg_2.0.1-src.zip` gives `2.0.1`
//! - `https://github.com/o/r/archive/v3.4.tar.gz` gives `3.4`
//! - `https://x/releases/1.6/pkg.tar.gz` gives `1.6`

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Derives a version string from a source URL.
pub trait VersionParser {
    fn parse(&self, url: &str) -> Option<String>;
}

impl<F> VersionParser for F
where
    F: Fn(&str) -> Option<String>,
{
    fn parse(&self, url: &str) -> Option<String> {
        self(url)
    }
}

/// Default filename-based heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlVersion;

static ARCHIVE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\.(?:tar\.(?:gz|bz2|xz|lz|zst)|tgz|tbz2?|txz",
        r"|zip|gz|bz2|xz|7z|jar|gem|crate|tar|dmg|pkg)$",
    ))
    .expect("archive extension pattern")
});

/// `-src`, `.orig` and similar tails after the version.
static SOURCE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[-.](?:src|source|orig|stable|release))+$").expect("source suffix pattern")
});

/// The last `-`/`_` separated part that starts with a digit (after an
/// optional `v`), or the whole stem when it does.
static STEM_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:.*[-_])?v?(\d[A-Za-z0-9.+_-]*)$").expect("stem version pattern")
});

/// A directory segment such as `1.6` or `v1.6`.
static SEGMENT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(\d[A-Za-z0-9.+_-]*)$").expect("segment version pattern"));

impl VersionParser for UrlVersion {
    fn parse(&self, url: &str) -> Option<String> {
        let mut segments = path_segments(url);
        if segments.last().is_some_and(|last| last == "download") {
            segments.pop();
        }

        let filename = segments.pop()?;
        let stem = ARCHIVE_EXTENSION.replace(&filename, "");
        let stem = SOURCE_SUFFIX.replace(&stem, "");
        if let Some(version) = captured_version(&STEM_VERSION, &stem) {
            return Some(version);
        }
        // `.../1.6/pkg.tar.gz` or `.../v1.6/pkg.tar.gz`
        segments
            .iter()
            .rev()
            .take(2)
            .find_map(|segment| captured_version(&SEGMENT_VERSION, segment))
    }
}

/// Non-empty path segments. Strings that are not absolute URLs are split as
/// plain paths.
fn path_segments(url: &str) -> Vec<String> {
    let segments: Vec<String> = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .map(|segments| segments.map(str::to_string).collect())
            .unwrap_or_default(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .split('/')
            .map(str::to_string)
            .collect(),
    };
    segments.into_iter().filter(|segment| !segment.is_empty()).collect()
}

fn captured_version(pattern: &Regex, text: &str) -> Option<String> {
    let version = pattern.captures(text)?.get(1)?.as_str();
    Some(version.trim_end_matches(['.', '-', '_']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Option<String> {
        UrlVersion.parse(url)
    }

    #[test]
    fn common_tarballs() {
        assert_eq!(parse("https://x/pkg-1.2.tar.gz").as_deref(), Some("1.2"));
        assert_eq!(
            parse("https://github.com/jqlang/jq/releases/download/jq-1.7.1/jq-1.7.1.tar.gz")
                .as_deref(),
            Some("1.7.1")
        );
        assert_eq!(parse("https://x/onig-6.9.9.tar.gz").as_deref(), Some("6.9.9"));
        assert_eq!(parse("https://x/pkg_2.0.1-src.zip").as_deref(), Some("2.0.1"));
        assert_eq!(parse("https://x/lib-name-3.0.tgz?x=1").as_deref(), Some("3.0"));
    }

    #[test]
    fn tag_archives_and_directories() {
        assert_eq!(
            parse("https://github.com/o/r/archive/refs/tags/v3.4.tar.gz").as_deref(),
            Some("3.4")
        );
        assert_eq!(parse("https://x/releases/1.6/pkg.tar.gz").as_deref(), Some("1.6"));
        assert_eq!(
            parse("https://downloads.sourceforge.net/project/p/p-2.1.tar.gz/download").as_deref(),
            Some("2.1")
        );
    }

    #[test]
    fn plain_paths_and_suffixes() {
        assert_eq!(parse("vendor/pkg-0.9.1.orig.tar.xz").as_deref(), Some("0.9.1"));
        assert_eq!(parse("https://x/pkg-1.2-beta.TAR.GZ").as_deref(), Some("1.2-beta"));
        assert_eq!(parse("https://x/v2.0/pkg.zip#frag").as_deref(), Some("2.0"));
    }

    #[test]
    fn no_version() {
        assert_eq!(parse("https://x/y/pkg.tar.gz"), None);
        assert_eq!(parse("https://github.com/o/r.git"), None);
    }

    #[test]
    fn closures_are_parsers() {
        let fixed = |_: &str| Some("9.9".to_string());
        assert_eq!(fixed.parse("anything").as_deref(), Some("9.9"));
    }
}
