//! Method name mangling for the install IR
//!
//! Scheme:
//! - Predicate methods: `name?` becomes `name_query`
//! - Bang methods: `name!` becomes `name_bang`
//! - Everything else passes through unchanged
//!
//! Examples:
//! - `with?` - `with_query`
//! - `gsub!` - `gsub_bang`
//! - `install` - `install`
//!
//! The mapping only stays reversible if no plain source name already ends in
//! one of the suffixes, so such names are refused.

const QUERY_SUFFIX: &str = "_query";
const BANG_SUFFIX: &str = "_bang";

/// Mangle a source method name; `None` if a plain name collides with a suffix.
pub fn mangle_method_name(name: &str) -> Option<String> {
    if let Some(base) = name.strip_suffix('?') {
        return Some(format!("{base}{QUERY_SUFFIX}"));
    }
    if let Some(base) = name.strip_suffix('!') {
        return Some(format!("{base}{BANG_SUFFIX}"));
    }
    if has_reserved_suffix(name) {
        return None;
    }
    Some(name.to_string())
}

/// Recover the source method name from a mangled one.
pub fn demangle_method_name(name: &str) -> String {
    if let Some(base) = name.strip_suffix(QUERY_SUFFIX) {
        return format!("{base}?");
    }
    if let Some(base) = name.strip_suffix(BANG_SUFFIX) {
        return format!("{base}!");
    }
    name.to_string()
}

pub fn has_reserved_suffix(name: &str) -> bool {
    name.ends_with(QUERY_SUFFIX) || name.ends_with(BANG_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangle_suffixes() {
        assert_eq!(mangle_method_name("with?").as_deref(), Some("with_query"));
        assert_eq!(mangle_method_name("gsub!").as_deref(), Some("gsub_bang"));
        assert_eq!(mangle_method_name("install").as_deref(), Some("install"));
    }

    #[test]
    fn test_reserved_suffix_refused() {
        assert_eq!(mangle_method_name("ask_query"), None);
        assert_eq!(mangle_method_name("go_bang"), None);
        // A predicate whose base ends in a suffix still mangles
        assert_eq!(mangle_method_name("x_bang?").as_deref(), Some("x_bang_query"));
    }

    #[test]
    fn test_demangle_reverses() {
        for name in ["with?", "gsub!", "install", "head?", "inreplace"] {
            let mangled = mangle_method_name(name).unwrap();
            assert_eq!(demangle_method_name(&mangled), name);
        }
    }
}
