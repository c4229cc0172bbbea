//! Loader configuration

/// What a translation failure in `install` does to the file's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationPolicy {
    /// The file fails to load
    #[default]
    Fail,
    /// Keep the metadata, leave `install` empty and record the error text
    KeepMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Recipe file extension, without the dot
    pub extension: String,
    /// Longest dependency chain followed before giving up
    pub max_depth: usize,
    pub translation_policy: TranslationPolicy,
    /// Platform parts (`linux`, `arm`) whose scoped runtime dependencies the
    /// closure also follows
    pub platforms: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            extension: "rb".to_string(),
            max_depth: 64,
            translation_policy: TranslationPolicy::Fail,
            platforms: Vec::new(),
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_translation_policy(mut self, policy: TranslationPolicy) -> Self {
        self.translation_policy = policy;
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platforms.push(platform.into());
        self
    }

    /// `<name>.<extension>`
    pub fn file_name(&self, name: &str) -> String {
        format!("{name}.{}", self.extension)
    }
}
