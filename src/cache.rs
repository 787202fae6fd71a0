use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

/// Titles already published, in the order they were posted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostedWords {
    titles: Vec<String>,
}

impl PostedWords {
    pub fn new(titles: Vec<String>) -> Self {
        Self { titles }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.iter().any(|t| t == title)
    }

    /// Appends `title` unless it is already present.
    pub fn insert(&mut self, title: &str) -> bool {
        if self.contains(title) {
            return false;
        }
        self.titles.push(title.to_owned());
        true
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }
}

/// Persistence for [`PostedWords`]. Implementations log their own failures
/// and degrade instead of returning errors.
pub trait WordCache {
    fn load(&self) -> PostedWords;
    fn save(&self, words: &PostedWords);
}

/// JSON array of strings on disk.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load(&self) -> anyhow::Result<PostedWords> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PostedWords::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read: {}", self.path.display()));
            }
        };
        let titles: Vec<String> = serde_json::from_slice(&bytes).context("parse json")?;
        Ok(PostedWords::new(titles))
    }

    fn try_save(&self, words: &PostedWords) -> anyhow::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dir: {}", parent.display()))?;

        let data = serde_json::to_vec(words.titles()).context("serialize json")?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("create tmp in: {}", parent.display()))?;
        tmp.write_all(&data).context("write tmp")?;
        tmp.persist(&self.path)
            .with_context(|| format!("rename tmp to final: {}", self.path.display()))?;
        Ok(())
    }
}

impl WordCache for JsonFileCache {
    fn load(&self) -> PostedWords {
        match self.try_load() {
            Ok(words) => {
                tracing::debug!(
                    path = %self.path.display(),
                    words = words.len(),
                    "loaded posted words"
                );
                words
            }
            Err(err) => {
                tracing::error!(
                    path = %self.path.display(),
                    ?err,
                    "load posted words failed; starting empty"
                );
                PostedWords::default()
            }
        }
    }

    fn save(&self, words: &PostedWords) {
        if let Err(err) = self.try_save(words) {
            tracing::error!(path = %self.path.display(), ?err, "save posted words failed");
        }
    }
}
