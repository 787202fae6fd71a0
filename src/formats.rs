use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One dictionary headword fetched for posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    pub source_url: String,
    pub raw_extract: String,
}

/// A heading-delimited region of a wiki-format extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Labels of every enclosing heading, outermost first, ending with this one.
    pub heading_path: Vec<String>,
    /// Raw heading line as it appeared, e.g. `=== Nom commun ===`.
    pub heading: String,
    pub level: usize,
    pub body_text: String,
}

impl Section {
    pub fn label(&self) -> &str {
        self.heading_path.last().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionCandidate {
    pub index: usize,
    pub text: String,
}

impl DefinitionCandidate {
    /// Numbers `texts` from 1 in the order given.
    pub fn enumerate<I, S>(texts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self {
                index: i + 1,
                text: text.into(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostPayload {
    pub header_line: String,
    pub body_lines: Vec<String>,
    pub total_length: usize,
    pub truncated: bool,
}

impl PostPayload {
    /// Post text as sent: the header line followed by one body line per row.
    ///
    /// Body lines are joined with `\n`; the first one only gets a separator
    /// when the header is non-empty and does not already end a line.
    pub fn render(&self) -> String {
        let mut out = self.header_line.clone();
        for (i, line) in self.body_lines.iter().enumerate() {
            if i > 0 || opens_line(&out) {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }
}

/// True when text appended to `header` needs a `\n` first.
pub fn opens_line(header: &str) -> bool {
    !header.is_empty() && !header.ends_with('\n')
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkPreview {
    pub image_url: Option<String>,
    pub title: Option<String>,
}

// MediaWiki `action=query` envelopes.

#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub query: Option<ApiQuery>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiQuery {
    #[serde(default)]
    pub pages: BTreeMap<String, ApiPage>,
    #[serde(default)]
    pub random: Vec<RandomPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extract: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomPage {
    pub title: String,
}

impl ApiResponse {
    /// Extract of the first returned page; `None` when the page id is `-1`
    /// or the page carries no extract.
    pub fn first_extract(&self) -> Option<&str> {
        let (id, page) = self.query.as_ref()?.pages.iter().next()?;
        if id == "-1" {
            return None;
        }
        page.extract.as_deref()
    }

    pub fn random_title(&self) -> Option<&str> {
        self.query
            .as_ref()?
            .random
            .first()
            .map(|page| page.title.as_str())
    }
}
