//! Markup extraction for both extract flavours the wiki API can return.
//!
//! * Rendered HTML (curated mode): the opening `<p>` is the header line and
//!   the direct `<li>` children of the first `<ol>` are the senses.
//! * Plain text with wiki section markers (random mode): lines such as
//!   `=== Nom commun ===` split the text into nested [`Section`]s.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::BotError;
use crate::formats::{DefinitionCandidate, Section};

static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("PARAGRAPH selector should parse"));
static EMPHASIS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("b, strong").expect("EMPHASIS selector should parse"));
static ORDERED_LIST: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ol").expect("ORDERED_LIST selector should parse"));
static HEADINGS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6").expect("HEADINGS selector should parse")
});
static WIKI_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(={1,6})\s*(.*?)\s*={1,6}\s*$").expect("WIKI_HEADING should compile")
});

/// Structured view of a rendered-HTML extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlExtract {
    pub headword: String,
    pub header_line: String,
    pub sections: Vec<Section>,
    pub definitions: Vec<DefinitionCandidate>,
}

impl HtmlExtract {
    /// Annotation after the em-dash of the header line, e.g. the language and
    /// pronunciation of a foreign entry. Empty when the header has no dash.
    pub fn annotation(&self) -> String {
        annotation(&self.header_line)
    }
}

pub fn extract_html(page: &str, raw: &str) -> Result<HtmlExtract, BotError> {
    let document = Html::parse_fragment(raw);

    let paragraph = document
        .select(&PARAGRAPH)
        .find(|p| !element_text(p).trim().is_empty())
        .ok_or_else(|| BotError::parse(page, "missing opening paragraph"))?;
    let header_line = element_text(&paragraph).trim().to_owned();

    let headword = paragraph
        .select(&EMPHASIS)
        .map(|b| element_text(&b).trim().to_owned())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| {
            header_line
                .split('—')
                .next()
                .unwrap_or_default()
                .trim()
                .to_owned()
        });
    if headword.is_empty() {
        return Err(BotError::parse(page, "header line has no headword"));
    }

    let list = document
        .select(&ORDERED_LIST)
        .next()
        .ok_or_else(|| BotError::parse(page, "missing ordered list of definitions"))?;

    let senses = list
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li")
        .filter_map(|item| {
            let text = element_text(&item);
            let first = text.trim().split('\n').next().unwrap_or_default().trim();
            (!first.is_empty()).then(|| first.to_owned())
        })
        .collect::<Vec<_>>();
    if senses.is_empty() {
        return Err(BotError::parse(page, "ordered list has no items"));
    }

    let definitions = DefinitionCandidate::enumerate(senses);
    tracing::debug!(
        page,
        headword = %headword,
        definitions = definitions.len(),
        "extracted html entry"
    );

    Ok(HtmlExtract {
        headword,
        header_line,
        sections: html_sections(&document),
        definitions,
    })
}

fn html_sections(document: &Html) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut path = HeadingPath::default();

    for heading in document.select(&HEADINGS) {
        let level = heading_level(heading.value().name()).unwrap_or(1);
        let label = element_text(&heading).trim().to_owned();

        let mut body_text = String::new();
        for sibling in heading.next_siblings() {
            if let Some(element) = ElementRef::wrap(sibling) {
                if heading_level(element.value().name()).is_some() {
                    break;
                }
                body_text.push_str(&element_text(&element));
            } else if let Some(text) = sibling.value().as_text() {
                body_text.push_str(text);
            }
        }

        sections.push(Section {
            heading_path: path.enter(level, &label),
            heading: label,
            level,
            body_text: body_text.trim().to_owned(),
        });
    }

    sections
}

fn heading_level(name: &str) -> Option<usize> {
    let digit = name.strip_prefix('h')?;
    match digit.parse::<usize>() {
        Ok(level @ 1..=6) => Some(level),
        _ => None,
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Plain-text extract split at wiki heading lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WikiDocument {
    pub lead: String,
    pub sections: Vec<Section>,
}

impl WikiDocument {
    /// Raw heading lines in document order.
    pub fn headings(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.heading.clone()).collect()
    }

    /// Section `index` (0-based over headings) rendered with its heading line
    /// and every nested subsection that follows it.
    pub fn section_text(&self, index: usize) -> Option<String> {
        let section = self.sections.get(index)?;
        let mut out = section.heading.clone();
        if !section.body_text.is_empty() {
            out.push('\n');
            out.push_str(&section.body_text);
        }
        for nested in self.sections[index + 1..]
            .iter()
            .take_while(|s| s.level > section.level)
        {
            out.push('\n');
            out.push_str(&nested.heading);
            if !nested.body_text.is_empty() {
                out.push('\n');
                out.push_str(&nested.body_text);
            }
        }
        Some(out)
    }
}

pub fn parse_wiki_sections(page: &str, raw: &str) -> Result<WikiDocument, BotError> {
    let mut document = WikiDocument::default();
    let mut path = HeadingPath::default();
    let mut body: Vec<&str> = Vec::new();

    for line in raw.trim().lines() {
        let Some(caps) = WIKI_HEADING.captures(line.trim()) else {
            body.push(line);
            continue;
        };
        flush_body(&mut document, &mut body);

        let level = caps.get(1).map_or(1, |m| m.as_str().len());
        let label = crate::filter::clean_label(caps.get(2).map_or("", |m| m.as_str()));
        document.sections.push(Section {
            heading_path: path.enter(level, &label),
            heading: line.trim().to_owned(),
            level,
            body_text: String::new(),
        });
    }
    flush_body(&mut document, &mut body);

    if document.sections.is_empty() {
        return Err(BotError::parse(page, "extract has no sections"));
    }
    tracing::debug!(page, sections = document.sections.len(), "parsed wiki sections");
    Ok(document)
}

fn flush_body(document: &mut WikiDocument, body: &mut Vec<&str>) {
    let text = body.join("\n").trim().to_owned();
    body.clear();
    match document.sections.last_mut() {
        Some(section) => section.body_text = text,
        None => document.lead = text,
    }
}

#[derive(Debug, Default)]
struct HeadingPath {
    stack: Vec<(usize, String)>,
}

impl HeadingPath {
    fn enter(&mut self, level: usize, label: &str) -> Vec<String> {
        while self.stack.last().is_some_and(|(l, _)| *l >= level) {
            self.stack.pop();
        }
        self.stack.push((level, label.to_owned()));
        self.stack.iter().map(|(_, label)| label.clone()).collect()
    }
}

pub fn annotation(header_line: &str) -> String {
    header_line
        .split_once('—')
        .map(|(_, rest)| capitalize_first(rest.trim()))
        .unwrap_or_default()
}

pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
