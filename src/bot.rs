//! One posting run, end to end.
//!
//! ```text
//! FETCH_ENTRY -> EXTRACT -> (FILTER, random mode) -> BUDGET
//!             -> RESOLVE_PREVIEW -> PUBLISH -> DONE
//! ```
//!
//! Random mode re-enters `FETCH_ENTRY` on any retryable error until
//! `max_attempts` is spent. Any other error ends the run in `FAILED`; the
//! cache is only written after a successful publish.

use url::Url;

use crate::budget::{BudgetPolicy, Budgeter, char_len};
use crate::cache::{PostedWords, WordCache};
use crate::config::{BotConfig, ContentConfig, Mode};
use crate::error::BotError;
use crate::extract::{self, capitalize_first};
use crate::filter;
use crate::formats::{DefinitionCandidate, Entry, LinkPreview, PostPayload, Section};
use crate::preview::{ImageData, PreviewResolver};
use crate::publish::{ExternalEmbed, Post, Publisher, RichText};
use crate::wiki::{self, ExtractFormat, WikiSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    FetchEntry,
    Extract,
    Filter,
    Budget,
    ResolvePreview,
    Publish,
    Done,
    Failed,
}

/// Entry plus the budgeted post body, ready for the preview and publish steps.
#[derive(Debug, Clone)]
pub struct Composed {
    pub entry: Entry,
    pub payload: PostPayload,
    /// Link-card description.
    pub description: String,
}

/// A composed entry whose link card has been resolved.
#[derive(Debug, Clone)]
struct Prepared {
    composed: Composed,
    url: Url,
    preview: LinkPreview,
    card_title: String,
}

#[derive(Debug, Clone)]
pub struct Published {
    pub title: String,
    pub source_url: String,
    pub text: String,
    pub preview: LinkPreview,
    pub truncated: bool,
}

/// Link-card lookup as the orchestrator needs it.
pub trait PreviewSource {
    fn resolve(&self, url: &Url) -> Result<LinkPreview, BotError>;
    fn fetch_image(&self, image_url: &str) -> Result<ImageData, BotError>;
}

impl PreviewSource for PreviewResolver {
    fn resolve(&self, url: &Url) -> Result<LinkPreview, BotError> {
        PreviewResolver::resolve(self, url)
    }

    fn fetch_image(&self, image_url: &str) -> Result<ImageData, BotError> {
        PreviewResolver::fetch_image(self, image_url)
    }
}

#[derive(Debug)]
struct Trace {
    mode: Mode,
    state: RunState,
    title: Option<String>,
}

impl Trace {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            state: RunState::FetchEntry,
            title: None,
        }
    }

    fn enter(&mut self, state: RunState) {
        self.state = state;
        tracing::info!(mode = ?self.mode, state = ?state, title = ?self.title, "run state");
    }
}

pub struct Bot {
    config: BotConfig,
    wiki: Box<dyn WikiSource>,
    preview: Box<dyn PreviewSource>,
    publisher: Box<dyn Publisher>,
    cache: Box<dyn WordCache>,
    posted: PostedWords,
}

impl Bot {
    /// Reads the posted-words cache once; it is written back only after a
    /// successful publish.
    pub fn new(
        config: BotConfig,
        wiki: Box<dyn WikiSource>,
        preview: Box<dyn PreviewSource>,
        publisher: Box<dyn Publisher>,
        cache: Box<dyn WordCache>,
    ) -> Self {
        let posted = cache.load();
        Self {
            config,
            wiki,
            preview,
            publisher,
            cache,
            posted,
        }
    }

    pub fn posted(&self) -> &PostedWords {
        &self.posted
    }

    /// Runs once and reports success; errors are logged, never returned.
    pub fn run(&mut self, mode: Mode) -> bool {
        self.run_reporting(mode).is_some()
    }

    /// Like [`Bot::run`] but hands back what was (or, in dry-run, would be)
    /// published.
    pub fn run_reporting(&mut self, mode: Mode) -> Option<Published> {
        tracing::info!(mode = ?mode, dry_run = self.config.dry_run, "starting run");
        let mut trace = Trace::new(mode);
        match self.try_run(mode, &mut trace) {
            Ok(published) => {
                trace.enter(RunState::Done);
                tracing::info!(
                    title = %published.title,
                    truncated = published.truncated,
                    "posted word of the day"
                );
                Some(published)
            }
            Err(err) => {
                let failed_in = trace.state;
                trace.enter(RunState::Failed);
                tracing::error!(
                    mode = ?mode,
                    state = ?failed_in,
                    title = ?trace.title,
                    %err,
                    "run failed"
                );
                None
            }
        }
    }

    fn try_run(&mut self, mode: Mode, trace: &mut Trace) -> Result<Published, BotError> {
        let Prepared {
            composed,
            url,
            preview,
            card_title,
        } = match mode {
            Mode::Daily => {
                let composed = self.acquire_daily(trace)?;
                self.prepare(composed, trace)?
            }
            Mode::Random => self.acquire_random(trace)?,
        };

        let text = match mode {
            Mode::Daily => RichText::plain(composed.payload.render()),
            Mode::Random => RichText::new()
                .text(format!(
                    "{}{}",
                    composed.payload.render().trim_end(),
                    link_lead_in(&self.config.content)
                ))
                .link(&composed.entry.title, url.as_str()),
        };
        let published = Published {
            title: composed.entry.title.clone(),
            source_url: composed.entry.source_url.clone(),
            text: text.as_text(),
            preview: preview.clone(),
            truncated: composed.payload.truncated,
        };

        if self.config.dry_run {
            tracing::info!(title = %published.title, "dry run; skipping publish");
            return Ok(published);
        }

        trace.enter(RunState::Publish);
        let thumb = match preview.image_url.as_deref() {
            Some(image_url) => match self.preview.fetch_image(image_url) {
                Ok(image) => Some(self.publisher.upload_blob(&image)?),
                Err(err) => {
                    tracing::warn!(%err, "thumbnail unavailable; posting card without it");
                    None
                }
            },
            None => None,
        };
        let post = Post {
            text,
            embed: Some(ExternalEmbed {
                title: card_title,
                description: composed.description.clone(),
                uri: url.to_string(),
                thumb,
            }),
        };
        self.publisher.send_post(&post)?;

        if self.posted.insert(&composed.entry.title) {
            self.cache.save(&self.posted);
        }
        Ok(published)
    }

    fn acquire_daily(&mut self, trace: &mut Trace) -> Result<Composed, BotError> {
        trace.enter(RunState::FetchEntry);
        let today = self
            .config
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let (page, raw) = wiki::fetch_day_entry(
            self.wiki.as_ref(),
            &self.config.day_page_template,
            today,
            self.config.fallback_year,
        )?;

        trace.enter(RunState::Extract);
        let composed = compose_daily(
            &self.config.content,
            &self.config.wiki.wiki_base_url,
            &page,
            raw,
        )?;
        trace.title = Some(composed.entry.title.clone());
        trace.enter(RunState::Budget);
        Ok(composed)
    }

    /// RESOLVE_PREVIEW: the card needs an `og:title`; without one the run
    /// cannot publish.
    fn prepare(&self, composed: Composed, trace: &mut Trace) -> Result<Prepared, BotError> {
        let url = Url::parse(&composed.entry.source_url)
            .map_err(|err| BotError::parse(&composed.entry.title, err.to_string()))?;

        trace.enter(RunState::ResolvePreview);
        let preview = self.preview.resolve(&url)?;
        let Some(card_title) = preview.title.clone() else {
            return Err(BotError::publish(format!(
                "required Open Graph tags not found at {url}"
            )));
        };
        Ok(Prepared {
            composed,
            url,
            preview,
            card_title,
        })
    }

    fn acquire_random(&mut self, trace: &mut Trace) -> Result<Prepared, BotError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.draw_random(trace) {
                Ok(prepared) => return Ok(prepared),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(attempt, max_attempts, %err, "random entry unusable; retrying");
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::error!(attempts = max_attempts, "no suitable random entry");
                    }
                    return Err(err);
                }
            }
            attempt += 1;
            trace.title = None;
            std::thread::sleep(self.config.retry_delay);
        }
    }

    fn draw_random(&mut self, trace: &mut Trace) -> Result<Prepared, BotError> {
        trace.enter(RunState::FetchEntry);
        let title = self.wiki.random_title()?;
        trace.title = Some(title.clone());
        if self.posted.contains(&title) {
            return Err(BotError::AlreadyPosted { title });
        }
        let raw = self.wiki.fetch_extract(&title, ExtractFormat::WikiText)?;

        trace.enter(RunState::Extract);
        let document = extract::parse_wiki_sections(&title, &raw)?;
        trace.enter(RunState::Filter);
        let composed = compose_random(
            &self.config.content,
            &self.config.wiki.wiki_base_url,
            &title,
            raw,
            &document,
        )?;
        trace.enter(RunState::Budget);
        self.prepare(composed, trace)
    }
}

/// Text between the budgeted body and the article link of a random post.
fn link_lead_in(content: &ContentConfig) -> String {
    format!("\n\n{}", content.link_label)
}

/// Curated entry: HTML extract budgeted with the daily policy.
pub fn compose_daily(
    content: &ContentConfig,
    wiki_base_url: &Url,
    page: &str,
    raw: String,
) -> Result<Composed, BotError> {
    let extracted = extract::extract_html(page, &raw)?;
    let source_url = wiki::article_url(wiki_base_url, &extracted.headword)
        .map_err(|err| BotError::parse(page, format!("{err:#}")))?;
    tracing::debug!(
        page,
        sections = ?extracted.sections.iter().map(Section::label).collect::<Vec<_>>(),
        "entry sections"
    );

    let payload = content.budgeter_for(Mode::Daily).build(
        &content.header,
        &capitalize_first(&extracted.header_line),
        &extracted.definitions,
    );

    Ok(Composed {
        description: extracted.annotation(),
        entry: Entry {
            title: extracted.headword,
            source_url: source_url.to_string(),
            raw_extract: raw,
        },
        payload,
    })
}

/// Random entry: wiki-section extract, filtered, budgeted with the random
/// policy.
pub fn compose_random(
    content: &ContentConfig,
    wiki_base_url: &Url,
    title: &str,
    raw: String,
    document: &extract::WikiDocument,
) -> Result<Composed, BotError> {
    let headings = document.headings();
    let rejected =
        filter::rejection_reason(&headings, &content.language_heading, &content.parts_of_speech);
    if let Some(reason) = rejected {
        return Err(BotError::FilterRejected {
            title: title.to_owned(),
            reason,
        });
    }
    let part_of_speech = document.sections[2].label().to_owned();
    tracing::info!(title, part_of_speech = %part_of_speech, "entry accepted");

    let mut budgeter = content.budgeter_for(Mode::Random);
    if let BudgetPolicy::Running { limit } = budgeter.policy() {
        // the link line is appended after budgeting
        let reserved = char_len(&link_lead_in(content)) + char_len(title);
        budgeter = Budgeter::new(
            BudgetPolicy::Running {
                limit: limit.saturating_sub(reserved),
            },
            content.parasites.clone(),
        );
    }
    let definitions = match budgeter.policy() {
        BudgetPolicy::Legacy { .. } => {
            let block = document
                .section_text(2)
                .ok_or_else(|| BotError::parse(title, "missing part-of-speech section"))?;
            DefinitionCandidate::enumerate([block])
        }
        BudgetPolicy::Running { .. } => {
            let senses = document.sections[2]
                .body_text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .skip(1)
                .collect::<Vec<_>>();
            if senses.is_empty() {
                return Err(BotError::parse(title, "part-of-speech section has no senses"));
            }
            DefinitionCandidate::enumerate(senses)
        }
    };

    let source_url = wiki::article_url(wiki_base_url, title)
        .map_err(|err| BotError::parse(title, format!("{err:#}")))?;
    let payload = budgeter.build(
        &content.random_header,
        &format!("{}\n", capitalize_first(title)),
        &definitions,
    );

    Ok(Composed {
        description: capitalize_first(&part_of_speech),
        entry: Entry {
            title: title.to_owned(),
            source_url: source_url.to_string(),
            raw_extract: raw,
        },
        payload,
    })
}
