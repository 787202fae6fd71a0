use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use chrono::NaiveDate;
use url::Url;

use crate::budget::{BudgetPolicy, Budgeter};
use crate::cli::{BudgetPolicyKind, ContentArgs, RunArgs, WikiArgs};

pub const DEFAULT_HEADER: &str = "📚 Wiktionnaire - Le mot du jour est :\n\n";
pub const DEFAULT_RANDOM_HEADER: &str = "📚 Wiktionnaire - Le mot du jour est \n";
pub const DEFAULT_LINK_LABEL: &str = "Plus d'info: ";
pub const DEFAULT_PARTS_OF_SPEECH: &[&str] = &[
    "Nom commun",
    "Adverbe",
    "Verbe",
    "Adjectif",
    "Locution nominale",
    "Locution verbale",
];
pub const DEFAULT_PARASITES: &[&str] = &["(pluriel à préciser)", "\\Prononciation ?\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Curated entry of the day.
    Daily,
    /// Random entry, filtered and retried.
    Random,
}

impl Mode {
    pub fn default_policy(self) -> BudgetPolicy {
        match self {
            Self::Daily => BudgetPolicy::running(),
            Self::Random => BudgetPolicy::legacy(),
        }
    }
}

/// Where the wiki lives.
#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub language: String,
    pub api_url: Url,
    pub wiki_base_url: Url,
}

impl WikiConfig {
    pub fn for_language(language: &str) -> anyhow::Result<Self> {
        let api_url = Url::parse(&format!("https://{language}.wiktionary.org/w/api.php"))
            .with_context(|| format!("derive api url for language {language:?}"))?;
        let wiki_base_url = Url::parse(&format!("https://{language}.wiktionary.org/wiki/"))
            .with_context(|| format!("derive wiki url for language {language:?}"))?;
        Ok(Self {
            language: language.to_owned(),
            api_url,
            wiki_base_url,
        })
    }

    pub fn from_args(args: &WikiArgs) -> anyhow::Result<Self> {
        let mut config = Self::for_language(&args.language)?;
        if let Some(api_url) = args.api_url.as_deref() {
            config.api_url = Url::parse(api_url).context("parse --api-url")?;
        }
        if let Some(base) = args.wiki_base_url.as_deref() {
            config.wiki_base_url = Url::parse(base).context("parse --wiki-base-url")?;
        }
        Ok(config)
    }
}

/// How extracted content is filtered and fitted into a post.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// `None` selects the mode's own policy.
    pub budget_policy: Option<BudgetPolicy>,
    pub budget_limit: Option<usize>,
    pub language_heading: String,
    pub parts_of_speech: BTreeSet<String>,
    pub parasites: Vec<String>,
    pub header: String,
    pub random_header: String,
    pub link_label: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            budget_policy: None,
            budget_limit: None,
            language_heading: "Français".to_owned(),
            parts_of_speech: DEFAULT_PARTS_OF_SPEECH
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            parasites: DEFAULT_PARASITES.iter().map(|s| (*s).to_owned()).collect(),
            header: DEFAULT_HEADER.to_owned(),
            random_header: DEFAULT_RANDOM_HEADER.to_owned(),
            link_label: DEFAULT_LINK_LABEL.to_owned(),
        }
    }
}

impl ContentConfig {
    pub fn from_args(args: &ContentArgs) -> Self {
        let defaults = Self::default();
        let parts_of_speech = non_empty(&args.parts_of_speech)
            .map(|items| items.into_iter().collect())
            .unwrap_or(defaults.parts_of_speech);
        let parasites = non_empty(&args.parasites).unwrap_or(defaults.parasites);

        Self {
            budget_policy: args.budget_policy.map(|kind| match kind {
                BudgetPolicyKind::Running => BudgetPolicy::running(),
                BudgetPolicyKind::Legacy => BudgetPolicy::legacy(),
            }),
            budget_limit: args.budget_limit,
            language_heading: args.language_heading.trim().to_owned(),
            parts_of_speech,
            parasites,
            header: args.header.clone().unwrap_or(defaults.header),
            random_header: args.random_header.clone().unwrap_or(defaults.random_header),
            link_label: args.link_label.clone().unwrap_or(defaults.link_label),
        }
    }

    pub fn policy_for(&self, mode: Mode) -> BudgetPolicy {
        let policy = self.budget_policy.unwrap_or_else(|| mode.default_policy());
        match self.budget_limit {
            Some(limit) => policy.with_limit(limit),
            None => policy,
        }
    }

    pub fn budgeter_for(&self, mode: Mode) -> Budgeter {
        Budgeter::new(self.policy_for(mode), self.parasites.clone())
    }
}

fn non_empty(items: &[String]) -> Option<Vec<String>> {
    let items = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();
    (!items.is_empty()).then_some(items)
}

#[derive(Clone)]
pub struct Credentials {
    pub handle: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("handle", &self.handle)
            .field("password", &"***")
            .finish()
    }
}

/// Everything a posting run needs, fixed at process start.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub wiki: WikiConfig,
    pub content: ContentConfig,
    pub credentials: Option<Credentials>,
    pub pds_url: Url,
    pub day_page_template: String,
    pub fallback_year: i32,
    pub cache_path: PathBuf,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub today: Option<NaiveDate>,
    pub dry_run: bool,
}

impl BotConfig {
    pub fn from_args(args: &RunArgs) -> anyhow::Result<Self> {
        let credentials = match (args.handle.as_deref(), args.password.as_ref()) {
            (Some(handle), Some(password)) => Some(Credentials {
                handle: handle.to_owned(),
                password: password.expose().to_owned(),
            }),
            _ if args.dry_run => None,
            _ => anyhow::bail!(
                "--handle and --password (or BLUESKY_HANDLE/BLUESKY_PASSWORD) are required"
            ),
        };
        if args.max_attempts == 0 {
            anyhow::bail!("--max-attempts must be > 0");
        }

        Ok(Self {
            wiki: WikiConfig::from_args(&args.wiki)?,
            content: ContentConfig::from_args(&args.content),
            credentials,
            pds_url: Url::parse(&args.pds_url).context("parse --pds-url")?,
            day_page_template: args.day_page_template.clone(),
            fallback_year: args.fallback_year,
            cache_path: args.cache.clone(),
            max_attempts: args.max_attempts,
            retry_delay: Duration::from_secs(args.retry_delay_secs),
            today: args.date,
            dry_run: args.dry_run,
        })
    }

    /// French defaults against the public wiki; used by tests and as a base
    /// for programmatic setups.
    pub fn for_language(language: &str) -> anyhow::Result<Self> {
        Ok(Self {
            wiki: WikiConfig::for_language(language)?,
            content: ContentConfig::default(),
            credentials: None,
            pds_url: Url::parse("https://bsky.social").context("parse pds url")?,
            day_page_template: "Modèle:Entrée étrangère du jour".to_owned(),
            fallback_year: 2021,
            cache_path: PathBuf::from("posted_words.json"),
            max_attempts: 10,
            retry_delay: Duration::from_secs(2),
            today: None,
            dry_run: false,
        })
    }
}
