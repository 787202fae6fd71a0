use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Post the curated entry of the day.
    Daily(RunArgs),
    /// Post a random entry that passes the language and part-of-speech filter.
    Random(RunArgs),
    /// Compose a post from a saved extract and print it.
    Format(FormatArgs),
    /// Print the link preview (og:title / og:image) of a page as JSON.
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BudgetPolicyKind {
    /// Numbered definitions added while they fit (300 chars).
    Running,
    /// Whole block cut to 180 chars, stopping at the 7th `=` marker.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractMode {
    /// Rendered HTML extract (entry of the day).
    Html,
    /// Plain text with `== heading ==` markers (random entry).
    Wiki,
}

#[derive(Debug, Args)]
pub struct WikiArgs {
    /// Wiktionary language code (selects the subdomain).
    #[arg(long, env = "WIKTIONARY_LANGUAGE", default_value = "fr")]
    pub language: String,

    /// MediaWiki API endpoint (default: derived from --language).
    #[arg(long, env = "WIKTIONARY_API_URL")]
    pub api_url: Option<String>,

    /// Base URL of article pages (default: derived from --language).
    #[arg(long, env = "WIKTIONARY_WIKI_URL")]
    pub wiki_base_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct ContentArgs {
    /// Budgeting policy (default: running for `daily`, legacy for `random`).
    #[arg(long, env = "WOTD_BUDGET_POLICY", value_enum)]
    pub budget_policy: Option<BudgetPolicyKind>,

    /// Override the policy's character limit.
    #[arg(long, env = "WOTD_BUDGET_LIMIT")]
    pub budget_limit: Option<usize>,

    /// Language section an accepted random entry must start with.
    #[arg(long, env = "WOTD_LANGUAGE_HEADING", default_value = "Français")]
    pub language_heading: String,

    /// Allowed part-of-speech headings (repeatable or comma separated).
    #[arg(long = "part-of-speech", env = "WOTD_PARTS_OF_SPEECH", value_delimiter = ',')]
    pub parts_of_speech: Vec<String>,

    /// Substrings removed before budgeting (repeatable or comma separated).
    #[arg(long = "parasite", env = "WOTD_PARASITES", value_delimiter = ',')]
    pub parasites: Vec<String>,

    /// Header line of curated posts.
    #[arg(long, env = "WOTD_HEADER")]
    pub header: Option<String>,

    /// Header line of random posts.
    #[arg(long, env = "WOTD_RANDOM_HEADER")]
    pub random_header: Option<String>,

    /// Text placed before the article link in random posts.
    #[arg(long, env = "WOTD_LINK_LABEL")]
    pub link_label: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub wiki: WikiArgs,

    #[command(flatten)]
    pub content: ContentArgs,

    /// Bluesky handle used to log in.
    #[arg(long, env = "BLUESKY_HANDLE")]
    pub handle: Option<String>,

    /// Bluesky app password.
    #[arg(long, env = "BLUESKY_PASSWORD", hide_env_values = true)]
    pub password: Option<Password>,

    /// Personal data server hosting the account.
    #[arg(long, env = "BLUESKY_PDS_URL", default_value = "https://bsky.social")]
    pub pds_url: String,

    /// Page-name template of the entry of the day.
    #[arg(
        long,
        env = "WOTD_DAY_PAGE",
        default_value = "Modèle:Entrée étrangère du jour"
    )]
    pub day_page_template: String,

    /// Year tried when today's entry page does not exist.
    #[arg(long, env = "WOTD_FALLBACK_YEAR", default_value_t = 2021)]
    pub fallback_year: i32,

    /// JSON file listing titles already posted.
    #[arg(long, env = "WOTD_CACHE", default_value = "posted_words.json")]
    pub cache: PathBuf,

    /// Random-mode attempts before giving up.
    #[arg(long, env = "WOTD_MAX_ATTEMPTS", default_value_t = 10)]
    pub max_attempts: u32,

    /// Delay between random-mode attempts.
    #[arg(long, env = "WOTD_RETRY_DELAY_SECS", default_value_t = 2)]
    pub retry_delay_secs: u64,

    /// Pretend today is this date (YYYY-MM-DD).
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Compose and print the post without publishing or touching the cache.
    #[arg(long)]
    pub dry_run: bool,

    /// Also append log lines to this file.
    #[arg(long, env = "WOTD_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FormatArgs {
    /// Saved extract to read.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = ExtractMode::Html)]
    pub mode: ExtractMode,

    /// Entry title in wiki mode (default: the input file stem). In html mode
    /// the headword is used for the link and this only labels errors.
    #[arg(long)]
    pub page: Option<String>,

    #[command(flatten)]
    pub wiki: WikiArgs,

    #[command(flatten)]
    pub content: ContentArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Page to inspect (must be http/https).
    #[arg(long)]
    pub url: String,
}

/// Secret that stays out of `Debug` output.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

impl FromStr for Password {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn password_is_redacted_in_debug() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "wotd-poster",
            "daily",
            "--handle",
            "bot.example",
            "--password",
            "hunter2",
        ])?;
        let rendered = format!("{cli:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("Password(***)"));
        Ok(())
    }

    #[test]
    fn lists_accept_commas_and_repeats() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "wotd-poster",
            "format",
            "--input",
            "x.html",
            "--part-of-speech",
            "Verbe,Adverbe",
            "--part-of-speech",
            "Nom commun",
        ])?;
        let Command::Format(args) = cli.command else {
            anyhow::bail!("expected format command");
        };
        assert_eq!(
            args.content.parts_of_speech,
            vec!["Verbe", "Adverbe", "Nom commun"]
        );
        Ok(())
    }
}
