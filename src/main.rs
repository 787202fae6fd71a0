use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use wotd_poster::bot::{self, Bot};
use wotd_poster::cache::JsonFileCache;
use wotd_poster::cli::{Cli, Command, ExtractMode, FormatArgs, PreviewArgs, RunArgs};
use wotd_poster::config::{BotConfig, ContentConfig, Mode, WikiConfig};
use wotd_poster::preview::PreviewResolver;
use wotd_poster::publish::{BlobRef, BlueskyPublisher, Post, Publisher};
use wotd_poster::wiki::{self, WiktionaryClient};

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let log_file = match &cli.command {
        Command::Daily(args) | Command::Random(args) => args.log_file.as_deref(),
        Command::Format(_) | Command::Preview(_) => None,
    };
    wotd_poster::logging::init(log_file).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Daily(args) => run(Mode::Daily, &args).context("daily"),
        Command::Random(args) => run(Mode::Random, &args).context("random"),
        Command::Format(args) => {
            format(&args).context("format")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Preview(args) => {
            preview(&args).context("preview")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run(mode: Mode, args: &RunArgs) -> anyhow::Result<ExitCode> {
    let config = BotConfig::from_args(args)?;
    let http = wiki::build_http_client().context("build http client")?;

    let wiki_client = WiktionaryClient::new(http.clone(), config.wiki.api_url.clone());
    let resolver = PreviewResolver::new(http.clone());
    let publisher: Box<dyn Publisher> = match config.credentials.clone() {
        Some(credentials) if !config.dry_run => Box::new(BlueskyPublisher::new(
            http,
            config.pds_url.clone(),
            credentials,
        )),
        _ => Box::new(DryRunPublisher),
    };
    let cache = JsonFileCache::new(config.cache_path.clone());
    let dry_run = config.dry_run;

    let mut bot = Bot::new(
        config,
        Box::new(wiki_client),
        Box::new(resolver),
        publisher,
        Box::new(cache),
    );
    match bot.run_reporting(mode) {
        Some(published) => {
            if dry_run {
                println!("{}", published.text);
            }
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

/// Stands in for the network publisher when `--dry-run` is set.
struct DryRunPublisher;

impl Publisher for DryRunPublisher {
    fn upload_blob(
        &mut self,
        _image: &wotd_poster::preview::ImageData,
    ) -> Result<BlobRef, wotd_poster::error::BotError> {
        Err(wotd_poster::error::BotError::publish("dry run: no uploads"))
    }

    fn send_post(&mut self, _post: &Post) -> Result<(), wotd_poster::error::BotError> {
        Err(wotd_poster::error::BotError::publish("dry run: no posts"))
    }
}

fn format(args: &FormatArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("read input: {}", args.input.display()))?;
    let wiki_config = WikiConfig::from_args(&args.wiki)?;
    let content = ContentConfig::from_args(&args.content);

    let composed = match args.mode {
        ExtractMode::Html => {
            let page = args
                .page
                .clone()
                .unwrap_or_else(|| args.input.display().to_string());
            bot::compose_daily(&content, &wiki_config.wiki_base_url, &page, raw)?
        }
        ExtractMode::Wiki => {
            let title = match &args.page {
                Some(page) => page.clone(),
                None => args
                    .input
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .context("input path has no file stem; pass --page")?,
            };
            let document = wotd_poster::extract::parse_wiki_sections(&title, &raw)?;
            bot::compose_random(&content, &wiki_config.wiki_base_url, &title, raw, &document)?
        }
    };

    tracing::info!(
        title = %composed.entry.title,
        total_length = composed.payload.total_length,
        truncated = composed.payload.truncated,
        "composed post"
    );
    println!("{}", composed.payload.render());
    println!("{}", composed.entry.source_url);
    Ok(())
}

fn preview(args: &PreviewArgs) -> anyhow::Result<()> {
    let url = url::Url::parse(&args.url).with_context(|| format!("parse url: {}", args.url))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("url must be http or https: {url}");
    }
    let http = wiki::build_http_client().context("build http client")?;
    let preview = PreviewResolver::new(http).resolve(&url)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&preview).context("serialize preview")?
    );
    Ok(())
}
