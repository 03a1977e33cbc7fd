use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wikiconf_core::SiteConfig;
use wikiconf_core::config::{DEFAULT_SITE_FILE, load_site_file};
use wikiconf_core::report::collect_report;

const SITE_ENV: &str = "WIKICONF_SITE";

#[derive(Debug, Parser)]
#[command(
    name = "wikiconf",
    version,
    about = "Inspect the site configuration derived for the content pipeline"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Site file (TOML, JSON or YAML)")]
    site: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Print every derived artifact as JSON")]
    Report,
    #[command(name = "article-path")]
    ArticlePath,
    Interwiki,
    Variants,
    #[command(about = "Print a compiled alias pattern")]
    Regex(RegexArgs),
    #[command(about = "Print the whole-string matcher for one magic word")]
    Magic(MagicArgs),
    #[command(about = "Match text against parameterized magic words")]
    Match(MatchArgs),
    Width(WidthArgs),
    #[command(name = "special-aliases")]
    SpecialAliases(SpecialAliasesArgs),
    #[command(name = "ns-aliases")]
    NsAliases(NsAliasesArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PatternKind {
    Redirect,
    Bsw,
    Category,
    Protocols,
}

#[derive(Debug, Args)]
struct RegexArgs {
    #[arg(value_enum)]
    kind: PatternKind,
}

#[derive(Debug, Args)]
struct MagicArgs {
    id: String,
}

#[derive(Debug, Args)]
struct MatchArgs {
    text: String,
    #[arg(required = true)]
    ids: Vec<String>,
}

#[derive(Debug, Args)]
struct WidthArgs {
    #[arg(long, value_name = "PX", help = "Explicit width; skips the user default")]
    explicit: Option<u32>,
}

#[derive(Debug, Args)]
struct SpecialAliasesArgs {
    page: String,
}

#[derive(Debug, Args)]
struct NsAliasesArgs {
    #[arg(allow_negative_numbers = true)]
    ns: i32,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        let mut command = Cli::command();
        command.print_help()?;
        println!();
        return Ok(());
    };

    let site_path = resolve_site_path(cli.site);
    let (config, fingerprint) = load_config(&site_path)?;

    match command {
        Commands::Report => {
            let report = collect_report(&config, &fingerprint)
                .with_context(|| format!("failed to derive {}", normalize_path(&site_path)))?;
            print_json(&report)
        }
        Commands::ArticlePath => print_json(config.article_path()?),
        Commands::Interwiki => print_json(config.interwiki_map()),
        Commands::Variants => print_json(config.variants()),
        Commands::Regex(RegexArgs { kind }) => run_regex(&config, kind),
        Commands::Magic(MagicArgs { id }) => {
            let matcher = config.magic_word_matcher(&id)?;
            println!("{}", matcher.delimited('/'));
            Ok(())
        }
        Commands::Match(MatchArgs { text, ids }) => run_match(&config, &text, &ids),
        Commands::Width(WidthArgs { explicit }) => {
            println!("{}", config.width_option(explicit)?);
            Ok(())
        }
        Commands::SpecialAliases(SpecialAliasesArgs { page }) => {
            print_json(&config.special_page_aliases(&page))
        }
        Commands::NsAliases(NsAliasesArgs { ns }) => print_json(&config.namespace_alias_list(ns)),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_site_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(SITE_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SITE_FILE))
}

fn load_config(path: &Path) -> Result<(SiteConfig, String)> {
    let site = load_site_file(path)?;
    let (settings, services) = site.into_parts();
    let fingerprint = settings.fingerprint();
    tracing::debug!(site = %normalize_path(path), %fingerprint, "loaded site file");
    Ok((SiteConfig::from_static(settings, services), fingerprint))
}

fn run_regex(config: &SiteConfig, kind: PatternKind) -> Result<()> {
    let matcher = match kind {
        PatternKind::Redirect => config.redirect_regexp()?,
        PatternKind::Bsw => config.bsw_regexp()?,
        PatternKind::Category => config.category_regexp()?,
        PatternKind::Protocols => config.protocol_regexp()?,
    };
    println!("{}", matcher.delimited('@'));
    Ok(())
}

fn run_match(config: &SiteConfig, text: &str, ids: &[String]) -> Result<()> {
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let matcher = config.parameterized_alias_matcher(&ids)?;
    match matcher.matches(text) {
        Some(found) => print_json(&found),
        None => {
            println!("no match");
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
