use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use tagpin::config::{self, Config, ImagesFile};
use tagpin::image::policy::{RegexSelection, SemverSelection, VersionSelection};
use tagpin::image::registries::OciRegistry;
use tagpin::image::resolver::TagSelectedResolver;
use tagpin::image::selectors::TagSelector;
use tagpin::image::types::ResolvedImage;

#[derive(Parser)]
#[command(name = "tagpin")]
#[command(version, about = "Select container image tags by policy and pin them to digests")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/tagpin/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Talk plain HTTP to every registry
    #[arg(long, global = true)]
    insecure: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Select a tag for one repository and pin it to a digest
    Resolve {
        /// Repository without tag or digest, e.g. ghcr.io/org/app
        image: String,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Print the resolved image as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve every image listed in a JSON file
    ResolveAll {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Apply a selection policy to the given tags without contacting a registry
    Select {
        #[command(flatten)]
        selection: SelectionArgs,

        #[arg(required = true)]
        tags: Vec<String>,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Pick the highest semantic version
    #[arg(long, conflicts_with = "regex", required_unless_present = "regex")]
    semver: bool,

    /// Version constraint, may be repeated
    #[arg(long, requires = "semver")]
    constraint: Vec<String>,

    /// Consider prerelease versions
    #[arg(long, requires = "semver")]
    prereleases: bool,

    /// Only consider prereleases carrying this identifier, may be repeated
    #[arg(long = "prerelease-identifier", requires = "semver")]
    prerelease_identifiers: Vec<String>,

    /// Pick the lexicographically greatest tag matching this pattern
    #[arg(long)]
    regex: Option<String>,
}

impl From<SelectionArgs> for VersionSelection {
    fn from(args: SelectionArgs) -> Self {
        if let Some(pattern) = args.regex {
            return RegexSelection::new(pattern).into();
        }

        let selection = args
            .constraint
            .into_iter()
            .fold(SemverSelection::new(), SemverSelection::with_constraint)
            .with_prereleases(args.prereleases);

        args.prerelease_identifiers
            .into_iter()
            .fold(selection, SemverSelection::with_prerelease_identifier)
            .into()
    }
}

#[derive(Serialize)]
struct BatchOutcome {
    image: String,
    #[serde(flatten)]
    resolved: Option<ResolvedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut config = Config::load(&config_path)?.with_env_credentials(std::env::vars());
    if cli.insecure {
        config.registry.insecure = true;
    }

    let _guard = tagpin::logging::init(&config.log)?;

    match cli.command {
        Command::Select { selection, tags } => select(selection.into(), &tags),
        Command::Resolve {
            image,
            selection,
            json,
        } => runtime()?.block_on(resolve(&config, &image, &selection.into(), json)),
        Command::ResolveAll { file, json } => runtime()?.block_on(resolve_all(&config, &file, json)),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn select(selection: VersionSelection, tags: &[String]) -> anyhow::Result<()> {
    let tag = selection.select(tags)?;
    println!("{}", tag);
    Ok(())
}

fn build_resolver(config: &Config) -> anyhow::Result<TagSelectedResolver> {
    let registry = Arc::new(
        OciRegistry::new(&config.registry).context("Failed to create registry client")?,
    );
    Ok(TagSelectedResolver::new(registry.clone(), registry))
}

async fn resolve(
    config: &Config,
    image: &str,
    selection: &VersionSelection,
    json: bool,
) -> anyhow::Result<()> {
    let resolver = build_resolver(config)?;
    let resolved = resolver.resolve(image, selection).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        println!("{}", resolved.url);
    }
    Ok(())
}

async fn resolve_all(config: &Config, file: &Path, json: bool) -> anyhow::Result<()> {
    let batch = ImagesFile::load(file)?;
    let resolver = build_resolver(config)?;
    info!("Resolving {} images from {:?}", batch.images.len(), file);

    let results = futures::future::join_all(
        batch
            .images
            .iter()
            .map(|entry| resolver.resolve(&entry.image, &entry.version_selection)),
    )
    .await;

    let mut failed = 0;
    let outcomes: Vec<BatchOutcome> = batch
        .images
        .into_iter()
        .zip(results)
        .map(|(entry, result)| match result {
            Ok(resolved) => BatchOutcome {
                image: entry.image,
                resolved: Some(resolved),
                error: None,
            },
            Err(e) => {
                failed += 1;
                let message = format!("{:#}", anyhow::Error::new(e));
                warn!("Failed to resolve {}: {}", entry.image, message);
                BatchOutcome {
                    image: entry.image,
                    resolved: None,
                    error: Some(message),
                }
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            match (&outcome.resolved, &outcome.error) {
                (Some(resolved), _) => println!("{} {}", outcome.image, resolved.url),
                (None, Some(error)) => eprintln!("{} error: {}", outcome.image, error),
                (None, None) => {}
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} images failed to resolve", failed, outcomes.len());
    }
    Ok(())
}
