use clap::{Parser, Subcommand};
use fulltext_engine::resolver::result::AttemptOutcome;
use fulltext_engine::{Config, FullTextResolver};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fulltext-engine", version, about = "Full-text resolution engine for academic papers")]
struct Cli {
    /// Path to a configuration file (TOML/JSON); environment variables
    /// prefixed FULLTEXT__ override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit structured JSON logs instead of human-readable ones
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve full text and metadata for a paper
    Resolve {
        /// DOI, PMID, arXiv ID, URL, or paper title
        identifier: String,

        /// Bypass the result cache
        #[arg(long)]
        no_cache: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Probe every configured source for an identifier and report each
    /// attempt
    TestSources {
        /// DOI, PMID, arXiv ID, URL, or paper title
        identifier: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fulltext_engine=info,warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let resolver = FullTextResolver::new(&config)?;

    match cli.command {
        Command::Resolve {
            identifier,
            no_cache,
            json,
        } => {
            let id = fulltext_engine::detect_identifier(&identifier)?;
            let result = resolver.resolve_paper(&id, no_cache).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            if let Some(title) = &result.metadata.title {
                println!("Title:   {title}");
            }
            if !result.metadata.authors.is_empty() {
                println!("Authors: {}", result.metadata.authors.join(", "));
            }
            if let Some(journal) = &result.metadata.journal {
                match result.metadata.year {
                    Some(year) => println!("Journal: {journal} ({year})"),
                    None => println!("Journal: {journal}"),
                }
            }
            match (&result.full_text, &result.primary_source) {
                (Some(text), Some(source)) => {
                    let kind = if result.is_full_text { "full text" } else { "partial text" };
                    println!("Source:  {source} ({kind}, {} chars)", text.chars().count());
                    println!();
                    println!("{text}");
                }
                _ => {
                    println!("No full text retrieved.");
                    for attempt in &result.attempts {
                        println!(
                            "  {} -> {:?}{}",
                            attempt.source_name,
                            attempt.outcome,
                            attempt
                                .error_kind
                                .map(|k| format!(" ({k:?})"))
                                .unwrap_or_default()
                        );
                    }
                    if !result.metadata.is_empty() {
                        println!("Metadata was resolved; see --json for details.");
                    }
                }
            }
        }
        Command::TestSources { identifier } => {
            let attempts = resolver.test_all_sources(&identifier).await?;
            for attempt in &attempts {
                let status = match attempt.outcome {
                    AttemptOutcome::Success => "ok",
                    AttemptOutcome::Failure => "fail",
                    AttemptOutcome::Skipped => "skip",
                };
                println!(
                    "{:<16} {:<5} {:>6} ms  {} chars{}",
                    attempt.source_name,
                    status,
                    attempt.latency_ms,
                    attempt.extracted_chars,
                    attempt
                        .error_kind
                        .map(|k| format!("  ({k:?})"))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
