use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use regex::Regex;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use escriba::marker;
use escriba::sections::SectionMap;
use escriba::versification::Versification;
use escriba::window::{self, ViewGranularity};
use escriba::{
    completion, storage, Command, Config, DocumentEditSession, FsStore, VerseCache, VerseKey,
};

#[derive(Parser)]
#[command(name = "escriba")]
#[command(about = "Inspect and round-trip USFM-tagged scripture documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the edit window for a position in a document
    Show {
        /// Path to the USFM document
        file: PathBuf,
        /// Target position as chapter or chapter:verse (e.g. "3:16")
        #[arg(short, long, default_value = "1:1")]
        at: String,
        /// View granularity: context, verse, section, chapter or book
        #[arg(short, long)]
        view: Option<ViewGranularity>,
    },
    /// Segment a document and list its verse keys
    Check {
        /// Path to the USFM document
        file: PathBuf,
    },
    /// Verify that segmenting and reassembling reproduces the document
    Roundtrip {
        /// Path to the USFM document
        file: PathBuf,
    },
    /// Replace the text of an edit window and save the reconciled document
    Edit {
        /// Book code (e.g. GEN)
        book: String,
        /// File holding the replacement text for the displayed window
        input: PathBuf,
        /// Directory containing <BOOK>.usfm documents (defaults to the
        /// configured document directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Target position as chapter or chapter:verse
        #[arg(short, long, default_value = "1:1")]
        at: String,
        /// View granularity for the replaced window
        #[arg(short, long)]
        view: Option<ViewGranularity>,
    },
    /// Build a word-completion index over one or more documents
    Words {
        /// Paths to USFM documents
        files: Vec<PathBuf>,
        /// Prefix to complete
        #[arg(short, long)]
        prefix: Option<String>,
        /// Maximum number of completions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show or update the persisted editor defaults
    Config {
        /// Persist this view granularity as the default
        #[arg(short, long)]
        view: Option<ViewGranularity>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show { file, at, view } => show(&file, &at, view).await?,
        Commands::Check { file } => check(&file).await?,
        Commands::Roundtrip { file } => roundtrip(&file).await?,
        Commands::Edit {
            book,
            input,
            dir,
            at,
            view,
        } => edit(dir, &book, &at, view, &input).await?,
        Commands::Words {
            files,
            prefix,
            limit,
        } => words(files, prefix.as_deref(), limit).await?,
        Commands::Config { view } => configure(view)?,
    }

    Ok(())
}

/// Parse "3" or "3:16" into a (chapter, verse) pair.
fn parse_position(at: &str) -> Result<(u32, u32)> {
    let re = Regex::new(r"^(\d+)(?::(\d+))?$")?;
    let caps = re
        .captures(at)
        .ok_or_else(|| anyhow::anyhow!("invalid position: {at} (expected chapter[:verse])"))?;
    let chapter = caps[1].parse()?;
    let verse = caps.get(2).map(|m| m.as_str().parse()).transpose()?.unwrap_or(1);
    Ok((chapter, verse))
}

/// Counts derived from the cache, widened by the configured versification
/// data file when one is set. Derived counts always apply as a floor so a
/// stale data file can never hide cached material from the window.
fn effective_versification(config: &Config, cache: &VerseCache) -> Versification {
    let mut versification = Versification::from_cache(cache);
    if let Some(path) = &config.versification_path {
        match Versification::load(path) {
            Ok(external) => versification.merge(external),
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring versification data file"),
        }
    }
    versification
}

async fn show(file: &PathBuf, at: &str, view: Option<ViewGranularity>) -> Result<()> {
    let (book, text) = storage::read_document(file).await?;
    let (chapter, verse) = parse_position(at)?;

    let config = Config::load().unwrap_or_default();
    let view = view
        .or(config.default_view)
        .unwrap_or(ViewGranularity::Chapter);

    let mut cache = VerseCache::new();
    cache.rebuild(&book, &text);
    let versification = effective_versification(&config, &cache);
    let sections = SectionMap::build(&book, &marker::parse_document(&text));

    let target = VerseKey::new(book.as_str(), chapter, verse);
    let w = window::assemble(&cache, &target, view, &versification, &sections);

    println!(
        "{}",
        format!("📜 {} ({} view)", target, view).bold().green()
    );
    println!("{}", "=".repeat(50).dimmed());
    print!("{}", w.displayed);
    println!("{}", "=".repeat(50).dimmed());
    println!(
        "cursor at line {}, column {}",
        w.cursor.line.to_string().bold(),
        w.cursor.column.to_string().bold()
    );
    Ok(())
}

async fn check(file: &PathBuf) -> Result<()> {
    let (book, text) = storage::read_document(file).await?;

    let mut cache = VerseCache::new();
    cache.rebuild(&book, &text);
    let sections = SectionMap::build(&book, &marker::parse_document(&text));

    println!("{}", format!("📖 {}", book).bold().blue());
    for (key, segment) in cache.iter() {
        println!(
            "{}  {} lines, {} bytes",
            key.to_string().yellow(),
            segment.matches('\n').count().max(1),
            segment.len()
        );
    }
    println!(
        "{} segments, {} sections",
        cache.len().to_string().bold(),
        sections.len().to_string().bold()
    );
    Ok(())
}

async fn roundtrip(file: &PathBuf) -> Result<()> {
    let (book, text) = storage::read_document(file).await?;

    let mut cache = VerseCache::new();
    cache.rebuild(&book, &text);
    let rebuilt: String = cache.iter().map(|(_, s)| s).collect();

    if rebuilt == text {
        println!("{} {} round-trips byte-for-byte", "✅".green(), book.bold());
        Ok(())
    } else {
        println!("{} {} does not round-trip", "❌".red(), book.bold());
        anyhow::bail!("round-trip mismatch for {book}")
    }
}

async fn edit(
    dir: Option<PathBuf>,
    book: &str,
    at: &str,
    view: Option<ViewGranularity>,
    input: &PathBuf,
) -> Result<()> {
    let (chapter, verse) = parse_position(at)?;
    let replacement = tokio::fs::read_to_string(input).await?;

    let config = Config::load().unwrap_or_default();
    let dir = dir.or_else(|| config.document_dir.clone()).ok_or_else(|| {
        anyhow::anyhow!("no document directory: pass --dir or set document_dir in the config")
    })?;
    let view = view
        .or(config.default_view)
        .unwrap_or(ViewGranularity::Chapter);
    let external = config
        .versification_path
        .as_ref()
        .and_then(|path| Versification::load(path).ok());

    let store = FsStore::new(dir);
    let mut session = DocumentEditSession::open_with(store, book, view, external).await?;
    session.apply(Command::Goto { chapter, verse }).await?;
    session.apply(Command::ReplaceDisplayed(replacement)).await?;
    session.apply(Command::Save).await?;

    println!(
        "{} saved {} ({} view at {}:{})",
        "✅".green(),
        book.bold(),
        view,
        chapter,
        verse
    );
    Ok(())
}

async fn words(files: Vec<PathBuf>, prefix: Option<&str>, limit: usize) -> Result<()> {
    let mut books = Vec::new();
    for file in &files {
        books.push(storage::read_document(file).await?);
    }
    let index = completion::scan_books(books).await;

    println!(
        "{} distinct words across {} documents",
        index.len().to_string().bold(),
        files.len().to_string().bold()
    );
    if let Some(prefix) = prefix {
        for (word, count) in index.complete(prefix, limit) {
            println!("  {} {}", word.cyan(), format!("×{count}").dimmed());
        }
    }
    Ok(())
}

fn configure(view: Option<ViewGranularity>) -> Result<()> {
    if let Some(view) = view {
        Config::save_default_view(view)?;
        println!(
            "{} default view set to {}",
            "✅".green(),
            view.to_string().bold()
        );
        return Ok(());
    }

    let config = Config::load()?;
    let view = config
        .default_view
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unset".to_string());
    println!("default view:        {}", view.bold());
    println!(
        "document dir:        {}",
        config
            .document_dir
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unset".to_string())
            .bold()
    );
    println!(
        "versification file:  {}",
        config
            .versification_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unset".to_string())
            .bold()
    );
    Ok(())
}
