//! Shiori CLI - terminal front end for the reading core.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shiori::config::Config;
use shiori::console::Console;
use shiori::content::format_size;
use shiori::library::Library;
use shiori::models::Book;
use shiori::session::{ReaderSession, ReaderState};
use shiori::settings::ReadingTheme;
use shiori::storage::FilePreferences;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bookshelf and chapter reader.
#[derive(Parser, Debug)]
#[command(name = "shiori")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory for persisted data (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print debug logs to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the books on the shelf.
    Shelf,

    /// Search the book source.
    Search {
        /// Text to look for in titles (empty lists everything).
        #[arg(default_value = "")]
        keyword: String,

        /// Add the Nth result (1-based) to the shelf.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        add: Option<u32>,
    },

    /// Read a book, resuming where you left off.
    Read {
        /// Book id or title.
        book: String,

        /// Open chapter N (1-based).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..), conflicts_with_all = ["next", "previous"])]
        chapter: Option<u32>,

        /// Move on to the next chapter.
        #[arg(long, conflicts_with = "previous")]
        next: bool,

        /// Go back to the previous chapter.
        #[arg(long)]
        previous: bool,

        /// Show page N (1-based) of the chapter.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Characters per page (overrides the config file).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        page_chars: Option<u32>,
    },

    /// Remove a book and its reading progress.
    Remove {
        /// Book id or title.
        book: String,
    },

    /// Show or change reader display settings.
    Settings {
        #[arg(long)]
        font_size: Option<f32>,

        #[arg(long)]
        theme: Option<ReadingTheme>,

        #[arg(long)]
        line_spacing: Option<f32>,

        #[arg(long)]
        paragraph_spacing: Option<f32>,

        /// Restore the defaults.
        #[arg(long)]
        reset: bool,
    },

    /// Show cache limits and stored data.
    Cache,

    /// List and manage book sources.
    Sources {
        /// Import sources from a JSON file.
        #[arg(long)]
        import: Option<PathBuf>,

        /// Export all sources to a JSON file.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Enable the named source.
        #[arg(long)]
        enable: Option<String>,

        /// Disable the named source.
        #[arg(long)]
        disable: Option<String>,

        /// Restore the default sources.
        #[arg(long)]
        reset: bool,
    },

    /// Show reading statistics.
    Stats {
        /// Forget all statistics.
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    shiori::logging::init(args.verbose)?;
    let console = Console::new();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(dir) = args.data_dir.clone() {
        config.paths.data_directory = Some(dir);
    }
    config.validate().context("Invalid configuration")?;

    let data_dir = config.data_dir()?;
    let prefs = FilePreferences::open(&data_dir)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
    let library = Library::new(Arc::new(prefs), config);

    match args.command {
        Command::Shelf => show_shelf(&library, &console)?,
        Command::Search { keyword, add } => search(&library, &console, &keyword, add).await?,
        Command::Read {
            book,
            chapter,
            next,
            previous,
            page,
            page_chars,
        } => {
            let book = resolve_book(&library, &book)?;
            let mut session = library.open_session(&book.book_id)?;
            library.stats().start_session(&book.book_id);
            read(&mut session, &console, chapter, next, previous).await?;

            let chars_per_page = page_chars
                .map(|n| n as usize)
                .unwrap_or(library.config().reader.chars_per_page);
            show_page(&session, &console, chars_per_page, page);
            record_reading(&library, &session)?;

            if args.verbose {
                let stats = library.content().stats();
                console.info(&format!(
                    "Content cache: {} chapters, {} ({} hits, {} misses, {} fetches)",
                    stats.entries,
                    format_size(stats.bytes as u64),
                    stats.hits,
                    stats.misses,
                    stats.fetches
                ));
            }
        }
        Command::Remove { book } => {
            let book = resolve_book(&library, &book)?;
            library.remove_book(&book.book_id)?;
            console.success(&format!("Removed {}", book.title));
        }
        Command::Settings {
            font_size,
            theme,
            line_spacing,
            paragraph_spacing,
            reset,
        } => {
            let store = library.settings();
            let settings = if reset {
                store.reset()?
            } else {
                store.update(|s| {
                    if let Some(v) = font_size {
                        s.font_size = v;
                    }
                    if let Some(v) = theme {
                        s.theme = v;
                    }
                    if let Some(v) = line_spacing {
                        s.line_spacing = v;
                    }
                    if let Some(v) = paragraph_spacing {
                        s.paragraph_spacing = v;
                    }
                })?
            };

            console.section("Reader settings");
            console.info(&format!("Font size: {}", settings.font_size));
            console.info(&format!("Theme: {}", settings.theme));
            console.info(&format!("Line spacing: {}", settings.line_spacing));
            console.info(&format!("Paragraph spacing: {}", settings.paragraph_spacing));
        }
        Command::Cache => show_cache(&library, &console, &data_dir)?,
        Command::Sources {
            import,
            export,
            enable,
            disable,
            reset,
        } => {
            let sources = library.sources();
            if reset {
                sources.reset_to_defaults()?;
                console.success("Restored the default sources");
            }
            if let Some(path) = import {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let count = sources.import_json(&json)?;
                console.success(&format!("Imported {} sources", count));
            }
            for (name, enabled) in [(enable, true), (disable, false)] {
                let Some(name) = name else { continue };
                if !sources.set_enabled(&name, enabled)? {
                    anyhow::bail!("No book source named '{}'", name);
                }
            }
            if let Some(path) = export {
                std::fs::write(&path, sources.export_json()?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                console.success(&format!("Exported sources to {}", path.display()));
            }

            console.section("Book sources");
            for source in sources.all()? {
                let state = if source.enabled { "on " } else { "off" };
                println!(
                    "  [{}] {} ({})  priority {}  {}",
                    state,
                    source.source_name,
                    source.source_url,
                    source.priority,
                    console.muted(source.group.as_deref().unwrap_or(""))
                );
            }
        }
        Command::Stats { clear } => {
            let stats = library.stats();
            if clear {
                stats.clear_all()?;
                console.success("Cleared reading statistics");
                return Ok(());
            }

            console.section("Reading statistics");
            console.info(&format!("Today: {}", format_duration(stats.today_duration()?)));
            console.info(&format!("This week: {}", format_duration(stats.week_duration()?)));
            console.info(&format!("Total: {}", format_duration(stats.total_duration()?)));
            console.info(&format!(
                "Books read: {}, chapters read: {}, words today: {}",
                console.count(stats.books_read()?),
                console.count(stats.chapters_read()?),
                stats.today_words()?
            ));

            let recent = stats.recent_records()?;
            if !recent.is_empty() {
                console.section("Recently read");
                for record in recent {
                    println!(
                        "  {} - {}  {}",
                        record.book_title,
                        record.chapter_name,
                        console.muted(&record.read_time.format("%Y-%m-%d %H:%M").to_string())
                    );
                }
            }
        }
    }

    Ok(())
}

fn show_shelf(library: &Library, console: &Console) -> Result<()> {
    let seeded = library.bookshelf().seed_samples()?;
    if seeded > 0 {
        console.info(&format!("Added {} sample books to an empty shelf", seeded));
    }

    let books = library.bookshelf().all()?;
    console.section(&format!("Bookshelf ({} books)", console.count(books.len())));
    for book in &books {
        println!("{}", console.book_entry(book));
    }
    Ok(())
}

async fn search(
    library: &Library,
    console: &Console,
    keyword: &str,
    add: Option<u32>,
) -> Result<()> {
    let enabled = library.sources().enabled()?;
    let Some(source) = enabled.first() else {
        console.warning("No book sources are enabled");
        return Ok(());
    };

    console.step(&format!(
        "Searching {} for \"{}\"...",
        source.source_name, keyword
    ));
    let results = library.search().search(keyword).await;
    if results.is_empty() {
        console.warning("No books found");
        return Ok(());
    }

    for (i, book) in results.iter().enumerate() {
        println!(
            "  {:>2}. {} - {} ({} chapters)",
            i + 1,
            book.title,
            book.author,
            book.total_chapters
        );
    }

    if let Some(n) = add {
        let book = results
            .into_iter()
            .nth(n as usize - 1)
            .ok_or_else(|| anyhow::anyhow!("No search result number {}", n))?;
        let title = book.title.clone();
        library.bookshelf().add(book)?;
        console.success(&format!("Added {} to the shelf", title));
    }
    Ok(())
}

async fn read(
    session: &mut ReaderSession,
    console: &Console,
    chapter: Option<u32>,
    next: bool,
    previous: bool,
) -> Result<()> {
    console.step(&format!("Opening {}...", session.book().title));

    if let Some(n) = chapter {
        session
            .navigate(n as usize - 1)
            .await
            .context("Cannot open that chapter")?;
    } else {
        session.start().await;
        if next && !session.next().await {
            console.warning("Already at the last chapter");
        }
        if previous && !session.previous().await {
            console.warning("Already at the first chapter");
        }
    }

    if let ReaderState::Failed { index, error } = session.state() {
        console.error(&format!("Failed to load chapter {}: {}", index + 1, error));
    }
    Ok(())
}

fn show_page(session: &ReaderSession, console: &Console, chars_per_page: usize, page: u32) {
    let Some(displayed) = session.displayed() else {
        return;
    };

    let pages = session.pages(chars_per_page);
    let Some(current) = pages.get(page as usize - 1) else {
        console.warning(&format!("Chapter only has {} pages", pages.len()));
        return;
    };

    println!();
    println!(
        "{}",
        console.chapter_heading(
            &session.catalog().progress_label(displayed.index),
            &displayed.title
        )
    );
    println!("{}", console.muted(&format!("page {}/{}", current.index + 1, current.total)));
    println!();
    println!("{}", current.content);
}

/// Adds the displayed chapter to the reading statistics.
fn record_reading(library: &Library, session: &ReaderSession) -> Result<()> {
    let stats = library.stats();
    if let Some(displayed) = session.displayed() {
        let book = session.book();
        stats.add_record(&book.book_id, &book.title, &displayed.title, displayed.index)?;
        stats.add_words(displayed.text.split_whitespace().count() as u64)?;
    }
    stats.end_session()?;
    Ok(())
}

fn format_duration(duration: chrono::Duration) -> String {
    let minutes = duration.num_minutes();
    if minutes < 60 {
        return format!("{} min", minutes);
    }
    format!("{} h {} min", minutes / 60, minutes % 60)
}

fn show_cache(library: &Library, console: &Console, data_dir: &Path) -> Result<()> {
    let config = library.config();
    console.section("Cache");
    console.info(&format!("Source: {}", library.content().source_name()));
    console.info(&format!(
        "Chapter cache holds up to {} chapters",
        config.cache.max_chapters
    ));
    console.info(&format!(
        "Prefetching {} chapters ahead",
        config.reader.prefetch_count
    ));

    let mut records = 0;
    let mut bytes = 0;
    for entry in std::fs::read_dir(data_dir)
        .with_context(|| format!("Failed to list {}", data_dir.display()))?
    {
        let metadata = entry?.metadata()?;
        if metadata.is_file() {
            records += 1;
            bytes += metadata.len();
        }
    }
    console.info(&format!(
        "Stored data: {} records, {} in {}",
        console.count(records),
        format_size(bytes),
        data_dir.display()
    ));
    Ok(())
}

/// Finds a shelved book by id or by case-insensitive title.
fn resolve_book(library: &Library, query: &str) -> Result<Book> {
    let books = library.bookshelf().all()?;
    let needle = query.to_lowercase();
    books
        .iter()
        .find(|b| b.book_id == query)
        .or_else(|| books.iter().find(|b| b.title.to_lowercase() == needle))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No book on the shelf matches '{}'", query))
}
