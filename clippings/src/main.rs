use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clippings::dedup::remove_duplicates;
use clippings::export::{render_bullets, render_markdown, render_raw};
use clippings::parser::{self, NomClippingsParser};
use clippings::projectors::highlight_projector;
use clippings::storage::ClippingsSource;
use clippings::tree::build_tree;

#[derive(Debug, Parser)]
#[command(
    name = "clippings",
    about = "Kindle clippings tooling built on the clippings crate",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the books that appear in a clippings file.
    Books(BooksArgs),

    /// Parse a clippings file and print its records.
    Parse(ParseArgs),

    /// Deduplicate, associate notes, and render in a chosen format.
    Export(ExportArgs),
}

#[derive(Debug, Args)]
struct BooksArgs {
    /// Clippings file to read.
    input: PathBuf,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Clippings file to read.
    input: PathBuf,
    /// Emit JSON instead of a debug representation.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Clippings file to read.
    input: PathBuf,
    /// Output layout.
    #[arg(long, value_enum)]
    format: ExportFormat,
    /// Only process records of this book (exact title match).
    #[arg(long)]
    book: Option<String>,
    /// Write the rendered output to this path instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ExportFormat {
    /// Re-emit the surviving raw blocks in the source format.
    Raw,
    /// Flat bullet list grouped by book.
    Bullet,
    /// Hierarchical category document.
    Markdown,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    match cli.command {
        Commands::Books(args) => handle_books(args, verbose),
        Commands::Parse(args) => handle_parse(args, verbose),
        Commands::Export(args) => handle_export(args, verbose),
    }
}

fn handle_books(args: BooksArgs, verbose: bool) -> Result<()> {
    if verbose {
        eprintln!("Parsing {:?}", args.input);
    }
    let clippings = NomClippingsParser.parse_file(&args.input)?;
    let books = parser::list_books(&clippings);
    if books.is_empty() {
        eprintln!("No books found in {:?}.", args.input);
        return Ok(());
    }
    for book in books {
        println!("{book}");
    }
    Ok(())
}

fn handle_parse(args: ParseArgs, verbose: bool) -> Result<()> {
    let ParseArgs { input, json } = args;
    if verbose {
        eprintln!("Parsing {:?}", input);
    }
    let clippings = NomClippingsParser.parse_file(&input)?;
    if verbose {
        eprintln!("Parsed {} records", clippings.len());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&clippings)?);
    } else {
        println!("{clippings:#?}");
    }
    Ok(())
}

fn handle_export(args: ExportArgs, verbose: bool) -> Result<()> {
    let ExportArgs {
        input,
        format,
        book,
        output,
    } = args;

    let source = NomClippingsParser;
    let rendered = match format {
        ExportFormat::Raw => {
            let mut blocks = source.read_blocks(&input)?;
            if let Some(book) = &book {
                blocks.retain(|b| block_title(b) == Some(book.as_str()));
            }
            if verbose {
                eprintln!("Re-emitting {} raw blocks", blocks.len());
            }
            render_raw(&blocks)
        }
        ExportFormat::Bullet | ExportFormat::Markdown => {
            let mut clippings = source.parse_file(&input)?;
            if let Some(book) = &book {
                clippings = parser::filter_by_book(clippings, book);
            }
            let cleaned = remove_duplicates(clippings);
            let highlights = highlight_projector::project(&cleaned);
            if verbose {
                eprintln!("Processed {} highlights", highlights.len());
            }
            match format {
                ExportFormat::Bullet => render_bullets(&highlights),
                _ => render_markdown(&build_tree(&highlights)),
            }
        }
    };

    match output {
        Some(path) => {
            fs::write(&path, rendered.as_bytes())
                .with_context(|| format!("writing {:?}", path))?;
            println!("Wrote {:?}", path);
        }
        None => {
            print!("{rendered}");
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

/// Title of a raw block, i.e. its first non-blank line.
fn block_title(block: &str) -> Option<&str> {
    block.lines().map(str::trim).find(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clippings::core::ClippingKind;
    use std::fs;

    const SAMPLE: &str = "\
Book Title (Author)
- Your Highlight on page 10 | Location 100-110 | Added on Monday, February 3, 2025 8:09:12 AM

This is a highlighted text.
==========
Book Title (Author)
- Your Note on page 10 | Location 110 | Added on Monday, February 3, 2025 8:10:00 AM

(Category) This is a note.
==========
Book Title (Author)
- Your Highlight on page 20 | Location 200-210 | Added on Monday, February 3, 2025 9:00:00 AM

This is another highlighted text.
==========
Book Title (Author)
- Your Note on page 20 | Location 209 | Added on Monday, February 3, 2025 9:01:00 AM

(Category>Subcategory) This is another note.
==========
Different Book (Another Author)
- Your Highlight on page 30 | Location 300-310 | Added on Tuesday, February 4, 2025 8:00:00 AM

This is a highlight from a different book.
==========
";

    fn processed_for(book: &str) -> Vec<clippings::core::ProcessedHighlight> {
        let clippings = clippings::parse_clippings_from_str(SAMPLE).expect("parse");
        let selected = parser::filter_by_book(clippings, book);
        let cleaned = remove_duplicates(selected);
        highlight_projector::project(&cleaned)
    }

    #[test]
    fn block_title_skips_leading_blank_lines() {
        assert_eq!(block_title("\n  Book Title\n- meta"), Some("Book Title"));
        assert_eq!(block_title("   \n\n"), None);
    }

    #[test]
    fn sample_parses_into_five_records() {
        let clippings = clippings::parse_clippings_from_str(SAMPLE).expect("parse");
        assert_eq!(clippings.len(), 5);
        assert_eq!(
            clippings
                .iter()
                .filter(|c| c.kind == ClippingKind::Note)
                .count(),
            2
        );
    }

    #[test]
    fn end_to_end_markdown_export_through_a_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("My Clippings.txt");
        fs::write(&input, SAMPLE).expect("write input");

        let output = tmp.path().join("Categorized Notes.md");
        let args = ExportArgs {
            input,
            format: ExportFormat::Markdown,
            book: Some("Book Title (Author)".to_string()),
            output: Some(output.clone()),
        };
        handle_export(args, false).expect("export");

        let markdown = fs::read_to_string(&output).expect("read output");
        assert!(markdown.contains("# Category"));
        assert!(markdown.contains("## Subcategory"));
        assert!(markdown.contains("This is a highlighted text."));
        assert!(markdown.contains("This is a note."));
        assert!(markdown.contains("This is another highlighted text."));
        assert!(markdown.contains("This is another note."));
        assert!(!markdown.contains("different book"));
    }

    #[test]
    fn end_to_end_bullet_export_through_a_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("My Clippings.txt");
        fs::write(&input, SAMPLE).expect("write input");

        let output = tmp.path().join("Bullet Notes.txt");
        let args = ExportArgs {
            input,
            format: ExportFormat::Bullet,
            book: Some("Book Title (Author)".to_string()),
            output: Some(output.clone()),
        };
        handle_export(args, false).expect("export");

        let bullets = fs::read_to_string(&output).expect("read output");
        assert!(bullets.contains("=========== Book Title (Author) ==========="));
        assert!(bullets.contains("* This is a highlighted text."));
        assert!(bullets.contains("- Note: This is a note."));
        assert!(bullets.contains("* This is another highlighted text."));
        assert!(bullets.contains("- Note: This is another note."));
        assert!(!bullets.contains("different book"));
    }

    #[test]
    fn raw_export_keeps_bookmark_blocks_and_filters_by_book() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("My Clippings.txt");
        let with_bookmark = format!(
            "{SAMPLE}Book Title (Author)\n- Your Bookmark on page 5 | Location 55 | Added on Monday, February 3, 2025 7:00:00 AM\n\n==========\n"
        );
        fs::write(&input, &with_bookmark).expect("write input");

        let output = tmp.path().join("Raw.txt");
        let args = ExportArgs {
            input,
            format: ExportFormat::Raw,
            book: Some("Book Title (Author)".to_string()),
            output: Some(output.clone()),
        };
        handle_export(args, false).expect("export");

        let raw = fs::read_to_string(&output).expect("read output");
        assert!(raw.contains("Your Bookmark"));
        assert!(raw.contains("Your Highlight on page 10"));
        assert!(!raw.contains("Different Book"));
    }

    #[test]
    fn missing_input_fails_before_any_output() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let output = tmp.path().join("never.md");
        let args = ExportArgs {
            input: tmp.path().join("does-not-exist.txt"),
            format: ExportFormat::Markdown,
            book: None,
            output: Some(output.clone()),
        };
        assert!(handle_export(args, false).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn notes_attach_to_their_highlights_in_the_sample() {
        let highlights = processed_for("Book Title (Author)");
        assert_eq!(highlights.len(), 2);
        assert_eq!(highlights[0].note_text, "This is a note.");
        assert_eq!(
            highlights[1].categories,
            vec![vec!["Category".to_string(), "Subcategory".to_string()]]
        );
    }
}
