//! ntrules CLI - NF-e technical bulletin rule collector

mod portal;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use ntrules::{
    extract_batch, normalize_text, write_rows, DocumentExtractor, DocumentSource, ExtractOptions,
    OutputFormat, PdfDocument, TableExtractor,
};

use portal::{PortalClient, PORTAL_LIST_URL};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "ntrules")]
#[command(version)]
#[command(about = "Collect NF-e technical bulletins and export their validation rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover bulletins on the portal, download them and export their rules
    Run {
        /// Keep bulletins published on or after this date (YYYY-MM-DD)
        #[arg(long, default_value = "2025-01-01")]
        since: NaiveDate,

        /// Directory for downloaded PDFs
        #[arg(long, value_name = "DIR", env = "NTRULES_PDF_DIR", default_value = "data/pdfs")]
        pdf_dir: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "FILE", env = "NTRULES_OUTPUT")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,

        /// Process documents in parallel
        #[arg(long)]
        parallel: bool,

        /// Bulletin listing page
        #[arg(long, value_name = "URL", env = "NTRULES_PORTAL_URL", default_value = PORTAL_LIST_URL)]
        portal_url: String,
    },

    /// Extract the rules of one local PDF
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Bulletin title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// Publication date (dd/mm/yyyy)
        #[arg(long, value_parser = parse_br_date)]
        published: Option<NaiveDate>,

        /// Output file (stdout as JSON if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,
    },

    /// Print the linear text of a PDF
    Text {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Collapse whitespace the way rule fields are normalized
        #[arg(long)]
        normalized: bool,
    },

    /// Print the raw tables of a PDF as JSON
    Tables {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Only this page (1-based)
        #[arg(long)]
        page: Option<u32>,
    },

    /// Show version, schedule and rule-source diagnostics for a PDF
    Inspect {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Comma-separated values
    Csv,
    /// JSON array
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

fn parse_br_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%d/%m/%Y").map_err(|e| format!("expected dd/mm/yyyy: {}", e))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            since,
            pdf_dir,
            output,
            format,
            parallel,
            portal_url,
        } => cmd_run(since, &pdf_dir, output, format.into(), parallel, &portal_url),
        Commands::Extract {
            input,
            title,
            published,
            output,
            format,
        } => cmd_extract(&input, title, published, output.as_deref(), format.into()),
        Commands::Text { input, normalized } => cmd_text(&input, normalized),
        Commands::Tables { input, page } => cmd_tables(&input, page),
        Commands::Inspect { input } => cmd_inspect(&input),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn cmd_run(
    since: NaiveDate,
    pdf_dir: &Path,
    output: Option<PathBuf>,
    format: OutputFormat,
    parallel: bool,
    portal_url: &str,
) -> CliResult {
    let output =
        output.unwrap_or_else(|| PathBuf::from(format!("output/resultado_nts.{}", format)));

    let client = PortalClient::new(portal_url)?;
    let entries = client.discover(since)?;

    let pb = progress_bar(entries.len() as u64);
    let mut sources = Vec::with_capacity(entries.len());
    for entry in &entries {
        pb.set_message(entry.title.clone());
        sources.push(DocumentSource {
            title: entry.title.clone(),
            published: entry.published,
            pdf: client.download(entry, pdf_dir),
        });
        pb.inc(1);
    }
    pb.finish_and_clear();

    if sources.is_empty() {
        log::info!("No bulletins found; writing headers only");
    }

    let options = ExtractOptions::new().with_parallel(parallel);
    let batch = extract_batch(&sources, &options);

    let path = write_rows(&batch.rows, &output, format)?;
    log::info!("Output written: {}", path.display());
    log::info!("Rules collected in this run: {}", batch.rule_count);

    println!(
        "{} {} rule(s) from {} bulletin(s) -> {}",
        "Done!".green().bold(),
        batch.rule_count,
        batch.documents.len(),
        path.display()
    );

    Ok(())
}

fn cmd_extract(
    input: &Path,
    title: Option<String>,
    published: Option<NaiveDate>,
    output: Option<&Path>,
    format: OutputFormat,
) -> CliResult {
    let title = title.unwrap_or_else(|| {
        input
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    });

    let source = DocumentSource {
        title,
        published,
        pdf: Some(input.to_path_buf()),
    };
    let report = DocumentExtractor::default().extract_guarded(&source);

    if let Some(path) = output {
        let path = write_rows(&report.rows, path, format)?;
        println!(
            "{} {} ({} rule(s) from {})",
            "Saved to".green(),
            path.display(),
            report.rule_count(),
            report.rule_source
        );
    } else {
        println!("{}", serde_json::to_string_pretty(&report.rows)?);
    }

    Ok(())
}

fn cmd_text(input: &Path, normalized: bool) -> CliResult {
    let doc = PdfDocument::open(input)?;
    let text = ntrules::parser::document_text(&doc);

    if let Some(reason) = &text.reason {
        eprintln!("{} {}", "Warning:".yellow(), reason);
    }

    if normalized {
        println!("{}", normalize_text(&text.value));
    } else {
        println!("{}", text.value);
    }

    Ok(())
}

fn cmd_tables(input: &Path, page: Option<u32>) -> CliResult {
    let doc = PdfDocument::open(input)?;
    let extractor = TableExtractor::default();

    let pages = match page {
        Some(n) if n == 0 || n > doc.page_count() => {
            return Err(ntrules::Error::PageOutOfRange(n, doc.page_count()).into());
        }
        Some(n) => vec![n],
        None => doc.page_numbers(),
    };

    let mut tables = Vec::new();
    for page_num in pages {
        let content = doc.page_content(page_num)?;
        let page_tables = extractor.extract_page(&content);
        for failure in &page_tables.failures {
            eprintln!(
                "{} page {} ({}): {}",
                "Warning:".yellow(),
                failure.page,
                failure.strategy,
                failure.reason
            );
        }
        tables.extend(page_tables.tables);
    }

    println!("{}", serde_json::to_string_pretty(&tables)?);
    Ok(())
}

fn cmd_inspect(input: &Path) -> CliResult {
    let title = input
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let report = DocumentExtractor::default().extract(&DocumentSource::new(title, input));

    if let Some(failure) = &report.failure {
        return Err(failure.clone().into());
    }

    println!("{}", "Bulletin Diagnostics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());

    if let Some(reason) = &report.text_degraded {
        println!("{}: {}", "Text fallback".bold(), reason.yellow());
    }

    let versions = &report.version_scan;
    println!(
        "{}: {}",
        "Version header".bold(),
        if versions.header_found { "found" } else { "missing" }
    );
    println!(
        "{}: {}",
        "Version candidates".bold(),
        versions.candidates.join(", ")
    );
    println!(
        "{}: {}",
        "Version".bold(),
        versions.version.as_deref().unwrap_or("-")
    );

    let schedule = &report.schedule_scan;
    println!(
        "{}: {}",
        "Schedule header".bold(),
        if schedule.header_found { "found" } else { "missing" }
    );
    println!("{}: {}", "Dates".bold(), schedule.dates.join(", "));
    println!(
        "{}: {}",
        "Staging".bold(),
        schedule.staging.as_deref().unwrap_or("-")
    );
    println!(
        "{}: {}",
        "Production".bold(),
        schedule.production.as_deref().unwrap_or("-")
    );

    println!();
    println!("{}", "Rules".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Source".bold(), report.rule_source);
    println!("{}: {}", "Count".bold(), report.rule_count());
    for failure in &report.strategy_failures {
        println!(
            "{}: page {} ({}): {}",
            "Strategy failure".bold(),
            failure.page,
            failure.strategy,
            failure.reason
        );
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "ntrules".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("NF-e technical bulletin rule collector");
    println!();
    println!("License: MIT");
}
