use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::LevelFilter;

use pdf_watermark_removal::document::MAX_DPI;
use pdf_watermark_removal::pdf::PdfiumRasterizer;
use pdf_watermark_removal::{
    find_documents, CleanOptions, DocumentResult, PdfEncoder, ProcessOptions, WatermarkEngine,
};

#[derive(Parser)]
#[command(
    name = "pdf-watermark",
    about = "Remove light colored watermark overlays from scanned PDF documents",
    version,
    after_help = "Simple usage: pdf-watermark <dir>  (cleans every PDF in <dir> into ./output)\n\n\
                  NOTE: Pages are rasterized, so the output PDFs contain images only.\n\
                  Selectable text and vector content are not preserved."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Directory containing the PDF files to clean
    #[arg(default_value = ".")]
    input: PathBuf,

    /// Output directory for cleaned PDFs
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Render resolution in dots per inch (1-2400)
    #[arg(
        long,
        default_value = "300",
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DPI))
    )]
    dpi: u32,

    /// Keep per-page PNG files of every stage under --work-dir
    #[arg(long)]
    debug: bool,

    /// Root directory for debug stage files
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Base per-channel color tolerance
    #[arg(long, default_value = "80")]
    tolerance: u8,

    /// Highest saturation still treated as watermark
    #[arg(long, default_value = "30")]
    max_saturation: u8,

    /// Lowest brightness still treated as watermark
    #[arg(long, default_value = "175")]
    min_value: u8,

    /// Channel spread at which watermark residue is painted white
    #[arg(long, default_value = "50")]
    whiten_spread: u8,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    init_logging(&cli);

    let opts = ProcessOptions {
        dpi: cli.dpi,
        debug: cli.debug,
        work_dir: cli.work_dir.clone(),
        verbose: cli.verbose,
        quiet: cli.quiet,
        clean: CleanOptions {
            base_tolerance: cli.tolerance,
            max_saturation: cli.max_saturation,
            min_value: cli.min_value,
            whiten_spread: cli.whiten_spread,
            ..CleanOptions::default()
        },
    };

    if !cli.input.is_dir() {
        eprintln!(
            "Error: Input directory does not exist: {}",
            cli.input.display()
        );
        process::exit(1);
    }

    let inputs = match find_documents(&cli.input) {
        Ok(docs) => docs,
        Err(e) => {
            eprintln!("Error: Cannot read {}: {e}", cli.input.display());
            process::exit(1);
        }
    };
    if inputs.is_empty() {
        eprintln!("No PDF files found in {}", cli.input.display());
        process::exit(1);
    }

    let rasterizer = match PdfiumRasterizer::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Fatal: {e}");
            process::exit(1);
        }
    };

    if !opts.quiet {
        eprintln!(
            "Cleaning {} document(s) at {} DPI into {}",
            inputs.len(),
            opts.dpi,
            cli.output.display()
        );
        eprintln!();
    }

    let engine = WatermarkEngine::with_options(opts.clean.clone());
    let summary = engine.process_batch(&rasterizer, &PdfEncoder, &inputs, &cli.output, &opts);

    for r in &summary.documents {
        print_result(r, &opts);
    }

    if summary.documents.len() > 1 && !opts.quiet {
        eprintln!();
        eprint!("[Summary] Cleaned: {}", summary.succeeded());
        if summary.failed() > 0 {
            eprint!(", Failed: {}", summary.failed());
        }
        eprintln!(" (Total: {})", summary.documents.len());
    }

    if !summary.is_success() {
        process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose || cli.debug {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

fn print_result(result: &DocumentResult, opts: &ProcessOptions) {
    let filename = display_name(&result.path);

    if result.success {
        if !opts.quiet {
            eprintln!(
                "[OK] {filename} ({} pages, {} cleaned)",
                result.pages.len(),
                result.cleaned_pages()
            );
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if opts.verbose && result.success {
        eprintln!("  -> {}", result.output.display());
        let placeholders = result.placeholder_pages();
        if placeholders > 0 {
            eprintln!("  -> {placeholders} page(s) replaced by blank placeholders");
        }
    }
}
