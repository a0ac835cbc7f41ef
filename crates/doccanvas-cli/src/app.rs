//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use doccanvas_model::{AssetBuffer, CanvasModel};
use doccanvas_ooxml::{api, extract_blocks, ImportOptions, OoxmlArchive, OoxmlFormat, PlaceholderMap};

use crate::config::Settings;

/// Output format for listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for tool consumption
    Json,
}

#[derive(Parser)]
#[command(name = "doccanvas")]
#[command(author, version, about = "Lossless edits for Office documents", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./doccanvas.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the editable blocks of a DOCX file
    Blocks {
        /// Input DOCX file
        input: PathBuf,

        /// Skip header and footer parts
        #[arg(long)]
        body_only: bool,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Import a DOCX file into a canvas model (JSON on stdout)
    Import {
        /// Input DOCX file
        input: PathBuf,

        /// Project id used to derive asset ids
        #[arg(short, long)]
        project: String,

        /// Source file id recorded on the model (defaults to the file name)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Export an edited canvas model over its original DOCX
    Export {
        /// Original DOCX file
        input: PathBuf,

        /// Canvas model JSON
        #[arg(short, long)]
        model: PathBuf,

        /// JSON object mapping asset ids to asset buffers
        #[arg(short, long)]
        assets: Option<PathBuf>,

        /// Output DOCX file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Fill {{TOKEN}} placeholders in a DOCX, PPTX or XLSX file
    Fill {
        /// Input Office file
        input: PathBuf,

        /// JSON object mapping token names to values
        #[arg(short, long)]
        values: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Exit with an error if any token is left unresolved
        #[arg(long)]
        strict: bool,
    },

    /// Replace the text of DOCX blocks by id
    Edit {
        /// Input DOCX file
        input: PathBuf,

        /// JSON object mapping block ids to new text
        #[arg(short, long)]
        edits: PathBuf,

        /// Output DOCX file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the placeholder tokens of a DOCX, PPTX or XLSX file
    Tokens {
        /// Input Office file
        input: PathBuf,
    },

    /// Convert a DOCX file to PDF with the configured converter
    Pdf {
        /// Input DOCX file
        input: PathBuf,

        /// Output PDF file (defaults to the input with a .pdf extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Initialise stderr logging, honouring `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI application
///
/// Parses arguments, loads settings and dispatches to the command.
pub fn run_cli() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Blocks {
            input,
            body_only,
            format,
        } => blocks_command(&input, body_only, format, &settings),
        Commands::Import {
            input,
            project,
            source,
        } => import_command(&input, &project, source.as_deref(), &settings),
        Commands::Export {
            input,
            model,
            assets,
            output,
        } => export_command(&input, &model, assets.as_deref(), &output),
        Commands::Fill {
            input,
            values,
            output,
            strict,
        } => fill_command(&input, &values, &output, strict),
        Commands::Edit {
            input,
            edits,
            output,
        } => edit_command(&input, &edits, &output),
        Commands::Tokens { input } => tokens_command(&input),
        Commands::Pdf { input, output } => pdf_command(&input, output.as_deref(), &settings),
    }
}

/// Execute the blocks command
pub fn blocks_command(
    input: &Path,
    body_only: bool,
    format: OutputFormat,
    settings: &Settings,
) -> Result<()> {
    let binary = read_input(input)?;
    let archive = OoxmlArchive::open(&binary)
        .with_context(|| format!("Failed to open DOCX file: {}", input.display()))?;

    let mut options = settings.extract.options();
    if body_only {
        options.include_headers_footers = false;
    }
    let blocks = extract_blocks(&archive, &options)
        .with_context(|| format!("Failed to extract blocks: {}", input.display()))?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&blocks)
                .context("Failed to serialize blocks to JSON")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for block in &blocks {
                println!("{}  {:<20} {}", block.id, block.part, preview(&block.text));
            }
            println!("{} block(s)", blocks.len());
        }
    }
    Ok(())
}

/// Execute the import command
pub fn import_command(
    input: &Path,
    project: &str,
    source: Option<&str>,
    settings: &Settings,
) -> Result<()> {
    let binary = read_input(input)?;
    let source = match source {
        Some(source) => source.to_string(),
        None => file_name(input),
    };

    let mut options = ImportOptions::new(project, source);
    options.include_headers_footers = settings.extract.include_headers_footers;
    let result = api::import_docx_to_canvas_model(&binary, &options)
        .with_context(|| format!("Failed to import: {}", input.display()))?;
    tracing::info!(
        "imported {} entities and {} assets from {}",
        result.canvas_model.entities.len(),
        result.assets.len(),
        input.display()
    );

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize import result")?;
    println!("{}", json);
    Ok(())
}

/// Execute the export command
///
/// The changed set is derived by comparing the model with the blocks of the
/// original document.
pub fn export_command(
    input: &Path,
    model_path: &Path,
    assets_path: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let original = read_input(input)?;
    let model: CanvasModel = read_json(model_path)?;
    let assets: HashMap<String, AssetBuffer> = match assets_path {
        Some(path) => read_json(path)?,
        None => HashMap::new(),
    };

    let blocks = api::extract_editable_blocks_from_ooxml(&original, "docx", &model.source_file_id)
        .with_context(|| format!("Failed to extract blocks: {}", input.display()))?
        .blocks;
    let changed = api::changed_blocks_in_model(&blocks, &model);
    tracing::info!("{} changed block(s)", changed.len());

    let exported = api::export_canvas_model_to_docx(&model, &original, &changed, &assets)
        .with_context(|| format!("Failed to export over: {}", input.display()))?;
    write_output(output, &exported)?;
    println!(
        "Exported {} changed block(s) to {}",
        changed.len(),
        output.display()
    );
    Ok(())
}

/// Execute the fill command
pub fn fill_command(input: &Path, values: &Path, output: &Path, strict: bool) -> Result<()> {
    let binary = read_input(input)?;
    let format = format_of(input)?;
    let map: PlaceholderMap = read_json(values)?;

    let filled = api::apply_placeholder_map_to_ooxml(&binary, format.extension(), &map)
        .with_context(|| format!("Failed to fill placeholders: {}", input.display()))?;

    if strict && !filled.unresolved.is_empty() {
        anyhow::bail!("Unresolved placeholders: {}", filled.unresolved.join(", "));
    }
    write_output(output, &filled.output)?;

    println!("Filled: {}", output.display());
    for token in &filled.unresolved {
        println!("  unresolved: {{{{{}}}}}", token);
    }
    Ok(())
}

/// Execute the edit command
pub fn edit_command(input: &Path, edits: &Path, output: &Path) -> Result<()> {
    let binary = read_input(input)?;
    let edits: BTreeMap<String, String> = read_json(edits)?;

    let patched = api::apply_block_edits_to_ooxml(&binary, "docx", &edits)
        .with_context(|| format!("Failed to apply block edits: {}", input.display()))?;
    write_output(output, &patched)?;
    println!("Edited {} block(s): {}", edits.len(), output.display());
    Ok(())
}

/// Execute the tokens command
pub fn tokens_command(input: &Path) -> Result<()> {
    let binary = read_input(input)?;
    let format = format_of(input)?;
    let tokens = api::extract_placeholders_from_ooxml(&binary, format.extension())
        .with_context(|| format!("Failed to scan placeholders: {}", input.display()))?;
    for token in tokens {
        println!("{}", token);
    }
    Ok(())
}

/// Execute the pdf command
pub fn pdf_command(input: &Path, output: Option<&Path>, settings: &Settings) -> Result<()> {
    let binary = read_input(input)?;
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("pdf"),
    };

    let pdf = settings
        .pdf
        .converter()
        .convert(&binary)
        .with_context(|| format!("Failed to convert to PDF: {}", input.display()))?;
    write_output(&output, &pdf)?;
    println!("Converted: {}", output.display());
    Ok(())
}

fn read_input(input: &Path) -> Result<Vec<u8>> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    fs::read(input).with_context(|| format!("Failed to read input file: {}", input.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file: {}", path.display()))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write output: {}", path.display()))
}

fn format_of(input: &Path) -> Result<OoxmlFormat> {
    input
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(OoxmlFormat::from_ext)
        .with_context(|| format!("Not a DOCX, PPTX or XLSX file: {}", input.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn preview(text: &str) -> String {
    const WIDTH: usize = 60;
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if flat.chars().count() > WIDTH {
        let cut: String = flat.chars().take(WIDTH - 1).collect();
        format!("{}…", cut)
    } else {
        flat
    }
}
