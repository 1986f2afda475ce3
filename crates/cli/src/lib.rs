use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::{Color, Preferences};
use pdf_engine::{default_engine, CancellationToken, OpenSource, PdfEngine};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{ConfigStore, StorageError};
use viewer_core::upload::sniff_mime;
use viewer_core::{AnnotationSession, Overlay, UploadedFile};

pub mod script;

#[derive(Debug, Parser)]
#[command(name = "docsign-cli")]
#[command(about = "Annotate and sign PDF documents")]
pub struct Cli {
    /// Directory holding preferences.json (defaults to the platform data directory).
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Replay a script of annotation actions and write the annotated PDF.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a script and print the overlays of the page it ends on.
    Overlays {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
    },
    /// Show, change or reset stored preferences.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective preferences as JSON.
    Show,
    /// Change stored preferences; omitted options keep their current value.
    Set {
        /// Annotation color a new session starts with; must be in the palette.
        #[arg(long, value_name = "HEX")]
        default_color: Option<Color>,
        #[arg(long, value_name = "PREFIX")]
        export_prefix: Option<String>,
        /// Initial zoom in percent.
        #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(u16).range(50..=200))]
        zoom: Option<u16>,
    },
    /// Remove stored preferences so defaults apply again.
    Reset,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    mime_type: &'static str,
    page_count: u32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    page: u32,
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct OverlaysOutput {
    page: u32,
    zoom_percent: u16,
    overlays: Vec<Overlay>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Annotate { file, script, output } => {
            let preferences = load_preferences(cli.config_dir.as_deref())?;
            run_annotate(&file, &script, output.as_deref(), preferences)
        }
        Commands::Overlays { file, script } => {
            let preferences = load_preferences(cli.config_dir.as_deref())?;
            run_overlays(&file, &script, preferences)
        }
        Commands::Config { action } => run_config(cli.config_dir.as_deref(), action),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn config_store(config_dir: Option<&Path>) -> Result<ConfigStore, StorageError> {
    match config_dir {
        Some(dir) => Ok(ConfigStore::with_root(dir)),
        None => ConfigStore::from_default_project(),
    }
}

fn load_preferences(config_dir: Option<&Path>) -> Result<Preferences> {
    let store = match config_store(config_dir) {
        Ok(store) => store,
        Err(err) => {
            log::warn!("{err}; using default preferences");
            return Ok(Preferences::default());
        }
    };

    load_from(&store)
}

fn load_from(store: &ConfigStore) -> Result<Preferences> {
    store.load_preferences().with_context(|| {
        format!("failed to load preferences from {}", store.preferences_path().display())
    })
}

fn run_config(config_dir: Option<&Path>, action: ConfigAction) -> Result<()> {
    let store = config_store(config_dir)?;

    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(&load_from(&store)?)?;
            println!("{json}");
        }
        ConfigAction::Set { default_color, export_prefix, zoom } => {
            let mut preferences = load_from(&store)?;

            if let Some(color) = default_color {
                if !preferences.palette.is_empty() && !preferences.palette.contains(&color) {
                    anyhow::bail!("color {color} is not in the palette");
                }
                preferences.default_color = color;
            }
            if let Some(prefix) = export_prefix {
                preferences.export_prefix = prefix;
            }
            if let Some(percent) = zoom {
                preferences.initial_zoom_percent = percent;
            }

            store.save_preferences(&preferences).with_context(|| {
                format!("failed to save preferences to {}", store.preferences_path().display())
            })?;
            println!("{}", store.preferences_path().display());
        }
        ConfigAction::Reset => {
            store.reset_preferences().with_context(|| {
                format!("failed to reset preferences at {}", store.preferences_path().display())
            })?;
            println!("{}", store.preferences_path().display());
        }
    }

    Ok(())
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let mime_type = sniff_mime(file, &bytes);

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::Bytes(bytes)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let pages = (0..page_count)
        .map(|index| {
            let size = engine.page_size(handle, index)?;
            Ok(PageOutput { page: index + 1, width: size.width_pt, height: size.height_pt })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput { path: file.display().to_string(), mime_type, page_count, pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_annotate(
    file: &Path,
    script_path: &Path,
    output: Option<&Path>,
    preferences: Preferences,
) -> Result<()> {
    let mut session = replayed_session(file, script_path, preferences)?;

    let exported =
        session.export(&CancellationToken::new()).context("failed to export annotated PDF")?;

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| file.with_file_name(&exported.file_name));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&output, &exported.bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    log::info!("{} annotations written", session.store().len());
    println!("{}", output.display());

    Ok(())
}

fn run_overlays(file: &Path, script_path: &Path, preferences: Preferences) -> Result<()> {
    let session = replayed_session(file, script_path, preferences)?;

    let payload = OverlaysOutput {
        page: session.current_page(),
        zoom_percent: session.zoom().percent(),
        overlays: session.overlays(),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

/// Load `file` into a fresh session and replay the script against it
fn replayed_session(
    file: &Path,
    script_path: &Path,
    preferences: Preferences,
) -> Result<AnnotationSession> {
    ensure_pdf_exists(file)?;

    let steps = script::load(script_path)?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let mut session = AnnotationSession::new(preferences);
    session
        .upload(vec![UploadedFile::from_path(file, bytes)], &mut default_engine())
        .context("failed to open PDF")?;

    for problem in script::replay(&mut session, &steps) {
        eprintln!("warning: {problem}");
    }

    Ok(session)
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
