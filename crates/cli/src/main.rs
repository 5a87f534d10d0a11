#![deny(unsafe_code)]
//! CLI binary for the brushgrid painting system.
//!
//! Subcommands:
//! - `render` replays a trigger sequence on a CPU surface and writes a PNG
//! - `list` prints the palette catalog with preview swatches

mod error;

use std::path::{Path, PathBuf};
use std::process;

use brushgrid_core::{BrushSet, GridConfig, Mode, PaletteCatalog, Studio, Trigger, Xorshift64};
use brushgrid_raster::{brushes, snapshot, PixelSurface};
use clap::{Parser, Subcommand, ValueEnum};
use error::CliError;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Procedural brushes used when no brush directory is given.
const PROCEDURAL_BRUSH_SIZE: (u32, u32) = (192, 64);

#[derive(Parser)]
#[command(name = "brushgrid", about = "Deformed-grid brush painting CLI")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Palette catalog JSON file (defaults to the built-in catalog).
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Light,
    Dark,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Light => Mode::Light,
            ModeArg::Dark => Mode::Dark,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Generate a composition, replay triggers on it and write a PNG.
    Render {
        /// Palette index in the catalog (see `list`).
        #[arg(short, long, default_value_t = 0)]
        palette: usize,

        /// Lattice columns.
        #[arg(long)]
        cols: Option<usize>,

        /// Lattice rows.
        #[arg(long)]
        rows: Option<usize>,

        /// Canvas side in pixels.
        #[arg(long)]
        size: Option<f64>,

        /// PRNG seed for deterministic output.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Directory of brush PNGs (dark marks on a light ground).
        #[arg(short, long)]
        brushes: Option<PathBuf>,

        /// Number of procedural brushes when `--brushes` is not given.
        #[arg(long, default_value_t = 6)]
        brush_count: usize,

        /// Random cell strokes painted after generation.
        #[arg(long, default_value_t = 0)]
        strokes: usize,

        /// Dynamic block attempts after the strokes.
        #[arg(long, default_value_t = 0)]
        dynamic: usize,

        /// Mode for the random cell strokes.
        #[arg(long, value_enum, default_value_t = ModeArg::Dark)]
        mode: ModeArg,

        /// JSON file with an array of triggers, replayed instead of the
        /// generated sequence.
        #[arg(long, conflicts_with_all = ["strokes", "dynamic"])]
        script: Option<PathBuf>,

        /// Grid parameters as a JSON string (cols, rows, area_size, margin,
        /// bleed, background). Flags take precedence.
        #[arg(long, default_value = "{}")]
        params: String,

        /// Output file path.
        #[arg(short, long, default_value = "output.png")]
        output: PathBuf,
    },
    /// List the palette catalog.
    List,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn load_catalog(path: Option<&Path>) -> Result<PaletteCatalog, CliError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
            PaletteCatalog::from_json(&text)
                .map_err(|e| CliError::Input(format!("invalid catalog {}: {e}", path.display())))
        }
        None => Ok(PaletteCatalog::builtin()),
    }
}

fn load_script(path: &Path) -> Result<Vec<Trigger>, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::Input(format!("invalid trigger script {}: {e}", path.display())))
}

/// Merges the grid flags over the `--params` object.
fn grid_config(
    params: &str,
    cols: Option<usize>,
    rows: Option<usize>,
    size: Option<f64>,
) -> Result<GridConfig, CliError> {
    let mut params: Value = serde_json::from_str(params)
        .map_err(|e| CliError::Input(format!("invalid --params JSON: {e}")))?;
    let Some(obj) = params.as_object_mut() else {
        return Err(CliError::Input("--params must be a JSON object".into()));
    };
    if let Some(cols) = cols {
        obj.insert("cols".into(), cols.into());
    }
    if let Some(rows) = rows {
        obj.insert("rows".into(), rows.into());
    }
    if let Some(size) = size {
        obj.insert("area_size".into(), size.into());
    }
    Ok(GridConfig::from_json(&params)?)
}

fn default_script(palette: usize, mode: Mode, strokes: usize, dynamic: usize) -> Vec<Trigger> {
    std::iter::once(Trigger::SetMode { mode })
        .chain(std::iter::once(Trigger::Regenerate { palette }))
        .chain(std::iter::repeat(Trigger::PaintRandomCell { mode: None }).take(strokes))
        .chain(std::iter::repeat(Trigger::AttemptDynamicBlock).take(dynamic))
        .collect()
}

fn run(cli: Cli) -> Result<(), CliError> {
    let catalog = load_catalog(cli.catalog.as_deref())?;
    match cli.command {
        Command::List => {
            let mut rows = Vec::with_capacity(catalog.len());
            for (i, entry) in catalog.entries().iter().enumerate() {
                let swatches: Vec<String> = catalog
                    .preview_swatches(i)?
                    .into_iter()
                    .map(|c| c.to_hex())
                    .collect();
                rows.push((i, entry, swatches));
            }
            if cli.json {
                let info: Vec<Value> = rows
                    .iter()
                    .map(|(i, entry, swatches)| {
                        serde_json::json!({
                            "index": i,
                            "name": entry.palette.name(),
                            "kind": entry.palette.kind(),
                            "light": entry.palette.light().len(),
                            "dark": entry.palette.dark().len(),
                            "swatches": swatches,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Palettes:");
                for (i, entry, swatches) in &rows {
                    println!(
                        "  {i}: {} ({} light, {} dark)  {}",
                        entry.palette.name(),
                        entry.palette.light().len(),
                        entry.palette.dark().len(),
                        swatches.join(" ")
                    );
                }
            }
        }
        Command::Render {
            palette,
            cols,
            rows,
            size,
            seed,
            brushes: brush_dir,
            brush_count,
            strokes,
            dynamic,
            mode,
            script,
            params,
            output,
        } => {
            let config = grid_config(&params, cols, rows, size)?;
            let mut rng = Xorshift64::new(seed);

            let brush_set: BrushSet = match &brush_dir {
                Some(dir) => brushes::load_dir(dir)?,
                None => {
                    let (w, h) = PROCEDURAL_BRUSH_SIZE;
                    brushes::procedural(brush_count, w, h, &mut rng)?
                }
            };

            let triggers = match &script {
                Some(path) => load_script(path)?,
                None => default_script(palette, mode.into(), strokes, dynamic),
            };

            let side = config.area_size.round() as u32;
            let mut surface = PixelSurface::new(side, side)?;
            let mut studio = Studio::new(catalog, config, brush_set, rng)?;
            for trigger in &triggers {
                studio.dispatch(*trigger, &mut surface)?;
            }

            snapshot::write_png(&mut surface, &output)?;
            info!(output = %output.display(), triggers = triggers.len(), "wrote composition");

            let blocks = studio.state().map_or(0, |s| s.blocks().len());
            if cli.json {
                let info = serde_json::json!({
                    "palette": studio.palette_index(),
                    "seed": seed,
                    "grid": studio.config().to_json(),
                    "triggers": triggers.len(),
                    "blocks": blocks,
                    "output": output.display().to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                eprintln!(
                    "rendered palette {} ({}x{} cells, {blocks} blocks, seed {seed}) -> {}",
                    studio.palette_index(),
                    studio.config().cols,
                    studio.config().rows,
                    output.display()
                );
            }
        }
    }

    Ok(())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
