use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use gridshift::SourceFormat;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Grid-shift engine builder and query tool
#[derive(Parser)]
#[command(name = "gridshift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine file to query
    #[arg(short, long, env = "GRIDSHIFT_DATA", global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a source table and write an engine file
    Build {
        /// Source table (.csv, .txt, or a .zip containing one)
        input: PathBuf,

        /// Engine file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Source table layout
        #[arg(short, long, default_value = "ostn02")]
        format: SourceFormat,

        #[command(flatten)]
        grid: GridArgs,

        /// Fixed-point scale of stored shifts (1000 keeps millimetres)
        #[arg(long, default_value_t = gridshift::DEFAULT_SCALE)]
        scale: u32,

        /// First hash seed, decimal or 0x-prefixed hex
        #[arg(long, env = "GRIDSHIFT_SEED", value_parser = parse_seed)]
        seed: Option<u64>,

        /// Seeds to try before giving up
        #[arg(long, default_value = "32")]
        seed_attempts: u32,
    },

    /// Interpolated shift at a single point
    Query {
        /// Eastings in grid units
        #[arg(short, long, allow_negative_numbers = true)]
        eastings: f64,

        /// Northings in grid units
        #[arg(short, long, allow_negative_numbers = true)]
        northings: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Display information about an engine file
    Info,

    /// Re-validate an engine file and optionally check a known point
    Verify {
        /// Eastings of the check point
        #[arg(long, requires_all = ["northings", "expect"], allow_negative_numbers = true)]
        eastings: Option<f64>,

        /// Northings of the check point
        #[arg(long, requires_all = ["eastings", "expect"], allow_negative_numbers = true)]
        northings: Option<f64>,

        /// Expected shift at the check point, as X,Y,Z
        #[arg(
            long,
            requires_all = ["eastings", "northings"],
            value_delimiter = ',',
            allow_hyphen_values = true
        )]
        expect: Option<Vec<f64>>,

        /// Largest accepted difference per component
        #[arg(long, default_value = "0.0005")]
        tolerance: f64,
    },
}

/// Grid placement for `build`: a preset or explicit values.
#[derive(Args)]
struct GridArgs {
    /// Named grid preset
    #[arg(long, value_parser = ["ostn02"], conflicts_with_all = ["origin_e", "origin_n", "cell_size", "columns", "rows"])]
    preset: Option<String>,

    /// Eastings of node (0, 0) [default: 0]
    #[arg(long, requires_all = ["cell_size", "columns", "rows"], allow_negative_numbers = true)]
    origin_e: Option<f64>,

    /// Northings of node (0, 0) [default: 0]
    #[arg(long, requires_all = ["cell_size", "columns", "rows"], allow_negative_numbers = true)]
    origin_n: Option<f64>,

    /// Node spacing
    #[arg(long, requires_all = ["columns", "rows"])]
    cell_size: Option<f64>,

    /// Number of node columns
    #[arg(long, requires_all = ["cell_size", "rows"])]
    columns: Option<u32>,

    /// Number of node rows
    #[arg(long, requires_all = ["cell_size", "columns"])]
    rows: Option<u32>,
}

fn parse_seed(value: &str) -> std::result::Result<u64, String> {
    gridshift::phf::parse_seed(value).ok_or_else(|| format!("invalid seed: {value}"))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridshift=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            format,
            grid,
            scale,
            seed,
            seed_attempts,
        } => commands::build::run(
            input,
            output,
            format,
            grid.into_metadata()?,
            scale,
            seed,
            seed_attempts,
        ),
        Commands::Query {
            eastings,
            northings,
            json,
        } => commands::query::run(cli.data, eastings, northings, json),
        Commands::Info => commands::info::run(cli.data),
        Commands::Verify {
            eastings,
            northings,
            expect,
            tolerance,
        } => {
            let check = match (eastings, northings, expect) {
                (Some(e), Some(n), Some(x)) => match x[..] {
                    [x, y, z] => Some(commands::verify::CheckPoint {
                        eastings: e,
                        northings: n,
                        expected: (x, y, z),
                    }),
                    _ => anyhow::bail!("--expect takes exactly three values: X,Y,Z"),
                },
                _ => None,
            };
            commands::verify::run(cli.data, check, tolerance)
        }
    }
}

impl GridArgs {
    fn into_metadata(self) -> Result<gridshift::GridMetadata> {
        if let Some(preset) = self.preset.as_deref() {
            tracing::debug!(preset, "Using grid preset");
            return Ok(gridshift::GridMetadata::ostn02());
        }

        match (self.cell_size, self.columns, self.rows) {
            (Some(cell_size), Some(columns), Some(rows)) => Ok(gridshift::GridMetadata::new(
                self.origin_e.unwrap_or(0.0),
                self.origin_n.unwrap_or(0.0),
                cell_size,
                columns,
                rows,
            )?),
            // Without explicit placement, fall back to OSTN02
            _ => Ok(gridshift::GridMetadata::ostn02()),
        }
    }
}
