use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use jetfeat::{
    io::{feature_output_path, write_feature_parquet},
    traits::EventSource,
    ConverterConfig, DatasetAssembler, EventRange, JetFeatError, JetFeatResult, ParquetEventSource,
    SelectionIndex,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Convert selected simulation events into jet feature tables.
#[derive(Parser, Debug)]
#[command(name = "jetfeat-convert", version, allow_negative_numbers = true)]
struct Args {
    /// Directory receiving `<name>_data.parquet` (created if missing)
    outputdir: String,
    /// Selection file with one `<event file>: <indices...>` line per source
    pathspec: String,
    /// Name of the output dataset
    name: String,
    /// Jet-constituent association radius
    dr: f64,
    /// Constituent rows stored per jet
    nc: usize,
    /// Lowest event index to keep (out-of-range values select from the start)
    rmin: i64,
    /// Event index to stop before (out-of-range values select to the end)
    rmax: i64,
    /// Save packed jet constituents (0 or 1)
    constituents: u8,
    /// Maximum energy-flow polynomial degree (negative to disable)
    basis_n: i64,
    /// Number of leading jets kept per event
    #[arg(long, default_value_t = 2)]
    n_jets: usize,
}

impl Args {
    fn config(&self) -> JetFeatResult<ConverterConfig> {
        let basis_degree = if self.basis_n < 0 {
            None
        } else {
            Some(usize::try_from(self.basis_n).map_err(|err| JetFeatError::InvalidConfig {
                reason: format!("invalid energy-flow degree {}: {}", self.basis_n, err),
            })?)
        };
        let config = ConverterConfig {
            n_jets: self.n_jets,
            jet_radius: self.dr,
            constituent_capacity: self.nc,
            save_constituents: self.constituents != 0,
            basis_degree,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

fn run(args: &Args) -> JetFeatResult<PathBuf> {
    let config = args.config()?;
    let selection = SelectionIndex::from_file(&args.pathspec)?;
    let mut assembler = DatasetAssembler::new(config)?;
    for source in selection.sources() {
        let events = ParquetEventSource::open(source)?;
        info!("opened {} with {} events", events.name(), events.n_entries());
        assembler.register_source(source, events)?;
    }
    let dataset = assembler.convert(&selection, EventRange::new(args.rmin, args.rmax))?;
    let path = feature_output_path(&args.outputdir, &args.name)?;
    info!("saving feature data to file {}", path.display());
    write_feature_parquet(&dataset, &path.to_string_lossy())?;
    info!("Successfully saved!");
    Ok(path)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
