//! rustevent: unit conversion and time-interval filtering of event workspaces.
//!
//! Workspaces, detector tables, splitters and corrections are read from JSON
//! files; converted or filtered workspaces are written back as JSON.
#![allow(clippy::uninlined_format_args, clippy::needless_pass_by_value)]

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use rustevent_core::{CancellationToken, DetectorGeometry, DetectorTable, EventWorkspace};
use rustevent_filter::{
    CorrectionMode, CorrectionTable, FilterConfig, FilterEvents, SplitMode, SplitterTable,
};
use rustevent_units::{ConvertConfig, ConvertUnits, UnitRegistry};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Core(#[from] rustevent_core::Error),

    #[error("invalid arguments: {0}")]
    Usage(String),
}

/// TOF correction applied before full-time splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Correction {
    /// Raw TOF
    None,
    /// Scale TOF by l1 / (l1 + l2)
    Elastic,
    /// Time at the sample for a fixed incident energy
    Direct,
    /// Subtract the secondary flight time at each detector's efixed
    Indirect,
    /// Per-detector factor and shift from a JSON table
    Customized,
}

/// Unit conversion and event filtering for neutron event data.
#[derive(Parser)]
#[command(name = "rustevent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a workspace to another unit
    Convert {
        /// Event workspace (JSON)
        #[arg(short, long)]
        workspace: PathBuf,

        /// Detector table (JSON)
        #[arg(short, long)]
        detectors: PathBuf,

        /// Target unit id, e.g. Wavelength
        #[arg(short, long)]
        target: String,

        /// Output file; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep a separate bin-edge array per spectrum
        #[arg(long)]
        no_share_bins: bool,
    },

    /// Split a workspace into one workspace per splitter target
    Filter {
        /// Event workspace (JSON)
        #[arg(short, long)]
        workspace: PathBuf,

        /// Splitter table (JSON)
        #[arg(short, long)]
        splitters: PathBuf,

        /// Detector table (JSON), needed by geometry-based corrections
        #[arg(short, long)]
        detectors: Option<PathBuf>,

        /// Compare pulse times only
        #[arg(long)]
        by_pulse_time: bool,

        /// TOF correction for full-time splitting
        #[arg(long, value_enum, default_value = "none")]
        correction: Correction,

        /// Incident energy in meV for the direct correction
        #[arg(long)]
        incident_energy: Option<f64>,

        /// Per-detector corrections (JSON) for the customized correction
        #[arg(long)]
        corrections: Option<PathBuf>,

        /// Directory for the output workspaces
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Number outputs from 1 instead of 0
        #[arg(long)]
        index_from_one: bool,

        /// Do not write the workspace of unclaimed events
        #[arg(long)]
        no_unfiltered: bool,
    },

    /// List the available units
    Units,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Convert {
            workspace,
            detectors,
            target,
            output,
            no_share_bins,
        } => run_convert(&workspace, &detectors, &target, output.as_deref(), !no_share_bins),

        Commands::Filter {
            workspace,
            splitters,
            detectors,
            by_pulse_time,
            correction,
            incident_energy,
            corrections,
            output_dir,
            index_from_one,
            no_unfiltered,
        } => {
            let correction = correction_mode(correction, incident_energy, corrections.as_deref())?;
            let mode = if by_pulse_time {
                SplitMode::PulseTime
            } else {
                SplitMode::FullTime
            };
            let config = FilterConfig::default()
                .with_mode(mode)
                .with_correction(correction)
                .with_index_from_one(index_from_one)
                .with_unfiltered(!no_unfiltered);
            let written = run_filter(
                &workspace,
                &splitters,
                detectors.as_deref(),
                config,
                &output_dir,
            )?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }

        Commands::Units => {
            let stdout = io::stdout();
            list_units(&mut stdout.lock())
        }
    }
}

fn read_workspace(path: &Path) -> Result<EventWorkspace> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_workspace(workspace: &EventWorkspace, writer: impl Write) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, workspace)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn progress(done: usize, total: usize) {
    debug!("{done}/{total} spectra");
}

fn run_convert(
    workspace_path: &Path,
    detectors: &Path,
    target: &str,
    output: Option<&Path>,
    share_bins: bool,
) -> Result<()> {
    let mut workspace = read_workspace(workspace_path)?;
    let geometry = DetectorTable::from_file(detectors)?;
    info!(
        "converting {} spectra ({} events) from {} to {}",
        workspace.num_spectra(),
        workspace.num_events(),
        workspace.unit,
        target
    );

    let start = Instant::now();
    let report = ConvertUnits::new(ConvertConfig::new(target).with_share_bins(share_bins)).run(
        &mut workspace,
        &geometry,
        &progress,
        &CancellationToken::new(),
    )?;
    info!(
        "converted {} spectra in {:.2}s (shared bins: {}, reversed: {})",
        report.converted,
        start.elapsed().as_secs_f64(),
        report.shared_bins,
        report.reversed
    );
    for masked in &report.masked {
        info!("masked {}", masked);
    }

    match output {
        Some(path) => write_workspace(&workspace, File::create(path)?),
        None => write_workspace(&workspace, io::stdout().lock()),
    }
}

fn correction_mode(
    correction: Correction,
    incident_energy: Option<f64>,
    corrections: Option<&Path>,
) -> Result<CorrectionMode> {
    let mode = match correction {
        Correction::None => CorrectionMode::None,
        Correction::Elastic => CorrectionMode::Elastic,
        Correction::Indirect => CorrectionMode::Indirect,
        Correction::Direct => {
            let incident_energy = incident_energy.ok_or_else(|| {
                CliError::Usage("--correction direct needs --incident-energy".into())
            })?;
            CorrectionMode::Direct { incident_energy }
        }
        Correction::Customized => {
            let path = corrections.ok_or_else(|| {
                CliError::Usage("--correction customized needs --corrections".into())
            })?;
            CorrectionMode::Customized(CorrectionTable::from_file(path)?)
        }
    };
    mode.validate()?;
    Ok(mode)
}

/// Splits the workspace and writes one JSON file per output, returning their paths.
fn run_filter(
    workspace_path: &Path,
    splitters: &Path,
    detectors: Option<&Path>,
    config: FilterConfig,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let workspace = read_workspace(workspace_path)?;
    let table = SplitterTable::from_file(splitters)?;
    let geometry = detectors.map(DetectorTable::from_file).transpose()?;
    info!(
        "filtering {} events with {} splitters into {} targets",
        workspace.num_events(),
        table.len(),
        table.targets().len()
    );

    let filter = FilterEvents::new(table, config);
    let start = Instant::now();
    let result = filter.run(
        &workspace,
        geometry.as_ref().map(|g| g as &dyn DetectorGeometry),
        &progress,
        &CancellationToken::new(),
    )?;
    info!(
        "filtered {} events in {:.2}s",
        result.total_events(),
        start.elapsed().as_secs_f64()
    );
    for skipped in &result.skipped {
        info!("skipped {}", skipped);
    }

    let base = workspace_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("workspace");
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(result.outputs.len() + 1);
    for (&target, output) in &result.outputs {
        let path = output_dir.join(format!("{}.json", filter.config().output_name(base, target)));
        write_workspace(output, File::create(&path)?)?;
        written.push(path);
    }
    if let Some(unfiltered) = &result.unfiltered {
        let path = output_dir.join(format!("{}.json", FilterConfig::unfiltered_name(base)));
        write_workspace(unfiltered, File::create(&path)?)?;
        written.push(path);
    }
    Ok(written)
}

fn list_units(out: &mut impl Write) -> Result<()> {
    let registry = UnitRegistry::default();
    writeln!(out, "{:<22} | {:<26} | Label", "Unit", "Caption")?;
    writeln!(out, "{:-<62}", "")?;
    for unit in registry.units() {
        writeln!(out, "{:<22} | {:<26} | {}", unit.id(), unit.caption(), unit.label())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustevent_core::{DateAndTime, Event, EventList};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_json(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn sample_workspace(dir: &Path) -> PathBuf {
        let mut spectrum = EventList::new(1, Arc::new(vec![1000.0, 2000.0, 3000.0]));
        for (pulse, tof) in [(0.0, 1500.0), (5.0, 2500.0), (15.0, 1200.0), (25.0, 2900.0)] {
            spectrum.push(Event::new(DateAndTime::from_seconds(pulse), tof));
        }
        let mut workspace = EventWorkspace::new("TOF");
        workspace.spectra.push(spectrum);

        let path = dir.join("run.json");
        write_workspace(&workspace, File::create(&path).unwrap()).unwrap();
        path
    }

    const DETECTORS: &str =
        r#"{"detectors": [{"detector_id": 1, "l1": 10.0, "l2": 2.0, "two_theta": 0.5}]}"#;

    #[test]
    fn test_convert_writes_workspace() {
        let dir = tempdir().unwrap();
        let workspace = sample_workspace(dir.path());
        let detectors = write_json(dir.path(), "detectors.json", DETECTORS);
        let output = dir.path().join("converted.json");

        run_convert(&workspace, &detectors, "Wavelength", Some(&output), true).unwrap();

        let converted = read_workspace(&output).unwrap();
        assert_eq!(converted.unit, "Wavelength");
        assert_eq!(converted.num_events(), 4);
        let x = &converted.spectra[0].x;
        assert!(x[0] < x[1] && x[1] < x[2]);
    }

    #[test]
    fn test_convert_unknown_unit() {
        let dir = tempdir().unwrap();
        let workspace = sample_workspace(dir.path());
        let detectors = write_json(dir.path(), "detectors.json", DETECTORS);

        let err = run_convert(&workspace, &detectors, "Furlongs", None, true).unwrap_err();
        assert!(matches!(
            err,
            CliError::Core(rustevent_core::Error::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_filter_writes_outputs() {
        let dir = tempdir().unwrap();
        let workspace = sample_workspace(dir.path());
        let splitters = write_json(
            dir.path(),
            "splitters.json",
            r#"{"run_start_ns": 0, "relative": [
                {"start": 0.0, "stop": 10.0, "target": 0},
                {"start": 10.0, "stop": 20.0, "target": 1}
            ]}"#,
        );
        let out_dir = dir.path().join("out");
        let config = FilterConfig::default()
            .with_mode(SplitMode::PulseTime)
            .with_index_from_one(true);

        let written = run_filter(&workspace, &splitters, None, config, &out_dir).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["run_1.json", "run_2.json", "run_unfiltered.json"]);

        assert_eq!(read_workspace(&written[0]).unwrap().num_events(), 2);
        assert_eq!(read_workspace(&written[1]).unwrap().num_events(), 1);
        assert_eq!(read_workspace(&written[2]).unwrap().num_events(), 1);
    }

    #[test]
    fn test_correction_arguments() {
        assert!(matches!(
            correction_mode(Correction::Direct, None, None),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            correction_mode(Correction::Customized, None, None),
            Err(CliError::Usage(_))
        ));
        assert!(correction_mode(Correction::Direct, Some(-3.0), None).is_err());
        assert_eq!(
            correction_mode(Correction::Direct, Some(60.0), None).unwrap(),
            CorrectionMode::Direct {
                incident_energy: 60.0
            }
        );
    }

    #[test]
    fn test_list_units() {
        let mut out = Vec::new();
        list_units(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for id in ["TOF", "Wavelength", "DeltaE_inWavenumber", "dSpacing"] {
            assert!(text.contains(id), "{id} missing from:\n{text}");
        }
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "rustevent",
            "filter",
            "-w",
            "run.json",
            "-s",
            "splitters.json",
            "--correction",
            "direct",
            "--incident-energy",
            "25",
        ])
        .unwrap();
        match cli.command {
            Commands::Filter {
                correction,
                incident_energy,
                ..
            } => {
                assert_eq!(correction, Correction::Direct);
                assert_eq!(incident_energy, Some(25.0));
            }
            _ => panic!("expected filter"),
        }
    }
}
