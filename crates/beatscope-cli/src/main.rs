use anyhow::{bail, Context, Result};
use beatscope_bridge::CommandAnalyzer;
use beatscope_lib::{
    bridge::BridgeOutput,
    config::{read_config, PipelineConfig},
    io::wav::parse_wav_bytes,
    pipeline::AnalysisPipeline,
    report::{AnalysisReport, ErrorReport},
    signal::WaveformData,
};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use serde::Serialize;
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    time::Instant,
};

#[derive(Parser)]
#[command(
    name = "beatscope",
    version,
    about = "Beatscope: ECG-over-audio waveform analysis"
)]
struct Cli {
    /// Logging verbosity when RUST_LOG is unset (e.g., debug, info, warn)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct InputArgs {
    /// WAV file to analyze; reads stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Pipeline configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct BridgeArgs {
    /// Consult the external analyzer and merge its output over local results
    #[arg(long)]
    external_analyzer: bool,
    /// External analyzer executable
    #[arg(long)]
    analyzer_command: Option<String>,
    /// Argument passed to the external analyzer (repeatable)
    #[arg(long = "analyzer-arg", allow_hyphen_values = true)]
    analyzer_args: Vec<String>,
    /// Kill the external analyzer after this many milliseconds
    #[arg(long)]
    analyzer_timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full analysis: filtered waveform, peaks, P/Q/S/T waves and anomalies
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        bridge: BridgeArgs,
    },
    /// Print recording metadata (sampling rate, duration, sample count)
    Inspect {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Detect R-peaks only
    Peaks {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Detect P/Q/S/T landmarks around local R-peaks
    Landmarks {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Score RR-interval anomalies from local R-peaks
    Anomalies {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Speak the external analyzer protocol: waveform JSON on stdin, overrides on stdout
    ReferenceAnalyzer {
        /// Pipeline configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Metadata {
    sampling_rate: u32,
    duration: f64,
    length: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level.as_str())).init();
    match cli.command {
        Commands::Analyze { input, bridge } => cmd_analyze(&input, &bridge)?,
        Commands::Inspect { input } => cmd_inspect(&input)?,
        Commands::Peaks { input } => cmd_peaks(&input)?,
        Commands::Landmarks { input } => cmd_landmarks(&input)?,
        Commands::Anomalies { input } => cmd_anomalies(&input)?,
        Commands::ReferenceAnalyzer { config } => cmd_reference_analyzer(config.as_deref())?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => read_config(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_input(input: Option<&Path>, max_bytes: u64) -> Result<Vec<u8>> {
    match input {
        Some(path) => {
            let size = fs::metadata(path)
                .with_context(|| format!("failed to stat {}", path.display()))?
                .len();
            if size > max_bytes {
                bail!(
                    "{} is {} bytes; inputs are limited to {} bytes",
                    path.display(),
                    size,
                    max_bytes
                );
            }
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .take(max_bytes.saturating_add(1))
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            if buf.len() as u64 > max_bytes {
                bail!("stdin input exceeds the {} byte limit", max_bytes);
            }
            Ok(buf)
        }
    }
}

fn apply_bridge_args(config: &mut PipelineConfig, args: &BridgeArgs) {
    if args.external_analyzer {
        config.bridge.enabled = true;
    }
    if let Some(command) = &args.analyzer_command {
        config.bridge.command = command.clone();
    }
    if !args.analyzer_args.is_empty() {
        config.bridge.args = args.analyzer_args.clone();
    }
    if let Some(timeout_ms) = args.analyzer_timeout_ms {
        config.bridge.timeout_ms = timeout_ms;
    }
}

fn build_pipeline(config: &PipelineConfig) -> AnalysisPipeline {
    let pipeline = AnalysisPipeline::new(config);
    if config.bridge.enabled {
        pipeline.with_analyzer(Box::new(CommandAnalyzer::from_config(&config.bridge)))
    } else {
        pipeline
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn cmd_analyze(input: &InputArgs, bridge: &BridgeArgs) -> Result<()> {
    let started = Instant::now();
    let mut config = load_config(input.config.as_deref())?;
    apply_bridge_args(&mut config, bridge);
    let bytes = read_input(input.input.as_deref(), config.limits.max_input_bytes)?;
    let pipeline = build_pipeline(&config);

    match pipeline.analyze_bytes(&bytes) {
        Ok(outcome) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(
                "analysis succeeded in {}ms ({} peaks, {} anomalies, bridged {:?})",
                elapsed_ms,
                outcome.detection.peaks.len(),
                outcome.detection.anomalies.len(),
                outcome.bridged_fields
            );
            print_json(&AnalysisReport::from_outcome(outcome, elapsed_ms))
        }
        Err(err) => {
            error!(
                "analysis failed after {}ms: {}",
                started.elapsed().as_millis(),
                err
            );
            print_json(&ErrorReport::new(err.to_string()))?;
            Err(err.into())
        }
    }
}

fn load_waveform(input: &InputArgs) -> Result<(WaveformData, PipelineConfig)> {
    let config = load_config(input.config.as_deref())?;
    let bytes = read_input(input.input.as_deref(), config.limits.max_input_bytes)?;
    let waveform = parse_wav_bytes(&bytes)?;
    Ok((waveform, config))
}

fn cmd_inspect(input: &InputArgs) -> Result<()> {
    let (waveform, _) = load_waveform(input)?;
    print_json(&Metadata {
        sampling_rate: waveform.sampling_rate(),
        duration: waveform.duration(),
        length: waveform.len(),
    })
}

fn cmd_peaks(input: &InputArgs) -> Result<()> {
    let (waveform, config) = load_waveform(input)?;
    let local = AnalysisPipeline::new(&config).run_local(&waveform)?;
    print_json(&local.peaks)
}

fn cmd_landmarks(input: &InputArgs) -> Result<()> {
    let (waveform, config) = load_waveform(input)?;
    let outcome = AnalysisPipeline::new(&config).analyze(&waveform)?;
    print_json(&outcome.detection.landmarks)
}

fn cmd_anomalies(input: &InputArgs) -> Result<()> {
    let (waveform, config) = load_waveform(input)?;
    let local = AnalysisPipeline::new(&config).run_local(&waveform)?;
    print_json(&local.anomalies)
}

fn cmd_reference_analyzer(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    let local = serde_json::from_str::<WaveformData>(&buf)
        .map_err(|err| format!("invalid waveform payload: {}", err))
        .and_then(|waveform| {
            AnalysisPipeline::new(&config)
                .run_local(&waveform)
                .map_err(|err| err.to_string())
        });
    let response = match local {
        Ok(local) => BridgeOutput {
            filtered_data: Some(local.filtered),
            peaks: None,
            anomalies: Some(local.anomalies),
            error: None,
        },
        Err(message) => BridgeOutput {
            error: Some(message),
            ..BridgeOutput::default()
        },
    };
    print_json(&response)
}
