use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hybrid_player::config::{BackendConfig, BackendPreference, CompatConfig, PlayerConfig};
use hybrid_player::effects::{BandRangeCorrector, BandTable};
use hybrid_player::engine::{
    BackendKind, DataSource, DecoderQuirks, PlayerFactory, StubDecoderPool, StubNativeEngine,
    Substrates,
};
use hybrid_player::telemetry;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "hybrid-player",
    about = "Desktop harness for the hybrid player core"
)]
struct Cli {
    /// Config file (defaults to $HYBRID_PLAYER_CONFIG or hybrid_player.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Repair an equalizer band table read from a JSON file
    CorrectBands {
        input: PathBuf,
        #[arg(long)]
        sample_rate: Option<u32>,
        #[arg(long)]
        significant_figures: Option<u32>,
    },
    /// Run a scripted session on the in-memory substrates and print its events
    Simulate {
        #[arg(long, value_enum, default_value_t = BackendArg::Stock)]
        backend: BackendArg,
        /// Platform API level the stub decoder mimics
        #[arg(long, default_value_t = 21)]
        api_level: u32,
        #[arg(long)]
        nuplayer: bool,
        /// Loop points to pass before playback is allowed to complete
        #[arg(long, default_value_t = 0)]
        loops: u32,
        #[arg(long, default_value = "file:///demo.ogg")]
        uri: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Stock,
    Native,
}

/// Band table as parallel arrays, in milli-Hertz.
#[derive(Deserialize, Debug)]
struct BandInput {
    centers: Vec<i32>,
    ranges: Vec<(i32, i32)>,
}

#[derive(Serialize, Debug)]
struct BandReport {
    violations: Vec<String>,
    corrected: BandTable,
}

fn main() -> ExitCode {
    hybrid_player::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(PlayerConfig::load_from_file)
        .unwrap_or_else(PlayerConfig::load);

    match cli.command {
        Commands::CorrectBands {
            input,
            sample_rate,
            significant_figures,
        } => run_correct_bands(&config, &input, sample_rate, significant_figures),
        Commands::Simulate {
            backend,
            api_level,
            nuplayer,
            loops,
            uri,
        } => run_simulate(config, backend, api_level, nuplayer, loops, &uri),
    }
}

fn run_correct_bands(
    config: &PlayerConfig,
    input: &Path,
    sample_rate: Option<u32>,
    significant_figures: Option<u32>,
) -> Result<ExitCode> {
    let contents =
        fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let parsed: BandInput =
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", input.display()))?;
    let table = BandTable::from_parts(&parsed.centers, &parsed.ranges)?;

    let corrector = BandRangeCorrector::for_sample_rate(
        sample_rate.unwrap_or(config.equalizer.sample_rate_hz),
        significant_figures.unwrap_or(config.equalizer.significant_figures),
    );
    let violations = corrector
        .classify_bands(&table)
        .into_iter()
        .map(|flags| format!("{:?}", flags))
        .collect();
    let corrected = corrector.correct(&table)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&BandReport {
            violations,
            corrected
        })?
    );
    Ok(ExitCode::from(0))
}

fn run_simulate(
    config: PlayerConfig,
    backend: BackendArg,
    api_level: u32,
    nuplayer: bool,
    loops: u32,
    uri: &str,
) -> Result<ExitCode> {
    let pool = StubDecoderPool::new(DecoderQuirks::detect(api_level, nuplayer));
    let engine = Arc::new(StubNativeEngine::new());
    let config = PlayerConfig {
        backend: BackendConfig {
            preference: match backend {
                BackendArg::Stock => BackendPreference::Stock,
                BackendArg::Native => BackendPreference::Native,
            },
        },
        compat: CompatConfig::default(),
        ..config
    };
    let factory = PlayerFactory::new(
        config,
        Substrates::desktop_stub(&pool, Some(Arc::clone(&engine))),
    );

    let session = factory.create_session()?;
    let _prepared = session.on_prepared(|s| println!("session {}: prepared", s.id()));
    let _completion = session.on_completion(|s| println!("session {}: completion", s.id()));
    let _seek = session.on_seek_complete(|s| println!("session {}: seek complete", s.id()));
    let _error = session.on_error(|s, what, extra| {
        println!("session {}: error what={} extra={}", s.id(), what, extra);
        false
    });

    session.set_source(&DataSource::uri(uri))?;
    session.prepare_async()?;
    session.dispatch_pending();
    session.set_looping(loops > 0)?;
    session.start()?;

    let audio_session_id = session.audio_session_id()?;
    let finish: Box<dyn Fn()> = match session.backend_kind() {
        BackendKind::Stock => {
            let Some(control) = pool.control(audio_session_id) else {
                bail!("no stub decoder for audio session {}", audio_session_id);
            };
            Box::new(move || control.finish_playback())
        }
        BackendKind::Native => {
            let Some(handle) = engine.handle_for_session(audio_session_id) else {
                bail!("no stub player for audio session {}", audio_session_id);
            };
            let engine = Arc::clone(&engine);
            Box::new(move || engine.finish_playback(handle))
        }
    };

    for _ in 0..loops {
        finish();
        session.dispatch_pending();
    }
    session.set_looping(false)?;
    finish();
    session.dispatch_pending();
    println!("final state: {}", session.state());

    session.release();
    let snapshot = telemetry::hub().collector().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(ExitCode::from(0))
}
