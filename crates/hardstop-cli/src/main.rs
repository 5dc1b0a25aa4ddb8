// crates/hardstop-cli/src/main.rs
// ============================================================================
// Module: Hardstop CLI Entry Point
// Description: Command dispatcher for runs, briefs, source tooling, doctor.
// Purpose: Wire configuration, storage, and the core pipeline behind exit codes.
// Dependencies: clap, hardstop-config, hardstop-core, hardstop-store-sqlite,
// serde, serde_json, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! The CLI is a thin dispatcher over the core pipeline: it loads the YAML
//! registries, resolves configuration with the environment layer, opens the
//! SQLite store, and executes the requested command. Raw items arrive
//! through a file-based ingest shim (the HTTP fetch collaborator lives
//! outside this repository). Exit codes come from the run-status evaluator:
//! 0 healthy, 1 warning, 2 broken, with strict mode promoting 1 to 2.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod ingest_shim;
mod run_records;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use clap::Subcommand;
use hardstop_config::ConfigError;
use hardstop_config::ResolvedConfig;
use hardstop_config::RuntimeSettings;
use hardstop_core::ArtifactKind;
use hardstop_core::ArtifactRef;
use hardstop_core::CancellationToken;
use hardstop_core::DeterminismContext;
use hardstop_core::DeterminismMode;
use hardstop_core::NetworkSnapshot;
use hardstop_core::RunGroupId;
use hardstop_core::RunId;
use hardstop_core::RunMode;
use hardstop_core::RunRecordBuilder;
use hardstop_core::RunTimer;
use hardstop_core::SourceId;
use hardstop_core::UtcTimestamp;
use hardstop_core::hashing;
use hardstop_core::hashing::canonical_json_bytes;
use hardstop_core::hashing::short_token;
use hardstop_core::interfaces::RunRecordStore;
use hardstop_core::interfaces::SourceRunStore;
use hardstop_core::runtime::OP_BRIEF;
use hardstop_core::runtime::OperatorContext;
use hardstop_core::runtime::brief;
use hardstop_core::runtime::brief::BriefWindow;
use hardstop_core::runtime::health;
use hardstop_core::runtime::health::SourceHealth;
use hardstop_core::runtime::pipeline::IngestPipeline;
use hardstop_core::runtime::pipeline::PipelineStores;
use hardstop_core::runtime::status;
use hardstop_core::runtime::status::ConfigFinding;
use hardstop_core::runtime::status::FetchOutcome;
use hardstop_core::runtime::status::FindingSeverity;
use hardstop_core::runtime::status::StatusInputs;
use hardstop_store_sqlite::HardstopStore;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::ingest_shim::load_network_snapshot;
use crate::ingest_shim::save_items_file;
use crate::run_records::FileRunRecordSink;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "hardstop", version, about = "Local-first decision engine")]
struct Cli {
    /// Directory holding `sources.yaml` and `suppression.yaml`.
    #[arg(long, value_name = "DIR", default_value = "config", global = true)]
    config: PathBuf,
    /// Artifact store database path (overrides config and environment).
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a full fetch-record plus ingest run.
    Run(RunCommand),
    /// Build and print the brief read model.
    Brief(BriefCommand),
    /// Source registry tooling.
    Sources {
        /// Selected sources subcommand.
        #[command(subcommand)]
        command: SourcesCommand,
    },
    /// Print per-source health and budget states.
    Doctor,
}

/// Arguments for `hardstop run`.
#[derive(Parser, Debug)]
struct RunCommand {
    /// Promote warnings to failures (exit 1 becomes exit 2).
    #[arg(long)]
    strict: bool,
    /// Evaluate suppression for diagnostics without stamping.
    #[arg(long)]
    no_suppress: bool,
    /// JSON file of raw items from the fetch collaborator.
    #[arg(long, value_name = "PATH")]
    items: Option<PathBuf>,
    /// JSON file holding the network snapshot.
    #[arg(long, value_name = "PATH")]
    network: Option<PathBuf>,
    /// Pinned seed for replayable runs.
    #[arg(long, value_name = "SEED", requires = "pinned_now")]
    pinned_seed: Option<String>,
    /// Pinned UTC instant (RFC 3339) for replayable runs.
    #[arg(long, value_name = "TIMESTAMP", requires = "pinned_seed")]
    pinned_now: Option<String>,
    /// Pinned run identifier for replayable runs.
    #[arg(long, value_name = "RUN_ID")]
    pinned_run_id: Option<String>,
}

/// Arguments for `hardstop brief`.
#[derive(Parser, Debug)]
struct BriefCommand {
    /// Window selection: 24h, 72h, or 168h.
    #[arg(long, value_name = "WINDOW", default_value = "24h")]
    window: String,
    /// Cap on the updated and created sections.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
    /// Exclude class-0 (interesting) alerts.
    #[arg(long)]
    no_interesting: bool,
}

/// Sources subcommands.
#[derive(Subcommand, Debug)]
enum SourcesCommand {
    /// List resolved sources with health states.
    List,
    /// Record a test fetch for one source and print its new health.
    Test {
        /// Source identifier under test.
        id: String,
        /// Optional JSON items file to parse and persist during the test.
        #[arg(long, value_name = "PATH")]
        items: Option<PathBuf>,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failure carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{0}")]
struct CliError(String);

impl CliError {
    /// Creates a CLI error from any displayable cause.
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// CLI result alias.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Host Timer
// ============================================================================

/// Wall-clock timer for live runs.
struct SystemTimer {
    /// Start instant.
    started: Instant,
}

impl SystemTimer {
    /// Starts a new timer.
    fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl RunTimer for SystemTimer {
    fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Timer that always reports zero (pinned replays).
struct PinnedTimer;

impl RunTimer for PinnedTimer {
    fn elapsed_seconds(&self) -> f64 {
        0.0
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    match dispatch(&cli) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Dispatches the parsed command.
fn dispatch(cli: &Cli) -> CliResult<ExitCode> {
    match &cli.command {
        Commands::Run(command) => run_command(cli, command),
        Commands::Brief(command) => brief_command(cli, command),
        Commands::Sources {
            command,
        } => match command {
            SourcesCommand::List => sources_list_command(cli),
            SourcesCommand::Test {
                id,
                items,
            } => sources_test_command(cli, id, items.as_deref()),
        },
        Commands::Doctor => doctor_command(cli),
    }
}

// ============================================================================
// SECTION: Shared Wiring
// ============================================================================

/// Loads registries and resolves configuration with the environment layer.
fn load_config(cli: &Cli) -> Result<ResolvedConfig, ConfigError> {
    let sources = hardstop_config::load_sources(&cli.config.join("sources.yaml"))?;
    let suppression = hardstop_config::load_suppression(&cli.config.join("suppression.yaml"))
        .or_else(|err| match err {
            // A missing suppression registry is an empty one; malformed
            // registries stay fatal.
            ConfigError::Io(_) => Ok(hardstop_config::SuppressionDocument::default()),
            other => Err(other),
        })?;
    let env: BTreeMap<String, String> = std::env::vars().collect();
    hardstop_config::resolve(&sources, &suppression, RuntimeSettings::default(), &env)
}

/// Opens the artifact store honoring the `--db` override.
fn open_store(cli: &Cli, config: &ResolvedConfig) -> CliResult<HardstopStore> {
    let path = cli
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(config.runtime.db_path.clone()));
    HardstopStore::open(&path).map_err(|err| CliError::new(err.to_string()))
}

/// Returns the current instant from the host clock.
fn host_now() -> CliResult<UtcTimestamp> {
    let seconds = time::OffsetDateTime::now_utc().unix_timestamp();
    UtcTimestamp::from_unix_seconds(seconds).map_err(|err| CliError::new(err.to_string()))
}

/// Collects health reports for every resolved source.
fn collect_health(
    config: &ResolvedConfig,
    store: &HardstopStore,
    now: UtcTimestamp,
) -> CliResult<Vec<SourceHealth>> {
    let mut reports = Vec::new();
    for source in &config.sources {
        let source_id = &source.profile.source_id;
        let fetch_runs = store
            .recent(source_id, hardstop_core::RunPhase::Fetch, config.runtime.health.window_runs)
            .map_err(|err| CliError::new(err.to_string()))?;
        let ingest_runs = store
            .recent(source_id, hardstop_core::RunPhase::Ingest, config.runtime.health.window_runs)
            .map_err(|err| CliError::new(err.to_string()))?;
        let last_success = store
            .last_success_at(source_id)
            .map_err(|err| CliError::new(err.to_string()))?;
        reports.push(health::score_source(
            source_id,
            &fetch_runs,
            &ingest_runs,
            last_success,
            now,
            &config.runtime.health,
        ));
    }
    Ok(reports)
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes a full run: save items, record fetch rows, ingest, evaluate.
fn run_command(cli: &Cli, command: &RunCommand) -> CliResult<ExitCode> {
    let config_findings: Vec<ConfigFinding> = Vec::new();
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(err) => {
            // Configuration failures are fatal: report exit 2 with the
            // deterministic message ordering from the evaluator.
            let inputs = StatusInputs {
                config_findings: vec![ConfigFinding {
                    severity: FindingSeverity::Fatal,
                    message: err.to_string(),
                }],
                strict: command.strict,
                ..StatusInputs::default()
            };
            let report = status::evaluate(&inputs);
            print_report(&report)?;
            return Ok(ExitCode::from(report.exit.code()));
        }
    };

    let (engine, duplicate_rule_ids) =
        config.engine_lenient().map_err(|err| CliError::new(err.to_string()))?;
    let config_hash = config.fingerprint().map_err(|err| CliError::new(err.to_string()))?;
    let store = open_store(cli, &config)?;
    let schema_findings =
        store.schema_findings().map_err(|err| CliError::new(err.to_string()))?;

    let pinned = command.pinned_seed.is_some();
    let now = match &command.pinned_now {
        Some(text) => UtcTimestamp::parse(text).map_err(|err| CliError::new(err.to_string()))?,
        None => host_now()?,
    };
    let run_group_id = RunGroupId::new(format!(
        "RG-{}-{}",
        now.render_compact_date(),
        short_token(&now.render(), 8)
    ));
    let determinism_context = pinned.then(|| DeterminismContext {
        seed: command.pinned_seed.clone().unwrap_or_default(),
        pinned_at: now,
        run_id: command
            .pinned_run_id
            .clone()
            .map_or_else(|| RunId::new(run_group_id.as_str()), RunId::new),
    });
    let ctx = OperatorContext {
        run_group_id,
        mode: if command.strict {
            RunMode::Strict
        } else {
            RunMode::BestEffort
        },
        determinism_mode: if pinned {
            DeterminismMode::Pinned
        } else {
            DeterminismMode::Live
        },
        determinism_context,
        config_hash,
        now,
        no_suppress: command.no_suppress,
    };

    let snapshot = match &command.network {
        Some(path) => load_network_snapshot(path)?,
        None => NetworkSnapshot::default(),
    };

    // Fetch shim: persist items from the collaborator file and build reports.
    let fetch_reports = match &command.items {
        Some(path) => save_items_file(path, &config, &store, now)?,
        None => Vec::new(),
    };

    let record_sink = FileRunRecordSink::new(
        Path::new(&config.runtime.run_records_dir),
        store.clone(),
    )?;
    let stores = PipelineStores {
        raw_items: &store,
        events: &store,
        alerts: &store,
        source_runs: &store,
        evidence: &store,
        run_records: &record_sink,
    };

    let timer: Box<dyn RunTimer> = if pinned {
        Box::new(PinnedTimer)
    } else {
        Box::new(SystemTimer::start())
    };
    let pipeline = IngestPipeline::new(
        engine,
        config.runtime.linker,
        config.runtime.score,
        config.runtime.correlator,
    );
    let cancel = CancellationToken::new();

    pipeline
        .record_fetch_reports(&ctx, &stores, &fetch_reports, timer.as_ref())
        .map_err(|err| CliError::new(err.to_string()))?;
    let ingest = pipeline
        .run_ingest(&ctx, &stores, &snapshot, &config.profiles(), timer.as_ref(), &cancel)
        .map_err(|err| CliError::new(err.to_string()))?;
    info!(
        events = ingest.events_created,
        alerts = ingest.alerts_touched,
        suppressed = ingest.items_suppressed,
        "ingest complete"
    );

    let health_reports = collect_health(&config, &store, now)?;
    let stale_sources: Vec<SourceId> = health_reports
        .iter()
        .filter(|report| {
            report
                .stale_hours
                .is_some_and(|hours| hours > config.runtime.health.stale_threshold_hours)
        })
        .map(|report| report.source_id.clone())
        .collect();
    let budget_states = health_reports
        .iter()
        .map(|report| (report.source_id.clone(), report.state))
        .collect();

    let inputs = StatusInputs {
        enabled_sources: config.enabled_source_ids(),
        fetch_outcomes: fetch_reports
            .iter()
            .map(|report| FetchOutcome {
                source_id: report.source_id.clone(),
                status: report.status,
                items_fetched: report.items_fetched,
            })
            .collect(),
        ingest_outcomes: ingest.outcomes(),
        config_findings,
        schema_findings,
        stale_sources,
        budget_states,
        ingest_aborted_before_any: ingest.aborted_before_any,
        duplicate_suppression_rule_ids: duplicate_rule_ids,
        strict: command.strict,
    };
    let report = status::evaluate(&inputs);
    print_report(&report)?;
    Ok(ExitCode::from(report.exit.code()))
}

// ============================================================================
// SECTION: Brief Command
// ============================================================================

/// Builds and prints the brief envelope as canonical JSON.
fn brief_command(cli: &Cli, command: &BriefCommand) -> CliResult<ExitCode> {
    let config = load_config(cli).map_err(|err| CliError::new(err.to_string()))?;
    let store = open_store(cli, &config)?;
    let now = host_now()?;

    let window = match command.window.as_str() {
        "24h" => BriefWindow::Hours24,
        "72h" => BriefWindow::Hours72,
        "168h" => BriefWindow::Hours168,
        other => return Err(CliError::new(format!("unsupported window: {other}"))),
    };
    let mut limits = config.runtime.brief;
    if let Some(limit) = command.limit {
        limits.limit = limit;
    }
    if command.no_interesting {
        limits.include_interesting = false;
    }

    let envelope = brief::build(&store, &store, window, now, &limits)
        .map_err(|err| CliError::new(err.to_string()))?;
    let bytes =
        canonical_json_bytes(&envelope).map_err(|err| CliError::new(err.to_string()))?;

    // One RunRecord per brief build, like every other operator execution.
    let config_hash = config.fingerprint().map_err(|err| CliError::new(err.to_string()))?;
    let run_group_id = RunGroupId::new(format!("RG-BRIEF-{}", short_token(&now.render(), 8)));
    let ctx = OperatorContext {
        run_group_id,
        mode: RunMode::BestEffort,
        determinism_mode: DeterminismMode::Live,
        determinism_context: None,
        config_hash: config_hash.clone(),
        now,
        no_suppress: false,
    };
    let mut builder = RunRecordBuilder::begin(
        ctx.derive_run_id(OP_BRIEF, 0),
        ctx.operator(OP_BRIEF),
        now,
        RunMode::BestEffort,
        config_hash,
        ctx.run_group_id.clone(),
    );
    builder.record_output(ArtifactRef {
        id: format!("brief:{}", command.window),
        kind: ArtifactKind::Brief,
        hash: hashing::hash_bytes(hashing::DEFAULT_HASH_ALGORITHM, &bytes),
    });
    let record_sink = FileRunRecordSink::new(
        Path::new(&config.runtime.run_records_dir),
        store.clone(),
    )?;
    record_sink
        .append(&builder.finalize(now, 0.0))
        .map_err(|err| CliError::new(err.to_string()))?;

    write_stdout_bytes_with_newline(&bytes)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Sources and Doctor Commands
// ============================================================================

/// Lists resolved sources with their health state.
fn sources_list_command(cli: &Cli) -> CliResult<ExitCode> {
    let config = load_config(cli).map_err(|err| CliError::new(err.to_string()))?;
    let store = open_store(cli, &config)?;
    let now = host_now()?;
    let reports = collect_health(&config, &store, now)?;

    for (source, report) in config.sources.iter().zip(reports.iter()) {
        let enabled = if source.profile.enabled {
            "enabled"
        } else {
            "disabled"
        };
        write_stdout_line(&format!(
            "{}  tier={} trust={} floor={} bias={} {}  score={} state={}",
            source.profile.source_id,
            source.profile.tier,
            source.profile.trust_tier.grade(),
            source.profile.classification_floor.band(),
            source.profile.weighting_bias,
            enabled,
            report.score,
            report.state,
        ))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Records a test fetch for one source and prints its new health state.
fn sources_test_command(cli: &Cli, id: &str, items: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(cli).map_err(|err| CliError::new(err.to_string()))?;
    let source_id = SourceId::new(id);
    if !config.sources.iter().any(|source| source.profile.source_id == source_id) {
        return Err(CliError::new(format!("unknown source: {id}")));
    }
    let store = open_store(cli, &config)?;
    let now = host_now()?;

    let items_fetched = match items {
        Some(path) => save_items_file(path, &config, &store, now)?
            .iter()
            .filter(|report| report.source_id == source_id)
            .map(|report| report.items_fetched)
            .sum(),
        None => 0,
    };

    let row = hardstop_core::SourceRun {
        run_group_id: RunGroupId::new(format!("TEST-{}", short_token(&now.render(), 8))),
        phase: hardstop_core::RunPhase::Fetch,
        source_id: source_id.clone(),
        status: hardstop_core::SourceRunStatus::Success,
        status_code: Some(200),
        error: None,
        duration_seconds: 0.0,
        counters: hardstop_core::SourceRunCounters {
            items_fetched,
            ..hardstop_core::SourceRunCounters::default()
        },
        diagnostics: BTreeMap::new(),
        run_at_utc: now,
    };
    SourceRunStore::append(&store, &row).map_err(|err| CliError::new(err.to_string()))?;

    let reports = collect_health(&config, &store, now)?;
    let report = reports
        .iter()
        .find(|report| report.source_id == source_id)
        .ok_or_else(|| CliError::new(format!("no health report for {id}")))?;
    write_stdout_line(&format!("{id}: score={} state={}", report.score, report.state))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints health and budget state for every source.
fn doctor_command(cli: &Cli) -> CliResult<ExitCode> {
    let config = load_config(cli).map_err(|err| CliError::new(err.to_string()))?;
    let store = open_store(cli, &config)?;
    let now = host_now()?;
    for report in collect_health(&config, &store, now)? {
        let stale = report
            .stale_hours
            .map_or_else(|| "never-succeeded".to_string(), |hours| format!("{hours}h"));
        write_stdout_line(&format!(
            "{}  score={} state={} success={}% stale={} streak={}",
            report.source_id,
            report.score,
            report.state,
            report.success_rate_percent,
            stale,
            report.consecutive_failures,
        ))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Prints a status report's messages.
fn print_report(report: &status::StatusReport) -> CliResult<()> {
    for message in &report.messages {
        write_stdout_line(message)?;
    }
    write_stdout_line(&format!("exit: {}", report.exit.code()))?;
    Ok(())
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))
}

/// Writes raw bytes to stdout with a trailing newline.
fn write_stdout_bytes_with_newline(bytes: &[u8]) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
