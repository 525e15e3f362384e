//! `unitlink` — config-driven legacy reservation linkage runs.

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use unitlink_linkage::engine::{
    load_clients, load_properties, load_property_hints, load_source_rows,
};
use unitlink_linkage::{LinkConfig, LinkInput, LinkResult};

use exit_codes::{EXIT_CONFLICTS, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "unitlink")]
#[command(about = "Link legacy reservation spreadsheets to canonical CRM records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a linkage batch from a TOML config file
    #[command(after_help = "\
Examples:
  unitlink run ventas-2019.link.toml
  unitlink run ventas-2019.link.toml --json
  unitlink run ventas-2019.link.toml --output drafts.json")]
    Run {
        /// Path to the .link.toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides [output] in the config)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a linkage config without running
    #[command(after_help = "\
Examples:
  unitlink validate ventas-2019.link.toml")]
    Validate {
        /// Path to the .link.toml config file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders its own message; --help/--version are successes.
            let is_usage = err.use_stderr();
            let _ = err.print();
            return ExitCode::from(if is_usage { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };

    let result = match cli.command {
        Commands::Run { config, json, output } => cmd_run(config, json, output),
        Commands::Validate { config } => cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn cli_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot read config: {e}")))?;
    let config = LinkConfig::from_toml(&config_str)
        .map_err(|e| cli_err(EXIT_INVALID_CONFIG, e.to_string()))?;

    // File paths resolve relative to the config file's directory.
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let read = |file: &str| -> Result<String, CliError> {
        let path = base_dir.join(file);
        std::fs::read_to_string(&path)
            .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot read {}: {e}", path.display())))
    };
    let runtime = |e: unitlink_linkage::LinkError| cli_err(EXIT_RUNTIME, e.to_string());

    let clients = load_clients(&read(&config.canonical.clients)?).map_err(runtime)?;
    let properties = load_properties(&read(&config.canonical.properties)?).map_err(runtime)?;
    let property_hints = match &config.canonical.property_hints {
        Some(file) => load_property_hints(&read(file)?).map_err(runtime)?,
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for (source_name, source_config) in &config.sources {
        let csv_data = read(&source_config.file)?;
        rows.extend(load_source_rows(source_name, &csv_data, source_config).map_err(runtime)?);
    }

    let input = LinkInput { clients, properties, property_hints, rows };
    let result = unitlink_linkage::run(&config, &input).map_err(runtime)?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    let output_file =
        output_file.or_else(|| config.output.json.as_deref().map(|f| base_dir.join(f)));
    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    render_summary(&result);

    if result.summary.deactivated_by_arbiter > 0 {
        return Err(cli_err(
            EXIT_CONFLICTS,
            format!(
                "{} conflicting claim(s) deactivated",
                result.summary.deactivated_by_arbiter
            ),
        )
        .with_hint("inspect the arbiter notes in the JSON output before applying"));
    }

    Ok(())
}

fn render_summary(result: &LinkResult) {
    let s = &result.summary;
    eprintln!(
        "linkage '{}': {} row(s) — {} skipped, {} client-matched, {} property-matched, {} ready to apply (threshold: {})",
        result.meta.config_name,
        s.rows_processed,
        s.rows_skipped,
        s.client_matched,
        s.property_matched,
        s.ready_to_apply,
        result.meta.apply_threshold,
    );
    for (file, counts) in &s.by_source {
        eprintln!(
            "  {}: {} row(s), {} ready",
            file, counts.rows, counts.ready_to_apply,
        );
    }
    if s.deactivated_by_arbiter > 0 {
        eprintln!(
            "  arbiter: {} conflicting claim(s) deactivated",
            s.deactivated_by_arbiter,
        );
    }
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot read config: {e}")))?;

    match LinkConfig::from_toml(&config_str) {
        Ok(config) => {
            eprintln!(
                "valid: '{}' with {} source(s), apply threshold: {}",
                config.name,
                config.sources.len(),
                config.apply.min_confidence,
            );
            Ok(())
        }
        Err(e) => Err(cli_err(EXIT_INVALID_CONFIG, e.to_string())),
    }
}
