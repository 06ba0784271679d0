// SPDX-License-Identifier: MIT OR Apache-2.0
//! `floxy` - inspect Floxy diagram documents from the command line.

use clap::{Parser, Subcommand};
use floxy_flow::config::ConfigError;
use floxy_flow::{Flow, FlowDocument, FlowError, FlowOptions, ImportReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Inspect and validate Floxy diagrams
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a document and report rejected connections
    Check {
        /// Document to import
        file: PathBuf,
        /// RON flow options
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the SVG path of every connection
    Paths {
        /// Document to import
        file: PathBuf,
        /// Route every connection with this strategy
        #[arg(short, long)]
        path_type: Option<String>,
        /// RON flow options
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the default flow options as RON
    Config,
}

/// CLI failure
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Engine or document error
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Options file error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bad log filter directive
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// Requested path type is not registered
    #[error("Unknown path type '{0}'")]
    UnknownPathType(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.verbose) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) -> Result<(), CliError> {
    let directive = if verbose { "floxy=debug" } else { "floxy=info" };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn run(command: Command) -> Result<ExitCode, CliError> {
    match command {
        Command::Check { file, config } => {
            let options = load_options(config.as_deref())?;
            let document = FlowDocument::load(&file)?;
            let (_, report) = import(options, &document)?;
            print!("{}", format_report(&file, &report));
            Ok(if report.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Paths {
            file,
            path_type,
            config,
        } => {
            let options = load_options(config.as_deref())?;
            let document = FlowDocument::load(&file)?;
            let (mut flow, _) = import(options, &document)?;
            if let Some(path_type) = path_type {
                apply_path_type(&mut flow, &path_type)?;
            }
            for (id, d) in connection_paths(&flow) {
                println!("{}\t{}", id, d);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            println!("{}", FlowOptions::default().to_ron()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_options(path: Option<&Path>) -> Result<FlowOptions, CliError> {
    match path {
        Some(path) => {
            debug!("Loading options from {}", path.display());
            Ok(FlowOptions::load(path)?)
        }
        None => Ok(FlowOptions::default()),
    }
}

fn import(options: FlowOptions, document: &FlowDocument) -> Result<(Flow, ImportReport), CliError> {
    let mut flow = Flow::new(options)?;
    let report = flow.import(document);
    for rejected in &report.rejected {
        warn!("Rejected {}: {}", rejected.entry.output(), rejected.error);
    }
    Ok((flow, report))
}

fn apply_path_type(flow: &mut Flow, path_type: &str) -> Result<(), CliError> {
    if !flow.connections().paths().contains(path_type) {
        return Err(CliError::UnknownPathType(path_type.to_string()));
    }
    let ids: Vec<_> = flow.connections().iter().map(|c| c.id().clone()).collect();
    for id in &ids {
        flow.set_path_type(id, path_type);
    }
    Ok(())
}

fn connection_paths(flow: &Flow) -> Vec<(String, String)> {
    flow.connections()
        .iter()
        .map(|c| (c.id().to_string(), c.path().to_svg()))
        .collect()
}

fn format_report(file: &Path, report: &ImportReport) -> String {
    let mut out = format!(
        "{}: {} nodes, {} connections, {} rejected\n",
        file.display(),
        report.nodes,
        report.connections,
        report.rejected.len()
    );
    for rejected in &report.rejected {
        out.push_str(&format!(
            "  {} -> {}: {}\n",
            rejected.entry.output(),
            rejected.entry.input(),
            rejected.error
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const CYCLIC: &str = r#"{
        "nodes": [
            { "id": 1, "name": "default", "x": 0, "y": 0 },
            { "id": 2, "name": "default", "x": 300, "y": 0 }
        ],
        "connections": [
            { "outNodeId": 1, "outPort": 0, "inNodeId": 2, "inPort": 0 },
            { "outNodeId": 2, "outPort": 0, "inNodeId": 1, "inPort": 0 }
        ]
    }"#;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_report_lists_rejections() {
        let document = FlowDocument::from_json(CYCLIC).unwrap();
        let (_, report) = import(FlowOptions::default(), &document).unwrap();
        let text = format_report(Path::new("cyclic.json"), &report);
        assert!(text.starts_with("cyclic.json: 2 nodes, 1 connections, 1 rejected"));
        assert!(text.contains("2:0 -> 1:0"));
    }

    #[test]
    fn test_paths_with_override() {
        let document = FlowDocument::from_json(CYCLIC).unwrap();
        let (mut flow, _) = import(FlowOptions::default(), &document).unwrap();
        apply_path_type(&mut flow, "straight").unwrap();
        assert_eq!(
            connection_paths(&flow),
            vec![("1:0-2:0".to_string(), "M 200 50 L 300 50".to_string())]
        );
        assert!(matches!(
            apply_path_type(&mut flow, "zigzag"),
            Err(CliError::UnknownPathType(_))
        ));
    }
}
