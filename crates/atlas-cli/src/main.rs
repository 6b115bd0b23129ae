use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "atlas",
    about = "atlasgrid: probe registry cache and measurement API client",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to atlas.toml (defaults apply when it doesn't exist)
    #[arg(short, long, global = true, default_value = "atlas.toml")]
    config: PathBuf,
    /// Override [api].server from the config file
    #[arg(long, global = true)]
    api_server: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the cached probe registry
    Probes {
        #[command(subcommand)]
        action: ProbesAction,
    },
    /// Fetch the archived probe registry for a day.
    ///
    /// Dates up to 2015-01-01 are answered with the 2015-01-01 snapshot.
    Archive {
        /// Day to look up (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Restrict to these probe ids (comma separated)
        #[arg(long, value_delimiter = ',')]
        probe: Vec<u32>,
    },
    /// Inspect or stop measurements
    Msm {
        #[command(subcommand)]
        action: MsmAction,
    },
    /// Manage atlas.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProbesAction {
    /// Print the whole registry in compact form
    List {
        /// Only probes with coordinates, decoded
        #[arg(long)]
        located: bool,
    },
    /// Look up probes by id
    Info {
        #[arg(required = true)]
        ids: Vec<u32>,
    },
    /// Show cache freshness without refreshing
    Status,
}

#[derive(Subcommand)]
enum MsmAction {
    /// Show a measurement
    Show {
        id: u64,
        /// Only these fields (comma separated)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Query the ES backend
        #[arg(long)]
        es: bool,
    },
    /// Stop a running measurement
    Stop {
        id: u64,
        /// Report success without sending the request
        #[arg(long)]
        dummy: bool,
    },
    /// List the members of a measurement group
    Members { id: u64 },
    /// List the probes participating in a measurement
    Participants { id: u64 },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write an atlas.toml scaffold
    Init {
        #[arg(short, long, default_value = "atlas.toml")]
        path: PathBuf,
        /// API server to write into the scaffold
        #[arg(long, default_value = "atlas.ripe.net")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("atlas=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { path, server } => commands::config::init(&path, &server),
        },
        command => {
            let ctx = commands::Context::load(&cli.config, cli.api_server)?;
            run(command, &ctx).await
        }
    };
    exit_code(result)
}

/// Failures already printed as an envelope exit non-zero without a second
/// report; anything else propagates to the default error output.
fn exit_code(result: anyhow::Result<()>) -> anyhow::Result<ExitCode> {
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if err.is::<commands::EnvelopeReported>() => Ok(ExitCode::FAILURE),
        Err(err) => Err(err),
    }
}

async fn run(command: Commands, ctx: &commands::Context) -> anyhow::Result<()> {
    match command {
        Commands::Probes { action } => match action {
            ProbesAction::List { located } => commands::probes::list(ctx, located).await,
            ProbesAction::Info { ids } => commands::probes::info(ctx, &ids).await,
            ProbesAction::Status => commands::probes::status(ctx).await,
        },
        Commands::Archive { date, probe } => commands::archive::resolve(ctx, date, &probe).await,
        Commands::Msm { action } => match action {
            MsmAction::Show { id, fields, es } => commands::msm::show(ctx, id, fields, es).await,
            MsmAction::Stop { id, dummy } => commands::msm::stop(ctx, id, dummy).await,
            MsmAction::Members { id } => commands::msm::members(ctx, id).await,
            MsmAction::Participants { id } => commands::msm::participants(ctx, id).await,
        },
        Commands::Config {
            action: ConfigAction::Init { path, server },
        } => commands::config::init(&path, &server),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_archive_with_probe_list() {
        let cli = Cli::try_parse_from([
            "atlas", "archive", "--date", "2016-06-01", "--probe", "1,2,3",
        ])
        .unwrap();
        match cli.command {
            Commands::Archive { date, probe } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2016, 6, 1).unwrap());
                assert_eq!(probe, vec![1, 2, 3]);
            }
            _ => panic!("expected archive"),
        }
    }

    #[test]
    fn stop_requires_an_id_and_defaults_to_live() {
        assert!(Cli::try_parse_from(["atlas", "msm", "stop"]).is_err());
        let cli = Cli::try_parse_from(["atlas", "msm", "stop", "42"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Msm {
                action: MsmAction::Stop { id: 42, dummy: false }
            }
        ));
    }

    #[test]
    fn reported_envelope_exits_quietly() {
        let code = exit_code(Err(commands::EnvelopeReported.into())).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(exit_code(Ok(())).unwrap(), ExitCode::SUCCESS);
        assert!(exit_code(Err(anyhow::anyhow!("bad config"))).is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "atlas", "probes", "status", "--api-server", "localhost:8080", "-c", "other.toml",
        ])
        .unwrap();
        assert_eq!(cli.api_server.as_deref(), Some("localhost:8080"));
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }
}
