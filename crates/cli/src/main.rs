mod config_commands;
mod file_commands;
mod slack_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    slackline_slack::{Envelope, SlackGateway, SlackTools},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "slackline", about = "slackline: resilient Slack Web API gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./slackline.toml and the user
    /// config directory).
    #[arg(long, global = true, env = "SLACKLINE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Slack(slack_commands::SlackAction),
    #[command(flatten)]
    Files(file_commands::FileAction),
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Initialise tracing. Logs go to stderr so stdout stays machine-readable.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Print `envelope` as JSON on stdout; a failed envelope exits with status 1.
fn emit(envelope: &Envelope) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    if !envelope.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Build the tool layer from the effective config, or emit the failure.
fn tools(cli: &Cli) -> anyhow::Result<SlackTools> {
    let config = slackline_config::load(cli.config.as_deref())?;
    match SlackGateway::from_config(&config) {
        Ok(gateway) => Ok(SlackTools::new(gateway)),
        Err(err) => {
            emit(&Envelope::from_error(&err))?;
            Err(err.into())
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "slackline starting");

    match &cli.command {
        Commands::Config { action } => config_commands::handle_config(action, cli.config.as_deref()),
        Commands::Slack(action) => {
            let tools = tools(&cli)?;
            emit(&slack_commands::handle_slack(&tools, action).await)
        },
        Commands::Files(action) => emit(&file_commands::handle_files(&cli, action).await?),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        clap::CommandFactory,
        slackline_slack::types::UserType,
    };

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_upload_with_global_flags() {
        let cli = Cli::try_parse_from([
            "slackline",
            "upload",
            "report.csv",
            "--channel",
            "C1",
            "--preview",
            "--json-logs",
        ])
        .unwrap();
        assert!(cli.json_logs);
        let Commands::Files(file_commands::FileAction::Upload {
            path,
            channel,
            preview,
            ..
        }) = cli.command
        else {
            panic!("expected upload");
        };
        assert_eq!(path, PathBuf::from("report.csv"));
        assert_eq!(channel, "C1");
        assert!(preview);
    }

    #[test]
    fn parses_repeated_user_types() {
        let cli = Cli::try_parse_from([
            "slackline",
            "users",
            "--type",
            "admin",
            "--type",
            "single_channel_guest",
        ])
        .unwrap();
        let Commands::Slack(slack_commands::SlackAction::Users { user_types, .. }) = cli.command
        else {
            panic!("expected users");
        };
        assert_eq!(user_types, [UserType::Admin, UserType::SingleChannelGuest]);
    }

    #[test]
    fn rejects_unknown_user_type() {
        assert!(Cli::try_parse_from(["slackline", "users", "--type", "wizard"]).is_err());
    }
}
