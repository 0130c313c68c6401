use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use rolls_client::config::{
    self,
    AppConfig,
    CliOverrides,
};
use std::{
    path::Path,
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const LOG_FILE_PREFIX: &str = "rolls-client.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: rolls-client [--api-url <url>] [--user-id <id>] [--init-data <data>]\n\
         [--config <path>] [--log-dir <path>]\n\
         \n\
         Flags:\n\
           --api-url <url>     Backend base URL (default {}, env {})\n\
           --user-id <id>      Telegram user id sent with every request (env {})\n\
           --init-data <data>  Telegram init data sent with every request (env {})\n\
           --config <path>     JSON config file with api, identity, sync and rules settings\n\
           --log-dir <path>    Directory for the daily rolling log (default {})",
        config::DEFAULT_API_URL,
        config::API_URL_ENV,
        config::USER_ID_ENV,
        config::INIT_DATA_ENV,
        config::DEFAULT_LOG_DIR,
    );
    std::process::exit(0);
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<CliOverrides> {
    fn take_value(
        flag: &str,
        slot: &mut Option<String>,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<()> {
        let value = args
            .next()
            .ok_or_else(|| eyre!("{flag} requires an argument"))?;
        if slot.is_some() {
            return Err(eyre!("{flag} may only be specified once"));
        }
        *slot = Some(value);
        Ok(())
    }

    let mut args = args.into_iter();
    let mut cli = CliOverrides::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--api-url" => take_value("--api-url", &mut cli.api_url, &mut args)?,
            "--user-id" => take_value("--user-id", &mut cli.user_id, &mut args)?,
            "--init-data" => take_value("--init-data", &mut cli.init_data, &mut args)?,
            "--config" => take_value("--config", &mut cli.config_path, &mut args)?,
            "--log-dir" => take_value("--log-dir", &mut cli.log_dir, &mut args)?,
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }
    Ok(cli)
}

fn init_tracing(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!(e))
        .wrap_err("Failed to install tracing subscriber")
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = parse_cli_args(std::env::args().skip(1))?;
    let app_config = AppConfig::load(&cli).wrap_err("Failed to load configuration")?;
    init_tracing(&app_config.log_dir)?;
    tracing::info!(api_url = %app_config.api_url, user_id = app_config.identity.user_id, "starting rolls-client");
    client::run_app(app_config).await
}
