use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use daemonctl::cli::Cli;
use daemonctl::{DaemonSettings, new_daemon};
use log::info;

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let settings = DaemonSettings::load(cli.config.as_deref())
        .context("Failed to load settings")?
        .merge(cli.settings());

    let executable = match &cli.daemon.exec {
        Some(path) => path.clone(),
        None => std::env::current_exe().context("Failed to locate this executable")?,
    };

    let daemon = new_daemon(&settings, &executable).context("Failed to set up service")?;
    info!("using {} backend", daemon.platform());

    let code = cli.command.execute(&daemon)?;
    Ok(code)
}
