mod check;
mod serve;

use anyhow::{Context, Result, bail};
use console::style;
use std::path::PathBuf;

use crate::core::config::CliOverrides;
use crate::core::terminal::print_step;

fn print_help() {
    print_step("agent-relay: queue agent requests and collect their results");
    println!();
    println!("  {}", style("Commands").bold().underlined());
    for (cmd, desc) in [
        ("serve", "Start the HTTP API (default)"),
        ("check", "Validate configuration and storage, then exit"),
        ("help", "Show this message"),
    ] {
        println!("    {:<8} {}", style(cmd).green(), desc);
    }
    println!();
    println!("  {}", style("Options").bold().underlined());
    for (flag, desc) in [
        ("--config <FILE>", "TOML configuration file"),
        ("--host <HOST>", "Listen address (serve only)"),
        ("--port <PORT>", "Listen port (serve only)"),
    ] {
        println!("    {:<16} {}", style(flag).cyan(), desc);
    }
    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("agent-relay").green()
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Serve(CliOverrides),
    Check(CliOverrides),
    Help,
}

pub(crate) fn parse_command(args: &[String]) -> Result<Command> {
    let (name, start) = match args.get(1).map(String::as_str) {
        None => ("serve", 1),
        Some("--help") => ("help", 2),
        Some(flag) if flag.starts_with("--") => ("serve", 1),
        Some(cmd) => (cmd, 2),
    };
    match name {
        "serve" => Ok(Command::Serve(parse_overrides(args, start)?)),
        "check" => Ok(Command::Check(parse_overrides(args, start)?)),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("Unknown command '{}'. Run 'agent-relay help'.", other),
    }
}

pub(crate) fn parse_overrides(args: &[String], start: usize) -> Result<CliOverrides> {
    let mut overrides = CliOverrides::default();
    let mut i = start;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .cloned()
                .with_context(|| format!("{} requires a value", flag))
        };
        match flag {
            "--config" | "-c" => overrides.config_path = Some(PathBuf::from(value()?)),
            "--host" => overrides.host = Some(value()?),
            "--port" | "-p" => {
                let raw = value()?;
                overrides.port = Some(
                    raw.parse()
                        .with_context(|| format!("Invalid port '{}'", raw))?,
                );
            }
            other => bail!("Unknown option '{}'", other),
        }
        i += 2;
    }
    Ok(overrides)
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match parse_command(&args)? {
        Command::Serve(overrides) => serve::run(overrides).await,
        Command::Check(overrides) => check::run(overrides).await,
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}
