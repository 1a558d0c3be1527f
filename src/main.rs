// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use wasi_nn_host::config::{load_config, HostConfig};
use wasi_nn_host::errors::HostError;
use wasi_nn_host::runner;

const USAGE: &str = "Usage: wasi-nn-host [--config <host.yaml>] <module.wasm> [guest args...]";

struct CliArgs {
    config: Option<PathBuf>,
    module: PathBuf,
    guest_args: Vec<String>,
}

/// Everything after the module path belongs to the guest.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut config = None;
    loop {
        match args.next() {
            Some(flag) if flag == "--config" => {
                let path = args.next().ok_or("--config needs a file argument")?;
                config = Some(PathBuf::from(path));
            }
            Some(flag) if flag == "--help" || flag == "-h" => return Err(USAGE.to_string()),
            Some(module) => {
                return Ok(CliArgs {
                    config,
                    module: PathBuf::from(module),
                    guest_args: args.collect(),
                })
            }
            None => return Err(USAGE.to_string()),
        }
    }
}

fn init_tracing(config: &HostConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.get_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = match parse_args(env::args().skip(1)) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(2);
            }
        },
        None => HostConfig::default(),
    };
    init_tracing(&config);

    let CliArgs {
        module, guest_args, ..
    } = cli;
    // Guest execution and inference block; keep them off the async workers.
    let outcome =
        tokio::task::spawn_blocking(move || runner::run_guest(&module, &guest_args, &config)).await;

    match outcome {
        Ok(Ok(_)) => {}
        Ok(Err(HostError::GuestExit(status))) => std::process::exit(status),
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(join_error) => {
            eprintln!("Guest task panicked: {}", join_error);
            std::process::exit(1);
        }
    }
}
