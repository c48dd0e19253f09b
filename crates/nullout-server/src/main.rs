mod logger;
mod rpc;

use crate::rpc::NullOutService;
use clap::Parser;
use eyre::{Result, WrapErr};
use nullout_core::config;
use std::io::{self, BufRead, Write};

/// NullOut remediation service: a stdio JSON-RPC tool server that finds and
/// safely deletes Win32-hostile filesystem entries.
#[derive(Debug, Parser)]
#[command(name = "nullout-server", version)]
struct ServerArgs {
    /// Log filter for stderr diagnostics (stdout carries RPC traffic).
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = ServerArgs::parse();
    logger::init(args.log_level)?;

    let roots = config::load_roots().wrap_err("loading allowlisted roots")?;
    let secret = config::token_secret().wrap_err("loading token secret")?;
    log::info!(
        "nullout-server v{} serving {} allowlisted root(s)",
        env!("CARGO_PKG_VERSION"),
        roots.len()
    );

    let mut service = NullOutService::new(roots, secret);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line.wrap_err("reading request line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = service.handle_line(line);
        writeln!(out, "{response}").wrap_err("writing response")?;
        out.flush().wrap_err("flushing response")?;
    }

    Ok(())
}
