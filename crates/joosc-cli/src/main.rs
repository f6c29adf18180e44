//! `joosc [--until STAGE] [--emit-ir] FILE...` — see `SPEC_FULL.md` §6.
//!
//! Semantic diagnostics never travel through `anyhow`: they accumulate in
//! the session's `Vec<Diagnostic>` and are rendered directly. `anyhow` is
//! reserved for I/O and usage failures (`SPEC_FULL.md` §7).

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use joosc_cli::args::{CliArgs, Stage};
use joosc_cli::{asmgen, driver};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("joosc=info")))
        .init();

    let args = CliArgs::parse();
    match run(&args) {
        Ok(true) => ExitCode::from(0),
        Ok(false) => ExitCode::from(42),
        Err(err) => {
            eprintln!("joosc: {err:#}");
            ExitCode::from(1)
        }
    }
}

/// Returns `Ok(true)` on a clean (or cleanly early-stopped) compile,
/// `Ok(false)` once any diagnostic was raised. I/O and usage failures
/// propagate as `Err`.
fn run(args: &CliArgs) -> Result<bool> {
    let outcome = driver::compile(&args.files, args.until)?;

    if !outcome.diagnostics.is_empty() {
        driver::report(&outcome.files, &outcome.diagnostics);
        return Ok(false);
    }

    if let Some(ir) = &outcome.ir {
        if args.until == Stage::All {
            let out_dir = std::env::current_dir()?;
            asmgen::write_program(ir, &out_dir)?;
        }
        if args.emit_ir {
            for unit in &ir.units {
                let path = std::path::Path::new(&format!("{}.ir.json", unit.filename)).to_path_buf();
                let json = serde_json::to_string_pretty(unit)?;
                std::fs::write(&path, json)?;
            }
        }
    }

    Ok(true)
}
