//! Command-line surface: `joosc [--until STAGE] [--emit-ir] FILE...`.
//!
//! Kept deliberately small next to a tsc-style CLI — Joos 1's semantics
//! aren't flag-configurable, so the only knobs are where the pipeline halts
//! and whether the IR gets dumped alongside the asm stub.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Coarse pipeline checkpoints a run can be stopped at. Coarser than the
/// eleven fail-fast stages in `SPEC_FULL.md` §2: `type-check` covers
/// TypeSet build through Dataflow as one unit, matching how
/// `joosc_check::check_program` itself bundles TypeChecker, ConstantFolder,
/// and Dataflow into a single call with no fail-fast boundary between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Stage {
    OpenFiles,
    Lex,
    Parse,
    Weed,
    TypeCheck,
    GenIr,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "joosc", about = "Joos 1 static compiler")]
pub struct CliArgs {
    /// Source files to compile.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Stop the pipeline after the named stage instead of running it through
    /// to the asm writer.
    #[arg(long, value_enum, default_value_t = Stage::All)]
    pub until: Stage,

    /// Dump each compilation unit's IR as JSON alongside the asm stub.
    #[arg(long)]
    pub emit_ir: bool,
}
