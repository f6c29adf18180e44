//! Driver library behind the `joosc` binary: argument parsing, the staged
//! pipeline driver, and the textual asm-stub writer. Split from `main.rs`
//! the way `tsz-cli` keeps its own driver logic out of the binary entry
//! point, so `tests/e2e_scenarios.rs` can exercise it directly.

pub mod args;
pub mod asmgen;
pub mod driver;
