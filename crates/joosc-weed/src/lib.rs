//! Syntactic post-condition checks that the grammar itself can't enforce:
//! modifier legality per declaration kind, single-public-type-per-file
//! structure, integer literal range, `void` misuse, assignment legality,
//! and top-level statement placement.
//!
//! Each check is its own pass over the already-parsed [`joosc_ast::Program`],
//! run in sequence by [`weed_program`]. A pass either rewrites the tree (int
//! range folding negated literals into range-checked `IntLit`s) or leaves it
//! unchanged and only appends diagnostics.

pub mod assignment;
pub mod call;
pub mod int_range;
pub mod modifier;
pub mod structure;
pub mod type_checks;

use joosc_ast::Program;
use joosc_common::files::FileSet;
use joosc_common::diagnostics::Diagnostic;

/// Runs every weeder pass over `program` in the same order the original
/// pipeline does, returning the (possibly rewritten, by the int-range pass)
/// program and every diagnostic collected along the way.
pub fn weed_program(files: &FileSet, program: Program) -> (Program, Vec<Diagnostic>) {
    let mut errors = Vec::new();

    let program = assignment::check(program, &mut errors);
    let program = call::check(program, &mut errors);
    let program = type_checks::check(program, &mut errors);
    let program = modifier::check(program, &mut errors);
    let program = int_range::check(program, &mut errors);
    structure::check(files, &program, &mut errors);

    (program, errors)
}
