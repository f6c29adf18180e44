//! Type checking, constant folding, and dataflow analysis: the three
//! passes that run over a [`DeclResolution`](joosc_resolve::DeclResolution)
//! before IR generation. Each pass rewrites the tree it's given (filling in
//! `ty` slots, wrapping folded constants, nothing else) and appends to a
//! shared diagnostics list; passes run in the fixed order
//! [`check_program`] wires them in, since later passes depend on the
//! rewrites earlier ones make (dataflow's loop-condition reachability
//! needs constants already folded).

pub mod constant_folder;
pub mod dataflow;
pub mod symbol_table;
pub mod typechecker;

use joosc_ast::Program;
use joosc_common::diagnostics::Diagnostic;
use joosc_resolve::DeclResolution;
use joosc_types::TypeInfoMap;

pub use constant_folder::ConstStringMap;
pub use typechecker::{is_assignable, is_numeric, is_primitive, is_primitive_widening, is_reference, resolve_method, resolve_type};

/// Runs type checking, then constant folding, then dataflow analysis over
/// a resolved program, returning the fully rewritten tree and the interned
/// constant strings gathered while folding.
pub fn check_program(resolution: &DeclResolution, typeinfo: &TypeInfoMap, errors: &mut Vec<Diagnostic>) -> (Program, ConstStringMap) {
    let checked = typechecker::check_program(resolution, typeinfo, errors);
    let mut strings = ConstStringMap::new();
    let folded = constant_folder::fold_program(&checked, joosc_ast::ids::TypeId::STRING, &mut strings);
    dataflow::check_program(&folded, typeinfo, errors);
    (folded, strings)
}
