//! Lowers a checked, folded program into a flat, serializable register-
//! machine IR: one [`stream::Stream`] of ops per method/constructor/
//! initializer, grouped into [`stream::Type`]s and [`stream::CompUnit`]s.
//!
//! Mirrors the original's `ir/` directory (`stream.h`, `stream_builder.h`,
//! `ir_generator.h`, `peephole.h`) one module per file, plus
//! [`runtime`] in place of its `runtime/runtime.{h,cpp}`.

pub mod ir_generator;
pub mod mem;
pub mod peephole;
pub mod runtime;
pub mod size;
pub mod stream;
pub mod stream_builder;

use joosc_ast::Program;
use joosc_check::ConstStringMap;
use joosc_resolve::DeclResolution;
use joosc_types::TypeInfoMap;

pub use mem::Mem;
pub use size::SizeClass;
pub use stream::{CompUnit, Op, Program as IrProgram, RuntimeLinkIds, Stream, StreamKind, Type, Value};
pub use stream_builder::StreamBuilder;

/// Generates IR for every stream in the program, then runs the peephole
/// pass over each one. `checked`/`strings` are the outputs of
/// [`joosc_check::check_program`]; `decl`/`typeinfo` are the same
/// resolution and registry that produced them.
pub fn generate(decl: &DeclResolution, checked: &Program, typeinfo: &TypeInfoMap, strings: &mut ConstStringMap) -> IrProgram {
    let mut program = ir_generator::generate(decl, checked, typeinfo, strings);
    for unit in &mut program.units {
        for ty in &mut unit.types {
            for stream in &mut ty.streams {
                peephole::optimize(stream);
            }
        }
    }
    program
}
