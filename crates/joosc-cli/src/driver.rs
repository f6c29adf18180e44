//! Wires every pipeline crate together in the fixed order from `SPEC_FULL.md`
//! §2: `Lex → Parse → Weed → TypeSet build → DeclResolver → TypeInfoMap build
//! → TypeChecker → ConstantFolder → Dataflow → IR generator → Asm writer`.
//! Each stage is fail-fast: the first stage that appends a diagnostic stops
//! the run before the next one starts.
//!
//! Runtime-support source (`joosc_ir::runtime::support_sources`) is fed
//! through the whole pipeline exactly once, ahead of the caller's own
//! files, the same way `java.lang.Object`/`__joos_internal__.TypeInfo` have
//! to exist in the `TypeInfoMap` before any user method can link against
//! them.

use std::rc::Rc;

use anyhow::{Context, Result};

use joosc_ast::ids::TypeId;
use joosc_ast::{CompUnit, Program, QualifiedName};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::files::FileSet;
use joosc_common::span::{FileId, FileSpan, Span};
use joosc_ir::IrProgram;
use joosc_resolve::DeclResolution;
use joosc_types::{TypeInfoMap, TypeInfoMapBuilder, TypeSetBuilder};

use crate::args::Stage;

/// What a (possibly early-stopped) compile run produced: every diagnostic
/// raised so far, the file table they're reported against, and the IR if
/// generation ran.
pub struct CompileOutcome {
    pub files: FileSet,
    pub diagnostics: Vec<Diagnostic>,
    pub ir: Option<IrProgram>,
    /// The interned constant-string pool `Value::Str` ids index into.
    /// `Some` once the type-check stage ran clean, regardless of whether
    /// generation itself ran.
    pub strings: Option<joosc_check::ConstStringMap>,
}

impl CompileOutcome {
    fn halt(files: FileSet, diagnostics: Vec<Diagnostic>) -> Self {
        CompileOutcome { files, diagnostics, ir: None, strings: None }
    }
}

/// Loads runtime support sources plus every path in `user_paths`, in that
/// order, rejecting non-ASCII bytes as an `InvalidCharacterError`
/// diagnostic rather than an I/O error (`SPEC_FULL.md` §6: "reported the
/// same way `original_source/base/file.cpp` treats them"). A path that
/// can't be read at all is a usage error and propagates via `anyhow`.
fn load_files(user_paths: &[std::path::PathBuf]) -> Result<(FileSet, Vec<Diagnostic>)> {
    let mut files = FileSet::new();
    let mut errors = Vec::new();

    for (name, text) in joosc_ir::runtime::support_sources() {
        files
            .add(name, text.to_string())
            .expect("ICE: runtime support source must be ASCII");
    }

    for path in user_paths {
        let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        // `FileSet::add` drops a rejected file's text on the `NonAscii` arm
        // rather than registering it, which would leave this diagnostic
        // with no `FileId` to point at. Checking here first lets a rejected
        // file still register its valid-ASCII prefix, so the diagnostic has
        // somewhere real to render against.
        if let Some(offset) = text.bytes().position(|b| b > 127) {
            let byte = text.as_bytes()[offset];
            let offset = offset as u32;
            let file = files
                .add(path, text[..offset as usize].to_string())
                .expect("ICE: ASCII prefix can't itself be rejected as non-ASCII");
            errors.push(Diagnostic::new(
                DiagnosticKind::InvalidCharacterError,
                FileSpan::new(file, Span::new(offset, offset + 1)),
                format!("{}: byte 0x{byte:02x} is outside the ASCII range", path.display()),
            ));
            continue;
        }
        files.add(path, text).expect("ICE: already validated as ASCII");
    }

    Ok((files, errors))
}

fn package_parts(unit: &CompUnit) -> Vec<Rc<str>> {
    unit.package.as_ref().map(|qn| qn.parts.clone()).unwrap_or_default()
}

/// Runs the full pipeline over `user_paths`, stopping at the first stage
/// that raises a diagnostic, or at `until` — whichever comes first.
pub fn compile(user_paths: &[std::path::PathBuf], until: Stage) -> Result<CompileOutcome> {
    let (files, mut errors) = tracing::info_span!("open_files").in_scope(|| load_files(user_paths))?;
    if !errors.is_empty() || until == Stage::OpenFiles {
        return Ok(CompileOutcome::halt(files, errors));
    }

    tracing::info_span!("lex").in_scope(|| {
        for file in files.ids() {
            let (_tokens, lex_errors) = joosc_lexer::lex(file, &files.get(file).text);
            errors.extend(lex_errors);
        }
    });
    if !errors.is_empty() || until == Stage::Lex {
        return Ok(CompileOutcome::halt(files, errors));
    }

    let comp_units = tracing::info_span!("parse").in_scope(|| {
        let mut units = Vec::with_capacity(files.len());
        for file in files.ids() {
            let (comp_unit, parse_errors) = joosc_ast::parse_file(file, &files.get(file).text);
            errors.extend(parse_errors);
            if let Some(comp_unit) = comp_unit {
                units.push(comp_unit);
            }
        }
        units
    });
    if !errors.is_empty() || until == Stage::Parse {
        return Ok(CompileOutcome::halt(files, errors));
    }

    let program = Program { comp_units };
    let (program, weed_errors) = tracing::info_span!("weed").in_scope(|| joosc_weed::weed_program(&files, program));
    errors.extend(weed_errors);
    if !errors.is_empty() || until == Stage::Weed {
        return Ok(CompileOutcome::halt(files, errors));
    }

    let (resolution, typeinfo, checked, mut strings) = match tracing::info_span!("type_check").in_scope(|| type_check(&program, &mut errors)) {
        Some(result) => result,
        None => return Ok(CompileOutcome::halt(files, errors)),
    };
    if until == Stage::TypeCheck {
        return Ok(CompileOutcome { files, diagnostics: errors, ir: None, strings: Some(strings) });
    }

    let ir = tracing::info_span!("ir_gen").in_scope(|| joosc_ir::generate(&resolution, &checked, &typeinfo, &mut strings));
    Ok(CompileOutcome { files, diagnostics: errors, ir: Some(ir), strings: Some(strings) })
}

/// TypeSet build, DeclResolver, TypeInfoMap build, then TypeChecker /
/// ConstantFolder / Dataflow as one bundled call — `joosc_check::check_program`
/// itself runs those three with no fail-fast boundary between them, so the
/// driver treats the whole cluster as one `--until type-check` checkpoint.
/// Returns `None` once `errors` is non-empty, same fail-fast contract as
/// every other stage.
fn type_check(
    program: &Program,
    errors: &mut Vec<Diagnostic>,
) -> Option<(DeclResolution, TypeInfoMap, Program, joosc_check::ConstStringMap)> {
    let mut set_builder = TypeSetBuilder::new();
    let mut total_types = 0u64;
    for unit in &program.comp_units {
        for type_decl in &unit.types {
            set_builder.put(&package_parts(unit), type_decl.name.clone(), FileSpan::new(unit.file, type_decl.name_span));
            total_types += 1;
        }
    }
    let base = set_builder.build(errors);
    if !errors.is_empty() {
        return None;
    }

    let object_tid = base.get(&QualifiedName::new(vec![Rc::from("java"), Rc::from("lang"), Rc::from("Object")], Span::at(0)), FileId(0), errors);
    if !errors.is_empty() {
        return None;
    }
    // Joos 1's runtime support library never declares real `Serializable`/
    // `Cloneable` types (see `joosc_ir::runtime`), so these — like the
    // array pseudo-type — are reserved ids one past every user type rather
    // than resolved names.
    let serializable_tid = TypeId::new(TypeId::FIRST_USER_BASE + total_types, 0);
    let cloneable_tid = TypeId::new(TypeId::FIRST_USER_BASE + total_types + 1, 0);
    let array_tid = TypeId::new(TypeId::FIRST_USER_BASE + total_types + 2, 0);

    let builder = TypeInfoMapBuilder::new(object_tid, serializable_tid, cloneable_tid, array_tid);
    let mut resolution = joosc_resolve::resolve_program(program, &base, builder, errors);
    if !errors.is_empty() {
        return None;
    }

    let fresh_builder = TypeInfoMapBuilder::new(object_tid, serializable_tid, cloneable_tid, array_tid);
    let real_builder = std::mem::replace(&mut resolution.builder, fresh_builder);
    let typeinfo = real_builder.build(errors);
    if !errors.is_empty() {
        return None;
    }

    let (checked, strings) = joosc_check::check_program(&resolution, &typeinfo, errors);
    if !errors.is_empty() {
        return None;
    }

    Some((resolution, typeinfo, checked, strings))
}

/// Renders every diagnostic in *User* mode to stderr.
pub fn report(files: &FileSet, diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        eprint!("{}", diag.render_user(files));
    }
}
