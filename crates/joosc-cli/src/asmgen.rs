//! Textual stand-in for the out-of-scope i386 backend. Renders each
//! [`joosc_ir`] compilation unit as a readable pseudo-assembly listing —
//! one block per stream, one line per op — so the IR can be inspected and
//! golden-tested without an actual code generator.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use joosc_ir::{CompUnit, IrProgram, Op, SizeClass, Stream, StreamKind, Value};

fn size_mnemonic(size: SizeClass) -> &'static str {
    match size {
        SizeClass::Bool => "bool",
        SizeClass::Byte => "byte",
        SizeClass::Short => "short",
        SizeClass::Char => "char",
        SizeClass::Int => "int",
        SizeClass::Ptr => "ptr",
    }
}

fn value_literal(value: Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Null => "null".to_string(),
        Value::Str(id) => format!("str#{id}"),
    }
}

fn render_op(out: &mut String, op: &Op) {
    match op {
        Op::AllocMem { dst, size } => writeln!(out, "    alloc    r{dst}, {}", size_mnemonic(*size)),
        Op::DeallocMem { mem } => writeln!(out, "    dealloc  r{mem}"),
        Op::AllocHeap { dst, tid } => writeln!(out, "    new      r{dst}, type#{tid}"),
        Op::AllocArray { dst, elem_size, len } => writeln!(out, "    newarr   r{dst}, {}[r{len}]", size_mnemonic(*elem_size)),
        Op::Label { id } => writeln!(out, "  L{id}:"),
        Op::Const { dst, size, value } => writeln!(out, "    const    r{dst}, {}, {}", size_mnemonic(*size), value_literal(*value)),
        Op::Mov { dst, src } => writeln!(out, "    mov      r{dst}, r{src}"),
        Op::MovAddr { dst, src } => writeln!(out, "    lea      r{dst}, r{src}"),
        Op::MovToAddr { dst, src } => writeln!(out, "    store    [r{dst}], r{src}"),
        Op::FieldDeref { dst, base, tid, field } => writeln!(out, "    ldfield  r{dst}, r{base}.type#{tid}.f{field}"),
        Op::FieldAddr { dst, base, tid, field } => writeln!(out, "    fieldaddr r{dst}, r{base}.type#{tid}.f{field}"),
        Op::GlobalDeref { dst, tid, field } => writeln!(out, "    ldstatic r{dst}, type#{tid}.f{field}"),
        Op::GlobalAddr { dst, tid, field } => writeln!(out, "    staticaddr r{dst}, type#{tid}.f{field}"),
        Op::ArrayDeref { dst, array, index, elem_size } => writeln!(out, "    ldelem   r{dst}, r{array}[r{index}], {}", size_mnemonic(*elem_size)),
        Op::ArrayAddr { dst, array, index, elem_size } => writeln!(out, "    elemaddr r{dst}, r{array}[r{index}], {}", size_mnemonic(*elem_size)),
        Op::Add { dst, lhs, rhs } => writeln!(out, "    add      r{dst}, r{lhs}, r{rhs}"),
        Op::Sub { dst, lhs, rhs } => writeln!(out, "    sub      r{dst}, r{lhs}, r{rhs}"),
        Op::Mul { dst, lhs, rhs } => writeln!(out, "    mul      r{dst}, r{lhs}, r{rhs}"),
        Op::Div { dst, lhs, rhs } => writeln!(out, "    div      r{dst}, r{lhs}, r{rhs}"),
        Op::Mod { dst, lhs, rhs } => writeln!(out, "    mod      r{dst}, r{lhs}, r{rhs}"),
        Op::Lt { dst, lhs, rhs } => writeln!(out, "    lt       r{dst}, r{lhs}, r{rhs}"),
        Op::Leq { dst, lhs, rhs } => writeln!(out, "    leq      r{dst}, r{lhs}, r{rhs}"),
        Op::Eq { dst, lhs, rhs } => writeln!(out, "    eq       r{dst}, r{lhs}, r{rhs}"),
        Op::Jmp { label } => writeln!(out, "    jmp      L{label}"),
        Op::JmpIf { label, cond } => writeln!(out, "    jmpif    L{label}, r{cond}"),
        Op::Not { dst, src } => writeln!(out, "    not      r{dst}, r{src}"),
        Op::Neg { dst, src } => writeln!(out, "    neg      r{dst}, r{src}"),
        Op::And { dst, lhs, rhs } => writeln!(out, "    and      r{dst}, r{lhs}, r{rhs}"),
        Op::Or { dst, lhs, rhs } => writeln!(out, "    or       r{dst}, r{lhs}, r{rhs}"),
        Op::Xor { dst, lhs, rhs } => writeln!(out, "    xor      r{dst}, r{lhs}, r{rhs}"),
        Op::SignExtend { dst, src } => writeln!(out, "    sext     r{dst}, r{src}"),
        Op::ZeroExtend { dst, src } => writeln!(out, "    zext     r{dst}, r{src}"),
        Op::Truncate { dst, src, size } => writeln!(out, "    trunc    r{dst}, r{src}, {}", size_mnemonic(*size)),
        Op::StaticCall { dst, tid, method, args } => {
            let args = args.iter().map(|a| format!("r{a}")).collect::<Vec<_>>().join(", ");
            writeln!(out, "    callstatic r{dst}, type#{tid}.m{method}({args})")
        }
        Op::DynamicCall { dst, receiver, method, args } => {
            let args = args.iter().map(|a| format!("r{a}")).collect::<Vec<_>>().join(", ");
            writeln!(out, "    call     r{dst}, r{receiver}.m{method}({args})")
        }
        Op::GetTypeInfo { dst, obj } => writeln!(out, "    typeinfo r{dst}, r{obj}"),
        Op::Ret { value: Some(v) } => writeln!(out, "    ret      r{v}"),
        Op::Ret { value: None } => writeln!(out, "    ret"),
    }
    .expect("writing to a String never fails");
}

fn stream_label(tid: u64, kind: StreamKind) -> String {
    match kind {
        StreamKind::TypeInit => format!("type#{tid}::<type-init>"),
        StreamKind::InstanceInit => format!("type#{tid}::<instance-init>"),
        StreamKind::StaticInit => format!("type#{tid}::<static-init>"),
        StreamKind::Method(id) => format!("type#{tid}::m{id}"),
    }
}

fn render_stream(out: &mut String, stream: &Stream) {
    let params = stream.params.iter().map(|s| size_mnemonic(*s)).collect::<Vec<_>>().join(", ");
    writeln!(
        out,
        "{}{}({}):",
        if stream.is_entry_point { "entry " } else { "" },
        stream_label(stream.tid, stream.kind),
        params
    )
    .unwrap();
    for op in &stream.ops {
        render_op(out, op);
    }
    out.push('\n');
}

/// Renders one compilation unit's every type's every stream as one text
/// listing, preceded by a comment banner naming the source unit.
pub fn render_comp_unit(cu: &CompUnit) -> String {
    let mut out = String::new();
    writeln!(out, "; {}", cu.filename).unwrap();
    for ty in &cu.types {
        writeln!(out, "; type#{}", ty.tid).unwrap();
        for stream in &ty.streams {
            render_stream(&mut out, stream);
        }
    }
    out
}

/// Writes one `<unit>.s` file per compilation unit into `out_dir`, creating
/// it if needed. Returns the paths written.
pub fn write_program(program: &IrProgram, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;
    let mut written = Vec::with_capacity(program.units.len());
    for unit in &program.units {
        let path = out_dir.join(format!("{}.s", unit.filename));
        std::fs::write(&path, render_comp_unit(unit)).with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
