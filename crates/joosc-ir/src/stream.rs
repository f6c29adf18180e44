//! The IR artifact itself: a [`Program`] is a flat, serializable tree of
//! per-type instruction streams, built bottom-up by [`StreamBuilder`](crate::stream_builder::StreamBuilder)
//! and handed back to [`generate`](crate::ir_generator::generate) as plain
//! data. Every `Mem`/`LabelId` below is already resolved to a dense `u64`;
//! the opaque [`Mem`](crate::mem::Mem) handle only exists during
//! generation, to get deallocation ordering right.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub use crate::size::SizeClass;

pub type MemId = u64;
pub type LabelId = u64;

/// A compile-time constant materialized by a `Const` op.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Null,
    /// References a string already interned in the program's
    /// `ConstStringMap`; the backend resolves the id to whatever layout it
    /// uses for string literals.
    Str(u32),
}

/// One instruction. Grouped by what it touches rather than packed into a
/// shared `(begin, end)` argument-index scheme — the original's
/// `Op{type, begin, end}` slicing into one flat `args` vector exists to
/// keep every `Op` the same size in a C++ `vector<Op>`; a Rust enum gets
/// that for free from the compiler and reads far better at every call
/// site that matches on it (the same call `joosc-ast::Expr` already made).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Op {
    AllocMem { dst: MemId, size: SizeClass },
    DeallocMem { mem: MemId },
    /// Heap-allocates one instance of `tid` and leaves a pointer to it in
    /// `dst`. `tid` is a [`joosc_ast::ids::TypeId`]'s `base`, never an
    /// array (arrays go through `AllocArray`).
    AllocHeap { dst: MemId, tid: u64 },
    /// Heap-allocates an array of `len` elements of size `elem_size` and
    /// leaves a pointer to it in `dst`.
    AllocArray { dst: MemId, elem_size: SizeClass, len: MemId },
    Label { id: LabelId },
    Const { dst: MemId, size: SizeClass, value: Value },
    Mov { dst: MemId, src: MemId },
    /// `dst = &src` — takes the address of a `Mem` slot rather than the
    /// value inside it.
    MovAddr { dst: MemId, src: MemId },
    /// `*dst = src` — the inverse of `MovAddr`, storing through a pointer.
    MovToAddr { dst: MemId, src: MemId },
    FieldDeref { dst: MemId, base: MemId, tid: u64, field: u32 },
    FieldAddr { dst: MemId, base: MemId, tid: u64, field: u32 },
    /// Reads a `static` field's value. Static fields have no receiver to
    /// offset from — unlike `FieldDeref`, which always reads through an
    /// instance pointer — so they're addressed purely by `(tid, field)`,
    /// the way a global symbol would be. Not present in the original opcode
    /// set (whose `FIELD_DEREF`/`FIELD_ADDR` appear instance-only, with
    /// static storage handled by a lower layer this port doesn't have); see
    /// `DESIGN.md` for why this port gives statics their own pair of ops
    /// instead.
    GlobalDeref { dst: MemId, tid: u64, field: u32 },
    GlobalAddr { dst: MemId, tid: u64, field: u32 },
    ArrayDeref { dst: MemId, array: MemId, index: MemId, elem_size: SizeClass },
    ArrayAddr { dst: MemId, array: MemId, index: MemId, elem_size: SizeClass },
    Add { dst: MemId, lhs: MemId, rhs: MemId },
    Sub { dst: MemId, lhs: MemId, rhs: MemId },
    Mul { dst: MemId, lhs: MemId, rhs: MemId },
    Div { dst: MemId, lhs: MemId, rhs: MemId },
    Mod { dst: MemId, lhs: MemId, rhs: MemId },
    Lt { dst: MemId, lhs: MemId, rhs: MemId },
    Leq { dst: MemId, lhs: MemId, rhs: MemId },
    Eq { dst: MemId, lhs: MemId, rhs: MemId },
    Jmp { label: LabelId },
    JmpIf { label: LabelId, cond: MemId },
    Not { dst: MemId, src: MemId },
    Neg { dst: MemId, src: MemId },
    And { dst: MemId, lhs: MemId, rhs: MemId },
    Or { dst: MemId, lhs: MemId, rhs: MemId },
    Xor { dst: MemId, lhs: MemId, rhs: MemId },
    SignExtend { dst: MemId, src: MemId },
    ZeroExtend { dst: MemId, src: MemId },
    Truncate { dst: MemId, src: MemId, size: SizeClass },
    /// Calls a method looked up statically: a constructor, a `static`
    /// method, or a type-init/instance-init/static-init stream.
    StaticCall { dst: MemId, tid: u64, method: u32, args: Vec<MemId> },
    /// Calls an instance method through a vtable-equivalent lookup on
    /// `receiver`'s runtime type.
    DynamicCall { dst: MemId, receiver: MemId, method: u32, args: Vec<MemId> },
    /// Reads the runtime `TypeInfo` pointer out of an object's header.
    GetTypeInfo { dst: MemId, obj: MemId },
    Ret { value: Option<MemId> },
}

/// Which of a type's three synthesized streams (or which declared method)
/// a [`Stream`] lowers. A sum type in place of the original's three
/// sentinel `MethodId` constants (`kTypeInitMethodId` and friends) — those
/// exist in the C++ original because `MethodId` there is one flat,
/// globally-unique space a few values could be carved out of; this port's
/// [`joosc_ast::ids::MethodId`] carries no such reserved range, so the kind
/// is modeled directly instead of smuggled through the id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Populates the type's runtime `TypeInfo` (parent array + registration).
    TypeInit,
    /// Runs non-static field initializers against a `this` passed in.
    InstanceInit,
    /// Runs static field initializers.
    StaticInit,
    /// A user-declared method or constructor.
    Method(u32),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stream {
    pub is_entry_point: bool,
    /// `TypeId::base` of the declaring type.
    pub tid: u64,
    pub kind: StreamKind,
    /// Size class of each incoming parameter, in order (instance methods
    /// get an implicit leading `Ptr` for `this`).
    pub params: Vec<SizeClass>,
    pub ops: Vec<Op>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Type {
    pub tid: u64,
    pub streams: Vec<Stream>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompUnit {
    pub filename: String,
    pub types: Vec<Type>,
}

/// Well-known ids the generated IR calls into without the program ever
/// having written them — string concatenation, array bounds/store checks,
/// and the runtime type-info machinery `instanceof`/casts lower to. All
/// resolved once per program by [`crate::ir_generator::lookup_runtime_ids`];
/// missing any of them is an internal-compiler-error, since every conforming
/// program links against the same fixed runtime support library.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeLinkIds {
    pub object_tid: u64,
    pub string_tid: u64,
    pub string_concat: u32,
    /// `String.valueOf` overload per primitive `TypeId::base`.
    pub string_valueof: FxHashMap<u64, u32>,
    pub type_info_tid: u64,
    pub type_info_ctor: u32,
    pub type_info_instanceof: u32,
    pub type_info_num_types: u32,
    /// The synthetic static field every type carries (not declared in any
    /// source file) holding a pointer to its own runtime `TypeInfo`. A
    /// single `FieldId` value reused across every type, the same way the
    /// original reuses one `kStaticTypeInfoId` sentinel everywhere — see
    /// `DESIGN.md` for how this port derives it without a reserved id range.
    pub type_info_static_field: u32,
    /// Reserved `StaticCall` method selectors for a type's own synthesized
    /// type-init/instance-init/static-init streams, analogous to the
    /// original's `kTypeInitMethodId`/`kInstanceInitMethodId`/
    /// `kStaticInitMethodId` constants. Those are fixed values reserved out
    /// of one global `MethodId` space; this port's `MethodId` carries no
    /// such reservation, so these three are computed once per program as
    /// `max(every real MethodId) + 1/+2/+3` instead — still one constant
    /// value shared by every type, just derived rather than hardcoded.
    pub type_init_method: u32,
    pub instance_init_method: u32,
    pub static_init_method: u32,
    pub stringops_tid: u64,
    pub stringops_str: u32,
    pub stackframe_tid: u64,
    pub stackframe_print: u32,
    pub stackframe_print_ex: u32,
    pub array_tid: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub units: Vec<CompUnit>,
    pub rt_ids: RuntimeLinkIds,
}
