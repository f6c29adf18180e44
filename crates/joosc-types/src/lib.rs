//! Canonical type-name resolution ([`typeset`]) and per-type inherited
//! member tables ([`type_info_map`]) — the two registries every later pass
//! (the binder, the checker, the IR generator) resolves names and overrides
//! against.

pub mod type_info_map;
pub mod typeset;

pub use type_info_map::{
    CallContext, FieldInfo, FieldTable, MethodInfo, MethodSignature, MethodTable, TypeInfo,
    TypeInfoMap, TypeInfoMapBuilder,
};
pub use typeset::{TypeSet, TypeSetBuilder};
