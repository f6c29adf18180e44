//! Declaration resolution: the single pass between parsing/weeding and type
//! checking that turns syntactic `extends`/`implements`/field/method
//! declarations into registry entries, and gives every [`TypeDecl`](joosc_ast::TypeDecl)
//! its [`TypeId`](joosc_ast::ids::TypeId).

pub mod decl_resolver;

pub use decl_resolver::{resolve_program, resolve_type, DeclResolution};
