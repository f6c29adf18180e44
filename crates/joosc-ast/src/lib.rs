//! AST node model, rewriting visitor framework, and recursive-descent parser.

pub mod ast;
pub mod ids;
pub mod parser;
pub mod visitor;

pub use ast::{
    BinOp, CompUnit, Expr, FieldDecl, ImportDecl, MemberDecl, MethodDecl, Modifier, ModifierList,
    ModifierSet, Param, PrimitiveKind, Program, QualifiedName, Stmt, Type, TypeDecl, TypeKind,
    UnaryOp,
};
pub use ids::{FieldId, LocalVarId, MethodId, TypeId};
pub use parser::{parse_file, Parser};
pub use visitor::{Visitor, VisitResult};
