//! The AST node model.
//!
//! Nodes are plain Rust enums wrapped in [`Rc`] rather than a C++-style
//! class hierarchy with virtual dispatch: pattern matching on the enum
//! variant *is* the dispatch, and cloning an `Rc` is how a rewrite shares a
//! subtree it didn't change. Every expression carries a `ty: TypeId` slot
//! that starts at [`TypeId::UNASSIGNED`] and is filled in by the type
//! checker, which produces a new node (same shape, `ty` set) rather than
//! mutating the old one in place.

use std::rc::Rc;

use bitflags::bitflags;
use joosc_common::span::{FileId, Span};
use smallvec::SmallVec;

use crate::ids::TypeId;

/// A dotted name as written in source, e.g. `java.util.List`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualifiedName {
    pub parts: Vec<Rc<str>>,
    pub span: Span,
}

impl QualifiedName {
    pub fn new(parts: Vec<Rc<str>>, span: Span) -> Self {
        QualifiedName { parts, span }
    }

    pub fn single(name: Rc<str>, span: Span) -> Self {
        QualifiedName { parts: vec![name], span }
    }

    pub fn joined(&self) -> String {
        self.parts.join(".")
    }

    /// The last segment, e.g. `List` in `java.util.List`. Every
    /// `QualifiedName` has at least one part.
    pub fn last(&self) -> &str {
        &self.parts[self.parts.len() - 1]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
}

impl PrimitiveKind {
    pub fn type_id(self) -> TypeId {
        match self {
            PrimitiveKind::Boolean => TypeId::BOOL,
            PrimitiveKind::Byte => TypeId::BYTE,
            PrimitiveKind::Short => TypeId::SHORT,
            PrimitiveKind::Char => TypeId::CHAR,
            PrimitiveKind::Int => TypeId::INT,
        }
    }
}

/// A type as written in source. Distinct from [`TypeId`]: this is syntax,
/// `TypeId` is the resolved semantic identity a `Type` is bound to.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Primitive { kind: PrimitiveKind, span: Span },
    Void { span: Span },
    Reference { name: QualifiedName },
    Array { elem: Rc<Type>, span: Span },
}

impl Type {
    pub fn span(&self) -> Span {
        match self {
            Type::Primitive { span, .. } => *span,
            Type::Void { span } => *span,
            Type::Reference { name } => name.span,
            Type::Array { span, .. } => *span,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `=`. Assignment is modeled as an ordinary binary operator, same as
    /// the original grammar does it; the weeder is what restricts its LHS
    /// to a `Name`, `FieldDeref`, or `ArrayIndex`.
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    BitAnd,
    BitOr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expression nodes. Every variant ends in a `ty: TypeId` field, defaulted
/// to [`TypeId::UNASSIGNED`] by the parser and rewritten by the checker.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Name { name: QualifiedName, ty: TypeId },
    This { span: Span, ty: TypeId },
    BoolLit { value: bool, span: Span, ty: TypeId },
    IntLit { text: Rc<str>, span: Span, ty: TypeId },
    CharLit { text: Rc<str>, span: Span, ty: TypeId },
    StringLit { text: Rc<str>, span: Span, ty: TypeId },
    NullLit { span: Span, ty: TypeId },
    Paren { inner: Rc<Expr>, span: Span },
    Bin { op: BinOp, op_span: Span, lhs: Rc<Expr>, rhs: Rc<Expr>, ty: TypeId },
    Unary { op: UnaryOp, op_span: Span, operand: Rc<Expr>, ty: TypeId },
    InstanceOf { lhs: Rc<Expr>, check_ty: Rc<Type>, span: Span, ty: TypeId },
    ArrayIndex { base: Rc<Expr>, index: Rc<Expr>, span: Span, ty: TypeId },
    FieldDeref { base: Rc<Expr>, field_name: Rc<str>, field_span: Span, ty: TypeId },
    Call { callee: Rc<Expr>, args: Vec<Rc<Expr>>, span: Span, ty: TypeId },
    Cast { target: Rc<Type>, operand: Rc<Expr>, span: Span, ty: TypeId },
    NewClass { class_ty: Rc<Type>, args: Vec<Rc<Expr>>, span: Span, ty: TypeId },
    NewArray { elem_ty: Rc<Type>, size: Option<Rc<Expr>>, span: Span, ty: TypeId },
    /// A name that resolved to a type itself rather than a value, e.g. the
    /// `Foo` in `Foo.staticField`. Produced by the resolver's rewrite pass,
    /// never by the parser.
    StaticRef { resolved: TypeId, span: Span },
    /// A folded compile-time constant, wrapping the original expression it
    /// was folded from. Folding is idempotent: folding a `Const` again
    /// yields the same `Const` unchanged, since `inner` is never itself a
    /// `Const`. Never produced by the parser.
    Const { inner: Rc<Expr>, ty: TypeId },
}

impl Expr {
    pub fn ty(&self) -> TypeId {
        match self {
            Expr::Name { ty, .. }
            | Expr::This { ty, .. }
            | Expr::BoolLit { ty, .. }
            | Expr::IntLit { ty, .. }
            | Expr::CharLit { ty, .. }
            | Expr::StringLit { ty, .. }
            | Expr::NullLit { ty, .. }
            | Expr::Bin { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::InstanceOf { ty, .. }
            | Expr::ArrayIndex { ty, .. }
            | Expr::FieldDeref { ty, .. }
            | Expr::Call { ty, .. }
            | Expr::Cast { ty, .. }
            | Expr::NewClass { ty, .. }
            | Expr::NewArray { ty, .. }
            | Expr::Const { ty, .. } => *ty,
            Expr::Paren { inner, .. } => inner.ty(),
            Expr::StaticRef { resolved, .. } => *resolved,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Name { name, .. } => name.span,
            Expr::This { span, .. }
            | Expr::BoolLit { span, .. }
            | Expr::IntLit { span, .. }
            | Expr::CharLit { span, .. }
            | Expr::StringLit { span, .. }
            | Expr::NullLit { span, .. }
            | Expr::Paren { span, .. }
            | Expr::InstanceOf { span, .. }
            | Expr::ArrayIndex { span, .. }
            | Expr::Call { span, .. }
            | Expr::Cast { span, .. }
            | Expr::NewClass { span, .. }
            | Expr::NewArray { span, .. }
            | Expr::StaticRef { span, .. } => *span,
            Expr::Bin { lhs, rhs, .. } => lhs.span().merge(rhs.span()),
            Expr::Unary { op_span, operand, .. } => op_span.merge(operand.span()),
            Expr::FieldDeref { base, field_span, .. } => base.span().merge(*field_span),
            Expr::Const { inner, .. } => inner.span(),
        }
    }
}

/// Statement nodes.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Empty { span: Span },
    LocalDecl { ty: Rc<Type>, name: Rc<str>, name_span: Span, init: Rc<Expr> },
    Return { span: Span, value: Option<Rc<Expr>> },
    Expr { expr: Rc<Expr> },
    Block { stmts: Vec<Rc<Stmt>>, span: Span },
    If { cond: Rc<Expr>, then_branch: Rc<Stmt>, else_branch: Option<Rc<Stmt>>, span: Span },
    For {
        init: Option<Rc<Stmt>>,
        cond: Option<Rc<Expr>>,
        update: Option<Rc<Expr>>,
        body: Rc<Stmt>,
        span: Span,
    },
    While { cond: Rc<Expr>, body: Rc<Stmt>, span: Span },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Abstract,
    Final,
    Static,
    Native,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ModifierSet: u16 {
        const PUBLIC    = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE   = 1 << 2;
        const ABSTRACT  = 1 << 3;
        const FINAL     = 1 << 4;
        const STATIC    = 1 << 5;
        const NATIVE    = 1 << 6;
    }
}

impl Modifier {
    fn bit(self) -> ModifierSet {
        match self {
            Modifier::Public => ModifierSet::PUBLIC,
            Modifier::Protected => ModifierSet::PROTECTED,
            Modifier::Private => ModifierSet::PRIVATE,
            Modifier::Abstract => ModifierSet::ABSTRACT,
            Modifier::Final => ModifierSet::FINAL,
            Modifier::Static => ModifierSet::STATIC,
            Modifier::Native => ModifierSet::NATIVE,
        }
    }
}

/// The modifiers attached to a declaration, with the span of each one kept
/// around so the weeder and checker can point diagnostics at the exact
/// offending keyword rather than the whole declaration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModifierList {
    set: ModifierSet,
    tokens: SmallVec<[(Modifier, Span); 4]>,
}

impl ModifierList {
    pub fn new() -> Self {
        ModifierList::default()
    }

    /// Records `m` at `span`. Returns `false` if `m` was already present
    /// (a duplicate modifier), leaving the list unchanged.
    pub fn add(&mut self, m: Modifier, span: Span) -> bool {
        if self.has(m) {
            return false;
        }
        self.set |= m.bit();
        self.tokens.push((m, span));
        true
    }

    pub fn has(&self, m: Modifier) -> bool {
        self.set.contains(m.bit())
    }

    pub fn span_of(&self, m: Modifier) -> Option<Span> {
        self.tokens.iter().find(|(tm, _)| *tm == m).map(|(_, s)| *s)
    }

    pub fn set(&self) -> ModifierSet {
        self.set
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub ty: Rc<Type>,
    pub name: Rc<str>,
    pub name_span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub mods: ModifierList,
    pub ty: Rc<Type>,
    pub name: Rc<str>,
    pub name_span: Span,
    pub init: Option<Rc<Expr>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDecl {
    pub mods: ModifierList,
    /// `None` marks a constructor (constructors share this struct with
    /// ordinary methods, distinguished by the absence of a return type).
    pub ret_ty: Option<Rc<Type>>,
    pub name: Rc<str>,
    pub name_span: Span,
    pub params: Vec<Param>,
    /// `None` for abstract and native methods, which are declared with a
    /// trailing `;` instead of a body.
    pub body: Option<Rc<Stmt>>,
}

impl MethodDecl {
    pub fn is_constructor(&self) -> bool {
        self.ret_ty.is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MemberDecl {
    Field(FieldDecl),
    Method(MethodDecl),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDecl {
    pub mods: ModifierList,
    pub kind: TypeKind,
    pub name: Rc<str>,
    pub name_span: Span,
    pub extends: Vec<QualifiedName>,
    pub implements: Vec<QualifiedName>,
    pub members: Vec<MemberDecl>,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportDecl {
    pub name: QualifiedName,
    pub is_wildcard: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompUnit {
    pub file: FileId,
    pub package: Option<QualifiedName>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<Rc<TypeDecl>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub comp_units: Vec<Rc<CompUnit>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_list_rejects_duplicates() {
        let mut mods = ModifierList::new();
        assert!(mods.add(Modifier::Public, Span::at(0)));
        assert!(!mods.add(Modifier::Public, Span::at(5)));
        assert_eq!(mods.span_of(Modifier::Public), Some(Span::at(0)));
    }

    #[test]
    fn qualified_name_joins_with_dots() {
        let qn = QualifiedName::new(
            vec![Rc::from("java"), Rc::from("util"), Rc::from("List")],
            Span::new(0, 14),
        );
        assert_eq!(qn.joined(), "java.util.List");
        assert_eq!(qn.last(), "List");
    }

    #[test]
    fn paren_expr_forwards_type_of_inner() {
        let inner = Rc::new(Expr::IntLit { text: Rc::from("1"), span: Span::at(0), ty: TypeId::INT });
        let paren = Expr::Paren { inner, span: Span::at(0) };
        assert_eq!(paren.ty(), TypeId::INT);
    }
}
