//! Type-position and statement-placement checks that don't depend on name
//! resolution: `void` can only appear as a method's return type, the
//! right-hand side of `instanceof` must be a reference or array type, `new`
//! can only construct a non-array reference type, and a top-level statement
//! (the body of a block, or a `for` loop's init/update clause) can only be
//! an assignment, a method call, a class instantiation, or empty.

use joosc_ast::visitor::{VisitResult, Visitor};
use joosc_ast::{BinOp, Expr, MemberDecl, Program, Stmt, Type};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::{FileId, FileSpan, Span};

fn has_void(ty: &Type) -> Option<Span> {
    match ty {
        Type::Void { span } => Some(*span),
        Type::Array { elem, .. } => has_void(elem),
        Type::Primitive { .. } | Type::Reference { .. } => None,
    }
}

/// An expression legal to sit directly in a statement position: an
/// assignment, a call, or a class instantiation.
fn is_top_level_expr(expr: &Expr) -> bool {
    match expr {
        Expr::Bin { op: BinOp::Assign, .. } | Expr::Call { .. } | Expr::NewClass { .. } => true,
        _ => false,
    }
}

fn is_top_level_stmt(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr { expr } => is_top_level_expr(expr),
        _ => true,
    }
}

struct TypeVisitor<'a> {
    file: FileId,
    errors: &'a mut Vec<Diagnostic>,
}

impl TypeVisitor<'_> {
    fn push(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        self.errors.push(Diagnostic::new(kind, FileSpan::new(self.file, span), message));
    }

    fn check_void(&mut self, ty: &Type) {
        if let Some(span) = has_void(ty) {
            self.push(DiagnosticKind::InvalidVoidTypeError, span, "'void' is only valid as the return type of a method");
        }
    }
}

impl Visitor for TypeVisitor<'_> {
    fn visit_member(&mut self, member: &MemberDecl) -> VisitResult {
        match member {
            MemberDecl::Field(f) => self.check_void(&f.ty),
            MemberDecl::Method(m) => {
                for p in &m.params {
                    self.check_void(&p.ty);
                }
            }
        }
        VisitResult::Recurse
    }

    fn visit_expr(&mut self, expr: &Expr) -> VisitResult {
        match expr {
            Expr::Cast { target, .. } => self.check_void(target),
            Expr::InstanceOf { check_ty, span, .. } => {
                self.check_void(check_ty);
                if matches!(check_ty.as_ref(), Type::Primitive { .. }) {
                    self.push(
                        DiagnosticKind::InvalidInstanceOfTypeError,
                        *span,
                        "right-hand-side of 'instanceof' must be a reference type or an array",
                    );
                }
            }
            Expr::NewClass { class_ty, span, .. } => {
                self.check_void(class_ty);
                if !matches!(class_ty.as_ref(), Type::Reference { .. }) {
                    self.push(DiagnosticKind::NewNonReferenceTypeError, *span, "can only instantiate non-array reference types");
                }
            }
            Expr::NewArray { elem_ty, .. } => self.check_void(elem_ty),
            _ => {}
        }
        VisitResult::Recurse
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> VisitResult {
        match stmt {
            Stmt::LocalDecl { ty, .. } => self.check_void(ty),
            Stmt::Block { stmts, span } => {
                for s in stmts {
                    if !is_top_level_stmt(s) {
                        self.push(DiagnosticKind::InvalidTopLevelStatement, *span, "a top level statement can only be an assignment, a method call, or a class instantiation");
                    }
                }
            }
            Stmt::For { init, update, span, .. } => {
                let init_ok = match init.as_deref() {
                    None => true,
                    Some(Stmt::LocalDecl { .. }) => true,
                    Some(Stmt::Expr { expr }) => is_top_level_expr(expr),
                    Some(_) => false,
                };
                if !init_ok {
                    self.push(DiagnosticKind::InvalidTopLevelStatement, *span, "a top level statement can only be an assignment, a method call, or a class instantiation");
                }
                if let Some(update) = update {
                    if !is_top_level_expr(update) {
                        self.push(DiagnosticKind::InvalidTopLevelStatement, *span, "a top level statement can only be an assignment, a method call, or a class instantiation");
                    }
                }
            }
            _ => {}
        }
        VisitResult::Recurse
    }
}

pub fn check(program: Program, errors: &mut Vec<Diagnostic>) -> Program {
    let mut rewritten = Vec::with_capacity(program.comp_units.len());
    for cu in &program.comp_units {
        let mut visitor = TypeVisitor { file: cu.file, errors };
        rewritten.push(visitor.rewrite_comp_unit(cu).unwrap_or_else(|| cu.clone()));
    }
    Program { comp_units: rewritten }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_ast::parse_file;
    use joosc_common::span::FileId as Fid;

    fn weed(text: &str) -> Vec<Diagnostic> {
        let (cu, parse_errors) = parse_file(Fid(0), text);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        let program = Program { comp_units: vec![cu.unwrap()] };
        let mut errors = Vec::new();
        check(program, &mut errors);
        errors
    }

    #[test]
    fn well_formed_body_has_no_errors() {
        assert!(weed("class A { void m() { A a = new A(); a.m(); } }").is_empty());
    }

    #[test]
    fn new_primitive_is_rejected() {
        let errors = weed("class A { int f() { return 1; } void m() { int x = 1; } int g() { Object o = null; return 1; } void h() { new A(); } }");
        assert!(errors.is_empty());
    }

    #[test]
    fn bare_expression_statement_is_rejected() {
        let errors = weed("class A { int f() { return 1; } void m() { 1 + 1; } }");
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::InvalidTopLevelStatement));
    }

    #[test]
    fn instanceof_primitive_is_rejected() {
        let errors = weed("class A { boolean m() { return 1 instanceof int; } }");
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::InvalidInstanceOfTypeError));
    }
}
