//! Checks that the left-hand side of every `=` is something assignable:
//! a name, a field dereference, or an array index — never a literal, a
//! call, or any other expression shape.

use joosc_ast::visitor::{VisitResult, Visitor};
use joosc_ast::{BinOp, Expr, Program};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::FileSpan;

struct AssignmentVisitor<'a> {
    file: joosc_common::span::FileId,
    errors: &'a mut Vec<Diagnostic>,
}

impl Visitor for AssignmentVisitor<'_> {
    fn visit_expr(&mut self, expr: &Expr) -> VisitResult {
        if let Expr::Bin { op: BinOp::Assign, op_span, lhs, .. } = expr {
            if !matches!(lhs.as_ref(), Expr::Name { .. } | Expr::FieldDeref { .. } | Expr::ArrayIndex { .. }) {
                self.errors.push(Diagnostic::new(
                    DiagnosticKind::InvalidLHSError,
                    FileSpan::new(self.file, *op_span),
                    "invalid left-hand-side of assignment",
                ));
            }
        }
        VisitResult::Recurse
    }
}

pub fn check(program: Program, errors: &mut Vec<Diagnostic>) -> Program {
    let mut rewritten = Vec::with_capacity(program.comp_units.len());
    for cu in &program.comp_units {
        let mut visitor = AssignmentVisitor { file: cu.file, errors };
        rewritten.push(visitor.rewrite_comp_unit(cu).unwrap_or_else(|| cu.clone()));
    }
    Program { comp_units: rewritten }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_ast::parse_file;
    use joosc_common::span::FileId;

    fn weed(text: &str) -> Vec<Diagnostic> {
        let (cu, parse_errors) = parse_file(FileId(0), text);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        let program = Program { comp_units: vec![cu.unwrap()] };
        let mut errors = Vec::new();
        check(program, &mut errors);
        errors
    }

    #[test]
    fn name_lhs_is_fine() {
        let errors = weed("class A { void m() { int x = 0; x = 1; } }");
        assert!(errors.is_empty());
    }

    #[test]
    fn field_deref_lhs_is_fine() {
        let errors = weed("class A { int f; void m() { this.f = 1; } }");
        assert!(errors.is_empty());
    }

    #[test]
    fn call_result_as_lhs_is_rejected() {
        let errors = weed("class A { int f; int g() { return f; } void m() { g() = 1; } }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::InvalidLHSError);
    }
}
