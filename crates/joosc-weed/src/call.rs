//! Checks that every call expression's callee is something that can name a
//! method: a bare name or a field dereference. `this(...)` is singled out
//! with its own diagnostic since Joos has no explicit constructor-chaining
//! call, and anything else (a literal, another call's result, ...) is
//! rejected outright.

use joosc_ast::visitor::{VisitResult, Visitor};
use joosc_ast::Expr;
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::{FileId, FileSpan};

struct CallVisitor<'a> {
    file: FileId,
    errors: &'a mut Vec<Diagnostic>,
}

impl Visitor for CallVisitor<'_> {
    fn visit_expr(&mut self, expr: &Expr) -> VisitResult {
        if let Expr::Call { callee, span, .. } = expr {
            match callee.as_ref() {
                Expr::FieldDeref { .. } | Expr::Name { .. } => VisitResult::Recurse,
                Expr::This { .. } => {
                    self.errors.push(Diagnostic::new(
                        DiagnosticKind::ExplicitThisCallError,
                        FileSpan::new(self.file, *span),
                        "cannot call explicit 'this' constructor in Joos",
                    ));
                    VisitResult::RecursePrune
                }
                _ => {
                    self.errors.push(Diagnostic::new(
                        DiagnosticKind::InvalidCallError,
                        FileSpan::new(self.file, *span),
                        "cannot call a non-method",
                    ));
                    VisitResult::RecursePrune
                }
            }
        } else {
            VisitResult::Recurse
        }
    }
}

pub fn check(program: joosc_ast::Program, errors: &mut Vec<Diagnostic>) -> joosc_ast::Program {
    let mut rewritten = Vec::with_capacity(program.comp_units.len());
    for cu in &program.comp_units {
        let mut visitor = CallVisitor { file: cu.file, errors };
        rewritten.push(visitor.rewrite_comp_unit(cu).unwrap_or_else(|| cu.clone()));
    }
    joosc_ast::Program { comp_units: rewritten }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_ast::parse_file;
    use joosc_ast::Program;
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
    fn plain_call_is_fine() {
        assert!(weed("class A { void f() {} void g() { f(); } }").is_empty());
    }

    #[test]
    fn field_deref_call_is_fine() {
        assert!(weed("class A { void g(A a) { a.f(); } }").is_empty());
    }

    #[test]
    fn calling_a_literal_is_rejected() {
        let errors = weed("class A { void g() { 1(); } }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::InvalidCallError);
    }
}
