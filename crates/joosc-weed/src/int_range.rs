//! Checks every integer literal fits in a 32-bit two's-complement value,
//! with the one exception the grammar can't express on its own: `-2147483648`
//! is in range only when the minus sign directly negates the literal, since
//! the literal `2147483648` alone is one past `i32::MAX`. A literal
//! immediately negated by unary `-` is folded into a single literal here so
//! that exception only has to be recognized once.

use std::rc::Rc;

use joosc_ast::visitor::{rewrite_expr_default, Visitor};
use joosc_ast::{Expr, Program, UnaryOp};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::limits::{INT_LITERAL_MAGNITUDE_MAX, INT_MAX};
use joosc_common::span::{FileId, FileSpan, Span};

struct IntRangeVisitor<'a> {
    file: FileId,
    errors: &'a mut Vec<Diagnostic>,
}

impl IntRangeVisitor<'_> {
    fn magnitude(&self, text: &str) -> u64 {
        text.parse::<u64>().unwrap_or(u64::MAX)
    }

    fn report(&mut self, span: Span) {
        self.errors.push(Diagnostic::new(
            DiagnosticKind::InvalidIntRangeError,
            FileSpan::new(self.file, span),
            "ints must be between -2^31 and 2^31 - 1 inclusive",
        ));
    }
}

impl Visitor for IntRangeVisitor<'_> {
    fn rewrite_expr(&mut self, e: &Rc<Expr>) -> Rc<Expr> {
        if let Expr::Unary { op: UnaryOp::Neg, op_span, operand, .. } = e.as_ref() {
            if let Expr::IntLit { text, span: lit_span, ty } = operand.as_ref() {
                let magnitude = self.magnitude(text);
                let span = op_span.merge(*lit_span);
                if magnitude > INT_LITERAL_MAGNITUDE_MAX {
                    self.report(span);
                    return e.clone();
                }
                return Rc::new(Expr::IntLit { text: Rc::from(format!("-{text}").as_str()), span, ty: *ty });
            }
        }

        if let Expr::IntLit { text, span, .. } = e.as_ref() {
            if self.magnitude(text) > INT_MAX as u64 {
                self.report(*span);
            }
            return e.clone();
        }

        rewrite_expr_default(self, e)
    }
}

pub fn check(program: Program, errors: &mut Vec<Diagnostic>) -> Program {
    let mut rewritten = Vec::with_capacity(program.comp_units.len());
    for cu in &program.comp_units {
        let mut visitor = IntRangeVisitor { file: cu.file, errors };
        rewritten.push(visitor.rewrite_comp_unit(cu).unwrap_or_else(|| cu.clone()));
    }
    Program { comp_units: rewritten }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_ast::{parse_file, MemberDecl, Stmt};
    use joosc_common::span::FileId as Fid;

    fn weed(text: &str) -> (Program, Vec<Diagnostic>) {
        let (cu, parse_errors) = parse_file(Fid(0), text);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        let program = Program { comp_units: vec![cu.unwrap()] };
        let mut errors = Vec::new();
        let program = check(program, &mut errors);
        (program, errors)
    }

    #[test]
    fn max_int_is_fine() {
        let (_, errors) = weed("class A { int f() { return 2147483647; } }");
        assert!(errors.is_empty());
    }

    #[test]
    fn one_past_max_is_an_error() {
        let (_, errors) = weed("class A { int f() { return 2147483648; } }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::InvalidIntRangeError);
    }

    #[test]
    fn negated_int_min_is_folded_and_accepted() {
        let (program, errors) = weed("class A { int f() { return -2147483648; } }");
        assert!(errors.is_empty());
        let MemberDecl::Method(m) = &program.comp_units[0].types[0].members[0] else { panic!() };
        let Stmt::Block { stmts, .. } = m.body.as_ref().unwrap().as_ref() else { panic!() };
        let Stmt::Return { value, .. } = stmts[0].as_ref() else { panic!() };
        let Expr::IntLit { text, .. } = value.as_ref().unwrap().as_ref() else { panic!("expected folded IntLit") };
        assert_eq!(&**text, "-2147483648");
    }
}
