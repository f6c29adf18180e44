//! Dataflow analysis: two checks over a folded [`Program`] that need the
//! whole method/field body in view rather than one expression at a time —
//! field-initializer ordering (a field can't read another instance field of
//! the same type that's declared later, or itself) and statement
//! reachability (no code after an unconditional return, no falling off the
//! end of a value-returning method).

use std::rc::Rc;

use joosc_ast::ids::TypeId;
use joosc_ast::{CompUnit, Expr, FieldDecl, MemberDecl, MethodDecl, Modifier, Program, Stmt, TypeDecl};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::{FileSpan, Span};
use joosc_types::TypeInfoMap;

pub fn check_program(folded: &Program, typeinfo: &TypeInfoMap, errors: &mut Vec<Diagnostic>) {
    for unit in &folded.comp_units {
        check_comp_unit(unit, typeinfo, errors);
    }
}

fn check_comp_unit(unit: &CompUnit, typeinfo: &TypeInfoMap, errors: &mut Vec<Diagnostic>) {
    for type_decl in &unit.types {
        check_type_decl(type_decl, unit.file, typeinfo, errors);
    }
}

fn check_type_decl(type_decl: &TypeDecl, file: joosc_common::span::FileId, typeinfo: &TypeInfoMap, errors: &mut Vec<Diagnostic>) {
    for member in &type_decl.members {
        match member {
            MemberDecl::Field(field) => check_field_order(field, type_decl.ty, file, typeinfo, errors),
            MemberDecl::Method(method) => check_reachability(method, file, errors),
        }
    }
}

// --- Field order ------------------------------------------------------

fn check_field_order(field: &FieldDecl, curtype: TypeId, file: joosc_common::span::FileId, typeinfo: &TypeInfoMap, errors: &mut Vec<Diagnostic>) {
    let Some(init) = &field.init else { return };
    let Some(info) = typeinfo.lookup_type_info(curtype) else { return };
    let Some(curfield) = info.fields.lookup(&field.name) else { return };
    let curfield_id = curfield.id;
    check_field_order_expr(init, curtype, curfield_id, file, typeinfo, errors);
}

/// Mirrors the original's `FieldOrderVisitor`: walks every expression
/// looking for an implicit-`this` field read of an own, non-static field
/// declared at or after `curfield_id`. The immediate left-hand side of an
/// assignment is exempt (`x = x + 1;` only reads `x` on the RHS), matching
/// the original's special-cased `BinExpr` visit.
fn check_field_order_expr(e: &Expr, curtype: TypeId, curfield_id: joosc_ast::ids::FieldId, file: joosc_common::span::FileId, typeinfo: &TypeInfoMap, errors: &mut Vec<Diagnostic>) {
    match e {
        Expr::FieldDeref { base, field_name, field_span, .. } => {
            if base.ty() == curtype {
                if let Expr::This { span, .. } = base.as_ref() {
                    if *span == *field_span {
                        if let Some(info) = typeinfo.lookup_type_info(curtype) {
                            if let Some(finfo) = info.fields.lookup(field_name) {
                                let is_own = finfo.class_type == curtype;
                                let is_static = finfo.mods.has(Modifier::Static);
                                if is_own && !is_static && finfo.id.0 >= curfield_id.0 {
                                    errors.push(
                                        Diagnostic::new(
                                            DiagnosticKind::FieldOrderError,
                                            FileSpan::new(file, *field_span),
                                            "field used before its declaration completed",
                                        )
                                        .with_note(finfo.pos, "declared here"),
                                    );
                                }
                            }
                        }
                    }
                }
            }
            check_field_order_expr(base, curtype, curfield_id, file, typeinfo, errors);
        }
        Expr::Bin { op, lhs, rhs, .. } => {
            if matches!(op, joosc_ast::BinOp::Assign) {
                if let Expr::FieldDeref { base, .. } = lhs.as_ref() {
                    check_field_order_expr(base, curtype, curfield_id, file, typeinfo, errors);
                    check_field_order_expr(rhs, curtype, curfield_id, file, typeinfo, errors);
                    return;
                }
            }
            check_field_order_expr(lhs, curtype, curfield_id, file, typeinfo, errors);
            check_field_order_expr(rhs, curtype, curfield_id, file, typeinfo, errors);
        }
        Expr::Paren { inner, .. } | Expr::Const { inner, .. } => check_field_order_expr(inner, curtype, curfield_id, file, typeinfo, errors),
        Expr::Unary { operand, .. } => check_field_order_expr(operand, curtype, curfield_id, file, typeinfo, errors),
        Expr::InstanceOf { lhs, .. } => check_field_order_expr(lhs, curtype, curfield_id, file, typeinfo, errors),
        Expr::ArrayIndex { base, index, .. } => {
            check_field_order_expr(base, curtype, curfield_id, file, typeinfo, errors);
            check_field_order_expr(index, curtype, curfield_id, file, typeinfo, errors);
        }
        Expr::Cast { operand, .. } => check_field_order_expr(operand, curtype, curfield_id, file, typeinfo, errors),
        Expr::Call { callee, args, .. } => {
            check_field_order_expr(callee, curtype, curfield_id, file, typeinfo, errors);
            for a in args {
                check_field_order_expr(a, curtype, curfield_id, file, typeinfo, errors);
            }
        }
        Expr::NewClass { args, .. } => {
            for a in args {
                check_field_order_expr(a, curtype, curfield_id, file, typeinfo, errors);
            }
        }
        Expr::NewArray { size, .. } => {
            if let Some(s) = size {
                check_field_order_expr(s, curtype, curfield_id, file, typeinfo, errors);
            }
        }
        Expr::Name { .. }
        | Expr::This { .. }
        | Expr::BoolLit { .. }
        | Expr::IntLit { .. }
        | Expr::CharLit { .. }
        | Expr::StringLit { .. }
        | Expr::NullLit { .. }
        | Expr::StaticRef { .. } => {}
    }
}

// --- Reachability -------------------------------------------------------

#[derive(Clone, Copy)]
struct ReachState {
    reachable: bool,
    may_emit: bool,
}

impl ReachState {
    fn start() -> Self {
        ReachState { reachable: true, may_emit: true }
    }

    fn nested(self) -> Self {
        self
    }

    fn check_reachable(&mut self, span: FileSpan, errors: &mut Vec<Diagnostic>) {
        if !self.reachable && self.may_emit {
            self.may_emit = false;
            errors.push(Diagnostic::new(DiagnosticKind::UnreachableCodeError, span, "unreachable code"));
        }
    }
}

fn check_reachability(method: &MethodDecl, file: joosc_common::span::FileId, errors: &mut Vec<Diagnostic>) {
    let Some(body) = &method.body else { return };
    let mut state = ReachState::start();
    visit_stmt_reachability(&mut state, body, file, errors);

    let is_void = match method.ret_ty.as_deref() {
        None | Some(joosc_ast::Type::Void { .. }) => true,
        Some(_) => false,
    };
    if state.reachable && !is_void {
        errors.push(Diagnostic::new(
            DiagnosticKind::MethodNeedsReturnError,
            FileSpan::new(file, method.name_span),
            "can reach the end of the method without returning a value",
        ));
    }
}

fn visit_stmt_reachability(state: &mut ReachState, stmt: &Stmt, file: joosc_common::span::FileId, errors: &mut Vec<Diagnostic>) {
    match stmt {
        Stmt::Empty { .. } | Stmt::LocalDecl { .. } | Stmt::Expr { .. } => {}
        Stmt::Return { .. } => state.reachable = false,
        Stmt::Block { stmts, .. } => {
            for s in stmts {
                state.check_reachable(FileSpan::new(file, stmt_span(s)), errors);
                visit_stmt_reachability(state, s, file, errors);
            }
            state.may_emit = true;
        }
        Stmt::If { then_branch, else_branch, .. } => {
            let mut true_state = state.nested();
            visit_stmt_reachability(&mut true_state, then_branch, file, errors);
            let mut false_state = state.nested();
            if let Some(eb) = else_branch {
                visit_stmt_reachability(&mut false_state, eb, file, errors);
            }
            state.reachable = true_state.reachable || false_state.reachable;
        }
        Stmt::For { cond, body, .. } => visit_loop(state, cond.as_deref(), body, file, errors),
        Stmt::While { cond, body, .. } => visit_loop(state, Some(cond), body, file, errors),
    }
}

fn visit_loop(state: &mut ReachState, cond: Option<&Rc<Expr>>, body: &Stmt, file: joosc_common::span::FileId, errors: &mut Vec<Diagnostic>) {
    let const_val = match cond.map(|c| constant_bool_value(c)) {
        None => Some(true),
        Some(v) => v,
    };

    match const_val {
        Some(false) => {
            // The loop body can never run.
            let mut nested = ReachState { reachable: false, may_emit: state.may_emit };
            nested.check_reachable(FileSpan::new(file, stmt_span(body)), errors);
            state.reachable = true;
        }
        Some(true) => {
            // Infinite loop: code after it is reachable only by returning
            // from inside, which `Return` already tracks.
            let mut nested = state.nested();
            visit_stmt_reachability(&mut nested, body, file, errors);
            state.reachable = false;
        }
        None => {
            // Might run zero or more times; reachability after is unchanged
            // either way.
            let mut nested = state.nested();
            visit_stmt_reachability(&mut nested, body, file, errors);
        }
    }
}

/// `Some(true)`/`Some(false)` if `cond` folded to a boolean literal constant,
/// `None` if it didn't fold (depends on something not known at compile
/// time).
fn constant_bool_value(cond: &Expr) -> Option<bool> {
    let Expr::Const { inner, .. } = cond else { return None };
    match inner.as_ref() {
        Expr::BoolLit { value, .. } => Some(*value),
        _ => None,
    }
}

fn stmt_span(s: &Stmt) -> Span {
    match s {
        Stmt::Empty { span } | Stmt::Block { span, .. } | Stmt::If { span, .. } | Stmt::For { span, .. } | Stmt::While { span, .. } | Stmt::Return { span, .. } => *span,
        Stmt::LocalDecl { name_span, .. } => *name_span,
        Stmt::Expr { expr } => expr.span(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_common::span::FileId;

    fn fspan(n: u32) -> FileSpan {
        FileSpan::new(FileId(0), Span::at(n))
    }

    fn ret(span: Span) -> Rc<Stmt> {
        Rc::new(Stmt::Return { span, value: None })
    }

    #[test]
    fn code_after_return_is_unreachable() {
        let block = Stmt::Block {
            stmts: vec![ret(Span::at(0)), Rc::new(Stmt::Expr { expr: Rc::new(Expr::NullLit { span: Span::at(10), ty: TypeId::NULL }) })],
            span: Span::at(0),
        };
        let mut errors = Vec::new();
        let mut state = ReachState::start();
        visit_stmt_reachability(&mut state, &block, FileId(0), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::UnreachableCodeError);
    }

    #[test]
    fn infinite_loop_makes_following_code_unreachable() {
        let cond = Rc::new(Expr::Const { inner: Rc::new(Expr::BoolLit { value: true, span: Span::at(0), ty: TypeId::BOOL }), ty: TypeId::BOOL });
        let body = Rc::new(Stmt::Empty { span: Span::at(1) });
        let mut errors = Vec::new();
        let mut state = ReachState::start();
        visit_loop(&mut state, Some(&cond), &body, FileId(0), &mut errors);
        assert!(!state.reachable);
    }

    #[test]
    fn field_order_error_on_forward_reference() {
        use joosc_ast::{ModifierList, TypeKind};
        use joosc_types::TypeInfoMapBuilder;

        let object = TypeId::new(TypeId::FIRST_USER_BASE, 0);
        let serializable = TypeId::new(TypeId::FIRST_USER_BASE + 1, 0);
        let cloneable = TypeId::new(TypeId::FIRST_USER_BASE + 2, 0);
        let array = TypeId::new(TypeId::FIRST_USER_BASE + 3, 0);

        let mut builder = TypeInfoMapBuilder::new(object, serializable, cloneable, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), fspan(0), vec![], vec![]);
        let a_id = builder.put_field(object, ModifierList::new(), Rc::from("a"), TypeId::INT, fspan(1));
        let _b_id = builder.put_field(object, ModifierList::new(), Rc::from("b"), TypeId::INT, fspan(2));
        let mut build_errors = Vec::new();
        let typeinfo = builder.build(&mut build_errors);
        assert!(build_errors.is_empty());

        // `a`'s initializer reads `b`, declared after it: forward reference.
        let this_node = Rc::new(Expr::This { span: Span::at(10), ty: object });
        let read_b = Expr::FieldDeref { base: this_node, field_name: Rc::from("b"), field_span: Span::at(10), ty: TypeId::INT };

        let mut errors = Vec::new();
        check_field_order_expr(&read_b, object, a_id, FileId(0), &typeinfo, &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::FieldOrderError);
    }
}
