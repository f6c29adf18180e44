//! A rewriting visitor: each pass walks the tree top-down, decides at every
//! node whether to recurse and whether to keep or drop the node, and
//! returns a (possibly) new tree built out of (possibly) the same `Rc`s.
//!
//! `Expr` nodes are never dropped from their parent — every field that
//! holds one is a required operand — so [`rewrite_expr`] always returns a
//! replacement. `Stmt`s inside a block, `MemberDecl`s inside a type, and
//! `TypeDecl`/`CompUnit`s inside their containers can legitimately
//! disappear (dead-code elimination, a member rewritten away), so those
//! levels return `Option`.

use std::rc::Rc;

use crate::ast::{
    CompUnit, Expr, FieldDecl, MemberDecl, MethodDecl, Param, Program, Stmt, TypeDecl,
};

/// What a visitor wants to do with the node it was just shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitResult {
    /// Don't descend into children; keep this node (and its children) as-is.
    Skip,
    /// Descend into children and rebuild from whatever they rewrite to.
    Recurse,
    /// Don't descend; drop this node from its parent.
    SkipPrune,
    /// Descend into children (for their side effects), then drop this node.
    RecursePrune,
}

fn wants_recurse(r: VisitResult) -> bool {
    matches!(r, VisitResult::Recurse | VisitResult::RecursePrune)
}

fn wants_prune(r: VisitResult) -> bool {
    matches!(r, VisitResult::SkipPrune | VisitResult::RecursePrune)
}

/// The default implementation of every hook is `Recurse`; a pass overrides
/// only the hooks it cares about; rewrite_* reconstructs the node from its
/// possibly-rewritten children, reusing the original `Rc` when nothing
/// underneath changed.
pub trait Visitor {
    fn visit_expr(&mut self, _e: &Expr) -> VisitResult {
        VisitResult::Recurse
    }
    fn visit_stmt(&mut self, _s: &Stmt) -> VisitResult {
        VisitResult::Recurse
    }
    fn visit_member(&mut self, _m: &MemberDecl) -> VisitResult {
        VisitResult::Recurse
    }
    fn visit_type_decl(&mut self, _t: &TypeDecl) -> VisitResult {
        VisitResult::Recurse
    }
    fn visit_comp_unit(&mut self, _c: &CompUnit) -> VisitResult {
        VisitResult::Recurse
    }

    fn rewrite_expr(&mut self, e: &Rc<Expr>) -> Rc<Expr> {
        rewrite_expr_default(self, e)
    }
    fn rewrite_stmt(&mut self, s: &Rc<Stmt>) -> Option<Rc<Stmt>> {
        rewrite_stmt_default(self, s)
    }
    fn rewrite_member(&mut self, m: &MemberDecl) -> Option<MemberDecl> {
        rewrite_member_default(self, m)
    }
    fn rewrite_type_decl(&mut self, t: &Rc<TypeDecl>) -> Option<Rc<TypeDecl>> {
        rewrite_type_decl_default(self, t)
    }
    fn rewrite_comp_unit(&mut self, c: &Rc<CompUnit>) -> Option<Rc<CompUnit>> {
        rewrite_comp_unit_default(self, c)
    }
    fn rewrite_program(&mut self, p: &Program) -> Program {
        rewrite_program_default(self, p)
    }
}

fn rewrite_exprs<V: Visitor + ?Sized>(v: &mut V, exprs: &[Rc<Expr>]) -> (Vec<Rc<Expr>>, bool) {
    let mut changed = false;
    let mut out = Vec::with_capacity(exprs.len());
    for e in exprs {
        let rewritten = v.rewrite_expr(e);
        if !Rc::ptr_eq(&rewritten, e) {
            changed = true;
        }
        out.push(rewritten);
    }
    (out, changed)
}

pub fn rewrite_expr_default<V: Visitor + ?Sized>(v: &mut V, e: &Rc<Expr>) -> Rc<Expr> {
    let result = v.visit_expr(e);
    // Expr has no list context it can be dropped from; treat any "prune"
    // verdict as "skip" (keep the node, don't descend).
    if !wants_recurse(result) {
        return e.clone();
    }

    match e.as_ref() {
        Expr::Name { .. }
        | Expr::This { .. }
        | Expr::BoolLit { .. }
        | Expr::IntLit { .. }
        | Expr::CharLit { .. }
        | Expr::StringLit { .. }
        | Expr::NullLit { .. }
        | Expr::StaticRef { .. } => e.clone(),

        Expr::Paren { inner, span } => {
            let new_inner = v.rewrite_expr(inner);
            if Rc::ptr_eq(&new_inner, inner) {
                e.clone()
            } else {
                Rc::new(Expr::Paren { inner: new_inner, span: *span })
            }
        }

        Expr::Bin { op, op_span, lhs, rhs, ty } => {
            let new_lhs = v.rewrite_expr(lhs);
            let new_rhs = v.rewrite_expr(rhs);
            if Rc::ptr_eq(&new_lhs, lhs) && Rc::ptr_eq(&new_rhs, rhs) {
                e.clone()
            } else {
                Rc::new(Expr::Bin { op: *op, op_span: *op_span, lhs: new_lhs, rhs: new_rhs, ty: *ty })
            }
        }

        Expr::Unary { op, op_span, operand, ty } => {
            let new_operand = v.rewrite_expr(operand);
            if Rc::ptr_eq(&new_operand, operand) {
                e.clone()
            } else {
                Rc::new(Expr::Unary { op: *op, op_span: *op_span, operand: new_operand, ty: *ty })
            }
        }

        Expr::InstanceOf { lhs, check_ty, span, ty } => {
            let new_lhs = v.rewrite_expr(lhs);
            if Rc::ptr_eq(&new_lhs, lhs) {
                e.clone()
            } else {
                Rc::new(Expr::InstanceOf {
                    lhs: new_lhs,
                    check_ty: check_ty.clone(),
                    span: *span,
                    ty: *ty,
                })
            }
        }

        Expr::ArrayIndex { base, index, span, ty } => {
            let new_base = v.rewrite_expr(base);
            let new_index = v.rewrite_expr(index);
            if Rc::ptr_eq(&new_base, base) && Rc::ptr_eq(&new_index, index) {
                e.clone()
            } else {
                Rc::new(Expr::ArrayIndex { base: new_base, index: new_index, span: *span, ty: *ty })
            }
        }

        Expr::FieldDeref { base, field_name, field_span, ty } => {
            let new_base = v.rewrite_expr(base);
            if Rc::ptr_eq(&new_base, base) {
                e.clone()
            } else {
                Rc::new(Expr::FieldDeref {
                    base: new_base,
                    field_name: field_name.clone(),
                    field_span: *field_span,
                    ty: *ty,
                })
            }
        }

        Expr::Call { callee, args, span, ty } => {
            let new_callee = v.rewrite_expr(callee);
            let (new_args, args_changed) = rewrite_exprs(v, args);
            if Rc::ptr_eq(&new_callee, callee) && !args_changed {
                e.clone()
            } else {
                Rc::new(Expr::Call { callee: new_callee, args: new_args, span: *span, ty: *ty })
            }
        }

        Expr::Cast { target, operand, span, ty } => {
            let new_operand = v.rewrite_expr(operand);
            if Rc::ptr_eq(&new_operand, operand) {
                e.clone()
            } else {
                Rc::new(Expr::Cast { target: target.clone(), operand: new_operand, span: *span, ty: *ty })
            }
        }

        Expr::NewClass { class_ty, args, span, ty } => {
            let (new_args, args_changed) = rewrite_exprs(v, args);
            if !args_changed {
                e.clone()
            } else {
                Rc::new(Expr::NewClass { class_ty: class_ty.clone(), args: new_args, span: *span, ty: *ty })
            }
        }

        Expr::NewArray { elem_ty, size, span, ty } => {
            let new_size = size.as_ref().map(|s| v.rewrite_expr(s));
            let changed = match (&new_size, size) {
                (Some(n), Some(o)) => !Rc::ptr_eq(n, o),
                (None, None) => false,
                _ => true,
            };
            if !changed {
                e.clone()
            } else {
                Rc::new(Expr::NewArray { elem_ty: elem_ty.clone(), size: new_size, span: *span, ty: *ty })
            }
        }

        Expr::Const { inner, ty } => {
            let new_inner = v.rewrite_expr(inner);
            if Rc::ptr_eq(&new_inner, inner) {
                e.clone()
            } else {
                Rc::new(Expr::Const { inner: new_inner, ty: *ty })
            }
        }
    }
}

pub fn rewrite_stmt_default<V: Visitor + ?Sized>(v: &mut V, s: &Rc<Stmt>) -> Option<Rc<Stmt>> {
    let result = v.visit_stmt(s);
    if !wants_recurse(result) {
        return if wants_prune(result) { None } else { Some(s.clone()) };
    }

    let rebuilt: Rc<Stmt> = match s.as_ref() {
        Stmt::Empty { .. } => s.clone(),

        Stmt::LocalDecl { ty, name, name_span, init } => {
            let new_init = v.rewrite_expr(init);
            if Rc::ptr_eq(&new_init, init) {
                s.clone()
            } else {
                Rc::new(Stmt::LocalDecl {
                    ty: ty.clone(),
                    name: name.clone(),
                    name_span: *name_span,
                    init: new_init,
                })
            }
        }

        Stmt::Return { span, value } => {
            let new_value = value.as_ref().map(|e| v.rewrite_expr(e));
            let changed = match (&new_value, value) {
                (Some(n), Some(o)) => !Rc::ptr_eq(n, o),
                (None, None) => false,
                _ => true,
            };
            if !changed {
                s.clone()
            } else {
                Rc::new(Stmt::Return { span: *span, value: new_value })
            }
        }

        Stmt::Expr { expr } => {
            let new_expr = v.rewrite_expr(expr);
            if Rc::ptr_eq(&new_expr, expr) {
                s.clone()
            } else {
                Rc::new(Stmt::Expr { expr: new_expr })
            }
        }

        Stmt::Block { stmts, span } => {
            let mut changed = false;
            let mut out = Vec::with_capacity(stmts.len());
            for child in stmts {
                match v.rewrite_stmt(child) {
                    Some(new_child) => {
                        if !Rc::ptr_eq(&new_child, child) {
                            changed = true;
                        }
                        out.push(new_child);
                    }
                    None => changed = true,
                }
            }
            if !changed {
                s.clone()
            } else {
                Rc::new(Stmt::Block { stmts: out, span: *span })
            }
        }

        Stmt::If { cond, then_branch, else_branch, span } => {
            let new_cond = v.rewrite_expr(cond);
            let new_then = v.rewrite_stmt(then_branch);
            let new_else = else_branch.as_ref().and_then(|e| v.rewrite_stmt(e));
            let cond_changed = !Rc::ptr_eq(&new_cond, cond);
            let then_changed = new_then.as_ref().map(|t| !Rc::ptr_eq(t, then_branch)).unwrap_or(true);
            let else_changed = match (&new_else, else_branch) {
                (Some(n), Some(o)) => !Rc::ptr_eq(n, o),
                (None, None) => false,
                _ => true,
            };
            if !cond_changed && !then_changed && !else_changed {
                s.clone()
            } else {
                Rc::new(Stmt::If {
                    cond: new_cond,
                    then_branch: new_then.unwrap_or_else(|| Rc::new(Stmt::Empty { span: then_branch.span_of() })),
                    else_branch: new_else,
                    span: *span,
                })
            }
        }

        Stmt::For { init, cond, update, body, span } => {
            let new_init = init.as_ref().and_then(|s| v.rewrite_stmt(s));
            let new_cond = cond.as_ref().map(|e| v.rewrite_expr(e));
            let new_update = update.as_ref().map(|e| v.rewrite_expr(e));
            let new_body = v.rewrite_stmt(body);
            Rc::new(Stmt::For {
                init: new_init,
                cond: new_cond,
                update: new_update,
                body: new_body.unwrap_or_else(|| Rc::new(Stmt::Empty { span: body.span_of() })),
                span: *span,
            })
        }

        Stmt::While { cond, body, span } => {
            let new_cond = v.rewrite_expr(cond);
            let new_body = v.rewrite_stmt(body);
            if Rc::ptr_eq(&new_cond, cond) && new_body.as_ref().map(|b| Rc::ptr_eq(b, body)).unwrap_or(false) {
                s.clone()
            } else {
                Rc::new(Stmt::While {
                    cond: new_cond,
                    body: new_body.unwrap_or_else(|| Rc::new(Stmt::Empty { span: body.span_of() })),
                    span: *span,
                })
            }
        }
    };

    if wants_prune(result) { None } else { Some(rebuilt) }
}

impl Stmt {
    fn span_of(&self) -> joosc_common::span::Span {
        match self {
            Stmt::Empty { span } | Stmt::Block { span, .. } | Stmt::If { span, .. } | Stmt::For { span, .. } | Stmt::While { span, .. } | Stmt::Return { span, .. } => *span,
            Stmt::LocalDecl { name_span, .. } => *name_span,
            Stmt::Expr { expr } => expr.span(),
        }
    }
}

fn rewrite_method(v: &mut (impl Visitor + ?Sized), m: &MethodDecl) -> MethodDecl {
    let body = m.body.as_ref().and_then(|b| v.rewrite_stmt(b));
    MethodDecl {
        mods: m.mods.clone(),
        ret_ty: m.ret_ty.clone(),
        name: m.name.clone(),
        name_span: m.name_span,
        params: m.params.iter().map(|p: &Param| p.clone()).collect(),
        body,
    }
}

fn rewrite_field(v: &mut (impl Visitor + ?Sized), f: &FieldDecl) -> FieldDecl {
    let init = f.init.as_ref().map(|e| v.rewrite_expr(e));
    FieldDecl {
        mods: f.mods.clone(),
        ty: f.ty.clone(),
        name: f.name.clone(),
        name_span: f.name_span,
        init,
    }
}

pub fn rewrite_member_default<V: Visitor + ?Sized>(v: &mut V, m: &MemberDecl) -> Option<MemberDecl> {
    let result = v.visit_member(m);
    if !wants_recurse(result) {
        return if wants_prune(result) { None } else { Some(m.clone()) };
    }

    let rebuilt = match m {
        MemberDecl::Field(f) => MemberDecl::Field(rewrite_field(v, f)),
        MemberDecl::Method(meth) => MemberDecl::Method(rewrite_method(v, meth)),
    };
    if wants_prune(result) { None } else { Some(rebuilt) }
}

pub fn rewrite_type_decl_default<V: Visitor + ?Sized>(v: &mut V, t: &Rc<TypeDecl>) -> Option<Rc<TypeDecl>> {
    let result = v.visit_type_decl(t);
    if !wants_recurse(result) {
        return if wants_prune(result) { None } else { Some(t.clone()) };
    }

    let mut changed = false;
    let mut members = Vec::with_capacity(t.members.len());
    for member in &t.members {
        match v.rewrite_member(member) {
            Some(new_member) => {
                if new_member != *member {
                    changed = true;
                }
                members.push(new_member);
            }
            None => changed = true,
        }
    }

    let rebuilt = if changed {
        Rc::new(TypeDecl {
            mods: t.mods.clone(),
            kind: t.kind,
            name: t.name.clone(),
            name_span: t.name_span,
            extends: t.extends.clone(),
            implements: t.implements.clone(),
            members,
            ty: t.ty,
        })
    } else {
        t.clone()
    };

    if wants_prune(result) { None } else { Some(rebuilt) }
}

pub fn rewrite_comp_unit_default<V: Visitor + ?Sized>(v: &mut V, c: &Rc<CompUnit>) -> Option<Rc<CompUnit>> {
    let result = v.visit_comp_unit(c);
    if !wants_recurse(result) {
        return if wants_prune(result) { None } else { Some(c.clone()) };
    }

    let mut changed = false;
    let mut types = Vec::with_capacity(c.types.len());
    for ty_decl in &c.types {
        match v.rewrite_type_decl(ty_decl) {
            Some(new_decl) => {
                if !Rc::ptr_eq(&new_decl, ty_decl) {
                    changed = true;
                }
                types.push(new_decl);
            }
            None => changed = true,
        }
    }

    let rebuilt = if changed {
        Rc::new(CompUnit { file: c.file, package: c.package.clone(), imports: c.imports.clone(), types })
    } else {
        c.clone()
    };

    if wants_prune(result) { None } else { Some(rebuilt) }
}

pub fn rewrite_program_default<V: Visitor + ?Sized>(v: &mut V, p: &Program) -> Program {
    let mut comp_units = Vec::with_capacity(p.comp_units.len());
    for cu in &p.comp_units {
        if let Some(new_cu) = v.rewrite_comp_unit(cu) {
            comp_units.push(new_cu);
        }
    }
    Program { comp_units }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, PrimitiveKind, Type};
    use crate::ids::TypeId;
    use joosc_common::span::Span;

    struct CountIntLits {
        count: usize,
    }

    impl Visitor for CountIntLits {
        fn visit_expr(&mut self, e: &Expr) -> VisitResult {
            if matches!(e, Expr::IntLit { .. }) {
                self.count += 1;
            }
            VisitResult::Recurse
        }
    }

    fn int_lit(n: i64) -> Rc<Expr> {
        Rc::new(Expr::IntLit { text: Rc::from(n.to_string().as_str()), span: Span::at(0), ty: TypeId::UNASSIGNED })
    }

    #[test]
    fn visits_nested_expressions() {
        let bin = Rc::new(Expr::Bin {
            op: BinOp::Add,
            op_span: Span::at(0),
            lhs: int_lit(1),
            rhs: int_lit(2),
            ty: TypeId::UNASSIGNED,
        });
        let mut counter = CountIntLits { count: 0 };
        let _ = counter.rewrite_expr(&bin);
        assert_eq!(counter.count, 2);
    }

    struct ReplaceIntLitsWithZero;

    impl Visitor for ReplaceIntLitsWithZero {
        fn rewrite_expr(&mut self, e: &Rc<Expr>) -> Rc<Expr> {
            if let Expr::IntLit { span, ty, .. } = e.as_ref() {
                return Rc::new(Expr::IntLit { text: Rc::from("0"), span: *span, ty: *ty });
            }
            rewrite_expr_default(self, e)
        }
    }

    #[test]
    fn unchanged_subtrees_are_structurally_shared() {
        let name = Rc::new(Expr::Name {
            name: crate::ast::QualifiedName::single(Rc::from("x"), Span::at(0)),
            ty: TypeId::UNASSIGNED,
        });
        let bin = Rc::new(Expr::Bin {
            op: BinOp::Add,
            op_span: Span::at(0),
            lhs: name.clone(),
            rhs: int_lit(2),
            ty: TypeId::UNASSIGNED,
        });
        let mut rewriter = ReplaceIntLitsWithZero;
        let rewritten = rewriter.rewrite_expr(&bin);
        if let Expr::Bin { lhs, .. } = rewritten.as_ref() {
            assert!(Rc::ptr_eq(lhs, &name), "unchanged child should be structurally shared");
        } else {
            panic!("expected Bin");
        }
    }

    #[test]
    fn skip_prune_removes_statement_from_block() {
        struct DropEmpties;
        impl Visitor for DropEmpties {
            fn visit_stmt(&mut self, s: &Stmt) -> VisitResult {
                if matches!(s, Stmt::Empty { .. }) {
                    VisitResult::SkipPrune
                } else {
                    VisitResult::Recurse
                }
            }
        }

        let block = Rc::new(Stmt::Block {
            stmts: vec![
                Rc::new(Stmt::Empty { span: Span::at(0) }),
                Rc::new(Stmt::Expr { expr: int_lit(1) }),
            ],
            span: Span::at(0),
        });
        let mut v = DropEmpties;
        let rewritten = v.rewrite_stmt(&block).unwrap();
        if let Stmt::Block { stmts, .. } = rewritten.as_ref() {
            assert_eq!(stmts.len(), 1);
        } else {
            panic!("expected Block");
        }
    }

    #[allow(dead_code)]
    fn type_ref(kind: PrimitiveKind) -> Rc<Type> {
        Rc::new(Type::Primitive { kind, span: Span::at(0) })
    }
}
