//! Type checking: walks a resolved [`Program`], filling in every `ty` slot
//! and rejecting expressions/statements whose types don't fit the position
//! they're in. One [`MethodCtx`] per method body (or per field initializer)
//! carries the fixed context names resolve against (scope, whether static,
//! current type, return type); the [`SymbolTable`] for locals is threaded
//! alongside it as a separate `&mut` parameter since it's the one piece of
//! state that actually changes as a block is walked.

use std::rc::Rc;

use joosc_ast::ids::TypeId;
use joosc_ast::{BinOp, CompUnit, Expr, FieldDecl, MemberDecl, MethodDecl, Modifier, Param, Program, QualifiedName, Stmt, Type, TypeDecl, UnaryOp};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::{FileId, FileSpan, Span};
use joosc_resolve::DeclResolution;
use joosc_types::type_info_map::{CallContext, MethodInfo, MethodSignature, MethodTable};
use joosc_types::{TypeInfoMap, TypeSet};

use crate::symbol_table::{ScopeGuard, SymbolTable, VarDeclGuard, VariableInfo};

/// Arrays are not numeric; only the five value-carrying primitives are.
pub fn is_numeric(tid: TypeId) -> bool {
    tid.is_numeric()
}

pub fn is_primitive(tid: TypeId) -> bool {
    tid.is_primitive()
}

/// Unlike [`TypeId::is_reference`], `null` itself counts as a reference type
/// here — it can widen to any reference type but not the other way around.
pub fn is_reference(tid: TypeId) -> bool {
    tid.is_reference() || tid.is_null()
}

/// `lhs x = (rhs)y` is a widening primitive conversion.
pub fn is_primitive_widening(lhs: TypeId, rhs: TypeId) -> bool {
    if !is_numeric(lhs) || !is_numeric(rhs) {
        return false;
    }
    if rhs.base == TypeId::BYTE.base {
        lhs.base == TypeId::SHORT.base || lhs.base == TypeId::INT.base
    } else if rhs.base == TypeId::SHORT.base || rhs.base == TypeId::CHAR.base {
        lhs.base == TypeId::INT.base
    } else {
        // rhs is int: nothing wider exists.
        false
    }
}

/// `lhs x = (rhs)y` is a narrowing primitive conversion (legal only as an
/// explicit cast, never a plain assignment).
pub fn is_primitive_narrowing(lhs: TypeId, rhs: TypeId) -> bool {
    if !is_numeric(lhs) || !is_numeric(rhs) {
        return false;
    }
    if rhs.base == TypeId::BYTE.base {
        lhs.base == TypeId::CHAR.base
    } else if rhs.base == TypeId::SHORT.base {
        lhs.base == TypeId::BYTE.base || lhs.base == TypeId::CHAR.base
    } else if rhs.base == TypeId::CHAR.base {
        lhs.base == TypeId::BYTE.base || lhs.base == TypeId::SHORT.base
    } else {
        // rhs is int
        lhs.base == TypeId::BYTE.base || lhs.base == TypeId::CHAR.base || lhs.base == TypeId::SHORT.base
    }
}

pub fn is_reference_widening(typeinfo: &TypeInfoMap, lhs: TypeId, rhs: TypeId) -> bool {
    if !is_reference(lhs) || !is_reference(rhs) {
        return false;
    }
    if lhs.is_null() {
        return false;
    }
    if rhs.is_null() {
        return true;
    }
    typeinfo.is_ancestor(lhs, rhs)
}

pub fn is_assignable(typeinfo: &TypeInfoMap, lhs: TypeId, rhs: TypeId) -> bool {
    if lhs == rhs {
        return true;
    }
    if lhs.ndims == rhs.ndims && lhs.ndims > 0 {
        let lhs_elem = TypeId::new(lhs.base, 0);
        let rhs_elem = TypeId::new(rhs.base, 0);
        if is_primitive(lhs_elem) || is_primitive(rhs_elem) {
            return false;
        }
        return is_assignable(typeinfo, lhs_elem, rhs_elem);
    }
    is_primitive_widening(lhs, rhs) || is_reference_widening(typeinfo, lhs, rhs)
}

pub fn is_castable(typeinfo: &TypeInfoMap, lhs: TypeId, rhs: TypeId) -> bool {
    if lhs == rhs {
        return true;
    }
    if is_primitive(lhs) && is_primitive(rhs) {
        return is_primitive_widening(lhs, rhs) || is_primitive_narrowing(lhs, rhs);
    }
    if is_reference(lhs) && is_reference(rhs) {
        return is_assignable(typeinfo, lhs, rhs) || is_assignable(typeinfo, rhs, lhs);
    }
    false
}

pub fn is_comparable(typeinfo: &TypeInfoMap, lhs: TypeId, rhs: TypeId) -> bool {
    if lhs == rhs {
        return true;
    }
    if is_numeric(lhs) && is_numeric(rhs) {
        return true;
    }
    if is_numeric(lhs) || is_numeric(rhs) {
        return false;
    }
    if lhs.is_null() || rhs.is_null() {
        return true;
    }
    is_assignable(typeinfo, lhs, rhs) || is_assignable(typeinfo, rhs, lhs)
}

/// Picks the method an overload resolves to against a fully merged
/// [`MethodTable`]: an exact-signature match if one exists, otherwise the
/// lowest-id candidate whose parameters all accept the given argument types
/// by widening (Java has no return-type-only overloads, so arity plus
/// widening is the whole rule). Returns `None` for a blacklisted table or
/// when nothing applies; the caller decides what that means for its
/// context — the checker turns it into a diagnostic, IR generation (which
/// only ever calls this on an already-checked program) turns it into an
/// internal-compiler-error `expect`.
///
/// Exposed from this module (rather than kept private) so IR generation
/// can re-derive the same `MethodId` a call site resolved to without a
/// second, possibly-diverging implementation of overload resolution —
/// `Call`/`FieldDeref` carry no `MethodId`/`FieldId` on the AST by design
/// (see the module-level design note), so every later pass that needs the
/// concrete member re-derives it through this one function.
pub fn resolve_method(
    methods: &MethodTable,
    typeinfo: &TypeInfoMap,
    ctx: CallContext,
    name: &str,
    is_constructor: bool,
    arg_types: &[TypeId],
) -> Option<&MethodInfo> {
    if methods.is_blacklisted() {
        return None;
    }
    let exact_sig = MethodSignature::new(is_constructor, Rc::from(name), arg_types.to_vec());
    if let Some(info) = methods.lookup(&exact_sig) {
        return Some(info);
    }

    let mut candidates: Vec<&MethodInfo> = methods
        .methods()
        .filter(|m| {
            m.signature.is_constructor == is_constructor
                && &*m.signature.name == name
                && m.signature.param_types.len() == arg_types.len()
                && m.signature.param_types.iter().zip(arg_types).all(|(p, a)| is_assignable(typeinfo, *p, *a))
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by_key(|m| m.id.0);
    let chosen = candidates[0];
    match (ctx, chosen.mods.has(Modifier::Static)) {
        (CallContext::Static, false) | (CallContext::Instance, true) => None,
        _ => Some(chosen),
    }
}

/// Resolves a call's return type, reporting the same diagnostics
/// [`MethodTable::resolve_call`] would for an exact match, or the
/// equivalent undefined/static-mismatch errors when [`resolve_method`]
/// falls through to widening overload resolution or finds nothing.
#[allow(clippy::too_many_arguments)]
fn resolve_method_return_type(
    methods: &MethodTable,
    typeinfo: &TypeInfoMap,
    caller_tid: TypeId,
    ctx: CallContext,
    name: &str,
    is_constructor: bool,
    arg_types: &[TypeId],
    pos: FileSpan,
    errors: &mut Vec<Diagnostic>,
) -> TypeId {
    if methods.is_blacklisted() {
        return TypeId::ERROR;
    }
    let exact_sig = MethodSignature::new(is_constructor, Rc::from(name), arg_types.to_vec());
    if methods.lookup(&exact_sig).is_some() {
        let ret = methods.lookup(&exact_sig).expect("just checked").return_type;
        methods.resolve_call(typeinfo, caller_tid, ctx, &exact_sig, pos, errors);
        return ret;
    }

    let has_arity_match = methods
        .methods()
        .any(|m| m.signature.is_constructor == is_constructor && &*m.signature.name == name && m.signature.param_types.len() == arg_types.len());

    match resolve_method(methods, typeinfo, ctx, name, is_constructor, arg_types) {
        Some(info) => info.return_type,
        None if !has_arity_match => {
            errors.push(Diagnostic::new(
                DiagnosticKind::UndefinedMethodError,
                pos,
                format!("no method '{name}' is applicable to these argument types"),
            ));
            TypeId::ERROR
        }
        None => {
            // An arity match exists but every candidate's static-ness
            // disagreed with `ctx`, or the widening filter rejected them
            // all; re-run to get the right diagnostic kind for the
            // static-mismatch case specifically.
            let mut candidates: Vec<&MethodInfo> = methods
                .methods()
                .filter(|m| {
                    m.signature.is_constructor == is_constructor
                        && &*m.signature.name == name
                        && m.signature.param_types.len() == arg_types.len()
                        && m.signature.param_types.iter().zip(arg_types).all(|(p, a)| is_assignable(typeinfo, *p, *a))
                })
                .collect();
            if candidates.is_empty() {
                errors.push(Diagnostic::new(
                    DiagnosticKind::UndefinedMethodError,
                    pos,
                    format!("no method '{name}' is applicable to these argument types"),
                ));
                return TypeId::ERROR;
            }
            candidates.sort_by_key(|m| m.id.0);
            let chosen = candidates[0];
            let kind = if chosen.mods.has(Modifier::Static) {
                DiagnosticKind::StaticMethodOnInstanceError
            } else {
                DiagnosticKind::InstanceMethodOnStaticError
            };
            let msg = if chosen.mods.has(Modifier::Static) {
                format!("'{name}' is static; call it through the type instead")
            } else {
                format!("'{name}' is an instance method")
            };
            errors.push(Diagnostic::new(kind, pos, msg));
            TypeId::ERROR
        }
    }
}

/// Everything a single method body (or field initializer) resolves names
/// against, except the symbol table itself — that's threaded as its own
/// `&mut` parameter, since entering/leaving a block scope mutates it while
/// everything here stays fixed for the whole member.
struct MethodCtx<'a> {
    typeinfo: &'a TypeInfoMap,
    typeset: &'a TypeSet,
    file: FileId,
    curtype: TypeId,
    is_static: bool,
    return_type: TypeId,
}

impl<'a> MethodCtx<'a> {
    fn field_ctx(&self) -> CallContext {
        if self.is_static {
            CallContext::Static
        } else {
            CallContext::Instance
        }
    }

    fn span_at(&self, span: Span) -> FileSpan {
        FileSpan::new(self.file, span)
    }
}

pub fn check_program(resolution: &DeclResolution, typeinfo: &TypeInfoMap, errors: &mut Vec<Diagnostic>) -> Program {
    let mut comp_units = Vec::with_capacity(resolution.program.comp_units.len());
    for unit in &resolution.program.comp_units {
        comp_units.push(Rc::new(check_comp_unit(unit, resolution, typeinfo, errors)));
    }
    Program { comp_units }
}

fn check_comp_unit(unit: &CompUnit, resolution: &DeclResolution, typeinfo: &TypeInfoMap, errors: &mut Vec<Diagnostic>) -> CompUnit {
    let scoped = resolution.unit_typesets.get(&unit.file).expect("every comp unit has a scoped typeset");

    let mut types = Vec::with_capacity(unit.types.len());
    for type_decl in &unit.types {
        types.push(Rc::new(check_type_decl(type_decl, scoped, typeinfo, unit.file, errors)));
    }
    CompUnit { file: unit.file, package: unit.package.clone(), imports: unit.imports.clone(), types }
}

fn check_type_decl(type_decl: &TypeDecl, scoped: &TypeSet, typeinfo: &TypeInfoMap, file: FileId, errors: &mut Vec<Diagnostic>) -> TypeDecl {
    let inner_scope = scoped.with_type(&type_decl.name, type_decl.ty);

    let mut members = Vec::with_capacity(type_decl.members.len());
    for member in &type_decl.members {
        let checked = match member {
            MemberDecl::Field(field) => MemberDecl::Field(check_field(field, type_decl.ty, &inner_scope, typeinfo, file, errors)),
            MemberDecl::Method(method) => MemberDecl::Method(check_method(method, type_decl.ty, &inner_scope, typeinfo, file, errors)),
        };
        members.push(checked);
    }

    TypeDecl {
        mods: type_decl.mods.clone(),
        kind: type_decl.kind,
        name: type_decl.name.clone(),
        name_span: type_decl.name_span,
        extends: type_decl.extends.clone(),
        implements: type_decl.implements.clone(),
        members,
        ty: type_decl.ty,
    }
}

fn check_field(field: &FieldDecl, curtype: TypeId, scope: &TypeSet, typeinfo: &TypeInfoMap, file: FileId, errors: &mut Vec<Diagnostic>) -> FieldDecl {
    let is_static = field.mods.has(Modifier::Static);
    let ctx = MethodCtx { typeinfo, typeset: scope, file, curtype, is_static, return_type: TypeId::VOID };
    let mut symbols = SymbolTable::new(vec![], errors);

    let field_tid = joosc_resolve::resolve_type(&field.ty, scope, file, errors);
    let init = field.init.as_ref().map(|init_expr| {
        let checked = check_expr(&ctx, &mut symbols, init_expr, errors);
        if !field_tid.is_error() && !is_assignable(typeinfo, field_tid, checked.ty()) {
            errors.push(Diagnostic::new(
                DiagnosticKind::UnassignableError,
                ctx.span_at(checked.span()),
                "cannot assign a value of this type to a field of a different, non-widening type",
            ));
        }
        checked
    });

    FieldDecl { mods: field.mods.clone(), ty: field.ty.clone(), name: field.name.clone(), name_span: field.name_span, init }
}

fn check_method(method: &MethodDecl, curtype: TypeId, scope: &TypeSet, typeinfo: &TypeInfoMap, file: FileId, errors: &mut Vec<Diagnostic>) -> MethodDecl {
    let is_static = method.mods.has(Modifier::Static);
    let return_type = if method.is_constructor() {
        curtype
    } else {
        joosc_resolve::resolve_type(method.ret_ty.as_ref().expect("non-constructor has a return type"), scope, file, errors)
    };

    let params: Vec<VariableInfo> = method
        .params
        .iter()
        .map(|p: &Param| VariableInfo {
            tid: joosc_resolve::resolve_type(&p.ty, scope, file, errors),
            name: p.name.clone(),
            pos: FileSpan::new(file, p.name_span),
            vid: joosc_ast::ids::LocalVarId::UNASSIGNED,
        })
        .collect();

    let ctx = MethodCtx { typeinfo, typeset: scope, file, curtype, is_static, return_type };
    let mut symbols = SymbolTable::new(params, errors);

    let body = method.body.as_ref().map(|b| check_stmt(&ctx, &mut symbols, b, errors));

    MethodDecl {
        mods: method.mods.clone(),
        ret_ty: method.ret_ty.clone(),
        name: method.name.clone(),
        name_span: method.name_span,
        params: method.params.clone(),
        body,
    }
}

fn check_stmt(ctx: &MethodCtx, symbols: &mut SymbolTable, stmt: &Stmt, errors: &mut Vec<Diagnostic>) -> Rc<Stmt> {
    match stmt {
        Stmt::Empty { span } => Rc::new(Stmt::Empty { span: *span }),

        Stmt::LocalDecl { ty, name, name_span, init } => {
            let local_tid = joosc_resolve::resolve_type(ty, ctx.typeset, ctx.file, errors);
            // Declare before checking the initializer (a deliberate deviation
            // from a naive check-then-declare order) so a self-reference like
            // `int x = x;` is caught instead of silently resolving to an
            // outer `x`.
            let (mut guard, _vid) = VarDeclGuard::new(symbols, local_tid, name.clone(), ctx.span_at(*name_span), errors);
            let checked_init = check_expr(ctx, guard.table(), init, errors);
            drop(guard);

            if !local_tid.is_error() && !is_assignable(ctx.typeinfo, local_tid, checked_init.ty()) {
                errors.push(Diagnostic::new(
                    DiagnosticKind::UnassignableError,
                    ctx.span_at(checked_init.span()),
                    "initializer is not assignable to the declared type",
                ));
            }

            Rc::new(Stmt::LocalDecl { ty: ty.clone(), name: name.clone(), name_span: *name_span, init: checked_init })
        }

        Stmt::Return { span, value } => {
            let checked_value = value.as_ref().map(|v| check_expr(ctx, symbols, v, errors));
            let value_ty = checked_value.as_ref().map(|v| v.ty()).unwrap_or(TypeId::VOID);
            if !is_assignable(ctx.typeinfo, ctx.return_type, value_ty) {
                errors.push(Diagnostic::new(DiagnosticKind::InvalidReturnError, ctx.span_at(*span), "return value does not match the method's declared return type"));
            }
            Rc::new(Stmt::Return { span: *span, value: checked_value })
        }

        Stmt::Expr { expr } => Rc::new(Stmt::Expr { expr: check_expr(ctx, symbols, expr, errors) }),

        Stmt::Block { stmts, span } => {
            let mut guard = ScopeGuard::new(symbols);
            let mut checked = Vec::with_capacity(stmts.len());
            for s in stmts {
                checked.push(check_stmt(ctx, guard.table(), s, errors));
            }
            drop(guard);
            Rc::new(Stmt::Block { stmts: checked, span: *span })
        }

        Stmt::If { cond, then_branch, else_branch, span } => {
            let checked_cond = check_expr(ctx, symbols, cond, errors);
            if !checked_cond.ty().is_boolean() {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_cond.span()), "condition must be boolean"));
            }
            let checked_then = check_stmt(ctx, symbols, then_branch, errors);
            let checked_else = else_branch.as_ref().map(|e| check_stmt(ctx, symbols, e, errors));
            Rc::new(Stmt::If { cond: checked_cond, then_branch: checked_then, else_branch: checked_else, span: *span })
        }

        Stmt::For { init, cond, update, body, span } => {
            let mut guard = ScopeGuard::new(symbols);
            let checked_init = init.as_ref().map(|s| check_stmt(ctx, guard.table(), s, errors));
            let checked_cond = cond.as_ref().map(|c| check_expr(ctx, guard.table(), c, errors));
            if let Some(c) = &checked_cond {
                if !c.ty().is_boolean() {
                    errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(c.span()), "loop condition must be boolean"));
                }
            }
            let checked_update = update.as_ref().map(|u| check_expr(ctx, guard.table(), u, errors));
            let checked_body = check_stmt(ctx, guard.table(), body, errors);
            drop(guard);
            Rc::new(Stmt::For { init: checked_init, cond: checked_cond, update: checked_update, body: checked_body, span: *span })
        }

        Stmt::While { cond, body, span } => {
            let checked_cond = check_expr(ctx, symbols, cond, errors);
            if !checked_cond.ty().is_boolean() {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_cond.span()), "loop condition must be boolean"));
            }
            let checked_body = check_stmt(ctx, symbols, body, errors);
            Rc::new(Stmt::While { cond: checked_cond, body: checked_body, span: *span })
        }
    }
}

fn check_expr(ctx: &MethodCtx, symbols: &mut SymbolTable, expr: &Expr, errors: &mut Vec<Diagnostic>) -> Rc<Expr> {
    match expr {
        Expr::Name { name, .. } => resolve_name(ctx, symbols, name, errors),

        Expr::This { span, .. } => {
            if ctx.is_static {
                errors.push(Diagnostic::new(DiagnosticKind::ThisInStaticMemberError, ctx.span_at(*span), "'this' cannot be used in a static context"));
            }
            Rc::new(Expr::This { span: *span, ty: ctx.curtype })
        }

        Expr::BoolLit { value, span, .. } => Rc::new(Expr::BoolLit { value: *value, span: *span, ty: TypeId::BOOL }),
        Expr::IntLit { text, span, .. } => Rc::new(Expr::IntLit { text: text.clone(), span: *span, ty: TypeId::INT }),
        Expr::CharLit { text, span, .. } => Rc::new(Expr::CharLit { text: text.clone(), span: *span, ty: TypeId::CHAR }),
        Expr::StringLit { text, span, .. } => Rc::new(Expr::StringLit { text: text.clone(), span: *span, ty: TypeId::STRING }),
        Expr::NullLit { span, .. } => Rc::new(Expr::NullLit { span: *span, ty: TypeId::NULL }),

        Expr::Paren { inner, span } => Rc::new(Expr::Paren { inner: check_expr(ctx, symbols, inner, errors), span: *span }),

        Expr::Bin { op, op_span, lhs, rhs, .. } => check_bin(ctx, symbols, *op, *op_span, lhs, rhs, errors),

        Expr::Unary { op, op_span, operand, .. } => {
            let checked = check_expr(ctx, symbols, operand, errors);
            match op {
                UnaryOp::Neg => {
                    if !is_numeric(checked.ty()) {
                        errors.push(Diagnostic::new(DiagnosticKind::UnaryNonNumericError, ctx.span_at(checked.span()), "unary '-' requires a numeric operand"));
                        return Rc::new(Expr::Unary { op: *op, op_span: *op_span, operand: checked, ty: TypeId::ERROR });
                    }
                    Rc::new(Expr::Unary { op: *op, op_span: *op_span, operand: checked, ty: TypeId::INT })
                }
                UnaryOp::Not => {
                    if !checked.ty().is_boolean() {
                        errors.push(Diagnostic::new(DiagnosticKind::UnaryNonBoolError, ctx.span_at(checked.span()), "unary '!' requires a boolean operand"));
                        return Rc::new(Expr::Unary { op: *op, op_span: *op_span, operand: checked, ty: TypeId::ERROR });
                    }
                    Rc::new(Expr::Unary { op: *op, op_span: *op_span, operand: checked, ty: TypeId::BOOL })
                }
            }
        }

        Expr::InstanceOf { lhs, check_ty, span, .. } => {
            let checked_lhs = check_expr(ctx, symbols, lhs, errors);
            let check_tid = joosc_resolve::resolve_type(check_ty, ctx.typeset, ctx.file, errors);
            if is_primitive(checked_lhs.ty()) || is_primitive(check_tid) {
                errors.push(Diagnostic::new(DiagnosticKind::InstanceOfPrimitiveError, ctx.span_at(*span), "'instanceof' cannot check a primitive type"));
                return Rc::new(Expr::InstanceOf { lhs: checked_lhs, check_ty: check_ty.clone(), span: *span, ty: TypeId::ERROR });
            }
            if !is_assignable(ctx.typeinfo, checked_lhs.ty(), check_tid) && !is_assignable(ctx.typeinfo, check_tid, checked_lhs.ty()) {
                errors.push(Diagnostic::new(DiagnosticKind::IncompatibleInstanceOfError, ctx.span_at(*span), "these types can never be related by 'instanceof'"));
                return Rc::new(Expr::InstanceOf { lhs: checked_lhs, check_ty: check_ty.clone(), span: *span, ty: TypeId::ERROR });
            }
            Rc::new(Expr::InstanceOf { lhs: checked_lhs, check_ty: check_ty.clone(), span: *span, ty: TypeId::BOOL })
        }

        Expr::ArrayIndex { base, index, span, .. } => {
            let checked_base = check_expr(ctx, symbols, base, errors);
            let checked_index = check_expr(ctx, symbols, index, errors);
            if !is_numeric(checked_index.ty()) {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_index.span()), "array index must be numeric"));
            }
            if !checked_base.ty().is_array() {
                errors.push(Diagnostic::new(DiagnosticKind::IndexNonArrayError, ctx.span_at(checked_base.span()), "cannot index a non-array value"));
                return Rc::new(Expr::ArrayIndex { base: checked_base, index: checked_index, span: *span, ty: TypeId::ERROR });
            }
            let elem_ty = checked_base.ty().element_type();
            Rc::new(Expr::ArrayIndex { base: checked_base, index: checked_index, span: *span, ty: elem_ty })
        }

        Expr::FieldDeref { base, field_name, field_span, .. } => check_field_deref(ctx, symbols, base, field_name, *field_span, errors),

        Expr::Call { callee, args, span, .. } => check_call(ctx, symbols, callee, args, *span, errors),

        Expr::Cast { target, operand, span, .. } => {
            let checked_operand = check_expr(ctx, symbols, operand, errors);
            let target_tid = joosc_resolve::resolve_type(target, ctx.typeset, ctx.file, errors);
            let operand_ty = checked_operand.ty();
            if (is_primitive(target_tid) && is_reference(operand_ty)) || (is_reference(target_tid) && is_primitive(operand_ty)) {
                errors.push(Diagnostic::new(DiagnosticKind::IncompatibleCastError, ctx.span_at(*span), "cannot cast between a primitive and a reference type"));
                return Rc::new(Expr::Cast { target: target.clone(), operand: checked_operand, span: *span, ty: TypeId::ERROR });
            }
            if !is_castable(ctx.typeinfo, target_tid, operand_ty) {
                errors.push(Diagnostic::new(DiagnosticKind::IncompatibleCastError, ctx.span_at(*span), "these types are never castable to one another"));
                return Rc::new(Expr::Cast { target: target.clone(), operand: checked_operand, span: *span, ty: TypeId::ERROR });
            }
            Rc::new(Expr::Cast { target: target.clone(), operand: checked_operand, span: *span, ty: target_tid })
        }

        Expr::NewClass { class_ty, args, span, .. } => {
            let checked_args: Vec<Rc<Expr>> = args.iter().map(|a| check_expr(ctx, symbols, a, errors)).collect();
            let class_tid = joosc_resolve::resolve_type(class_ty, ctx.typeset, ctx.file, errors);
            if class_tid.is_error() {
                return Rc::new(Expr::NewClass { class_ty: class_ty.clone(), args: checked_args, span: *span, ty: TypeId::ERROR });
            }
            if let Some(info) = ctx.typeinfo.lookup_type_info(class_tid) {
                if info.mods.has(Modifier::Abstract) {
                    errors.push(Diagnostic::new(DiagnosticKind::NewAbstractClassError, ctx.span_at(*span), "cannot instantiate an abstract class"));
                }
                let arg_types: Vec<TypeId> = checked_args.iter().map(|a| a.ty()).collect();
                resolve_method_return_type(&info.methods, ctx.typeinfo, ctx.curtype, CallContext::Constructor, &info.name, true, &arg_types, ctx.span_at(*span), errors);
            }
            Rc::new(Expr::NewClass { class_ty: class_ty.clone(), args: checked_args, span: *span, ty: class_tid })
        }

        Expr::NewArray { elem_ty, size, span, .. } => {
            let elem_tid = joosc_resolve::resolve_type(elem_ty, ctx.typeset, ctx.file, errors);
            let checked_size = size.as_ref().map(|s| check_expr(ctx, symbols, s, errors));
            if let Some(s) = &checked_size {
                if s.ty() != TypeId::INT {
                    errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(s.span()), "array size must be an int"));
                }
            }
            Rc::new(Expr::NewArray { elem_ty: elem_ty.clone(), size: checked_size, span: *span, ty: elem_tid.array_of() })
        }

        Expr::StaticRef { resolved, span } => Rc::new(Expr::StaticRef { resolved: *resolved, span: *span }),

        Expr::Const { inner, .. } => {
            // Already folded elsewhere in the pipeline; re-checking would be
            // a no-op, so just pass it through.
            Rc::new(Expr::Const { inner: inner.clone(), ty: expr.ty() })
        }
    }
}

fn check_bin(ctx: &MethodCtx, symbols: &mut SymbolTable, op: BinOp, op_span: Span, lhs: &Expr, rhs: &Expr, errors: &mut Vec<Diagnostic>) -> Rc<Expr> {
    if op == BinOp::Assign {
        return check_assign(ctx, symbols, op_span, lhs, rhs, errors);
    }

    let checked_lhs = check_expr(ctx, symbols, lhs, errors);
    let checked_rhs = check_expr(ctx, symbols, rhs, errors);
    let lty = checked_lhs.ty();
    let rty = checked_rhs.ty();

    let ty = match op {
        BinOp::And | BinOp::Or | BinOp::BitAnd | BinOp::BitOr => {
            if !lty.is_boolean() {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_lhs.span()), "operand must be boolean"));
            }
            if !rty.is_boolean() {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_rhs.span()), "operand must be boolean"));
            }
            TypeId::BOOL
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            if !is_numeric(lty) {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_lhs.span()), "operand must be numeric"));
            }
            if !is_numeric(rty) {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_rhs.span()), "operand must be numeric"));
            }
            TypeId::BOOL
        }
        BinOp::Eq | BinOp::Ne => {
            if !is_comparable(ctx.typeinfo, lty, rty) {
                errors.push(Diagnostic::new(DiagnosticKind::IncomparableTypeError, ctx.span_at(op_span), "these types can never be equal"));
            }
            TypeId::BOOL
        }
        BinOp::Add if lty == TypeId::STRING || rty == TypeId::STRING => TypeId::STRING,
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            if !is_numeric(lty) {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_lhs.span()), "operand must be numeric"));
            }
            if !is_numeric(rty) {
                errors.push(Diagnostic::new(DiagnosticKind::TypeMismatchError, ctx.span_at(checked_rhs.span()), "operand must be numeric"));
            }
            TypeId::INT
        }
        BinOp::Assign => unreachable!("handled above"),
    };

    Rc::new(Expr::Bin { op, op_span, lhs: checked_lhs, rhs: checked_rhs, ty })
}

/// Assignment is left unimplemented upstream (`// TODO: implement
/// assignment.`); weeding already restricts the LHS to a `Name`,
/// `FieldDeref`, or `ArrayIndex` (see `joosc-weed`'s assignment check), so
/// checking it is just: resolve the LHS like any other expression, then
/// require the RHS be assignable to whatever type that resolved to.
fn check_assign(ctx: &MethodCtx, symbols: &mut SymbolTable, op_span: Span, lhs: &Expr, rhs: &Expr, errors: &mut Vec<Diagnostic>) -> Rc<Expr> {
    let checked_lhs = check_expr(ctx, symbols, lhs, errors);
    let checked_rhs = check_expr(ctx, symbols, rhs, errors);
    let lty = checked_lhs.ty();
    if !lty.is_error() && !is_assignable(ctx.typeinfo, lty, checked_rhs.ty()) {
        errors.push(Diagnostic::new(DiagnosticKind::UnassignableError, ctx.span_at(checked_rhs.span()), "value is not assignable to the left-hand side's type"));
    }
    Rc::new(Expr::Bin { op: BinOp::Assign, op_span, lhs: checked_lhs, rhs: checked_rhs, ty: lty })
}

/// Resolves `name`'s first segment against locals, then the implicit `this`
/// field, then type scope — JLS-style staged resolution the original left
/// as `// TODO: Name resolution rules.` — then folds any remaining dotted
/// segments into a chain of field accesses.
fn resolve_name(ctx: &MethodCtx, symbols: &mut SymbolTable, name: &QualifiedName, errors: &mut Vec<Diagnostic>) -> Rc<Expr> {
    let first = &name.parts[0];
    let pos = ctx.span_at(name.span);

    let mut chain: Rc<Expr>;
    let mut field_ctx_for_rest;
    let mut start_idx = 1;

    if let Some((tid, _vid)) = symbols.try_resolve_local(first) {
        chain = Rc::new(Expr::Name { name: QualifiedName::single(first.clone(), name.span), ty: tid });
        field_ctx_for_rest = CallContext::Instance;
    } else if let Some(field_tid) = lookup_implicit_field(ctx, first, pos, errors) {
        let this_node = Rc::new(Expr::This { span: name.span, ty: ctx.curtype });
        chain = Rc::new(Expr::FieldDeref { base: this_node, field_name: first.clone(), field_span: name.span, ty: field_tid });
        field_ctx_for_rest = CallContext::Instance;
    } else if let Some((tid, len)) = ctx.typeset.get_prefix(&name.parts) {
        if tid.is_error() {
            return Rc::new(Expr::Name { name: name.clone(), ty: TypeId::ERROR });
        }
        if len == name.parts.len() {
            return Rc::new(Expr::StaticRef { resolved: tid, span: name.span });
        }
        chain = Rc::new(Expr::StaticRef { resolved: tid, span: name.span });
        field_ctx_for_rest = CallContext::Static;
        start_idx = len;
    } else {
        errors.push(Diagnostic::new(DiagnosticKind::UndefinedReferenceError, pos, format!("undefined reference to '{first}'")));
        return Rc::new(Expr::Name { name: name.clone(), ty: TypeId::ERROR });
    }

    for part in &name.parts[start_idx..] {
        let base_ty = chain.ty();
        if base_ty.is_error() {
            chain = Rc::new(Expr::FieldDeref { base: chain, field_name: part.clone(), field_span: name.span, ty: TypeId::ERROR });
            continue;
        }
        let Some(info) = ctx.typeinfo.lookup_type_info(base_ty) else {
            errors.push(Diagnostic::new(DiagnosticKind::UndefinedReferenceError, pos, format!("no field named '{part}'")));
            chain = Rc::new(Expr::FieldDeref { base: chain, field_name: part.clone(), field_span: name.span, ty: TypeId::ERROR });
            continue;
        };
        let field_id = info.fields.resolve_access(ctx.typeinfo, ctx.curtype, field_ctx_for_rest, part, pos, errors);
        let field_tid = if field_id.is_error() { TypeId::ERROR } else { info.fields.lookup(part).map(|f| f.field_type).unwrap_or(TypeId::ERROR) };
        chain = Rc::new(Expr::FieldDeref { base: chain, field_name: part.clone(), field_span: name.span, ty: field_tid });
        field_ctx_for_rest = CallContext::Instance;
    }

    chain
}

fn lookup_implicit_field(ctx: &MethodCtx, field_name: &str, pos: FileSpan, errors: &mut Vec<Diagnostic>) -> Option<TypeId> {
    let info = ctx.typeinfo.lookup_type_info(ctx.curtype)?;
    info.fields.lookup(field_name)?;
    let field_id = info.fields.resolve_access(ctx.typeinfo, ctx.curtype, ctx.field_ctx(), field_name, pos, errors);
    if field_id.is_error() {
        return Some(TypeId::ERROR);
    }
    info.fields.lookup(field_name).map(|f| f.field_type)
}

fn check_field_deref(ctx: &MethodCtx, symbols: &mut SymbolTable, base: &Expr, field_name: &str, field_span: Span, errors: &mut Vec<Diagnostic>) -> Rc<Expr> {
    let checked_base = check_expr(ctx, symbols, base, errors);
    let pos = ctx.span_at(field_span);

    if checked_base.ty().is_array() {
        if field_name == "length" {
            return Rc::new(Expr::FieldDeref { base: checked_base, field_name: Rc::from(field_name), field_span, ty: TypeId::INT });
        }
        errors.push(Diagnostic::new(DiagnosticKind::UndefinedReferenceError, pos, format!("arrays have no field named '{field_name}'")));
        return Rc::new(Expr::FieldDeref { base: checked_base, field_name: Rc::from(field_name), field_span, ty: TypeId::ERROR });
    }

    let (lookup_tid, access_ctx) = match checked_base.as_ref() {
        Expr::StaticRef { resolved, .. } => (*resolved, CallContext::Static),
        _ => (checked_base.ty(), CallContext::Instance),
    };

    if lookup_tid.is_error() {
        return Rc::new(Expr::FieldDeref { base: checked_base, field_name: Rc::from(field_name), field_span, ty: TypeId::ERROR });
    }

    let Some(info) = ctx.typeinfo.lookup_type_info(lookup_tid) else {
        errors.push(Diagnostic::new(DiagnosticKind::UndefinedReferenceError, pos, format!("no field named '{field_name}'")));
        return Rc::new(Expr::FieldDeref { base: checked_base, field_name: Rc::from(field_name), field_span, ty: TypeId::ERROR });
    };

    let field_id = info.fields.resolve_access(ctx.typeinfo, ctx.curtype, access_ctx, field_name, pos, errors);
    let field_tid = if field_id.is_error() { TypeId::ERROR } else { info.fields.lookup(field_name).map(|f| f.field_type).unwrap_or(TypeId::ERROR) };
    Rc::new(Expr::FieldDeref { base: checked_base, field_name: Rc::from(field_name), field_span, ty: field_tid })
}

fn check_call(ctx: &MethodCtx, symbols: &mut SymbolTable, callee: &Expr, args: &[Rc<Expr>], span: Span, errors: &mut Vec<Diagnostic>) -> Rc<Expr> {
    let checked_args: Vec<Rc<Expr>> = args.iter().map(|a| check_expr(ctx, symbols, a, errors)).collect();
    let arg_types: Vec<TypeId> = checked_args.iter().map(|a| a.ty()).collect();
    let pos = ctx.span_at(span);

    let (receiver, method_name, method_span, call_ctx): (Rc<Expr>, Rc<str>, Span, CallContext) = match callee {
        Expr::Name { name, .. } => {
            if name.parts.len() == 1 {
                (Rc::new(Expr::This { span: name.span, ty: ctx.curtype }), name.parts[0].clone(), name.span, ctx.field_ctx())
            } else {
                let prefix = QualifiedName::new(name.parts[..name.parts.len() - 1].to_vec(), name.span);
                let receiver = resolve_name(ctx, symbols, &prefix, errors);
                let call_ctx = match receiver.as_ref() {
                    Expr::StaticRef { .. } => CallContext::Static,
                    _ => CallContext::Instance,
                };
                (receiver, name.parts[name.parts.len() - 1].clone(), name.span, call_ctx)
            }
        }
        Expr::FieldDeref { base, field_name, field_span, .. } => {
            let checked_base = check_expr(ctx, symbols, base, errors);
            let call_ctx = match checked_base.as_ref() {
                Expr::StaticRef { .. } => CallContext::Static,
                _ => CallContext::Instance,
            };
            (checked_base, field_name.clone(), *field_span, call_ctx)
        }
        _ => {
            // Weeding already rejects any other callee shape (see
            // `joosc-weed`'s call check).
            (Rc::new(Expr::This { span, ty: TypeId::ERROR }), Rc::from(""), span, CallContext::Instance)
        }
    };

    let receiver_tid = match receiver.as_ref() {
        Expr::StaticRef { resolved, .. } => *resolved,
        _ => receiver.ty(),
    };

    let ty = if receiver_tid.is_error() {
        TypeId::ERROR
    } else if let Some(info) = ctx.typeinfo.lookup_type_info(receiver_tid) {
        resolve_method_return_type(&info.methods, ctx.typeinfo, ctx.curtype, call_ctx, &method_name, false, &arg_types, pos, errors)
    } else {
        TypeId::ERROR
    };

    // The callee is always rebuilt as a FieldDeref, whether written as
    // `foo()` (implicit this), `recv.foo()`, or `pkg.Type.foo()` — so a
    // later pass (IR generation) always finds an evaluatable receiver
    // expression at `callee`'s `base` instead of having to re-resolve a
    // bare dotted name itself. `callee.ty()` is the call's own result type,
    // same as every other expression.
    let rebuilt_callee = Rc::new(Expr::FieldDeref { base: receiver, field_name: method_name, field_span: method_span, ty });

    Rc::new(Expr::Call { callee: rebuilt_callee, args: checked_args, span, ty })
}

/// Resolves a syntactic [`Type`] to its `TypeId`, used wherever a member
/// (local decl, cast, `new`) names a type that isn't part of a declaration
/// already resolved during `joosc-resolve`.
pub fn resolve_type(ty: &Type, scope: &TypeSet, file: FileId, errors: &mut Vec<Diagnostic>) -> TypeId {
    joosc_resolve::resolve_type(ty, scope, file, errors)
}
