//! Rewrites a parsed [`Program`] into one with every [`TypeDecl::ty`] filled
//! in and every type/field/method registered with a [`TypeInfoMapBuilder`].
//!
//! One compilation unit at a time: derive its scoped [`TypeSet`] (package
//! siblings, then imports), resolve each declared type's own id out of that
//! scope, resolve its parents and members against a further-scoped view that
//! also exposes the type's own short name, and register everything with the
//! builder. A type whose own name fails to resolve (a duplicate declaration,
//! caught earlier by [`TypeSetBuilder`](joosc_types::TypeSetBuilder)) is
//! pruned from its `CompUnit` rather than carried forward broken.

use std::rc::Rc;

use joosc_ast::ids::TypeId;
use joosc_ast::{CompUnit, MemberDecl, Program, QualifiedName, Type, TypeDecl};
use joosc_common::diagnostics::Diagnostic;
use joosc_common::span::FileId;
use joosc_types::type_info_map::MethodSignature;
use joosc_types::{TypeInfoMapBuilder, TypeSet};
use rustc_hash::FxHashMap;

/// The output of resolving a whole program: the rewritten tree, the builder
/// (still needing [`TypeInfoMapBuilder::build`]), and each compilation
/// unit's package-and-imports-scoped `TypeSet`, which later passes re-derive
/// a per-type view from via `with_type`.
pub struct DeclResolution {
    pub program: Program,
    pub builder: TypeInfoMapBuilder,
    pub unit_typesets: FxHashMap<FileId, TypeSet>,
}

pub fn resolve_program(
    program: &Program,
    base_typeset: &TypeSet,
    mut builder: TypeInfoMapBuilder,
    errors: &mut Vec<Diagnostic>,
) -> DeclResolution {
    let mut unit_typesets = FxHashMap::default();
    let mut comp_units = Vec::with_capacity(program.comp_units.len());

    for unit in &program.comp_units {
        let scoped = base_typeset.with_package(&package_str(unit)).with_imports(&unit.imports, unit.file, errors);

        let mut kept_types = Vec::with_capacity(unit.types.len());
        for type_decl in &unit.types {
            if let Some(resolved) = resolve_type_decl(unit, type_decl, &scoped, &mut builder, errors) {
                kept_types.push(Rc::new(resolved));
            }
        }

        unit_typesets.insert(unit.file, scoped);
        comp_units.push(Rc::new(CompUnit {
            file: unit.file,
            package: unit.package.clone(),
            imports: unit.imports.clone(),
            types: kept_types,
        }));
    }

    DeclResolution { program: Program { comp_units }, builder, unit_typesets }
}

fn package_str(unit: &CompUnit) -> String {
    unit.package.as_ref().map(|p| p.joined()).unwrap_or_default()
}

fn resolve_type_decl(
    unit: &CompUnit,
    type_decl: &TypeDecl,
    scoped: &TypeSet,
    builder: &mut TypeInfoMapBuilder,
    errors: &mut Vec<Diagnostic>,
) -> Option<TypeDecl> {
    let self_name = qualified_self_name(&unit.package, &type_decl.name, type_decl.name_span);
    let curtid = match scoped.get_prefix(&self_name.parts) {
        Some((tid, len)) if len == self_name.parts.len() => tid,
        _ => return None,
    };
    if curtid.is_error() {
        return None;
    }

    let inner_scope = scoped.with_type(&type_decl.name, curtid);

    let extends: Vec<(TypeId, _)> = type_decl
        .extends
        .iter()
        .filter_map(|name| {
            let tid = inner_scope.get(name, unit.file, errors);
            (!tid.is_error()).then_some((tid, joosc_common::span::FileSpan::new(unit.file, name.span)))
        })
        .collect();
    let implements: Vec<(TypeId, _)> = type_decl
        .implements
        .iter()
        .filter_map(|name| {
            let tid = inner_scope.get(name, unit.file, errors);
            (!tid.is_error()).then_some((tid, joosc_common::span::FileSpan::new(unit.file, name.span)))
        })
        .collect();

    builder.put_type(
        curtid,
        type_decl.mods.clone(),
        type_decl.kind,
        type_decl.name.clone(),
        Rc::from(package_str(unit)),
        joosc_common::span::FileSpan::new(unit.file, type_decl.name_span),
        extends,
        implements,
    );

    let mut kept_members = Vec::with_capacity(type_decl.members.len());
    for member in &type_decl.members {
        match member {
            MemberDecl::Field(field) => {
                let field_tid = resolve_type(&field.ty, &inner_scope, unit.file, errors);
                if field_tid.is_error() {
                    continue;
                }
                builder.put_field(
                    curtid,
                    field.mods.clone(),
                    field.name.clone(),
                    field_tid,
                    joosc_common::span::FileSpan::new(unit.file, field.name_span),
                );
                kept_members.push(MemberDecl::Field(field.clone()));
            }
            MemberDecl::Method(method) => {
                let is_constructor = method.is_constructor();
                let ret_tid = if is_constructor {
                    curtid
                } else {
                    resolve_type(method.ret_ty.as_ref().expect("non-constructor has a return type"), &inner_scope, unit.file, errors)
                };
                if ret_tid.is_error() {
                    continue;
                }

                let mut param_types = Vec::with_capacity(method.params.len());
                let mut params_ok = true;
                for param in &method.params {
                    let ptid = resolve_type(&param.ty, &inner_scope, unit.file, errors);
                    if ptid.is_error() {
                        params_ok = false;
                        break;
                    }
                    param_types.push(ptid);
                }
                if !params_ok {
                    continue;
                }

                let sig = MethodSignature::new(is_constructor, method.name.clone(), param_types);
                builder.put_method(
                    curtid,
                    method.mods.clone(),
                    sig,
                    ret_tid,
                    joosc_common::span::FileSpan::new(unit.file, method.name_span),
                    method.body.is_some(),
                );
                kept_members.push(MemberDecl::Method(method.clone()));
            }
        }
    }

    Some(TypeDecl {
        mods: type_decl.mods.clone(),
        kind: type_decl.kind,
        name: type_decl.name.clone(),
        name_span: type_decl.name_span,
        extends: type_decl.extends.clone(),
        implements: type_decl.implements.clone(),
        members: kept_members,
        ty: curtid,
    })
}

fn qualified_self_name(package: &Option<QualifiedName>, name: &Rc<str>, span: joosc_common::span::Span) -> QualifiedName {
    let mut parts: Vec<Rc<str>> = package.as_ref().map(|p| p.parts.clone()).unwrap_or_default();
    parts.push(name.clone());
    QualifiedName::new(parts, span)
}

/// Resolves a syntactic [`Type`] against a scope. Primitives and `void`
/// resolve without lookup; a `Reference` resolves its name through the
/// scope; an `Array` resolves its element type and bumps the dimension.
pub fn resolve_type(ty: &Type, scope: &TypeSet, file: FileId, errors: &mut Vec<Diagnostic>) -> TypeId {
    match ty {
        Type::Primitive { kind, .. } => kind.type_id(),
        Type::Void { .. } => TypeId::VOID,
        Type::Reference { name } => scope.get(name, file, errors),
        Type::Array { elem, .. } => {
            let elem_tid = resolve_type(elem, scope, file, errors);
            if elem_tid.is_error() {
                TypeId::ERROR
            } else {
                elem_tid.array_of()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_ast::ids::MethodId;
    use joosc_ast::{ImportDecl, TypeKind};
    use joosc_common::span::Span;
    use joosc_types::TypeSetBuilder;

    fn span(n: u32) -> Span {
        Span::at(n)
    }

    fn comp_unit(file: FileId, package: Option<&str>, type_decl: TypeDecl) -> CompUnit {
        CompUnit {
            file,
            package: package.map(|p| QualifiedName::single(Rc::from(p), span(0))),
            imports: Vec::<ImportDecl>::new(),
            types: vec![Rc::new(type_decl)],
        }
    }

    fn base_type_decl(name: &str) -> TypeDecl {
        TypeDecl {
            mods: joosc_ast::ModifierList::new(),
            kind: TypeKind::Class,
            name: Rc::from(name),
            name_span: span(0),
            extends: vec![],
            implements: vec![],
            members: vec![],
            ty: TypeId::UNASSIGNED,
        }
    }

    #[test]
    fn resolves_a_simple_class_and_assigns_its_type_id() {
        let mut set_errors = Vec::new();
        let mut set_builder = TypeSetBuilder::new();
        set_builder.put(&[], Rc::from("Foo"), joosc_common::span::FileSpan::new(FileId(0), span(0)));
        let base = set_builder.build(&mut set_errors);
        assert!(set_errors.is_empty());

        let unit = comp_unit(FileId(0), None, base_type_decl("Foo"));
        let program = Program { comp_units: vec![Rc::new(unit)] };

        let object = TypeId::new(TypeId::FIRST_USER_BASE + 100, 0);
        let builder = TypeInfoMapBuilder::new(object, object, object, object);

        let mut errors = Vec::new();
        let resolution = resolve_program(&program, &base, builder, &mut errors);
        assert!(errors.is_empty());

        let resolved_unit = &resolution.program.comp_units[0];
        assert_eq!(resolved_unit.types.len(), 1);
        assert!(!resolved_unit.types[0].ty.is_error());
        assert!(!resolved_unit.types[0].ty.is_unassigned());
    }

    #[test]
    fn method_signatures_are_registered_with_the_builder() {
        let mut set_errors = Vec::new();
        let mut set_builder = TypeSetBuilder::new();
        set_builder.put(&[], Rc::from("Foo"), joosc_common::span::FileSpan::new(FileId(0), span(0)));
        let base = set_builder.build(&mut set_errors);

        let mut type_decl = base_type_decl("Foo");
        type_decl.members.push(MemberDecl::Method(joosc_ast::MethodDecl {
            mods: joosc_ast::ModifierList::new(),
            ret_ty: Some(Rc::new(Type::Void { span: span(0) })),
            name: Rc::from("run"),
            name_span: span(1),
            params: vec![],
            body: Some(Rc::new(joosc_ast::Stmt::Block { stmts: vec![], span: span(0) })),
        }));

        let unit = comp_unit(FileId(0), None, type_decl);
        let program = Program { comp_units: vec![Rc::new(unit)] };

        let object = TypeId::new(TypeId::FIRST_USER_BASE + 100, 0);
        let builder = TypeInfoMapBuilder::new(object, object, object, object);

        let mut errors = Vec::new();
        let resolution = resolve_program(&program, &base, builder, &mut errors);
        assert!(errors.is_empty());

        let map = resolution.builder.build(&mut errors);
        let foo_tid = resolution.program.comp_units[0].types[0].ty;
        let info = map.lookup_type_info(foo_tid).unwrap();
        let sig = MethodSignature::new(false, Rc::from("run"), vec![]);
        assert_ne!(info.methods.lookup(&sig).map(|m| m.id), None);
        assert_ne!(info.methods.lookup(&sig).map(|m| m.id), Some(MethodId::ERROR));
    }
}
