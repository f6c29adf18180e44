//! Canonical-name ↔ type-id registry, with import/package visibility.
//!
//! Two-stage construction mirrors how the rest of the pipeline builds
//! tables: a [`TypeSetBuilder`] collects every declared type across every
//! compilation unit, and [`TypeSetBuilder::build`] partitions names into
//! unique and duplicate sets, returning a base [`TypeSet`] keyed by fully
//! qualified name plus the primitives. From that base, [`TypeSet::with_package`],
//! [`TypeSet::with_imports`], and [`TypeSet::with_type`] each layer in
//! additional *short* names at their own priority (compilation-unit scope
//! beats package scope beats wildcard scope); chaining them is how a
//! compilation unit builds the one view it resolves names against.

use std::rc::Rc;

use joosc_ast::ids::TypeId;
use joosc_ast::{ImportDecl, QualifiedName};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::{FileId, FileSpan};
use rustc_hash::FxHashMap;

/// Priority a name was bound at. Lower variants win when two scopes bind
/// the same short name; `Wildcard` is the only scope where a second,
/// conflicting binding doesn't error immediately but is instead marked
/// ambiguous and only reported if it's ever actually looked up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Scope {
    CompUnit,
    Package,
    Wildcard,
}

#[derive(Clone, Copy, Debug)]
struct Binding {
    tid: TypeId,
    scope: Scope,
    ambiguous: bool,
}

/// A registry mapping (possibly qualified) names to [`TypeId`]s, scoped by
/// package and imports.
#[derive(Clone, Debug)]
pub struct TypeSet {
    /// Every fully qualified name the builder saw, plus the primitives.
    /// Never touched by a `with_*` view; this is what import resolution
    /// checks a single import's target against.
    declared: FxHashMap<String, Binding>,
    /// Declared types grouped by package, `short_name -> tid`, used to
    /// resolve sibling types and wildcard imports.
    by_package: FxHashMap<String, Vec<(Rc<str>, TypeId)>>,
    /// The names resolvable from the current scope.
    visible: FxHashMap<String, Binding>,
}

fn insert_at_scope(visible: &mut FxHashMap<String, Binding>, name: String, tid: TypeId, scope: Scope) {
    match visible.get_mut(&name) {
        None => {
            visible.insert(name, Binding { tid, scope, ambiguous: false });
        }
        Some(existing) => {
            if scope < existing.scope {
                *existing = Binding { tid, scope, ambiguous: false };
            } else if scope == existing.scope && scope == Scope::Wildcard && existing.tid != tid {
                existing.ambiguous = true;
            }
            // A lower-priority scope never overrides; ties at CompUnit or
            // Package scope are the caller's responsibility to reject
            // before calling this (see `insert_single_import`).
        }
    }
}

fn base_primitives() -> FxHashMap<String, Binding> {
    let prims = [
        ("void", TypeId::VOID),
        ("boolean", TypeId::BOOL),
        ("byte", TypeId::BYTE),
        ("char", TypeId::CHAR),
        ("short", TypeId::SHORT),
        ("int", TypeId::INT),
    ];
    prims
        .into_iter()
        .map(|(name, tid)| (name.to_string(), Binding { tid, scope: Scope::CompUnit, ambiguous: false }))
        .collect()
}

impl TypeSet {
    /// Returns the `TypeId` of the longest prefix of `parts` that names a
    /// type, along with how many parts it consumed. Used by the parser and
    /// checker to tell a field-deref from a qualified type name in a
    /// dotted expression: `a.b.c` might resolve `a.b` as a type and `c` as
    /// a static member, or resolve nothing and be a plain variable chain.
    pub fn get_prefix(&self, parts: &[Rc<str>]) -> Option<(TypeId, usize)> {
        self.lookup_prefix(parts).map(|(b, len)| (b.tid, len))
    }

    fn lookup_prefix(&self, parts: &[Rc<str>]) -> Option<(Binding, usize)> {
        debug_assert!(!parts.is_empty());
        for len in (1..=parts.len()).rev() {
            let candidate = parts[..len].iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(".");
            if let Some(binding) = self.visible.get(&candidate) {
                return Some((*binding, len));
            }
        }
        None
    }

    /// Resolves a qualified name to a type id, emitting `UnknownTypenameError`
    /// if no prefix of it names anything at all. A prefix match that
    /// doesn't cover the whole name isn't an error here — it just means
    /// `name` isn't a type (it returns [`TypeId::UNASSIGNED`]); the caller
    /// decides what to do with that.
    pub fn get(&self, name: &QualifiedName, file: FileId, errors: &mut Vec<Diagnostic>) -> TypeId {
        match self.lookup_prefix(&name.parts) {
            None => {
                errors.push(Diagnostic::new(
                    DiagnosticKind::UnknownTypenameError,
                    FileSpan::new(file, name.span),
                    format!("cannot resolve type '{}'", name.joined()),
                ));
                TypeId::ERROR
            }
            Some((binding, len)) if len == name.parts.len() => {
                if binding.ambiguous {
                    errors.push(Diagnostic::new(
                        DiagnosticKind::AmbiguousTypeError,
                        FileSpan::new(file, name.span),
                        format!("'{}' is ambiguous between multiple wildcard imports", name.joined()),
                    ));
                    return TypeId::ERROR;
                }
                binding.tid
            }
            Some(_) => TypeId::UNASSIGNED,
        }
    }

    /// Adds the short names of every type declared in the same package as
    /// compilation-unit-local unqualified names.
    pub fn with_package(&self, pkg: &str) -> TypeSet {
        let mut visible = self.visible.clone();
        if let Some(siblings) = self.by_package.get(pkg) {
            for (short, tid) in siblings {
                insert_at_scope(&mut visible, short.to_string(), *tid, Scope::Package);
            }
        }
        TypeSet { declared: self.declared.clone(), by_package: self.by_package.clone(), visible }
    }

    /// Adds `java.lang.*` implicitly, then processes each import in order.
    /// Single imports take priority over wildcards; two single imports of
    /// the same short name are an error unless they name the same type.
    pub fn with_imports(&self, imports: &[ImportDecl], file: FileId, errors: &mut Vec<Diagnostic>) -> TypeSet {
        let mut visible = self.visible.clone();
        self.insert_wildcard(&mut visible, "java.lang");
        for import in imports {
            if import.is_wildcard {
                self.insert_wildcard(&mut visible, &import.name.joined());
            } else {
                self.insert_single_import(&mut visible, import, file, errors);
            }
        }
        TypeSet { declared: self.declared.clone(), by_package: self.by_package.clone(), visible }
    }

    /// Makes the enclosing type's own short name resolvable inside its
    /// body, regardless of what package or import scope is otherwise in
    /// effect (a type can always refer to itself by its simple name).
    pub fn with_type(&self, name: &str, tid: TypeId) -> TypeSet {
        let mut visible = self.visible.clone();
        insert_at_scope(&mut visible, name.to_string(), tid, Scope::CompUnit);
        TypeSet { declared: self.declared.clone(), by_package: self.by_package.clone(), visible }
    }

    fn insert_wildcard(&self, visible: &mut FxHashMap<String, Binding>, package: &str) {
        if let Some(siblings) = self.by_package.get(package) {
            for (short, tid) in siblings {
                insert_at_scope(visible, short.to_string(), *tid, Scope::Wildcard);
            }
        }
    }

    fn insert_single_import(
        &self,
        visible: &mut FxHashMap<String, Binding>,
        import: &ImportDecl,
        file: FileId,
        errors: &mut Vec<Diagnostic>,
    ) {
        let full = import.name.joined();
        let Some(found) = self.declared.get(&full) else {
            errors.push(Diagnostic::new(
                DiagnosticKind::UnknownImportError,
                FileSpan::new(file, import.name.span),
                format!("cannot find imported type '{full}'"),
            ));
            let blacklisted = Binding { tid: TypeId::ERROR, scope: Scope::CompUnit, ambiguous: false };
            visible.insert(full, blacklisted);
            visible.insert(import.name.last().to_string(), blacklisted);
            return;
        };
        let tid = found.tid;
        let short = import.name.last().to_string();
        if let Some(existing) = visible.get(&short) {
            if existing.scope == Scope::CompUnit && existing.tid != tid {
                errors.push(Diagnostic::new(
                    DiagnosticKind::DuplicateCompUnitNames,
                    FileSpan::new(file, import.name.span),
                    format!("'{short}' is imported from two different types"),
                ));
                visible.insert(short, Binding { tid: TypeId::ERROR, scope: Scope::CompUnit, ambiguous: false });
                return;
            }
        }
        insert_at_scope(visible, short, tid, Scope::CompUnit);
    }
}

struct Entry {
    fq: String,
    package_parts: Vec<Rc<str>>,
    short_name: Rc<str>,
    pos: FileSpan,
}

/// Accepts `(package_parts, short_name, name_position)` triples for every
/// type declared anywhere in the program, then [`build`](Self::build)s the
/// base [`TypeSet`] every compilation unit derives its scoped view from.
#[derive(Default)]
pub struct TypeSetBuilder {
    entries: Vec<Entry>,
}

impl TypeSetBuilder {
    pub fn new() -> Self {
        TypeSetBuilder::default()
    }

    pub fn put(&mut self, package_parts: &[Rc<str>], short_name: Rc<str>, name_pos: FileSpan) {
        let mut fq = String::new();
        for part in package_parts {
            fq.push_str(part);
            fq.push('.');
        }
        fq.push_str(&short_name);
        self.entries.push(Entry { fq, package_parts: package_parts.to_vec(), short_name, pos: name_pos });
    }

    /// Partitions names into unique and duplicate sets. Duplicates are
    /// reported with every one of their positions and enter the returned
    /// `TypeSet` as an `error` binding, so later resolutions of that name
    /// return `error` silently instead of re-reporting.
    pub fn build(self, errors: &mut Vec<Diagnostic>) -> TypeSet {
        let mut by_fq: std::collections::BTreeMap<String, Vec<&Entry>> = std::collections::BTreeMap::new();
        for entry in &self.entries {
            by_fq.entry(entry.fq.clone()).or_default().push(entry);
        }

        let mut declared = base_primitives();
        let mut by_package: FxHashMap<String, Vec<(Rc<str>, TypeId)>> = FxHashMap::default();
        let mut next_base = TypeId::FIRST_USER_BASE;

        for (fq, group) in &by_fq {
            if group.len() == 1 {
                let tid = TypeId::new(next_base, 0);
                next_base += 1;
                declared.insert(fq.clone(), Binding { tid, scope: Scope::CompUnit, ambiguous: false });

                let entry = group[0];
                let pkg_key = entry.package_parts.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(".");
                by_package.entry(pkg_key).or_default().push((entry.short_name.clone(), tid));
                continue;
            }

            let mut iter = group.iter();
            let first = iter.next().expect("grouped entries are never empty");
            let mut diag = Diagnostic::new(
                DiagnosticKind::TypeDuplicateDefinitionError,
                first.pos,
                format!("type '{fq}' was declared multiple times"),
            );
            for dup in iter {
                diag = diag.with_note(dup.pos, "also declared here");
            }
            errors.push(diag);
            declared.insert(fq.clone(), Binding { tid: TypeId::ERROR, scope: Scope::CompUnit, ambiguous: false });
        }

        TypeSet { visible: declared.clone(), declared, by_package }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_common::span::Span;

    fn pos(start: u32, end: u32) -> FileSpan {
        FileSpan::new(FileId(0), Span::new(start, end))
    }

    fn name(parts: &[&str]) -> QualifiedName {
        QualifiedName::new(parts.iter().map(|p| Rc::from(*p)).collect(), Span::at(0))
    }

    #[test]
    fn resolves_a_unique_declared_type() {
        let mut builder = TypeSetBuilder::new();
        builder.put(&[Rc::from("shapes")], Rc::from("Square"), pos(0, 6));
        let mut errors = Vec::new();
        let ts = builder.build(&mut errors);
        assert!(errors.is_empty());

        let tid = ts.get(&name(&["shapes", "Square"]), FileId(0), &mut errors);
        assert!(errors.is_empty());
        assert!(tid.is_reference());
    }

    #[test]
    fn duplicate_names_are_blacklisted_with_every_position_noted() {
        let mut builder = TypeSetBuilder::new();
        builder.put(&[], Rc::from("Foo"), pos(0, 3));
        builder.put(&[], Rc::from("Foo"), pos(10, 13));
        let mut errors = Vec::new();
        let ts = builder.build(&mut errors);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::TypeDuplicateDefinitionError);
        assert_eq!(errors[0].notes.len(), 1);

        let mut lookup_errors = Vec::new();
        let tid = ts.get(&name(&["Foo"]), FileId(0), &mut lookup_errors);
        assert!(lookup_errors.is_empty(), "blacklisted names resolve to error silently");
        assert_eq!(tid, TypeId::ERROR);
    }

    #[test]
    fn with_package_exposes_sibling_short_names() {
        let mut builder = TypeSetBuilder::new();
        builder.put(&[Rc::from("shapes")], Rc::from("Square"), pos(0, 6));
        builder.put(&[Rc::from("shapes")], Rc::from("Circle"), pos(10, 16));
        let mut errors = Vec::new();
        let base = builder.build(&mut errors);

        let scoped = base.with_package("shapes");
        let tid = scoped.get(&name(&["Circle"]), FileId(0), &mut errors);
        assert!(errors.is_empty());
        assert!(tid.is_reference());
    }

    #[test]
    fn unknown_import_is_blacklisted_not_fatal_twice() {
        let builder = TypeSetBuilder::new();
        let mut errors = Vec::new();
        let base = builder.build(&mut errors);
        let import = ImportDecl { name: name(&["com", "example", "Missing"]), is_wildcard: false };

        let scoped = base.with_imports(std::slice::from_ref(&import), FileId(0), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::UnknownImportError);

        let mut lookup_errors = Vec::new();
        let tid = scoped.get(&name(&["Missing"]), FileId(0), &mut lookup_errors);
        assert_eq!(tid, TypeId::ERROR);
        assert!(lookup_errors.is_empty());
    }

    #[test]
    fn conflicting_single_imports_of_the_same_short_name_are_an_error() {
        let mut builder = TypeSetBuilder::new();
        builder.put(&[Rc::from("a")], Rc::from("Widget"), pos(0, 6));
        builder.put(&[Rc::from("b")], Rc::from("Widget"), pos(10, 16));
        let mut errors = Vec::new();
        let base = builder.build(&mut errors);
        assert!(errors.is_empty());

        let imports = vec![
            ImportDecl { name: name(&["a", "Widget"]), is_wildcard: false },
            ImportDecl { name: name(&["b", "Widget"]), is_wildcard: false },
        ];
        let mut import_errors = Vec::new();
        base.with_imports(&imports, FileId(0), &mut import_errors);
        assert!(import_errors.iter().any(|e| e.kind == DiagnosticKind::DuplicateCompUnitNames));
    }

    #[test]
    fn ambiguous_wildcard_import_errors_only_on_use() {
        let mut builder = TypeSetBuilder::new();
        builder.put(&[Rc::from("a")], Rc::from("Widget"), pos(0, 6));
        builder.put(&[Rc::from("b")], Rc::from("Widget"), pos(10, 16));
        let mut errors = Vec::new();
        let base = builder.build(&mut errors);

        let imports =
            vec![ImportDecl { name: name(&["a"]), is_wildcard: true }, ImportDecl { name: name(&["b"]), is_wildcard: true }];
        let scoped = base.with_imports(&imports, FileId(0), &mut errors);
        assert!(errors.is_empty(), "ambiguity alone must not be reported");

        let tid = scoped.get(&name(&["Widget"]), FileId(0), &mut errors);
        assert_eq!(tid, TypeId::ERROR);
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::AmbiguousTypeError));
    }

    #[test]
    fn get_prefix_returns_the_longest_matching_prefix() {
        let mut builder = TypeSetBuilder::new();
        builder.put(&[Rc::from("shapes")], Rc::from("Square"), pos(0, 6));
        let mut errors = Vec::new();
        let ts = builder.build(&mut errors);

        let parts: Vec<Rc<str>> = vec![Rc::from("shapes"), Rc::from("Square"), Rc::from("SIDE")];
        let (tid, len) = ts.get_prefix(&parts).expect("shapes.Square should resolve");
        assert_eq!(len, 2);
        assert!(tid.is_reference());
    }
}
