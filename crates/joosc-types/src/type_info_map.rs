//! Per-type inherited member tables: the `extends`/`implements` graph
//! validated and flattened into one [`MethodTable`]/[`FieldTable`] per
//! type, in topological order, with [`TypeInfoMap::is_ancestor`] memoized
//! on top.
//!
//! Construction is [`TypeInfoMapBuilder`]'s six-step
//! [`TypeInfoMapBuilder::build`]: collect raw entries, validate the
//! inheritance graph (structural rules, then cycles), wire in the implicit
//! edges every class and array type gets for free, assign a reverse
//! topological order, synthesize each type's member tables by merging
//! parent tables in that order, and finally answer ancestry queries off the
//! finished graph.

use std::cell::RefCell;
use std::rc::Rc;

use joosc_ast::ids::{FieldId, MethodId, TypeId};
use joosc_ast::{Modifier, ModifierList, TypeKind};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::limits::MAX_TYPE_HIERARCHY_DEPTH;
use joosc_common::span::FileSpan;
use rustc_hash::{FxHashMap, FxHashSet};

/// The syntactic position a call or access appears in, which constrains
/// which methods/fields it may bind to (an instance method can't be called
/// through a static receiver and vice versa).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallContext {
    Instance,
    Constructor,
    Static,
}

/// Identity of a method independent of its return type: constructor-ness,
/// name, and parameter types. Two methods with the same signature but
/// different return types are a `DifferingReturnTypeError`, not an
/// overload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSignature {
    pub is_constructor: bool,
    pub name: Rc<str>,
    pub param_types: Vec<TypeId>,
}

impl MethodSignature {
    pub fn new(is_constructor: bool, name: Rc<str>, param_types: Vec<TypeId>) -> Self {
        MethodSignature { is_constructor, name, param_types }
    }
}

#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub id: MethodId,
    pub class_type: TypeId,
    pub mods: ModifierList,
    pub return_type: TypeId,
    pub pos: FileSpan,
    pub signature: MethodSignature,
    /// Whether the declaration carries a body. `false` for abstract and
    /// interface methods, which are declared with a trailing `;` instead.
    pub has_body: bool,
}

/// Whether `mods` (declared on `declaring_class`) is reachable from
/// `caller_tid`: public and package-private access are left to whatever
/// already gated the lookup, but a `protected` member is only visible to
/// the same package or a subclass of the declaring class.
fn permission_denied(typeinfo: &TypeInfoMap, caller_tid: TypeId, declaring_class: TypeId, mods: &ModifierList) -> bool {
    if !mods.has(Modifier::Protected) {
        return false;
    }
    let same_package = match (typeinfo.lookup_type_info(caller_tid), typeinfo.lookup_type_info(declaring_class)) {
        (Some(caller), Some(owner)) => caller.package == owner.package,
        _ => true,
    };
    if same_package {
        return false;
    }
    !typeinfo.is_ancestor(declaring_class, caller_tid)
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub id: FieldId,
    pub class_type: TypeId,
    pub mods: ModifierList,
    pub field_type: TypeId,
    pub pos: FileSpan,
    pub name: Rc<str>,
}

/// A type's fully merged method set: its own declarations plus whatever it
/// inherits from its parents, with overrides already resolved. Built once
/// per type during [`TypeInfoMapBuilder::build`]'s synthesis step and never
/// mutated afterward.
#[derive(Clone, Debug, Default)]
pub struct MethodTable {
    by_signature: FxHashMap<MethodSignature, MethodInfo>,
    by_id: FxHashMap<MethodId, MethodInfo>,
    /// Names that resolve to `error` regardless of arity/argument types,
    /// because the owning type itself is invalid. Keeps one bad
    /// declaration from cascading into a wall of "undefined method" errors
    /// at every call site.
    all_blacklisted: bool,
}

impl MethodTable {
    fn all_blacklisted() -> Self {
        MethodTable { all_blacklisted: true, ..Default::default() }
    }

    fn insert(&mut self, info: MethodInfo) {
        self.by_id.insert(info.id, info.clone());
        self.by_signature.insert(info.signature.clone(), info);
    }

    pub fn lookup_by_id(&self, id: MethodId) -> Option<&MethodInfo> {
        self.by_id.get(&id)
    }

    pub fn lookup(&self, sig: &MethodSignature) -> Option<&MethodInfo> {
        self.by_signature.get(sig)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.by_id.values()
    }

    /// Whether this table belongs to a type that failed graph validation;
    /// every name resolves to `error` silently rather than cascading.
    pub fn is_blacklisted(&self) -> bool {
        self.all_blacklisted
    }

    /// Resolves a call by signature, applying context rules on top of plain
    /// lookup. Returns [`MethodId::ERROR`] and pushes a diagnostic on any
    /// failure; a type that's already entirely blacklisted fails silently.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve_call(
        &self,
        typeinfo: &TypeInfoMap,
        caller_tid: TypeId,
        ctx: CallContext,
        sig: &MethodSignature,
        pos: FileSpan,
        errors: &mut Vec<Diagnostic>,
    ) -> MethodId {
        if self.all_blacklisted {
            return MethodId::ERROR;
        }
        let Some(info) = self.lookup(sig) else {
            errors.push(Diagnostic::new(
                DiagnosticKind::UndefinedMethodError,
                pos,
                format!("no method '{}' with this signature", sig.name),
            ));
            return MethodId::ERROR;
        };
        let is_static = info.mods.has(Modifier::Static);
        match (ctx, is_static) {
            (CallContext::Static, false) => {
                errors.push(Diagnostic::new(
                    DiagnosticKind::InstanceMethodOnStaticError,
                    pos,
                    format!("'{}' is an instance method", sig.name),
                ));
                MethodId::ERROR
            }
            (CallContext::Instance, true) => {
                errors.push(Diagnostic::new(
                    DiagnosticKind::StaticMethodOnInstanceError,
                    pos,
                    format!("'{}' is static; call it through the type instead", sig.name),
                ));
                MethodId::ERROR
            }
            _ if permission_denied(typeinfo, caller_tid, info.class_type, &info.mods) => {
                errors.push(
                    Diagnostic::new(DiagnosticKind::PermissionError, pos, format!("'{}' is protected and not accessible here", sig.name))
                        .with_note(info.pos, format!("'{}' is declared here", sig.name)),
                );
                MethodId::ERROR
            }
            _ => info.id,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FieldTable {
    by_name: FxHashMap<Rc<str>, FieldInfo>,
    by_id: FxHashMap<FieldId, FieldInfo>,
    all_blacklisted: bool,
}

impl FieldTable {
    fn all_blacklisted() -> Self {
        FieldTable { all_blacklisted: true, ..Default::default() }
    }

    fn insert(&mut self, info: FieldInfo) {
        self.by_id.insert(info.id, info.clone());
        self.by_name.insert(info.name.clone(), info);
    }

    pub fn lookup_by_id(&self, id: FieldId) -> Option<&FieldInfo> {
        self.by_id.get(&id)
    }

    pub fn lookup(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_id.values()
    }

    pub fn is_blacklisted(&self) -> bool {
        self.all_blacklisted
    }

    #[allow(clippy::too_many_arguments)]
    pub fn resolve_access(
        &self,
        typeinfo: &TypeInfoMap,
        caller_tid: TypeId,
        ctx: CallContext,
        name: &str,
        pos: FileSpan,
        errors: &mut Vec<Diagnostic>,
    ) -> FieldId {
        if self.all_blacklisted {
            return FieldId::ERROR;
        }
        let Some(info) = self.lookup(name) else {
            errors.push(Diagnostic::new(
                DiagnosticKind::UndefinedReferenceError,
                pos,
                format!("no field named '{name}'"),
            ));
            return FieldId::ERROR;
        };
        let is_static = info.mods.has(Modifier::Static);
        match (ctx, is_static) {
            (CallContext::Static, false) => {
                errors.push(Diagnostic::new(
                    DiagnosticKind::InstanceFieldOnStaticError,
                    pos,
                    format!("'{name}' is an instance field"),
                ));
                FieldId::ERROR
            }
            (CallContext::Instance, true) => {
                errors.push(Diagnostic::new(
                    DiagnosticKind::StaticFieldOnInstanceError,
                    pos,
                    format!("'{name}' is static; access it through the type instead"),
                ));
                FieldId::ERROR
            }
            _ if permission_denied(typeinfo, caller_tid, info.class_type, &info.mods) => {
                errors.push(
                    Diagnostic::new(DiagnosticKind::PermissionError, pos, format!("'{name}' is protected and not accessible here"))
                        .with_note(info.pos, format!("'{name}' is declared here")),
                );
                FieldId::ERROR
            }
            _ => info.id,
        }
    }
}

/// One type's fully resolved shape: its declared shell (modifiers, kind,
/// name, package, parents) plus its merged member tables and its place in
/// the reverse topological order (`Object` is always `0`).
#[derive(Clone, Debug)]
pub struct TypeInfo {
    pub mods: ModifierList,
    pub kind: TypeKind,
    pub type_id: TypeId,
    pub name: Rc<str>,
    pub package: Rc<str>,
    pub pos: FileSpan,
    pub extends: Vec<TypeId>,
    pub implements: Vec<TypeId>,
    pub methods: MethodTable,
    pub fields: FieldTable,
    pub top_sort_index: u64,
    /// Set for types that failed graph validation (a structural cycle, an
    /// illegal extends/implements kind). Their member tables are
    /// all-blacklisted so downstream errors don't cascade.
    pub is_bad: bool,
}

/// The finished registry: every declared type's [`TypeInfo`], plus ancestry
/// queries memoized on top of the now-acyclic graph.
pub struct TypeInfoMap {
    types: FxHashMap<TypeId, TypeInfo>,
    /// Every array `TypeId` (`ndims > 0`) shares this one synthetic entry,
    /// mirroring how the original compiler represents `T[]` as implementing
    /// `Serializable`/`Cloneable` and extending `Object` without a distinct
    /// `TypeInfo` per element type.
    array_tid: TypeId,
    ancestor_cache: RefCell<FxHashMap<(TypeId, TypeId), bool>>,
}

impl TypeInfoMap {
    /// Redirects any array type to the shared synthetic array `TypeInfo`
    /// before lookup, since arrays of different element types all share one
    /// entry.
    pub fn lookup_type_info(&self, tid: TypeId) -> Option<&TypeInfo> {
        let tid = if tid.is_array() { self.array_tid } else { tid };
        self.types.get(&tid)
    }

    pub fn lookup_type_name(&self, tid: TypeId) -> Option<&str> {
        self.lookup_type_info(tid).map(|info| &*info.name)
    }

    pub fn type_map(&self) -> &FxHashMap<TypeId, TypeInfo> {
        &self.types
    }

    /// Whether `ancestor` is `descendant` itself or a transitive
    /// extends/implements parent of it. Memoized since the checker asks
    /// this question repeatedly for the same pairs across a compilation
    /// unit (every assignment and cast checks it).
    pub fn is_ancestor(&self, ancestor: TypeId, descendant: TypeId) -> bool {
        if ancestor == descendant {
            return true;
        }
        if let Some(hit) = self.ancestor_cache.borrow().get(&(ancestor, descendant)) {
            return *hit;
        }
        let result = self.is_ancestor_uncached(ancestor, descendant, 0);
        self.ancestor_cache.borrow_mut().insert((ancestor, descendant), result);
        result
    }

    fn is_ancestor_uncached(&self, ancestor: TypeId, descendant: TypeId, depth: usize) -> bool {
        if depth > MAX_TYPE_HIERARCHY_DEPTH {
            return false;
        }
        let Some(info) = self.lookup_type_info(descendant) else {
            return false;
        };
        info.extends
            .iter()
            .chain(info.implements.iter())
            .any(|&parent| parent == ancestor || self.is_ancestor(ancestor, parent))
    }
}

struct RawType {
    mods: ModifierList,
    kind: TypeKind,
    name: Rc<str>,
    package: Rc<str>,
    pos: FileSpan,
    extends: Vec<(TypeId, FileSpan)>,
    implements: Vec<(TypeId, FileSpan)>,
}

/// Collects raw type/method/field declarations across every compilation
/// unit, then [`build`](Self::build)s the validated, topologically ordered
/// [`TypeInfoMap`].
pub struct TypeInfoMapBuilder {
    object_tid: TypeId,
    serializable_tid: TypeId,
    cloneable_tid: TypeId,
    array_tid: TypeId,
    types: FxHashMap<TypeId, RawType>,
    methods: FxHashMap<TypeId, Vec<(MethodId, ModifierList, MethodSignature, TypeId, FileSpan, bool)>>,
    fields: FxHashMap<TypeId, Vec<(FieldId, ModifierList, Rc<str>, TypeId, FileSpan)>>,
    next_method_id: u32,
    next_field_id: u32,
}

impl TypeInfoMapBuilder {
    /// `array_tid` is the reserved id the binder sets aside for the
    /// synthetic pseudo-type every array shares; the other three identify
    /// the well-known types array synthesis and implicit-`Object`-extends
    /// wire in.
    pub fn new(object_tid: TypeId, serializable_tid: TypeId, cloneable_tid: TypeId, array_tid: TypeId) -> Self {
        TypeInfoMapBuilder {
            object_tid,
            serializable_tid,
            cloneable_tid,
            array_tid,
            types: FxHashMap::default(),
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
            next_method_id: MethodId::FIRST_VALID,
            next_field_id: FieldId::FIRST_VALID,
        }
    }

    /// Registers a type's shell. `extends`/`implements` entries naming
    /// [`TypeId::ERROR`] are dropped silently — that parent failed to
    /// resolve already and was reported there.
    #[allow(clippy::too_many_arguments)]
    pub fn put_type(
        &mut self,
        tid: TypeId,
        mods: ModifierList,
        kind: TypeKind,
        name: Rc<str>,
        package: Rc<str>,
        pos: FileSpan,
        extends: Vec<(TypeId, FileSpan)>,
        implements: Vec<(TypeId, FileSpan)>,
    ) {
        let extends = extends.into_iter().filter(|(t, _)| !t.is_error()).collect();
        let implements = implements.into_iter().filter(|(t, _)| !t.is_error()).collect();
        self.types.insert(tid, RawType { mods, kind, name, package, pos, extends, implements });
    }

    /// Registers a method on `owner`. Returns the freshly allocated
    /// [`MethodId`], so the caller (the binder) can stamp it into the AST's
    /// method declaration node.
    #[allow(clippy::too_many_arguments)]
    pub fn put_method(
        &mut self,
        owner: TypeId,
        mods: ModifierList,
        sig: MethodSignature,
        return_type: TypeId,
        pos: FileSpan,
        has_body: bool,
    ) -> MethodId {
        let id = MethodId(self.next_method_id);
        self.next_method_id += 1;
        self.methods.entry(owner).or_default().push((id, mods, sig, return_type, pos, has_body));
        id
    }

    pub fn put_field(&mut self, owner: TypeId, mods: ModifierList, name: Rc<str>, field_type: TypeId, pos: FileSpan) -> FieldId {
        let id = FieldId(self.next_field_id);
        self.next_field_id += 1;
        self.fields.entry(owner).or_default().push((id, mods, name, field_type, pos));
        id
    }

    pub fn build(mut self, errors: &mut Vec<Diagnostic>) -> TypeInfoMap {
        self.insert_array_pseudo_type();

        let mut bad: FxHashSet<TypeId> = FxHashSet::default();
        self.validate_structure(&mut bad, errors);
        self.detect_cycles(&mut bad, errors);
        self.introduce_implicit_edges(&bad);

        let order = self.topological_order();

        let mut types = FxHashMap::default();
        // Method/field ids were allocated in declaration order above; here
        // we re-walk in topological order so a parent's merged table always
        // exists before a child needs to merge it in.
        let mut merged_methods: FxHashMap<TypeId, MethodTable> = FxHashMap::default();
        let mut merged_fields: FxHashMap<TypeId, FieldTable> = FxHashMap::default();

        for (tid, top_sort_index) in &order {
            let raw = self.types.get(tid).expect("ordered id must be a known type");
            let is_bad = bad.contains(tid);

            let methods = if is_bad {
                MethodTable::all_blacklisted()
            } else {
                self.build_method_table(*tid, raw, &merged_methods, errors)
            };
            let fields = if is_bad {
                FieldTable::all_blacklisted()
            } else {
                self.build_field_table(*tid, raw, &merged_fields, errors)
            };

            merged_methods.insert(*tid, methods.clone());
            merged_fields.insert(*tid, fields.clone());

            types.insert(
                *tid,
                TypeInfo {
                    mods: raw.mods.clone(),
                    kind: raw.kind,
                    type_id: *tid,
                    name: raw.name.clone(),
                    package: raw.package.clone(),
                    pos: raw.pos,
                    extends: raw.extends.iter().map(|(t, _)| *t).collect(),
                    implements: raw.implements.iter().map(|(t, _)| *t).collect(),
                    methods,
                    fields,
                    top_sort_index: *top_sort_index,
                    is_bad,
                },
            );
        }

        TypeInfoMap { types, array_tid: self.array_tid, ancestor_cache: RefCell::new(FxHashMap::default()) }
    }

    fn insert_array_pseudo_type(&mut self) {
        self.types.insert(
            self.array_tid,
            RawType {
                mods: ModifierList::new(),
                kind: TypeKind::Class,
                name: Rc::from("array"),
                package: Rc::from(""),
                pos: FileSpan::new(Default::default(), Default::default()),
                extends: vec![(self.object_tid, FileSpan::new(Default::default(), Default::default()))],
                implements: vec![
                    (self.serializable_tid, FileSpan::new(Default::default(), Default::default())),
                    (self.cloneable_tid, FileSpan::new(Default::default(), Default::default())),
                ],
            },
        );
    }

    /// Rejects structurally illegal parent edges: a class extending an
    /// interface (or vice versa), a class implementing another class, and
    /// a duplicate parent listed twice.
    fn validate_structure(&self, bad: &mut FxHashSet<TypeId>, errors: &mut Vec<Diagnostic>) {
        for (&tid, raw) in &self.types {
            let mut seen: FxHashSet<TypeId> = FxHashSet::default();
            for &(parent, pos) in &raw.extends {
                if !seen.insert(parent) {
                    errors.push(Diagnostic::new(
                        DiagnosticKind::DuplicateInheritanceError,
                        pos,
                        format!("'{}' is listed more than once", self.type_name(parent)),
                    ));
                    bad.insert(tid);
                    continue;
                }
                let Some(parent_raw) = self.types.get(&parent) else { continue };
                match (raw.kind, parent_raw.kind) {
                    (TypeKind::Class, TypeKind::Interface) => {
                        errors.push(Diagnostic::new(
                            DiagnosticKind::ClassExtendInterfaceError,
                            pos,
                            format!("class '{}' cannot extend interface '{}'", raw.name, parent_raw.name),
                        ));
                        bad.insert(tid);
                    }
                    (TypeKind::Interface, TypeKind::Class) => {
                        errors.push(Diagnostic::new(
                            DiagnosticKind::InterfaceExtendsClassError,
                            pos,
                            format!("interface '{}' cannot extend class '{}'", raw.name, parent_raw.name),
                        ));
                        bad.insert(tid);
                    }
                    _ => {}
                }
            }
            for &(parent, pos) in &raw.implements {
                if !seen.insert(parent) {
                    errors.push(Diagnostic::new(
                        DiagnosticKind::DuplicateInheritanceError,
                        pos,
                        format!("'{}' is listed more than once", self.type_name(parent)),
                    ));
                    bad.insert(tid);
                    continue;
                }
                if let Some(parent_raw) = self.types.get(&parent) {
                    if parent_raw.kind == TypeKind::Class {
                        errors.push(Diagnostic::new(
                            DiagnosticKind::ClassImplementsClassError,
                            pos,
                            format!("'{}' implements class '{}'", raw.name, parent_raw.name),
                        ));
                        bad.insert(tid);
                    }
                }
            }
        }
    }

    fn type_name(&self, tid: TypeId) -> &str {
        self.types.get(&tid).map(|r| &*r.name).unwrap_or("<unknown>")
    }

    /// Iterative leaf removal: repeatedly strip types with no remaining
    /// outgoing parent edge. What's left once no more leaves can be removed
    /// is exactly the set of types sitting on (or feeding into) a cycle.
    /// Each connected remainder is reported as one `ExtendsCycleError`,
    /// walked from its lowest `TypeId` for a deterministic listing.
    fn detect_cycles(&self, bad: &mut FxHashSet<TypeId>, errors: &mut Vec<Diagnostic>) {
        let mut remaining: FxHashSet<TypeId> =
            self.types.keys().copied().filter(|t| !bad.contains(t)).collect();

        loop {
            let leaves: Vec<TypeId> = remaining
                .iter()
                .copied()
                .filter(|t| {
                    let raw = &self.types[t];
                    raw.extends
                        .iter()
                        .chain(raw.implements.iter())
                        .all(|(p, _)| !remaining.contains(p))
                })
                .collect();
            if leaves.is_empty() {
                break;
            }
            for leaf in leaves {
                remaining.remove(&leaf);
            }
        }

        let mut unvisited = remaining.clone();
        let mut ids: Vec<TypeId> = remaining.iter().copied().collect();
        ids.sort();
        for start in ids {
            if !unvisited.contains(&start) {
                continue;
            }
            let component = self.collect_component(start, &remaining, &mut unvisited);
            let rotated = self.rotate_cycle(start, &component, &remaining);

            bad.extend(component.iter().copied());

            let mut iter = rotated.iter();
            let first = *iter.next().expect("a cycle has at least one member");
            let mut diag = Diagnostic::new(
                DiagnosticKind::ExtendsCycleError,
                self.types[&first].pos,
                format!("'{}' participates in an inheritance cycle", self.type_name(first)),
            );
            for &tid in iter {
                diag = diag.with_note(self.types[&tid].pos, format!("...which extends/implements '{}'", self.type_name(tid)));
            }
            errors.push(diag);
        }
    }

    fn collect_component(&self, start: TypeId, remaining: &FxHashSet<TypeId>, unvisited: &mut FxHashSet<TypeId>) -> Vec<TypeId> {
        let mut stack = vec![start];
        let mut component = Vec::new();
        unvisited.remove(&start);
        while let Some(tid) = stack.pop() {
            component.push(tid);
            let raw = &self.types[&tid];
            for (parent, _) in raw.extends.iter().chain(raw.implements.iter()) {
                if remaining.contains(parent) && unvisited.remove(parent) {
                    stack.push(*parent);
                }
            }
        }
        component
    }

    /// Walks the actual parent chain starting from `start` so the reported
    /// cycle reads as a real rotation (`Foo -> Bar -> Baz -> Foo`) rather
    /// than an arbitrary set.
    fn rotate_cycle(&self, start: TypeId, component: &[TypeId], remaining: &FxHashSet<TypeId>) -> Vec<TypeId> {
        let members: FxHashSet<TypeId> = component.iter().copied().collect();
        let mut order = vec![start];
        let mut cur = start;
        for _ in 0..component.len() {
            let raw = &self.types[&cur];
            let next = raw
                .extends
                .iter()
                .chain(raw.implements.iter())
                .map(|(p, _)| *p)
                .find(|p| members.contains(p) && remaining.contains(p));
            match next {
                Some(n) if n != start => {
                    order.push(n);
                    cur = n;
                }
                _ => break,
            }
        }
        order
    }

    fn introduce_implicit_edges(&mut self, bad: &FxHashSet<TypeId>) {
        for (&tid, raw) in self.types.iter_mut() {
            if tid == self.object_tid || bad.contains(&tid) {
                continue;
            }
            if raw.kind == TypeKind::Class && raw.extends.is_empty() {
                raw.extends.push((self.object_tid, raw.pos));
            }
        }
    }

    /// Reverse-topological order via post-order DFS over `extends`/
    /// `implements`: a type's index is only assigned once every parent's
    /// has been, so `Object` (no parents) always lands on `0`.
    fn topological_order(&self) -> Vec<(TypeId, u64)> {
        let mut index: FxHashMap<TypeId, u64> = FxHashMap::default();
        let mut next = 0u64;
        let mut ids: Vec<TypeId> = self.types.keys().copied().collect();
        ids.sort();
        for tid in &ids {
            self.visit_topo(*tid, &mut index, &mut next);
        }
        let mut order: Vec<(TypeId, u64)> = index.into_iter().collect();
        order.sort_by_key(|(_, idx)| *idx);
        order
    }

    fn visit_topo(&self, tid: TypeId, index: &mut FxHashMap<TypeId, u64>, next: &mut u64) {
        if index.contains_key(&tid) {
            return;
        }
        let Some(raw) = self.types.get(&tid) else { return };
        // Insert a placeholder first: a cyclic edge (already reported and
        // blacklisted, but still present in the raw graph) must not cause
        // infinite recursion here.
        index.insert(tid, u64::MAX);
        for (parent, _) in raw.extends.iter().chain(raw.implements.iter()) {
            self.visit_topo(*parent, index, next);
        }
        index.insert(tid, *next);
        *next += 1;
    }

    fn build_method_table(
        &self,
        tid: TypeId,
        raw: &RawType,
        merged: &FxHashMap<TypeId, MethodTable>,
        errors: &mut Vec<Diagnostic>,
    ) -> MethodTable {
        let mut table = MethodTable::default();

        // Start from the parents' merged tables, lowest priority first, so
        // that a closer override simply replaces what an ancestor
        // contributed.
        for (parent, _) in raw.extends.iter().chain(raw.implements.iter()) {
            if let Some(parent_table) = merged.get(parent) {
                for info in parent_table.methods() {
                    if !info.signature.is_constructor {
                        table.insert(info.clone());
                    }
                }
            }
        }

        let mut declared_seen: FxHashSet<MethodSignature> = FxHashSet::default();
        for (id, mods, sig, return_type, pos, has_body) in self.methods.get(&tid).into_iter().flatten() {
            if sig.is_constructor && sig.name != raw.name {
                errors.push(Diagnostic::new(
                    DiagnosticKind::ConstructorNameError,
                    *pos,
                    format!("constructor name must match the class name '{}'", raw.name),
                ));
                continue;
            }
            if !declared_seen.insert(sig.clone()) {
                errors.push(Diagnostic::new(
                    DiagnosticKind::MethodDuplicateDefinitionError,
                    *pos,
                    format!("'{}' is declared more than once with this signature", sig.name),
                ));
                continue;
            }

            if let Some(existing) = table.lookup(sig) {
                if !sig.is_constructor {
                    self.validate_override(mods, sig, *return_type, *pos, existing, errors);
                }
            }

            table.insert(MethodInfo {
                id: *id,
                class_type: tid,
                mods: mods.clone(),
                return_type: *return_type,
                pos: *pos,
                signature: sig.clone(),
                has_body: *has_body,
            });
        }

        if raw.kind == TypeKind::Class {
            self.check_parent_final(raw, errors);
            self.check_parent_empty_constructor(raw, merged, errors);
            if !raw.mods.has(Modifier::Abstract) && table.methods().any(|m| !m.has_body) {
                errors.push(Diagnostic::new(
                    DiagnosticKind::NeedAbstractClassError,
                    raw.pos,
                    format!("'{}' must be declared abstract or implement every inherited abstract method", raw.name),
                ));
            }
        }

        table
    }

    /// Spec step 5: a class may not extend a `final` class. Checked on the
    /// raw parent's own modifiers, not transitively through grandparents.
    fn check_parent_final(&self, raw: &RawType, errors: &mut Vec<Diagnostic>) {
        for &(parent, pos) in &raw.extends {
            let Some(parent_raw) = self.types.get(&parent) else { continue };
            if parent_raw.mods.has(Modifier::Final) {
                errors.push(
                    Diagnostic::new(
                        DiagnosticKind::ParentFinalError,
                        pos,
                        format!("'{}' cannot extend final class '{}'", raw.name, parent_raw.name),
                    )
                    .with_note(parent_raw.pos, format!("'{}' is declared final here", parent_raw.name)),
                );
            }
        }
    }

    /// Spec step 5: a class's immediate parent must be `Object` or declare
    /// an accessible zero-argument constructor of its own (constructors
    /// aren't inherited, so a grandparent's constructor doesn't count).
    fn check_parent_empty_constructor(&self, raw: &RawType, merged: &FxHashMap<TypeId, MethodTable>, errors: &mut Vec<Diagnostic>) {
        let Some(&(parent, _)) = raw.extends.first() else { return };
        if parent == self.object_tid {
            return;
        }
        let Some(parent_raw) = self.types.get(&parent) else { return };
        let ctor_sig = MethodSignature::new(true, parent_raw.name.clone(), vec![]);
        let accessible = merged
            .get(&parent)
            .and_then(|t| t.lookup(&ctor_sig))
            .is_some_and(|ctor| ctor.mods.has(Modifier::Public) || ctor.mods.has(Modifier::Protected) || raw.package == parent_raw.package);
        if !accessible {
            errors.push(
                Diagnostic::new(
                    DiagnosticKind::ParentClassEmptyConstructorError,
                    parent_raw.pos,
                    format!("'{}' has no accessible zero-argument constructor", parent_raw.name),
                )
                .with_note(raw.pos, format!("required here because '{}' extends '{}'", raw.name, parent_raw.name)),
            );
        }
    }

    fn validate_override(
        &self,
        mods: &ModifierList,
        sig: &MethodSignature,
        return_type: TypeId,
        pos: FileSpan,
        parent_method: &MethodInfo,
        errors: &mut Vec<Diagnostic>,
    ) {
        if parent_method.return_type != return_type {
            errors.push(Diagnostic::new(
                DiagnosticKind::DifferingReturnTypeError,
                pos,
                format!("'{}' overrides a method with a different return type", sig.name),
            ));
        }
        if parent_method.mods.has(Modifier::Static) != mods.has(Modifier::Static) {
            errors.push(Diagnostic::new(
                DiagnosticKind::StaticMethodOverrideError,
                pos,
                format!("'{}' changes static-ness across override", sig.name),
            ));
        }
        if parent_method.mods.has(Modifier::Final) {
            errors.push(Diagnostic::new(
                DiagnosticKind::OverrideFinalMethodError,
                pos,
                format!("'{}' overrides a final method", sig.name),
            ));
        }
        let parent_public = parent_method.mods.has(Modifier::Public);
        let child_public = mods.has(Modifier::Public);
        if parent_public && !child_public {
            errors.push(Diagnostic::new(
                DiagnosticKind::LowerVisibilityError,
                pos,
                format!("'{}' lowers visibility from its parent's", sig.name),
            ));
        }
    }

    fn build_field_table(
        &self,
        tid: TypeId,
        raw: &RawType,
        merged: &FxHashMap<TypeId, FieldTable>,
        errors: &mut Vec<Diagnostic>,
    ) -> FieldTable {
        let mut table = FieldTable::default();

        // Fields hide rather than override: a parent's field with the same
        // name is still inherited into the table unless this type declares
        // its own, which simply replaces the entry below (field access is
        // resolved statically by declared type, never dynamically).
        for (parent, _) in raw.extends.iter().chain(raw.implements.iter()) {
            if let Some(parent_table) = merged.get(parent) {
                for info in parent_table.fields() {
                    table.insert(info.clone());
                }
            }
        }

        let mut declared_seen: FxHashSet<Rc<str>> = FxHashSet::default();
        for (id, mods, name, field_type, pos) in self.fields.get(&tid).into_iter().flatten() {
            if !declared_seen.insert(name.clone()) {
                errors.push(Diagnostic::new(
                    DiagnosticKind::DuplicateVarDeclError,
                    *pos,
                    format!("field '{name}' is declared more than once"),
                ));
                continue;
            }
            table.insert(FieldInfo {
                id: *id,
                class_type: tid,
                mods: mods.clone(),
                field_type: *field_type,
                pos: *pos,
                name: name.clone(),
            });
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_common::span::{FileId, Span};

    fn pos(n: u32) -> FileSpan {
        FileSpan::new(FileId(0), Span::at(n))
    }

    fn tid(base: u64) -> TypeId {
        TypeId::new(base, 0)
    }

    fn well_known() -> (TypeId, TypeId, TypeId, TypeId) {
        (tid(100), tid(101), tid(102), tid(103))
    }

    #[test]
    fn plain_class_implicitly_extends_object() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let foo = tid(10);
        builder.put_type(foo, ModifierList::new(), TypeKind::Class, Rc::from("Foo"), Rc::from(""), pos(1), vec![], vec![]);

        let mut errors = Vec::new();
        let map = builder.build(&mut errors);
        assert!(errors.is_empty());

        let info = map.lookup_type_info(foo).unwrap();
        assert_eq!(info.extends, vec![object]);
        assert!(map.is_ancestor(object, foo));
    }

    #[test]
    fn cyclic_extends_is_reported_once_and_blacklisted() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let foo = tid(10);
        let bar = tid(11);
        builder.put_type(foo, ModifierList::new(), TypeKind::Class, Rc::from("Foo"), Rc::from(""), pos(1), vec![(bar, pos(2))], vec![]);
        builder.put_type(bar, ModifierList::new(), TypeKind::Class, Rc::from("Bar"), Rc::from(""), pos(3), vec![(foo, pos(4))], vec![]);

        let mut errors = Vec::new();
        let map = builder.build(&mut errors);
        assert_eq!(errors.iter().filter(|e| e.kind == DiagnosticKind::ExtendsCycleError).count(), 1);

        let foo_info = map.lookup_type_info(foo).unwrap();
        assert!(foo_info.is_bad);
    }

    #[test]
    fn class_extending_interface_is_rejected() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let iface = tid(10);
        let class = tid(11);
        builder.put_type(iface, ModifierList::new(), TypeKind::Interface, Rc::from("Shape"), Rc::from(""), pos(1), vec![], vec![]);
        builder.put_type(class, ModifierList::new(), TypeKind::Class, Rc::from("Bad"), Rc::from(""), pos(2), vec![(iface, pos(3))], vec![]);

        let mut errors = Vec::new();
        let map = builder.build(&mut errors);
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::ClassExtendInterfaceError));
        assert!(map.lookup_type_info(class).unwrap().is_bad);
    }

    #[test]
    fn array_types_share_one_synthetic_entry() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);

        let mut errors = Vec::new();
        let map = builder.build(&mut errors);
        let int_array = TypeId::INT.array_of();
        let info = map.lookup_type_info(int_array).unwrap();
        assert_eq!(info.extends, vec![object]);
        assert!(info.implements.contains(&ser));
        assert!(info.implements.contains(&clone));
    }

    #[test]
    fn overriding_a_method_with_a_different_return_type_errors() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let base = tid(10);
        let derived = tid(11);
        builder.put_type(base, ModifierList::new(), TypeKind::Class, Rc::from("Base"), Rc::from(""), pos(1), vec![], vec![]);
        builder.put_type(
            derived,
            ModifierList::new(),
            TypeKind::Class,
            Rc::from("Derived"),
            Rc::from(""),
            pos(2),
            vec![(base, pos(3))],
            vec![],
        );

        let mut public = ModifierList::new();
        public.add(Modifier::Public, Span::at(0));
        let sig = MethodSignature::new(false, Rc::from("area"), vec![]);
        builder.put_method(base, public.clone(), sig.clone(), TypeId::INT, pos(4), true);
        builder.put_method(derived, public, sig, TypeId::BOOL, pos(5), true);

        let mut errors = Vec::new();
        builder.build(&mut errors);
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::DifferingReturnTypeError));
    }

    #[test]
    fn lowering_visibility_on_override_errors() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let base = tid(10);
        let derived = tid(11);
        builder.put_type(base, ModifierList::new(), TypeKind::Class, Rc::from("Base"), Rc::from(""), pos(1), vec![], vec![]);
        builder.put_type(
            derived,
            ModifierList::new(),
            TypeKind::Class,
            Rc::from("Derived"),
            Rc::from(""),
            pos(2),
            vec![(base, pos(3))],
            vec![],
        );

        let mut public = ModifierList::new();
        public.add(Modifier::Public, Span::at(0));
        let mut protected = ModifierList::new();
        protected.add(Modifier::Protected, Span::at(0));
        let sig = MethodSignature::new(false, Rc::from("area"), vec![]);
        builder.put_method(base, public, sig.clone(), TypeId::INT, pos(4), true);
        builder.put_method(derived, protected, sig, TypeId::INT, pos(5), true);

        let mut errors = Vec::new();
        builder.build(&mut errors);
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::LowerVisibilityError));
    }

    #[test]
    fn extending_a_final_class_is_rejected() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let base = tid(10);
        let derived = tid(11);
        let mut final_mods = ModifierList::new();
        final_mods.add(Modifier::Final, Span::at(0));
        builder.put_type(base, final_mods, TypeKind::Class, Rc::from("Base"), Rc::from(""), pos(1), vec![], vec![]);
        builder.put_type(
            derived,
            ModifierList::new(),
            TypeKind::Class,
            Rc::from("Derived"),
            Rc::from(""),
            pos(2),
            vec![(base, pos(3))],
            vec![],
        );

        let mut errors = Vec::new();
        builder.build(&mut errors);
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::ParentFinalError));
    }

    #[test]
    fn extending_a_class_with_no_declared_constructor_is_rejected() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let base = tid(10);
        let derived = tid(11);
        builder.put_type(base, ModifierList::new(), TypeKind::Class, Rc::from("Base"), Rc::from("foo"), pos(1), vec![], vec![]);
        builder.put_type(
            derived,
            ModifierList::new(),
            TypeKind::Class,
            Rc::from("Derived"),
            Rc::from(""),
            pos(2),
            vec![(base, pos(3))],
            vec![],
        );

        let mut errors = Vec::new();
        builder.build(&mut errors);
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::ParentClassEmptyConstructorError));
    }

    #[test]
    fn a_public_parent_constructor_satisfies_the_empty_constructor_rule() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let base = tid(10);
        let derived = tid(11);
        builder.put_type(base, ModifierList::new(), TypeKind::Class, Rc::from("Base"), Rc::from("foo"), pos(1), vec![], vec![]);
        builder.put_type(
            derived,
            ModifierList::new(),
            TypeKind::Class,
            Rc::from("Derived"),
            Rc::from(""),
            pos(2),
            vec![(base, pos(3))],
            vec![],
        );

        let mut public = ModifierList::new();
        public.add(Modifier::Public, Span::at(0));
        let ctor_sig = MethodSignature::new(true, Rc::from("Base"), vec![]);
        builder.put_method(base, public, ctor_sig, base, pos(4), true);

        let mut errors = Vec::new();
        builder.build(&mut errors);
        assert!(!errors.iter().any(|e| e.kind == DiagnosticKind::ParentClassEmptyConstructorError));
    }

    #[test]
    fn concrete_subclass_missing_an_inherited_abstract_method_needs_abstract() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let base = tid(10);
        let derived = tid(11);
        let mut abstract_class = ModifierList::new();
        abstract_class.add(Modifier::Abstract, Span::at(0));
        builder.put_type(base, abstract_class, TypeKind::Class, Rc::from("Base"), Rc::from(""), pos(1), vec![], vec![]);
        builder.put_type(
            derived,
            ModifierList::new(),
            TypeKind::Class,
            Rc::from("Derived"),
            Rc::from(""),
            pos(2),
            vec![(base, pos(3))],
            vec![],
        );

        let mut public = ModifierList::new();
        public.add(Modifier::Public, Span::at(0));
        let ctor_sig = MethodSignature::new(true, Rc::from("Base"), vec![]);
        builder.put_method(base, public.clone(), ctor_sig, base, pos(4), true);

        let mut abstract_method = public;
        abstract_method.add(Modifier::Abstract, Span::at(0));
        let sig = MethodSignature::new(false, Rc::from("area"), vec![]);
        builder.put_method(base, abstract_method, sig, TypeId::INT, pos(5), false);

        let mut errors = Vec::new();
        builder.build(&mut errors);
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::NeedAbstractClassError));
    }

    #[test]
    fn calling_a_protected_method_from_outside_the_package_and_not_a_subclass_is_a_permission_error() {
        let (object, ser, clone, array) = well_known();
        let mut builder = TypeInfoMapBuilder::new(object, ser, clone, array);
        builder.put_type(object, ModifierList::new(), TypeKind::Class, Rc::from("Object"), Rc::from(""), pos(0), vec![], vec![]);
        let owner = tid(10);
        let caller = tid(11);
        builder.put_type(owner, ModifierList::new(), TypeKind::Class, Rc::from("A"), Rc::from("foo"), pos(1), vec![], vec![]);
        builder.put_type(caller, ModifierList::new(), TypeKind::Class, Rc::from("B"), Rc::from("baz"), pos(2), vec![], vec![]);

        let mut protected = ModifierList::new();
        protected.add(Modifier::Protected, Span::at(0));
        let sig = MethodSignature::new(false, Rc::from("foo"), vec![]);
        builder.put_method(owner, protected, sig.clone(), TypeId::VOID, pos(3), true);

        let mut errors = Vec::new();
        let map = builder.build(&mut errors);
        assert!(errors.is_empty());

        let mut call_errors = Vec::new();
        let owner_info = map.lookup_type_info(owner).unwrap();
        owner_info.methods.resolve_call(&map, caller, CallContext::Instance, &sig, pos(4), &mut call_errors);
        assert!(call_errors.iter().any(|e| e.kind == DiagnosticKind::PermissionError));
    }
}
