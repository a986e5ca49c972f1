//! Hierarchical name service: compound-name bind/resolve/unbind with recursive subcontext
//! traversal and auto-creation of intermediate contexts.

use crate::error::{CorbaError, CorbaResult};
use crate::ior::ObjectRef;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// One component of a compound name: an id and an optional kind discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameComponent {
    pub id: String,
    pub kind: String,
}

impl NameComponent {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { id: id.into(), kind: kind.into() }
    }

    pub fn id_only(id: impl Into<String>) -> Self {
        Self::new(id, "")
    }

    fn stringify(&self) -> String {
        if self.kind.is_empty() {
            self.id.clone()
        } else {
            format!("{}.{}", self.id, self.kind)
        }
    }
}

/// An ordered sequence of [`NameComponent`]s; the unit every naming operation works on.
pub type Name = Vec<NameComponent>;

/// Parses `"id1[.kind1]/id2[.kind2]/…"`. The empty string is invalid.
pub fn parse_name(s: &str) -> CorbaResult<Name> {
    if s.is_empty() {
        return Err(CorbaError::BadName("empty name".into()));
    }
    s.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('.') {
            Some((id, kind)) => Ok(NameComponent::new(id, kind)),
            None => Ok(NameComponent::id_only(part)),
        })
        .collect()
}

pub fn stringify_name(name: &[NameComponent]) -> String {
    name.iter()
        .map(NameComponent::stringify)
        .collect::<Vec<_>>()
        .join("/")
}

/// What kind of entity a binding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Object,
    Context,
}

/// The target of a binding: either an object reference, or a nested naming context.
#[derive(Debug, Clone)]
pub enum BindingTarget {
    Object(ObjectRef),
    Context(Arc<NamingContext>),
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: Name,
    pub target: BindingTarget,
    pub kind: BindingKind,
}

/// A node in the naming hierarchy; owns a map from single-component stringification to its
/// binding, guarded by a reader-writer lock.
#[derive(Debug, Default)]
pub struct NamingContext {
    bindings: RwLock<HashMap<String, Binding>>,
}

impl NamingContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn bind(self: &Arc<Self>, name: &[NameComponent], obj: ObjectRef) -> CorbaResult<()> {
        self.bind_impl(name, BindingTarget::Object(obj), BindingKind::Object, false)
    }

    pub fn rebind(self: &Arc<Self>, name: &[NameComponent], obj: ObjectRef) -> CorbaResult<()> {
        self.bind_impl(name, BindingTarget::Object(obj), BindingKind::Object, true)
    }

    pub fn bind_context(self: &Arc<Self>, name: &[NameComponent], ctx: Arc<NamingContext>) -> CorbaResult<()> {
        self.bind_impl(name, BindingTarget::Context(ctx), BindingKind::Context, false)
    }

    pub fn rebind_context(self: &Arc<Self>, name: &[NameComponent], ctx: Arc<NamingContext>) -> CorbaResult<()> {
        self.bind_impl(name, BindingTarget::Context(ctx), BindingKind::Context, true)
    }

    fn bind_impl(
        self: &Arc<Self>,
        name: &[NameComponent],
        target: BindingTarget,
        kind: BindingKind,
        replace: bool,
    ) -> CorbaResult<()> {
        let (leaf_ctx, last) = self.resolve_leaf_context_for_write(name)?;
        let key = last.stringify();
        let mut guard = leaf_ctx.bindings.write()?;
        if !replace && guard.contains_key(&key) {
            return Err(CorbaError::AlreadyBound);
        }
        debug!("binding name {}", last.stringify());
        guard.insert(
            key,
            Binding { name: vec![last.clone()], target, kind },
        );
        Ok(())
    }

    /// Descends to the context that should own the terminal component of `name`, auto-creating
    /// intermediate `NamingContext`s for components that are not yet bound.
    fn resolve_leaf_context_for_write(
        self: &Arc<Self>,
        name: &[NameComponent],
    ) -> CorbaResult<(Arc<NamingContext>, NameComponent)> {
        let (init, last) = split_last(name)?;
        let mut current = Arc::clone(self);
        for component in init {
            let key = component.stringify();
            let next = {
                let guard = current.bindings.read()?;
                guard.get(&key).map(|b| b.target.clone())
            };
            current = match next {
                Some(BindingTarget::Context(ctx)) => ctx,
                Some(BindingTarget::Object(_)) => return Err(CorbaError::NotContext),
                None => {
                    let fresh = NamingContext::new();
                    let mut guard = current.bindings.write()?;
                    guard.entry(key).or_insert_with(|| Binding {
                        name: vec![component.clone()],
                        target: BindingTarget::Context(Arc::clone(&fresh)),
                        kind: BindingKind::Context,
                    });
                    match &guard[&component.stringify()].target {
                        BindingTarget::Context(ctx) => Arc::clone(ctx),
                        BindingTarget::Object(_) => return Err(CorbaError::NotContext),
                    }
                }
            };
        }
        Ok((current, last.clone()))
    }

    /// Recursive lookup; every intermediate component must resolve to a context.
    pub fn resolve(self: &Arc<Self>, name: &[NameComponent]) -> CorbaResult<BindingTarget> {
        let (init, last) = split_last(name)?;
        let mut current = Arc::clone(self);
        for component in init {
            let key = component.stringify();
            let guard = current.bindings.read()?;
            match guard.get(&key) {
                Some(Binding { target: BindingTarget::Context(ctx), .. }) => {
                    let ctx = Arc::clone(ctx);
                    drop(guard);
                    current = ctx;
                }
                Some(Binding { target: BindingTarget::Object(_), .. }) => return Err(CorbaError::NotContext),
                None => return Err(CorbaError::NotFound(stringify_name(name))),
            }
        }
        let key = last.stringify();
        let guard = current.bindings.read()?;
        guard
            .get(&key)
            .map(|b| b.target.clone())
            .ok_or_else(|| CorbaError::NotFound(stringify_name(name)))
    }

    pub fn resolve_object(self: &Arc<Self>, name: &[NameComponent]) -> CorbaResult<ObjectRef> {
        match self.resolve(name)? {
            BindingTarget::Object(o) => Ok(o),
            BindingTarget::Context(_) => Err(CorbaError::NotContext),
        }
    }

    /// Removes only the terminal binding; intermediate contexts are left in place.
    pub fn unbind(self: &Arc<Self>, name: &[NameComponent]) -> CorbaResult<()> {
        let (init, last) = split_last(name)?;
        let mut current = Arc::clone(self);
        for component in init {
            let key = component.stringify();
            let guard = current.bindings.read()?;
            match guard.get(&key) {
                Some(Binding { target: BindingTarget::Context(ctx), .. }) => {
                    let ctx = Arc::clone(ctx);
                    drop(guard);
                    current = ctx;
                }
                Some(Binding { target: BindingTarget::Object(_), .. }) => return Err(CorbaError::NotContext),
                None => return Err(CorbaError::NotFound(stringify_name(name))),
            }
        }
        let mut guard = current.bindings.write()?;
        let removed = guard
            .remove(&last.stringify())
            .map(|_| ())
            .ok_or_else(|| CorbaError::NotFound(stringify_name(name)));
        if removed.is_ok() {
            debug!("unbinding name {}", last.stringify());
        }
        removed
    }

    /// All immediate bindings in this context; order is unspecified.
    pub fn list(&self) -> CorbaResult<Vec<Binding>> {
        Ok(self.bindings.read()?.values().cloned().collect())
    }

    pub fn new_context() -> Arc<Self> {
        Self::new()
    }

    /// Creates a context and binds it under `name` atomically.
    pub fn bind_new_context(self: &Arc<Self>, name: &[NameComponent]) -> CorbaResult<Arc<NamingContext>> {
        let fresh = NamingContext::new();
        self.bind_context(name, Arc::clone(&fresh))?;
        Ok(fresh)
    }
}

impl Clone for BindingTarget {
    fn clone(&self) -> Self {
        match self {
            Self::Object(o) => Self::Object(o.clone()),
            Self::Context(c) => Self::Context(Arc::clone(c)),
        }
    }
}

fn split_last(name: &[NameComponent]) -> CorbaResult<(&[NameComponent], &NameComponent)> {
    match name.split_last() {
        Some((last, init)) => Ok((init, last)),
        None => Err(CorbaError::BadName("name must have at least one component".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(repo_id: &str) -> ObjectRef {
        let body = crate::ior::IiopProfileBody::new(1, 2, "localhost", 8099, repo_id.as_bytes().to_vec());
        ObjectRef::new(repo_id, vec![crate::ior::Profile::iiop(&body)]).unwrap()
    }

    #[test]
    fn bind_then_resolve_round_trips() {
        let root = NamingContext::new();
        let name = parse_name("widget").unwrap();
        root.bind(&name, obj("IDL:Widget:1.0")).unwrap();
        let resolved = root.resolve_object(&name).unwrap();
        assert!(resolved.same_object(&obj("IDL:Widget:1.0")).unwrap());
    }

    #[test]
    fn double_bind_fails_already_bound() {
        let root = NamingContext::new();
        let name = parse_name("widget").unwrap();
        root.bind(&name, obj("A")).unwrap();
        let err = root.bind(&name, obj("B")).unwrap_err();
        assert!(matches!(err, CorbaError::AlreadyBound));
    }

    #[test]
    fn rebind_replaces_regardless_of_prior_state() {
        let root = NamingContext::new();
        let name = parse_name("widget").unwrap();
        root.bind(&name, obj("A")).unwrap();
        root.rebind(&name, obj("B")).unwrap();
        assert!(root.resolve_object(&name).unwrap().same_object(&obj("B")).unwrap());
    }

    #[test]
    fn compound_bind_auto_creates_intermediate_contexts() {
        let root = NamingContext::new();
        let name = parse_name("a/b/c").unwrap();
        root.bind(&name, obj("Calc")).unwrap();

        assert!(root
            .resolve_object(&parse_name("a/b/c").unwrap())
            .unwrap()
            .same_object(&obj("Calc"))
            .unwrap());

        let top = root.list().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].kind, BindingKind::Context);
        assert_eq!(top[0].name[0].id, "a");

        root.unbind(&parse_name("a/b/c").unwrap()).unwrap();
        assert!(root.resolve(&parse_name("a/b/c").unwrap()).is_err());
        // intermediate contexts survive the unbind
        assert!(root.resolve(&parse_name("a/b").unwrap()).is_ok());
    }

    #[test]
    fn resolve_through_non_context_binding_fails() {
        let root = NamingContext::new();
        root.bind(&parse_name("leaf").unwrap(), obj("Leaf")).unwrap();
        let err = root.resolve(&parse_name("leaf/deeper").unwrap()).unwrap_err();
        assert!(matches!(err, CorbaError::NotContext));
    }

    #[test]
    fn string_form_round_trips() {
        let name = parse_name("a.kind1/b").unwrap();
        assert_eq!(stringify_name(&name), "a.kind1/b");
    }

    #[test]
    fn bind_new_context_is_atomic() {
        let root = NamingContext::new();
        let name = parse_name("sub").unwrap();
        let created = root.bind_new_context(&name).unwrap();
        created.bind(&parse_name("inner").unwrap(), obj("X")).unwrap();
        assert!(root.resolve(&parse_name("sub/inner").unwrap()).is_ok());
        assert!(root.bind_new_context(&name).is_err());
    }
}
