//! Provider registration.
//!
//! Registration is bookkeeping only: nothing is constructed and no hook is
//! attached until [`resolve`](crate::container::resolve) runs. Conflicts are
//! recorded as they are found and reported before any constructor is called.

use std::collections::HashMap;
use std::sync::Arc;

use crate::container::error::{BoxError, ContainerError};
use crate::container::inject::{Inject, Instance, Scope};
use crate::container::key::{Capability, GroupId, Requirement, TypeKey};
use crate::lifecycle::Hook;

pub(crate) type Construct = Box<
    dyn Fn(&Scope<'_>, &mut ProvideContext<'_>) -> Result<Option<Instance>, ContainerError>
        + Send
        + Sync,
>;

/// What a provider adds to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Output {
    Component(TypeKey),
    Member(GroupId),
    /// Invoke-only step.
    Nothing,
}

pub(crate) struct ProviderEntry {
    pub(crate) label: String,
    pub(crate) output: Output,
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) construct: Construct,
}

/// Handed to every constructor; collects the hooks it attaches.
///
/// Hooks are only committed to the lifecycle when the constructor succeeds.
pub struct ProvideContext<'a> {
    owner: &'a str,
    hooks: Vec<Hook>,
}

impl<'a> ProvideContext<'a> {
    pub(crate) fn new(owner: &'a str) -> Self {
        Self {
            owner,
            hooks: Vec::new(),
        }
    }

    /// Attach a start/stop hook to the component being constructed.
    pub fn append(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// Label of the provider currently running.
    pub fn owner(&self) -> &str {
        self.owner
    }

    pub(crate) fn into_hooks(self) -> Vec<Hook> {
        self.hooks
    }
}

/// Table of every registered provider, in registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    pub(crate) entries: Vec<ProviderEntry>,
    pub(crate) producers: HashMap<TypeKey, usize>,
    pub(crate) bindings: HashMap<&'static str, TypeKey>,
    issues: Vec<ContainerError>,
    invocations: usize,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor of `T`.
    pub fn provide<T, D, F>(&mut self, ctor: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        D: Inject,
        F: Fn(D, &mut ProvideContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.provide_shared::<T, D, _>(move |deps, ctx| ctor(deps, ctx).map(Arc::new))
    }

    /// Register a constructor that hands back an `Arc<T>`.
    ///
    /// Needed for trait-object components such as `Arc<dyn UserService>`.
    pub fn provide_shared<T, D, F>(&mut self, ctor: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: Inject,
        F: Fn(D, &mut ProvideContext<'_>) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        if let Some(&existing) = self.producers.get(&key) {
            self.issues.push(ContainerError::DuplicateProvider {
                type_name: key.name(),
                existing: self.entries[existing].label.clone(),
            });
            return self;
        }

        self.producers.insert(key, self.entries.len());
        self.push(key.name().to_string(), Output::Component(key), build::<T, D, F>(ctor));
        self
    }

    /// Register a value that is already built.
    pub fn supply<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        let value = Arc::new(value);
        self.provide_shared::<T, (), _>(move |(), _| Ok(Arc::clone(&value)))
    }

    /// Register a member of the capability group bound to `M`.
    ///
    /// Members are handed to the group's aggregator in registration order.
    pub fn contribute<M, D, F>(&mut self, ctor: F) -> &mut Self
    where
        M: ?Sized + Capability,
        D: Inject,
        F: Fn(D, &mut ProvideContext<'_>) -> Result<Arc<M>, BoxError> + Send + Sync + 'static,
    {
        let id = GroupId::of::<M>();
        let bound = *self.bindings.entry(id.name).or_insert(id.member);
        if bound != id.member {
            self.issues.push(ContainerError::GroupTypeMismatch {
                group: id.name,
                expected: bound.name(),
                found: id.member.name(),
            });
            return self;
        }

        let position = self
            .entries
            .iter()
            .filter(|entry| entry.output == Output::Member(id))
            .count();
        self.push(
            format!("{}[{}]", id.name, position),
            Output::Member(id),
            build::<M, D, F>(ctor),
        );
        self
    }

    /// Register a side-effecting step that runs once the graph is built.
    pub fn invoke<D, F>(&mut self, step: F) -> &mut Self
    where
        D: Inject,
        F: Fn(D, &mut ProvideContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let label = format!("invoke#{}", self.invocations);
        self.invocations += 1;

        let construct: Construct = Box::new(move |scope, ctx| {
            let deps = D::fetch(scope)?;
            step(deps, ctx).map_err(|e| ContainerError::constructor(ctx.owner(), e))?;
            Ok(None)
        });
        self.push(label, Output::Nothing, (D::requirements(), construct));
        self
    }

    /// Apply a feature module's registrations.
    pub fn include(&mut self, module: impl FnOnce(&mut Self)) -> &mut Self {
        module(self);
        self
    }

    /// Report the first registration conflict, if any.
    pub fn check(&self) -> Result<(), ContainerError> {
        match self.issues.first() {
            Some(issue) => Err(issue.clone()),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels of every registered provider, in registration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.label.as_str())
    }

    fn push(
        &mut self,
        label: String,
        output: Output,
        (requirements, construct): (Vec<Requirement>, Construct),
    ) {
        tracing::trace!(provider = %label, "Registered provider");
        self.entries.push(ProviderEntry {
            label,
            output,
            requirements,
            construct,
        });
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.labels().collect::<Vec<_>>())
            .field("issues", &self.issues)
            .finish()
    }
}

fn build<T, D, F>(ctor: F) -> (Vec<Requirement>, Construct)
where
    T: ?Sized + Send + Sync + 'static,
    D: Inject,
    F: Fn(D, &mut ProvideContext<'_>) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
{
    let construct: Construct = Box::new(move |scope, ctx| {
        let deps = D::fetch(scope)?;
        let value = ctor(deps, ctx).map_err(|e| ContainerError::constructor(ctx.owner(), e))?;
        Ok(Some(Box::new(value) as Instance))
    });
    (D::requirements(), construct)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Port(u16);

    trait Plugin: Send + Sync {}

    impl Capability for dyn Plugin {
        const GROUP: &'static str = "plugins";
    }

    struct Noop;
    impl Plugin for Noop {}

    impl Capability for Port {
        const GROUP: &'static str = "plugins";
    }

    #[test]
    fn test_registration_runs_nothing() {
        let mut registry = ProviderRegistry::new();
        registry.provide(|(), _| -> Result<Port, BoxError> { panic!("constructed eagerly") });

        assert_eq!(registry.len(), 1);
        assert!(registry.check().is_ok());
    }

    #[test]
    fn test_duplicate_provider_is_recorded() {
        let mut registry = ProviderRegistry::new();
        registry
            .provide(|(), _| Ok(Port(1)))
            .provide(|(), _| Ok(Port(2)));

        assert_eq!(registry.len(), 1);
        match registry.check() {
            Err(ContainerError::DuplicateProvider { type_name, .. }) => {
                assert!(type_name.ends_with("Port"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_contribution_labels_follow_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry
            .contribute::<dyn Plugin, (), _>(|(), _| Ok(Arc::new(Noop)))
            .contribute::<dyn Plugin, (), _>(|(), _| Ok(Arc::new(Noop)))
            .invoke(|(), _| Ok(()));

        let labels: Vec<_> = registry.labels().collect();
        assert_eq!(labels, ["plugins[0]", "plugins[1]", "invoke#0"]);
    }

    #[test]
    fn test_group_rebound_to_other_interface_is_recorded() {
        let mut registry = ProviderRegistry::new();
        registry
            .contribute::<dyn Plugin, (), _>(|(), _| Ok(Arc::new(Noop)))
            .contribute::<Port, (), _>(|(), _| Ok(Arc::new(Port(80))));

        assert!(matches!(
            registry.check(),
            Err(ContainerError::GroupTypeMismatch { group: "plugins", .. })
        ));
    }

    #[test]
    fn test_include_applies_module() {
        fn module(registry: &mut ProviderRegistry) {
            registry.supply(Port(8080));
        }

        let mut registry = ProviderRegistry::new();
        registry.include(module);

        assert_eq!(registry.len(), 1);
        assert!(registry.producers.contains_key(&TypeKey::of::<Port>()));
    }
}
