//! Graph resolution.
//!
//! # Data Flow
//! ```text
//! ProviderRegistry
//!     → registration issues
//!     → requirement / group validation
//!     → topological order (Kahn, ties by registration index)
//!     → constructors in order, hooks committed per success
//!     → invoke-only steps in registration order
//!     → Container
//! ```
//!
//! Every structural error is reported before the first constructor runs.

use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::container::error::{panic_message, ContainerError};
use crate::container::inject::{Instance, Scope};
use crate::container::key::{GroupId, Requirement, TypeKey};
use crate::container::registry::{Output, ProvideContext, ProviderRegistry};
use crate::lifecycle::Lifecycle;

const CONFIG_LABEL: &str = "configuration snapshot";

/// Every constructed singleton plus the hooks they attached.
pub struct Container {
    instances: HashMap<TypeKey, Instance>,
    construction_order: Vec<String>,
    lifecycle: Lifecycle,
}

impl Container {
    /// The singleton of `T`, if one was constructed.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instances
            .get(&TypeKey::of::<T>())
            .and_then(|instance| instance.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Labels of the providers in the order they were run.
    pub fn construction_order(&self) -> &[String] {
        &self.construction_order
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("components", &self.instances.len())
            .field("construction_order", &self.construction_order)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// Validate the registry, then construct every provider exactly once.
///
/// `config` is available to any provider that asks for `Arc<C>`.
pub fn resolve<C: Send + Sync + 'static>(
    registry: &ProviderRegistry,
    config: Arc<C>,
) -> Result<Container, ContainerError> {
    registry.check()?;

    let config_key = TypeKey::of::<C>();
    if registry.producers.contains_key(&config_key) {
        return Err(ContainerError::DuplicateProvider {
            type_name: config_key.name(),
            existing: CONFIG_LABEL.to_string(),
        });
    }

    let (constructors, invocations): (Vec<usize>, Vec<usize>) = (0..registry.entries.len())
        .partition(|&index| registry.entries[index].output != Output::Nothing);

    validate(registry, config_key)?;
    let order = sort(registry, &constructors)?;

    let mut instances: HashMap<TypeKey, Instance> = HashMap::new();
    instances.insert(config_key, Box::new(config));
    let mut members: HashMap<GroupId, Vec<Instance>> = HashMap::new();
    let mut construction_order = Vec::with_capacity(registry.entries.len());
    let mut lifecycle = Lifecycle::new();

    for index in order.into_iter().chain(invocations) {
        let entry = &registry.entries[index];
        let mut ctx = ProvideContext::new(&entry.label);
        let produced = {
            let scope = Scope {
                instances: &instances,
                members: &members,
                requester: &entry.label,
            };
            match panic::catch_unwind(AssertUnwindSafe(|| (entry.construct)(&scope, &mut ctx))) {
                Ok(produced) => produced?,
                Err(payload) => {
                    return Err(ContainerError::constructor(
                        &entry.label,
                        format!("panicked: {}", panic_message(payload.as_ref())).into(),
                    ))
                }
            }
        };

        for hook in ctx.into_hooks() {
            lifecycle.append(hook);
        }
        match (entry.output, produced) {
            (Output::Component(key), Some(instance)) => {
                instances.insert(key, instance);
            }
            (Output::Member(id), Some(instance)) => {
                members.entry(id).or_default().push(instance);
            }
            _ => {}
        }

        tracing::debug!(provider = %entry.label, "Constructed");
        construction_order.push(entry.label.clone());
    }

    Ok(Container {
        instances,
        construction_order,
        lifecycle,
    })
}

fn validate(registry: &ProviderRegistry, config_key: TypeKey) -> Result<(), ContainerError> {
    let mut aggregators: HashMap<&'static str, &str> = HashMap::new();

    for entry in &registry.entries {
        for requirement in &entry.requirements {
            match *requirement {
                Requirement::Component(key) => {
                    if key != config_key && !registry.producers.contains_key(&key) {
                        return Err(ContainerError::MissingProvider {
                            type_name: key.name(),
                            required_by: entry.label.clone(),
                        });
                    }
                }
                Requirement::Group(id) => {
                    if let Some(bound) = registry.bindings.get(id.name) {
                        if *bound != id.member {
                            return Err(ContainerError::GroupTypeMismatch {
                                group: id.name,
                                expected: bound.name(),
                                found: id.member.name(),
                            });
                        }
                    }
                    if let Some(first) = aggregators.insert(id.name, &entry.label) {
                        return Err(ContainerError::DuplicateAggregator {
                            group: id.name,
                            first: first.to_string(),
                            second: entry.label.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

/// Order `nodes` so every provider follows the providers it depends on.
fn sort(registry: &ProviderRegistry, nodes: &[usize]) -> Result<Vec<usize>, ContainerError> {
    let entries = &registry.entries;
    let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut predecessors: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut indegree: HashMap<usize, usize> = nodes.iter().map(|&node| (node, 0)).collect();

    for &node in nodes {
        for requirement in &entries[node].requirements {
            let sources: Vec<usize> = match *requirement {
                Requirement::Component(key) => {
                    registry.producers.get(&key).copied().into_iter().collect()
                }
                Requirement::Group(id) => nodes
                    .iter()
                    .copied()
                    .filter(|&other| entries[other].output == Output::Member(id))
                    .collect(),
            };
            for source in sources {
                successors.entry(source).or_default().push(node);
                predecessors.entry(node).or_default().push(source);
                *indegree.entry(node).or_default() += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = indegree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&node, _)| node)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &next in successors.get(&node).into_iter().flatten() {
            if let Some(degree) = indegree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if order.len() == nodes.len() {
        return Ok(order);
    }

    let cycle = find_cycle(&indegree, &predecessors)
        .into_iter()
        .map(|node| entries[node].label.clone())
        .collect();
    Err(ContainerError::CyclicDependency { cycle })
}

/// Walk unresolved dependencies until a node repeats.
///
/// Every node left with a positive in-degree has an unresolved predecessor,
/// so the walk always closes a loop. The result reads in "depends on" order
/// and ends with its first element.
fn find_cycle(
    indegree: &HashMap<usize, usize>,
    predecessors: &HashMap<usize, Vec<usize>>,
) -> Vec<usize> {
    let blocked = |node: &usize| indegree.get(node).is_some_and(|&degree| degree > 0);
    let Some(mut current) = indegree.keys().copied().filter(blocked).min() else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    loop {
        if let Some(start) = path.iter().position(|&seen| seen == current) {
            let mut cycle = path.split_off(start);
            cycle.push(current);
            return cycle;
        }
        path.push(current);
        match predecessors
            .get(&current)
            .and_then(|sources| sources.iter().copied().filter(blocked).min())
        {
            Some(next) => current = next,
            None => return path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{BoxError, Capability, Group};
    use crate::lifecycle::Hook;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Settings {
        name: &'static str,
    }

    struct A;
    struct B(Arc<A>);
    struct C(Arc<B>);

    trait Part: Send + Sync {
        fn id(&self) -> usize;
    }

    impl Capability for dyn Part {
        const GROUP: &'static str = "parts";
    }

    struct Numbered(usize);

    impl Part for Numbered {
        fn id(&self) -> usize {
            self.0
        }
    }

    struct Assembly(Group<dyn Part>);

    fn settings() -> Arc<Settings> {
        Arc::new(Settings { name: "test" })
    }

    type Register = fn(&mut ProviderRegistry);

    fn register_a(registry: &mut ProviderRegistry) {
        registry.provide(|(), _| Ok(A));
    }

    fn register_b(registry: &mut ProviderRegistry) {
        registry.provide(|a: Arc<A>, _| Ok(B(a)));
    }

    fn register_c(registry: &mut ProviderRegistry) {
        registry.provide(|b: Arc<B>, _| Ok(C(b)));
    }

    #[test]
    fn test_resolves_any_registration_permutation() {
        let modules: [Register; 3] = [register_a, register_b, register_c];
        let permutations = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for permutation in permutations {
            let mut registry = ProviderRegistry::new();
            for index in permutation {
                registry.include(modules[index]);
            }

            let container = resolve(&registry, settings()).unwrap();
            let order: Vec<_> = container
                .construction_order()
                .iter()
                .map(|label| label.rsplit("::").next().unwrap_or_default())
                .collect();
            assert_eq!(order, ["A", "B", "C"], "permutation {permutation:?}");
            assert!(container.get::<C>().is_some());
        }
    }

    #[test]
    fn test_same_instance_is_shared() {
        let mut registry = ProviderRegistry::new();
        registry.include(register_a).include(register_b);
        registry.provide(|(a, b): (Arc<A>, Arc<B>), _| Ok(Arc::ptr_eq(&a, &b.0)));

        let container = resolve(&registry, settings()).unwrap();
        assert!(*container.get::<bool>().unwrap());
    }

    #[test]
    fn test_cycle_is_reported_before_any_constructor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ProviderRegistry::new();

        let counter = calls.clone();
        registry.provide(move |_: Arc<B>, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(A)
        });
        let counter = calls.clone();
        registry.provide(move |a: Arc<A>, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(B(a))
        });
        let counter = calls.clone();
        registry.provide(move |(), _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Settings { name: "unrelated" })
        });

        let err = resolve(&registry, Arc::new(0u8)).unwrap_err();
        let ContainerError::CyclicDependency { cycle } = err else {
            panic!("expected cycle");
        };
        assert_eq!(cycle.len(), 3);
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.iter().any(|label| label.ends_with("::A")));
        assert!(cycle.iter().any(|label| label.ends_with("::B")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_provider_names_type_and_requester() {
        let mut registry = ProviderRegistry::new();
        registry.include(register_b);

        match resolve(&registry, settings()) {
            Err(ContainerError::MissingProvider {
                type_name,
                required_by,
            }) => {
                assert!(type_name.ends_with("::A"));
                assert!(required_by.ends_with("::B"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_config_snapshot_is_injected() {
        let mut registry = ProviderRegistry::new();
        registry.provide(|config: Arc<Settings>, _| Ok(config.name.to_string()));

        let container = resolve(&registry, settings()).unwrap();
        assert_eq!(container.get::<String>().unwrap().as_str(), "test");
    }

    #[test]
    fn test_providing_config_type_is_duplicate() {
        let mut registry = ProviderRegistry::new();
        registry.provide(|(), _| Ok(Settings { name: "other" }));

        assert!(matches!(
            resolve(&registry, settings()),
            Err(ContainerError::DuplicateProvider { .. })
        ));
    }

    #[test]
    fn test_constructor_failure_exposes_nothing() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut registry = ProviderRegistry::new();

        let hook_counter = started.clone();
        registry.provide(move |(), ctx: &mut ProvideContext<'_>| {
            let counter = hook_counter.clone();
            ctx.append(Hook::new("a").on_start(move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
            Ok(A)
        });
        registry.provide(|_: Arc<A>, _| -> Result<B, BoxError> { Err("disk full".into()) });
        registry.include(register_c);

        match resolve(&registry, settings()) {
            Err(ContainerError::ConstructorFailure { provider, source }) => {
                assert!(provider.ends_with("::B"));
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_constructor_panic_becomes_failure() {
        let mut registry = ProviderRegistry::new();
        registry.include(register_a);
        registry.provide(|_: Arc<A>, _| -> Result<B, BoxError> { panic!("overlapping route") });

        match resolve(&registry, settings()) {
            Err(ContainerError::ConstructorFailure { provider, source }) => {
                assert!(provider.ends_with("::B"));
                assert!(source.to_string().contains("overlapping route"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_group_members_arrive_in_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry.provide(|parts: Group<dyn Part>, _| Ok(Assembly(parts)));
        for id in [3, 1, 2] {
            registry.contribute::<dyn Part, (), _>(move |(), _| Ok(Arc::new(Numbered(id))));
        }

        let container = resolve(&registry, settings()).unwrap();
        let assembly = container.get::<Assembly>().unwrap();
        let ids: Vec<_> = assembly.0.iter().map(|part| part.id()).collect();
        assert_eq!(ids, [3, 1, 2]);
        assert_eq!(assembly.0.name(), "parts");

        // Later registrations never reach an existing view.
        registry.contribute::<dyn Part, (), _>(|(), _| Ok(Arc::new(Numbered(9))));
        assert_eq!(assembly.0.len(), 3);
    }

    #[test]
    fn test_empty_group_is_allowed() {
        let mut registry = ProviderRegistry::new();
        registry.provide(|parts: Group<dyn Part>, _| Ok(Assembly(parts)));

        let container = resolve(&registry, settings()).unwrap();
        assert!(container.get::<Assembly>().unwrap().0.is_empty());
    }

    #[test]
    fn test_second_aggregator_is_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.provide(|parts: Group<dyn Part>, _| Ok(Assembly(parts)));
        registry.provide(|parts: Group<dyn Part>, _| Ok(parts.len()));

        assert!(matches!(
            resolve(&registry, settings()),
            Err(ContainerError::DuplicateAggregator { group: "parts", .. })
        ));
    }

    #[test]
    fn test_invocations_run_last_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ProviderRegistry::new();

        let log = seen.clone();
        registry.invoke(move |_: Arc<C>, _| {
            log.lock().unwrap().push("first");
            Ok(())
        });
        let log = seen.clone();
        registry.invoke(move |(), _| {
            log.lock().unwrap().push("second");
            Ok(())
        });
        registry
            .include(register_c)
            .include(register_b)
            .include(register_a);

        let container = resolve(&registry, settings()).unwrap();
        assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
        assert_eq!(container.construction_order()[3..], ["invoke#0", "invoke#1"]);
    }

    #[test]
    fn test_hooks_follow_construction_order() {
        let mut registry = ProviderRegistry::new();
        registry.provide(|b: Arc<B>, ctx: &mut ProvideContext<'_>| {
            ctx.append(Hook::new("c"));
            Ok(C(b))
        });
        registry.provide(|a: Arc<A>, ctx: &mut ProvideContext<'_>| {
            ctx.append(Hook::new("b"));
            Ok(B(a))
        });
        registry.provide(|(), ctx: &mut ProvideContext<'_>| {
            ctx.append(Hook::new("a"));
            Ok(A)
        });

        let container = resolve(&registry, settings()).unwrap();
        let hooks: Vec<_> = container.lifecycle().hook_names().collect();
        assert_eq!(hooks, ["a", "b", "c"]);
    }
}
