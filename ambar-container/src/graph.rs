//! Dependency graph validation.
//!
//! [`Container::validate`](crate::container::Container::validate) checks
//! the currently visible registrations without constructing anything:
//! - Every registration can be activated (not abstract, has constructors)
//! - No circular dependencies
//! - No singleton depends on a scoped service
//!
//! Parameters with no registration are not errors: at resolution time they
//! receive their default or nothing. Factories and prebuilt instances are
//! opaque and contribute no edges.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, warn};

use crate::error::{
    AmbarError, CircularDependencyError, InvalidReason, InvalidRegistrationError,
    ScopeMismatchError,
};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::registration::Registration;

/// What validation needs to know about the effective registration of a
/// service type.
#[derive(Debug, Clone)]
pub(crate) struct DependencyInfo {
    pub key: TypeKey,
    pub dependencies: Vec<TypeKey>,
    pub lifetime: Lifetime,
    pub invalid: Option<InvalidReason>,
}

impl DependencyInfo {
    pub fn from_registration(registration: &Registration) -> Self {
        let key = registration.service().clone();
        let lifetime = registration.lifetime();

        if registration.prebuilt().is_some() || registration.factory_fn().is_some() {
            return Self { key, dependencies: vec![], lifetime, invalid: None };
        }

        let (dependencies, invalid) = match registration.implementation() {
            None if key.is_abstract() => (vec![], Some(InvalidReason::Abstract)),
            None => (vec![], Some(InvalidReason::NoConstructors)),
            Some(implementation) => match implementation.selected_parameters() {
                None => (vec![], Some(InvalidReason::NoConstructors)),
                Some(parameters) => (
                    parameters
                        .iter()
                        .map(|p| p.key().element().unwrap_or(p.key()).clone())
                        .collect(),
                    None,
                ),
            },
        };

        Self { key, dependencies, lifetime, invalid }
    }
}

/// Builds the graph from registrations in order; later registrations of
/// a type replace earlier ones. Open generic registrations are skipped.
pub(crate) fn build_graph<'a>(
    registrations: impl IntoIterator<Item = &'a Registration>,
) -> HashMap<TypeKey, DependencyInfo> {
    registrations
        .into_iter()
        .filter(|r| !r.is_open())
        .map(|r| (r.service().clone(), DependencyInfo::from_registration(r)))
        .collect()
}

/// Depth-first validator with a path stack for cycle reporting.
pub(crate) struct GraphValidator {
    dependencies: HashMap<TypeKey, DependencyInfo>,
    visiting: HashSet<TypeKey>,
    validated: HashSet<TypeKey>,
    path: Vec<TypeKey>,
}

impl GraphValidator {
    pub fn new(dependencies: HashMap<TypeKey, DependencyInfo>) -> Self {
        Self {
            dependencies,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates the entire graph, stopping at the first problem.
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<(), AmbarError> {
        let mut keys: Vec<TypeKey> = self.dependencies.keys().cloned().collect();
        // deterministic error for a given graph
        keys.sort_by_key(|k| k.type_name());

        debug!(service_count = keys.len(), "Validating dependency graph");

        for key in keys {
            self.validate_key(&key)?;
        }

        debug!("Dependency graph is valid");
        Ok(())
    }

    fn validate_key(&mut self, key: &TypeKey) -> Result<(), AmbarError> {
        if self.validated.contains(key) {
            return Ok(());
        }

        if self.visiting.contains(key) {
            let start = self.path.iter().position(|k| k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(key.clone());

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(AmbarError::CircularDependency(CircularDependencyError { chain }));
        }

        // unregistered dependencies resolve to nothing at runtime
        let Some(info) = self.dependencies.get(key).cloned() else {
            return Ok(());
        };

        if let Some(reason) = info.invalid {
            return Err(AmbarError::InvalidRegistration(InvalidRegistrationError {
                key: info.key,
                reason,
            }));
        }

        self.visiting.insert(key.clone());
        self.path.push(key.clone());

        for dependency in &info.dependencies {
            if let Some(dependency_info) = self.dependencies.get(dependency) {
                check_lifetimes(&info, dependency_info)?;
            }
            self.validate_key(dependency)?;
        }

        self.path.pop();
        self.visiting.remove(key);
        self.validated.insert(key.clone());

        Ok(())
    }
}

/// A singleton must not capture a scoped service.
///
/// Transients are fine anywhere: the consumer simply owns its copy.
fn check_lifetimes(consumer: &DependencyInfo, dependency: &DependencyInfo) -> Result<(), AmbarError> {
    if consumer.lifetime == Lifetime::Singleton && dependency.lifetime == Lifetime::Scoped {
        warn!(
            consumer = %consumer.key,
            dependency = %dependency.key,
            "Singleton depends on scoped service"
        );

        return Err(AmbarError::ScopeMismatch(ScopeMismatchError {
            dependency: dependency.key.clone(),
            dependency_lifetime: dependency.lifetime,
            consumer: consumer.key.clone(),
            consumer_lifetime: consumer.lifetime,
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(key: TypeKey, lifetime: Lifetime, dependencies: Vec<TypeKey>) -> DependencyInfo {
        DependencyInfo { key, dependencies, lifetime, invalid: None }
    }

    fn graph(infos: Vec<DependencyInfo>) -> HashMap<TypeKey, DependencyInfo> {
        infos.into_iter().map(|i| (i.key.clone(), i)).collect()
    }

    struct Database;
    struct Session;
    struct Checkout;
    struct Ledger;

    #[test]
    fn valid_simple_graph() {
        let g = graph(vec![
            info(TypeKey::of::<Database>(), Lifetime::Singleton, vec![]),
            info(TypeKey::of::<Session>(), Lifetime::Scoped, vec![TypeKey::of::<Database>()]),
            info(TypeKey::of::<Checkout>(), Lifetime::Transient, vec![TypeKey::of::<Session>()]),
        ]);
        assert!(GraphValidator::new(g).validate().is_ok());
    }

    #[test]
    fn detect_cycle() {
        let g = graph(vec![
            info(TypeKey::of::<Database>(), Lifetime::Transient, vec![TypeKey::of::<Session>()]),
            info(TypeKey::of::<Session>(), Lifetime::Transient, vec![TypeKey::of::<Checkout>()]),
            info(TypeKey::of::<Checkout>(), Lifetime::Transient, vec![TypeKey::of::<Database>()]),
        ]);

        match GraphValidator::new(g).validate() {
            Err(AmbarError::CircularDependency(err)) => {
                assert_eq!(err.chain.len(), 4);
                assert_eq!(err.chain.first(), err.chain.last());
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn detect_self_dependency() {
        let g = graph(vec![info(
            TypeKey::of::<Ledger>(),
            Lifetime::Singleton,
            vec![TypeKey::of::<Ledger>()],
        )]);
        assert!(GraphValidator::new(g).validate().is_err());
    }

    #[test]
    fn missing_dependency_is_allowed() {
        let g = graph(vec![info(
            TypeKey::of::<Checkout>(),
            Lifetime::Transient,
            vec![TypeKey::of::<Ledger>()],
        )]);
        assert!(GraphValidator::new(g).validate().is_ok());
    }

    #[test]
    fn singleton_capturing_scoped() {
        let g = graph(vec![
            info(TypeKey::of::<Session>(), Lifetime::Scoped, vec![]),
            info(TypeKey::of::<Ledger>(), Lifetime::Singleton, vec![TypeKey::of::<Session>()]),
        ]);

        match GraphValidator::new(g).validate() {
            Err(AmbarError::ScopeMismatch(err)) => {
                assert_eq!(err.consumer_lifetime, Lifetime::Singleton);
                assert_eq!(err.dependency_lifetime, Lifetime::Scoped);
            }
            other => panic!("Expected ScopeMismatch, got: {other:?}"),
        }
    }

    #[test]
    fn singleton_using_transient_is_fine() {
        let g = graph(vec![
            info(TypeKey::of::<Database>(), Lifetime::Transient, vec![]),
            info(TypeKey::of::<Ledger>(), Lifetime::Singleton, vec![TypeKey::of::<Database>()]),
        ]);
        assert!(GraphValidator::new(g).validate().is_ok());
    }

    #[test]
    fn invalid_registration_reported() {
        let mut bad = info(TypeKey::of::<Ledger>(), Lifetime::Transient, vec![]);
        bad.invalid = Some(InvalidReason::NoConstructors);

        match GraphValidator::new(graph(vec![bad])).validate() {
            Err(AmbarError::InvalidRegistration(err)) => {
                assert_eq!(err.reason, InvalidReason::NoConstructors);
            }
            other => panic!("Expected InvalidRegistration, got: {other:?}"),
        }
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let g = graph(vec![
            info(TypeKey::of::<Database>(), Lifetime::Singleton, vec![]),
            info(TypeKey::of::<Session>(), Lifetime::Singleton, vec![TypeKey::of::<Database>()]),
            info(TypeKey::of::<Checkout>(), Lifetime::Singleton, vec![TypeKey::of::<Database>()]),
            info(
                TypeKey::of::<Ledger>(),
                Lifetime::Singleton,
                vec![TypeKey::of::<Session>(), TypeKey::of::<Checkout>()],
            ),
        ]);
        assert!(GraphValidator::new(g).validate().is_ok());
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let first = Registration::of::<Ledger>(Lifetime::Transient);
        let second = Registration::instance(std::sync::Arc::new(Ledger));
        let g = build_graph([&first, &second]);
        assert_eq!(g.len(), 1);
        assert!(g[&TypeKey::of::<Ledger>()].invalid.is_none());
    }
}
