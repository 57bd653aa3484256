//! Registration list shared by a root container and all of its scopes.
//!
//! The list is append-only. Lookups scan it newest-first so a later
//! registration for the same type overrides an earlier one.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{AmbarError, InvalidReason, InvalidRegistrationError, Result};
use crate::generic::{self, Candidate};
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::registration::Registration;

/// Resolves services by key.
///
/// This is what factories receive to resolve their own dependencies, and
/// the capability external subsystems consume to obtain "an instance for
/// this type". Typed helpers live in
/// [`ResolverApi`](crate::container::ResolverApi).
pub trait Resolver {
    /// Resolves `key`, or returns `Ok(None)` if nothing provides it.
    fn get_service(&self, key: &TypeKey) -> Result<Option<Instance>>;

    /// Names of registered types, for diagnostics.
    fn registered_type_names(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// Stores all registrations.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    registrations: RwLock<Vec<Arc<Registration>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, registration: Registration) {
        debug!(
            service = %registration.service(),
            lifetime = %registration.lifetime(),
            id = registration.id(),
            open = registration.is_open(),
            "Registered service"
        );
        self.registrations.write().push(Arc::new(registration));
    }

    /// Finds the registration answering `key`.
    ///
    /// Direct registrations win; a closed generic key then falls back to
    /// the newest open registration of its definition.
    ///
    /// # Errors
    /// [`AmbarError::InvalidRegistration`] if that open registration has no
    /// closing for the key's type arguments.
    pub fn find(&self, key: &TypeKey) -> Result<Option<Candidate>> {
        let registrations = self.registrations.read();

        if let Some(direct) = registrations
            .iter()
            .rev()
            .find(|r| !r.is_open() && r.service() == key)
        {
            return Ok(Some(Candidate::direct(direct.clone())));
        }

        let Some(definition) = key.definition() else {
            return Ok(None);
        };

        let open = registrations
            .iter()
            .rev()
            .find_map(|r| r.closings().filter(|_| r.service() == definition).map(|c| (r, c)));

        match open {
            None => Ok(None),
            Some((registration, closings)) => {
                trace!(requested = %key, definition = %definition, "Closing open generic");
                generic::close_over(closings, key.arguments())
                    .map(|closing| Some(Candidate::closed(registration.clone(), closing)))
                    .ok_or_else(|| {
                        AmbarError::InvalidRegistration(InvalidRegistrationError {
                            key: key.clone(),
                            reason: InvalidReason::NoClosing,
                        })
                    })
            }
        }
    }

    /// Every registration contributing to a collection of `element`.
    pub fn elements(&self, element: &TypeKey) -> Vec<Candidate> {
        generic::collect_elements(&self.registrations.read(), element)
    }

    /// A consistent copy of the list.
    pub fn snapshot(&self) -> Vec<Arc<Registration>> {
        self.registrations.read().clone()
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.registrations
            .read()
            .iter()
            .map(|r| r.service().type_name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activator::{Constructor, Injectable};
    use crate::generic::{Closed, OpenGeneric};
    use crate::lifetime::Lifetime;
    use std::marker::PhantomData;

    struct Database;
    impl Injectable for Database {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(vec![], |_| Ok(Database))]
        }
    }

    struct Cache<T>(PhantomData<fn() -> T>);
    enum CacheOf {}
    impl<T: 'static> Closed for Cache<T> {
        type Definition = CacheOf;
        fn arguments() -> Vec<TypeKey> {
            vec![TypeKey::of::<T>()]
        }
    }
    impl<T: 'static> Injectable for Cache<T> {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(vec![], |_| Ok(Cache(PhantomData)))]
        }
    }

    #[test]
    fn push_and_find() {
        let registry = Registry::new();
        registry.push(Registration::activated::<Database>(Lifetime::Singleton));
        assert_eq!(registry.len(), 1);
        assert!(registry.find(&TypeKey::of::<Database>()).unwrap().is_some());
        assert!(registry.find(&TypeKey::of::<String>()).unwrap().is_none());
    }

    #[test]
    fn newest_registration_wins() {
        let registry = Registry::new();
        registry.push(Registration::activated::<Database>(Lifetime::Singleton));
        registry.push(Registration::activated::<Database>(Lifetime::Transient));

        let found = registry.find(&TypeKey::of::<Database>()).unwrap().unwrap();
        assert_eq!(found.registration.lifetime(), Lifetime::Transient);
    }

    #[test]
    fn closed_key_falls_back_to_open_registration() {
        let registry = Registry::new();
        registry.push(Registration::open(
            OpenGeneric::<CacheOf>::new().close::<Cache<u8>, Cache<u8>>(),
            Lifetime::Singleton,
        ));

        let found = registry.find(&TypeKey::closed::<Cache<u8>>()).unwrap().unwrap();
        assert_eq!(found.service, TypeKey::of::<Cache<u8>>());
        assert!(found.registration.is_open());

        // a plain key never consults open registrations
        assert!(registry.find(&TypeKey::of::<Cache<u8>>()).unwrap().is_none());
    }

    #[test]
    fn direct_registration_beats_open_one() {
        let registry = Registry::new();
        registry.push(Registration::activated::<Cache<u8>>(Lifetime::Transient));
        registry.push(Registration::open(
            OpenGeneric::<CacheOf>::new().close::<Cache<u8>, Cache<u8>>(),
            Lifetime::Singleton,
        ));

        let found = registry.find(&TypeKey::closed::<Cache<u8>>()).unwrap().unwrap();
        assert!(!found.registration.is_open());
    }

    #[test]
    fn missing_closing_is_invalid_registration() {
        let registry = Registry::new();
        registry.push(Registration::open(
            OpenGeneric::<CacheOf>::new().close::<Cache<u8>, Cache<u8>>(),
            Lifetime::Singleton,
        ));

        let result = registry.find(&TypeKey::closed::<Cache<u64>>());
        match result {
            Err(AmbarError::InvalidRegistration(e)) => assert_eq!(e.reason, InvalidReason::NoClosing),
            other => panic!("Expected InvalidRegistration, got: {:?}", other.map(|c| c.is_some())),
        }
    }

    #[test]
    fn type_names_in_registration_order() {
        let registry = Registry::new();
        registry.push(Registration::activated::<Database>(Lifetime::Singleton));
        registry.push(Registration::of::<String>(Lifetime::Transient));
        let names = registry.type_names();
        assert!(names[0].contains("Database"));
        assert!(names[1].contains("String"));
        assert_eq!(registry.snapshot().len(), 2);
    }
}
