//! Registration records.
//!
//! A [`Registration`] describes how to produce instances of one requested
//! type. Exactly one source is used per resolution, in priority order:
//! prebuilt instance, factory, then constructor activation of the
//! implementation (or of the requested type itself).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::activator::{Implementation, Injectable, Upcast};
use crate::error::Result;
use crate::generic::{Closing, OpenGeneric};
use crate::instance::Instance;
use crate::key::{CacheKey, Producer, TypeKey};
use crate::lifetime::Lifetime;
use crate::registry::Resolver;

/// Factory producing an instance from the resolver it is invoked with.
///
/// # Why `Arc` and not `Box`?
/// Registrations are cloned into snapshots shared across threads.
pub type FactoryFn = Arc<dyn Fn(&dyn Resolver) -> Result<Instance> + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Immutable description of how to produce a service.
#[derive(Clone)]
pub struct Registration {
    id: u64,
    service: TypeKey,
    lifetime: Lifetime,
    implementation: Option<Implementation>,
    instance: Option<Instance>,
    factory: Option<FactoryFn>,
    closings: Option<Arc<[Closing]>>,
}

impl Registration {
    /// A bare record for `service`: activation uses the service type itself.
    ///
    /// Resolving it fails with an invalid-registration error unless a
    /// source is attached with one of the `with_*` methods.
    pub fn new(service: TypeKey, lifetime: Lifetime) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            service,
            lifetime,
            implementation: None,
            instance: None,
            factory: None,
            closings: None,
        }
    }

    /// A bare record for type `S`.
    pub fn of<S: ?Sized + 'static>(lifetime: Lifetime) -> Self {
        Self::new(TypeKey::of::<S>(), lifetime)
    }

    /// `S` implemented by activating `I`.
    pub fn bind<S, I>(lifetime: Lifetime) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<S>,
    {
        Self::of::<S>(lifetime).with_implementation(Implementation::of::<S, I>())
    }

    /// `T` implemented by activating itself.
    pub fn activated<T: Injectable>(lifetime: Lifetime) -> Self {
        Self::bind::<T, T>(lifetime)
    }

    /// A prebuilt singleton value.
    pub fn instance<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self::of::<S>(Lifetime::Singleton).with_instance(Instance::new(value))
    }

    /// `S` produced by `factory`.
    pub fn factory<S, F>(lifetime: Lifetime, factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<Arc<S>> + Send + Sync + 'static,
    {
        Self::of::<S>(lifetime).with_factory(Arc::new(move |resolver: &dyn Resolver| {
            factory(resolver).map(Instance::new)
        }))
    }

    /// An open generic registration for the definition `D`.
    pub fn open<D: ?Sized + 'static>(generic: OpenGeneric<D>, lifetime: Lifetime) -> Self {
        let mut registration = Self::of::<D>(lifetime);
        registration.closings = Some(generic.into_closings());
        registration
    }

    pub fn with_implementation(mut self, implementation: Implementation) -> Self {
        self.implementation = Some(implementation);
        self
    }

    pub fn with_instance(mut self, instance: Instance) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn with_factory(mut self, factory: FactoryFn) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Unique id of this record; clones share it.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The requested type this record answers.
    pub fn service(&self) -> &TypeKey {
        &self.service
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn implementation(&self) -> Option<&Implementation> {
        self.implementation.as_ref()
    }

    /// The prebuilt instance, if any.
    pub fn prebuilt(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn factory_fn(&self) -> Option<&FactoryFn> {
        self.factory.as_ref()
    }

    /// Returns `true` for open generic registrations.
    pub fn is_open(&self) -> bool {
        self.closings.is_some()
    }

    pub(crate) fn closings(&self) -> Option<&[Closing]> {
        self.closings.as_deref()
    }

    /// Cache identity for instances of `service` produced through this
    /// record, given the effective implementation.
    pub(crate) fn cache_key(&self, service: &TypeKey, implementation: Option<&Implementation>) -> CacheKey {
        let producer = if self.instance.is_some() || self.factory.is_some() {
            Producer::Registration(self.id)
        } else {
            Producer::Type(implementation.map_or_else(|| service.clone(), |i| i.key().clone()))
        };
        CacheKey {
            service: service.clone(),
            producer,
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("lifetime", &self.lifetime)
            .field("implementation", &self.implementation.as_ref().map(|i| i.key()))
            .field("instance", &self.instance.is_some())
            .field("factory", &self.factory.is_some())
            .field("open", &self.is_open())
            .finish()
    }
}
