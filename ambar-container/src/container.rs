//! # The Container: heart of Ambar
//!
//! A root [`Container`] owns the registration list and the singleton
//! cache. Scopes created from it share both and own a scoped cache and a
//! list of disposable transients.
//!
//! # Architecture
//! ```text
//!                 Container (root)
//!       registrations ─┬─ singletons
//!                      │
//!            create_scope() (any number, any depth)
//!                      │
//!                      ▼
//!                 Container (scope)
//!          scoped cache ── tracked transients
//! ```
//!
//! # Examples
//! ```rust
//! use ambar_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 { 42 }
//! }
//! impl Injectable for FixedClock {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(vec![], |_| Ok(FixedClock))]
//!     }
//! }
//! ambar_container::upcast!(FixedClock => dyn Clock);
//!
//! struct Invoice {
//!     clock: Arc<dyn Clock>,
//! }
//! impl Injectable for Invoice {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(vec![Parameter::of::<dyn Clock>()], |args| {
//!             Ok(Invoice { clock: args.required::<dyn Clock>(0)? })
//!         })]
//!     }
//! }
//!
//! let container = Container::new();
//! container.add(Registration::bind::<dyn Clock, FixedClock>(Lifetime::Singleton));
//! container.add(Registration::activated::<Invoice>(Lifetime::Scoped));
//!
//! let scope = container.create_scope();
//! let invoice = scope.resolve_required::<Invoice>().expect("Failed to resolve");
//! assert_eq!(invoice.clock.now(), 42);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ambar_support::rendering::{render_chain, shorten_type_name, suggest_similar};
use parking_lot::Mutex;
use tracing::{debug, instrument, trace, warn};

use crate::activator;
use crate::cache::InstanceCache;
use crate::error::{
    AmbarError, CircularDependencyError, NotRegisteredError, Result, ScopeMismatchError,
    ScopedFromRootError,
};
use crate::generic::{Candidate, Closed};
use crate::graph::{GraphValidator, build_graph};
use crate::instance::Instance;
use crate::key::{CacheKey, TypeKey};
use crate::lifetime::Lifetime;
use crate::options::ContainerOptions;
use crate::provider::{Provider, ServiceRegistry};
use crate::registration::Registration;
use crate::registry::{Registry, Resolver};

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// State shared by a root and every scope created from it.
struct Shared {
    registry: Registry,
    singletons: InstanceCache,
    options: ContainerOptions,
    /// Set when the root is disposed
    disposed: AtomicBool,
    next_scope: AtomicU64,
}

/// Thread-safe dependency injection container: either the root or a scope.
///
/// Dropping a container disposes it.
pub struct Container {
    shared: Arc<Shared>,
    /// `None` for the root
    scope_id: Option<u64>,
    scoped: InstanceCache,
    transients: Mutex<Vec<Instance>>,
    disposed: AtomicBool,
    dispose_lock: Mutex<()>,
}

impl Container {
    /// Creates a root container with default options.
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    /// Creates a root container.
    pub fn with_options(options: ContainerOptions) -> Self {
        debug!(?options, "Creating root container");
        let shared = Arc::new(Shared {
            registry: Registry::new(),
            singletons: InstanceCache::new(),
            options,
            disposed: AtomicBool::new(false),
            next_scope: AtomicU64::new(1),
        });
        Self::attach(shared, None)
    }

    fn attach(shared: Arc<Shared>, scope_id: Option<u64>) -> Self {
        Self {
            shared,
            scope_id,
            scoped: InstanceCache::new(),
            transients: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            dispose_lock: Mutex::new(()),
        }
    }

    /// Adds a registration, visible at once to the root and every scope.
    ///
    /// Ignored once this container or its root is disposed.
    pub fn add(&self, registration: Registration) {
        if self.is_disposed() {
            debug!(
                container = %self.label(),
                service = %registration.service(),
                "Ignoring registration on disposed container"
            );
            return;
        }
        self.shared.registry.push(registration);
    }

    /// Adds every registration of a [`Provider`].
    pub fn add_provider(&self, provider: &dyn Provider) {
        debug!(provider = provider.name(), "Adding provider");
        provider.register(self);
    }

    /// Creates a child scope sharing this container's registrations and
    /// the root's singletons, with its own scoped instances.
    pub fn create_scope(&self) -> Container {
        let id = self.shared.next_scope.fetch_add(1, Ordering::Relaxed);
        debug!(scope = id, parent = %self.label(), "Creating scope");
        Self::attach(self.shared.clone(), Some(id))
    }

    /// Resolves `key`.
    ///
    /// Returns `Ok(None)` when nothing is registered for it. Collection keys
    /// always resolve, possibly to an empty collection.
    ///
    /// # Errors
    /// - [`AmbarError::Disposed`]: this container or its root is disposed
    /// - [`AmbarError::ScopedFromRoot`]: a scoped service requested from the root
    /// - [`AmbarError::InvalidRegistration`]: the registration cannot be activated
    /// - [`AmbarError::CircularDependency`]: the service depends on itself
    /// - any error raised by a constructor or factory, unchanged
    pub fn get_service(&self, key: &TypeKey) -> Result<Option<Instance>> {
        Resolution::new(self).resolve(key)
    }

    /// Disposes owned instances; later calls do nothing.
    ///
    /// The root disposes singletons and its own tracked transients; a scope
    /// disposes its scoped instances and tracked transients, never
    /// singletons.
    #[instrument(skip(self), fields(container = %self.label()))]
    pub fn dispose(&self) {
        let _guard = self.dispose_lock.lock();
        if self.disposed.swap(true, Ordering::AcqRel) {
            trace!("Already disposed");
            return;
        }

        let cached = if self.is_root() {
            self.shared.disposed.store(true, Ordering::Release);
            self.shared.singletons.drain()
        } else {
            self.scoped.drain()
        };
        let transients = std::mem::take(&mut *self.transients.lock());

        // newest first
        for instance in transients.iter().rev() {
            instance.dispose();
        }
        for instance in &cached {
            instance.dispose();
        }

        debug!(cached = cached.len(), transients = transients.len(), "Container disposed");
    }

    /// Checks the registrations visible now for problems that would
    /// surface at resolution: abstract or constructor-less registrations,
    /// cycles, and singletons depending on scoped services.
    #[instrument(skip(self), fields(container = %self.label()))]
    pub fn validate(&self) -> Result<()> {
        let snapshot = self.shared.registry.snapshot();
        let graph = build_graph(snapshot.iter().map(|r| r.as_ref()));
        GraphValidator::new(graph).validate()
    }

    pub fn is_root(&self) -> bool {
        self.scope_id.is_none()
    }

    /// Returns `true` once this container or its root has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.shared.disposed.load(Ordering::Acquire)
    }

    /// Number of registrations, including overridden ones.
    pub fn len(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.shared.options
    }

    fn label(&self) -> String {
        match self.scope_id {
            None => "root".to_string(),
            Some(id) => format!("scope #{id}"),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        Ok(())
    }

    fn disposed_error(&self) -> AmbarError {
        AmbarError::Disposed { container: self.label() }
    }

    /// Records a disposable transient, or disposes it at once if this
    /// container was disposed while it was being built.
    fn track_transient(&self, instance: &Instance) -> Result<()> {
        let mut transients = self.transients.lock();
        if self.disposed.load(Ordering::Acquire) {
            debug!(instance = instance.type_name(), container = %self.label(), "Disposed during construction");
            instance.dispose();
            return Err(self.disposed_error());
        }
        trace!(instance = instance.type_name(), container = %self.label(), "Tracking disposable transient");
        transients.push(instance.clone());
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("scope", &self.label())
            .field("registered", &self.len())
            .field("singletons", &self.shared.singletons.len())
            .field("scoped", &self.scoped.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Resolver for Container {
    fn get_service(&self, key: &TypeKey) -> Result<Option<Instance>> {
        Container::get_service(self, key)
    }

    fn registered_type_names(&self) -> Vec<&'static str> {
        self.shared.registry.type_names()
    }
}

impl ServiceRegistry for Container {
    fn add(&self, registration: Registration) {
        Container::add(self, registration);
    }
}

// ═══════════════════════════════════════════
// Resolution (per-call state)
// ═══════════════════════════════════════════

struct Frame {
    key: CacheKey,
    lifetime: Lifetime,
}

/// One top-level `get_service` call. Tracks the chain of registrations
/// being activated so cycles and captured scoped services are caught
/// before they recurse.
struct Resolution<'a> {
    container: &'a Container,
    path: RefCell<Vec<Frame>>,
}

impl<'a> Resolution<'a> {
    fn new(container: &'a Container) -> Self {
        Self {
            container,
            path: RefCell::new(Vec::new()),
        }
    }

    fn shared(&self) -> &Shared {
        &self.container.shared
    }

    fn resolve(&self, key: &TypeKey) -> Result<Option<Instance>> {
        self.container.ensure_live()?;
        trace!(requested = %key, container = %self.container.label(), "Resolving");

        if let Some(candidate) = self.shared().registry.find(key)? {
            return self.instantiate(&candidate).map(Some);
        }

        if let Some(element) = key.element() {
            let candidates = self.shared().registry.elements(element);
            trace!(element = %element, count = candidates.len(), "Resolving collection");
            let items = candidates
                .iter()
                .map(|candidate| self.instantiate(candidate))
                .collect::<Result<Vec<_>>>()?;
            return Ok(key.assemble(items));
        }

        trace!(requested = %key, "No registration");
        Ok(None)
    }

    /// Applies the registration's lifetime.
    fn instantiate(&self, candidate: &Candidate) -> Result<Instance> {
        let registration = &candidate.registration;
        let lifetime = registration.lifetime();
        let key = registration.cache_key(&candidate.service, candidate.implementation.as_ref());
        self.check_path(&key, lifetime)?;

        match lifetime {
            Lifetime::Singleton => {
                let cached = self
                    .shared()
                    .singletons
                    .get_or_try_insert_with(key.clone(), || self.activate(candidate, &key, lifetime))?;
                cached.ok_or_else(|| self.container.disposed_error())
            }
            Lifetime::Scoped => {
                if self.container.is_root() {
                    return Err(AmbarError::ScopedFromRoot(ScopedFromRootError {
                        key: candidate.service.clone(),
                    }));
                }
                let cached = self
                    .container
                    .scoped
                    .get_or_try_insert_with(key.clone(), || self.activate(candidate, &key, lifetime))?;
                cached.ok_or_else(|| self.container.disposed_error())
            }
            Lifetime::Transient => {
                let instance = self.activate(candidate, &key, lifetime)?;
                // prebuilt instances are not ours to track
                if instance.is_disposable()
                    && registration.prebuilt().is_none()
                    && self.shared().options.track_transient_disposables
                {
                    self.container.track_transient(&instance)?;
                }
                Ok(instance)
            }
        }
    }

    fn activate(&self, candidate: &Candidate, key: &CacheKey, lifetime: Lifetime) -> Result<Instance> {
        self.path.borrow_mut().push(Frame { key: key.clone(), lifetime });
        let result = activator::activate(candidate, self);
        self.path.borrow_mut().pop();
        result
    }

    fn check_path(&self, key: &CacheKey, lifetime: Lifetime) -> Result<()> {
        let path = self.path.borrow();

        if let Some(start) = path.iter().position(|frame| frame.key == *key) {
            let mut chain: Vec<TypeKey> = path[start..].iter().map(|f| f.key.service.clone()).collect();
            chain.push(key.service.clone());

            let names: Vec<String> = chain.iter().map(|k| shorten_type_name(k.type_name())).collect();
            warn!(cycle = %render_chain(&names), "Circular dependency detected");
            return Err(AmbarError::CircularDependency(CircularDependencyError { chain }));
        }

        if self.shared().options.validate_scopes && lifetime == Lifetime::Scoped {
            if let Some(consumer) = path.iter().rev().find(|f| f.lifetime == Lifetime::Singleton) {
                warn!(
                    consumer = %consumer.key,
                    dependency = %key,
                    "Singleton is capturing a scoped service"
                );
                return Err(AmbarError::ScopeMismatch(ScopeMismatchError {
                    dependency: key.service.clone(),
                    dependency_lifetime: lifetime,
                    consumer: consumer.key.service.clone(),
                    consumer_lifetime: consumer.lifetime,
                }));
            }
        }

        Ok(())
    }
}

impl Resolver for Resolution<'_> {
    fn get_service(&self, key: &TypeKey) -> Result<Option<Instance>> {
        self.resolve(key)
    }

    fn registered_type_names(&self) -> Vec<&'static str> {
        self.shared().registry.type_names()
    }
}

// ═══════════════════════════════════════════
// Typed resolution
// ═══════════════════════════════════════════

/// Typed helpers over any [`Resolver`], including the `&dyn Resolver`
/// factories receive.
///
/// ```rust,ignore
/// let mailer: Option<Arc<dyn Mailer>> = resolver.resolve::<dyn Mailer>()?;
/// let plugins: Vec<Arc<dyn Plugin>> = resolver.resolve_all::<dyn Plugin>()?;
/// ```
pub trait ResolverApi: Resolver {
    /// Resolves `T`, or `None` if nothing provides it.
    fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        self.resolve_key::<T>(&TypeKey::of::<T>())
    }

    /// Resolves `T`, failing with [`AmbarError::NotRegistered`] if nothing
    /// provides it.
    fn resolve_required<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve::<T>()?
            .ok_or_else(|| not_registered(self, TypeKey::of::<T>()))
    }

    /// Resolves the closed generic `T`, falling back to an open
    /// registration of its definition.
    fn resolve_closed<T: Closed + ?Sized + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
        self.resolve_key::<T>(&TypeKey::closed::<T>())
    }

    /// Resolves every registration of `T`, in registration order.
    fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        let items = self.resolve_key::<Vec<Arc<T>>>(&TypeKey::collection_of::<T>())?;
        Ok(items.map(|items| (*items).clone()).unwrap_or_default())
    }

    /// Resolves `key` and downcasts the result to `T`.
    fn resolve_key<T: ?Sized + 'static>(&self, key: &TypeKey) -> Result<Option<Arc<T>>> {
        match self.get_service(key)? {
            None => Ok(None),
            Some(instance) => instance.downcast::<T>().map(Some).ok_or_else(|| {
                AmbarError::TypeMismatch {
                    expected: std::any::type_name::<T>(),
                    found: instance.type_name(),
                }
            }),
        }
    }
}

impl<R: Resolver + ?Sized> ResolverApi for R {}

fn not_registered<R: Resolver + ?Sized>(resolver: &R, requested: TypeKey) -> AmbarError {
    let names = resolver.registered_type_names();
    let suggestions = suggest_similar(requested.type_name(), &names, 3);
    AmbarError::NotRegistered(NotRegisteredError { requested, suggestions })
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ResolverApi};
    pub use crate::activator::{Arguments, Constructor, Implementation, Injectable, Parameter, Upcast};
    pub use crate::error::{AmbarError, ErrorKind, Result};
    pub use crate::generic::{Closed, OpenGeneric};
    pub use crate::instance::{Dispose, Instance};
    pub use crate::key::TypeKey;
    pub use crate::lifetime::Lifetime;
    pub use crate::options::ContainerOptions;
    pub use crate::provider::{Provider, ServiceRegistry};
    pub use crate::registration::Registration;
    pub use crate::registry::Resolver;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
