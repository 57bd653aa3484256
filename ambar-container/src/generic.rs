//! Open generic registrations and collection lookup.
//!
//! Rust cannot build `SqlRepository<T>` for a `T` discovered at runtime,
//! so an open generic registration carries a closing table filled in at
//! registration time: one closed service key and implementation per list
//! of type arguments. Resolving a closed key whose type has no direct
//! registration looks up its definition's table by argument list.
//!
//! # Examples
//! ```
//! use ambar_container::prelude::*;
//! use std::marker::PhantomData;
//!
//! trait Repository<T>: Send + Sync {}
//! enum RepositoryOf {}
//!
//! impl<T: 'static> Closed for dyn Repository<T> {
//!     type Definition = RepositoryOf;
//!     fn arguments() -> Vec<TypeKey> { vec![TypeKey::of::<T>()] }
//! }
//!
//! struct Memory<T>(PhantomData<fn() -> T>);
//! impl<T: 'static> Repository<T> for Memory<T> {}
//! impl<T: 'static> Injectable for Memory<T> {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(vec![], |_| Ok(Memory(PhantomData)))]
//!     }
//! }
//! impl<T: 'static> Upcast<dyn Repository<T>> for Memory<T> {
//!     fn upcast(self: std::sync::Arc<Self>) -> std::sync::Arc<dyn Repository<T>> { self }
//! }
//!
//! struct User;
//! struct Order;
//!
//! let container = Container::new();
//! container.add(Registration::open(
//!     OpenGeneric::<RepositoryOf>::new()
//!         .close::<dyn Repository<User>, Memory<User>>()
//!         .close::<dyn Repository<Order>, Memory<Order>>(),
//!     Lifetime::Singleton,
//! ));
//!
//! let users = container.resolve_closed::<dyn Repository<User>>().unwrap();
//! assert!(users.is_some());
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use crate::activator::{Implementation, Injectable, Upcast};
use crate::key::TypeKey;
use crate::registration::Registration;

/// Implemented by closed generic types to name their open definition and
/// their type arguments.
///
/// `Definition` is any marker type standing for the unbound generic, e.g.
/// an uninhabited `enum RepositoryOf {}` for `Repository<T>`.
pub trait Closed: 'static {
    type Definition: ?Sized + 'static;

    fn arguments() -> Vec<TypeKey>;
}

/// One entry of a closing table.
#[derive(Clone)]
pub struct Closing {
    pub(crate) arguments: Vec<TypeKey>,
    pub(crate) service: TypeKey,
    pub(crate) implementation: Implementation,
}

/// Closing table for the open generic `D`.
pub struct OpenGeneric<D: ?Sized> {
    closings: Vec<Closing>,
    _definition: PhantomData<fn() -> *const D>,
}

impl<D: ?Sized + 'static> OpenGeneric<D> {
    pub fn new() -> Self {
        Self {
            closings: Vec::new(),
            _definition: PhantomData,
        }
    }

    /// Adds the closing `S` (a closed form of `D`) implemented by `I`.
    ///
    /// A later closing for the same arguments replaces an earlier one.
    pub fn close<S, I>(mut self) -> Self
    where
        S: Closed<Definition = D> + ?Sized + Send + Sync,
        I: Injectable + Upcast<S>,
    {
        let arguments = S::arguments();
        self.closings.retain(|c| c.arguments != arguments);
        self.closings.push(Closing {
            arguments,
            service: TypeKey::closed::<S>(),
            implementation: Implementation::of::<S, I>(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.closings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closings.is_empty()
    }

    pub(crate) fn into_closings(self) -> Arc<[Closing]> {
        self.closings.into()
    }
}

impl<D: ?Sized + 'static> Default for OpenGeneric<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the closing matching `arguments`.
pub(crate) fn close_over<'a>(closings: &'a [Closing], arguments: &[TypeKey]) -> Option<&'a Closing> {
    closings.iter().find(|c| c.arguments == arguments)
}

/// A registration matched for a requested key, already closed if it was
/// an open generic.
#[derive(Clone)]
pub(crate) struct Candidate {
    pub registration: Arc<Registration>,
    /// The effective requested type (the closed form for open matches)
    pub service: TypeKey,
    /// The effective implementation (the closed form for open matches)
    pub implementation: Option<Implementation>,
}

impl Candidate {
    pub fn direct(registration: Arc<Registration>) -> Self {
        Self {
            service: registration.service().clone(),
            implementation: registration.implementation().cloned(),
            registration,
        }
    }

    pub fn closed(registration: Arc<Registration>, closing: &Closing) -> Self {
        Self {
            service: closing.service.clone(),
            implementation: Some(closing.implementation.clone()),
            registration,
        }
    }
}

/// Gathers every registration contributing to "a collection of `element`",
/// in registration order.
///
/// Direct registrations of the element type count, and so do open
/// registrations of its definition that can be closed over its arguments.
pub(crate) fn collect_elements(registrations: &[Arc<Registration>], element: &TypeKey) -> Vec<Candidate> {
    registrations
        .iter()
        .filter_map(|registration| match registration.closings() {
            None if registration.service() == element => Some(Candidate::direct(registration.clone())),
            Some(closings) if Some(registration.service()) == element.definition() => {
                close_over(closings, element.arguments())
                    .map(|closing| Candidate::closed(registration.clone(), closing))
            }
            _ => None,
        })
        .collect()
}
