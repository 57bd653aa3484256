//! Constructor-based activation.
//!
//! A type becomes constructible by the container by implementing
//! [`Injectable`]: it lists its constructors, each one an ordered set of
//! [`Parameter`]s plus a build closure. The container picks a constructor,
//! resolves its parameters and calls it.
//!
//! # Constructor selection
//! With a single constructor, that one is used. With several, the one with
//! the fewest parameters wins; among equals the first declared wins.
//!
//! # Examples
//! ```
//! use ambar_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Clock;
//! impl Injectable for Clock {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(vec![], |_| Ok(Clock))]
//!     }
//! }
//!
//! struct Audit { clock: Option<Arc<Clock>> }
//! impl Injectable for Audit {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(vec![Parameter::of::<Clock>()], |args| {
//!             Ok(Audit { clock: args.get::<Clock>(0)? })
//!         })]
//!     }
//! }
//!
//! let container = Container::new();
//! container.add(Registration::activated::<Clock>(Lifetime::Singleton));
//! container.add(Registration::activated::<Audit>(Lifetime::Transient));
//!
//! let audit = container.resolve_required::<Audit>().unwrap();
//! assert!(audit.clock.is_some());
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{AmbarError, InvalidReason, InvalidRegistrationError, Result};
use crate::generic::{Candidate, Closed};
use crate::instance::{Dispose, Instance};
use crate::key::TypeKey;
use crate::registry::Resolver;

/// Activation descriptor of a constructible type.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// The constructors the container may call.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Disposal hook for a freshly built instance.
    ///
    /// Types implementing [`Dispose`] return `Some(instance.clone())` so the
    /// container tracks them; the default tracks nothing.
    fn disposer(_instance: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
        None
    }
}

/// Converts a shared implementation into the shared service it is
/// registered as, typically a trait object.
///
/// Every type upcasts to itself. For trait objects use the [`upcast!`]
/// macro or write the one-line impl by hand.
///
/// [`upcast!`]: crate::upcast
pub trait Upcast<S: ?Sized>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Upcast<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Implements [`Upcast`] from a concrete type to one or more trait objects.
///
/// ```
/// use ambar_container::upcast;
///
/// trait Mailer: Send + Sync {}
/// trait Notifier: Send + Sync {}
/// struct Smtp;
/// impl Mailer for Smtp {}
/// impl Notifier for Smtp {}
///
/// upcast!(Smtp => dyn Mailer, dyn Notifier);
/// ```
#[macro_export]
macro_rules! upcast {
    ($implementation:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::activator::Upcast<$service> for $implementation {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

type DefaultFn = Arc<dyn Fn() -> Instance + Send + Sync>;

/// A constructor parameter: the key to resolve plus an optional default
/// used when nothing is registered for it.
#[derive(Clone)]
pub struct Parameter {
    key: TypeKey,
    default: Option<DefaultFn>,
}

impl Parameter {
    /// A parameter of service type `T`, read with [`Arguments::get`].
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::keyed(TypeKey::of::<T>())
    }

    /// A parameter of closed generic type `T`, which may be satisfied by an
    /// open registration of its definition.
    pub fn closed<T: Closed + ?Sized>() -> Self {
        Self::keyed(TypeKey::closed::<T>())
    }

    /// A parameter receiving every registration of `T`, read with
    /// [`Arguments::all`].
    pub fn all<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self::keyed(TypeKey::collection_of::<T>())
    }

    pub fn keyed(key: TypeKey) -> Self {
        Self { key, default: None }
    }

    /// Supplies a value when the parameter type resolves to nothing.
    pub fn with_default<T: ?Sized + Send + Sync + 'static>(
        mut self,
        default: impl Fn() -> Arc<T> + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(Arc::new(move || Instance::new(default())));
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("key", &self.key)
            .field("has_default", &self.has_default())
            .finish()
    }
}

type BuildFn<T> = Box<dyn Fn(&Arguments) -> Result<T> + Send + Sync>;

/// One way of building `T` from resolved parameters.
pub struct Constructor<T> {
    parameters: Vec<Parameter>,
    build: BuildFn<T>,
}

impl<T> Constructor<T> {
    pub fn new(
        parameters: Vec<Parameter>,
        build: impl Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            parameters,
            build: Box::new(build),
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// Resolved constructor arguments, in parameter order.
///
/// A parameter whose type is not registered and has no default is absent,
/// not an error.
pub struct Arguments {
    values: Vec<Option<Instance>>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Option<Instance>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The argument at `index`, or `None` if it was not resolved.
    ///
    /// # Errors
    /// [`AmbarError::InvalidArgument`] for an index past the declared
    /// parameters, [`AmbarError::TypeMismatch`] if the value is not a `T`.
    pub fn get<T: ?Sized + 'static>(&self, index: usize) -> Result<Option<Arc<T>>> {
        let slot = self.values.get(index).ok_or_else(|| {
            AmbarError::InvalidArgument(format!(
                "argument index {index} out of range for {} parameters",
                self.values.len()
            ))
        })?;

        match slot {
            None => Ok(None),
            Some(instance) => instance.downcast::<T>().map(Some).ok_or_else(|| {
                AmbarError::TypeMismatch {
                    expected: std::any::type_name::<T>(),
                    found: instance.type_name(),
                }
            }),
        }
    }

    /// Like [`Arguments::get`], failing when the argument is absent.
    pub fn required<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>> {
        self.get::<T>(index)?.ok_or_else(|| {
            AmbarError::InvalidArgument(format!(
                "argument {index} ({}) was not resolved",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Reads a [`Parameter::all`] argument.
    pub fn all<T: ?Sized + 'static>(&self, index: usize) -> Result<Vec<Arc<T>>> {
        Ok(self
            .get::<Vec<Arc<T>>>(index)?
            .map(|items| (*items).clone())
            .unwrap_or_default())
    }
}

type ErasedBuildFn = Arc<dyn Fn(&Arguments) -> Result<Instance> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct ErasedConstructor {
    pub parameters: Vec<Parameter>,
    build: ErasedBuildFn,
}

/// A concrete implementation type together with its constructors, erased
/// to produce instances of one service type.
#[derive(Clone)]
pub struct Implementation {
    key: TypeKey,
    constructors: Arc<[ErasedConstructor]>,
}

impl Implementation {
    /// `I` activated and exposed as `S`.
    pub fn of<S, I>() -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<S>,
    {
        let constructors: Vec<ErasedConstructor> = I::constructors()
            .into_iter()
            .map(|constructor| {
                let Constructor { parameters, build } = constructor;
                let build: ErasedBuildFn = Arc::new(move |args: &Arguments| {
                    let built = Arc::new(build(args)?);
                    let disposer = I::disposer(&built);
                    let instance = Instance::new::<S>(<I as Upcast<S>>::upcast(built));
                    Ok(match disposer {
                        Some(disposer) => instance.with_disposer(disposer),
                        None => instance,
                    })
                });
                ErasedConstructor { parameters, build }
            })
            .collect();

        Self {
            key: TypeKey::of::<I>(),
            constructors: constructors.into(),
        }
    }

    /// The implementation type.
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// Parameters of the constructor activation would use.
    pub fn selected_parameters(&self) -> Option<&[Parameter]> {
        select_constructor(&self.constructors).map(|c| c.parameters.as_slice())
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("key", &self.key)
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

/// Fewest parameters wins; the first declared wins ties.
pub(crate) fn select_constructor(constructors: &[ErasedConstructor]) -> Option<&ErasedConstructor> {
    constructors
        .iter()
        .reduce(|best, c| if c.parameters.len() < best.parameters.len() { c } else { best })
}

/// Produces an instance for a matched registration.
///
/// Priority: prebuilt instance, then factory, then constructor activation
/// of the effective implementation (the requested type itself when no
/// implementation is set).
pub(crate) fn activate(candidate: &Candidate, resolver: &dyn Resolver) -> Result<Instance> {
    let registration = &candidate.registration;

    if let Some(instance) = registration.prebuilt() {
        trace!(service = %candidate.service, "Using prebuilt instance");
        return Ok(instance.clone());
    }

    if let Some(factory) = registration.factory_fn() {
        trace!(service = %candidate.service, "Invoking factory");
        return factory(resolver);
    }

    let Some(implementation) = &candidate.implementation else {
        let reason = if candidate.service.is_abstract() {
            InvalidReason::Abstract
        } else {
            InvalidReason::NoConstructors
        };
        return Err(invalid(candidate.service.clone(), reason));
    };

    if implementation.key.is_abstract() {
        return Err(invalid(implementation.key.clone(), InvalidReason::Abstract));
    }

    let constructor = select_constructor(&implementation.constructors)
        .ok_or_else(|| invalid(implementation.key.clone(), InvalidReason::NoConstructors))?;

    trace!(
        implementation = %implementation.key,
        parameters = constructor.parameters.len(),
        "Activating"
    );

    let mut values = Vec::with_capacity(constructor.parameters.len());
    for parameter in &constructor.parameters {
        let value = match resolver.get_service(&parameter.key)? {
            Some(value) => Some(value),
            None => parameter.default.as_ref().map(|default| default()),
        };
        values.push(value);
    }

    (constructor.build)(&Arguments::new(values))
}

fn invalid(key: TypeKey, reason: InvalidReason) -> AmbarError {
    AmbarError::InvalidRegistration(InvalidRegistrationError { key, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        via: usize,
    }

    fn widget_constructors(arities: &[usize]) -> Vec<Constructor<Widget>> {
        arities
            .iter()
            .enumerate()
            .map(|(position, &arity)| {
                let parameters = (0..arity).map(|_| Parameter::of::<u8>()).collect();
                Constructor::new(parameters, move |_| Ok(Widget { via: position }))
            })
            .collect()
    }

    fn erase(constructors: Vec<Constructor<Widget>>) -> Vec<ErasedConstructor> {
        constructors
            .into_iter()
            .map(|c| {
                let Constructor { parameters, build } = c;
                let build: ErasedBuildFn = Arc::new(move |args: &Arguments| {
                    Ok(Instance::new(Arc::new(build(args)?)))
                });
                ErasedConstructor { parameters, build }
            })
            .collect()
    }

    fn selected_position(arities: &[usize]) -> Option<usize> {
        let erased = erase(widget_constructors(arities));
        let chosen = select_constructor(&erased)?;
        let instance = (chosen.build)(&Arguments::new(vec![None; chosen.parameters.len()])).unwrap();
        Some(instance.downcast::<Widget>().unwrap().via)
    }

    #[test]
    fn single_constructor_is_used_whatever_its_arity() {
        assert_eq!(selected_position(&[3]), Some(0));
    }

    #[test]
    fn fewest_parameters_wins() {
        assert_eq!(selected_position(&[1, 0, 3]), Some(1));
        assert_eq!(selected_position(&[3, 1]), Some(1));
    }

    #[test]
    fn ties_keep_first_declared() {
        assert_eq!(selected_position(&[2, 1, 1]), Some(1));
    }

    #[test]
    fn no_constructors_selects_nothing() {
        assert_eq!(selected_position(&[]), None);
    }

    #[test]
    fn arguments_get_and_required() {
        let args = Arguments::new(vec![Some(Instance::new(Arc::new(7u32))), None]);
        assert_eq!(args.len(), 2);
        assert_eq!(*args.required::<u32>(0).unwrap(), 7);
        assert!(args.get::<u32>(1).unwrap().is_none());
        assert!(matches!(args.required::<u32>(1), Err(AmbarError::InvalidArgument(_))));
        assert!(matches!(args.get::<u32>(2), Err(AmbarError::InvalidArgument(_))));
        assert!(matches!(args.get::<String>(0), Err(AmbarError::TypeMismatch { .. })));
    }

    #[test]
    fn arguments_all_defaults_to_empty() {
        let items: Vec<Arc<u8>> = vec![Arc::new(1), Arc::new(2)];
        let args = Arguments::new(vec![Some(Instance::new(Arc::new(items))), None]);
        assert_eq!(args.all::<u8>(0).unwrap().len(), 2);
        assert!(args.all::<u8>(1).unwrap().is_empty());
    }

    #[test]
    fn parameter_default_flag() {
        let parameter = Parameter::of::<u32>().with_default(|| Arc::new(5u32));
        assert!(parameter.has_default());
        assert!(!Parameter::all::<u32>().has_default());
        assert!(Parameter::all::<u32>().key().element().is_some());
    }
}
