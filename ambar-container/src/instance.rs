//! Type-erased service instances and the disposal capability.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Synchronous teardown for services holding resources.
///
/// The container calls [`Dispose::dispose`] exactly once per tracked
/// instance when the owning container or scope is disposed.
///
/// ```
/// use ambar_container::instance::Dispose;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Connection { closed: AtomicBool }
///
/// impl Dispose for Connection {
///     fn dispose(&self) {
///         self.closed.store(true, Ordering::SeqCst);
///     }
/// }
/// ```
pub trait Dispose: Send + Sync {
    fn dispose(&self);
}

/// A resolved service, erased.
///
/// Holds an `Arc<T>` for the service type `T` (which may be a trait
/// object) and, if the value can be disposed, a handle to its [`Dispose`]
/// implementation. Cloning is cheap and keeps identity.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    disposer: Option<Arc<Disposer>>,
}

/// Shared by all clones of an [`Instance`] so teardown runs once.
struct Disposer {
    handle: Arc<dyn Dispose>,
    done: AtomicBool,
}

impl Instance {
    /// Wraps a shared value without a disposal capability.
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
            disposer: None,
        }
    }

    /// Wraps a value that the container should dispose.
    pub fn disposable<T: Dispose + 'static>(value: Arc<T>) -> Self {
        let disposer: Arc<dyn Dispose> = value.clone();
        Self::new(value).with_disposer(disposer)
    }

    /// Attaches a disposal handle, e.g. the concrete type behind a
    /// trait-object service.
    pub fn with_disposer(mut self, disposer: Arc<dyn Dispose>) -> Self {
        self.disposer = Some(Arc::new(Disposer {
            handle: disposer,
            done: AtomicBool::new(false),
        }));
        self
    }

    /// Returns the service as `Arc<T>` if it was stored as `T`.
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Returns `true` if the service was stored as `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.value.is::<Arc<T>>()
    }

    /// Name of the stored service type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    /// Returns `true` if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Runs the disposal hook; later calls on this instance or its clones
    /// do nothing.
    pub(crate) fn dispose(&self) {
        if let Some(disposer) = &self.disposer {
            if !disposer.done.swap(true, Ordering::AcqRel) {
                disposer.handle.dispose();
            }
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name)
            .field("disposable", &self.is_disposable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[derive(Default)]
    struct Handle {
        disposed: AtomicU32,
    }
    impl Dispose for Handle {
        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn downcast_trait_object() {
        let instance = Instance::new(Arc::new(English) as Arc<dyn Greeter>);
        assert!(instance.is::<dyn Greeter>());
        assert!(!instance.is::<English>());
        assert_eq!(instance.downcast::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn clones_share_identity() {
        let a = Instance::new(Arc::new(5u64));
        let b = a.clone();
        let c = Instance::new(Arc::new(5u64));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn disposable_calls_through() {
        let handle = Arc::new(Handle::default());
        let instance = Instance::disposable(handle.clone());
        assert!(instance.is_disposable());
        instance.dispose();
        assert_eq!(handle.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn plain_instance_dispose_is_noop() {
        let instance = Instance::new(Arc::new(String::from("x")));
        assert!(!instance.is_disposable());
        instance.dispose();
        assert!(format!("{instance:?}").contains("String"));
    }

    #[test]
    fn dispose_runs_once_across_clones() {
        let handle = Arc::new(Handle::default());
        let instance = Instance::disposable(handle.clone());
        let clone = instance.clone();

        instance.dispose();
        clone.dispose();
        instance.dispose();
        assert_eq!(handle.disposed.load(Ordering::SeqCst), 1);
    }
}
