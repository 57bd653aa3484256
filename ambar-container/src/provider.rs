//! Provider trait: a module of related registrations.
//!
//! Providers group the registrations of one area of an application so
//! they can be added to a container in one call.
//!
//! # Examples
//! ```rust,ignore
//! struct StorageProvider;
//!
//! impl Provider for StorageProvider {
//!     fn register(&self, registry: &dyn ServiceRegistry) {
//!         registry.add(Registration::activated::<ConnectionPool>(Lifetime::Singleton));
//!         registry.add(Registration::bind::<dyn Repository, SqlRepository>(Lifetime::Scoped));
//!     }
//! }
//!
//! container.add_provider(&StorageProvider);
//! ```

use crate::registration::Registration;

/// A module that adds related registrations.
pub trait Provider: Send + Sync {
    /// Adds this provider's registrations.
    fn register(&self, registry: &dyn ServiceRegistry);

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Where providers add registrations.
///
/// Implemented by [`Container`](crate::container::Container); separate so
/// providers can be tested against a recording mock.
pub trait ServiceRegistry {
    fn add(&self, registration: Registration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::Lifetime;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingRegistry {
        added: Mutex<Vec<Registration>>,
    }

    impl ServiceRegistry for RecordingRegistry {
        fn add(&self, registration: Registration) {
            self.added.lock().push(registration);
        }
    }

    struct SettingsProvider;

    impl Provider for SettingsProvider {
        fn register(&self, registry: &dyn ServiceRegistry) {
            registry.add(Registration::instance(Arc::new(String::from("postgres://localhost"))));
            registry.add(Registration::factory::<u16, _>(Lifetime::Transient, |_| Ok(Arc::new(5432))));
        }
    }

    #[test]
    fn provider_adds_registrations() {
        let registry = RecordingRegistry::default();
        SettingsProvider.register(&registry);

        let added = registry.added.lock();
        assert_eq!(added.len(), 2);
        assert_eq!(added[1].lifetime(), Lifetime::Transient);
    }

    #[test]
    fn provider_has_name() {
        assert!(SettingsProvider.name().contains("SettingsProvider"));
    }
}
