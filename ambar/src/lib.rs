//! # Ambar: Dependency Injection Container for Rust
//!
//! A thread-safe IoC container with singleton, scoped and transient
//! lifetimes, constructor activation, open generics, collection
//! resolution and deterministic disposal.
//!
//! ```
//! use ambar::prelude::*;
//! use std::sync::Arc;
//!
//! struct Settings { name: &'static str }
//!
//! let container = Container::new();
//! container.add(Registration::instance(Arc::new(Settings { name: "shop" })));
//!
//! let scope = container.create_scope();
//! assert_eq!(scope.resolve_required::<Settings>()?.name, "shop");
//! # Ok::<(), ambar::AmbarError>(())
//! ```

pub use ambar_container::*;
pub use ambar_support::*;
