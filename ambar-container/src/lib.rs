//! Core container implementation for Ambar DI.

pub mod activator;
mod cache;
pub mod container;
pub mod error;
pub mod generic;
mod graph;
pub mod instance;
pub mod key;
pub mod lifetime;
pub mod options;
pub mod provider;
pub mod registration;
pub mod registry;

pub use activator::{Arguments, Constructor, Implementation, Injectable, Parameter, Upcast};
pub use container::{Container, ResolverApi, prelude};
pub use error::{AmbarError, ErrorKind, Result};
pub use generic::{Closed, OpenGeneric};
pub use instance::{Dispose, Instance};
pub use key::TypeKey;
pub use lifetime::Lifetime;
pub use options::ContainerOptions;
pub use registration::Registration;
pub use registry::Resolver;
