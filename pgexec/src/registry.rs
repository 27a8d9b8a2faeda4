//! Custom type handlers.
//!
//! Server types the value codec does not know can be given a handler:
//! a constructor from the type's text form. Handlers are registered
//! up front and the registry is immutable once built.
//!
//! ```
//! use pgexec::registry::{CustomValue, TypeRegistry};
//!
//! #[derive(Debug)]
//! struct Point(String);
//!
//! impl CustomValue for Point {
//!     fn type_name(&self) -> &str { "point" }
//!     fn value(&self) -> String { self.0.clone() }
//! }
//!
//! fn point(s: &str) -> pgexec::Result<Box<dyn CustomValue>> {
//!     Ok(Box::new(Point(s.to_owned())))
//! }
//!
//! let registry = TypeRegistry::builder().register("point", 600, point).build();
//! assert!(registry.constructor("point").is_some());
//! ```
use std::{collections::HashMap, fmt};

use crate::{Error, Result, postgres::Oid};

/// A value of a custom server type.
pub trait CustomValue: fmt::Debug + Send + Sync {
    /// Server type name.
    fn type_name(&self) -> &str;

    /// Text form, as sent to the server.
    fn value(&self) -> String;
}

/// Construct a custom value from its text form.
pub type Constructor = fn(&str) -> Result<Box<dyn CustomValue>>;

/// Immutable mapping from type name to handler.
#[derive(Default)]
pub struct TypeRegistry {
    by_name: HashMap<String, (Oid, Constructor)>,
    by_oid: HashMap<Oid, String>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder { registry: TypeRegistry::default() }
    }

    pub fn constructor(&self, name: &str) -> Option<Constructor> {
        self.by_name.get(name).map(|(_, ctor)| *ctor)
    }

    /// Returns registered type name of an oid.
    pub fn type_name(&self, oid: Oid) -> Option<&str> {
        self.by_oid.get(&oid).map(String::as_str)
    }

    pub fn oid(&self, name: &str) -> Option<Oid> {
        self.by_name.get(name).map(|(oid, _)| *oid)
    }

    /// Construct the value of a column of type `oid` from its text.
    pub fn construct(&self, oid: Oid, text: &str) -> Result<Box<dyn CustomValue>> {
        let ctor = self
            .type_name(oid)
            .and_then(|name| self.constructor(name))
            .ok_or_else(|| Error::mismatch(format!("No handler registered for type oid {oid}")))?;
        ctor(text)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.by_name.iter().map(|(name, (oid, _))| (name, oid)))
            .finish()
    }
}

/// Builder of [`TypeRegistry`].
pub struct TypeRegistryBuilder {
    registry: TypeRegistry,
}

impl TypeRegistryBuilder {
    /// Register handler, a later registration of the same name replaces it.
    pub fn register(mut self, name: impl Into<String>, oid: Oid, ctor: Constructor) -> Self {
        let name = name.into();
        if let Some((old, _)) = self.registry.by_name.insert(name.clone(), (oid, ctor)) {
            self.registry.by_oid.remove(&old);
        }
        self.registry.by_oid.insert(oid, name);
        self
    }

    pub fn build(self) -> TypeRegistry {
        self.registry
    }
}
