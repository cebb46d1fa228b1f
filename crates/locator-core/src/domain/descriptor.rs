//! # Injection Descriptors
//!
//! A target type describes its injectable fields through [`Injectable`]:
//! an ordered list of `(name, contract, required)` tuples plus an `apply`
//! hook that writes resolved values back in one pass. The descriptor is
//! static per type, so it can be hand-written or generated.
//!
//! Composition stands in for inheritance: a wrapper type pulls its base
//! type's fields in with [`FieldSet::inherit`].

use std::collections::HashMap;
use std::sync::Arc;

use super::contract::{ContractKey, ServiceInstance};

/// One declared dependency of a target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionField {
    /// Field name, used in diagnostics and by `apply`.
    pub name: &'static str,
    /// Contract the field is resolved against.
    pub contract: ContractKey,
    /// Required fields fail the call when unresolved.
    pub required: bool,
}

impl InjectionField {
    /// Required dependency on contract `C`.
    #[must_use]
    pub fn required<C: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            contract: ContractKey::of::<C>(),
            required: true,
        }
    }

    /// Optional dependency on contract `C`.
    #[must_use]
    pub fn optional<C: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            contract: ContractKey::of::<C>(),
            required: false,
        }
    }
}

/// Builder for a type's field list.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: Vec<InjectionField>,
}

impl FieldSet {
    /// Empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field.
    #[must_use]
    pub fn required<C: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.with(InjectionField::required::<C>(name))
    }

    /// Add an optional field.
    #[must_use]
    pub fn optional<C: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.with(InjectionField::optional::<C>(name))
    }

    /// Add a field, replacing any earlier field of the same name.
    #[must_use]
    pub fn with(mut self, field: InjectionField) -> Self {
        self.fields.retain(|existing| existing.name != field.name);
        self.fields.push(field);
        self
    }

    /// Prepend a base type's fields. Fields already declared here win.
    #[must_use]
    pub fn inherit(mut self, base: Vec<InjectionField>) -> Self {
        let mut merged: Vec<InjectionField> = base
            .into_iter()
            .filter(|field| !self.fields.iter().any(|own| own.name == field.name))
            .collect();
        merged.append(&mut self.fields);
        self.fields = merged;
        self
    }

    /// Finished, ordered field list.
    #[must_use]
    pub fn build(self) -> Vec<InjectionField> {
        self.fields
    }
}

/// A type whose fields are populated by the injector.
pub trait Injectable: Send + 'static {
    /// Ordered dependency descriptor, inherited fields included.
    fn injection_fields() -> Vec<InjectionField>
    where
        Self: Sized;

    /// Key under which the target's edges are tracked in the dependency
    /// graph. Providers override this with the contract they register as.
    fn injection_key() -> ContractKey
    where
        Self: Sized,
    {
        ContractKey::of::<Self>()
    }

    /// Write resolved values into the target's fields.
    fn apply(&mut self, resolved: &mut ResolvedDependencies);
}

/// Values produced by one injection call, keyed by field name.
///
/// Optional fields that resolved to absent have no entry, so
/// [`take`](Self::take) yields `None` for them.
#[derive(Debug, Default)]
pub struct ResolvedDependencies {
    values: HashMap<&'static str, ServiceInstance>,
}

impl ResolvedDependencies {
    pub(crate) fn insert(&mut self, name: &'static str, instance: ServiceInstance) {
        self.values.insert(name, instance);
    }

    /// Remove and downcast the value for `name`.
    pub fn take<C: ?Sized + Send + Sync + 'static>(&mut self, name: &str) -> Option<Arc<C>> {
        self.values.remove(name)?.downcast::<C>()
    }

    /// Downcast the value for `name` without removing it.
    #[must_use]
    pub fn get<C: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Option<Arc<C>> {
        self.values.get(name)?.downcast::<C>()
    }

    /// Whether `name` resolved to a provider.
    #[must_use]
    pub fn is_resolved(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of resolved fields still held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
