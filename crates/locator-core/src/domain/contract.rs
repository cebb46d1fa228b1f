//! # Contract Identity
//!
//! A contract is the abstract type a provider is registered and looked up by,
//! usually a `dyn Trait`. [`ContractKey`] is its runtime identity and
//! [`ServiceInstance`] is the type-erased provider handle the registry stores.
//!
//! ```text
//! ServiceInstance (concrete: AudioMixer)
//! ├── view: dyn AudioService  → Arc<dyn AudioService>
//! └── view: dyn Tickable      → Arc<dyn Tickable>
//! ```

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

/// Runtime identity of a service contract.
///
/// Equality and hashing use the `TypeId` only; the type name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct ContractKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ContractKey {
    /// Key for the contract type `C` (sized or `dyn Trait`).
    #[must_use]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
        }
    }

    /// Underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name as reported by the compiler.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name with module paths and the `dyn ` prefix stripped.
    #[must_use]
    pub fn short_name(&self) -> String {
        let short = short_type_name(self.type_name);
        match short.strip_prefix("dyn ") {
            Some(rest) => rest.to_string(),
            None => short,
        }
    }
}

impl PartialEq for ContractKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ContractKey {}

impl Hash for ContractKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for ContractKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContractKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_name
            .cmp(other.type_name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl fmt::Debug for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractKey({})", self.short_name())
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Strips `a::b::` path prefixes, including inside generic arguments.
fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
            continue;
        }
        out.push(c);
        if !(c.is_alphanumeric() || c == '_') {
            segment_start = out.len();
        }
    }
    out
}

/// Formats a list of keys as `A, B, C`.
pub(crate) fn join_keys(keys: &[ContractKey]) -> String {
    keys.iter()
        .map(ContractKey::short_name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Identifier of an owner group (a scene or component group) whose
/// registrations are torn down together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    /// Create a group id.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Group name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for GroupId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

type ErasedView = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct InstanceInner {
    concrete_type: &'static str,
    /// Each view stores an `Arc<C>` boxed as `dyn Any`.
    views: HashMap<ContractKey, ErasedView>,
    owner: Option<Weak<dyn Any + Send + Sync>>,
}

/// Type-erased provider handle.
///
/// Cloning is cheap; all clones share the same views.
#[derive(Clone)]
pub struct ServiceInstance {
    inner: Arc<InstanceInner>,
}

impl ServiceInstance {
    /// Wrap a provider that is known only through its contract `C`.
    pub fn new<C: ?Sized + Send + Sync + 'static>(instance: Arc<C>) -> Self {
        let mut views: HashMap<ContractKey, ErasedView> = HashMap::new();
        views.insert(ContractKey::of::<C>(), Arc::new(instance));
        Self {
            inner: Arc::new(InstanceInner {
                concrete_type: std::any::type_name::<C>(),
                views,
                owner: None,
            }),
        }
    }

    /// Wrap a concrete provider. The concrete type itself is the only
    /// contract until more are added with [`expose`](Self::expose).
    pub fn concrete<P: Send + Sync + 'static>(provider: &Arc<P>) -> Self {
        Self::new::<P>(Arc::clone(provider))
    }

    /// Declare that this provider also satisfies contract `C`.
    #[must_use]
    pub fn expose<C: ?Sized + Send + Sync + 'static>(mut self, view: Arc<C>) -> Self {
        Arc::make_mut(&mut self.inner)
            .views
            .insert(ContractKey::of::<C>(), Arc::new(view));
        self
    }

    /// Tie the instance's lifetime to a host object. Once the owner has no
    /// strong references left the instance reports itself as dead.
    #[must_use]
    pub fn owned_by<O: Send + Sync + 'static>(mut self, owner: &Arc<O>) -> Self {
        let weak: Weak<O> = Arc::downgrade(owner);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        Arc::make_mut(&mut self.inner).owner = Some(weak);
        self
    }

    /// Name of the concrete provider type.
    #[must_use]
    pub fn concrete_type(&self) -> &'static str {
        self.inner.concrete_type
    }

    /// Whether the instance can be handed out as `contract`.
    #[must_use]
    pub fn satisfies(&self, contract: &ContractKey) -> bool {
        self.inner.views.contains_key(contract)
    }

    /// Every contract this instance exposes, sorted by name.
    #[must_use]
    pub fn implemented_contracts(&self) -> Vec<ContractKey> {
        let mut keys: Vec<_> = self.inner.views.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Typed view for contract `C`.
    #[must_use]
    pub fn downcast<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.inner
            .views
            .get(&ContractKey::of::<C>())
            .and_then(|view| view.downcast_ref::<Arc<C>>())
            .cloned()
    }

    /// False once the owning host object has been destroyed.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner
            .owner
            .as_ref()
            .map_or(true, |owner| owner.strong_count() > 0)
    }

    /// Whether two handles wrap the same provider views.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("concrete_type", &short_type_name(self.inner.concrete_type))
            .field("contracts", &self.implemented_contracts())
            .field("alive", &self.is_alive())
            .finish()
    }
}
