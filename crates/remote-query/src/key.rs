//! Key types identifying a logical remote query.

use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dyn_hash::DynHash;

/// Object-safe equality comparison.
///
/// Lets two type-erased parameter values be compared by downcasting to the
/// concrete type first.
pub trait DynEq: Any {
    /// Returns `true` if `other` has the same concrete type and is equal to `self`.
    fn dyn_eq(&self, other: &dyn Any) -> bool;
}

impl<T: Eq + 'static> DynEq for T {
    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|o| self == o)
    }
}

/// Trait for values that can serve as free-form query parameters.
///
/// Automatically implemented for every `Hash + Eq + Debug + Send + Sync + 'static`
/// type, so plain structs, tuples and strings all work.
pub trait QueryParams: DynHash + DynEq + Debug + Send + Sync {
    /// Get the parameters as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Get the type name of the parameters.
    fn type_name(&self) -> &'static str;
}

impl<T: Hash + Eq + Debug + Send + Sync + 'static> QueryParams for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

dyn_hash::hash_trait_object!(QueryParams);

/// Identity of a logical query: `(namespace, instance, params)`.
///
/// Two keys are equal when all three parts are equal; parameters are compared
/// by concrete type and value. Cloning is cheap, every part is behind an `Arc`.
///
/// # Example
///
/// ```
/// use remote_query::QueryKey;
///
/// let a = QueryKey::new("mongodb", "prod", ("users", 50u32));
/// let b = QueryKey::new("mongodb", "prod", ("users", 50u32));
/// let c = QueryKey::new("mongodb", "prod", ("users", 10u32));
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
#[derive(Clone)]
pub struct QueryKey {
    namespace: Arc<str>,
    instance: Arc<str>,
    params_type: TypeId,
    params: Arc<dyn QueryParams>,
}

impl QueryKey {
    /// Create a new key.
    pub fn new<P: QueryParams + 'static>(
        namespace: impl Into<Arc<str>>,
        instance: impl Into<Arc<str>>,
        params: P,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            instance: instance.into(),
            params_type: TypeId::of::<P>(),
            params: Arc::new(params),
        }
    }

    /// Namespace of the query, usually the plugin and resource (e.g. `"mongodb/find"`).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Identifier of the plugin instance the query runs against.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Downcast the parameters to their original type.
    pub fn params<P: 'static>(&self) -> Option<&P> {
        self.params.as_any().downcast_ref()
    }

    /// Type name of the parameters.
    pub fn params_type_name(&self) -> &'static str {
        self.params.type_name()
    }

    /// Debug representation of the parameters.
    pub fn params_debug(&self) -> String {
        format!("{:?}", self.params)
    }

    /// Debug representation of the whole key.
    pub fn debug_repr(&self) -> String {
        format!("{:?}", self)
    }
}

impl Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{:?}",
            self.namespace, self.instance, self.params
        )
    }
}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.instance.hash(state);
        self.params_type.hash(state);
        self.params.hash(state);
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.instance == other.instance
            && self.params_type == other.params_type
            && self.params.dyn_eq(other.params.as_any())
    }
}

impl Eq for QueryKey {}
