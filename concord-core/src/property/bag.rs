//! Property bag and its builder.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::dispatch::{HasSyncOperation, SyncOperation};
use crate::error::{CollectionError, Result};
use crate::lifecycle::{Disposable, Lifecycle};
use crate::notify::{ChangeNotifier, NotifyPropertyChanged, Outbox, PropertyChanged};

type Name = Cow<'static, str>;
type Initializer = Box<dyn FnOnce() -> Result<Value> + Send>;

/// A typed handle to one property.
pub struct PropertyKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PropertyKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for PropertyKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyKey<T> {}

impl<T> fmt::Debug for PropertyKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyKey").field(&self.name).finish()
    }
}

fn to_value<T: Serialize>(name: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| {
        CollectionError::argument("value", format!("property `{name}` cannot be stored: {err}"))
    })
}

/// Registers property initializers; [`build`](Self::build) runs them in
/// registration order.
pub struct PropertyBagBuilder {
    sync: SyncOperation,
    type_name: &'static str,
    initializers: Vec<(Name, Initializer)>,
}

impl PropertyBagBuilder {
    /// Name reported in errors and logs. Defaults to `"PropertyBag"`.
    pub fn type_name(mut self, type_name: &'static str) -> Self {
        self.type_name = type_name;
        self
    }

    /// Register a property whose default is computed by `init`.
    pub fn property<F>(mut self, name: impl Into<Name>, init: F) -> Self
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        self.initializers
            .push((name.into(), Box::new(move || Ok(init()))));
        self
    }

    /// Register a typed property whose default is computed by `init`.
    pub fn with_default<T, F>(mut self, key: PropertyKey<T>, init: F) -> Self
    where
        T: Serialize,
        F: FnOnce() -> T + Send + 'static,
    {
        let name = key.name();
        self.initializers
            .push((name.into(), Box::new(move || to_value(name, &init()))));
        self
    }

    /// Run every initializer and create the bag.
    ///
    /// Fails if a name is registered twice or a default cannot be serialized.
    pub fn build(self) -> Result<PropertyBag> {
        let values = DashMap::with_capacity(self.initializers.len());
        for (name, init) in self.initializers {
            if values.contains_key(&name) {
                return Err(CollectionError::argument(
                    "name",
                    format!("property `{name}` is registered twice"),
                ));
            }
            let value = init()?;
            values.insert(name, value);
        }

        debug!(type_name = self.type_name, count = values.len(), "property bag built");
        Ok(PropertyBag {
            inner: Arc::new(BagInner {
                notifier: ChangeNotifier::new(self.type_name, self.sync),
                values,
            }),
        })
    }
}

struct BagInner {
    notifier: ChangeNotifier,
    values: DashMap<Name, Value>,
}

/// An observable set of named values.
///
/// Values are JSON so heterogeneous properties share one store; typed access
/// goes through [`PropertyKey`] or [`get_as`](Self::get_as). Cloning shares
/// the bag.
#[derive(Clone)]
pub struct PropertyBag {
    inner: Arc<BagInner>,
}

impl PropertyBag {
    /// Start building a bag that dispatches through `sync`.
    pub fn builder(sync: SyncOperation) -> PropertyBagBuilder {
        PropertyBagBuilder {
            sync,
            type_name: "PropertyBag",
            initializers: Vec::new(),
        }
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    /// Whether the bag holds no properties.
    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.values.get(name).map(|value| value.clone())
    }

    /// The value of `name` decoded as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        serde_json::from_value(value).map(Some).map_err(|err| {
            CollectionError::argument(
                "name",
                format!(
                    "property `{name}` is not a {}: {err}",
                    std::any::type_name::<T>()
                ),
            )
        })
    }

    pub fn get_key<T: DeserializeOwned>(&self, key: &PropertyKey<T>) -> Result<Option<T>> {
        self.get_as(key.name())
    }

    /// Store `value` under `name`. Returns whether the stored value changed.
    ///
    /// Handlers run after the value is stored. Setting an equal value, or
    /// setting on a disposed bag, raises nothing and returns `false`.
    pub fn set_value(&self, name: impl Into<Name>, value: Value) -> bool {
        let name = name.into();
        if self.lifecycle().is_disposed_or_disposing() {
            return false;
        }

        let changed = match self.inner.values.entry(name.clone()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == value {
                    false
                } else {
                    entry.insert(value);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        };

        if !changed {
            return false;
        }

        // A dispose that ran after the first check has already cleared the
        // map; drop what this call wrote.
        if self.lifecycle().is_disposed_or_disposing() {
            self.inner.values.remove(&name);
            return false;
        }

        trace!(type_name = self.lifecycle().type_name(), property = %name, "property changed");
        let notifier = &self.inner.notifier;
        let mut outbox = Outbox::default();
        notifier.raise_property_changed(PropertyChanged::new(name), &mut outbox);
        notifier.queue_dispatched(outbox);
        notifier.deliver_dispatched();
        true
    }

    /// Serialize and store `value`. Returns whether the stored value changed.
    pub fn set<T: Serialize>(&self, name: impl Into<Name>, value: &T) -> Result<bool> {
        let name = name.into();
        let value = to_value(&name, value)?;
        Ok(self.set_value(name, value))
    }

    pub fn set_key<T: Serialize>(&self, key: &PropertyKey<T>, value: &T) -> Result<bool> {
        self.set(key.name(), value)
    }

    /// Every property as a JSON object.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner
            .values
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().clone()))
            .collect()
    }
}

impl Disposable for PropertyBag {
    fn lifecycle(&self) -> &Lifecycle {
        self.inner.notifier.lifecycle()
    }

    fn dispose(&self) {
        self.inner.notifier.lifecycle().dispose_with(|| {
            self.inner.notifier.clear_subscribers();
            self.inner.values.clear();
        });
    }
}

impl HasSyncOperation for PropertyBag {
    fn sync_operation(&self) -> &SyncOperation {
        self.inner.notifier.sync()
    }
}

impl NotifyPropertyChanged for PropertyBag {
    fn change_notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.lifecycle().type_name())
            .field("count", &self.len())
            .field("state", &self.lifecycle().state())
            .finish()
    }
}
