//! Registration and resolution of the components used by business logic.
//!
//! A [`Container`] lives for the whole process. Components registered with it
//! are constructed on first resolution and then shared by every later
//! invocation, so pools and clients survive warm starts. Per-invocation
//! constants such as the event and its decoded body are instead held in
//! [`Bindings`], which are created fresh for each invocation and dropped
//! with it. An [`Invocation`] combines the two, and remembers which
//! components were resolved so that their connections can be ended.
use lambda_sql::Connection;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{Context, Event};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0} is not bound for this invocation")]
    Unbound(Property),
    #[error("{key} is not bound as a {expected}")]
    TypeMismatch {
        key: Property,
        expected: &'static str,
    },
    #[error("no component of type {0} is registered")]
    NotRegistered(&'static str),
    #[error("failed to construct component {name}")]
    Construct {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Property names a constant bound for an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Property {
    /// The raw platform event, as an [`Event`].
    Event,
    /// The platform context, as a [`Context`].
    Context,
    /// The parsed request body, as a `serde_json::Value`.
    EventBody,
    /// Decoded claims of the Authorization header, as an `Option<serde_json::Value>`.
    Token,
    Named(String),
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Property::Event => f.write_str("EVENT"),
            Property::Context => f.write_str("CONTEXT"),
            Property::EventBody => f.write_str("EVENT_BODY"),
            Property::Token => f.write_str("TOKEN"),
            Property::Named(name) => write!(f, "{name:?}"),
        }
    }
}

/// Bindings are the constants of a single invocation.
#[derive(Default)]
pub struct Bindings {
    values: HashMap<Property, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `key`, replacing any value already bound.
    pub fn bind_constant<T: Any + Send + Sync>(&mut self, key: Property, value: T) {
        self.values.insert(key, Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &Property) -> Result<&T, RegistryError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| RegistryError::Unbound(key.clone()))?;

        (**value)
            .downcast_ref::<T>()
            .ok_or_else(|| RegistryError::TypeMismatch {
                key: key.clone(),
                expected: type_name::<T>(),
            })
    }

    pub fn is_bound(&self, key: &Property) -> bool {
        self.values.contains_key(key)
    }
}

type Factory = dyn Fn() -> anyhow::Result<Component> + Send + Sync;

#[derive(Clone)]
struct Component {
    instance: Arc<dyn Any + Send + Sync>,
    // Set for components which hold a database connection.
    connection: Option<Arc<dyn Connection>>,
}

/// Container holds process-lifetime components, keyed by their type.
#[derive(Default)]
pub struct Container {
    factories: Mutex<HashMap<TypeId, Arc<Factory>>>,
    components: Mutex<HashMap<TypeId, Component>>,
}

lazy_static::lazy_static! {
    static ref GLOBAL: Arc<Container> = Arc::new(Container::default());
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.factories.lock().unwrap().len())
            .field("constructed", &self.components.lock().unwrap().len())
            .finish()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Container shared by every invocation of this process.
    pub fn global() -> Arc<Container> {
        GLOBAL.clone()
    }

    /// Register a factory of component `T`. A component which was already
    /// constructed remains in use, so registering again on a warm start is harmless.
    pub fn register<T, F>(&self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.insert_factory::<T>(Arc::new(move || -> anyhow::Result<Component> {
            Ok(Component {
                instance: Arc::new(factory()?),
                connection: None,
            })
        }));
    }

    /// Register a factory of database component `T`, which is ended after
    /// each invocation that resolves it.
    pub fn register_connection<T, F>(&self, factory: F)
    where
        T: Connection + Any,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.insert_factory::<T>(Arc::new(move || -> anyhow::Result<Component> {
            let instance = Arc::new(factory()?);
            Ok(Component {
                instance: instance.clone(),
                connection: Some(instance as Arc<dyn Connection>),
            })
        }));
    }

    pub fn is_registered<T: Any>(&self) -> bool {
        self.factories
            .lock()
            .unwrap()
            .contains_key(&TypeId::of::<T>())
    }

    /// Resolve component `T`, constructing it if this is its first resolution.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, RegistryError> {
        let component = self.component::<T>()?;
        downcast(component.instance)
    }

    fn insert_factory<T: Any>(&self, factory: Arc<Factory>) {
        self.factories
            .lock()
            .unwrap()
            .insert(TypeId::of::<T>(), factory);
    }

    fn component<T: Any>(&self) -> Result<Component, RegistryError> {
        let id = TypeId::of::<T>();

        if let Some(component) = self.components.lock().unwrap().get(&id) {
            return Ok(component.clone());
        }
        let factory = self
            .factories
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotRegistered(type_name::<T>()))?;

        // Construct without holding locks, as factories may themselves resolve.
        let component = factory().map_err(|source| RegistryError::Construct {
            name: type_name::<T>(),
            source,
        })?;
        tracing::debug!(component = type_name::<T>(), "constructed component");

        // If a concurrent resolution won the race, its component is kept.
        Ok(self
            .components
            .lock()
            .unwrap()
            .entry(id)
            .or_insert(component)
            .clone())
    }
}

fn downcast<T: Any + Send + Sync>(
    instance: Arc<dyn Any + Send + Sync>,
) -> Result<Arc<T>, RegistryError> {
    instance
        .downcast::<T>()
        .map_err(|_| RegistryError::NotRegistered(type_name::<T>()))
}

struct Resolution {
    type_id: TypeId,
    name: &'static str,
    connection: Option<Arc<dyn Connection>>,
}

/// Invocation is the view of the Container and Bindings given to business logic.
pub struct Invocation {
    container: Arc<Container>,
    bindings: Bindings,
    resolved: Mutex<Vec<Resolution>>,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolved: Vec<_> = self
            .resolved
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name)
            .collect();

        f.debug_struct("Invocation")
            .field("bindings", &self.bindings)
            .field("resolved", &resolved)
            .finish()
    }
}

impl Invocation {
    pub fn new(container: Arc<Container>, bindings: Bindings) -> Self {
        Self {
            container,
            bindings,
            resolved: Mutex::new(Vec::new()),
        }
    }

    pub fn event(&self) -> Result<&Event, RegistryError> {
        self.bindings.get(&Property::Event)
    }

    pub fn context(&self) -> Result<&Context, RegistryError> {
        self.bindings.get(&Property::Context)
    }

    /// The parsed request body, which is `null` for requests without one.
    pub fn body(&self) -> Result<&serde_json::Value, RegistryError> {
        self.bindings.get(&Property::EventBody)
    }

    /// Decoded claims of the Authorization header, if one was present and decodable.
    pub fn token(&self) -> Option<&serde_json::Value> {
        self.bindings
            .get::<Option<serde_json::Value>>(&Property::Token)
            .ok()
            .and_then(Option::as_ref)
    }

    pub fn constant<T: Any>(&self, key: &Property) -> Result<&T, RegistryError> {
        self.bindings.get(key)
    }

    /// Resolve component `T` from the Container, recording it as used by this invocation.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, RegistryError> {
        let component = self.container.component::<T>()?;
        let type_id = TypeId::of::<T>();

        let mut resolved = self.resolved.lock().unwrap();
        if !resolved.iter().any(|r| r.type_id == type_id) {
            resolved.push(Resolution {
                type_id,
                name: type_name::<T>(),
                connection: component.connection.clone(),
            });
        }
        std::mem::drop(resolved);

        downcast(component.instance)
    }

    /// Has component `T` been resolved by this invocation?
    pub fn is_bound<T: Any>(&self) -> bool {
        let type_id = TypeId::of::<T>();

        self.resolved
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.type_id == type_id)
    }

    /// Take the database connections resolved by this invocation, in order of resolution.
    pub(crate) fn take_connections(&self) -> Vec<(&'static str, Arc<dyn Connection>)> {
        self.resolved
            .lock()
            .unwrap()
            .iter_mut()
            .filter_map(|r| Some((r.name, r.connection.take()?)))
            .collect()
    }
}
