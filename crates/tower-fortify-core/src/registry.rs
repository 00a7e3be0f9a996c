//! Name-keyed registry of shared policy instances.
//!
//! A [`Registry`] is an explicit object owned by the composition root. For a
//! given name it hands out exactly one live instance: a second creation
//! request for the same name returns the stored instance and ignores the
//! configuration it was given. Swapping an instance's configuration requires
//! an explicit [`Registry::replace`].
//!
//! ```
//! use std::sync::Arc;
//! use tower_fortify_core::{Policy, Registry};
//!
//! #[derive(Debug)]
//! struct Gate {
//!     name: String,
//!     limit: usize,
//! }
//!
//! impl Policy for Gate {
//!     type Config = usize;
//!
//!     fn from_config(name: &str, limit: usize) -> Self {
//!         Gate { name: name.to_string(), limit }
//!     }
//!
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//! }
//!
//! let registry = Registry::<Gate>::new(10);
//! let a = registry.get_or_create("backendA");
//! let again = registry.get_or_create_with("backendA", 99);
//! assert!(Arc::ptr_eq(&a, &again));
//! assert_eq!(again.limit, 10);
//! ```

use crate::events::{EventListeners, FnListener, ResilienceEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// A policy type that can live in a [`Registry`].
pub trait Policy: Send + Sync + 'static {
    /// Configuration used to build an instance.
    type Config: Clone + Send + Sync + 'static;

    /// Builds a new instance named `name`.
    fn from_config(name: &str, config: Self::Config) -> Self;

    /// The instance name.
    fn name(&self) -> &str;
}

/// Events emitted when the registry's contents change.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A new instance was created and stored.
    EntryAdded {
        pattern_name: String,
        timestamp: Instant,
    },
    /// An instance was swapped for a freshly configured one.
    EntryReplaced {
        pattern_name: String,
        timestamp: Instant,
    },
    /// An instance was removed.
    EntryRemoved {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for RegistryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RegistryEvent::EntryAdded { .. } => "entry_added",
            RegistryEvent::EntryReplaced { .. } => "entry_replaced",
            RegistryEvent::EntryRemoved { .. } => "entry_removed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RegistryEvent::EntryAdded { timestamp, .. }
            | RegistryEvent::EntryReplaced { timestamp, .. }
            | RegistryEvent::EntryRemoved { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RegistryEvent::EntryAdded { pattern_name, .. }
            | RegistryEvent::EntryReplaced { pattern_name, .. }
            | RegistryEvent::EntryRemoved { pattern_name, .. } => pattern_name,
        }
    }
}

/// A thread-safe, name-keyed cache of shared policy instances.
pub struct Registry<P: Policy> {
    default_config: P::Config,
    entries: RwLock<HashMap<String, Arc<P>>>,
    event_listeners: EventListeners<RegistryEvent>,
}

impl<P: Policy> Registry<P> {
    /// Creates an empty registry whose `get_or_create` uses `default_config`.
    pub fn new(default_config: P::Config) -> Self {
        Self {
            default_config,
            entries: RwLock::new(HashMap::new()),
            event_listeners: EventListeners::new(),
        }
    }

    /// Registers a callback invoked with the name of each newly created entry.
    pub fn on_entry_added<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RegistryEvent::EntryAdded { pattern_name, .. } = event {
                f(pattern_name);
            }
        }));
        self
    }

    /// Registers a callback invoked with the name of each replaced entry.
    pub fn on_entry_replaced<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RegistryEvent::EntryReplaced { pattern_name, .. } = event {
                f(pattern_name);
            }
        }));
        self
    }

    /// Registers a callback invoked with the name of each removed entry.
    pub fn on_entry_removed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RegistryEvent::EntryRemoved { pattern_name, .. } = event {
                f(pattern_name);
            }
        }));
        self
    }

    /// The configuration used by [`get_or_create`](Self::get_or_create).
    pub fn default_config(&self) -> &P::Config {
        &self.default_config
    }

    /// Returns the instance named `name`, creating it from the default
    /// configuration if absent.
    pub fn get_or_create(&self, name: &str) -> Arc<P> {
        self.get_or_create_with(name, self.default_config.clone())
    }

    /// Returns the instance named `name`, creating it from `config` if
    /// absent. When an instance already exists, `config` is ignored.
    pub fn get_or_create_with(&self, name: &str, config: P::Config) -> Arc<P> {
        if let Some(existing) = self.entries.read().get(name) {
            return Arc::clone(existing);
        }

        let (instance, created) = {
            let mut entries = self.entries.write();
            match entries.get(name) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let instance = Arc::new(P::from_config(name, config));
                    entries.insert(name.to_string(), Arc::clone(&instance));
                    (instance, true)
                }
            }
        };

        if created {
            #[cfg(feature = "tracing")]
            tracing::debug!(name, "registry created instance");
            self.event_listeners.emit(&RegistryEvent::EntryAdded {
                pattern_name: name.to_string(),
                timestamp: Instant::now(),
            });
        }
        instance
    }

    /// Swaps the instance named `name` for a new one built from `config`,
    /// returning the previous instance if there was one.
    ///
    /// Holders of the previous `Arc` keep using the old instance; new
    /// lookups see the replacement.
    pub fn replace(&self, name: &str, config: P::Config) -> Option<Arc<P>> {
        let instance = Arc::new(P::from_config(name, config));
        let previous = self.entries.write().insert(name.to_string(), instance);

        let event = if previous.is_some() {
            #[cfg(feature = "tracing")]
            tracing::debug!(name, "registry replaced instance");
            RegistryEvent::EntryReplaced {
                pattern_name: name.to_string(),
                timestamp: Instant::now(),
            }
        } else {
            RegistryEvent::EntryAdded {
                pattern_name: name.to_string(),
                timestamp: Instant::now(),
            }
        };
        self.event_listeners.emit(&event);
        previous
    }

    /// Looks up an instance without creating it.
    pub fn find(&self, name: &str) -> Option<Arc<P>> {
        self.entries.read().get(name).cloned()
    }

    /// Removes and returns the instance named `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<P>> {
        let removed = self.entries.write().remove(name);
        if removed.is_some() {
            self.event_listeners.emit(&RegistryEvent::EntryRemoved {
                pattern_name: name.to_string(),
                timestamp: Instant::now(),
            });
        }
        removed
    }

    /// Names of all stored instances, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of stored instances.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the registry holds no instance.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<P> Default for Registry<P>
where
    P: Policy,
    P::Config: Default,
{
    fn default() -> Self {
        Self::new(P::Config::default())
    }
}

impl<P: Policy> fmt::Debug for Registry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}
