use std::{fmt, sync::Arc};

use crate::export_api::{Build, BuildEvent};

mod dispatch_table;
pub use dispatch_table::DispatchTable;

/// Per-build handler state. One instance lives for exactly one build's stream.
pub trait BuildEventHandler: Send {
    /// Called for every event whose type this handler's descriptor declared, in stream order.
    fn on_event(&mut self, event: &BuildEvent);

    /// Called once after the build's stream has completed, only for descriptors
    /// registered with completion support.
    fn complete(&mut self) {}
}

type HandlerFactory = dyn Fn(&Build) -> Box<dyn BuildEventHandler> + Send + Sync;

/// Static capability declaration of a handler: which event types it wants, whether it
/// wants to hear about completion, and how to make a fresh instance for a build.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    event_types: Vec<String>,
    handles_completion: bool,
    factory: Arc<HandlerFactory>,
}

impl HandlerDescriptor {
    pub fn new<F, H>(name: &str, event_types: &[&str], factory: F) -> Self
    where
        F: Fn(&Build) -> H + Send + Sync + 'static,
        H: BuildEventHandler + 'static,
    {
        let mut types: Vec<String> = Vec::with_capacity(event_types.len());
        for t in event_types {
            if !types.iter().any(|e| e == t) {
                types.push(t.to_string());
            }
        }

        Self {
            name: name.to_string(),
            event_types: types,
            handles_completion: false,
            factory: Arc::new(move |build: &Build| -> Box<dyn BuildEventHandler> {
                Box::new(factory(build))
            }),
        }
    }

    pub fn with_completion(mut self) -> Self {
        self.handles_completion = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }

    pub fn handles_completion(&self) -> bool {
        self.handles_completion
    }

    pub fn instantiate(&self, build: &Build) -> Box<dyn BuildEventHandler> {
        (self.factory)(build)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("event_types", &self.event_types)
            .field("handles_completion", &self.handles_completion)
            .finish()
    }
}

/// Distinct event type names, in the order they were first registered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandledEventTypes(Vec<String>);

impl HandledEventTypes {
    pub fn from_names(names: &[&str]) -> Self {
        let mut r = HandledEventTypes::default();
        for n in names {
            r.insert(n);
        }
        r
    }

    fn insert(&mut self, name: &str) {
        if !self.contains(name) {
            self.0.push(name.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|e| e == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }
}

/// The fixed, ordered list of handlers a processor runs for every build.
#[derive(Clone, Debug, Default)]
pub struct HandlerRegistry {
    descriptors: Vec<HandlerDescriptor>,
}

impl HandlerRegistry {
    pub fn new(descriptors: Vec<HandlerDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn register(&mut self, descriptor: HandlerDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn descriptors(&self) -> &[HandlerDescriptor] {
        &self.descriptors
    }

    pub fn all_handled_event_types(&self) -> HandledEventTypes {
        let mut r = HandledEventTypes::default();
        for d in self.descriptors.iter() {
            for t in d.event_types() {
                r.insert(t);
            }
        }
        r
    }

    pub fn handlers_for(&self, build: &Build) -> DispatchTable {
        DispatchTable::build(&self.descriptors, build)
    }
}
