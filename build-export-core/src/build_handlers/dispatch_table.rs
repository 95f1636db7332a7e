use std::{collections::HashMap, fmt};

use super::{BuildEventHandler, HandlerDescriptor};
use crate::export_api::{Build, BuildEvent};

struct HandlerInstance {
    name: String,
    handler: Box<dyn BuildEventHandler>,
}

/// Handler instances for one build, grouped by the event types they asked for.
///
/// Groups hold indices into `instances`, so a handler interested in several types is
/// still a single instance with a single piece of state.
pub struct DispatchTable {
    build_id: String,
    instances: Vec<HandlerInstance>,
    by_event_type: HashMap<String, Vec<usize>>,
    completion: Vec<usize>,
    completed: bool,
}

impl DispatchTable {
    pub fn build(descriptors: &[HandlerDescriptor], build: &Build) -> Self {
        let mut instances = Vec::with_capacity(descriptors.len());
        let mut by_event_type: HashMap<String, Vec<usize>> = HashMap::new();
        let mut completion = Vec::new();

        for (idx, descriptor) in descriptors.iter().enumerate() {
            instances.push(HandlerInstance {
                name: descriptor.name().to_string(),
                handler: descriptor.instantiate(build),
            });

            for event_type in descriptor.event_types() {
                by_event_type
                    .entry(event_type.clone())
                    .or_default()
                    .push(idx);
            }

            if descriptor.handles_completion() {
                completion.push(idx);
            }
        }

        Self {
            build_id: build.build_id.clone(),
            instances,
            by_event_type,
            completion,
            completed: false,
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// Names of the handlers bound to `event_type`, in invocation order.
    pub fn handler_names(&self, event_type: &str) -> Vec<&str> {
        self.by_event_type
            .get(event_type)
            .map(|idxs| {
                idxs.iter()
                    .map(|idx| self.instances[*idx].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn completion_handler_names(&self) -> Vec<&str> {
        self.completion
            .iter()
            .map(|idx| self.instances[*idx].name.as_str())
            .collect()
    }

    /// Hands `event` to every handler bound to its type, returning how many ran.
    pub fn dispatch(&mut self, event: &BuildEvent) -> usize {
        if self.completed {
            warn!(
                "Dropping {} event for build {}, its handlers already completed",
                event.event_type(),
                self.build_id
            );
            return 0;
        }

        let idxs = match self.by_event_type.get(event.event_type()) {
            Some(idxs) => idxs,
            None => return 0,
        };
        for idx in idxs.iter() {
            self.instances[*idx].handler.on_event(event);
        }
        idxs.len()
    }

    /// Runs the completion handlers. Only the first call has any effect.
    pub fn complete(&mut self) -> usize {
        if self.completed {
            return 0;
        }
        self.completed = true;

        for idx in self.completion.iter() {
            self.instances[*idx].handler.complete();
        }
        self.completion.len()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("build_id", &self.build_id)
            .field(
                "instances",
                &self.instances.iter().map(|i| &i.name).collect::<Vec<_>>(),
            )
            .field("completed", &self.completed)
            .finish()
    }
}
