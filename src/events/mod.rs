// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Execution event hooks
//!
//! External tooling (preview servers, deploy drivers) observes runs through
//! these notifications. Delivery is synchronous fire-and-forget: the
//! scheduler never awaits a listener and never depends on one for
//! correctness.

use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::ExitStatus;

/// Notifications emitted around engine and pipeline execution
#[derive(Debug, Clone)]
pub enum EngineEvent {
    BeforeEngineExecution {
        pipelines: Vec<String>,
    },
    AfterEngineExecution {
        status: ExitStatus,
        duration: Duration,
    },
    PipelineStarted {
        pipeline: String,
    },
    PipelineFinished {
        pipeline: String,
        status: ExitStatus,
    },
}

/// Observer of engine events
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

impl<F> EventListener for F
where
    F: Fn(&EngineEvent) + Send + Sync,
{
    fn on_event(&self, event: &EngineEvent) {
        self(event)
    }
}

/// Fan-out of engine events to registered listeners
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: EngineEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_events_reach_every_listener() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut broadcaster = EventBroadcaster::new();
        for tag in ["a", "b"] {
            let seen = seen.clone();
            broadcaster.subscribe(Arc::new(move |event: &EngineEvent| {
                if let EngineEvent::PipelineStarted { pipeline } = event {
                    seen.lock().unwrap().push(format!("{tag}:{pipeline}"));
                }
            }));
        }

        broadcaster.emit(EngineEvent::PipelineStarted {
            pipeline: "content".into(),
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), ["a:content", "b:content"]);
    }
}
