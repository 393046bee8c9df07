//! Perception capability handles.
//!
//! Each backend sits behind a handle with an explicit lifecycle
//! (`Uninitialized -> Initializing -> Ready | Failed`) instead of a lazily
//! created global. Handles are collected in a [`CapabilityRegistry`] that is
//! passed to the dispatcher by construction.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use anyhow::Result;
use futures::future::BoxFuture;
use serde::Serialize;
use sightline_core::{ObjectDetector, TextRecognizer};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Lifecycle of a capability handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CapabilityState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

type Loader<T> = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<T>>> + Send + Sync>;

pub struct CapabilityHandle<T: ?Sized + 'static> {
    name: String,
    state: RwLock<CapabilityState>,
    slot: Mutex<Option<Arc<T>>>,
    loader: Option<Loader<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> CapabilityHandle<T> {
    /// A handle around an already constructed capability.
    pub fn ready(name: impl Into<String>, instance: Arc<T>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(CapabilityState::Ready),
            slot: Mutex::new(Some(instance)),
            loader: None,
        }
    }

    /// A handle that builds its capability on first use.
    pub fn lazy<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Arc<T>>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            state: RwLock::new(CapabilityState::Uninitialized),
            slot: Mutex::new(None),
            loader: Some(Box::new(loader)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CapabilityState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_state(&self, next: CapabilityState) {
        *self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    /// Return the capability, initializing it on first call.
    ///
    /// Concurrent callers wait for the same initialization. A failed load is
    /// sticky: later calls return the recorded reason until [`reset`](Self::reset).
    pub async fn get(&self) -> Result<Arc<T>, String> {
        let mut slot = self.slot.lock().await;
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }
        if let CapabilityState::Failed(reason) = self.state() {
            return Err(reason);
        }
        let Some(loader) = &self.loader else {
            return Err(format!("capability '{}' has no loader", self.name));
        };

        self.set_state(CapabilityState::Initializing);
        info!(capability = %self.name, "Initializing capability");
        let start = Instant::now();

        match loader().await {
            Ok(instance) => {
                info!(
                    capability = %self.name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Capability ready"
                );
                *slot = Some(Arc::clone(&instance));
                self.set_state(CapabilityState::Ready);
                Ok(instance)
            }
            Err(e) => {
                let reason = e.to_string();
                error!(capability = %self.name, error = %reason, "Capability failed to initialize");
                self.set_state(CapabilityState::Failed(reason.clone()));
                Err(reason)
            }
        }
    }

    /// Drop a lazily loaded instance (or a recorded failure) so the next
    /// [`get`](Self::get) loads again. No-op for handles built with `ready`.
    pub async fn reset(&self) {
        if self.loader.is_none() {
            return;
        }
        let mut slot = self.slot.lock().await;
        *slot = None;
        self.set_state(CapabilityState::Uninitialized);
    }
}

/// The perception capabilities available to the dispatcher.
#[derive(Default)]
pub struct CapabilityRegistry {
    detector: Option<CapabilityHandle<dyn ObjectDetector>>,
    recognizer: Option<CapabilityHandle<dyn TextRecognizer>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detector(mut self, handle: CapabilityHandle<dyn ObjectDetector>) -> Self {
        self.detector = Some(handle);
        self
    }

    pub fn with_recognizer(mut self, handle: CapabilityHandle<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(handle);
        self
    }

    pub fn detector(&self) -> Option<&CapabilityHandle<dyn ObjectDetector>> {
        self.detector.as_ref()
    }

    pub fn recognizer(&self) -> Option<&CapabilityHandle<dyn TextRecognizer>> {
        self.recognizer.as_ref()
    }

    /// `(name, state)` of every registered handle, for status displays.
    pub fn states(&self) -> Vec<(String, CapabilityState)> {
        let detector = self.detector.iter().map(|h| (h.name().to_string(), h.state()));
        let recognizer = self.recognizer.iter().map(|h| (h.name().to_string(), h.state()));
        detector.chain(recognizer).collect()
    }
}
