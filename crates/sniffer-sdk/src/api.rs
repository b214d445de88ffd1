use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value as Json;
use tokio::sync::Mutex;

use crate::model::{Field, RawMessage, ServiceInfo};
use crate::SnifferError;

/// Operations the viewer needs from a capture backend.
#[async_trait]
pub trait SnifferApi: Send + Sync {
    async fn list_services(&self) -> Result<Vec<ServiceInfo>, SnifferError>;

    async fn get_schema(&self, service: &str) -> Result<Vec<Field>, SnifferError>;

    /// Messages with an id greater than `last_id`, or the full retained
    /// history when `last_id` is `None`.
    async fn get_messages(
        &self,
        service: &str,
        last_id: Option<u64>,
    ) -> Result<Vec<RawMessage>, SnifferError>;

    async fn get_status(&self) -> Result<bool, SnifferError>;

    /// Requests a capture state and returns the state the backend ended up in.
    async fn set_status(&self, requested: bool) -> Result<bool, SnifferError>;

    async fn inject(&self, service: &str, message: Vec<Json>) -> Result<(), SnifferError>;
}

#[derive(Default)]
struct ServiceSlot {
    info: Option<ServiceInfo>,
    schema: Vec<Field>,
    messages: Vec<RawMessage>,
    next_id: u64,
}

#[derive(Default)]
struct InMemoryState {
    services: BTreeMap<String, ServiceSlot>,
    capturing: bool,
    status_lock: Option<bool>,
    failures_remaining: usize,
    injected: Vec<(String, Vec<Json>)>,
}

/// In-memory backend for tests and offline wiring.
#[derive(Default)]
pub struct InMemorySniffer {
    state: Mutex<InMemoryState>,
}

impl InMemorySniffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn add_service(&self, info: ServiceInfo, schema: Vec<Field>) {
        let mut guard = self.state.lock().await;
        let slot = guard.services.entry(info.name.clone()).or_default();
        slot.info = Some(info);
        slot.schema = schema;
    }

    /// Records a message under the next id and returns that id.
    pub async fn push_message(&self, service: &str, values: Vec<Json>) -> u64 {
        let mut guard = self.state.lock().await;
        let slot = guard.services.entry(service.to_string()).or_default();
        let id = slot.next_id;
        slot.next_id += 1;
        slot.messages.push(RawMessage(id, values));
        id
    }

    pub async fn set_capturing(&self, capturing: bool) {
        self.state.lock().await.capturing = capturing;
    }

    /// Pins the capture flag: later `set_status` calls are refused and
    /// answer with this value.
    pub async fn lock_status(&self, value: Option<bool>) {
        let mut guard = self.state.lock().await;
        guard.status_lock = value;
        if let Some(value) = value {
            guard.capturing = value;
        }
    }

    /// Makes the next `count` requests fail as if the transport dropped them.
    pub async fn fail_next(&self, count: usize) {
        self.state.lock().await.failures_remaining = count;
    }

    pub async fn injected(&self) -> Vec<(String, Vec<Json>)> {
        self.state.lock().await.injected.clone()
    }

    fn take_failure(state: &mut InMemoryState) -> Result<(), SnifferError> {
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(SnifferError::Unavailable("simulated transport failure".into()));
        }
        Ok(())
    }

    fn not_found(service: &str) -> SnifferError {
        SnifferError::UnexpectedStatus {
            status: StatusCode::NOT_FOUND,
            body: format!("unknown service {service}"),
        }
    }
}

#[async_trait]
impl SnifferApi for InMemorySniffer {
    async fn list_services(&self) -> Result<Vec<ServiceInfo>, SnifferError> {
        let mut guard = self.state.lock().await;
        Self::take_failure(&mut guard)?;
        Ok(guard
            .services
            .values()
            .filter_map(|slot| slot.info.clone())
            .collect())
    }

    async fn get_schema(&self, service: &str) -> Result<Vec<Field>, SnifferError> {
        let mut guard = self.state.lock().await;
        Self::take_failure(&mut guard)?;
        guard
            .services
            .get(service)
            .map(|slot| slot.schema.clone())
            .ok_or_else(|| Self::not_found(service))
    }

    async fn get_messages(
        &self,
        service: &str,
        last_id: Option<u64>,
    ) -> Result<Vec<RawMessage>, SnifferError> {
        let mut guard = self.state.lock().await;
        Self::take_failure(&mut guard)?;
        let slot = guard
            .services
            .get(service)
            .ok_or_else(|| Self::not_found(service))?;
        Ok(slot
            .messages
            .iter()
            .filter(|m| last_id.map(|last| m.id() > last).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_status(&self) -> Result<bool, SnifferError> {
        let mut guard = self.state.lock().await;
        Self::take_failure(&mut guard)?;
        Ok(guard.capturing)
    }

    async fn set_status(&self, requested: bool) -> Result<bool, SnifferError> {
        let mut guard = self.state.lock().await;
        Self::take_failure(&mut guard)?;
        if guard.status_lock.is_none() {
            guard.capturing = requested;
        }
        Ok(guard.capturing)
    }

    async fn inject(&self, service: &str, message: Vec<Json>) -> Result<(), SnifferError> {
        let mut guard = self.state.lock().await;
        Self::take_failure(&mut guard)?;
        let slot = guard
            .services
            .get(service)
            .ok_or_else(|| Self::not_found(service))?;
        if slot.schema.len() != message.len() {
            return Err(SnifferError::UnexpectedStatus {
                status: StatusCode::BAD_REQUEST,
                body: String::new(),
            });
        }
        guard.injected.push((service.to_string(), message));
        Ok(())
    }
}
