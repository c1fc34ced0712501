#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use glimpse_fabric::{Completion, Endpoint, Error, Result, Transport};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// In-memory transport that records every exchange
///
/// Labels are the dumped string value, the markup text, or `clear`.
#[derive(Clone, Default)]
pub struct Recorder {
    pub log: Arc<Mutex<Vec<String>>>,
    pub payloads: Arc<Mutex<Vec<serde_json::Value>>>,
    pub endpoints: Arc<Mutex<Vec<Endpoint>>>,
    fail_on: Arc<Mutex<HashSet<String>>>,
    stall_on: Arc<Mutex<HashSet<String>>>,
    panic_on: Arc<Mutex<HashSet<String>>>,
    gate: Option<Arc<Semaphore>>,
    /// Completion to inspect when the labelled item starts transmitting
    pub watch: Arc<Mutex<Option<(String, Completion)>>>,
    pub watched: Arc<Mutex<Option<bool>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every exchange waits for a permit from the returned semaphore
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let recorder = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (recorder, gate)
    }

    pub fn fail_on(&self, label: &str) {
        self.fail_on.lock().insert(label.to_string());
    }

    pub fn stall_on(&self, label: &str) {
        self.stall_on.lock().insert(label.to_string());
    }

    /// Panic once, the first time `label` is transmitted
    pub fn panic_on(&self, label: &str) {
        self.panic_on.lock().insert(label.to_string());
    }

    /// When `label` starts transmitting, record whether `completion` has
    /// already settled successfully
    pub fn watch(&self, label: &str, completion: Completion) {
        *self.watch.lock() = Some((label.to_string(), completion));
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Yield until `entry` shows up in the log
    pub async fn wait_for(&self, entry: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.log.lock().iter().any(|e| e == entry) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{} never logged", entry));
    }

    async fn exchange(&self, label: String) -> Result<()> {
        self.log.lock().push(format!("start:{}", label));

        let watched = {
            let mut watch = self.watch.lock();
            match watch.take() {
                Some((target, mut completion)) if target == label => {
                    Some(matches!(completion.try_outcome(), Some(Ok(()))))
                }
                other => {
                    *watch = other;
                    None
                }
            }
        };
        if let Some(settled) = watched {
            *self.watched.lock() = Some(settled);
        }

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let panicking = self.panic_on.lock().remove(&label);
        if panicking {
            panic!("transport blew up on {}", label);
        }

        let stalled = self.stall_on.lock().contains(&label);
        if stalled {
            std::future::pending::<()>().await;
        }

        self.log.lock().push(format!("end:{}", label));

        let failing = self.fail_on.lock().contains(&label);
        if failing {
            return Err(Error::Transport(format!("{} refused", label)));
        }
        Ok(())
    }
}

pub fn label_of(payload: &serde_json::Value) -> String {
    let value = &payload["$value"];
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other["$html"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

#[async_trait::async_trait]
impl Transport for Recorder {
    async fn deliver_payload(&self, payload: &[u8], endpoint: &Endpoint) -> Result<()> {
        self.endpoints.lock().push(endpoint.clone());
        let json: serde_json::Value = serde_json::from_slice(payload).unwrap();
        let label = label_of(&json);
        self.payloads.lock().push(json);
        self.exchange(label).await
    }

    async fn deliver_clear(&self, endpoint: &Endpoint) -> Result<()> {
        self.endpoints.lock().push(endpoint.clone());
        self.exchange("clear".to_string()).await
    }
}
