//! Fakes shared by the unit tests.

use crate::delivery::Delivery;
use crate::fetcher::{CountFetcher, FetchOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Returns scripted counts. Users without a script fail.
pub struct ScriptedFetcher {
    counts: Mutex<HashMap<String, u64>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(counts: &[(&str, u64)]) -> Self {
        Self {
            counts: Mutex::new(counts.iter().map(|(u, c)| (u.to_string(), *c)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, username: &str, count: u64) {
        self.counts.lock().insert(username.to_string(), count);
    }

    pub fn fail(&self, username: &str) {
        self.counts.lock().remove(username);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CountFetcher for ScriptedFetcher {
    async fn fetch(&self, username: &str) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.counts.lock().get(username) {
            Some(c) => FetchOutcome::ok(*c),
            None => FetchOutcome::failed(),
        }
    }
}

/// Keeps every delivered message; can be switched to fail
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingDelivery {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn deliver(&self, text: &str) -> Result<(), String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("channel unavailable".to_string());
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
