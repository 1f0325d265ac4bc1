//! Shared fixtures for scenario tests.

#![allow(dead_code)]

use async_trait::async_trait;
use eduadapt::{AdaptationOptions, MemoryDocument, Profile};
use eduadapt_agent::{AdaptationClient, AdaptationError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Scripted adaptation client.
///
/// Records every request, tracks the peak number of requests in flight, and
/// can add latency, fail selected texts, or hold every call until released.
#[derive(Default)]
pub struct ScriptedClient {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Option<Duration>,
    slow_containing: Option<(String, Duration)>,
    fail_containing: Option<String>,
    gated: AtomicBool,
    gate: Notify,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Use `latency` instead of the default for texts containing `needle`.
    pub fn slow_on(mut self, needle: &str, latency: Duration) -> Self {
        self.slow_containing = Some((needle.to_string(), latency));
        self
    }

    /// Reject any text containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_containing = Some(needle.to_string());
        self
    }

    /// Hold every call until [`release`](Self::release).
    pub fn gated(self) -> Self {
        self.gated.store(true, Ordering::SeqCst);
        self
    }

    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..500 {
            if self.call_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {} calls, saw {}", n, self.call_count());
    }
}

#[async_trait]
impl AdaptationClient for ScriptedClient {
    async fn adapt(
        &self,
        text: &str,
        _profile: Profile,
        _options: &AdaptationOptions,
    ) -> Result<String, AdaptationError> {
        self.calls.lock().unwrap().push(text.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        loop {
            let released = self.gate.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if !self.gated.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }
        let latency = match &self.slow_containing {
            Some((needle, slow)) if text.contains(needle.as_str()) => Some(*slow),
            _ => self.latency,
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match &self.fail_containing {
            Some(needle) if text.contains(needle.as_str()) => Err(AdaptationError::Rejected {
                user_message: Some("Model refused".to_string()),
            }),
            _ => Ok(format!("Easy: {}", text.split_whitespace().take(3).collect::<Vec<_>>().join(" "))),
        }
    }
}

/// A qualifying paragraph body for block `n`.
pub fn paragraph_text(n: usize) -> String {
    format!("Paragraph {n} explains how the heart pumps blood through the body every single day.")
}

/// Document with `count` qualifying paragraphs inside `<main>`, each with a
/// vertical position so viewport ordering is well defined.
pub fn page(count: usize) -> MemoryDocument {
    let children: Vec<Value> = (1..=count)
        .map(|n| {
            json!({
                "tag": "p",
                "id": format!("p{n}"),
                "rect": { "x": 0.0, "y": (n as f64) * 120.0, "width": 640.0, "height": 80.0 },
                "children": [paragraph_text(n)]
            })
        })
        .collect();
    MemoryDocument::from_value(json!({
        "viewportHeight": 800.0,
        "root": { "tag": "body", "children": [
            { "tag": "nav", "children": [
                { "tag": "p", "children": ["Navigation links that are long enough to be a block but sit in the menu."] }
            ]},
            { "tag": "main", "id": "content", "children": children }
        ]}
    }))
    .unwrap()
}
