// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook subscriptions and signed, retrying delivery.
//!
//! One dispatch serializes the event envelope once, signs it per
//! subscription when a secret is configured, and delivers to every
//! matching subscription concurrently. A failure in one delivery never
//! affects the others.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::Mutex;
use ring::hmac;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default attempt ceiling per delivery.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Backoff between attempts, indexed by attempt number.
const RETRY_DELAYS_SECS: &[u64] = &[1, 2, 4];
/// Response bodies recorded in the audit ring are truncated to this.
const RESPONSE_CAP: usize = 500;
/// Size of the delivery audit ring.
const DELIVERY_RING: usize = 100;

/// A registered webhook subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub url: String,
    pub events: Vec<String>,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Audit record of one delivery (all attempts folded together).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub webhook_url: String,
    pub event: String,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
    pub delivered_at: Option<DateTime<Utc>>,
    pub success: bool,
}

/// Runtime tuning, normally read from `SYNAPSE_WEBHOOK_*` env vars.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Default secret applied to subscriptions registered without one.
    pub default_secret: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, max_retries: DEFAULT_MAX_RETRIES, default_secret: None }
    }
}

impl WebhookConfig {
    /// Resolve from `SYNAPSE_WEBHOOK_SECRET/_TIMEOUT/_MAX_RETRIES`.
    pub fn from_env() -> Self {
        let timeout = std::env::var("SYNAPSE_WEBHOOK_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(Duration::from_secs_f64)
            .unwrap_or(DEFAULT_TIMEOUT);
        let max_retries = std::env::var("SYNAPSE_WEBHOOK_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let default_secret =
            std::env::var("SYNAPSE_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
        Self { timeout, max_retries, default_secret }
    }
}

struct Inner {
    subscriptions: HashMap<String, WebhookSubscription>,
    deliveries: VecDeque<WebhookDelivery>,
}

/// URL-keyed subscription registry with a bounded delivery audit ring.
pub struct WebhookRegistry {
    inner: Mutex<Inner>,
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookRegistry {
    pub fn new(config: WebhookConfig) -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            inner: Mutex::new(Inner {
                subscriptions: HashMap::new(),
                deliveries: VecDeque::new(),
            }),
            config,
            client,
        }
    }

    /// Register (or replace) a subscription. The URL must have a scheme
    /// and a host.
    pub fn register(
        &self,
        url: &str,
        events: Vec<String>,
        secret: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<WebhookSubscription> {
        let parsed: reqwest::Url =
            url.parse().map_err(|e| anyhow::anyhow!("invalid webhook URL {url}: {e}"))?;
        if parsed.host_str().is_none() {
            anyhow::bail!("invalid webhook URL {url}: missing host");
        }
        let events = if events.is_empty() {
            vec!["task.completed".to_owned(), "task.failed".to_owned()]
        } else {
            events
        };
        let sub = WebhookSubscription {
            url: url.to_owned(),
            events,
            secret: secret.or_else(|| self.config.default_secret.clone()),
            enabled: true,
            created_at: Utc::now(),
            metadata,
        };
        self.inner.lock().subscriptions.insert(url.to_owned(), sub.clone());
        debug!(url, "registered webhook");
        Ok(sub)
    }

    /// Remove a subscription; returns whether it existed.
    pub fn unregister(&self, url: &str) -> bool {
        self.inner.lock().subscriptions.remove(url).is_some()
    }

    pub fn list(&self) -> Vec<WebhookSubscription> {
        let mut subs: Vec<_> = self.inner.lock().subscriptions.values().cloned().collect();
        subs.sort_by(|a, b| a.url.cmp(&b.url));
        subs
    }

    /// Enabled subscriptions listening for `event`.
    pub fn for_event(&self, event: &str) -> Vec<WebhookSubscription> {
        self.inner
            .lock()
            .subscriptions
            .values()
            .filter(|s| s.enabled && s.events.iter().any(|e| e == event))
            .cloned()
            .collect()
    }

    /// Most recent deliveries, newest last.
    pub fn recent_deliveries(&self, limit: usize) -> Vec<WebhookDelivery> {
        let inner = self.inner.lock();
        inner.deliveries.iter().rev().take(limit).rev().cloned().collect()
    }

    fn record_delivery(&self, delivery: WebhookDelivery) {
        let mut inner = self.inner.lock();
        inner.deliveries.push_back(delivery);
        while inner.deliveries.len() > DELIVERY_RING {
            inner.deliveries.pop_front();
        }
    }

    /// Dispatch an event to every matching subscription, concurrently.
    ///
    /// Returns the delivery records (also pushed into the audit ring).
    pub async fn dispatch(
        &self,
        event: &str,
        data: serde_json::Value,
    ) -> Vec<WebhookDelivery> {
        let subs = self.for_event(event);
        if subs.is_empty() {
            debug!(event, "no webhooks registered for event");
            return Vec::new();
        }

        let envelope = serde_json::json!({
            "event": event,
            "event_id": Uuid::new_v4().to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "data": data,
        });
        let event_id = envelope["event_id"].as_str().unwrap_or_default().to_owned();
        let timestamp = envelope["timestamp"].as_str().unwrap_or_default().to_owned();
        let payload = envelope.to_string();

        let futures = subs.into_iter().map(|sub| {
            let payload = payload.clone();
            let event_id = event_id.clone();
            let timestamp = timestamp.clone();
            async move { self.deliver(sub, event, &event_id, &timestamp, payload).await }
        });
        let deliveries = join_all(futures).await;
        for delivery in &deliveries {
            self.record_delivery(delivery.clone());
        }
        deliveries
    }

    /// Deliver one payload to one subscription with bounded retries.
    async fn deliver(
        &self,
        sub: WebhookSubscription,
        event: &str,
        event_id: &str,
        timestamp: &str,
        payload: String,
    ) -> WebhookDelivery {
        let mut delivery = WebhookDelivery {
            webhook_url: sub.url.clone(),
            event: event.to_owned(),
            status_code: None,
            response_body: None,
            error: None,
            attempts: 0,
            delivered_at: None,
            success: false,
        };

        let signature = sub.secret.as_deref().map(|secret| sign(&payload, secret));

        for attempt in 0..self.config.max_retries {
            delivery.attempts = attempt + 1;

            let mut request = self
                .client
                .post(&sub.url)
                .header("Content-Type", "application/json")
                .header("X-Synapse-Event", event)
                .header("X-Synapse-Event-Id", event_id)
                .header("X-Synapse-Timestamp", timestamp)
                .body(payload.clone());
            if let Some(ref sig) = signature {
                request = request.header("X-Synapse-Signature", format!("sha256={sig}"));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    delivery.status_code = Some(status.as_u16());
                    let body = response.text().await.unwrap_or_default();
                    delivery.response_body =
                        Some(body.chars().take(RESPONSE_CAP).collect());
                    if status.is_success() {
                        delivery.success = true;
                        delivery.delivered_at = Some(Utc::now());
                        debug!(url = %sub.url, event, "webhook delivered");
                        break;
                    }
                    warn!(url = %sub.url, status = status.as_u16(), "webhook delivery failed");
                }
                Err(e) => {
                    delivery.error = Some(e.to_string());
                    warn!(url = %sub.url, "webhook delivery error: {e}");
                }
            }

            if attempt + 1 < self.config.max_retries {
                let idx = (attempt as usize).min(RETRY_DELAYS_SECS.len() - 1);
                tokio::time::sleep(Duration::from_secs(RETRY_DELAYS_SECS[idx])).await;
            }
        }

        delivery
    }
}

/// HMAC-SHA256 over the payload, hex-encoded.
pub fn sign(payload: &str, secret: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, payload.as_bytes());
    hex_encode(tag.as_ref())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod tests;
