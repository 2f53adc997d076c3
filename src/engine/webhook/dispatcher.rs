//! Webhook Dispatcher
//!
//! Fans one event out to every enabled, matching subscription. Each delivery
//! is an independent task with its own retries; callers never wait on it
//! unless they hold on to the returned [`DispatchHandle`].

use bytes::Bytes;
use futures_util::future::join_all;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::model::EventEnvelope;
use super::repository::SubscriptionRepository;
use super::signature::{Signer, SIGNATURE_HEADER};
use crate::engine::config::WebhookConfig;
use crate::engine::firmware::{ArtifactView, EventSink};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
enum DeliveryError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Shared HMAC secret. Deliveries are unsigned when `None`.
    pub secret: Option<String>,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Extra attempts after the first
    pub retries: u32,
    /// Delay unit for linear backoff: attempt `n` (0-based) waits `(n + 1) * base_backoff`
    pub base_backoff: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            secret: None,
            timeout: Duration::from_secs(5),
            retries: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl DispatchSettings {
    pub fn from_config(config: &WebhookConfig) -> Self {
        let secret = Some(config.secret.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            secret,
            timeout: Duration::from_secs(config.timeout_sec.max(1)),
            retries: u32::try_from(config.retries.max(0)).unwrap_or(u32::MAX),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32, status: u16 },
    Exhausted { attempts: u32, last_error: String },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Running deliveries of one dispatch. Dropping it detaches them.
#[derive(Default)]
pub struct DispatchHandle {
    tasks: Vec<JoinHandle<DeliveryOutcome>>,
}

impl DispatchHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every delivery to finish. Tasks that panicked are left out.
    pub async fn join(self) -> Vec<DeliveryOutcome> {
        join_all(self.tasks)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(error = %e, "webhook delivery task failed");
                    None
                }
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    repo: Arc<dyn SubscriptionRepository>,
    client: reqwest::Client,
    signer: Option<Signer>,
    retries: u32,
    base_backoff: Duration,
    runtime: Handle,
}

impl Dispatcher {
    /// Build a dispatcher on the current tokio runtime.
    pub fn new(repo: Arc<dyn SubscriptionRepository>, settings: DispatchSettings) -> Result<Self, DispatchError> {
        Self::with_handle(repo, settings, Handle::try_current()?)
    }

    pub fn with_handle(
        repo: Arc<dyn SubscriptionRepository>,
        settings: DispatchSettings,
        runtime: Handle,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            repo,
            client,
            signer: settings.secret.as_deref().map(|s| Signer::new(s.as_bytes())),
            retries: settings.retries,
            base_backoff: settings.base_backoff,
            runtime,
        })
    }

    /// Deliver `event` with `payload` to every matching subscription.
    ///
    /// Returns once the deliveries are scheduled. Repository and
    /// serialization failures are logged and yield an empty handle.
    pub fn dispatch<T: Serialize + ?Sized>(&self, event: &str, payload: &T) -> DispatchHandle {
        let subscriptions = match self.repo.list() {
            Ok(subs) => subs,
            Err(e) => {
                warn!(event, error = %e, "dropping dispatch: cannot list webhooks");
                return DispatchHandle::default();
            }
        };

        let targets: Vec<String> = subscriptions
            .into_iter()
            .filter(|s| s.matches(event))
            .map(|s| s.url)
            .collect();
        if targets.is_empty() {
            debug!(event, "no webhook subscribers");
            return DispatchHandle::default();
        }

        let body = match serde_json::to_vec(&EventEnvelope::new(event, payload)) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                warn!(event, error = %e, "dropping dispatch: cannot serialize event");
                return DispatchHandle::default();
            }
        };
        let signature = self.signer.as_ref().map(|s| s.sign(&body));

        let tasks = targets
            .into_iter()
            .map(|url| {
                let delivery = Delivery {
                    client: self.client.clone(),
                    url,
                    body: body.clone(),
                    signature: signature.clone(),
                    retries: self.retries,
                    base_backoff: self.base_backoff,
                };
                self.runtime.spawn(delivery.run())
            })
            .collect();

        DispatchHandle { tasks }
    }
}

impl EventSink for Dispatcher {
    fn publish(&self, event: &str, artifact: &ArtifactView) {
        let handle = self.dispatch(event, artifact);
        debug!(event, deliveries = handle.len(), "event published");
    }
}

struct Delivery {
    client: reqwest::Client,
    url: String,
    body: Bytes,
    signature: Option<String>,
    retries: u32,
    base_backoff: Duration,
}

impl Delivery {
    async fn run(self) -> DeliveryOutcome {
        let attempts = self.retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.send().await {
                Ok(status) => {
                    info!(url = %self.url, attempt = attempt + 1, status, "webhook delivered");
                    return DeliveryOutcome::Delivered {
                        attempts: attempt + 1,
                        status,
                    };
                }
                Err(e) => {
                    warn!(url = %self.url, attempt = attempt + 1, error = %e, "webhook attempt failed");
                    last_error = e.to_string();
                }
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(self.base_backoff * (attempt + 1)).await;
            }
        }

        warn!(url = %self.url, attempts, "webhook delivery gave up");
        DeliveryOutcome::Exhausted { attempts, last_error }
    }

    async fn send(&self) -> Result<u16, DeliveryError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(self.body.clone());
        if let Some(signature) = &self.signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let status = request.send().await?.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
