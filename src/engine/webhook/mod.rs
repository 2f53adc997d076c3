//! Webhook subscriptions and signed, retried event delivery

pub mod dispatcher;
pub mod model;
pub mod repository;
pub mod signature;

pub use dispatcher::{DeliveryOutcome, DispatchError, DispatchHandle, DispatchSettings, Dispatcher};
pub use model::{EventEnvelope, NewSubscription, Subscription, SubscriptionRequest, SubscriptionView};
pub use repository::{InMemorySubscriptionRepository, SqliteSubscriptionRepository, SubscriptionRepository};
pub use signature::{sign, verify, Signer, SIGNATURE_HEADER};
