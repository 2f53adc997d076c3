//! Webhook subscriptions and event envelopes

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A registered webhook listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub url: String,
    pub events: Vec<String>,
    pub enabled: bool,
}

impl Subscription {
    /// True when this subscription should receive `event`.
    pub fn matches(&self, event: &str) -> bool {
        self.enabled && self.events.iter().any(|e| e == event)
    }

    pub fn to_view(&self) -> SubscriptionView {
        SubscriptionView {
            id: self.id,
            url: self.url.clone(),
            events: self.events.clone(),
            enabled: self.enabled,
        }
    }
}

/// Fields written on create and update. The id is assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub url: String,
    pub events: Vec<String>,
    pub enabled: bool,
}

/// Create/update request body
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubscriptionRequest {
    pub url: String,
    pub events: Vec<String>,
    /// Defaults to `true` when omitted
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl SubscriptionRequest {
    /// Validate and normalize into repository input.
    pub fn into_new(self) -> Result<NewSubscription, String> {
        let url = self.url.trim().to_string();
        if url.is_empty() {
            return Err("url is required".to_string());
        }
        let events: Vec<String> = self
            .events
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if events.is_empty() {
            return Err("at least one event is required".to_string());
        }
        Ok(NewSubscription {
            url,
            events,
            enabled: self.enabled.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionView {
    pub id: i64,
    pub url: String,
    pub events: Vec<String>,
    pub enabled: bool,
}

/// Body of every webhook delivery: `{event, data, time}`.
#[derive(Serialize)]
pub struct EventEnvelope<'a, T: Serialize + ?Sized> {
    pub event: &'a str,
    pub data: &'a T,
    pub time: String,
}

impl<'a, T: Serialize + ?Sized> EventEnvelope<'a, T> {
    pub fn new(event: &'a str, data: &'a T) -> Self {
        Self::at(event, data, Utc::now())
    }

    pub fn at(event: &'a str, data: &'a T, time: DateTime<Utc>) -> Self {
        Self {
            event,
            data,
            time: time.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn subscription(enabled: bool) -> Subscription {
        Subscription {
            id: 1,
            url: "https://hooks.example.com/fw".into(),
            events: vec!["firmware.uploaded".into()],
            enabled,
        }
    }

    #[test]
    fn test_matches_requires_enabled_and_event() {
        assert!(subscription(true).matches("firmware.uploaded"));
        assert!(!subscription(true).matches("firmware.deleted"));
        assert!(!subscription(false).matches("firmware.uploaded"));
    }

    #[test]
    fn test_request_enabled_defaults_to_true() {
        let req: SubscriptionRequest = serde_json::from_value(json!({
            "url": " https://hooks.example.com ",
            "events": ["firmware.uploaded", " "]
        }))
        .unwrap();
        let new = req.into_new().unwrap();
        assert_eq!(new.url, "https://hooks.example.com");
        assert_eq!(new.events, vec!["firmware.uploaded"]);
        assert!(new.enabled);

        let req: SubscriptionRequest = serde_json::from_value(json!({
            "url": "https://hooks.example.com",
            "events": ["firmware.deleted"],
            "enabled": false
        }))
        .unwrap();
        assert!(!req.into_new().unwrap().enabled);
    }

    #[test]
    fn test_request_rejects_missing_fields() {
        let no_url = SubscriptionRequest { url: "  ".into(), events: vec!["a".into()], enabled: None };
        assert!(no_url.into_new().is_err());

        let no_events = SubscriptionRequest { url: "http://x".into(), events: vec![], enabled: None };
        assert!(no_events.into_new().is_err());
    }

    #[test]
    fn test_envelope_shape() {
        let data = json!({"type": "gateway", "version": "1.0.0"});
        let time = Utc.with_ymd_and_hms(2026, 5, 4, 3, 2, 1).unwrap();
        let envelope = EventEnvelope::at("firmware.uploaded", &data, time);

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "event": "firmware.uploaded",
                "data": {"type": "gateway", "version": "1.0.0"},
                "time": "2026-05-04T03:02:01Z"
            })
        );
    }
}
