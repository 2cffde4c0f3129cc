//! Canonicalization of Kylas webhook payloads.
//!
//! Kylas delivers lead and deal changes in several shapes: the legacy
//! `{ event, data }` lead shape with snake_case fields, the `{ event, entity }`
//! shape used by lead updates with camelCase fields and contact arrays, and
//! `{ event, data }` deal payloads with nested `stage`, `owner` and `lead`.
//! Everything here is a pure mapping from JSON to a canonical record.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod fields;

pub use fields::{extract_primary, extract_stage};
use fields::{first_field, number_field, text_field};

/// Stages that qualify a record for persistence and ad reporting.
pub const QUALIFYING_STAGES: &[&str] = &["won", "interested"];

/// Webhook event names this relay acts on. Matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WebhookEventKind {
    /// `lead.created`
    LeadCreated,
    /// `LEAD_UPDATED` or `lead.updated`
    LeadUpdated,
    /// `deal.updated`
    DealUpdated,
    /// Any other event name, acknowledged without side effects.
    Unrecognized(String),
}

impl WebhookEventKind {
    pub fn parse(event: &str) -> Self {
        match event {
            "lead.created" => WebhookEventKind::LeadCreated,
            "LEAD_UPDATED" | "lead.updated" => WebhookEventKind::LeadUpdated,
            "deal.updated" => WebhookEventKind::DealUpdated,
            other => WebhookEventKind::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventKind::LeadCreated => "lead.created",
            WebhookEventKind::LeadUpdated => "lead.updated",
            WebhookEventKind::DealUpdated => "deal.updated",
            WebhookEventKind::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lead reconciled from any supported payload shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalLead {
    pub lead_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    /// Lower-cased pipeline stage, `""` when the payload carries none.
    pub stage: String,
    /// Budget reported to the ad platform as the conversion value.
    pub value: f64,
    /// Assigned when the webhook is processed, never read from the payload.
    pub created_at: DateTime<Utc>,
}

/// A deal reconciled from a `deal.updated` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalDeal {
    pub deal_id: String,
    pub deal_name: String,
    pub deal_value: Option<f64>,
    pub stage: String,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub lead_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Why a recognized event was accepted without producing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Neither `entity` nor `data` is an object.
    MissingEntity,
    /// The source object has no usable natural key.
    MissingId,
}

impl IgnoreReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            IgnoreReason::MissingEntity => "missing_entity",
            IgnoreReason::MissingId => "missing_id",
        }
    }
}

/// Result of canonicalizing one webhook body.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    Lead {
        event: WebhookEventKind,
        lead: CanonicalLead,
    },
    Deal(CanonicalDeal),
    Ignored {
        event: WebhookEventKind,
        reason: IgnoreReason,
    },
    Unrecognized {
        event: String,
    },
}

/// Errors that reject a webhook body outright.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("invalid payload: {0}")]
    InvalidPayload(&'static str),
}

/// Which records are allowed to reach persistence and ad reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageGate {
    /// Only `won` and `interested` records pass.
    #[default]
    Gated,
    /// Every canonical record passes.
    Ungated,
}

impl StageGate {
    pub fn admits(self, stage: &str) -> bool {
        match self {
            StageGate::Gated => QUALIFYING_STAGES
                .iter()
                .any(|qualifying| stage.eq_ignore_ascii_case(qualifying)),
            StageGate::Ungated => true,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            StageGate::Gated => "gated",
            StageGate::Ungated => "ungated",
        }
    }
}

impl fmt::Display for StageGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gated" => Ok(StageGate::Gated),
            "ungated" => Ok(StageGate::Ungated),
            other => Err(other.to_string()),
        }
    }
}

/// Canonicalize a webhook body, stamping records with the current time.
pub fn normalize_event(payload: Option<&Value>) -> Result<NormalizedEvent, NormalizationError> {
    normalize_event_at(payload, Utc::now())
}

/// Canonicalize a webhook body using `now` as the processing timestamp.
pub fn normalize_event_at(
    payload: Option<&Value>,
    now: DateTime<Utc>,
) -> Result<NormalizedEvent, NormalizationError> {
    let payload = payload
        .filter(|value| value.is_object())
        .ok_or(NormalizationError::InvalidPayload("body must be a JSON object"))?;

    let event = payload
        .get("event")
        .and_then(Value::as_str)
        .filter(|event| !event.is_empty())
        .ok_or(NormalizationError::InvalidPayload("missing event"))?;

    let kind = WebhookEventKind::parse(event);
    let source = source_object(payload);

    let normalized = match &kind {
        WebhookEventKind::Unrecognized(event) => NormalizedEvent::Unrecognized {
            event: event.clone(),
        },
        WebhookEventKind::LeadCreated | WebhookEventKind::LeadUpdated => {
            match source.map(|source| canonical_lead(source, now)) {
                Some(Some(lead)) => NormalizedEvent::Lead {
                    event: kind.clone(),
                    lead,
                },
                Some(None) => ignored(kind.clone(), IgnoreReason::MissingId),
                None => ignored(kind.clone(), IgnoreReason::MissingEntity),
            }
        }
        WebhookEventKind::DealUpdated => match source.map(|source| canonical_deal(source, now)) {
            Some(Some(deal)) => NormalizedEvent::Deal(deal),
            Some(None) => ignored(kind.clone(), IgnoreReason::MissingId),
            None => ignored(kind.clone(), IgnoreReason::MissingEntity),
        },
    };

    Ok(normalized)
}

fn ignored(event: WebhookEventKind, reason: IgnoreReason) -> NormalizedEvent {
    NormalizedEvent::Ignored { event, reason }
}

/// `entity` when it is an object, otherwise `data`.
fn source_object(payload: &Value) -> Option<&Value> {
    ["entity", "data"]
        .iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| value.is_object())
}

fn canonical_lead(source: &Value, now: DateTime<Utc>) -> Option<CanonicalLead> {
    let lead_id = text_field(source, &["id", "lead_id"])?;

    let email = extract_primary(source.get("emails"), source.get("email"));
    let mobile = extract_primary(source.get("phoneNumbers"), source.get("mobile"));

    Some(CanonicalLead {
        lead_id,
        first_name: text_field(source, &["firstName", "first_name"]).unwrap_or_default(),
        last_name: text_field(source, &["lastName", "last_name"]).unwrap_or_default(),
        email: Some(email).filter(|value| !value.is_empty()),
        mobile: Some(mobile).filter(|value| !value.is_empty()),
        stage: extract_stage(source),
        value: number_field(source, &["requirementBudget"]).unwrap_or(0.0),
        created_at: now,
    })
}

fn canonical_deal(source: &Value, now: DateTime<Utc>) -> Option<CanonicalDeal> {
    let deal_id = text_field(source, &["id", "deal_id"])?;

    let owner = first_field(source, &["owner"]).filter(|owner| owner.is_object());
    let owner_id = owner
        .and_then(|owner| text_field(owner, &["id"]))
        .or_else(|| text_field(source, &["owner_id", "ownerId"]));
    let owner_name = owner
        .and_then(|owner| text_field(owner, &["name", "value"]))
        .or_else(|| text_field(source, &["owner_name", "ownerName"]));

    let lead_id = first_field(source, &["lead"])
        .filter(|lead| lead.is_object())
        .and_then(|lead| text_field(lead, &["id"]))
        .or_else(|| text_field(source, &["lead_id", "leadId"]));

    Some(CanonicalDeal {
        deal_id,
        deal_name: text_field(source, &["name", "deal_name"]).unwrap_or_default(),
        deal_value: number_field(source, &["value", "deal_value"]),
        stage: extract_stage(source),
        owner_id,
        owner_name,
        lead_id,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead_of(result: Result<NormalizedEvent, NormalizationError>) -> CanonicalLead {
        match result.expect("payload normalizes") {
            NormalizedEvent::Lead { lead, .. } => lead,
            other => panic!("expected lead, got {:?}", other),
        }
    }

    #[test]
    fn missing_body_or_event_is_invalid() {
        assert!(normalize_event(None).is_err());
        assert!(normalize_event(Some(&json!({ "data": {} }))).is_err());
        assert!(normalize_event(Some(&json!({ "event": "" }))).is_err());
        assert!(normalize_event(Some(&json!({ "event": 5 }))).is_err());
        assert!(normalize_event(Some(&json!([{ "event": "lead.created" }]))).is_err());
    }

    #[test]
    fn event_names_are_case_sensitive() {
        assert_eq!(WebhookEventKind::parse("LEAD_UPDATED"), WebhookEventKind::LeadUpdated);
        assert_eq!(WebhookEventKind::parse("lead.updated"), WebhookEventKind::LeadUpdated);
        assert_eq!(
            WebhookEventKind::parse("Lead.Created"),
            WebhookEventKind::Unrecognized("Lead.Created".to_string())
        );
    }

    #[test]
    fn unrecognized_event_is_acknowledged() {
        let result = normalize_event(Some(&json!({ "event": "contact.deleted", "data": {} })));
        assert_eq!(
            result,
            Ok(NormalizedEvent::Unrecognized {
                event: "contact.deleted".to_string()
            })
        );
    }

    #[test]
    fn lead_update_without_entity_is_ignored() {
        let result = normalize_event(Some(&json!({ "event": "LEAD_UPDATED" })));
        assert_eq!(
            result,
            Ok(NormalizedEvent::Ignored {
                event: WebhookEventKind::LeadUpdated,
                reason: IgnoreReason::MissingEntity,
            })
        );
    }

    #[test]
    fn lead_without_id_is_ignored() {
        let result = normalize_event(Some(&json!({
            "event": "lead.created",
            "data": { "first_name": "A" }
        })));
        assert!(matches!(
            result,
            Ok(NormalizedEvent::Ignored {
                reason: IgnoreReason::MissingId,
                ..
            })
        ));
    }

    #[test]
    fn entity_shape_normalizes() {
        let now = Utc::now();
        let payload = json!({
            "event": "LEAD_UPDATED",
            "entity": {
                "id": 42917966,
                "firstName": "Veer",
                "lastName": "D",
                "emails": [{ "value": "c@x.com", "primary": true }],
                "phoneNumbers": [{ "value": "1234567890", "primary": true }],
                "pipelineStage": { "value": "Interested" }
            }
        });

        let lead = lead_of(normalize_event_at(Some(&payload), now));
        assert_eq!(
            lead,
            CanonicalLead {
                lead_id: "42917966".to_string(),
                first_name: "Veer".to_string(),
                last_name: "D".to_string(),
                email: Some("c@x.com".to_string()),
                mobile: Some("1234567890".to_string()),
                stage: "interested".to_string(),
                value: 0.0,
                created_at: now,
            }
        );
    }

    #[test]
    fn legacy_data_shape_normalizes() {
        let payload = json!({
            "event": "lead.created",
            "data": {
                "lead_id": "L-9",
                "first_name": "Rahul",
                "last_name": "Sharma",
                "email": "rahul@email.com",
                "mobile": 9876543210u64,
                "stage": "Won"
            }
        });

        let lead = lead_of(normalize_event(Some(&payload)));
        assert_eq!(lead.lead_id, "L-9");
        assert_eq!(lead.first_name, "Rahul");
        assert_eq!(lead.email.as_deref(), Some("rahul@email.com"));
        assert_eq!(lead.mobile.as_deref(), Some("9876543210"));
        assert_eq!(lead.stage, "won");
    }

    #[test]
    fn entity_preferred_over_data() {
        let payload = json!({
            "event": "lead.updated",
            "entity": { "id": 1 },
            "data": { "id": 2 }
        });
        assert_eq!(lead_of(normalize_event(Some(&payload))).lead_id, "1");
    }

    #[test]
    fn non_object_entity_falls_back_to_data() {
        let payload = json!({
            "event": "lead.updated",
            "entity": null,
            "data": { "id": 2 }
        });
        assert_eq!(lead_of(normalize_event(Some(&payload))).lead_id, "2");
    }

    #[test]
    fn missing_contacts_are_none() {
        let payload = json!({
            "event": "lead.updated",
            "entity": { "id": 3, "emails": [], "phoneNumbers": null }
        });
        let lead = lead_of(normalize_event(Some(&payload)));
        assert_eq!(lead.email, None);
        assert_eq!(lead.mobile, None);
        assert_eq!(lead.stage, "");
    }

    #[test]
    fn deal_shape_normalizes() {
        let payload = json!({
            "event": "deal.updated",
            "data": {
                "id": 501,
                "name": "WhatsApp API annual",
                "value": "125000",
                "stage": { "id": 9, "name": "Won" },
                "owner": { "id": 73362, "name": "wilson" },
                "lead": { "id": 42917966 }
            }
        });

        match normalize_event(Some(&payload)).unwrap() {
            NormalizedEvent::Deal(deal) => {
                assert_eq!(deal.deal_id, "501");
                assert_eq!(deal.deal_name, "WhatsApp API annual");
                assert_eq!(deal.deal_value, Some(125000.0));
                assert_eq!(deal.stage, "won");
                assert_eq!(deal.owner_id.as_deref(), Some("73362"));
                assert_eq!(deal.owner_name.as_deref(), Some("wilson"));
                assert_eq!(deal.lead_id.as_deref(), Some("42917966"));
            }
            other => panic!("expected deal, got {:?}", other),
        }
    }

    #[test]
    fn stage_gate_admits_qualifying_stages_only() {
        assert!(StageGate::Gated.admits("won"));
        assert!(StageGate::Gated.admits("Interested"));
        assert!(!StageGate::Gated.admits("lost"));
        assert!(!StageGate::Gated.admits(""));
        assert!(StageGate::Ungated.admits("lost"));
        assert!(StageGate::Ungated.admits(""));
    }
}
