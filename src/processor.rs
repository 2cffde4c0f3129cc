//! # Webhook Processor
//!
//! Runs one webhook body through normalization, audit, the stage gate,
//! redaction, persistence and conversion reporting, in that order. A body
//! rejected by normalization leaves no trace in the audit log.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::forwarders::{AuditLog, ConversionEvent, ConversionReporter, LeadRecord, RecordStore};
use crate::hashing::Redactor;
use crate::normalization::{
    CanonicalDeal, CanonicalLead, NormalizedEvent, StageGate, WebhookEventKind, normalize_event,
};
use crate::telemetry;

/// How a webhook was handled, reported back to Kylas as `{ "status": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// A record was forwarded, or the event is one this relay does not act on.
    Success,
    /// The event carried no usable record or its stage did not qualify.
    Ignored,
}

impl ProcessingOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProcessingOutcome::Success => "success",
            ProcessingOutcome::Ignored => "ignored",
        }
    }
}

/// Orchestrates the handling of one webhook body.
#[derive(Clone)]
pub struct WebhookProcessor {
    store: Arc<dyn RecordStore>,
    reporter: Option<Arc<dyn ConversionReporter>>,
    audit: Option<AuditLog>,
    redactor: Redactor,
    stage_gate: StageGate,
    retain_plaintext_pii: bool,
}

impl WebhookProcessor {
    /// Processor with the default redaction policy and no ad reporting.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            reporter: None,
            audit: None,
            redactor: Redactor::default(),
            stage_gate: StageGate::default(),
            retain_plaintext_pii: false,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ConversionReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn with_stage_gate(mut self, stage_gate: StageGate) -> Self {
        self.stage_gate = stage_gate;
        self
    }

    pub fn retain_plaintext_pii(mut self, retain: bool) -> Self {
        self.retain_plaintext_pii = retain;
        self
    }

    /// Handle one webhook body. `None` means the body was empty or not JSON.
    pub async fn process(&self, payload: Option<&Value>) -> Result<ProcessingOutcome, RelayError> {
        let normalized = match normalize_event(payload) {
            Ok(normalized) => normalized,
            Err(err) => {
                telemetry::record_webhook("invalid");
                return Err(err.into());
            }
        };

        if let (Some(audit), Some(body)) = (&self.audit, payload) {
            audit.append(body).await;
        }

        let result = match normalized {
            NormalizedEvent::Unrecognized { event } => {
                info!(event = %event, "Acknowledged unrecognized webhook event");
                Ok(ProcessingOutcome::Success)
            }
            NormalizedEvent::Ignored { event, reason } => {
                info!(event = %event, reason = reason.as_str(), "Webhook ignored");
                Ok(ProcessingOutcome::Ignored)
            }
            NormalizedEvent::Lead { event, lead } => self.process_lead(&event, lead).await,
            NormalizedEvent::Deal(deal) => self.process_deal(deal).await,
        };

        telemetry::record_webhook(match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "error",
        });
        result
    }

    async fn process_lead(
        &self,
        event: &WebhookEventKind,
        lead: CanonicalLead,
    ) -> Result<ProcessingOutcome, RelayError> {
        if !self.stage_gate.admits(&lead.stage) {
            info!(
                event = %event,
                lead_id = %lead.lead_id,
                stage = %lead.stage,
                "Lead stage does not qualify; skipping"
            );
            return Ok(ProcessingOutcome::Ignored);
        }

        let hashed = self.redactor.redact_lead(&lead);
        let record = LeadRecord {
            lead_id: lead.lead_id.clone(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email_hash: hashed.email_hash.clone(),
            phone_hash: hashed.phone_hash.clone(),
            email: lead.email.clone().filter(|_| self.retain_plaintext_pii),
            mobile: lead.mobile.clone().filter(|_| self.retain_plaintext_pii),
            stage: lead.stage.clone(),
            created_at: lead.created_at,
        };

        let persisted = self.store.upsert_lead(&record).await;
        match &persisted {
            Ok(()) => info!(event = %event, lead_id = %lead.lead_id, stage = %lead.stage, "Lead stored"),
            Err(err) => {
                telemetry::record_forward_failure("persistence");
                error!(lead_id = %lead.lead_id, error = ?err, "Failed to store lead");
            }
        }

        if let Some(reporter) = &self.reporter {
            let conversion = ConversionEvent {
                lead_id: lead.lead_id.clone(),
                stage: lead.stage.clone(),
                value: lead.value,
                event_time: Utc::now(),
                user_data: hashed,
            };
            if let Err(err) = reporter.report(&conversion).await {
                telemetry::record_forward_failure("meta");
                warn!(lead_id = %lead.lead_id, error = %err, "Failed to report conversion");
            }
        } else {
            debug!(lead_id = %lead.lead_id, "Conversion reporting disabled");
        }

        persisted
            .map(|()| ProcessingOutcome::Success)
            .map_err(RelayError::Persistence)
    }

    async fn process_deal(&self, deal: CanonicalDeal) -> Result<ProcessingOutcome, RelayError> {
        if !self.stage_gate.admits(&deal.stage) {
            info!(deal_id = %deal.deal_id, stage = %deal.stage, "Deal stage does not qualify; skipping");
            return Ok(ProcessingOutcome::Ignored);
        }

        match self.store.upsert_deal(&deal).await {
            Ok(()) => {
                info!(deal_id = %deal.deal_id, stage = %deal.stage, "Deal stored");
                Ok(ProcessingOutcome::Success)
            }
            Err(err) => {
                telemetry::record_forward_failure("persistence");
                error!(deal_id = %deal.deal_id, error = ?err, "Failed to store deal");
                Err(RelayError::Persistence(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarders::ForwardError;
    use crate::forwarders::meta::event_name_for_stage;
    use crate::hashing::{HashNormalization, hash_pii};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeStore {
        leads: Mutex<Vec<LeadRecord>>,
        deals: Mutex<Vec<CanonicalDeal>>,
        fail: bool,
    }

    #[async_trait]
    impl RecordStore for FakeStore {
        async fn upsert_lead(&self, record: &LeadRecord) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("store unavailable");
            }
            self.leads.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn upsert_deal(&self, deal: &CanonicalDeal) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("store unavailable");
            }
            self.deals.lock().unwrap().push(deal.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeReporter {
        events: Mutex<Vec<ConversionEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl ConversionReporter for FakeReporter {
        async fn report(&self, event: &ConversionEvent) -> Result<(), ForwardError> {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                return Err(ForwardError::Status {
                    status: 400,
                    body: "invalid pixel".to_string(),
                });
            }
            Ok(())
        }
    }

    fn processor(store: Arc<FakeStore>, reporter: Arc<FakeReporter>) -> WebhookProcessor {
        WebhookProcessor::new(store).with_reporter(reporter)
    }

    fn lead_payload(stage: &str) -> Value {
        json!({
            "event": "LEAD_UPDATED",
            "entity": {
                "id": 42917966,
                "firstName": "Veer",
                "lastName": "D",
                "emails": [{ "value": "c@x.com", "primary": true }],
                "phoneNumbers": [{ "value": "1234567890", "primary": true }],
                "pipelineStage": { "value": stage }
            }
        })
    }

    #[tokio::test]
    async fn qualifying_lead_is_stored_and_reported() {
        let store = Arc::new(FakeStore::default());
        let reporter = Arc::new(FakeReporter::default());
        let processor = processor(store.clone(), reporter.clone());

        let outcome = processor.process(Some(&lead_payload("Interested"))).await.unwrap();
        assert_eq!(outcome, ProcessingOutcome::Success);

        let leads = store.leads.lock().unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].lead_id, "42917966");
        assert_eq!(leads[0].stage, "interested");
        assert_eq!(
            leads[0].email_hash,
            hash_pii(Some("c@x.com"), HashNormalization::TrimLowercase)
        );
        assert_eq!(
            leads[0].phone_hash,
            hash_pii(Some("1234567890"), HashNormalization::TrimLowercase)
        );
        assert_eq!(leads[0].email, None);
        assert_eq!(leads[0].mobile, None);

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(event_name_for_stage(&events[0].stage), "Schedule");
        assert_eq!(events[0].user_data.email_hash, leads[0].email_hash);
    }

    #[tokio::test]
    async fn lost_lead_is_gated_out() {
        let store = Arc::new(FakeStore::default());
        let reporter = Arc::new(FakeReporter::default());
        let processor = processor(store.clone(), reporter.clone());

        let outcome = processor.process(Some(&lead_payload("Lost"))).await.unwrap();

        assert_eq!(outcome, ProcessingOutcome::Ignored);
        assert!(store.leads.lock().unwrap().is_empty());
        assert!(reporter.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ungated_processor_stores_any_stage() {
        let store = Arc::new(FakeStore::default());
        let processor = WebhookProcessor::new(store.clone()).with_stage_gate(StageGate::Ungated);

        let outcome = processor.process(Some(&lead_payload("Lost"))).await.unwrap();

        assert_eq!(outcome, ProcessingOutcome::Success);
        assert_eq!(store.leads.lock().unwrap()[0].stage, "lost");
    }

    #[tokio::test]
    async fn plaintext_retained_only_when_enabled() {
        let store = Arc::new(FakeStore::default());
        let processor = WebhookProcessor::new(store.clone()).retain_plaintext_pii(true);

        processor.process(Some(&lead_payload("won"))).await.unwrap();

        let leads = store.leads.lock().unwrap();
        assert_eq!(leads[0].email.as_deref(), Some("c@x.com"));
        assert_eq!(leads[0].mobile.as_deref(), Some("1234567890"));
        assert!(leads[0].email_hash.is_some());
    }

    #[tokio::test]
    async fn persistence_failure_is_an_error_but_still_reports() {
        let store = Arc::new(FakeStore {
            fail: true,
            ..FakeStore::default()
        });
        let reporter = Arc::new(FakeReporter::default());
        let processor = processor(store, reporter.clone());

        let result = processor.process(Some(&lead_payload("won"))).await;

        assert!(matches!(result, Err(RelayError::Persistence(_))));
        assert_eq!(reporter.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reporter_failure_is_swallowed() {
        let store = Arc::new(FakeStore::default());
        let reporter = Arc::new(FakeReporter {
            fail: true,
            ..FakeReporter::default()
        });
        let processor = processor(store.clone(), reporter);

        let outcome = processor.process(Some(&lead_payload("won"))).await.unwrap();

        assert_eq!(outcome, ProcessingOutcome::Success);
        assert_eq!(store.leads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_payload_has_no_side_effects() {
        let store = Arc::new(FakeStore::default());
        let reporter = Arc::new(FakeReporter::default());
        let processor = processor(store.clone(), reporter.clone());

        let missing_event = json!({ "entity": { "id": 1 } });
        assert!(matches!(
            processor.process(Some(&missing_event)).await,
            Err(RelayError::InvalidPayload(_))
        ));
        assert!(matches!(
            processor.process(None).await,
            Err(RelayError::InvalidPayload(_))
        ));
        assert!(store.leads.lock().unwrap().is_empty());
        assert!(reporter.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_entity_and_unknown_events() {
        let store = Arc::new(FakeStore::default());
        let processor = WebhookProcessor::new(store.clone());

        let missing = json!({ "event": "LEAD_UPDATED" });
        assert_eq!(
            processor.process(Some(&missing)).await.unwrap(),
            ProcessingOutcome::Ignored
        );

        let unknown = json!({ "event": "contact.created", "data": { "id": 1 } });
        assert_eq!(
            processor.process(Some(&unknown)).await.unwrap(),
            ProcessingOutcome::Success
        );
        assert!(store.leads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn won_deal_is_stored_without_reporting() {
        let store = Arc::new(FakeStore::default());
        let reporter = Arc::new(FakeReporter::default());
        let processor = processor(store.clone(), reporter.clone());

        let payload = json!({
            "event": "deal.updated",
            "data": { "id": 501, "name": "Annual plan", "value": 125000, "stage": { "name": "Won" } }
        });
        let outcome = processor.process(Some(&payload)).await.unwrap();

        assert_eq!(outcome, ProcessingOutcome::Success);
        assert_eq!(store.deals.lock().unwrap()[0].deal_id, "501");
        assert!(reporter.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lost_deal_is_gated_out() {
        let store = Arc::new(FakeStore::default());
        let processor = WebhookProcessor::new(store.clone());

        let payload = json!({
            "event": "deal.updated",
            "data": { "id": 502, "name": "Trial", "value": 900, "stage": { "name": "Lost" } }
        });
        let outcome = processor.process(Some(&payload)).await.unwrap();

        assert_eq!(outcome, ProcessingOutcome::Ignored);
        assert!(store.deals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_payload_is_not_audited() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("webhooks.jsonl");
        let store = Arc::new(FakeStore::default());
        let processor =
            WebhookProcessor::new(store.clone()).with_audit_log(AuditLog::new(path.clone()));

        let missing_event = json!({ "entity": { "id": 1, "email": "pii@x.com" } });
        let result = processor.process(Some(&missing_event)).await;

        assert!(matches!(result, Err(RelayError::InvalidPayload(_))));
        let contents = std::fs::read_to_string(&path).unwrap_or_default();
        assert!(contents.is_empty(), "audit log written: {contents:?}");
        assert!(store.leads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn accepted_payload_is_audited_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("webhooks.jsonl");
        let store = Arc::new(FakeStore::default());
        let processor =
            WebhookProcessor::new(store.clone()).with_audit_log(AuditLog::new(path.clone()));

        let payload = lead_payload("won");
        processor.process(Some(&payload)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let logged: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(logged, payload);
        assert_eq!(store.leads.lock().unwrap().len(), 1);
    }
}
