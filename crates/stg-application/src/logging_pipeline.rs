//! Best-effort request logging and target auto-attribution.
//!
//! Runs after every completed transfer, success or failure. Every step is
//! individually wrapped: observability must never break the observed
//! request, so failures become warn events and structured notes only.

use chrono::Utc;
use tracing::warn;

use stg_domain::error::Result;
use stg_domain::ports::{NewHttpRequest, TargetDefaults, TransferOutcome, TransferRequest};
use stg_domain::value_objects::{ActionId, MissionId, RequestId, TargetId, TargetKey};

use crate::redaction::{BodyLimits, RedactionPolicy, truncate_body};
use crate::store::Store;

/// What the pipeline managed to persist, plus one note per skipped or
/// failed step. Surfaced as the executor's structured side channel.
#[derive(Debug, Default, Clone)]
pub struct LogReport {
    pub request_id: Option<RequestId>,
    pub target_id: Option<TargetId>,
    pub linked_action_id: Option<ActionId>,
    pub notes: Vec<String>,
}

/// The logging pipeline.
pub struct RequestLogger {
    store: Option<Store>,
    redaction: RedactionPolicy,
    limits: BodyLimits,
}

impl RequestLogger {
    #[must_use]
    pub fn new(store: Option<Store>, redaction: RedactionPolicy, limits: BodyLimits) -> Self {
        Self {
            store,
            redaction,
            limits,
        }
    }

    /// Record one completed transfer.
    ///
    /// Never fails; the returned report carries whatever was persisted.
    pub async fn record(
        &self,
        request: &TransferRequest,
        outcome: &TransferOutcome,
        mission_id: Option<MissionId>,
    ) -> LogReport {
        let mut report = LogReport::default();

        let Some(store) = &self.store else {
            report.notes.push("logging: skipped (store unavailable)".to_owned());
            return report;
        };

        // 1. Parse the final URL; unparseable URLs skip attribution only.
        let key = match TargetKey::from_url(&outcome.final_url) {
            Ok(key) => Some(key),
            Err(e) => {
                Self::note(&mut report, "parse_url", &e);
                None
            }
        };

        // 2. Upsert the target for the triple.
        if let Some(key) = &key {
            match store.targets.upsert(key, TargetDefaults::default()).await {
                Ok((target, _created)) => report.target_id = Some(target.id),
                Err(e) => Self::note(&mut report, "target_upsert", &e),
            }
        }

        // 3-5. Truncate, redact, insert the request row.
        let record = self.build_record(request, outcome, &key, report.target_id);
        let created_at = record.created_at;
        match store.requests.insert(record).await {
            Ok(row) => report.request_id = Some(row.id),
            Err(e) => Self::note(&mut report, "request_insert", &e),
        }

        // 6. Link to the active mission's latest action and record the
        //    mission-target association.
        if let (Some(request_id), Some(mission_id)) = (report.request_id, mission_id) {
            match self.link_latest_action(store, &request_id, &mission_id).await {
                Ok(Some(action_id)) => report.linked_action_id = Some(action_id),
                Ok(None) => {}
                Err(e) => Self::note(&mut report, "action_link", &e),
            }
            if let Some(target_id) = report.target_id
                && let Err(e) = store.missions.associate_target(&mission_id, &target_id).await
            {
                Self::note(&mut report, "mission_target", &e);
            }
        }

        // 7. Bump the target's last activity to the request's timestamp.
        if let Some(target_id) = report.target_id
            && let Err(e) = store.targets.touch_activity(&target_id, created_at).await
        {
            Self::note(&mut report, "touch_activity", &e);
        }

        report
    }

    async fn link_latest_action(
        &self,
        store: &Store,
        request_id: &RequestId,
        mission_id: &MissionId,
    ) -> Result<Option<ActionId>> {
        let Some(action) = store.actions.latest(mission_id).await? else {
            return Ok(None);
        };
        store.requests.link_to_action(request_id, &action.id).await?;
        Ok(Some(action.id))
    }

    fn build_record(
        &self,
        request: &TransferRequest,
        outcome: &TransferOutcome,
        key: &Option<TargetKey>,
        target_id: Option<TargetId>,
    ) -> NewHttpRequest {
        let path = url::Url::parse(&outcome.final_url)
            .ok()
            .map(|u| u.path().to_owned());
        let request_body = request
            .body
            .as_deref()
            .map(|b| truncate_body(b, self.limits.max_request_bytes));
        let response_body = (!outcome.body.is_empty())
            .then(|| truncate_body(&outcome.body, self.limits.max_response_bytes));

        NewHttpRequest {
            method: request.method,
            url: request.url.clone(),
            final_url: outcome.final_url.clone(),
            host: key.as_ref().map(|k| k.host.clone()),
            path,
            query_params: request.query_params.clone(),
            request_headers: self.redaction.redact(&request.headers),
            request_cookies: request.cookies.clone(),
            request_body: request_body.as_ref().map(|b| b.text.clone()),
            request_body_size: request_body.as_ref().map(|b| b.original_size),
            status_code: outcome.status.map(i32::from),
            response_headers: self.redaction.redact(&outcome.headers),
            response_body: response_body.as_ref().map(|b| b.text.clone()),
            response_body_size: response_body.as_ref().map(|b| b.original_size),
            elapsed_ms: Some(outcome.elapsed_ms as i64),
            error: outcome.failure.as_ref().map(|f| f.message.clone()),
            target_id,
            created_at: Utc::now(),
        }
    }

    fn note(report: &mut LogReport, step: &str, error: &dyn std::fmt::Display) {
        warn!(step, %error, "logging pipeline step failed");
        report.notes.push(format!("{step}: {error}"));
    }
}
