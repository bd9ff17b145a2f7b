use serde::{Deserialize, Serialize};

use crate::{
    domain::{InvoiceId, MatchId, PurchaseOrderId},
    error::ApiError,
};

/// Matches scoring below this are queued for human approval by the backend.
pub const APPROVAL_SCORE_THRESHOLD: f64 = 0.8;

const DEFAULT_UNMATCHED_MESSAGE: &str = "No suitable purchase order found";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub invoice_id: InvoiceId,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(rename = "type", default)]
    pub document_type: Option<String>,
}

/// Flat match response as sent by the backend; which fields are present
/// depends on whether a purchase order was found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_found: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<MatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<InvoiceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_approval: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        match_id: Option<MatchId>,
        po_number: String,
        match_score: f64,
        requires_approval: bool,
        reasoning: String,
    },
    Unmatched {
        message: String,
    },
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

impl TryFrom<MatchResponse> for MatchOutcome {
    type Error = ApiError;

    fn try_from(value: MatchResponse) -> Result<Self, Self::Error> {
        // Successful matches from the backend omit `match_found`.
        let found = value.match_found.unwrap_or(value.po_number.is_some());
        if !found {
            return Ok(Self::Unmatched {
                message: value
                    .message
                    .unwrap_or_else(|| DEFAULT_UNMATCHED_MESSAGE.to_string()),
            });
        }

        let po_number = value
            .po_number
            .ok_or_else(|| ApiError::Decode("matched response without po_number".into()))?;
        let match_score = value
            .match_score
            .ok_or_else(|| ApiError::Decode("matched response without match_score".into()))?;

        Ok(Self::Matched {
            match_id: value.match_id,
            po_number,
            match_score,
            requires_approval: value
                .requires_approval
                .unwrap_or(match_score < APPROVAL_SCORE_THRESHOLD),
            reasoning: value.reasoning.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMatch {
    pub match_id: MatchId,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub po_number: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    pub score: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderSummary {
    pub po_id: PurchaseOrderId,
    pub po_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po_line: Option<i64>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub line_amount: f64,
    pub remaining_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl PurchaseOrderSummary {
    /// Display-only check; out-of-range values are shown, never rejected.
    pub fn remaining_out_of_range(&self) -> bool {
        self.remaining_amount < 0.0 || self.remaining_amount > self.line_amount
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedInvoice {
    pub invoice_id: InvoiceId,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub summary: PurchaseOrderSummary,
    #[serde(default)]
    pub received_amount: Option<f64>,
    #[serde(default)]
    pub invoices: Vec<LinkedInvoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    #[serde(default)]
    pub synced_count: Option<u64>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Error envelope of non-2xx responses. `detail` is usually a string but
/// request validation failures carry a JSON array instead.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_outcome(json: &str) -> Result<MatchOutcome, ApiError> {
        let response: MatchResponse = serde_json::from_str(json).expect("match response");
        MatchOutcome::try_from(response)
    }

    #[test]
    fn explicit_match_keeps_server_fields() {
        let outcome = parse_outcome(
            r#"{"match_found": true, "po_number": "PO-9", "match_score": 0.87,
                "requires_approval": true, "reasoning": "vendor+amount match"}"#,
        )
        .expect("matched");
        assert_eq!(
            outcome,
            MatchOutcome::Matched {
                match_id: None,
                po_number: "PO-9".into(),
                match_score: 0.87,
                requires_approval: true,
                reasoning: "vendor+amount match".into(),
            }
        );
    }

    #[test]
    fn unmatched_carries_only_the_message() {
        let outcome =
            parse_outcome(r#"{"match_found": false, "message": "No PO within amount tolerance"}"#)
                .expect("unmatched");
        assert_eq!(
            outcome,
            MatchOutcome::Unmatched {
                message: "No PO within amount tolerance".into()
            }
        );
    }

    #[test]
    fn missing_discriminant_is_inferred_from_po_number() {
        let outcome = parse_outcome(
            r#"{"match_id": 5, "invoice_id": 3, "po_number": "PO-1",
                "match_score": 0.95, "reasoning": "exact"}"#,
        )
        .expect("inferred match");
        match outcome {
            MatchOutcome::Matched {
                match_id,
                requires_approval,
                ..
            } => {
                assert_eq!(match_id, Some(MatchId::from(5)));
                assert!(!requires_approval);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let unmatched = parse_outcome(r#"{"invoice_id": 3}"#).expect("inferred unmatched");
        assert_eq!(
            unmatched,
            MatchOutcome::Unmatched {
                message: DEFAULT_UNMATCHED_MESSAGE.into()
            }
        );
    }

    #[test]
    fn matched_without_po_number_is_a_decode_error() {
        let err =
            parse_outcome(r#"{"match_found": true, "match_score": 0.5}"#).expect_err("decode");
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn remaining_amount_anomaly_is_detected() {
        let mut po = PurchaseOrderSummary {
            po_id: PurchaseOrderId::from(1),
            po_number: "PO-1".into(),
            po_line: Some(1),
            vendor_name: Some("Acme".into()),
            description: None,
            line_amount: 100.0,
            remaining_amount: 40.0,
            due_date: None,
        };
        assert!(!po.remaining_out_of_range());
        po.remaining_amount = 120.0;
        assert!(po.remaining_out_of_range());
        po.remaining_amount = -1.0;
        assert!(po.remaining_out_of_range());
    }

    #[test]
    fn error_body_renders_structured_detail() {
        let text: ErrorBody = serde_json::from_str(r#"{"detail": "Invoice not found"}"#).unwrap();
        assert_eq!(text.detail_text().as_deref(), Some("Invoice not found"));

        let list: ErrorBody =
            serde_json::from_str(r#"{"detail": [{"msg": "field required"}]}"#).unwrap();
        assert_eq!(
            list.detail_text().as_deref(),
            Some(r#"[{"msg":"field required"}]"#)
        );

        let empty: ErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.detail_text(), None);
    }
}
