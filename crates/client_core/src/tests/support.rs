use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use shared::{
    domain::{InvoiceId, MatchId, PurchaseOrderId},
    error::ApiError,
    protocol::{
        HealthStatus, MatchOutcome, PendingMatch, PurchaseOrderDetail, PurchaseOrderSummary,
        SyncReport, UploadResult,
    },
};
use tokio::sync::{Mutex, Notify};

use crate::api::{InvoiceFile, ReconciliationApi};

pub fn sample_upload() -> UploadResult {
    UploadResult {
        invoice_id: InvoiceId::from("inv-1"),
        invoice_number: Some("INV-100".into()),
        vendor_name: Some("Acme".into()),
        amount: Some(542.10),
        document_type: Some("pdf".into()),
    }
}

pub fn sample_matched() -> MatchOutcome {
    MatchOutcome::Matched {
        match_id: None,
        po_number: "PO-9".into(),
        match_score: 0.87,
        requires_approval: true,
        reasoning: "vendor+amount match".into(),
    }
}

pub fn pending(match_id: &str) -> PendingMatch {
    PendingMatch {
        match_id: MatchId::from(match_id),
        invoice_number: Some(format!("INV-{match_id}")),
        po_number: Some("PO-9".into()),
        amount: Some(100.0),
        score: 0.75,
        reasoning: Some("vendor match".into()),
    }
}

pub fn purchase_order(po_number: &str) -> PurchaseOrderSummary {
    PurchaseOrderSummary {
        po_id: PurchaseOrderId::from(po_number),
        po_number: po_number.into(),
        po_line: Some(1),
        vendor_name: Some("Acme".into()),
        description: Some("Widgets".into()),
        line_amount: 1000.0,
        remaining_amount: 457.90,
        due_date: None,
    }
}

pub fn invoice_file() -> InvoiceFile {
    InvoiceFile::new("invoice.pdf", b"%PDF-1.4".to_vec())
}

/// Scriptable in-memory backend. Gates hold a call until notified so tests
/// can observe in-flight state.
pub struct FakeApi {
    upload_response: Result<UploadResult, ApiError>,
    match_response: Result<MatchOutcome, ApiError>,
    pending_response: Result<Vec<PendingMatch>, ApiError>,
    pending_responses: Mutex<VecDeque<Result<Vec<PendingMatch>, ApiError>>>,
    purchase_orders_response: Result<Vec<PurchaseOrderSummary>, ApiError>,
    approve_responses: Mutex<VecDeque<Result<(), ApiError>>>,
    pub upload_gate: Option<Arc<Notify>>,
    pub match_gate: Option<Arc<Notify>>,
    pub approve_gate: Option<Arc<Notify>>,
    pub first_pending_gate: Option<Arc<Notify>>,
    pub upload_calls: AtomicUsize,
    pub match_calls: AtomicUsize,
    pub pending_calls: AtomicUsize,
    pub matched_invoices: Mutex<Vec<InvoiceId>>,
    pub uploaded_files: Mutex<Vec<InvoiceFile>>,
    pub approved: Mutex<Vec<MatchId>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            upload_response: Ok(sample_upload()),
            match_response: Ok(sample_matched()),
            pending_response: Ok(Vec::new()),
            pending_responses: Mutex::new(VecDeque::new()),
            purchase_orders_response: Ok(Vec::new()),
            approve_responses: Mutex::new(VecDeque::new()),
            upload_gate: None,
            match_gate: None,
            approve_gate: None,
            first_pending_gate: None,
            upload_calls: AtomicUsize::new(0),
            match_calls: AtomicUsize::new(0),
            pending_calls: AtomicUsize::new(0),
            matched_invoices: Mutex::new(Vec::new()),
            uploaded_files: Mutex::new(Vec::new()),
            approved: Mutex::new(Vec::new()),
        }
    }

    pub fn with_upload(mut self, response: Result<UploadResult, ApiError>) -> Self {
        self.upload_response = response;
        self
    }

    pub fn with_match(mut self, response: Result<MatchOutcome, ApiError>) -> Self {
        self.match_response = response;
        self
    }

    pub fn with_pending(mut self, response: Result<Vec<PendingMatch>, ApiError>) -> Self {
        self.pending_response = response;
        self
    }

    /// Responses for successive pending-match fetches; exhausted queue
    /// falls back to `with_pending`.
    pub fn with_pending_responses(
        self,
        responses: Vec<Result<Vec<PendingMatch>, ApiError>>,
    ) -> Self {
        Self {
            pending_responses: Mutex::new(responses.into()),
            ..self
        }
    }

    pub fn with_purchase_orders(
        mut self,
        response: Result<Vec<PurchaseOrderSummary>, ApiError>,
    ) -> Self {
        self.purchase_orders_response = response;
        self
    }

    /// Responses for successive approve calls; exhausted queue answers Ok.
    pub fn with_approve_responses(self, responses: Vec<Result<(), ApiError>>) -> Self {
        Self {
            approve_responses: Mutex::new(responses.into()),
            ..self
        }
    }

    pub fn gated_upload(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.upload_gate = Some(gate.clone());
        (self, gate)
    }

    pub fn gated_match(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.match_gate = Some(gate.clone());
        (self, gate)
    }

    pub fn gated_approve(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.approve_gate = Some(gate.clone());
        (self, gate)
    }

    /// Holds only the first pending-match fetch; later fetches answer at once.
    pub fn gated_first_pending(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.first_pending_gate = Some(gate.clone());
        (self, gate)
    }

    pub fn upload_count(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn match_count(&self) -> usize {
        self.match_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReconciliationApi for FakeApi {
    async fn upload_invoice(&self, file: InvoiceFile) -> Result<UploadResult, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded_files.lock().await.push(file);
        if let Some(gate) = &self.upload_gate {
            gate.notified().await;
        }
        self.upload_response.clone()
    }

    async fn match_invoice(&self, invoice_id: &InvoiceId) -> Result<MatchOutcome, ApiError> {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        self.matched_invoices.lock().await.push(invoice_id.clone());
        if let Some(gate) = &self.match_gate {
            gate.notified().await;
        }
        self.match_response.clone()
    }

    async fn list_pending_matches(&self) -> Result<Vec<PendingMatch>, ApiError> {
        let call = self.pending_calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .pending_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.pending_response.clone());
        if let (0, Some(gate)) = (call, &self.first_pending_gate) {
            gate.notified().await;
        }
        response
    }

    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrderSummary>, ApiError> {
        self.purchase_orders_response.clone()
    }

    async fn approve_match(&self, match_id: &MatchId) -> Result<(), ApiError> {
        self.approved.lock().await.push(match_id.clone());
        if let Some(gate) = &self.approve_gate {
            gate.notified().await;
        }
        self.approve_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn purchase_order(
        &self,
        po_id: &PurchaseOrderId,
    ) -> Result<PurchaseOrderDetail, ApiError> {
        Err(ApiError::NotFound {
            detail: format!("Purchase order {po_id} not found"),
        })
    }

    async fn sync_purchase_orders(&self) -> Result<SyncReport, ApiError> {
        Err(ApiError::Transport("sync unavailable".into()))
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus {
            status: "healthy".into(),
        })
    }
}
