//! Plain-text views of controller snapshots.

use shared::protocol::{MatchOutcome, PendingMatch, PurchaseOrderSummary, UploadResult};

use crate::{
    dashboard::{DashboardSnapshot, ListState},
    match_workflow::{WorkflowPhase, WorkflowSnapshot},
};

pub fn format_amount(amount: Option<f64>) -> String {
    match amount {
        Some(value) => format!("${value:.2}"),
        None => "$-".to_string(),
    }
}

pub fn format_score(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

fn text(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub fn render_workflow(snapshot: &WorkflowSnapshot) -> String {
    let file_name = text(snapshot.file_name.as_deref());
    let mut lines = vec![match &snapshot.phase {
        WorkflowPhase::Idle => "No invoice selected".to_string(),
        WorkflowPhase::FileSelected => format!("Selected {file_name}"),
        WorkflowPhase::Uploading => format!("Uploading {file_name}..."),
        WorkflowPhase::Uploaded | WorkflowPhase::Matching => "Matching invoice...".to_string(),
        WorkflowPhase::Completed(_) => "Processed".to_string(),
        WorkflowPhase::Errored { stage, message } => format!("Error ({stage}): {message}"),
    }];

    if let Some(upload) = &snapshot.upload {
        lines.push(String::new());
        lines.extend(upload_lines(upload));
    }

    if let WorkflowPhase::Completed(outcome) = &snapshot.phase {
        lines.push(String::new());
        lines.extend(outcome_lines(outcome));
    }

    lines.join("\n")
}

fn upload_lines(upload: &UploadResult) -> Vec<String> {
    vec![
        "Upload Successful".to_string(),
        format!("Invoice #: {}", text(upload.invoice_number.as_deref())),
        format!("Vendor: {}", text(upload.vendor_name.as_deref())),
        format!("Amount: {}", format_amount(upload.amount)),
        format!("Type: {}", text(upload.document_type.as_deref())),
    ]
}

fn outcome_lines(outcome: &MatchOutcome) -> Vec<String> {
    let mut lines = vec!["Match Result".to_string()];
    match outcome {
        MatchOutcome::Matched {
            match_id,
            po_number,
            match_score,
            requires_approval,
            reasoning,
        } => {
            lines.push(format!("Matched PO: {po_number}"));
            lines.push(format!("Confidence: {}", format_score(*match_score)));
            lines.push(format!(
                "Requires Approval: {}",
                if *requires_approval { "Yes" } else { "No" }
            ));
            lines.push(format!("Reasoning: {reasoning}"));
            if let Some(match_id) = match_id {
                lines.push(format!("Match ID: {match_id}"));
            }
        }
        MatchOutcome::Unmatched { message } => lines.push(message.clone()),
    }
    lines
}

pub fn render_dashboard(snapshot: &DashboardSnapshot) -> String {
    let mut lines = vec!["Pending Matches".to_string()];
    lines.extend(list_lines(
        &snapshot.pending,
        "pending matches",
        "No pending matches",
        pending_line,
    ));
    lines.push(String::new());
    lines.push("Available Purchase Orders".to_string());
    lines.extend(list_lines(
        &snapshot.purchase_orders,
        "purchase orders",
        "No purchase orders available",
        purchase_order_line,
    ));
    lines.join("\n")
}

fn list_lines<T>(
    state: &ListState<T>,
    name: &str,
    empty: &str,
    row: fn(&T) -> String,
) -> Vec<String> {
    match state {
        ListState::Loading => vec!["Loading...".to_string()],
        ListState::Failed(message) => vec![format!("Failed to load {name}: {message}")],
        ListState::Loaded(items) if items.is_empty() => vec![empty.to_string()],
        ListState::Loaded(items) => items.iter().map(row).collect(),
    }
}

fn pending_line(item: &PendingMatch) -> String {
    format!(
        "{:<8} {:<14} {:<12} {:>12} {:>7}  {}",
        item.match_id,
        text(item.invoice_number.as_deref()),
        text(item.po_number.as_deref()),
        format_amount(item.amount),
        format_score(item.score),
        text(item.reasoning.as_deref()),
    )
}

fn purchase_order_line(po: &PurchaseOrderSummary) -> String {
    let marker = if po.remaining_out_of_range() { " !" } else { "" };
    format!(
        "{:<12} {:<20} {:<30} {:>12} {:>12}{marker}",
        po.po_number,
        text(po.vendor_name.as_deref()),
        text(po.description.as_deref()),
        format_amount(Some(po.line_amount)),
        format_amount(Some(po.remaining_amount)),
    )
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
