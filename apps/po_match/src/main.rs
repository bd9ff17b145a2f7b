use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::normalize_api_base_url,
    load_settings,
    render::{format_amount, render_dashboard, render_workflow},
    ApprovalOutcome, CancelToken, Dashboard, HttpReconciliationApi, InvoiceFile, MatchWorkflow,
    ReconciliationApi, RequestPolicy, WorkflowPhase,
};
use shared::domain::{MatchId, PurchaseOrderId};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Upload invoices and reconcile them against purchase orders")]
struct Cli {
    /// Overrides the configured API base URL, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload an invoice document and match it against open purchase orders.
    Upload { path: PathBuf },
    /// Show pending matches and available purchase orders.
    Dashboard,
    /// Approve a pending match.
    Approve { match_id: String },
    /// Show one purchase order with its linked invoices.
    PurchaseOrder { po_id: String },
    /// Ask the backend to pull purchase orders from the ERP.
    Sync,
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings()?;
    if let Some(url) = cli.api_base_url.as_deref() {
        settings.api_base_url = normalize_api_base_url(url);
    }
    if let Some(secs) = cli.timeout_secs {
        settings.request_timeout_secs = secs;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let policy = settings.request_policy();
    let api: Arc<dyn ReconciliationApi> = Arc::new(
        HttpReconciliationApi::new(&settings.api_base_url)
            .with_context(|| format!("cannot use api base url '{}'", settings.api_base_url))?,
    );
    tracing::debug!(
        api_base_url = %settings.api_base_url,
        timeout = ?policy.timeout,
        "client configured"
    );

    match cli.command {
        Command::Upload { path } => upload(api, policy, path).await,
        Command::Dashboard => {
            let dashboard = Dashboard::new(api, policy);
            let snapshot = dashboard.activate().await;
            println!("{}", render_dashboard(&snapshot));
            Ok(())
        }
        Command::Approve { match_id } => approve(api, policy, MatchId::new(match_id)).await,
        Command::PurchaseOrder { po_id } => {
            let detail = policy
                .run(
                    &CancelToken::new(),
                    api.purchase_order(&PurchaseOrderId::new(po_id)),
                )
                .await?;
            let po = &detail.summary;
            println!("PO #: {}", po.po_number);
            println!("Vendor: {}", po.vendor_name.as_deref().unwrap_or("-"));
            println!("Description: {}", po.description.as_deref().unwrap_or("-"));
            println!("Line amount: {}", format_amount(Some(po.line_amount)));
            println!("Received: {}", format_amount(detail.received_amount));
            println!("Remaining: {}", format_amount(Some(po.remaining_amount)));
            if detail.invoices.is_empty() {
                println!("No invoices linked");
            }
            for invoice in &detail.invoices {
                println!(
                    "  {} {} {}",
                    invoice.invoice_id,
                    invoice.invoice_number.as_deref().unwrap_or("-"),
                    format_amount(invoice.amount)
                );
            }
            Ok(())
        }
        Command::Sync => {
            let report = policy
                .run(&CancelToken::new(), api.sync_purchase_orders())
                .await?;
            println!("{}", report.message);
            Ok(())
        }
        Command::Health => {
            let health = policy.run(&CancelToken::new(), api.health()).await?;
            println!("{}", health.status);
            Ok(())
        }
    }
}

async fn upload(
    api: Arc<dyn ReconciliationApi>,
    policy: RequestPolicy,
    path: PathBuf,
) -> Result<()> {
    let file = InvoiceFile::from_path(&path).await?;
    let workflow = Arc::new(MatchWorkflow::new(api, policy));
    let mut events = workflow.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(phase) = events.recv().await {
            match phase {
                WorkflowPhase::Uploading => eprintln!("Uploading..."),
                WorkflowPhase::Matching => eprintln!("Matching..."),
                phase if phase.is_terminal() => break,
                _ => {}
            }
        }
    });

    workflow.select_file(file).await;
    let terminal = workflow
        .submit()
        .await
        .ok_or_else(|| anyhow!("submission did not run"))?;
    progress.await.context("progress printer task failed")?;

    println!("{}", render_workflow(&workflow.snapshot().await));
    if let WorkflowPhase::Errored { stage, .. } = terminal {
        bail!("{stage} step failed");
    }
    Ok(())
}

async fn approve(
    api: Arc<dyn ReconciliationApi>,
    policy: RequestPolicy,
    match_id: MatchId,
) -> Result<()> {
    let dashboard = Dashboard::new(api, policy);
    let snapshot = dashboard.activate().await;
    if snapshot.pending.is_failed() {
        println!("{}", render_dashboard(&snapshot));
        bail!("could not load pending matches");
    }

    match dashboard.approve(&match_id).await? {
        ApprovalOutcome::Approved => println!("Approved match {match_id}"),
        ApprovalOutcome::AlreadyResolved => {
            println!("Match {match_id} is not pending; nothing to approve")
        }
    }
    println!();
    println!("{}", render_dashboard(&dashboard.snapshot().await));
    Ok(())
}
