use dotenvy::dotenv;
use impulse_ledger::{
    collaborators::{NoImageStore, StaticEntitlement, SystemClock},
    config::{database, settings},
    core::{
        money::apply_tax,
        monthly::{adjusted_total_saved, format_month_summary, rollover_if_needed},
        savings_cap::{SavingsCapGuard, format_progress_bar},
        undo::UndoBuffer,
    },
    errors::Result,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load settings (defaults when there is no config.toml)
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    // 4. Connect and make sure the tables exist
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Undo buffer with the configured grace window; this host keeps no images
    let undo = UndoBuffer::new(
        db.clone(),
        Arc::new(NoImageStore),
        Arc::new(SystemClock),
        settings.undo.grace_period(),
    );
    info!(grace_period_ms = settings.undo.grace_period_ms, "Undo buffer ready");

    // 6. Freeze last month if it is due
    let clock = SystemClock;
    match rollover_if_needed(&db, &clock).await? {
        Some(summary) => {
            let shown = adjusted_total_saved(&db, &summary).await?;
            info!(
                "\n{}  With tax: ${:.2}",
                format_month_summary(&summary, shown),
                apply_tax(shown, settings.display.tax_rate)
            );
        }
        None => info!("No month rollover needed."),
    }

    // 7. Report where the account stands against the savings cap
    let guard = SavingsCapGuard::new(
        settings.savings_cap,
        Arc::new(StaticEntitlement(settings.account.premium)),
    );
    let report = guard.report(&db).await?;
    info!(
        status = ?report.status,
        total = %report.total,
        remaining = %report.remaining,
        "Savings cap {}",
        format_progress_bar(report.progress_percent, None)
    );

    // 8. Finalize anything still inside its grace window before exiting
    undo.flush().await;

    Ok(())
}
