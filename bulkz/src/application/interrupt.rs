use std::thread;

use bulkz_core::CancelToken;

use super::EXIT_INTERRUPTED;

/// Listen for Ctrl-C on a background thread. The first interrupt cancels
/// `cancel` so the batch winds down and cleans up; a second one exits at once.
pub fn install(cancel: CancelToken) -> std::io::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("bulkz-signal".to_string())
        .spawn(move || {
            rt.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "cannot listen for interrupts");
                    return;
                }
                tracing::warn!("interrupt received, stopping (press Ctrl-C again to exit now)");
                cancel.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(EXIT_INTERRUPTED);
                }
            });
        })?;
    Ok(())
}
