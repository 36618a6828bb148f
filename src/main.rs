use anyhow::{Context, Result};
use rtail::{init_tracing_once, Listener, ListenerOptions, OutputLayout, RedditClient};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing_once();

    let run_start = OffsetDateTime::now_utc();

    let opts = ListenerOptions::from_env().context("loading configuration")?;
    opts.validate().context("invalid configuration")?;

    OutputLayout::new(&opts.output_dir).ensure_dirs()?;

    let client = RedditClient::new(&opts)?;
    info!(
        subreddits = %opts.subreddits.join("+"),
        keyword_search = opts.keyword_search,
        keywords = opts.keywords.len(),
        comment_filter = ?opts.comment_filter,
        interval = ?opts.poll_interval,
        output = %opts.output_dir.display(),
        "Starting listener"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, finishing current cycle then shutting down");
                let _ = stop_tx.send(true);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let mut listener = Listener::new(&opts, Arc::new(client), run_start);
    listener.run_until(stop_rx).await
}
