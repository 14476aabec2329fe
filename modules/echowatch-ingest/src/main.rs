use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use echowatch_common::Config;
use echowatch_ingest::pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("echowatch=info".parse()?))
        .init();

    info!("echowatch starting...");

    let config = Config::from_env();
    let pipeline = Pipeline::connect(config).await?;

    let mode = std::env::args().nth(1);
    match mode.as_deref() {
        Some("sweep") => {
            info!("Running sentiment backfill sweep");
            pipeline.run_sweep().await?;
        }
        Some(other) => {
            anyhow::bail!("Unknown argument: {other} (expected no argument or \"sweep\")");
        }
        None => {
            let summary = pipeline.run().await;
            info!("{summary}");
            if summary.failed_stages() > 0 {
                info!(failed = summary.failed_stages(), "Run finished with failed stages");
            }
        }
    }

    Ok(())
}
