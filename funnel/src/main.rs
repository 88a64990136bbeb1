use args::Args;
use clap::Parser;
use proxy::Proxy;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(&args);

    let proxy_config = config::load(&args.config_path)?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let log_dir = config::user_config_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    log::info!("starting mcp-funnel, run id '{run_id}'");

    let proxy = Proxy::start(proxy_config, &run_id, &log_dir).await?;
    proxy.serve_stdio().await?;

    Ok(())
}
