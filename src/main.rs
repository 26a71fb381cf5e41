
pub mod backoff;
pub mod bookmark;
pub mod config;
pub mod output;
pub mod records;
pub mod salesforce;
pub mod seen_cache;
pub mod sync;

use {
    config::Config,
    salesforce::SalesforceClient,
    seen_cache::SeenCache,
    sync::SyncPipeline,
};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    // NOTE: Workaround for rustls issue
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Can't set crypto provider to aws_lc_rs");

    // Unreadable configuration aborts before any state is touched
    let config = Config::from_env()?;

    log::info!("🚀 Starting sfsync...");
    log::info!("📊 Configuration:");
    log::info!("   Instance: {}", config.instance_url);
    log::info!("   Event types: {:?}", config.event_types);
    log::info!(
        "   Output: {} ({:?} mode)",
        config.output_path.display(),
        config.output_mode
    );

    let mut client = SalesforceClient::new(&config)?;
    log::info!("Logging into Salesforce...");
    client.login().await?;

    let pipeline = SyncPipeline::new(client, &config)?;

    // Loaded only after the fatal-abort steps so every later exit path,
    // normal or interrupted, reaches the flush below
    let mut cache = SeenCache::load(&config.cache_path, config.cache_capacity);
    log::info!(
        "Seen cache loaded: {} of {} entries",
        cache.len(),
        cache.capacity()
    );

    // ctrl-c cancels the in-flight cycle; the cache flush below still runs
    let result = tokio::select! {
        res = pipeline.run_cycle(&mut cache) => res.map(Some),
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupt received, stopping...");
            Ok(None)
        }
    };

    if let Err(e) = cache.flush() {
        log::error!(
            "Failed to persist seen cache to {}: {}",
            config.cache_path.display(),
            e
        );
    }

    match result {
        Ok(Some(summary)) => {
            log::info!(
                "✅ Cycle complete: {}/{} log files new, {}/{} audit records new",
                summary.logs_new,
                summary.logs_available,
                summary.audit_new,
                summary.audit_available
            );
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            log::error!("❌ Sync cycle failed: {}", e);
            Err(e.into())
        }
    }
}
