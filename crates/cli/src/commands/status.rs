//! `proctor status`: Show the effective configuration.

use proctor_config::AppConfig;
use proctor_store::FileSegmentStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let fixture = config
        .fixtures
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".into());
    let store = config
        .store
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "in-memory".into());

    println!("📋 Proctor Status");
    println!("=================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Fixture:      {fixture}");
    println!("  Store:        {store}");
    println!("  Cache TTL:    {}h", config.cache.idle_ttl_hours);
    println!("  Language:     {} accommodation", config.assembly.language_accommodation_type);
    println!("  Logging:      {}{}", config.logging.level, if config.logging.json { " (json)" } else { "" });

    if let Some(path) = &config.store.path {
        let store = FileSegmentStore::open(path.clone());
        println!(
            "  Recorded:     {} segments, {} field test groups",
            store.segment_count().await,
            store.group_count().await
        );
    }

    if AppConfig::config_path().exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `proctor init` first");
    }

    Ok(())
}
