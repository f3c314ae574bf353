//! `proctor config`: Configuration management commands.

use proctor_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            match &config.fixtures.path {
                None => warnings.push("No default fixture set (fixtures.path or PROCTOR_FIXTURE)".to_string()),
                Some(path) if !path.exists() => {
                    warnings.push(format!("Fixture file does not exist: {}", path.display()))
                }
                Some(_) => {}
            }

            if let Some(parent) = config.store.path.as_ref().and_then(|p| p.parent()) {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    warnings.push(format!("Store directory does not exist: {}", parent.display()));
                }
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Cache TTL:  {}h", config.cache.idle_ttl_hours);
            println!("   Language:   {} accommodation", config.assembly.language_accommodation_type);
            println!("   Log level:  {}", config.logging.level);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}
