//! `tof status`: show the effective configuration.

use std::path::Path;
use tof_config::TofConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    println!("ToF Status");
    println!("==========");
    println!("  Config dir:   {}", TofConfig::config_dir().display());
    println!("  Index:        {}", config.index.backend);
    match config.index.backend.as_str() {
        "qdrant" => println!("  Qdrant:       {} ({})", config.index.url, config.index.collection),
        "file" => println!("  Index file:   {}", config.index_path().display()),
        _ => {}
    }
    println!("  Embeddings:   {}", config.embedding.provider);
    for profile in &config.embedding.profiles {
        let types: Vec<_> = profile.context_types.iter().map(|t| t.as_str()).collect();
        println!(
            "    {:<18} {:>4}d  {}",
            profile.name,
            profile.dimensions,
            if types.is_empty() { "-".to_string() } else { types.join(", ") }
        );
    }
    println!("    fallback: {}", config.embedding.fallback_profile);
    println!(
        "  Recovery:     threshold {}, top {}, keyed lookup {}",
        config.recovery.score_threshold,
        config.recovery.candidate_limit,
        if config.recovery.keyed_lookup { "on" } else { "off" }
    );
    println!(
        "  Retry:        {} attempts, {}ms..{}ms",
        config.retry.max_attempts, config.retry.initial_backoff_ms, config.retry.max_backoff_ms
    );

    if config_path.is_none() {
        let default_path = TofConfig::config_dir().join("config.toml");
        if default_path.exists() {
            println!("\n  ✅ Config file found");
        } else {
            println!("\n  ⚠️  No config file, run `tof init` first");
        }
    }

    Ok(())
}
