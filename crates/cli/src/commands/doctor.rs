//! `tof doctor`: diagnose config, embedders and the semantic index.

use std::path::Path;
use tof_config::TofConfig;
use tof_engine::ToFManager;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 ToF Doctor");
    println!("==============\n");

    let mut issues = 0;

    // Config
    let default_path = TofConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(&default_path);
    if path.exists() {
        println!("  ✅ Config file: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {} (using defaults)", path.display());
    }

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n❌ 1 issue(s) found. Fix the config and re-run doctor.");
            return Err(e.into());
        }
    };

    let manager = match ToFManager::from_config(&config) {
        Ok(manager) => manager,
        Err(e) => {
            println!("  ❌ Engine setup failed: {e}");
            println!("\n❌ 1 issue(s) found.");
            return Err(e.into());
        }
    };

    // Embedding profiles
    for profile in manager.store().router().profiles() {
        let embedder = &profile.embedder;
        match embedder.encode_checked("tof doctor self-test").await {
            Ok(vector) => println!(
                "  ✅ Embedding profile '{}' ({} dims)",
                profile.name,
                vector.len()
            ),
            Err(e) => {
                println!("  ❌ Embedding profile '{}': {e}", profile.name);
                issues += 1;
            }
        }
    }

    // Semantic index
    let backend = manager.store().index().name().to_string();
    match manager.store().health_check().await {
        Ok(true) => println!("  ✅ Semantic index '{backend}' healthy"),
        Ok(false) => {
            println!("  ⚠️  Semantic index '{backend}' reports unhealthy");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Semantic index '{backend}' unreachable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("✅ All checks passed!");
    } else {
        println!("⚠️  {issues} issue(s) found. Validation still runs; recovery falls back to local history.");
    }

    Ok(())
}
