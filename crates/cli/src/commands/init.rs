//! `tof init`: write the default configuration.

use tof_config::TofConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = TofConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("ToF First-Time Setup");
    println!("======================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
        return Ok(());
    }

    std::fs::write(&config_path, TofConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Pick an index backend (memory, file, qdrant, none)");
    println!("   2. Run: tof doctor");
    println!("   3. Run: tof check contexts.json\n");

    Ok(())
}
