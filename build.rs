use std::env;
use std::fs;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=config/");
    println!("cargo:rerun-if-env-changed=VDI_COLLECTOR_CONFIG");

    // Only run config embedding when feature is enabled
    if env::var("CARGO_FEATURE_EMBED_CONFIG").is_ok() {
        embed_config()?;
    }

    Ok(())
}

fn embed_config() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = Path::new("config");
    fs::create_dir_all(config_dir)?;
    let embedded_path = config_dir.join("default_config.yaml");

    // A custom config given at build time replaces the shipped default
    if let Ok(custom_path) = env::var("VDI_COLLECTOR_CONFIG") {
        let custom_path = Path::new(&custom_path);
        if custom_path.exists() {
            println!(
                "cargo:warning=Embedding custom config from {}",
                custom_path.display()
            );
            fs::copy(custom_path, &embedded_path)?;
            return Ok(());
        }
        println!(
            "cargo:warning=Specified custom config not found: {}",
            custom_path.display()
        );
    }

    if !embedded_path.exists() {
        println!("cargo:warning=No config found, the binary will use built-in defaults");
    }

    Ok(())
}
