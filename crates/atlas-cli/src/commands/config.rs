use std::path::Path;

use atlas_core::AtlasConfig;

/// Write a scaffold atlas.toml. An existing file is left alone.
pub fn init(path: &Path, server: &str) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let config = AtlasConfig::scaffold(server);
    std::fs::write(path, config.to_toml_string()?)?;
    println!("✓ Generated {}", path.display());
    Ok(())
}
