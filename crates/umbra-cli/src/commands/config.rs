use std::path::PathBuf;

use anyhow::Result;
use umbra_core::pipeline::RunConfig;

/// Print a full default RunConfig as TOML to stdout.
pub fn run() -> Result<()> {
    let config = RunConfig {
        input_roots: vec![PathBuf::from("darks")],
        library_root: PathBuf::from("library"),
        ..RunConfig::default()
    };
    let toml_str = toml::to_string_pretty(&config)?;
    print!("{}", toml_str);
    Ok(())
}
