use std::path::PathBuf;

use anyhow::Result;
use console::Style;
use umbra_core::header::format_timestamp;
use umbra_core::master::list_masters;

#[derive(clap::Args)]
pub struct ListArgs {
    /// Master library directory
    pub library: PathBuf,
}

pub fn run(args: &ListArgs) -> Result<()> {
    let masters = list_masters(&args.library)?;
    if masters.is_empty() {
        println!("No masters in {}", args.library.display());
        return Ok(());
    }

    let name_style = Style::new().bold();
    let dim = Style::new().dim();

    for master in &masters {
        let name = master
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| master.path.display().to_string());
        println!("{}", name_style.apply_to(name));
        println!(
            "  frames:     {}",
            if master.n_frames_used > 0 {
                master.n_frames_used.to_string()
            } else {
                "unknown".to_string()
            }
        );
        if let Some(created) = master.created_at {
            println!("  newest sub: {}", format_timestamp(created));
        }
        if let Some(ref sig) = master.stack_signature {
            println!("  stack:      {}", dim.apply_to(sig));
        }
    }
    println!("\n{} master(s)", masters.len());
    Ok(())
}
