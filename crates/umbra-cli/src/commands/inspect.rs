use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use umbra_core::fits::FitsReader;
use umbra_core::header::{format_timestamp, HeaderView};
use umbra_core::validate::ImageStats;

#[derive(Args)]
pub struct InspectArgs {
    /// FITS file to inspect
    pub file: PathBuf,

    /// Also compute the validation statistics (reads pixel data)
    #[arg(long)]
    pub stats: bool,
}

pub fn run(args: &InspectArgs) -> Result<()> {
    let reader = FitsReader::open(&args.file)?;
    let view = HeaderView::new(&reader.header);

    println!("File:         {}", args.file.display());
    if let Some(dims) = reader.header.dims().get(0..2) {
        println!("Dimensions:   {}x{}", dims[0], dims[1]);
    }
    println!("Bit depth:    {}", reader.header.bitpix());
    if let Some(kind) = view.image_type() {
        println!("Image type:   {}", kind);
    }
    if let Some(camera) = view.camera_id() {
        println!("Camera:       {}", camera);
    }
    if let Some(ts) = view.timestamp() {
        println!("Acquired:     {}", format_timestamp(ts));
    }
    if let Some(exposure) = view.exposure_s() {
        println!("Exposure:     {} s", exposure);
    }
    if let Some(temperature) = view.temperature_c() {
        println!("Temperature:  {} \u{b0}C", temperature);
    }
    if let Some(gain) = view.gain() {
        println!("Gain:         {}", gain);
    }
    if let Some((x, y)) = view.binning() {
        println!("Binning:      {}x{}", x, y);
    }
    println!("CFA:          {}", if view.is_cfa() { "yes" } else { "no" });
    if view.n_frames_used() > 0 {
        println!("Stacked from: {} frames", view.n_frames_used());
    }
    if let Some(sig) = view.stack_signature() {
        println!("Stack params: {}", sig);
    }

    if args.stats {
        let pixels = reader.read_pixels()?;
        let stats = ImageStats::compute(&pixels);
        println!();
        println!("Median:       {:.2}", stats.median);
        println!("MAD:          {:.2}", stats.mad);
        println!("Mean:         {:.2}", stats.mean);
        println!("Std:          {:.2}", stats.std);
        println!("P10/P90:      {:.2} / {:.2}", stats.p10, stats.p90);
        if let Some(ratio) = stats.mad_ratio {
            println!("MAD ratio:    {:.4}", ratio);
        }
        if let Some(dispersion) = stats.central_dispersion {
            println!("Dispersion:   {:.4}", dispersion);
        }
        println!("Hot pixels:   {:.4}%", stats.hot_pixel_fraction * 100.0);
    }

    Ok(())
}
