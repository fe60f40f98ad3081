#![allow(dead_code)]

use std::path::{Path, PathBuf};

use umbra_core::fits::{self, FitsHeader};
use umbra_core::frame::{FrameInfo, FrameKind};
use umbra_core::header::parse_timestamp;

pub const CAMERA: &str = "TestCam 183MM s1234";

/// Builder for synthetic calibration FITS files.
///
/// Defaults describe a clean 32x32 dark at gain 100, -10 C, 300 s.
pub struct TestFrame {
    pub date_obs: String,
    pub exposure_s: f64,
    pub temperature_c: f64,
    pub gain: i64,
    pub binning: u32,
    pub camera: String,
    pub image_type: Option<String>,
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u16>,
}

impl TestFrame {
    pub fn dark(date_obs: &str) -> Self {
        Self {
            date_obs: date_obs.to_string(),
            exposure_s: 300.0,
            temperature_c: -10.0,
            gain: 100,
            binning: 1,
            camera: CAMERA.to_string(),
            image_type: Some("Dark".to_string()),
            width: 32,
            height: 32,
            pixels: quiet_dark_pixels(32, 32),
        }
    }

    pub fn exposure(mut self, exposure_s: f64) -> Self {
        self.exposure_s = exposure_s;
        self
    }

    pub fn temperature(mut self, temperature_c: f64) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    pub fn gain(mut self, gain: i64) -> Self {
        self.gain = gain;
        self
    }

    pub fn image_type(mut self, image_type: Option<&str>) -> Self {
        self.image_type = image_type.map(str::to_string);
        self
    }

    pub fn pixels(mut self, pixels: Vec<u16>) -> Self {
        assert_eq!(pixels.len(), self.width * self.height);
        self.pixels = pixels;
        self
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut header = FitsHeader::new_2d(self.width, self.height);
        header.set_str("DATE-OBS", &self.date_obs, None);
        header.set_f64("CCD-TEMP", self.temperature_c, None);
        header.set_f64("EXPTIME", self.exposure_s, None);
        header.set_i64("GAIN", self.gain, None);
        header.set_i64("XBINNING", self.binning as i64, None);
        header.set_i64("YBINNING", self.binning as i64, None);
        header.set_str("INSTRUME", &self.camera, None);
        if let Some(ref kind) = self.image_type {
            header.set_str("IMAGETYP", kind, None);
        }
        fits::write_image_u16(&path, &mut header, &self.pixels).expect("write test frame");
        path
    }
}

/// Low, slightly dithered dark signal that passes every validation test.
pub fn quiet_dark_pixels(width: usize, height: usize) -> Vec<u16> {
    (0..width * height).map(|i| 50 + (i * 7 % 5) as u16).collect()
}

/// Dark signal with a synthetic star field: ~3% of pixels saturate high,
/// which trips the hot-pixel test but leaves the median untouched.
pub fn star_field_pixels(width: usize, height: usize) -> Vec<u16> {
    (0..width * height)
        .map(|i| if i % 33 == 0 { 4000 } else { 50 + (i * 7 % 5) as u16 })
        .collect()
}

/// Uniformly bright frame, as if the shutter stayed open.
pub fn bright_pixels(width: usize, height: usize, level: u16) -> Vec<u16> {
    vec![level; width * height]
}

/// In-memory frame metadata without a backing file, for grouper and
/// policy tests that never touch pixels.
pub fn frame_info(path: &str, date_obs: &str, exposure_s: f64, temperature_c: f64) -> FrameInfo {
    FrameInfo {
        path: PathBuf::from(path),
        acquired_at: parse_timestamp(date_obs).expect("test timestamp"),
        camera_id: CAMERA.to_string(),
        binning: (1, 1),
        gain: 100,
        exposure_s,
        temperature_c,
        is_cfa: false,
        kind: FrameKind::Dark,
    }
}

/// Write a pre-existing master with the given provenance cards, the way a
/// previous run would have left it.
pub fn write_master_file(path: &Path, date_obs: &str, n_frames: usize, signature: &str) {
    let mut header = FitsHeader::new_2d(32, 32);
    header.set_str("IMAGETYP", "Master Dark", None);
    header.set_str("INSTRUME", CAMERA, None);
    header.set_str("DATE-OBS", date_obs, None);
    header.set_i64("NSTACK", n_frames as i64, None);
    header.set_str("STACKSIG", signature, None);
    let pixels = quiet_dark_pixels(32, 32);
    fits::write_image_u16(path, &mut header, &pixels).expect("write test master");
}
