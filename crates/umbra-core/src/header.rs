use chrono::{DateTime, NaiveDateTime, Utc};

use crate::fits::FitsHeader;

/// Header keywords the pipeline reads and writes, by semantic role.
pub mod keys {
    /// Acquisition timestamp, ISO-8601 in UTC.
    pub const DATE_OBS: &str = "DATE-OBS";
    /// Sensor temperature in degrees Celsius.
    pub const CCD_TEMP: &str = "CCD-TEMP";
    /// Exposure in seconds.
    pub const EXPTIME: &str = "EXPTIME";
    /// Alternate exposure keyword used by some capture software.
    pub const EXPOSURE: &str = "EXPOSURE";
    pub const GAIN: &str = "GAIN";
    pub const XBINNING: &str = "XBINNING";
    pub const YBINNING: &str = "YBINNING";
    /// Camera identifier (manufacturer+model+serial).
    pub const INSTRUME: &str = "INSTRUME";
    /// Image-kind hint ("Dark", "Bias", ...). Optional.
    pub const IMAGETYP: &str = "IMAGETYP";
    /// Colour filter array pattern; presence marks a CFA sensor.
    pub const BAYERPAT: &str = "BAYERPAT";
    /// Whether the frame came from a CFA sensor (written on masters).
    pub const CFAIMG: &str = "CFAIMG";
    /// Number of frames stacked into a master.
    pub const NSTACK: &str = "NSTACK";
    /// Canonical stacking-parameter signature.
    pub const STACKSIG: &str = "STACKSIG";
    /// Engine command line used to build a master.
    pub const STACKCMD: &str = "STACKCMD";
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_end_matches('Z');
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Typed view over a FITS header: each accessor returns `None` when the
/// field is absent or unparsable, and the caller decides what is required.
pub struct HeaderView<'a> {
    header: &'a FitsHeader,
}

impl<'a> HeaderView<'a> {
    pub fn new(header: &'a FitsHeader) -> Self {
        Self { header }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.header.get_str(keys::DATE_OBS)?)
    }

    pub fn temperature_c(&self) -> Option<f64> {
        self.header.get_f64(keys::CCD_TEMP)
    }

    pub fn exposure_s(&self) -> Option<f64> {
        self.header
            .get_f64(keys::EXPTIME)
            .or_else(|| self.header.get_f64(keys::EXPOSURE))
    }

    pub fn gain(&self) -> Option<i64> {
        self.header
            .get_i64(keys::GAIN)
            .or_else(|| self.header.get_f64(keys::GAIN).map(|g| g.round() as i64))
    }

    pub fn binning(&self) -> Option<(u32, u32)> {
        let x = self.header.get_i64(keys::XBINNING)?;
        let y = self.header.get_i64(keys::YBINNING).unwrap_or(x);
        Some((x as u32, y as u32))
    }

    pub fn camera_id(&self) -> Option<&str> {
        self.header.get_str(keys::INSTRUME)
    }

    pub fn image_type(&self) -> Option<&str> {
        self.header.get_str(keys::IMAGETYP)
    }

    pub fn is_cfa(&self) -> bool {
        self.header
            .get_str(keys::BAYERPAT)
            .is_some_and(|p| !p.is_empty())
    }

    /// Frame count recorded on a master; 0 when absent (older masters).
    pub fn n_frames_used(&self) -> usize {
        self.header.get_i64(keys::NSTACK).unwrap_or(0).max(0) as usize
    }

    pub fn stack_signature(&self) -> Option<&str> {
        self.header.get_str(keys::STACKSIG)
    }
}
