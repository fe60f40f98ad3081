/// File extensions recognised as FITS images (lowercase).
pub const FITS_EXTENSIONS: [&str; 3] = ["fit", "fits", "fts"];

/// Exposures at or below this many seconds are classified as bias frames
/// when the header carries no explicit image-type hint.
pub const BIAS_EXPOSURE_CEILING_S: f64 = 0.05;

/// Minimum pixel count (h*w) to use Rayon parallelism in the stats kernels.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Fewest validated frames the stacking engine will accept.
pub const MIN_STACKABLE_FRAMES: usize = 2;
