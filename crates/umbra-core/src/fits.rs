use std::fs::File;
use std::io::Write;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;
use ndarray::Array2;

use crate::error::{Result, UmbraError};

pub const FITS_BLOCK_SIZE: usize = 2880;
pub const FITS_CARD_SIZE: usize = 80;
const FITS_MAGIC: &[u8; 6] = b"SIMPLE";

/// Keywords the writer synthesises itself; user cards with these names are
/// ignored when rendering.
const STRUCTURAL_KEYS: [&str; 4] = ["SIMPLE", "BITPIX", "NAXIS", "END"];

#[derive(Clone, Debug)]
struct Card {
    name: String,
    value: String,
    comment: Option<String>,
}

/// Parsed primary-HDU header of a FITS file.
///
/// Values are kept in their textual form; typed access goes through the
/// `get_*` methods (strings keep FITS quoting on disk, stripped on read).
#[derive(Clone, Debug)]
pub struct FitsHeader {
    cards: Vec<Card>,
    bitpix: i32,
    dims: Vec<usize>,
    data_start: usize,
    data_len: usize,
}

impl FitsHeader {
    /// Fresh header for a 2-D image. `bitpix` is fixed when data is attached.
    pub fn new_2d(width: usize, height: usize) -> Self {
        Self {
            cards: Vec::new(),
            bitpix: 16,
            dims: vec![width, height],
            data_start: 0,
            data_len: width * height,
        }
    }

    pub fn bitpix(&self) -> i32 {
        self.bitpix
    }

    /// Image dimensions in FITS axis order: `[width, height, ...]`.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    fn find(&self, key: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.name.eq_ignore_ascii_case(key))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        let mut value = self.find(key)?.value.as_str();
        if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
            value = &value[1..value.len() - 1];
        }
        Some(value.trim())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.find(key)?.value.parse().ok()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.find(key)?.value.parse().ok()
    }

    fn set_raw(&mut self, key: &str, value: String, comment: Option<&str>) {
        if let Some(card) = self
            .cards
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(key))
        {
            card.value = value;
            if comment.is_some() {
                card.comment = comment.map(str::to_string);
            }
        } else {
            self.cards.push(Card {
                name: key.to_uppercase(),
                value,
                comment: comment.map(str::to_string),
            });
        }
    }

    pub fn set_str(&mut self, key: &str, value: &str, comment: Option<&str>) {
        self.set_raw(key, format!("'{}'", value), comment);
    }

    pub fn set_logical(&mut self, key: &str, value: bool, comment: Option<&str>) {
        self.set_raw(key, if value { "T" } else { "F" }.to_string(), comment);
    }

    pub fn set_i64(&mut self, key: &str, value: i64, comment: Option<&str>) {
        self.set_raw(key, value.to_string(), comment);
    }

    pub fn set_f64(&mut self, key: &str, value: f64, comment: Option<&str>) {
        self.set_raw(key, format!("{:.3}", value), comment);
    }

    /// Render the header as complete 2880-byte blocks, mandatory cards first.
    fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FITS_BLOCK_SIZE);
        push_card(&mut out, "SIMPLE", "T", Some("file conforms to FITS standard"));
        push_card(&mut out, "BITPIX", &self.bitpix.to_string(), Some("bits per pixel"));
        push_card(&mut out, "NAXIS", &self.dims.len().to_string(), Some("number of axes"));
        for (idx, dim) in self.dims.iter().enumerate() {
            push_card(&mut out, &format!("NAXIS{}", idx + 1), &dim.to_string(), None);
        }
        for card in &self.cards {
            let structural = STRUCTURAL_KEYS
                .iter()
                .any(|k| card.name.eq_ignore_ascii_case(k))
                || card.name.to_ascii_uppercase().starts_with("NAXIS");
            if structural {
                continue;
            }
            push_card(&mut out, &card.name, &card.value, card.comment.as_deref());
        }
        out.extend_from_slice(format!("{:<80}", "END").as_bytes());
        while out.len() % FITS_BLOCK_SIZE != 0 {
            out.push(b' ');
        }
        out
    }
}

fn push_card(out: &mut Vec<u8>, name: &str, value: &str, comment: Option<&str>) {
    let mut line = format!("{:<8}= ", name);
    if value.starts_with('\'') {
        line.push_str(&format!("{:<20}", value));
    } else {
        line.push_str(&format!("{:>20}", value));
    }
    if let Some(comment) = comment {
        line.push_str(" / ");
        line.push_str(comment);
    }
    while line.len() < FITS_CARD_SIZE {
        line.push(' ');
    }
    line.truncate(FITS_CARD_SIZE);
    out.extend_from_slice(line.as_bytes());
}

/// Memory-mapped FITS file reader (primary HDU only).
pub struct FitsReader {
    mmap: Mmap,
    pub header: FitsHeader,
}

impl FitsReader {
    /// Open a FITS file and parse its primary header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < FITS_BLOCK_SIZE {
            return Err(UmbraError::InvalidFits(format!(
                "{}: file too small for a FITS header",
                path.display()
            )));
        }
        if &mmap[0..6] != FITS_MAGIC {
            return Err(UmbraError::InvalidFits(format!(
                "{}: missing SIMPLE magic",
                path.display()
            )));
        }

        let header = parse_header(&mmap)?;

        let expected = header.data_start + header.data_len * bytes_per_value(header.bitpix);
        if mmap.len() < expected {
            return Err(UmbraError::InvalidFits(format!(
                "{}: truncated, expected at least {} bytes, got {}",
                path.display(),
                expected,
                mmap.len()
            )));
        }

        Ok(Self { mmap, header })
    }

    /// Raw data block bytes (zero-copy from mmap), excluding block padding.
    pub fn data_bytes(&self) -> &[u8] {
        let start = self.header.data_start;
        let end = start + self.header.data_len * bytes_per_value(self.header.bitpix);
        &self.mmap[start..end]
    }

    /// Decode the pixel rectangle to f32 in sensor units (ADU).
    ///
    /// BZERO/BSCALE are applied, so unsigned-16 data stored in the usual
    /// signed-with-offset convention decodes to its original range.
    pub fn read_pixels(&self) -> Result<Array2<f32>> {
        if self.header.dims.len() != 2 {
            return Err(UmbraError::InvalidFits(format!(
                "expected a 2-D image, got {} axes",
                self.header.dims.len()
            )));
        }
        let w = self.header.dims[0];
        let h = self.header.dims[1];
        let n = w * h;
        let raw = self.data_bytes();

        let bzero = self.header.get_f64("BZERO").unwrap_or(0.0) as f32;
        let bscale = self.header.get_f64("BSCALE").unwrap_or(1.0) as f32;

        let mut values = vec![0.0f32; n];
        match self.header.bitpix {
            8 => {
                for (dst, src) in values.iter_mut().zip(raw.iter()) {
                    *dst = *src as f32 * bscale + bzero;
                }
            }
            16 => {
                let mut decoded = vec![0i16; n];
                BigEndian::read_i16_into(raw, &mut decoded);
                for (dst, src) in values.iter_mut().zip(decoded.iter()) {
                    *dst = *src as f32 * bscale + bzero;
                }
            }
            32 => {
                let mut decoded = vec![0i32; n];
                BigEndian::read_i32_into(raw, &mut decoded);
                for (dst, src) in values.iter_mut().zip(decoded.iter()) {
                    *dst = *src as f32 * bscale + bzero;
                }
            }
            -32 => {
                BigEndian::read_f32_into(raw, &mut values);
                if bscale != 1.0 || bzero != 0.0 {
                    for v in values.iter_mut() {
                        *v = *v * bscale + bzero;
                    }
                }
            }
            other => {
                return Err(UmbraError::InvalidFits(format!(
                    "BITPIX = {} is not supported",
                    other
                )));
            }
        }

        Array2::from_shape_vec((h, w), values)
            .map_err(|e| UmbraError::InvalidFits(e.to_string()))
    }
}

fn bytes_per_value(bitpix: i32) -> usize {
    (bitpix.unsigned_abs() / 8) as usize
}

fn parse_header(buf: &[u8]) -> Result<FitsHeader> {
    let mut cards = Vec::new();
    let mut offset = 0;
    let mut seen_end = false;

    while !seen_end {
        if offset + FITS_BLOCK_SIZE > buf.len() {
            return Err(UmbraError::InvalidFits("header has no END card".into()));
        }
        let block = &buf[offset..offset + FITS_BLOCK_SIZE];
        for line in block.chunks(FITS_CARD_SIZE) {
            let line = std::str::from_utf8(line)
                .map_err(|e| UmbraError::InvalidFits(e.to_string()))?
                .trim_end();
            if line.trim().eq_ignore_ascii_case("end") {
                seen_end = true;
                break;
            }
            let Some((name, rest)) = line.split_once('=') else {
                continue;
            };
            let rest = rest.trim();
            // a quoted value may itself contain the comment separator
            let (value, comment) = if let Some(stripped) = rest.strip_prefix('\'') {
                match stripped.find('\'') {
                    Some(end) => {
                        let after = rest[end + 2..].trim_start();
                        let comment = after.strip_prefix('/').map(|c| c.trim().to_string());
                        (rest[..end + 2].trim(), comment)
                    }
                    None => (rest, None),
                }
            } else {
                match rest.split_once('/') {
                    Some((v, c)) => (v.trim(), Some(c.trim().to_string())),
                    None => (rest, None),
                }
            };
            cards.push(Card {
                name: name.trim().to_string(),
                value: value.to_string(),
                comment,
            });
        }
        offset += FITS_BLOCK_SIZE;
    }

    let find_i64 = |key: &str| -> Option<i64> {
        cards
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(key))
            .and_then(|c| c.value.parse().ok())
    };

    let bitpix = find_i64("BITPIX")
        .ok_or_else(|| UmbraError::InvalidFits("missing BITPIX".into()))? as i32;
    let naxis = find_i64("NAXIS").unwrap_or(0) as usize;

    let mut dims = Vec::with_capacity(naxis);
    let mut data_len = 1usize;
    for idx in 1..=naxis {
        let dim = find_i64(&format!("NAXIS{}", idx)).unwrap_or(1) as usize;
        data_len *= dim;
        dims.push(dim);
    }
    if naxis == 0 {
        data_len = 0;
    }

    Ok(FitsHeader {
        cards,
        bitpix,
        dims,
        data_start: offset,
        data_len,
    })
}

/// Write a header plus a pre-encoded data block, padding to 2880 bytes.
///
/// `data` must match the header's BITPIX and dimensions; this is the path the
/// master writer uses to re-emit an engine output with an augmented header.
pub fn write_fits(path: &Path, header: &FitsHeader, data: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(&header.render())?;
    file.write_all(data)?;
    let tail = data.len() % FITS_BLOCK_SIZE;
    if tail != 0 {
        file.write_all(&vec![0u8; FITS_BLOCK_SIZE - tail])?;
    }
    file.sync_all()?;
    Ok(())
}

/// Encode a u16 image in the usual signed-with-offset convention and write it.
pub fn write_image_u16(path: &Path, header: &mut FitsHeader, pixels: &[u16]) -> Result<()> {
    const U16_BZERO: u16 = 32768;
    header.bitpix = 16;
    header.set_i64("BZERO", U16_BZERO as i64, Some("offset for unsigned data"));

    let mut data = vec![0u8; pixels.len() * 2];
    for (chunk, value) in data.chunks_exact_mut(2).zip(pixels.iter()) {
        chunk.copy_from_slice(&value.wrapping_sub(U16_BZERO).to_be_bytes());
    }
    write_fits(path, header, &data)
}
