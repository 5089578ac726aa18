//! Plain-text PPM (`P3`) encoding.
//!
//! Channel values are gamma encoded with gamma 2.2 and quantized to 8 bits.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Display gamma applied when quantizing.
pub const GAMMA: f32 = 2.2;

#[derive(Debug, Error)]
pub enum PpmError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a P3 file (magic {0:?})")]
    BadMagic(String),

    #[error("malformed header field {field}: {value:?}")]
    BadHeader { field: &'static str, value: String },

    #[error("unsupported max value {0}, expected 255")]
    UnsupportedMaxValue(u32),

    #[error("bad pixel value {0:?}")]
    BadValue(String),

    #[error("expected {expected} channel values, found {found}")]
    Truncated { expected: usize, found: usize },
}

/// Decoded 8-bit RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB triples.
    pub data: Vec<u8>,
}

/// Gamma encode and quantize one channel: `clamp(x)^(1/2.2) * 255`, rounded.
#[inline]
pub fn to_byte(x: f32) -> u8 {
    if !(x > 0.0) {
        return 0;
    }
    (x.min(1.0).powf(1.0 / GAMMA) * 255.0).round() as u8
}

/// Write `rgb` (row-major 8-bit triples) as a `P3` file.
pub fn write_ppm<W: Write>(mut writer: W, width: u32, height: u32, rgb: &[u8]) -> io::Result<()> {
    write!(writer, "P3\n{} {}\n255\n", width, height)?;
    for row in rgb.chunks(width.max(1) as usize * 3) {
        for px in row.chunks_exact(3) {
            write!(writer, "{} {} {} ", px[0], px[1], px[2])?;
        }
        writeln!(writer)?;
    }
    writer.flush()
}

/// Parse a `P3` file with max value 255. `#` comments are skipped.
pub fn read_ppm<R: Read>(mut reader: R) -> Result<PpmImage, PpmError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut tokens = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(str::split_whitespace);

    let magic = tokens.next().unwrap_or_default();
    if magic != "P3" {
        return Err(PpmError::BadMagic(magic.to_string()));
    }

    let mut header = |field: &'static str| -> Result<u32, PpmError> {
        let value = tokens.next().unwrap_or_default();
        value.parse().map_err(|_| PpmError::BadHeader {
            field,
            value: value.to_string(),
        })
    };
    let width = header("width")?;
    let height = header("height")?;
    let max_value = header("max value")?;
    if max_value != 255 {
        return Err(PpmError::UnsupportedMaxValue(max_value));
    }

    let expected = width as usize * height as usize * 3;
    let data = tokens
        .take(expected)
        .map(|t| t.parse::<u8>().map_err(|_| PpmError::BadValue(t.to_string())))
        .collect::<Result<Vec<u8>, _>>()?;
    if data.len() != expected {
        return Err(PpmError::Truncated {
            expected,
            found: data.len(),
        });
    }

    Ok(PpmImage { width, height, data })
}
