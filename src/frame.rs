//! Owned frame buffers: pixel format tag, optional color map, optional
//! tile-map indirection.
//!
//! The teacher's `Frame` was a fixed three-plane YUV view sized for one
//! AV1 encode; this generalizes it to the single interleaved buffer the
//! pipeline stages pass between each other, carrying whichever pixel
//! format the current stage left it in.

use crate::color::Rgb;
use crate::error::{PipelineError, Result};

/// Width/height granularity every frame must respect; DXTV additionally
/// requires multiples of 16 (checked in `dxtv.rs`).
pub const DIMENSION_ALIGNMENT: u32 = 8;

/// Pixel storage format. Paletted variants store index bytes/nibbles;
/// the truecolor variants store packed colors directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Paletted1,
  Paletted2,
  Paletted4,
  Paletted8,
  Rgb555,
  Rgb565,
  Rgb888,
}

impl PixelFormat {
  pub fn bits_per_pixel(self) -> u32 {
    match self {
      PixelFormat::Paletted1 => 1,
      PixelFormat::Paletted2 => 2,
      PixelFormat::Paletted4 => 4,
      PixelFormat::Paletted8 => 8,
      PixelFormat::Rgb555 | PixelFormat::Rgb565 => 16,
      PixelFormat::Rgb888 => 24,
    }
  }

  pub fn is_paletted(self) -> bool {
    matches!(self, PixelFormat::Paletted1 | PixelFormat::Paletted2 | PixelFormat::Paletted4 | PixelFormat::Paletted8)
  }
}

/// Color storage format for a frame's color map, independent of the
/// frame's own pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
  Rgb555,
  Rgb565,
  Rgb888,
}

impl ColorFormat {
  pub fn bits_per_color(self) -> u32 {
    match self {
      ColorFormat::Rgb555 | ColorFormat::Rgb565 => 16,
      ColorFormat::Rgb888 => 24,
    }
  }
}

/// An ordered sequence of colors indexed by a paletted frame's pixel
/// data. Limited to 256 entries (invariant I5).
#[derive(Debug, Clone)]
pub struct ColorMap {
  pub format: ColorFormat,
  pub colors: Vec<Rgb>,
}

impl ColorMap {
  pub const MAX_ENTRIES: usize = 256;

  pub fn new(format: ColorFormat, colors: Vec<Rgb>) -> Result<Self> {
    if colors.len() > Self::MAX_ENTRIES {
      return Err(crate::error::QuantizeError::TooManyColors(colors.len()).into());
    }
    Ok(Self { format, colors })
  }
}

/// 8x8-tile indirection: a grid of indices into a separate tile-image
/// buffer, used by `ConvertTiles`/`BuildTileMap` stages.
#[derive(Debug, Clone)]
pub struct TileMap {
  pub tiles_wide: u32,
  pub tiles_high: u32,
  pub indices: Vec<u16>,
}

/// One owned pixel grid passed between pipeline stages. Always a
/// multiple of 8 in both dimensions (DXTV further requires 16; checked
/// where that matters, not here, since not every stage needs it).
#[derive(Debug, Clone)]
pub struct Frame {
  pub width: u32,
  pub height: u32,
  pub format: PixelFormat,
  pub data: Vec<u8>,
  pub color_map: Option<ColorMap>,
  pub tile_map: Option<TileMap>,
}

impl Frame {
  pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
    check_alignment(width, height)?;
    Ok(Self { width, height, format, data, color_map: None, tile_map: None })
  }

  pub fn with_color_map(mut self, color_map: ColorMap) -> Self {
    self.color_map = Some(color_map);
    self
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  pub fn is_paletted(&self) -> bool {
    self.format.is_paletted()
  }

  /// A frame with the same dimensions but (possibly) a different format
  /// and data, used by `Stage::Convert` outputs to check invariant I3.
  pub fn reshaped(&self, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
    Frame::new(self.width, self.height, format, data)
  }
}

fn check_alignment(width: u32, height: u32) -> Result<()> {
  if width % DIMENSION_ALIGNMENT != 0 || height % DIMENSION_ALIGNMENT != 0 {
    return Err(PipelineError::DimensionsChanged {
      stage: "Frame::new",
      before: (width, height),
      after: (width - width % DIMENSION_ALIGNMENT, height - height % DIMENSION_ALIGNMENT),
    }
    .into());
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_unaligned_dimensions() {
    assert!(Frame::new(15, 16, PixelFormat::Rgb555, vec![0; 15 * 16 * 2]).is_err());
  }

  #[test]
  fn accepts_aligned_dimensions() {
    let frame = Frame::new(16, 16, PixelFormat::Rgb555, vec![0; 16 * 16 * 2]).unwrap();
    assert_eq!(frame.dimensions(), (16, 16));
  }

  #[test]
  fn color_map_rejects_too_many_entries() {
    let colors = vec![Rgb::new(0.0, 0.0, 0.0); 257];
    assert!(ColorMap::new(ColorFormat::Rgb555, colors).is_err());
  }

  #[test]
  fn paletted_formats_report_bits_per_pixel() {
    assert_eq!(PixelFormat::Paletted4.bits_per_pixel(), 4);
    assert_eq!(PixelFormat::Rgb888.bits_per_pixel(), 24);
    assert!(PixelFormat::Paletted8.is_paletted());
    assert!(!PixelFormat::Rgb565.is_paletted());
  }
}
