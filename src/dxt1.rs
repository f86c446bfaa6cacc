//! Single block range-fit color codec, DXT1-style.
//!
//! Each block stores two 16-bit RGB555 endpoints plus a 2-bit index per
//! pixel selecting one of four colors: the two endpoints and two more
//! computed by interpolating 1/3 and 2/3 of the way between them. This
//! applies at any of DXTV's three block widths (16, 8 or 4), height is
//! always 4.
//!
//! The endpoints come from a line fit through the block's colors in
//! YCgCoR space (the "range fit" method, see
//! http://www.sjbrown.co.uk/2006/01/19/dxt-compression-techniques/);
//! the original fits the line with an SVD, this crate finds the same
//! axis with power iteration on the 3x3 centered covariance matrix,
//! which is cheap enough to not need a linear algebra dependency for a
//! single eigenvector of a 3x3 matrix.

use crate::color::YCgCoR;

/// One encoded range-fit block: two RGB555 endpoints and one 2-bit
/// index per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dxt1Block {
  pub color0: u16,
  pub color1: u16,
  pub indices: Vec<u8>,
}

impl Dxt1Block {
  /// Encoded size in bytes for a block of `width x 4` pixels.
  pub fn encoded_len(width: usize) -> usize {
    4 + (width * 4 * 2) / 8
  }

  /// Pack into the wire layout: `color0:u16, color1:u16`, then the
  /// indices packed 8-per-`u16`, each index taking 2 bits, least
  /// significant pixel in the lowest bits.
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(Self::encoded_len(self.indices.len() / 4));
    out.extend_from_slice(&self.color0.to_le_bytes());
    out.extend_from_slice(&self.color1.to_le_bytes());
    for chunk in self.indices.chunks(8) {
      let mut word: u16 = 0;
      for (i, &idx) in chunk.iter().enumerate() {
        word |= (idx as u16 & 0x3) << (2 * i);
      }
      out.extend_from_slice(&word.to_le_bytes());
    }
    out
  }

  /// Unpack a block of `width x 4` pixels from its wire layout.
  pub fn from_bytes(bytes: &[u8], width: usize) -> Self {
    debug_assert_eq!(bytes.len(), Self::encoded_len(width));
    let color0 = u16::from_le_bytes([bytes[0], bytes[1]]);
    let color1 = u16::from_le_bytes([bytes[2], bytes[3]]);
    let count = width * 4;
    let mut indices = Vec::with_capacity(count);
    for word_bytes in bytes[4..].chunks(2) {
      let word = u16::from_le_bytes([word_bytes[0], word_bytes[1]]);
      for i in 0..8 {
        if indices.len() == count {
          break;
        }
        indices.push(((word >> (2 * i)) & 0x3) as u8);
      }
    }
    Self { color0, color1, indices }
  }

  /// Range-fit encode `colors` (row-major, `width x 4`).
  pub fn encode(colors: &[YCgCoR]) -> Self {
    let axis = principal_axis(colors);
    let projections: Vec<f64> = colors.iter().map(|c| dot(*c, axis)).collect();

    let mut index_c0 = 0;
    let mut index_c1 = 0;
    for (i, &p) in projections.iter().enumerate() {
      if p < projections[index_c0] {
        index_c0 = i;
      }
      if p > projections[index_c1] {
        index_c1 = i;
      }
    }

    let c0 = colors[index_c0];
    let c1 = colors[index_c1];
    let c2 = lerp_third(c0, c1, 2, 1);
    let c3 = lerp_third(c0, c1, 1, 2);
    let palette = [c0, c1, c2, c3];

    let indices = colors
      .iter()
      .map(|&color| {
        let mut best_index = 0u8;
        let mut best_distance = f64::MAX;
        for (ei, &endpoint) in palette.iter().enumerate() {
          let d = YCgCoR::distance(color, endpoint);
          if d < best_distance {
            best_distance = d;
            best_index = ei as u8;
          }
        }
        best_index
      })
      .collect();

    Self { color0: c0.to_rgb555(), color1: c1.to_rgb555(), indices }
  }

  /// Decode back to `width x 4` colors, row-major.
  pub fn decode(&self) -> Vec<YCgCoR> {
    let c0 = YCgCoR::from_rgb555(self.color0);
    let c1 = YCgCoR::from_rgb555(self.color1);
    let palette = [c0, c1, lerp_third(c0, c1, 2, 1), lerp_third(c0, c1, 1, 2)];
    self.indices.iter().map(|&i| palette[(i & 0x3) as usize]).collect()
  }
}

/// Round `(w0*a + w1*b) / (w0+w1)` to the RGB555 grid, matching the
/// decoder's reconstruction of the two interpolated palette colors.
fn lerp_third(a: YCgCoR, b: YCgCoR, w0: i32, w1: i32) -> YCgCoR {
  let total = (w0 + w1) as f64;
  let mixed = YCgCoR::new(
    (w0 as f64 * a.y + w1 as f64 * b.y) / total,
    (w0 as f64 * a.cg + w1 as f64 * b.cg) / total,
    (w0 as f64 * a.co + w1 as f64 * b.co) / total,
  );
  mixed.round_to_rgb555()
}

fn dot(c: YCgCoR, axis: YCgCoR) -> f64 {
  c.y * axis.y + c.cg * axis.cg + c.co * axis.co
}

/// First principal component of `colors` via power iteration on the
/// centered 3x3 covariance matrix. Returns a zero axis for a
/// single-color block, which collapses every projection to the same
/// value and is harmless (all pixels then pick the same index anyway).
fn principal_axis(colors: &[YCgCoR]) -> YCgCoR {
  let n = colors.len() as f64;
  let mean_y = colors.iter().map(|c| c.y).sum::<f64>() / n;
  let mean_cg = colors.iter().map(|c| c.cg).sum::<f64>() / n;
  let mean_co = colors.iter().map(|c| c.co).sum::<f64>() / n;

  let mut cov = [[0f64; 3]; 3];
  for c in colors {
    let d = [c.y - mean_y, c.cg - mean_cg, c.co - mean_co];
    for i in 0..3 {
      for j in 0..3 {
        cov[i][j] += d[i] * d[j];
      }
    }
  }

  let mut v = [1.0, 1.0, 1.0];
  for _ in 0..32 {
    let next = [
      cov[0][0] * v[0] + cov[0][1] * v[1] + cov[0][2] * v[2],
      cov[1][0] * v[0] + cov[1][1] * v[1] + cov[1][2] * v[2],
      cov[2][0] * v[0] + cov[2][1] * v[1] + cov[2][2] * v[2],
    ];
    let norm = (next[0] * next[0] + next[1] * next[1] + next[2] * next[2]).sqrt();
    if norm < 1e-12 {
      return YCgCoR::new(0.0, 0.0, 0.0);
    }
    v = [next[0] / norm, next[1] / norm, next[2] / norm];
  }
  YCgCoR::new(v[0], v[1], v[2])
}

#[cfg(test)]
mod tests {
  use super::*;

  fn solid_block(color: u16, width: usize) -> Vec<YCgCoR> {
    vec![YCgCoR::from_rgb555(color); width * 4]
  }

  #[test]
  fn solid_block_encodes_to_itself() {
    let colors = solid_block(0x7FFF, 4);
    let block = Dxt1Block::encode(&colors);
    assert_eq!(block.color0, 0x7FFF);
    assert_eq!(block.color1, 0x7FFF);
    assert!(block.indices.iter().all(|&i| i == 0 || i == 1));

    let decoded = block.decode();
    for c in decoded {
      assert_eq!(c.to_rgb555(), 0x7FFF);
    }
  }

  #[test]
  fn byte_roundtrip_preserves_block() {
    let colors: Vec<YCgCoR> = (0..16u16).map(|i| YCgCoR::from_rgb555(i * 2000)).collect();
    let block = Dxt1Block::encode(&colors);
    let bytes = block.to_bytes();
    assert_eq!(bytes.len(), Dxt1Block::encoded_len(4));
    let roundtrip = Dxt1Block::from_bytes(&bytes, 4);
    assert_eq!(roundtrip, block);
  }

  #[test]
  fn wide_block_sizes_match_original_layout() {
    assert_eq!(Dxt1Block::encoded_len(16), 20);
    assert_eq!(Dxt1Block::encoded_len(8), 12);
    assert_eq!(Dxt1Block::encoded_len(4), 8);
  }

  #[test]
  fn two_color_block_uses_both_endpoints() {
    let mut colors = solid_block(0x0000, 4);
    for c in colors.iter_mut().take(8) {
      *c = YCgCoR::from_rgb555(0x7FFF);
    }
    let block = Dxt1Block::encode(&colors);
    let decoded = block.decode();
    assert_eq!(decoded[0].to_rgb555(), 0x7FFF);
    assert_eq!(decoded[15].to_rgb555(), 0x0000);
  }
}
