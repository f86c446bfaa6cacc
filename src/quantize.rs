//! Truecolor-to-paletted quantization driver.
//!
//! spec.md treats the quantizer itself as an external black-box
//! collaborator, the same role the `image` crate's own GIF encoder
//! hands to `color_quant`'s NeuQuant implementation — so that's the
//! crate used here rather than hand-rolling a median-cut quantizer,
//! which would mean implementing the very thing the boundary excludes.
//! This module only orchestrates it: building one frame's palette,
//! building one shared palette across a batch, and the paletted-only
//! color-map operations (add/move color 0, reorder).

use color_quant::NeuQuant;

use crate::color::Rgb;
use crate::error::{QuantizeError, Result};
use crate::frame::{ColorFormat, ColorMap, Frame, PixelFormat};

const NEUQUANT_SAMPLE_FACTOR: i32 = 10;

fn to_rgba_bytes(pixels: &[Rgb]) -> Vec<u8> {
  let mut out = Vec::with_capacity(pixels.len() * 4);
  for p in pixels {
    out.push((p.r * 255.0).round() as u8);
    out.push((p.g * 255.0).round() as u8);
    out.push((p.b * 255.0).round() as u8);
    out.push(255);
  }
  out
}

fn palette_colors(neuquant: &NeuQuant) -> Vec<Rgb> {
  neuquant.color_map_rgba().chunks(4).map(|c| Rgb::new(c[0] as f64 / 255.0, c[1] as f64 / 255.0, c[2] as f64 / 255.0)).collect()
}

/// Maps every pixel to its nearest palette entry, choosing the
/// smallest paletted pixel format that fits `color_map.len()`.
fn indices_for(neuquant: &NeuQuant, pixels: &[Rgb]) -> (PixelFormat, Vec<u8>) {
  let rgba = to_rgba_bytes(pixels);
  let indices: Vec<u8> = rgba.chunks(4).map(|px| neuquant.index_of(px) as u8).collect();
  let format = if neuquant.color_map_rgba().len() / 4 <= 2 {
    PixelFormat::Paletted1
  } else if neuquant.color_map_rgba().len() / 4 <= 4 {
    PixelFormat::Paletted2
  } else if neuquant.color_map_rgba().len() / 4 <= 16 {
    PixelFormat::Paletted4
  } else {
    PixelFormat::Paletted8
  };
  (format, indices)
}

/// `ConvertPaletted`: quantize one truecolor image down to at most
/// `max_colors` entries (capped to the 256-entry limit of invariant I5).
pub fn quantize_frame(pixels: &[Rgb], width: u32, height: u32, max_colors: usize) -> Result<(Frame, ColorMap)> {
  let max_colors = max_colors.min(ColorMap::MAX_ENTRIES);
  let rgba = to_rgba_bytes(pixels);
  let neuquant = NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, max_colors, &rgba);
  let colors = palette_colors(&neuquant);
  let color_map = ColorMap::new(ColorFormat::Rgb888, colors)?;
  let (format, indices) = indices_for(&neuquant, pixels);
  let frame = Frame::new(width, height, format, pack_indices(format, &indices))?.with_color_map(color_map.clone());
  Ok((frame, color_map))
}

/// `ConvertCommonPalette`: the `BatchConvert` stage that builds one
/// palette from every frame's pixels combined, then remaps each frame
/// against it, so all frames in the batch share one color map.
pub fn quantize_common_palette(frames: &[Vec<Rgb>], width: u32, height: u32, max_colors: usize) -> Result<(Vec<Frame>, ColorMap)> {
  let max_colors = max_colors.min(ColorMap::MAX_ENTRIES);
  let combined: Vec<Rgb> = frames.iter().flatten().copied().collect();
  let rgba = to_rgba_bytes(&combined);
  let neuquant = NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, max_colors, &rgba);
  let colors = palette_colors(&neuquant);
  let color_map = ColorMap::new(ColorFormat::Rgb888, colors)?;

  let mut out = Vec::with_capacity(frames.len());
  for pixels in frames {
    let (format, indices) = indices_for(&neuquant, pixels);
    let frame = Frame::new(width, height, format, pack_indices(format, &indices))?.with_color_map(color_map.clone());
    out.push(frame);
  }
  Ok((out, color_map))
}

/// Pack one-index-per-byte into the bit density `format` declares.
fn pack_indices(format: PixelFormat, indices: &[u8]) -> Vec<u8> {
  let bits = format.bits_per_pixel();
  if bits == 8 {
    return indices.to_vec();
  }
  let mask = ((1u32 << bits) - 1) as u8;
  let per_byte = (8 / bits) as usize;
  let mut out = Vec::with_capacity((indices.len() + per_byte - 1) / per_byte);
  for chunk in indices.chunks(per_byte) {
    let mut byte = 0u8;
    for (i, &idx) in chunk.iter().enumerate() {
      byte |= (idx & mask) << (i as u32 * bits);
    }
    out.push(byte);
  }
  out
}

/// Inverse of [`pack_indices`]: unpack `format`-packed index data back to
/// one index per byte, stopping after `count` indices.
fn unpack_indices(format: PixelFormat, data: &[u8], count: usize) -> Vec<u8> {
  let bits = format.bits_per_pixel();
  if bits == 8 {
    return data[..count].to_vec();
  }
  let mask = ((1u32 << bits) - 1) as u8;
  let per_byte = (8 / bits) as usize;
  let mut out = Vec::with_capacity(count);
  for &byte in data {
    for i in 0..per_byte {
      if out.len() == count {
        return out;
      }
      out.push((byte >> (i as u32 * bits)) & mask);
    }
  }
  out
}

fn require_paletted(frame: &Frame, op: &'static str) -> Result<()> {
  if !frame.is_paletted() {
    return Err(QuantizeError::RequiresPaletted { op }.into());
  }
  Ok(())
}

/// `PruneIndices`: force-repack a paletted frame's index data down to 4
/// bits per index, truncating any index at or above 16 to its low
/// nibble. A no-op in byte count for frames already at 4 bits or
/// narrower; lossy if the color map has more than 16 entries, same as
/// the original CLI switch it mirrors.
pub fn prune_indices(frame: &Frame) -> Result<Frame> {
  require_paletted(frame, "PruneIndices")?;
  if frame.format.bits_per_pixel() <= 4 {
    return Ok(frame.clone());
  }
  let count = (frame.width * frame.height) as usize;
  let unpacked = unpack_indices(frame.format, &frame.data, count);
  let pruned: Vec<u8> = unpacked.iter().map(|&i| i & 0x0F).collect();
  let data = pack_indices(PixelFormat::Paletted4, &pruned);
  let mut out = frame.reshaped(PixelFormat::Paletted4, data)?;
  out.color_map = frame.color_map.clone();
  Ok(out)
}

/// `AddColor0`: insert `color` at index 0 of the color map, shifting
/// every other entry (and every pixel index) up by one.
pub fn add_color0(frame: &Frame, color_map: &ColorMap, color: Rgb) -> Result<(ColorMap, Vec<u8>)> {
  require_paletted(frame, "AddColor0")?;
  let mut colors = Vec::with_capacity(color_map.colors.len() + 1);
  colors.push(color);
  colors.extend_from_slice(&color_map.colors);
  let new_map = ColorMap::new(color_map.format, colors)?;
  let shifted = shift_indices(frame, 1)?;
  Ok((new_map, shifted))
}

/// `MoveColor0`: move the entry currently at `index` to position 0,
/// remapping every pixel index that pointed at either slot.
pub fn move_color0(frame: &Frame, color_map: &ColorMap, index: usize) -> Result<(ColorMap, Vec<u8>)> {
  require_paletted(frame, "MoveColor0")?;
  let mut colors = color_map.colors.clone();
  let moved = colors.remove(index);
  colors.insert(0, moved);

  let remap = |old: u8| -> u8 {
    let old = old as usize;
    if old == index {
      0
    } else if old < index {
      (old + 1) as u8
    } else {
      old as u8
    }
  };
  let data = remap_indices(frame, remap)?;
  Ok((ColorMap::new(color_map.format, colors)?, data))
}

/// `ReorderColors`: apply an arbitrary new-index-by-old-index
/// permutation to both the color map and the pixel data, used to place
/// perceptually close colors adjacently for better DXT/delta coding.
pub fn reorder_colors(frame: &Frame, color_map: &ColorMap, new_order: &[usize]) -> Result<(ColorMap, Vec<u8>)> {
  require_paletted(frame, "ReorderColors")?;
  let colors = new_order.iter().map(|&i| color_map.colors[i]).collect();
  let mut old_to_new = vec![0u8; new_order.len()];
  for (new_index, &old_index) in new_order.iter().enumerate() {
    old_to_new[old_index] = new_index as u8;
  }
  let data = remap_indices(frame, |old| old_to_new[old as usize])?;
  Ok((ColorMap::new(color_map.format, colors)?, data))
}

fn shift_indices(frame: &Frame, by: u8) -> Result<Vec<u8>> {
  remap_indices(frame, |old| old + by)
}

fn remap_indices(frame: &Frame, f: impl Fn(u8) -> u8) -> Result<Vec<u8>> {
  let bits = frame.format.bits_per_pixel();
  if bits == 8 {
    return Ok(frame.data.iter().map(|&b| f(b)).collect());
  }
  let mask = ((1u32 << bits) - 1) as u8;
  let per_byte = 8 / bits;
  let mut out = Vec::with_capacity(frame.data.len());
  for &byte in &frame.data {
    let mut new_byte = 0u8;
    for i in 0..per_byte {
      let idx = (byte >> (i * bits)) & mask;
      new_byte |= (f(idx) & mask) << (i * bits);
    }
    out.push(new_byte);
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn checkerboard(width: u32, height: u32) -> Vec<Rgb> {
    (0..width * height)
      .map(|i| if (i % 2) == 0 { Rgb::new(0.0, 0.0, 0.0) } else { Rgb::new(1.0, 1.0, 1.0) })
      .collect()
  }

  #[test]
  fn quantize_frame_produces_paletted_output() {
    let pixels = checkerboard(8, 8);
    let (frame, color_map) = quantize_frame(&pixels, 8, 8, 4).unwrap();
    assert!(frame.is_paletted());
    assert!(color_map.colors.len() <= 4);
  }

  #[test]
  fn common_palette_is_shared_across_frames() {
    let frames = vec![checkerboard(8, 8), checkerboard(8, 8)];
    let (out, color_map) = quantize_common_palette(&frames, 8, 8, 4).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].color_map.as_ref().unwrap().colors.len(), color_map.colors.len());
  }

  #[test]
  fn paletted_ops_reject_truecolor_frames() {
    let frame = Frame::new(8, 8, PixelFormat::Rgb555, vec![0; 8 * 8 * 2]).unwrap();
    let color_map = ColorMap::new(ColorFormat::Rgb555, vec![Rgb::new(0.0, 0.0, 0.0)]).unwrap();
    assert!(add_color0(&frame, &color_map, Rgb::new(1.0, 0.0, 0.0)).is_err());
  }

  #[test]
  fn add_color0_shifts_every_index_up() {
    let frame = Frame::new(8, 8, PixelFormat::Paletted8, vec![0u8; 64]).unwrap();
    let color_map = ColorMap::new(ColorFormat::Rgb555, vec![Rgb::new(0.0, 0.0, 0.0)]).unwrap();
    let (new_map, data) = add_color0(&frame, &color_map, Rgb::new(1.0, 0.0, 0.0)).unwrap();
    assert_eq!(new_map.colors.len(), 2);
    assert!(data.iter().all(|&b| b == 1));
  }

  #[test]
  fn move_color0_swaps_target_and_zero() {
    let frame = Frame::new(8, 8, PixelFormat::Paletted8, vec![2u8; 64]).unwrap();
    let color_map = ColorMap::new(ColorFormat::Rgb555, vec![Rgb::new(0.0, 0.0, 0.0), Rgb::new(0.5, 0.5, 0.5), Rgb::new(1.0, 1.0, 1.0)]).unwrap();
    let (new_map, data) = move_color0(&frame, &color_map, 2).unwrap();
    assert_eq!(new_map.colors[0], Rgb::new(1.0, 1.0, 1.0));
    assert!(data.iter().all(|&b| b == 0));
  }

  #[test]
  fn prune_indices_packs_8bit_down_to_4bit() {
    let frame = Frame::new(8, 8, PixelFormat::Paletted8, vec![5u8; 64]).unwrap();
    let pruned = prune_indices(&frame).unwrap();
    assert_eq!(pruned.format, PixelFormat::Paletted4);
    assert_eq!(pruned.data.len(), 32);
    assert!(pruned.data.iter().all(|&b| b == 0x55));
  }

  #[test]
  fn prune_indices_truncates_indices_above_15() {
    let frame = Frame::new(8, 8, PixelFormat::Paletted8, vec![200u8; 64]).unwrap();
    let pruned = prune_indices(&frame).unwrap();
    assert!(pruned.data.iter().all(|&b| b == 0x88));
  }

  #[test]
  fn prune_indices_rejects_truecolor_frames() {
    let frame = Frame::new(8, 8, PixelFormat::Rgb555, vec![0u8; 8 * 8 * 2]).unwrap();
    assert!(prune_indices(&frame).is_err());
  }

  #[test]
  fn prune_indices_preserves_color_map() {
    let color_map = ColorMap::new(ColorFormat::Rgb555, vec![Rgb::new(0.0, 0.0, 0.0)]).unwrap();
    let frame = Frame::new(8, 8, PixelFormat::Paletted8, vec![0u8; 64]).unwrap().with_color_map(color_map);
    let pruned = prune_indices(&frame).unwrap();
    assert_eq!(pruned.color_map.unwrap().colors.len(), 1);
  }
}
