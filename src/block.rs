//! Non-owning strided views into a frame's pixel buffer.
//!
//! A `BlockView` never owns color data; it only knows which linear
//! indices of a shared color buffer it covers. The original C++ used a
//! template specialized per width with an eagerly-built subblock pair;
//! Rust has no partial specialization, so `BlockLevel` carries that
//! distinction at runtime and the index table is a `Vec` sized to the
//! block's own width*height instead of a `[u32; W*H]` const generic.

use crate::error::{BlockError, Result};

/// Smallest block width DXTV ever encodes directly; blocks never split
/// below this.
pub const MIN_BLOCK_WIDTH: u32 = 4;

/// Block width tier. Height is always 4 at every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLevel {
  W16,
  W8,
  W4,
}

impl BlockLevel {
  pub fn width(self) -> u32 {
    match self {
      BlockLevel::W16 => 16,
      BlockLevel::W8 => 8,
      BlockLevel::W4 => 4,
    }
  }

  pub const HEIGHT: u32 = 4;

  /// Level of this block's two horizontal children, if it can still split.
  pub fn child(self) -> Option<BlockLevel> {
    match self {
      BlockLevel::W16 => Some(BlockLevel::W8),
      BlockLevel::W8 => Some(BlockLevel::W4),
      BlockLevel::W4 => None,
    }
  }
}

/// A `width x 4` rectangle of a frame's color buffer, addressed by
/// linear index rather than by borrowing it directly.
#[derive(Debug, Clone)]
pub struct BlockView {
  level: BlockLevel,
  image_width: u32,
  x: u32,
  y: u32,
  block_index: u32,
  indices: Vec<u32>,
}

impl BlockView {
  pub fn new(level: BlockLevel, image_width: u32, image_height: u32, x: u32, y: u32) -> Result<Self> {
    let width = level.width();
    let height = BlockLevel::HEIGHT;
    if x + width > image_width || y + height > image_height {
      return Err(BlockError::OutOfBounds { x, y, w: width, h: height, iw: image_width, ih: image_height }.into());
    }

    let block_index = y / height * (image_width / width) + x / width;
    let mut indices = Vec::with_capacity((width * height) as usize);
    let mut offset = y * image_width + x;
    for _ in 0..height {
      for i in 0..width {
        indices.push(offset + i);
      }
      offset += image_width;
    }

    Ok(Self { level, image_width, x, y, block_index, indices })
  }

  pub fn level(&self) -> BlockLevel {
    self.level
  }

  pub fn width(&self) -> u32 {
    self.level.width()
  }

  /// Block index within its own level, counted row-wise across the image.
  pub fn index(&self) -> u32 {
    self.block_index
  }

  pub fn len(&self) -> usize {
    self.indices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  pub fn linear_indices(&self) -> &[u32] {
    &self.indices
  }

  /// Deep-copy this block's colors out of `colors` into a compact vec.
  pub fn colors<T: Copy>(&self, colors: &[T]) -> Vec<T> {
    self.indices.iter().map(|&i| colors[i as usize]).collect()
  }

  /// Write `values` into `colors` at this block's positions.
  pub fn write_colors<T: Copy>(&self, colors: &mut [T], values: &[T]) {
    assert_eq!(values.len(), self.indices.len());
    for (&i, &v) in self.indices.iter().zip(values.iter()) {
      colors[i as usize] = v;
    }
  }

  /// Split into left/right half-width children at the next level down,
  /// or `None` if this is already a 4x4 base block.
  pub fn children(&self) -> Option<[BlockView; 2]> {
    let child_level = self.level.child()?;
    let left = BlockView::new(child_level, self.image_width, image_height_hint(self), self.x, self.y)
      .expect("child block always fits inside a valid parent");
    let right = BlockView::new(child_level, self.image_width, image_height_hint(self), self.x + self.level.width() / 2, self.y)
      .expect("child block always fits inside a valid parent");
    Some([left, right])
  }
}

// `BlockView` only needs image height at construction time for a bounds
// check; children of an already-validated block can reuse the parent's
// row span, so this derives a sufficient height instead of storing one.
fn image_height_hint(block: &BlockView) -> u32 {
  block.y + BlockLevel::HEIGHT
}

/// All blocks of a given level tiling a `width x height` image, in
/// row-major order.
pub fn tile(level: BlockLevel, width: u32, height: u32) -> Result<Vec<BlockView>> {
  let bw = level.width();
  let bh = BlockLevel::HEIGHT;
  let mut blocks = Vec::with_capacity(((width / bw) * (height / bh)) as usize);
  let mut y = 0;
  while y < height {
    let mut x = 0;
    while x < width {
      blocks.push(BlockView::new(level, width, height, x, y)?);
      x += bw;
    }
    y += bh;
  }
  Ok(blocks)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn linear_indices_are_row_major() {
    let b = BlockView::new(BlockLevel::W4, 16, 4, 4, 0).unwrap();
    assert_eq!(b.linear_indices(), &[4, 5, 6, 7, 20, 21, 22, 23, 36, 37, 38, 39, 52, 53, 54, 55]);
  }

  #[test]
  fn block_index_counts_within_level() {
    let b0 = BlockView::new(BlockLevel::W4, 16, 4, 0, 0).unwrap();
    let b1 = BlockView::new(BlockLevel::W4, 16, 4, 4, 0).unwrap();
    assert_eq!(b0.index(), 0);
    assert_eq!(b1.index(), 1);
  }

  #[test]
  fn out_of_bounds_block_is_rejected() {
    assert!(BlockView::new(BlockLevel::W16, 16, 4, 4, 0).is_err());
  }

  #[test]
  fn children_split_width_in_half() {
    let parent = BlockView::new(BlockLevel::W16, 16, 4, 0, 0).unwrap();
    let [left, right] = parent.children().unwrap();
    assert_eq!(left.width(), 8);
    assert_eq!(right.width(), 8);
    assert_eq!(left.linear_indices()[0], 0);
    assert_eq!(right.linear_indices()[0], 8);
  }

  #[test]
  fn base_block_has_no_children() {
    let leaf = BlockView::new(BlockLevel::W4, 16, 4, 0, 0).unwrap();
    assert!(leaf.children().is_none());
  }

  #[test]
  fn tile_covers_whole_image_exactly_once() {
    let blocks = tile(BlockLevel::W4, 16, 8).unwrap();
    assert_eq!(blocks.len(), 8);
    let mut covered: Vec<u32> = blocks.iter().flat_map(|b| b.linear_indices().iter().copied()).collect();
    covered.sort_unstable();
    covered.dedup();
    assert_eq!(covered.len(), 16 * 8);
  }
}
