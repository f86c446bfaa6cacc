//! DXTV: the block-based, motion-compensated frame codec.
//!
//! A frame is tiled into 16x4 blocks, each optionally split into 8x4
//! then 4x4 children. Every leaf is either a verbatim range-fit DXT1
//! block (`src/dxt1.rs`) or a reference to an already-reconstructed
//! block in the current or previous frame, rebased into a 7-bit offset.
//! Flags are sent depth-first so no bit is spent on blocks that don't
//! exist.
//!
//! Grounded on the encoder in `codec_dxtv.cpp`. That encoder never
//! implements its decoder (`decodeDXTV` there just returns an empty
//! vector), so the decode half here is a genuine addition needed to
//! make the format round-trip at all; see `DESIGN.md` for the one
//! other point where this module diverges from the original source
//! (the split-flag omission bug).

use crate::block::{self, BlockLevel, BlockView, MIN_BLOCK_WIDTH};
use crate::color::YCgCoR;
use crate::dxt1::Dxt1Block;
use crate::error::{DxtvError, Result};

const FRAME_IS_PFRAME: u16 = 0x80;
const FRAME_KEEP: u16 = 0x40;

const BLOCK_IS_FULL: bool = false;
const BLOCK_IS_SPLIT: bool = true;
const BLOCK_IS_DXT: bool = false;
const BLOCK_IS_REF: bool = true;
const BLOCK_FROM_CURR: u8 = 0x00;
const BLOCK_FROM_PREV: u8 = 0x80;

// Search windows for candidate blocks, relative to the block being
// encoded. The previous-frame window straddles zero since any part of
// the previous frame is already available; the current-frame window
// only looks backward, since later blocks aren't encoded yet.
const CURR_OFFSET_MIN: i32 = -128;
const CURR_OFFSET_MAX: i32 = -1;
const PREV_OFFSET_MIN: i32 = -63;
const PREV_OFFSET_MAX: i32 = 64;

// Rebase constants for packing a signed block-index difference into the
// 7-bit reference offset field. The previous-frame rebase mirrors its
// search window exactly (`diff - PREV_OFFSET_MIN` bijects [-63,64] onto
// [0,127]). `encode_block` only ever calls `rebase_curr` with a positive
// `diff` (current-frame candidates only ever precede the block being
// encoded), so its rebase bijects [1,128] onto [0,127] by subtracting 1,
// matching `codec_dxtv.cpp`'s `diff + CurrRefOffset.second` exactly.
const PREV_REBASE_SUB: i32 = PREV_OFFSET_MIN;
const CURR_REBASE_SUB: i32 = 1;

fn rebase_prev(diff: i32) -> Option<u8> {
  let v = diff - PREV_REBASE_SUB;
  (0..=127).contains(&v).then_some(v as u8)
}

fn rebase_curr(diff: i32) -> Option<u8> {
  let v = diff - CURR_REBASE_SUB;
  (0..=127).contains(&v).then_some(v as u8)
}

fn unrebase_prev(offset: u8) -> i32 {
  offset as i32 + PREV_REBASE_SUB
}

fn unrebase_curr(offset: u8) -> i32 {
  offset as i32 + CURR_REBASE_SUB
}

#[derive(Debug, Clone, Copy, Default)]
struct FrameHeader {
  flags: u16,
  nr_of_blocks: u16,
  nr_of_ref_blocks: u16,
  dummy: u16,
}

impl FrameHeader {
  const SIZE: usize = 8;

  fn to_bytes(self) -> [u8; Self::SIZE] {
    let mut out = [0u8; Self::SIZE];
    out[0..2].copy_from_slice(&self.flags.to_le_bytes());
    out[2..4].copy_from_slice(&self.nr_of_blocks.to_le_bytes());
    out[4..6].copy_from_slice(&self.nr_of_ref_blocks.to_le_bytes());
    out[6..8].copy_from_slice(&self.dummy.to_le_bytes());
    out
  }

  fn from_bytes(bytes: &[u8]) -> Self {
    Self {
      flags: u16::from_le_bytes([bytes[0], bytes[1]]),
      nr_of_blocks: u16::from_le_bytes([bytes[2], bytes[3]]),
      nr_of_ref_blocks: u16::from_le_bytes([bytes[4], bytes[5]]),
      dummy: u16::from_le_bytes([bytes[6], bytes[7]]),
    }
  }
}

/// All blocks of an image, tiled once per level and reused across the
/// whole encode or decode pass.
struct LevelBlocks {
  w16: Vec<BlockView>,
  w8: Vec<BlockView>,
  w4: Vec<BlockView>,
}

impl LevelBlocks {
  fn build(width: u32, height: u32) -> Result<Self> {
    Ok(Self {
      w16: block::tile(BlockLevel::W16, width, height)?,
      w8: block::tile(BlockLevel::W8, width, height)?,
      w4: block::tile(BlockLevel::W4, width, height)?,
    })
  }

  fn empty() -> Self {
    Self { w16: Vec::new(), w8: Vec::new(), w4: Vec::new() }
  }

  fn get(&self, level: BlockLevel) -> &[BlockView] {
    match level {
      BlockLevel::W16 => &self.w16,
      BlockLevel::W8 => &self.w8,
      BlockLevel::W4 => &self.w4,
    }
  }
}

/// A frame's colors plus its precomputed block tiling, used both as the
/// encoder's working copy of the current frame and as its view of the
/// previous one.
struct CodeBook {
  colors: Vec<YCgCoR>,
  blocks: LevelBlocks,
}

impl CodeBook {
  fn from_rgb555(image: &[u16], width: u32, height: u32) -> Result<Self> {
    Ok(Self {
      colors: image.iter().map(|&p| YCgCoR::from_rgb555(p)).collect(),
      blocks: LevelBlocks::build(width, height)?,
    })
  }

  fn empty() -> Self {
    Self { colors: Vec::new(), blocks: LevelBlocks::empty() }
  }

  fn blocks(&self, level: BlockLevel) -> &[BlockView] {
    self.blocks.get(level)
  }

  fn colors(&self) -> &[YCgCoR] {
    &self.colors
  }

  fn colors_mut(&mut self) -> &mut [YCgCoR] {
    &mut self.colors
  }

  fn to_rgb555(&self) -> Vec<u16> {
    self.colors.iter().map(|c| c.to_rgb555()).collect()
  }

  /// Mean perceptual distance between two same-sized codebooks, scaled
  /// by the number of 4x4 blocks (matches the original's normalization,
  /// not a plain per-pixel mean).
  fn distance_to(&self, other: &CodeBook) -> f64 {
    YCgCoR::distance_slice(&self.colors, &other.colors) / self.blocks(BlockLevel::W4).len() as f64
  }
}

fn block_distance_below_threshold(a: &[YCgCoR], b: &[YCgCoR], threshold: f64) -> (bool, f64) {
  debug_assert_eq!(a.len(), b.len());
  let mut below = true;
  let mut dist = 0.0;
  for (&ca, &cb) in a.iter().zip(b.iter()) {
    let d = YCgCoR::distance(ca, cb);
    below = below && d < threshold;
    dist += d;
  }
  (below, dist / a.len() as f64)
}

#[derive(Default)]
struct CompressionState {
  flags: Vec<bool>,
  ref_blocks: Vec<u8>,
  dxt_blocks: Vec<u8>,
  min_blocks_encoded: u32,
  dxt_leaf_blocks: u32,
}

/// Per-frame leaf block-type counts, reported when a pipeline stage sets
/// `Stage::with_statistics` (the Qt live histogram's numeric core, minus
/// the GUI).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
  pub ref_blocks: u32,
  pub dxt_blocks: u32,
}

/// Search `search_blocks` for the lowest-error candidate within
/// `[offset_min, offset_max]` of `block`'s index, clamped to the first
/// `nr_of_blocks` entries (the causally-available prefix). Candidates
/// whose offset doesn't survive `rebase` are skipped outright.
#[allow(clippy::too_many_arguments)]
fn find_best_matching_block(
  search_blocks: &[BlockView],
  search_colors: &[YCgCoR],
  nr_of_blocks: i64,
  block: &BlockView,
  block_colors: &[YCgCoR],
  max_allowed_error: f64,
  offset_min: i32,
  offset_max: i32,
  rebase: impl Fn(i32) -> Option<u8>,
) -> Option<(f64, usize, u8)> {
  if search_blocks.is_empty() {
    return None;
  }

  let clamp_index = |raw: i64| -> i64 {
    let v = raw.max(0);
    if v >= nr_of_blocks {
      nr_of_blocks - 1
    } else {
      v
    }
  };
  let min_index = clamp_index(block.index() as i64 + offset_min as i64);
  let max_index = clamp_index(block.index() as i64 + offset_max as i64);
  if max_index - min_index < 1 {
    return None;
  }

  let mut best_error = f64::INFINITY;
  let mut best: Option<(usize, u8)> = None;
  for idx in min_index..max_index {
    let diff = block.index() as i32 - idx as i32;
    let Some(encoded_offset) = rebase(diff) else { continue };
    let candidate = &search_blocks[idx as usize];
    let candidate_colors = candidate.colors(search_colors);
    let (below, dist) = block_distance_below_threshold(block_colors, &candidate_colors, max_allowed_error);
    let error = if below { dist } else { f64::INFINITY };
    if error < best_error {
      best_error = error;
      best = Some((idx as usize, encoded_offset));
    }
  }
  if best_error < max_allowed_error {
    best.map(|(i, o)| (best_error, i, o))
  } else {
    None
  }
}

fn encode_block(level: BlockLevel, current: &mut CodeBook, previous: &CodeBook, block: &BlockView, state: &mut CompressionState, max_allowed_error: f64) {
  let block_colors = block.colors(current.colors());

  let previous_ref = find_best_matching_block(
    previous.blocks(level),
    previous.colors(),
    previous.blocks(level).len() as i64,
    block,
    &block_colors,
    max_allowed_error,
    PREV_OFFSET_MIN,
    PREV_OFFSET_MAX,
    rebase_prev,
  );

  let nr_current = (state.min_blocks_encoded as i64 * MIN_BLOCK_WIDTH as i64) / level.width() as i64;
  let current_ref = find_best_matching_block(
    current.blocks(level),
    current.colors(),
    nr_current,
    block,
    &block_colors,
    max_allowed_error,
    CURR_OFFSET_MIN,
    CURR_OFFSET_MAX,
    rebase_curr,
  );

  let use_previous = match (&previous_ref, &current_ref) {
    (Some(p), Some(c)) => p.0 <= c.0,
    (Some(_), None) => true,
    (None, _) => false,
  };

  if use_previous {
    let (_, src_idx, offset) = previous_ref.unwrap();
    let src = previous.blocks(level)[src_idx].clone();
    state.flags.push(BLOCK_IS_REF);
    state.flags.push(BLOCK_IS_FULL);
    state.ref_blocks.push(BLOCK_FROM_PREV | offset);
    state.min_blocks_encoded += 1;
    let src_colors = src.colors(previous.colors());
    block.write_colors(current.colors_mut(), &src_colors);
    return;
  }

  if let Some((_, src_idx, offset)) = current_ref {
    let src = current.blocks(level)[src_idx].clone();
    state.flags.push(BLOCK_IS_REF);
    state.flags.push(BLOCK_IS_FULL);
    state.ref_blocks.push(BLOCK_FROM_CURR | offset);
    state.min_blocks_encoded += 1;
    let src_colors = src.colors(current.colors());
    block.write_colors(current.colors_mut(), &src_colors);
    return;
  }

  // No usable reference: DXT-encode the block verbatim.
  let encoded = Dxt1Block::encode(&block_colors);
  let decoded = encoded.decode();
  let (below, _) = block_distance_below_threshold(&block_colors, &decoded, max_allowed_error);

  if level.width() <= MIN_BLOCK_WIDTH || below {
    state.flags.push(BLOCK_IS_DXT);
    state.flags.push(BLOCK_IS_FULL);
    state.dxt_blocks.extend(encoded.to_bytes());
    state.min_blocks_encoded += 1;
    state.dxt_leaf_blocks += 1;
    block.write_colors(current.colors_mut(), &decoded);
  } else {
    // The original encoder never pushes a flag pair here, which leaves
    // its never-implemented decoder with no way to tell a split block
    // apart from what follows. This crate emits (DXT, SPLIT) so a real
    // decoder can actually recurse the same way.
    state.flags.push(BLOCK_IS_DXT);
    state.flags.push(BLOCK_IS_SPLIT);
    let [left, right] = block.children().expect("width > MIN_BLOCK_WIDTH always has children");
    let child_level = level.child().expect("width > MIN_BLOCK_WIDTH always has a child level");
    encode_block(child_level, current, previous, &left, state, max_allowed_error);
    encode_block(child_level, current, previous, &right, state, max_allowed_error);
  }
}

fn pack_flags(flags: &[bool]) -> Vec<u8> {
  let mut padded = flags.to_vec();
  while padded.len() % 32 != 0 {
    padded.push(false);
  }
  let mut out = Vec::with_capacity(padded.len() / 8);
  for chunk in padded.chunks(32) {
    let mut word = 0u32;
    for (i, &bit) in chunk.iter().enumerate() {
      if bit {
        word |= 1 << i;
      }
    }
    out.extend_from_slice(&word.to_be_bytes());
  }
  out
}

struct FlagReader {
  bits: Vec<bool>,
  pos: usize,
}

impl FlagReader {
  fn new(bytes: &[u8]) -> Self {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for word_bytes in bytes.chunks(4) {
      let word = u32::from_be_bytes([word_bytes[0], word_bytes[1], word_bytes[2], word_bytes[3]]);
      for i in 0..32 {
        bits.push((word >> i) & 1 != 0);
      }
    }
    Self { bits, pos: 0 }
  }

  fn next(&mut self) -> bool {
    let bit = self.bits[self.pos];
    self.pos += 1;
    bit
  }
}

fn pad_to_multiple_of(buf: &mut Vec<u8>, n: usize) {
  while buf.len() % n != 0 {
    buf.push(0);
  }
}

fn div_ceil(n: usize, d: usize) -> usize {
  (n + d - 1) / d
}

/// Encode one frame. `previous_image` is `None` (or ignored, on key
/// frames) for the first frame of a stream. `max_block_error` is on the
/// user-facing `[0.01, 1.0]` scale and is rescaled internally.
///
/// Returns the compressed bytes, the reconstructed frame (identical to
/// what a decoder would produce, since DXTV is lossy and later frames
/// reference the *reconstructed* previous frame, not the source), and
/// the frame's leaf block-type counts.
pub fn encode_frame(image: &[u16], previous_image: Option<&[u16]>, width: u32, height: u32, key_frame: bool, max_block_error: f64) -> Result<(Vec<u8>, Vec<u16>, BlockStats)> {
  if width % 16 != 0 || height % 16 != 0 {
    return Err(DxtvError::InvalidDimensions { width, height }.into());
  }
  if !(0.01..=1.0).contains(&max_block_error) {
    return Err(DxtvError::InvalidThreshold(max_block_error).into());
  }
  let max_block_error = max_block_error / 1000.0;

  let mut current = CodeBook::from_rgb555(image, width, height)?;
  let previous = match previous_image {
    Some(prev) if !key_frame => CodeBook::from_rgb555(prev, width, height)?,
    _ => CodeBook::empty(),
  };

  let frame_distance = if previous.colors().is_empty() { f64::INFINITY } else { current.distance_to(&previous) };

  if !key_frame && frame_distance < 0.001 {
    log::debug!("DXTV: frame is a duplicate of the previous one, emitting KEEP header");
    let header = FrameHeader { flags: FRAME_KEEP, ..Default::default() };
    return Ok((header.to_bytes().to_vec(), previous_image.map(|p| p.to_vec()).unwrap_or_default(), BlockStats::default()));
  }

  let mut state = CompressionState::default();
  let top_blocks = current.blocks(BlockLevel::W16).to_vec();
  for top_block in &top_blocks {
    encode_block(BlockLevel::W16, &mut current, &previous, top_block, &mut state, max_block_error);
  }

  let header = FrameHeader {
    flags: if key_frame { 0 } else { FRAME_IS_PFRAME },
    nr_of_blocks: (state.flags.len() / 2) as u16,
    nr_of_ref_blocks: state.ref_blocks.len() as u16,
    dummy: 0,
  };

  let mut compressed = Vec::new();
  compressed.extend_from_slice(&header.to_bytes());
  compressed.extend(pack_flags(&state.flags));
  if !state.ref_blocks.is_empty() {
    pad_to_multiple_of(&mut state.ref_blocks, 4);
    compressed.extend_from_slice(&state.ref_blocks);
  }
  compressed.extend_from_slice(&state.dxt_blocks);
  debug_assert_eq!(compressed.len() % 4, 0);

  log::info!(
    "DXTV: encoded {}x{} frame to {} bytes ({} blocks, {} refs)",
    width,
    height,
    compressed.len(),
    header.nr_of_blocks,
    header.nr_of_ref_blocks
  );

  let stats = BlockStats { ref_blocks: header.nr_of_ref_blocks as u32, dxt_blocks: state.dxt_leaf_blocks };
  Ok((compressed, current.to_rgb555(), stats))
}

#[allow(clippy::too_many_arguments)]
fn decode_block(
  level: BlockLevel,
  block: &BlockView,
  flags: &mut FlagReader,
  ref_bytes: &[u8],
  ref_cursor: &mut usize,
  dxt_bytes: &[u8],
  dxt_cursor: &mut usize,
  current_colors: &mut [YCgCoR],
  previous_colors: &[YCgCoR],
  current_blocks: &LevelBlocks,
  previous_blocks: &LevelBlocks,
) -> Result<()> {
  let is_ref = flags.next();
  let is_split = flags.next();

  if is_ref {
    let raw_byte = *ref_bytes.get(*ref_cursor).ok_or(DxtvError::TruncatedFrame { expected: *ref_cursor + 1, actual: ref_bytes.len() })?;
    *ref_cursor += 1;
    let from_prev = raw_byte & BLOCK_FROM_PREV != 0;
    let offset = raw_byte & 0x7F;

    let (src_colors, diff): (&[YCgCoR], i32) =
      if from_prev { (previous_colors, unrebase_prev(offset)) } else { (&*current_colors, unrebase_curr(offset)) };
    let src_index = block.index() as i32 - diff;
    let blocks = if from_prev { previous_blocks } else { current_blocks };
    let level_blocks = blocks.get(level);
    if src_index < 0 || src_index as usize >= level_blocks.len() {
      return Err(DxtvError::OffsetOutOfRange(diff).into());
    }
    let src = level_blocks[src_index as usize].clone();
    let values = src.colors(src_colors);
    block.write_colors(current_colors, &values);
    return Ok(());
  }

  let encoded_len = Dxt1Block::encoded_len(level.width() as usize);
  if is_split {
    let [left, right] = block.children().expect("split flag only ever set above MIN_BLOCK_WIDTH");
    let child_level = level.child().expect("split flag only ever set above MIN_BLOCK_WIDTH");
    decode_block(child_level, &left, flags, ref_bytes, ref_cursor, dxt_bytes, dxt_cursor, current_colors, previous_colors, current_blocks, previous_blocks)?;
    decode_block(child_level, &right, flags, ref_bytes, ref_cursor, dxt_bytes, dxt_cursor, current_colors, previous_colors, current_blocks, previous_blocks)?;
    return Ok(());
  }

  if *dxt_cursor + encoded_len > dxt_bytes.len() {
    return Err(DxtvError::TruncatedFrame { expected: *dxt_cursor + encoded_len, actual: dxt_bytes.len() }.into());
  }
  let raw = &dxt_bytes[*dxt_cursor..*dxt_cursor + encoded_len];
  *dxt_cursor += encoded_len;
  let decoded = Dxt1Block::from_bytes(raw, level.width() as usize).decode();
  block.write_colors(current_colors, &decoded);
  Ok(())
}

/// Decode one frame back to RGB555 pixels. Genuinely implemented (the
/// original's `decodeDXTV` is a stub), using the mirror image of the
/// encode-side flag/reference/DXT layout.
pub fn decode_frame(data: &[u8], width: u32, height: u32, previous_image: Option<&[u16]>) -> Result<Vec<u16>> {
  if data.len() < FrameHeader::SIZE {
    return Err(DxtvError::TruncatedFrame { expected: FrameHeader::SIZE, actual: data.len() }.into());
  }
  let header = FrameHeader::from_bytes(&data[..FrameHeader::SIZE]);

  if header.flags & FRAME_KEEP != 0 {
    return Ok(previous_image.map(|p| p.to_vec()).unwrap_or_else(|| vec![0u16; (width * height) as usize]));
  }

  let is_pframe = header.flags & FRAME_IS_PFRAME != 0;
  let previous_colors: Vec<YCgCoR> = if is_pframe {
    previous_image.map(|p| p.iter().map(|&c| YCgCoR::from_rgb555(c)).collect()).unwrap_or_default()
  } else {
    Vec::new()
  };

  let current_blocks = LevelBlocks::build(width, height)?;
  let previous_blocks = if previous_colors.is_empty() { LevelBlocks::empty() } else { LevelBlocks::build(width, height)? };

  let flags_byte_len = div_ceil(header.nr_of_blocks as usize * 2, 32) * 4;
  let ref_byte_len = if header.nr_of_ref_blocks == 0 { 0 } else { div_ceil(header.nr_of_ref_blocks as usize, 4) * 4 };

  let flags_start = FrameHeader::SIZE;
  let flags_end = flags_start + flags_byte_len;
  let ref_start = flags_end;
  let ref_end = ref_start + ref_byte_len;
  let dxt_start = ref_end;

  if data.len() < dxt_start {
    return Err(DxtvError::TruncatedFrame { expected: dxt_start, actual: data.len() }.into());
  }

  let mut flags = FlagReader::new(&data[flags_start..flags_end]);
  let ref_bytes = &data[ref_start..ref_end];
  let dxt_bytes = &data[dxt_start..];
  let mut ref_cursor = 0usize;
  let mut dxt_cursor = 0usize;

  let mut current_colors = vec![YCgCoR::new(0.0, 0.0, 0.0); (width * height) as usize];
  for top_block in &current_blocks.w16 {
    decode_block(
      BlockLevel::W16,
      top_block,
      &mut flags,
      ref_bytes,
      &mut ref_cursor,
      dxt_bytes,
      &mut dxt_cursor,
      &mut current_colors,
      &previous_colors,
      &current_blocks,
      &previous_blocks,
    )?;
  }

  Ok(current_colors.iter().map(|c| c.to_rgb555()).collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prev_rebase_matches_documented_example() {
    assert_eq!(rebase_prev(10), Some(0x49));
    assert_eq!(BLOCK_FROM_PREV | 0x49, 0xC9);
  }

  #[test]
  fn curr_rebase_bijects_the_actual_causal_window() {
    // encode_block only ever calls rebase_curr with diff = block.index() -
    // src_idx, and src_idx always precedes block.index(), so diff ranges
    // over the positive window [1,128], never negative.
    for diff in 1..=128 {
      let offset = rebase_curr(diff).unwrap();
      assert_eq!(unrebase_curr(offset), diff);
    }
    assert_eq!(rebase_curr(129), None);
  }

  #[test]
  fn curr_ref_emits_the_byte_the_encoder_actually_produces() {
    // Six base blocks in a single row; block 5 is color-identical to
    // block 0, blocks 1..4 are each distinct from it and from each
    // other. Pretend blocks 0..4 were already encoded as DXT leaves
    // (`min_blocks_encoded = 5`) and encode block 5 directly, the same
    // call `encode_frame` would make, then check the byte it emits.
    let width = 24;
    let height = 4;
    let mut colors = vec![YCgCoR::new(0.0, 0.0, 0.0); (width * height) as usize];
    for b in 0..6u32 {
      let group = if b == 5 { 0 } else { b };
      let raw = (group << 10) as u16 | 0x001F;
      let color = YCgCoR::from_rgb555(raw);
      for row in 0..4u32 {
        for col in 0..4u32 {
          let idx = (row * width + b * 4 + col) as usize;
          colors[idx] = color;
        }
      }
    }
    let w4_blocks: Vec<BlockView> = (0..6).map(|i| BlockView::new(BlockLevel::W4, width, height, i * 4, 0).unwrap()).collect();
    let mut current = CodeBook { colors, blocks: LevelBlocks { w16: Vec::new(), w8: Vec::new(), w4: w4_blocks } };
    let previous = CodeBook::empty();
    let mut state = CompressionState { min_blocks_encoded: 5, ..Default::default() };

    let block5 = current.blocks(BlockLevel::W4)[5].clone();
    encode_block(BlockLevel::W4, &mut current, &previous, &block5, &mut state, 1.0);

    assert_eq!(state.ref_blocks, vec![BLOCK_FROM_CURR | rebase_curr(5).unwrap()]);
    assert_eq!(state.ref_blocks, vec![0x04]);
  }

  #[test]
  fn duplicate_frame_emits_keep_header_only() {
    let image = vec![0x1234u16; 16 * 16];
    let (_, reconstructed, _) = encode_frame(&image, None, 16, 16, true, 0.5).unwrap();
    let (compressed, _, _) = encode_frame(&image, Some(&reconstructed), 16, 16, false, 0.5).unwrap();
    assert_eq!(compressed.len(), 8);
    assert_eq!(compressed[0] & 0xFF, FRAME_KEEP as u8);
  }

  #[test]
  fn rejects_dimensions_not_multiple_of_16() {
    let image = vec![0u16; 8 * 8];
    assert!(encode_frame(&image, None, 8, 8, true, 0.5).is_err());
  }

  #[test]
  fn rejects_threshold_out_of_range() {
    let image = vec![0u16; 16 * 16];
    assert!(encode_frame(&image, None, 16, 16, true, 0.0).is_err());
    assert!(encode_frame(&image, None, 16, 16, true, 1.5).is_err());
  }

  #[test]
  fn key_frame_roundtrips_through_decode() {
    let mut image = vec![0x1234u16; 32 * 16];
    for (i, px) in image.iter_mut().enumerate() {
      if i % 7 == 0 {
        *px = 0x7C00;
      }
    }
    let (compressed, reconstructed, _) = encode_frame(&image, None, 32, 16, true, 0.5).unwrap();
    let decoded = decode_frame(&compressed, 32, 16, None).unwrap();
    assert_eq!(decoded, reconstructed);
  }

  #[test]
  fn pframe_referencing_previous_frame_roundtrips() {
    let mut first = vec![0x0000u16; 32 * 16];
    for (i, px) in first.iter_mut().enumerate() {
      if i % 5 == 0 {
        *px = 0x5294;
      }
    }
    let (_, recon0, _) = encode_frame(&first, None, 32, 16, true, 0.5).unwrap();

    let mut second = recon0.clone();
    second[0] = 0x7FFF;
    let (compressed1, recon1, _) = encode_frame(&second, Some(&recon0), 32, 16, false, 0.5).unwrap();
    let decoded1 = decode_frame(&compressed1, 32, 16, Some(&recon0)).unwrap();
    assert_eq!(decoded1, recon1);
  }

  #[test]
  fn key_frame_stats_has_no_ref_blocks() {
    let image = vec![0x1234u16; 16 * 16];
    let (_, _, stats) = encode_frame(&image, None, 16, 16, true, 0.5).unwrap();
    assert_eq!(stats.ref_blocks, 0);
    assert!(stats.dxt_blocks > 0);
  }

  #[test]
  fn identical_pframe_reuses_previous_blocks() {
    let mut image = vec![0x0000u16; 32 * 16];
    for (i, px) in image.iter_mut().enumerate() {
      if i % 3 == 0 {
        *px = 0x5294;
      }
    }
    let (_, recon0, _) = encode_frame(&image, None, 32, 16, true, 0.5).unwrap();
    let mut second = recon0.clone();
    second[0] = 0x7FFF;
    let (_, _, stats) = encode_frame(&second, Some(&recon0), 32, 16, false, 0.5).unwrap();
    assert!(stats.ref_blocks > 0);
  }
}
