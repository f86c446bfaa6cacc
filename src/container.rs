//! File container: 24-byte file header, then a flat sequence of
//! per-frame records.
//!
//! Generalizes `isobmff.rs`'s deferred-size-patch writer (reserve a
//! field, remember its offset, fill it in once the real value is
//! known) to this format's flat little-endian layout instead of nested
//! big-endian boxes.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ContainerError, Result};

/// 24-byte file header, little-endian throughout (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
  pub nr_of_frames: u32,
  pub width: u16,
  pub height: u16,
  pub fps: u8,
  pub bits_per_pixel: u8,
  pub bits_per_color: u8,
  pub color_map_entries: u8,
  pub max_memory_needed: u32,
}

impl FileHeader {
  pub const LEN: usize = 24;

  pub fn to_bytes(self) -> [u8; Self::LEN] {
    let mut out = [0u8; Self::LEN];
    LittleEndian::write_u32(&mut out[0..4], self.nr_of_frames);
    LittleEndian::write_u16(&mut out[4..6], self.width);
    LittleEndian::write_u16(&mut out[6..8], self.height);
    out[8] = self.fps;
    out[9] = self.bits_per_pixel;
    out[10] = self.bits_per_color;
    out[11] = self.color_map_entries;
    LittleEndian::write_u32(&mut out[12..16], self.max_memory_needed);
    // bytes 16..24 reserved/padding, kept zero
    out
  }

  pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
    if bytes.len() < Self::LEN {
      return None;
    }
    Some(Self {
      nr_of_frames: LittleEndian::read_u32(&bytes[0..4]),
      width: LittleEndian::read_u16(&bytes[4..6]),
      height: LittleEndian::read_u16(&bytes[6..8]),
      fps: bytes[8],
      bits_per_pixel: bytes[9],
      bits_per_color: bytes[10],
      color_map_entries: bytes[11],
      max_memory_needed: LittleEndian::read_u32(&bytes[12..16]),
    })
  }

  /// Fixed per-file size of one frame's color map payload, derived from
  /// the header rather than stored per-frame (color maps are written
  /// in full on every frame per §4.7, but never length-prefixed).
  pub fn color_map_size(&self) -> usize {
    self.color_map_entries as usize * self.bits_per_color as usize / 8
  }
}

fn pad4(bytes: &mut Vec<u8>) {
  while bytes.len() % 4 != 0 {
    bytes.push(0);
  }
}

/// Incremental container writer. `max_memory_needed` is only known once
/// every frame has been written, so the header is reserved with a
/// placeholder and patched in `finalize`.
pub struct ContainerWriter {
  data: Vec<u8>,
  color_map_size: usize,
  max_memory_needed: u32,
}

impl ContainerWriter {
  pub fn new(nr_of_frames: u32, width: u16, height: u16, fps: u8, bits_per_pixel: u8, bits_per_color: u8, color_map_entries: u8) -> Self {
    let header = FileHeader {
      nr_of_frames,
      width,
      height,
      fps,
      bits_per_pixel,
      bits_per_color,
      color_map_entries,
      max_memory_needed: 0,
    };
    let color_map_size = header.color_map_size();
    Self { data: header.to_bytes().to_vec(), color_map_size, max_memory_needed: 0 }
  }

  /// Appends one frame record: `frameSize:u32`, the frame's
  /// processing-chunk bytes, then (if the header declares a color
  /// format) the frame's color map bytes, exactly `color_map_size`
  /// long. `scratch_bytes_needed` folds into the header's
  /// `maxMemoryNeeded` once the file is finalized.
  pub fn write_frame(&mut self, frame_bytes: &[u8], color_map_bytes: Option<&[u8]>, scratch_bytes_needed: u32) -> Result<()> {
    if frame_bytes.len() % 4 != 0 {
      return Err(ContainerError::Unaligned(frame_bytes.len()).into());
    }
    match (self.color_map_size, color_map_bytes) {
      (0, _) => {}
      (expected, Some(bytes)) if bytes.len() == expected => {}
      (expected, Some(bytes)) => return Err(ContainerError::ColorMapTooLarge(bytes.len().max(expected)).into()),
      (_, None) => return Err(ContainerError::ColorMapTooLarge(0).into()),
    }

    let mut record = Vec::with_capacity(4 + frame_bytes.len());
    record.extend_from_slice(&(frame_bytes.len() as u32).to_le_bytes());
    record.extend_from_slice(frame_bytes);
    pad4(&mut record);
    if let Some(bytes) = color_map_bytes {
      record.extend_from_slice(bytes);
      pad4(&mut record);
    }

    self.data.extend_from_slice(&record);
    self.max_memory_needed = self.max_memory_needed.max(scratch_bytes_needed);
    Ok(())
  }

  /// Patches `maxMemoryNeeded` into the reserved header bytes and
  /// returns the completed file.
  pub fn finalize(mut self) -> Vec<u8> {
    LittleEndian::write_u32(&mut self.data[12..16], self.max_memory_needed);
    self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_roundtrips() {
    let header = FileHeader {
      nr_of_frames: 3,
      width: 16,
      height: 32,
      fps: 30,
      bits_per_pixel: 16,
      bits_per_color: 0,
      color_map_entries: 0,
      max_memory_needed: 4096,
    };
    let bytes = header.to_bytes();
    assert_eq!(bytes.len(), FileHeader::LEN);
    assert_eq!(FileHeader::from_bytes(&bytes).unwrap(), header);
  }

  #[test]
  fn writer_rejects_unaligned_frame_bytes() {
    let mut writer = ContainerWriter::new(1, 16, 16, 30, 16, 0, 0);
    assert!(writer.write_frame(&[0u8; 5], None, 0).is_err());
  }

  #[test]
  fn writer_patches_max_memory_needed_on_finalize() {
    let mut writer = ContainerWriter::new(2, 16, 16, 30, 16, 0, 0);
    writer.write_frame(&[0u8; 8], None, 1024).unwrap();
    writer.write_frame(&[0u8; 8], None, 4096).unwrap();
    let file = writer.finalize();
    let header = FileHeader::from_bytes(&file).unwrap();
    assert_eq!(header.max_memory_needed, 4096);
  }

  #[test]
  fn writer_requires_color_map_bytes_when_header_declares_one() {
    let mut writer = ContainerWriter::new(1, 16, 16, 30, 8, 15, 4);
    assert!(writer.write_frame(&[0u8; 4], None, 0).is_err());
    let expected_size = FileHeader { nr_of_frames: 1, width: 16, height: 16, fps: 30, bits_per_pixel: 8, bits_per_color: 15, color_map_entries: 4, max_memory_needed: 0 }.color_map_size();
    let correct = vec![0u8; expected_size];
    assert!(writer.write_frame(&[0u8; 4], Some(&correct), 0).is_ok());
  }

  #[test]
  fn file_layout_is_frame_count_times_record_plus_header() {
    let mut writer = ContainerWriter::new(2, 8, 8, 24, 16, 0, 0);
    writer.write_frame(&[1, 2, 3, 4], None, 0).unwrap();
    writer.write_frame(&[5, 6, 7, 8], None, 0).unwrap();
    let file = writer.finalize();
    assert_eq!(file.len(), FileHeader::LEN + 2 * (4 + 4));
  }
}
