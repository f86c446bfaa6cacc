//! Crate-wide error types.
//!
//! Each module owns a narrow error enum for the failure modes it can
//! produce; this module aggregates them behind one `Error` so pipeline
//! code can propagate with `?` regardless of which stage failed.

use thiserror::Error;

/// Errors from color conversion and grid rounding.
#[derive(Debug, Error)]
pub enum ColorError {
  /// A component value fell outside its declared range.
  #[error("color component {value} out of range [{min},{max}]")]
  OutOfRange { value: f64, min: f64, max: f64 },
}

/// Errors from block-view construction and access.
#[derive(Debug, Error)]
pub enum BlockError {
  /// Requested block rectangle does not fit inside the parent image.
  #[error("block at ({x},{y}) size {w}x{h} exceeds image {iw}x{ih}")]
  OutOfBounds { x: u32, y: u32, w: u32, h: u32, iw: u32, ih: u32 },
}

/// Errors from the DXTV frame codec.
#[derive(Debug, Error)]
pub enum DxtvError {
  /// Width or height was not a multiple of 16.
  #[error("DXTV requires width and height multiples of 16, got {width}x{height}")]
  InvalidDimensions { width: u32, height: u32 },
  /// `maxBlockError` fell outside the documented user-facing range.
  #[error("max_block_error must be in [0.01, 1.0], got {0}")]
  InvalidThreshold(f64),
  /// A computed reference offset did not fit in the 7-bit encoded range.
  #[error("reference offset {0} out of encodable range [0,127]")]
  OffsetOutOfRange(i32),
  /// Decoder encountered a frame byte stream shorter than its header
  /// claims.
  #[error("truncated DXTV frame: expected at least {expected} bytes, got {actual}")]
  TruncatedFrame { expected: usize, actual: usize },
}

/// Errors from the ADPCM codec.
#[derive(Debug, Error)]
pub enum AdpcmError {
  /// Channel count outside {1, 2}.
  #[error("ADPCM channel count must be 1 or 2, got {0}")]
  InvalidChannelCount(u32),
  /// Stereo input had an odd total sample count.
  #[error("stereo ADPCM input must have an even sample count, got {0}")]
  OddStereoSampleCount(usize),
  /// Uncompressed size would overflow the 16-bit header field.
  #[error("uncompressed size {0} does not fit in 16 bits")]
  SizeOverflow(usize),
  /// PCM bit depth outside [1,32].
  #[error("pcm bits per sample must be in [1,32], got {0}")]
  InvalidPcmBits(u32),
  /// ADPCM bit depth outside [3,5].
  #[error("adpcm bits per sample must be in [3,5], got {0}")]
  InvalidAdpcmBits(u32),
  /// Decoded block size did not match the size implied by the header.
  #[error("ADPCM block size mismatch: expected {expected}, got {actual}")]
  BlockSizeMismatch { expected: usize, actual: usize },
  /// Non-zero reserved flags field.
  #[error("ADPCM frame header flags must be 0, got {0}")]
  NonZeroFlags(u32),
  /// Not enough bytes to hold a frame header.
  #[error("truncated ADPCM frame: need at least 4 header bytes, got {0}")]
  TruncatedHeader(usize),
}

/// Errors from the LZ10/RLE/Delta stream transforms.
#[derive(Debug, Error)]
pub enum TransformError {
  /// Decoder ran out of input bytes mid-token.
  #[error("truncated {transform} stream")]
  Truncated { transform: &'static str },
  /// Decoded length did not match the tag's declared uncompressed size.
  #[error("{transform} decoded size mismatch: expected {expected}, got {actual}")]
  SizeMismatch { transform: &'static str, expected: usize, actual: usize },
}

/// Errors from pipeline stage orchestration.
#[derive(Debug, Error)]
pub enum PipelineError {
  /// A stage changed frame dimensions, violating invariant I3.
  #[error("stage '{stage}' changed frame size from {before:?} to {after:?}")]
  DimensionsChanged { stage: &'static str, before: (u32, u32), after: (u32, u32) },
}

/// Errors from color-indexed operations that require a paletted frame.
#[derive(Debug, Error)]
pub enum QuantizeError {
  /// Operation requires a paletted frame but received a truecolor one.
  #[error("operation '{op}' requires a paletted frame")]
  RequiresPaletted { op: &'static str },
  /// Color map would exceed the 256-entry limit (invariant I5).
  #[error("color map has {0} entries, limit is 256")]
  TooManyColors(usize),
}

/// Errors from container (file) writing.
#[derive(Debug, Error)]
pub enum ContainerError {
  /// A chunk's byte length was not a multiple of 4 (invariant I4).
  #[error("chunk length {0} is not a multiple of 4")]
  Unaligned(usize),
  /// Color map entry count exceeds the header's single byte field.
  #[error("color map entry count {0} exceeds 256")]
  ColorMapTooLarge(usize),
}

/// Aggregated crate error.
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Color(#[from] ColorError),
  #[error(transparent)]
  Block(#[from] BlockError),
  #[error(transparent)]
  Dxtv(#[from] DxtvError),
  #[error(transparent)]
  Adpcm(#[from] AdpcmError),
  #[error(transparent)]
  Transform(#[from] TransformError),
  #[error(transparent)]
  Pipeline(#[from] PipelineError),
  #[error(transparent)]
  Quantize(#[from] QuantizeError),
  #[error(transparent)]
  Container(#[from] ContainerError),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
