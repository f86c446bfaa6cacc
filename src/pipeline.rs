//! Ordered pipeline of processing stages, each one of four shapes.
//!
//! Grounded on `examples/original_source/src/image/processingtype.h`
//! (the tag enumeration) and `examples/original_source/processingoptions.cpp`
//! (stage parameter bags and the decode-relevant/add-statistics flags).
//! The teacher repo has no direct analogue (single-pass AV1 encoding
//! has no stage pipeline); the stage dispatch follows the same
//! "each stage owns its slice of work, driver owns sequencing" shape as
//! the teacher's frame-to-frame encode loop.

use crate::error::Result;
use crate::frame::Frame;

/// Tag enumeration from §6; values match the original's
/// `Image::ProcessingType` byte values exactly since they are written
/// into the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessingType {
  Uncompressed = 0,
  BlackWhite = 10,
  Paletted = 11,
  Truecolor = 12,
  CommonPalette = 14,
  Tiles = 20,
  Sprites = 21,
  TileMap = 22,
  AddColor0 = 30,
  MoveColor0 = 31,
  ReorderColors = 32,
  ShiftIndices = 40,
  PruneIndices = 41,
  Delta8 = 50,
  Delta16 = 51,
  DeltaImage = 55,
  Lz10 = 60,
  Rle = 65,
  Dxt = 70,
  Dxtv = 71,
  Gvid = 72,
}

type ConvertFn = Box<dyn FnMut(Frame) -> Result<Frame>>;
type ConvertStateFn = Box<dyn FnMut(Frame, &mut Vec<u8>) -> Result<Frame>>;
type BatchConvertFn = Box<dyn FnMut(Vec<Frame>) -> Result<Vec<Frame>>>;
type ReduceFn = Box<dyn FnMut(Vec<Frame>) -> Result<Frame>>;

enum StageBody {
  Convert(ConvertFn),
  ConvertState(ConvertStateFn),
  BatchConvert(BatchConvertFn),
  Reduce(ReduceFn),
}

/// One pipeline stage: a processing-type tag, the two decoder-facing
/// flags, retained per-stage state, and the operation itself.
pub struct Stage {
  pub processing_type: ProcessingType,
  pub decode_relevant: bool,
  pub add_statistics: bool,
  state: Vec<u8>,
  body: StageBody,
}

impl Stage {
  pub fn convert(processing_type: ProcessingType, decode_relevant: bool, f: impl FnMut(Frame) -> Result<Frame> + 'static) -> Self {
    Self { processing_type, decode_relevant, add_statistics: false, state: Vec::new(), body: StageBody::Convert(Box::new(f)) }
  }

  pub fn convert_state(processing_type: ProcessingType, decode_relevant: bool, f: impl FnMut(Frame, &mut Vec<u8>) -> Result<Frame> + 'static) -> Self {
    Self { processing_type, decode_relevant, add_statistics: false, state: Vec::new(), body: StageBody::ConvertState(Box::new(f)) }
  }

  pub fn batch_convert(processing_type: ProcessingType, decode_relevant: bool, f: impl FnMut(Vec<Frame>) -> Result<Vec<Frame>> + 'static) -> Self {
    Self { processing_type, decode_relevant, add_statistics: false, state: Vec::new(), body: StageBody::BatchConvert(Box::new(f)) }
  }

  pub fn reduce(processing_type: ProcessingType, decode_relevant: bool, f: impl FnMut(Vec<Frame>) -> Result<Frame> + 'static) -> Self {
    Self { processing_type, decode_relevant, add_statistics: false, state: Vec::new(), body: StageBody::Reduce(Box::new(f)) }
  }

  pub fn with_statistics(mut self) -> Self {
    self.add_statistics = true;
    self
  }

  pub fn state(&self) -> &[u8] {
    &self.state
  }
}

/// The ordered stage list. Owns each stage's persistent state for the
/// lifetime of the pipeline, exactly as §9's "model this as a per-stage
/// byte buffer held by the pipeline" calls for.
pub struct Pipeline {
  stages: Vec<Stage>,
}

impl Pipeline {
  pub fn new(stages: Vec<Stage>) -> Self {
    Self { stages }
  }

  pub fn stages(&self) -> &[Stage] {
    &self.stages
  }

  /// Runs every stage over the whole batch, supporting all four shapes.
  /// `Convert`/`ConvertState` apply per-frame, preserving frame count;
  /// `BatchConvert` replaces the batch with its own N-frame output;
  /// `Reduce` collapses the batch to a single frame.
  pub fn process_batch(&mut self, frames: Vec<Frame>) -> Result<Vec<Frame>> {
    let mut current = frames;
    for stage in &mut self.stages {
      log::debug!("pipeline: running stage {:?} over {} frame(s)", stage.processing_type, current.len());
      current = match &mut stage.body {
        StageBody::Convert(f) => current.into_iter().map(|frame| f(frame)).collect::<Result<Vec<_>>>()?,
        StageBody::ConvertState(f) => current.into_iter().map(|frame| f(frame, &mut stage.state)).collect::<Result<Vec<_>>>()?,
        StageBody::BatchConvert(f) => f(current)?,
        StageBody::Reduce(f) => vec![f(current)?],
      };
    }
    Ok(current)
  }

  /// Processes one frame, silently skipping `BatchConvert`/`Reduce`
  /// stages since they need the whole stream at once.
  pub fn process_stream(&mut self, frame: Frame) -> Result<Frame> {
    let mut current = frame;
    for stage in &mut self.stages {
      current = match &mut stage.body {
        StageBody::Convert(f) => f(current)?,
        StageBody::ConvertState(f) => f(current, &mut stage.state)?,
        StageBody::BatchConvert(_) | StageBody::Reduce(_) => {
          log::debug!("pipeline: skipping batch-shaped stage {:?} in process_stream", stage.processing_type);
          current
        }
      };
    }
    Ok(current)
  }

  /// Decode-relevant stages, reversed: the sequence an on-device
  /// decoder must execute to undo encoding.
  pub fn decoding_steps(&self) -> Vec<ProcessingType> {
    self.stages.iter().filter(|s| s.decode_relevant).rev().map(|s| s.processing_type).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::PixelFormat;

  fn dummy_frame() -> Frame {
    Frame::new(8, 8, PixelFormat::Rgb555, vec![0; 8 * 8 * 2]).unwrap()
  }

  #[test]
  fn decoding_steps_are_reversed_and_filtered() {
    let pipeline = Pipeline::new(vec![
      Stage::convert(ProcessingType::Delta8, true, Ok),
      Stage::convert(ProcessingType::Lz10, true, Ok),
    ]);
    assert_eq!(pipeline.decoding_steps(), vec![ProcessingType::Lz10, ProcessingType::Delta8]);
  }

  #[test]
  fn non_decode_relevant_stages_are_excluded() {
    let pipeline = Pipeline::new(vec![
      Stage::convert(ProcessingType::Delta8, true, Ok),
      Stage::convert(ProcessingType::Tiles, false, Ok),
    ]);
    assert_eq!(pipeline.decoding_steps(), vec![ProcessingType::Delta8]);
  }

  #[test]
  fn process_stream_skips_batch_and_reduce_stages() {
    let mut pipeline = Pipeline::new(vec![
      Stage::convert(ProcessingType::Delta8, true, Ok),
      Stage::reduce(ProcessingType::CommonPalette, false, |frames: Vec<Frame>| Ok(frames.into_iter().next().unwrap())),
    ]);
    let out = pipeline.process_stream(dummy_frame()).unwrap();
    assert_eq!(out.dimensions(), (8, 8));
  }

  #[test]
  fn process_batch_reduce_collapses_to_one_frame() {
    let mut pipeline = Pipeline::new(vec![Stage::reduce(ProcessingType::CommonPalette, false, |frames: Vec<Frame>| {
      Ok(frames.into_iter().next().unwrap())
    })]);
    let out = pipeline.process_batch(vec![dummy_frame(), dummy_frame(), dummy_frame()]).unwrap();
    assert_eq!(out.len(), 1);
  }

  #[test]
  fn convert_state_persists_state_across_frames() {
    let mut pipeline = Pipeline::new(vec![Stage::convert_state(ProcessingType::Dxtv, true, |frame: Frame, state: &mut Vec<u8>| {
      state.push(state.len() as u8);
      Ok(frame)
    })]);
    pipeline.process_stream(dummy_frame()).unwrap();
    pipeline.process_stream(dummy_frame()).unwrap();
    assert_eq!(pipeline.stages()[0].state(), &[0, 1]);
  }
}
