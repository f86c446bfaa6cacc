//! DXTV: a block-based lossy video codec for memory-constrained fixed
//! function playback, plus its companion ADPCM audio codec and the
//! LZ10/RLE/Delta stream transforms and container format that wrap them.
//!
//! The pixel/frame pipeline lives in [`frame`] and [`pipeline`]; codecs
//! are [`dxt1`]/[`dxtv`] (video) and [`adpcm`] (audio); [`transforms`]
//! holds the byte-stream compressors; [`container`] writes the file
//! format that ties a sequence of encoded frames together.

pub mod adpcm;
pub mod block;
pub mod color;
pub mod container;
pub mod dxt1;
pub mod dxtv;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod quantize;
pub mod transforms;

pub use error::{Error, Result};
