//! DXTV stream encoder CLI.
//!
//! Takes an ordered list of image paths plus an optional WAV audio
//! track, runs them through the pipeline stages selected by flags, and
//! writes out a container file. Per-stage flags map one-to-one onto
//! `pipeline::Stage`s, the same "one flag, one option struct" shape as
//! the original's `ProcessingOptions`.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use dxtv::adpcm::Adpcm;
use dxtv::color::Rgb;
use dxtv::container::ContainerWriter;
use dxtv::dxtv as dxtv_codec;
use dxtv::error::Result;
use dxtv::frame::{ColorFormat, Frame};
use dxtv::quantize;
use dxtv::transforms::{self, OutputWidth};

#[derive(Parser)]
#[command(name = "dxtvenc")]
#[command(author, version, about = "Encode an image sequence into a DXTV container file", long_about = None)]
struct Cli {
  /// Ordered input image paths, one per frame.
  #[arg(required = true)]
  inputs: Vec<PathBuf>,

  /// Output container file path.
  #[arg(short, long)]
  output: PathBuf,

  /// Frame rate stored in the file header.
  #[arg(long, default_value_t = 30)]
  fps: u8,

  /// DXTV block-error threshold, in the user-facing [0.01, 1.0] range.
  #[arg(long, default_value_t = 0.1)]
  max_block_error: f64,

  /// Convert images to paletted color with N colors using NeuQuant
  /// quantization. N must be in [2, 256].
  #[arg(long, value_name = "N")]
  palette: Option<usize>,

  /// Build one shared palette across every frame instead of one per frame.
  #[arg(long, requires = "palette")]
  common_palette: bool,

  /// Reduce bit depth of palette indices to 4 bit.
  #[arg(long)]
  prune: bool,

  /// 8-bit delta encoding of the final frame bytes.
  #[arg(long)]
  delta8: bool,

  /// 16-bit delta encoding of the final frame bytes.
  #[arg(long)]
  delta16: bool,

  /// LZ compression variant 10 of the final frame bytes.
  #[arg(long)]
  lz10: bool,

  /// Make compression VRAM-safe (pad every transform's output to an
  /// even byte length).
  #[arg(long)]
  vram: bool,

  /// Optional WAV audio track, ADPCM-encoded alongside the video.
  #[arg(long)]
  audio: Option<PathBuf>,

  /// Where to write the ADPCM-encoded audio track (required with --audio).
  #[arg(long, requires = "audio")]
  audio_output: Option<PathBuf>,
}

fn output_width(vram: bool) -> OutputWidth {
  if vram {
    OutputWidth::Bit16
  } else {
    OutputWidth::Bit8
  }
}

fn load_frame(path: &PathBuf) -> Result<(Vec<Rgb>, u32, u32)> {
  let img = image::open(path).map_err(|e| std::io::Error::other(e.to_string()))?.to_rgb8();
  let (width, height) = img.dimensions();
  let pixels = img.pixels().map(|p| Rgb::from_rgb888([p[0], p[1], p[2]])).collect();
  Ok((pixels, width, height))
}

/// Applies the byte-stream transform flags, in the fixed `Delta -> LZ10`
/// order matching a typical decode-reverse pipeline (LZ10 compresses
/// best last, since delta output is closer to random noise on its own
/// but exposes repetition LZ10 can exploit after differencing removes
/// the low-order structure delta was meant to catch).
fn apply_transforms(cli: &Cli, bytes: Vec<u8>) -> Vec<u8> {
  let width = output_width(cli.vram);
  let mut data = bytes;
  if cli.delta16 {
    let samples: Vec<u16> = data.chunks(2).map(|c| u16::from_le_bytes([c[0], c.get(1).copied().unwrap_or(0)])).collect();
    data = transforms::delta16_encode(&samples, width);
  } else if cli.delta8 {
    data = transforms::delta8_encode(&data, width);
  }
  if cli.lz10 {
    data = transforms::lz10_encode(&data, width);
  }
  data
}

fn encode_video(cli: &Cli) -> Result<(ContainerWriter, u32, u32)> {
  log::info!("dxtvenc: loading {} frame(s)", cli.inputs.len());
  let loaded: Vec<(Vec<Rgb>, u32, u32)> = cli.inputs.iter().map(load_frame).collect::<Result<_>>()?;
  let (width, height) = (loaded[0].1, loaded[0].2);

  let (paletted_frames, color_map) = match cli.palette {
    Some(max_colors) if cli.common_palette => {
      let pixel_sets: Vec<Vec<Rgb>> = loaded.iter().map(|(pixels, _, _)| pixels.clone()).collect();
      let (frames, color_map) = quantize::quantize_common_palette(&pixel_sets, width, height, max_colors)?;
      (Some(frames), Some(color_map))
    }
    Some(max_colors) => {
      let mut frames = Vec::with_capacity(loaded.len());
      let mut last_map = None;
      for (pixels, w, h) in &loaded {
        let (frame, color_map) = quantize::quantize_frame(pixels, *w, *h, max_colors)?;
        last_map = Some(color_map);
        frames.push(frame);
      }
      (Some(frames), last_map)
    }
    None => (None, None),
  };

  let paletted_frames = if cli.prune {
    paletted_frames.map(|frames| frames.iter().map(quantize::prune_indices).collect::<Result<Vec<_>>>()).transpose()?
  } else {
    paletted_frames
  };

  let bits_per_pixel = paletted_frames.as_ref().map(|f| f[0].format.bits_per_pixel() as u8).unwrap_or(16);
  let (bits_per_color, color_map_entries) = match &color_map {
    Some(m) => (m.format.bits_per_color() as u8, m.colors.len() as u8),
    None => (0, 0),
  };

  let mut writer = ContainerWriter::new(loaded.len() as u32, width as u16, height as u16, cli.fps, bits_per_pixel, bits_per_color, color_map_entries);

  let color_map_to_bytes = |m: &dxtv::frame::ColorMap| -> Vec<u8> {
    let mut out = Vec::with_capacity(m.colors.len() * (m.format.bits_per_color() as usize / 8));
    for c in &m.colors {
      match m.format {
        ColorFormat::Rgb555 | ColorFormat::Rgb565 => out.extend_from_slice(&c.to_rgb555().to_le_bytes()),
        ColorFormat::Rgb888 => {
          out.push((c.r * 255.0).round() as u8);
          out.push((c.g * 255.0).round() as u8);
          out.push((c.b * 255.0).round() as u8);
        }
      }
    }
    out
  };
  // In common-palette mode every frame shares `color_map`; otherwise each
  // frame carries its own map (`quantize_frame` ran once per frame above),
  // so the bytes written per record must come from that frame, not a
  // single map borrowed from whichever frame quantized last.
  let shared_color_map_bytes: Option<Vec<u8>> = if cli.common_palette { color_map.as_ref().map(&color_map_to_bytes) } else { None };

  let mut previous: Option<Vec<u16>> = None;
  for (index, (pixels, w, h)) in loaded.iter().enumerate() {
    let frame_bytes = if let Some(frames) = &paletted_frames {
      let frame: &Frame = &frames[index];
      apply_transforms(cli, frame.data.clone())
    } else {
      let rgb555: Vec<u16> = pixels.iter().map(|p| p.to_rgb555()).collect();
      let key_frame = index == 0;
      let (encoded, reconstructed, stats) = dxtv_codec::encode_frame(&rgb555, previous.as_deref(), *w, *h, key_frame, cli.max_block_error)?;
      log::debug!("dxtvenc: frame {index}: {} ref block(s), {} dxt block(s)", stats.ref_blocks, stats.dxt_blocks);
      previous = Some(reconstructed);
      apply_transforms(cli, encoded)
    };
    let mut padded = frame_bytes;
    while padded.len() % 4 != 0 {
      padded.push(0);
    }
    let frame_color_map_bytes = match (&shared_color_map_bytes, &paletted_frames) {
      (Some(bytes), _) => Some(bytes.clone()),
      (None, Some(frames)) => frames[index].color_map.as_ref().map(&color_map_to_bytes),
      (None, None) => None,
    };
    writer.write_frame(&padded, frame_color_map_bytes.as_deref(), padded.len() as u32)?;
  }

  Ok((writer, width, height))
}

fn encode_audio(path: &PathBuf, output_path: &PathBuf) -> Result<()> {
  let mut reader = hound::WavReader::open(path).map_err(|e| std::io::Error::other(e.to_string()))?;
  let spec = reader.spec();
  let channels = spec.channels as u32;
  let samples: Vec<i16> = reader
    .samples::<i16>()
    .collect::<std::result::Result<_, _>>()
    .map_err(|e: hound::Error| std::io::Error::other(e.to_string()))?;

  let mut codec = Adpcm::new(channels)?;
  let encoded = codec.encode(&samples)?;
  fs::write(output_path, encoded)?;
  log::info!("dxtvenc: wrote {} ADPCM bytes to {}", encoded.len(), output_path.display());
  Ok(())
}

fn run(cli: Cli) -> Result<()> {
  if cli.prune && cli.palette.is_none() {
    log::warn!("dxtvenc: --prune has no effect without --palette");
  }

  let (writer, width, height) = encode_video(&cli)?;
  let file = writer.finalize();
  fs::write(&cli.output, &file)?;
  log::info!("dxtvenc: wrote {} bytes ({} frame(s), {}x{}) to {}", file.len(), cli.inputs.len(), width, height, cli.output.display());

  if let (Some(audio_path), Some(audio_output)) = (&cli.audio, &cli.audio_output) {
    encode_audio(audio_path, audio_output)?;
  }

  Ok(())
}

fn main() {
  env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
  let cli = Cli::parse();
  if let Err(e) = run(cli) {
    log::error!("dxtvenc: {e}");
    std::process::exit(1);
  }
}
