// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 摄像头输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 摄像头输入
//!
//! 通过 `v4l2src` 读取摄像头，在管道内完成 MJPG 解码与 BGR 转换，
//! 由 appsink 交付帧。
//!
//! URL 形如 `gst://camera/dev/video0?width=1280&height=720&fps=30&format=MJPG`，
//! 省略的参数取默认值。`format` 可选 `MJPG` 或 `YUYV`。
//!
//! 使用前需要安装 GStreamer 开发库：
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use super::{CaptureConfig, CaptureFormat, VideoSource};
use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, FRAME_CHANNELS, Frame},
  url_path, url_query,
};

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://camera"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  #[error("Unsupported video format")]
  UnsupportedFormat,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("End of stream")]
  EndOfStream,
}

/// 管道片段，依次用 `!` 连接
enum GStreamerInputBuilderItem {
  CameraSource(String),
  JpegCaps { width: u32, height: u32, fps: u32 },
  RawCaps { width: u32, height: u32, fps: u32 },
  JpegDecode,
  TargetFormat,
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::CameraSource(device) => format!("v4l2src device={}", device),
      GStreamerInputBuilderItem::JpegCaps { width, height, fps } => {
        preferred_caps("image/jpeg", *width, *height, *fps)
      }
      GStreamerInputBuilderItem::RawCaps { width, height, fps } => {
        preferred_caps("video/x-raw,format=YUY2", *width, *height, *fps)
      }
      GStreamerInputBuilderItem::JpegDecode => "jpegdec".to_string(),
      GStreamerInputBuilderItem::TargetFormat => "videoconvert ! video/x-raw,format=BGR".to_string(),
    }
  }
}

/// 尺寸与帧率只作为首选项，摄像头不支持时退回到同一格式的任意取值
fn preferred_caps(media: &str, width: u32, height: u32, fps: u32) -> String {
  format!(
    "capsfilter caps=\"{media},width={width},height={height},framerate={fps}/1;{media}\""
  )
}

/// GStreamer 摄像头管道构建器
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
}

impl GStreamerInputPipelineBuilder {
  pub fn camera(config: &CaptureConfig) -> Self {
    let (width, height, fps) = (config.width, config.height, config.fps);
    let mut items = vec![GStreamerInputBuilderItem::CameraSource(
      config.device.clone(),
    )];
    if &config.fourcc == b"YUYV" {
      items.push(GStreamerInputBuilderItem::RawCaps { width, height, fps });
    } else {
      items.push(GStreamerInputBuilderItem::JpegCaps { width, height, fps });
      items.push(GStreamerInputBuilderItem::JpegDecode);
    }
    items.push(GStreamerInputBuilderItem::TargetFormat);
    Self { items }
  }

  pub fn description(&self) -> String {
    let basic_pipeline = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    format!(
      "{} ! appsink max-buffers=2 drop=true name=sink",
      basic_pipeline
    )
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let description = self.description();
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    let mut input = GStreamerInput {
      pipeline,
      appsink,
      format: CaptureFormat {
        width: 0,
        height: 0,
        fourcc: *b"BGR3",
        fps: 0,
      },
      pending: None,
    };

    // 取出第一帧以得到协商后的 caps，该帧稍后照常交付
    let first = input.pull_sample()?;
    let caps = first
      .caps()
      .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;
    let video_info =
      gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
    let fps = video_info.fps();
    input.format = CaptureFormat {
      width: video_info.width(),
      height: video_info.height(),
      fourcc: *b"BGR3",
      fps: if fps.denom() > 0 {
        (fps.numer() / fps.denom()) as u32
      } else {
        0
      },
    };
    info!("GStreamer 摄像头协商结果: {}", input.format);
    input.pending = Some(first);

    Ok(input)
  }
}

/// GStreamer 摄像头输入
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  format: CaptureFormat,
  pending: Option<gst::Sample>,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerInput {
  fn pull_sample(&self) -> Result<gst::Sample, GStreamerInputError> {
    self.appsink.pull_sample().map_err(|e| {
      if self.appsink.is_eos() {
        GStreamerInputError::EndOfStream
      } else {
        error!("Failed to pull sample: {}", e);
        GStreamerInputError::PipelineError(format!("Failed to pull sample: {}", e))
      }
    })
  }
}

impl VideoSource for GStreamerInput {
  type Error = GStreamerInputError;

  fn format(&self) -> CaptureFormat {
    self.format
  }

  fn next_frame(&mut self) -> Result<Frame, Self::Error> {
    let sample = match self.pending.take() {
      Some(sample) => sample,
      None => self.pull_sample()?,
    };
    convert_sample_to_frame(&sample)
  }
}

impl FromUrl for GStreamerInput {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("camera") {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let mut config = CaptureConfig::from_url_parts(&url_path(url), url);
    if let Some(format) = url_query::<String>(url, "format") {
      match format.as_str() {
        "MJPG" => config.fourcc = *b"MJPG",
        "YUYV" => config.fourcc = *b"YUYV",
        _ => return Err(GStreamerInputError::UnsupportedFormat),
      }
    }

    GStreamerInputPipelineBuilder::camera(&config).build()
  }
}

impl FromUrlWithScheme for GStreamerInput {
  const SCHEME: &'static str = "gst";
}

fn convert_sample_to_frame(sample: &gst::Sample) -> Result<Frame, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
  if video_info.format() != gst_video::VideoFormat::Bgr {
    return Err(GStreamerInputError::UnsupportedFormat);
  }

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;
  let row_bytes = width * FRAME_CHANNELS;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected_size = stride * height.saturating_sub(1) + row_bytes;
  if height == 0 || data.len() < expected_size {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  // 行尾可能有对齐填充，逐行拷贝
  let mut pixels = Vec::with_capacity(row_bytes * height);
  for row in 0..height {
    let start = row * stride;
    pixels.extend_from_slice(&data[start..start + row_bytes]);
  }

  Frame::from_raw(
    width as u32,
    height as u32,
    ChannelOrder::Bgr,
    pixels,
  )
  .ok_or(GStreamerInputError::BufferSizeMismatch {
    expected: row_bytes * height,
    actual: data.len(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mjpg_camera_pipeline_description() {
    let config = CaptureConfig::default();
    let description = GStreamerInputPipelineBuilder::camera(&config).description();
    assert_eq!(
      description,
      "v4l2src device=/dev/video0 \
       ! capsfilter caps=\"image/jpeg,width=1280,height=720,framerate=30/1;image/jpeg\" \
       ! jpegdec ! videoconvert ! video/x-raw,format=BGR ! appsink max-buffers=2 drop=true name=sink"
    );
  }

  #[test]
  fn yuyv_camera_pipeline_skips_decoder() {
    let config = CaptureConfig {
      fourcc: *b"YUYV",
      width: 640,
      height: 480,
      ..CaptureConfig::default()
    };
    let description = GStreamerInputPipelineBuilder::camera(&config).description();
    assert!(description.contains("video/x-raw,format=YUY2,width=640,height=480"));
    assert!(!description.contains("jpegdec"));
  }

  #[test]
  fn capture_hints_fall_back_to_any_size_and_rate() {
    let config = CaptureConfig {
      width: 1920,
      height: 1080,
      fps: 60,
      ..CaptureConfig::default()
    };
    let description = GStreamerInputPipelineBuilder::camera(&config).description();
    assert!(description.contains("image/jpeg,width=1920,height=1080,framerate=60/1;image/jpeg\""));

    let config = CaptureConfig {
      fourcc: *b"YUYV",
      ..config
    };
    let description = GStreamerInputPipelineBuilder::camera(&config).description();
    assert!(description.contains(";video/x-raw,format=YUY2\" ! videoconvert"));
  }

  #[test]
  fn non_camera_host_is_rejected() {
    let url = Url::parse("gst://file/tmp/video.mp4").unwrap();
    assert!(matches!(
      GStreamerInput::from_url(&url),
      Err(GStreamerInputError::SchemeMismatch)
    ));
  }

  #[test]
  fn unknown_format_is_rejected() {
    let url = Url::parse("gst://camera/dev/video0?format=H264").unwrap();
    assert!(matches!(
      GStreamerInput::from_url(&url),
      Err(GStreamerInputError::UnsupportedFormat)
    ));
  }
}
