// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/input.rs - 摄像头输入
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fmt;

use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, url_query};

mod v4l2_source;
pub use self::v4l2_source::{V4l2Source, V4l2SourceError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError};

pub const DEFAULT_CAPTURE_WIDTH: u32 = 1280;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 720;
pub const DEFAULT_CAPTURE_FPS: u32 = 30;
pub const DEFAULT_CAPTURE_DEVICE: &str = "/dev/video0";

/// 视频源：阻塞地产生 BGR 帧
pub trait VideoSource {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 协商后的实际采集参数
  fn format(&self) -> CaptureFormat;
  fn next_frame(&mut self) -> Result<Frame, Self::Error>;
}

/// 打开设备时请求的参数，仅作为提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
  pub device: String,
  pub fourcc: [u8; 4],
  pub width: u32,
  pub height: u32,
  pub fps: u32,
}

impl Default for CaptureConfig {
  fn default() -> Self {
    Self {
      device: DEFAULT_CAPTURE_DEVICE.to_string(),
      fourcc: *b"MJPG",
      width: DEFAULT_CAPTURE_WIDTH,
      height: DEFAULT_CAPTURE_HEIGHT,
      fps: DEFAULT_CAPTURE_FPS,
    }
  }
}

impl CaptureConfig {
  /// 以 URL 路径为设备，查询参数 `width`/`height`/`fps` 覆盖默认值
  pub fn from_url_parts(device: &str, url: &url::Url) -> Self {
    let defaults = CaptureConfig::default();
    Self {
      device: if device.is_empty() || device == "/" {
        defaults.device
      } else {
        device.to_string()
      },
      width: url_query(url, "width").unwrap_or(defaults.width),
      height: url_query(url, "height").unwrap_or(defaults.height),
      fps: url_query(url, "fps").unwrap_or(defaults.fps),
      fourcc: defaults.fourcc,
    }
  }
}

/// 协商结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
  pub width: u32,
  pub height: u32,
  pub fourcc: [u8; 4],
  pub fps: u32,
}

impl fmt::Display for CaptureFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}x{}, fmt:{}, fps:{}",
      self.width,
      self.height,
      String::from_utf8_lossy(&self.fourcc),
      self.fps
    )
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("V4L2 input error: {0}")]
  V4l2SourceError(#[from] V4l2SourceError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  V4l2(V4l2Source),
  #[cfg(feature = "gstreamer_input")]
  GStreamer(GStreamerInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      V4l2Source::SCHEME => Ok(InputWrapper::V4l2(V4l2Source::from_url(url)?)),
      #[cfg(feature = "gstreamer_input")]
      GStreamerInput::SCHEME => Ok(InputWrapper::GStreamer(GStreamerInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl VideoSource for InputWrapper {
  type Error = InputError;

  fn format(&self) -> CaptureFormat {
    match self {
      InputWrapper::V4l2(input) => input.format(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input.format(),
    }
  }

  fn next_frame(&mut self) -> Result<Frame, Self::Error> {
    match self {
      InputWrapper::V4l2(input) => input.next_frame().map_err(InputError::from),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input.next_frame().map_err(InputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capture_config_defaults_match_camera_hints() {
    let config = CaptureConfig::default();
    assert_eq!(config.device, "/dev/video0");
    assert_eq!(&config.fourcc, b"MJPG");
    assert_eq!((config.width, config.height, config.fps), (1280, 720, 30));
  }

  #[test]
  fn capture_config_reads_query_overrides() {
    let url = url::Url::parse("v4l:///dev/video2?width=640&height=480").unwrap();
    let config = CaptureConfig::from_url_parts(url.path(), &url);
    assert_eq!(config.device, "/dev/video2");
    assert_eq!((config.width, config.height, config.fps), (640, 480, 30));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }

  #[test]
  fn capture_format_display() {
    let format = CaptureFormat {
      width: 1280,
      height: 720,
      fourcc: *b"MJPG",
      fps: 30,
    };
    assert_eq!(format.to_string(), "1280x720, fmt:MJPG, fps:30");
  }
}
