// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/output.rs - 显示输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::frame::Frame;
use crate::{FromUrl, FromUrlWithScheme};

pub mod draw;
mod keys;
pub use self::keys::InterruptKeys;

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "gstreamer_output")]
mod gstreamer_display;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_display::{GStreamerDisplay, GStreamerDisplayError};

/// 按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
  Escape,
  Char(char),
}

/// 结束循环的按键
pub const CANCEL_KEY: KeyCode = KeyCode::Escape;

/// 显示窗口：呈现一帧，并在给定时间内等待按键
pub trait DisplaySink {
  type Error: std::error::Error + Send + Sync + 'static;

  fn present(&mut self, frame: &Frame) -> Result<(), Self::Error>;
  fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyCode>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 显示错误: {0}")]
  GStreamerDisplayError(#[from] GStreamerDisplayError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "gstreamer_output")]
  GStreamerDisplay(GStreamerDisplay),
}

impl OutputWrapper {
  /// 接入 Ctrl-C 等外部中断，作为取消键交付
  pub fn with_keys(self, keys: InterruptKeys) -> Self {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_keys(keys))
      }
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => {
        OutputWrapper::GStreamerDisplay(output.with_keys(keys))
      }
    }
  }
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "gstreamer_output")]
      GStreamerDisplay::SCHEME => {
        let output = GStreamerDisplay::from_url(url)?;
        Ok(OutputWrapper::GStreamerDisplay(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl DisplaySink for OutputWrapper {
  type Error = OutputError;

  fn present(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output.present(frame).map_err(OutputError::from),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => output.present(frame).map_err(OutputError::from),
    }
  }

  fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyCode>, Self::Error> {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => {
        output.poll_key(timeout).map_err(OutputError::from)
      }
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => output.poll_key(timeout).map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_display_scheme_is_rejected() {
    let url = Url::parse("rtsp://0.0.0.0:8554/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }

  #[test]
  fn image_scheme_selects_preview_file() {
    let url = Url::parse("image:///tmp/shuofeng-test-preview.png").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::SaveImageFileOutput(_))
    ));
  }
}
