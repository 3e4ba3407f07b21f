// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/output/save_image_file.rs - 预览图像文件输出
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

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::{DisplaySink, InterruptKeys, KeyCode},
  url_path, url_query,
};

/// 无窗口环境下的显示替代：每 N 帧覆盖写入同一张预览图
pub struct SaveImageFileOutput {
  path: PathBuf,
  every: u64,
  presented: u64,
  keys: Option<InterruptKeys>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的保存路径: {0}")]
  InvalidPath(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = url_path(uri);
    if path.is_empty() || path.ends_with('/') {
      return Err(SaveImageFileError::InvalidPath(path));
    }

    Ok(SaveImageFileOutput::new(
      path,
      url_query::<u64>(uri, "every").unwrap_or(1),
    ))
  }
}

impl SaveImageFileOutput {
  pub fn new<P: Into<PathBuf>>(path: P, every: u64) -> Self {
    Self {
      path: path.into(),
      every: every.max(1),
      presented: 0,
      keys: None,
    }
  }

  pub fn with_keys(mut self, keys: InterruptKeys) -> Self {
    self.keys = Some(keys);
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    debug!("保存预览图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl DisplaySink for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn present(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    let due = self.presented % self.every == 0;
    self.presented += 1;
    if due {
      self.save_image(frame.to_rgb_image())?;
    }
    Ok(())
  }

  fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyCode>, Self::Error> {
    Ok(self.keys.as_ref().and_then(|keys| keys.poll(timeout)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::ChannelOrder;

  fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
      .join(format!("shuofeng-preview-{}", std::process::id()))
      .join(name)
  }

  #[test]
  fn preview_is_written_in_rgb_order() {
    let path = temp_path("order.png");
    let mut output = SaveImageFileOutput::new(&path, 1);
    let frame = Frame::from_raw(2, 1, ChannelOrder::Bgr, vec![255, 0, 0, 0, 0, 255]).unwrap();
    output.present(&frame).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.get_pixel(0, 0).0, [0, 0, 255]);
    assert_eq!(saved.get_pixel(1, 0).0, [255, 0, 0]);
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn every_controls_write_rate() {
    let path = temp_path("every.png");
    let _ = std::fs::remove_file(&path);
    let mut output = SaveImageFileOutput::new(&path, 3);
    let frame = Frame::from_raw(1, 1, ChannelOrder::Bgr, vec![1, 2, 3]).unwrap();

    output.present(&frame).unwrap();
    assert!(path.exists());
    std::fs::remove_file(&path).unwrap();
    output.present(&frame).unwrap();
    output.present(&frame).unwrap();
    assert!(!path.exists());
    output.present(&frame).unwrap();
    assert!(path.exists());
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn url_query_sets_rate() {
    let url = Url::parse("image:///tmp/shuofeng/preview.png?every=5").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), Path::new("/tmp/shuofeng/preview.png"));
    assert_eq!(output.every, 5);
  }

  #[test]
  fn directory_path_is_rejected() {
    let url = Url::parse("image:///tmp/").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::InvalidPath(_))
    ));
  }

  #[test]
  fn no_keys_means_no_cancel() {
    let mut output = SaveImageFileOutput::new(temp_path("keys.png"), 1);
    assert_eq!(output.poll_key(Duration::from_millis(1)).unwrap(), None);
  }
}
