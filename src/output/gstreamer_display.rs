// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/output/gstreamer_display.rs - GStreamer 显示窗口
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 显示窗口
//!
//! `gst://window` 打开一个 `autovideosink` 窗口，逐帧推送叠加后的画面。
//! `gst://window?fullscreen=true` 改用全屏的 `waylandsink`，
//! `gst://window?sink=kmssink` 可直接指定 sink 元素。
//! 管道结束（EOS）或窗口被关闭时，`poll_key` 返回取消键。

use std::time::Duration;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, FRAME_CHANNELS, Frame},
  output::{CANCEL_KEY, DisplaySink, InterruptKeys, KeyCode},
  url_query,
};

const DEFAULT_SINK: &str = "autovideosink";
const FULLSCREEN_SINK: &str = "waylandsink fullscreen=true";

fn display_pipeline(url: &Url) -> String {
  let sink = match url_query::<String>(url, "sink") {
    Some(sink) => sink,
    None if url_query::<bool>(url, "fullscreen").unwrap_or(false) => FULLSCREEN_SINK.to_string(),
    None => DEFAULT_SINK.to_string(),
  };
  format!(
    "appsrc name=src is-live=true ! videoconvert ! {} sync=false",
    sink
  )
}

#[derive(Error, Debug)]
pub enum GStreamerDisplayError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("Buffer creation error")]
  BufferCreationError,
}

pub struct GStreamerDisplay {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  bus: gst::Bus,
  /// 已设置到 appsrc 的 (宽, 高, 通道顺序)
  negotiated: Option<(u32, u32, ChannelOrder)>,
  frame_count: u64,
  keys: Option<InterruptKeys>,
}

impl FromUrlWithScheme for GStreamerDisplay {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("window") {
      error!("URI mismatch: expected 'gst://window', found '{}'", url);
      return Err(GStreamerDisplayError::SchemeMismatch);
    }

    gst::init()?;
    let description = display_pipeline(url);
    info!("Creating display pipeline: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| {
        GStreamerDisplayError::PipelineError("Failed to create pipeline".to_string())
      })?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerDisplayError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerDisplayError::AppSrcConversionFailed)?;
    appsrc.set_format(gst::Format::Time);

    let bus = pipeline
      .bus()
      .ok_or_else(|| GStreamerDisplayError::PipelineError("Pipeline has no bus".to_string()))?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerDisplay {
      pipeline,
      appsrc,
      bus,
      negotiated: None,
      frame_count: 0,
      keys: None,
    })
  }
}

impl Drop for GStreamerDisplay {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();

    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer display pipeline: {}", e);
    }

    info!("Display closed. Total frames shown: {}", self.frame_count);
  }
}

impl GStreamerDisplay {
  pub fn with_keys(mut self, keys: InterruptKeys) -> Self {
    self.keys = Some(keys);
    self
  }

  /// 帧尺寸或通道顺序变化时重新设置 caps
  fn ensure_caps(&mut self, frame: &Frame) {
    let current = (frame.width(), frame.height(), frame.order());
    if self.negotiated == Some(current) {
      return;
    }

    let format = match frame.order() {
      ChannelOrder::Rgb => "RGB",
      ChannelOrder::Bgr => "BGR",
    };
    let caps = gst::Caps::builder("video/x-raw")
      .field("format", format)
      .field("width", frame.width() as i32)
      .field("height", frame.height() as i32)
      .field("framerate", gst::Fraction::new(0, 1))
      .build();
    info!(
      "Display caps: {}x{} {}",
      frame.width(),
      frame.height(),
      format
    );
    self.appsrc.set_caps(Some(&caps));
    self.negotiated = Some(current);
  }

  fn push_frame(&mut self, frame: &Frame) -> Result<(), GStreamerDisplayError> {
    // GStreamer 的打包 RGB 格式按 4 字节对齐行宽
    let row_bytes = frame.width() as usize * FRAME_CHANNELS;
    let stride = (row_bytes + 3) & !3;
    let height = frame.height() as usize;
    let data = frame.as_bytes();

    let mut buffer = gst::Buffer::with_size(stride * height)
      .map_err(|_| GStreamerDisplayError::BufferCreationError)?;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerDisplayError::BufferCreationError)?;
      let mut buffer_map = buffer_ref.map_writable().map_err(|_| {
        GStreamerDisplayError::PipelineError("Failed to map buffer".to_string())
      })?;
      if stride == row_bytes {
        buffer_map.copy_from_slice(data);
      } else {
        for (dst, src) in buffer_map
          .chunks_exact_mut(stride)
          .zip(data.chunks_exact(row_bytes))
        {
          dst[..row_bytes].copy_from_slice(src);
        }
      }
    }

    self.frame_count += 1;
    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerDisplayError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;

    Ok(())
  }
}

impl DisplaySink for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn present(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    self.ensure_caps(frame);
    self.push_frame(frame)
  }

  fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyCode>, Self::Error> {
    while let Some(message) = self
      .bus
      .pop_filtered(&[gst::MessageType::Eos, gst::MessageType::Error])
    {
      match message.view() {
        gst::MessageView::Eos(..) => {
          info!("显示管道结束");
          return Ok(Some(CANCEL_KEY));
        }
        gst::MessageView::Error(err) => {
          // 视频窗口被关闭时 sink 报告 NotFound 资源错误
          if err.error().matches(gst::ResourceError::NotFound) {
            info!("显示窗口已关闭");
            return Ok(Some(CANCEL_KEY));
          }
          error!(
            "显示管道错误: {} ({:?})",
            err.error(),
            err.debug()
          );
          return Err(GStreamerDisplayError::PipelineError(err.error().to_string()));
        }
        _ => {}
      }
    }

    match &self.keys {
      Some(keys) => Ok(keys.poll(timeout)),
      None => {
        std::thread::sleep(timeout);
        Ok(None)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_window_host_is_accepted() {
    let url = Url::parse("gst://camera/dev/video0").unwrap();
    assert!(matches!(
      GStreamerDisplay::from_url(&url),
      Err(GStreamerDisplayError::SchemeMismatch)
    ));
    let url = Url::parse("image:///tmp/out.png").unwrap();
    assert!(matches!(
      GStreamerDisplay::from_url(&url),
      Err(GStreamerDisplayError::SchemeMismatch)
    ));
  }

  #[test]
  fn window_sink_follows_query() {
    let url = Url::parse("gst://window").unwrap();
    assert_eq!(
      display_pipeline(&url),
      "appsrc name=src is-live=true ! videoconvert ! autovideosink sync=false"
    );

    let url = Url::parse("gst://window?fullscreen=true").unwrap();
    assert!(display_pipeline(&url).ends_with("! waylandsink fullscreen=true sync=false"));

    let url = Url::parse("gst://window?fullscreen=false").unwrap();
    assert!(display_pipeline(&url).ends_with("! autovideosink sync=false"));

    let url = Url::parse("gst://window?sink=kmssink&fullscreen=true").unwrap();
    assert!(display_pipeline(&url).ends_with("! kmssink sync=false"));
  }
}
