// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io;
use std::pin::Pin;

use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;

use super::{CaptureConfig, CaptureFormat, VideoSource};
use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, Frame},
  url_path,
};

const V4L2_BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4l2SourceError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("Cannot open camera {device}: {source}")]
  Open { device: String, source: io::Error },
  #[error("Cannot negotiate capture format: {0}")]
  Format(io::Error),
  #[error("Cannot create capture stream: {0}")]
  Stream(io::Error),
  #[error("Cannot capture frame: {0}")]
  Capture(io::Error),
  #[error("Cannot decode MJPG frame: {0}")]
  Decode(#[from] image::ImageError),
  #[error("Unsupported pixel format: {0}")]
  UnsupportedFormat(String),
  #[error("Frame size mismatch: expected {expected} bytes, got {actual} bytes")]
  FrameSize { expected: usize, actual: usize },
}

/// V4L2 摄像头输入源
///
/// 由于 v4l 库的 Stream 需要引用 Device，我们使用 Pin<Box<Device>> 来保证
/// Device 的内存地址稳定，从而可以安全地创建引用它的 Stream。
pub struct V4l2Source {
  /// 捕获流（生命周期与 device 关联，必须先于 device 释放）
  stream: Option<Stream<'static>>,
  device: Pin<Box<Device>>,
  format: CaptureFormat,
  frame_index: u64,
}

impl V4l2Source {
  /// 打开摄像头，请求的宽高、像素格式与帧率只是提示，实际值以驱动协商结果为准
  pub fn open(config: &CaptureConfig) -> Result<Self, V4l2SourceError> {
    let device = Box::pin(
      Device::with_path(&config.device).map_err(|source| V4l2SourceError::Open {
        device: config.device.clone(),
        source,
      })?,
    );

    let mut format = device.format().map_err(V4l2SourceError::Format)?;
    format.width = config.width;
    format.height = config.height;
    format.fourcc = FourCC::new(&config.fourcc);
    let format = device.set_format(&format).map_err(V4l2SourceError::Format)?;

    let fps = match device.set_params(&Parameters::with_fps(config.fps)) {
      Ok(params) if params.interval.numerator > 0 => {
        params.interval.denominator / params.interval.numerator
      }
      Ok(_) => config.fps,
      Err(e) => {
        warn!("无法设置帧率 {}: {}", config.fps, e);
        config.fps
      }
    };

    let negotiated = CaptureFormat {
      width: format.width,
      height: format.height,
      fourcc: format.fourcc.repr,
      fps,
    };
    info!("摄像头 {} 协商结果: {}", config.device, negotiated);
    if negotiated.width != config.width || negotiated.height != config.height {
      warn!(
        "请求 {}x{}，驱动返回 {}x{}",
        config.width, config.height, negotiated.width, negotiated.height
      );
    }

    let mut source = Self {
      stream: None,
      device,
      format: negotiated,
      frame_index: 0,
    };

    // SAFETY: device 被 Pin<Box> 固定在堆上，不会移动；
    // stream 在 Drop 中先于 device 被释放
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, V4L2_BUFFER_COUNT)
        .map_err(V4l2SourceError::Stream)?
    };

    source.stream = Some(stream);
    Ok(source)
  }
}

impl Drop for V4l2Source {
  fn drop(&mut self) {
    // 确保 stream 在 device 之前被 drop
    self.stream.take();
  }
}

impl VideoSource for V4l2Source {
  type Error = V4l2SourceError;

  fn format(&self) -> CaptureFormat {
    self.format
  }

  fn next_frame(&mut self) -> Result<Frame, Self::Error> {
    let stream = self.stream.as_mut().ok_or_else(|| {
      V4l2SourceError::Stream(io::Error::new(io::ErrorKind::NotConnected, "stream closed"))
    })?;

    let (buffer, meta) = stream.next().map_err(V4l2SourceError::Capture)?;
    let used = (meta.bytesused as usize).min(buffer.len());
    let data = if used == 0 { buffer } else { &buffer[..used] };

    self.frame_index += 1;
    debug!("第 {} 帧, {} 字节", self.frame_index, data.len());
    decode_frame(&self.format, data)
  }
}

impl FromUrl for V4l2Source {
  type Error = V4l2SourceError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(V4l2SourceError::SchemeMismatch);
    }
    let config = CaptureConfig::from_url_parts(&url_path(url), url);
    Self::open(&config)
  }
}

impl FromUrlWithScheme for V4l2Source {
  const SCHEME: &'static str = "v4l";
}

/// 按协商的像素格式将一帧原始数据解码为 BGR 帧
fn decode_frame(format: &CaptureFormat, data: &[u8]) -> Result<Frame, V4l2SourceError> {
  let CaptureFormat {
    width,
    height,
    fourcc,
    ..
  } = *format;

  match &fourcc {
    b"MJPG" => {
      let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8();
      Ok(Frame::new(image, ChannelOrder::Rgb).into_order(ChannelOrder::Bgr))
    }
    b"YUYV" => {
      let expected = (width * height * 2) as usize;
      if data.len() < expected {
        return Err(V4l2SourceError::FrameSize {
          expected,
          actual: data.len(),
        });
      }
      let bgr = yuyv_to_bgr(&data[..expected], width, height);
      let actual = bgr.len();
      Frame::from_raw(width, height, ChannelOrder::Bgr, bgr).ok_or(V4l2SourceError::FrameSize {
        expected: (width * height * 3) as usize,
        actual,
      })
    }
    other => Err(V4l2SourceError::UnsupportedFormat(
      String::from_utf8_lossy(other).into_owned(),
    )),
  }
}

/// 将 YUYV 格式转换为 BGR
fn yuyv_to_bgr(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let mut bgr = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      bgr.extend_from_slice(&[b, g, r]);
    }
  }

  bgr
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn neutral_chroma_is_gray() {
    let bgr = yuyv_to_bgr(&[100, 128, 200, 128], 2, 1);
    assert_eq!(bgr, vec![100, 100, 100, 200, 200, 200]);
  }

  #[test]
  fn strong_v_is_red() {
    // V 偏高时红色最强，BGR 中最后一个字节最大
    let bgr = yuyv_to_bgr(&[128, 128, 128, 255], 2, 1);
    assert!(bgr[2] > bgr[0]);
    assert!(bgr[2] > bgr[1]);
  }

  #[test]
  fn yuyv_frame_decodes_to_bgr() {
    let format = CaptureFormat {
      width: 2,
      height: 2,
      fourcc: *b"YUYV",
      fps: 30,
    };
    let frame = decode_frame(&format, &[50, 128, 50, 128, 50, 128, 50, 128]).unwrap();
    assert_eq!(frame.order(), ChannelOrder::Bgr);
    assert_eq!((frame.width(), frame.height()), (2, 2));
    assert!(frame.as_bytes().iter().all(|&b| b == 50));
  }

  #[test]
  fn short_yuyv_frame_is_rejected() {
    let format = CaptureFormat {
      width: 4,
      height: 4,
      fourcc: *b"YUYV",
      fps: 30,
    };
    assert!(matches!(
      decode_frame(&format, &[0; 8]),
      Err(V4l2SourceError::FrameSize {
        expected: 32,
        actual: 8
      })
    ));
  }

  #[test]
  fn unknown_fourcc_is_rejected() {
    let format = CaptureFormat {
      width: 4,
      height: 4,
      fourcc: *b"NV12",
      fps: 30,
    };
    assert!(matches!(
      decode_frame(&format, &[0; 24]),
      Err(V4l2SourceError::UnsupportedFormat(name)) if name == "NV12"
    ));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = url::Url::parse("gst://camera/dev/video0").unwrap();
    assert!(matches!(
      V4l2Source::from_url(&url),
      Err(V4l2SourceError::SchemeMismatch)
    ));
  }

  #[test]
  fn missing_device_reports_open_error() {
    let url = url::Url::parse("v4l:///dev/shuofeng-no-such-camera").unwrap();
    match V4l2Source::from_url(&url) {
      Err(V4l2SourceError::Open { device, .. }) => {
        assert_eq!(device, "/dev/shuofeng-no-such-camera")
      }
      Err(other) => panic!("unexpected error: {other}"),
      Ok(_) => panic!("camera should not open"),
    }
  }
}
