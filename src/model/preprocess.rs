// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/model/preprocess.rs - 输入张量预处理
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::imageops::{self, FilterType};
use thiserror::Error;

use crate::{
  engine::TensorDescriptor,
  frame::{ChannelOrder, FRAME_CHANNELS, Frame},
};

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("输入缓冲区长度不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("不支持的通道数: {0}")]
  UnsupportedChannels(usize),
}

/// 模型期望的输入：NHWC 尺寸与通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
  pub width: u32,
  pub height: u32,
  pub channels: usize,
  pub order: ChannelOrder,
}

impl InputSpec {
  pub fn descriptor(&self) -> TensorDescriptor {
    TensorDescriptor::nhwc_u8(self.height as usize, self.width as usize, self.channels)
  }

  pub fn byte_len(&self) -> usize {
    self.width as usize * self.height as usize * self.channels
  }
}

/// 将采集帧缩放并写入输入缓冲区
///
/// 直接拉伸到 `W×H`（不保持宽高比），必要时先转换通道顺序。
pub fn stage_input(frame: &Frame, spec: &InputSpec, dst: &mut [u8]) -> Result<(), PreprocessError> {
  if spec.channels != FRAME_CHANNELS {
    return Err(PreprocessError::UnsupportedChannels(spec.channels));
  }
  let expected = spec.byte_len();
  if dst.len() != expected {
    return Err(PreprocessError::BufferSizeMismatch {
      expected,
      actual: dst.len(),
    });
  }

  let working = if frame.order() == spec.order {
    imageops::resize(frame.pixels(), spec.width, spec.height, FilterType::Triangle)
  } else {
    let converted = frame.to_order(spec.order);
    imageops::resize(converted.pixels(), spec.width, spec.height, FilterType::Triangle)
  };

  dst.copy_from_slice(working.as_raw());
  Ok(())
}
