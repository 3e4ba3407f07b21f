// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/engine.rs - 推理引擎与加速器边界
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{borrow::Cow, fmt, path::Path, path::PathBuf};

use thiserror::Error;

use crate::model::QuantizedTensor;

mod rknpu_backend;
pub use self::rknpu_backend::{RknpuBackend, RknpuDelegate, RknpuEngine};

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("Cannot read model from {path}: {source}")]
  ModelRead {
    path: String,
    source: std::io::Error,
  },
  #[error("Cannot create delegate for {device}: {reason}")]
  Delegate { device: String, reason: String },
  #[error("Cannot allocate interpreter tensors: {0}")]
  Allocate(String),
  #[error("Cannot invoke interpreter: {0}")]
  Invoke(String),
  #[error("张量 {index} 不存在或不可读: {reason}")]
  Tensor { index: usize, reason: String },
  #[error("模型无效: {0}, 错误: {1}")]
  RknnInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  Rknn(rknpu::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
  UInt8,
  Float32,
  Unknown,
}

/// 张量描述：元素类型与形状
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
  pub element: ElementType,
  pub shape: Vec<usize>,
}

impl TensorDescriptor {
  /// 批大小为 1 的 NHWC 8 位输入
  pub fn nhwc_u8(height: usize, width: usize, channels: usize) -> Self {
    Self {
      element: ElementType::UInt8,
      shape: vec![1, height, width, channels],
    }
  }

  pub fn unknown() -> Self {
    Self {
      element: ElementType::Unknown,
      shape: Vec::new(),
    }
  }

  pub fn element_count(&self) -> usize {
    self.shape.iter().product()
  }
}

impl fmt::Display for TensorDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}{:?}", self.element, self.shape)
  }
}

/// 推理输出张量，量化输出或浮点输出
#[derive(Debug, Clone, Copy)]
pub enum OutputTensor<'a> {
  Quantized(QuantizedTensor<'a>),
  Float32(&'a [f32]),
}

impl<'a> OutputTensor<'a> {
  /// 取得浮点数值，量化张量会先反量化
  pub fn values(&self) -> Cow<'a, [f32]> {
    match *self {
      OutputTensor::Quantized(tensor) => Cow::Owned(tensor.dequantize()),
      OutputTensor::Float32(data) => Cow::Borrowed(data),
    }
  }

  pub fn len(&self) -> usize {
    match self {
      OutputTensor::Quantized(tensor) => tensor.len(),
      OutputTensor::Float32(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 推理引擎
///
/// 生命周期覆盖整个运行过程，在退出时统一释放。
pub trait InferenceEngine {
  fn allocate_tensors(&mut self) -> Result<(), EngineError>;
  fn input_tensor(&self, index: usize) -> Result<TensorDescriptor, EngineError>;
  /// 可写的输入缓冲区，长度等于输入张量的字节数
  fn input_buffer_mut(&mut self, index: usize) -> Result<&mut [u8], EngineError>;
  fn invoke(&mut self) -> Result<(), EngineError>;
  fn output_tensor(&self, index: usize) -> Result<OutputTensor<'_>, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
  /// 字符设备，例如 `/dev/rknpu`
  CharDevice,
  /// DRM render 节点，例如 `/dev/dri/renderD129`
  RenderNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
  pub kind: DeviceKind,
  pub path: PathBuf,
}

impl fmt::Display for DeviceDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}:{}", self.kind, self.path.display())
  }
}

/// 加速器后端：设备发现、模型加载与代理挂载
pub trait Backend {
  type Delegate;
  type Engine: InferenceEngine;

  fn list_devices(&self) -> Vec<DeviceDescriptor>;
  /// 读取模型文件并创建解释器
  fn load_engine(&self, model: &Path) -> Result<Self::Engine, EngineError>;
  fn create_delegate(&self, device: &DeviceDescriptor) -> Result<Self::Delegate, EngineError>;
  fn attach_delegate(
    &self,
    engine: &mut Self::Engine,
    delegate: Self::Delegate,
  ) -> Result<(), EngineError>;
}
