// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/engine/rknpu_backend.rs - RKNPU 推理后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info, warn};

use super::{
  Backend, DeviceDescriptor, DeviceKind, EngineError, InferenceEngine, OutputTensor,
  TensorDescriptor,
};

const RKNPU_NUM_INPUTS: u32 = 1;
const RKNPU_CHAR_DEVICE: &str = "/dev/rknpu";
const RKNPU_DRIVER_NAME: &str = "rknpu";
const DRM_CLASS_DIR: &str = "/sys/class/drm";
const DRM_DEVICE_DIR: &str = "/dev/dri";

/// RKNPU 后端
///
/// RKNN 运行时只按字节数校验输入，因此后端需要预先知道期望的输入绑定，
/// 在分配张量时用它检验模型是否接受。
pub struct RknpuBackend {
  input: TensorDescriptor,
  char_device: PathBuf,
  drm_class_dir: PathBuf,
}

impl RknpuBackend {
  pub fn new(input: TensorDescriptor) -> Self {
    Self {
      input,
      char_device: PathBuf::from(RKNPU_CHAR_DEVICE),
      drm_class_dir: PathBuf::from(DRM_CLASS_DIR),
    }
  }

  /// 替换设备发现时扫描的路径
  pub fn with_device_roots(mut self, char_device: PathBuf, drm_class_dir: PathBuf) -> Self {
    self.char_device = char_device;
    self.drm_class_dir = drm_class_dir;
    self
  }
}

impl From<rknpu::Error> for EngineError {
  fn from(err: rknpu::Error) -> Self {
    EngineError::Rknn(err)
  }
}

impl EngineError {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    EngineError::RknnInvalid(msg.to_string(), e)
  }
}

fn discover_devices(char_device: &Path, drm_class_dir: &Path) -> Vec<DeviceDescriptor> {
  let mut devices = Vec::new();

  if char_device.exists() {
    devices.push(DeviceDescriptor {
      kind: DeviceKind::CharDevice,
      path: char_device.to_path_buf(),
    });
  }

  let entries = match std::fs::read_dir(drm_class_dir) {
    Ok(entries) => entries,
    Err(e) => {
      debug!("无法读取 {}: {}", drm_class_dir.display(), e);
      return devices;
    }
  };

  let mut nodes = entries
    .filter_map(Result::ok)
    .filter_map(|entry| {
      let name = entry.file_name().to_string_lossy().into_owned();
      if !name.starts_with("renderD") {
        return None;
      }
      let driver = std::fs::read_link(entry.path().join("device").join("driver")).ok()?;
      let driver_name = driver.file_name()?.to_string_lossy().to_lowercase();
      driver_name.contains(RKNPU_DRIVER_NAME).then(|| DeviceDescriptor {
        kind: DeviceKind::RenderNode,
        path: Path::new(DRM_DEVICE_DIR).join(&name),
      })
    })
    .collect::<Vec<_>>();
  nodes.sort_by(|a, b| a.path.cmp(&b.path));
  devices.extend(nodes);

  devices
}

#[derive(Debug, Clone)]
pub struct RknpuDelegate {
  device: DeviceDescriptor,
}

impl RknpuDelegate {
  pub fn device(&self) -> &DeviceDescriptor {
    &self.device
  }
}

pub struct RknpuEngine {
  context: Context,
  delegate: Option<RknpuDelegate>,
  binding: TensorDescriptor,
  declared: TensorDescriptor,
  input: Vec<u8>,
  outputs: Option<rknpu::Output>,
}

impl Backend for RknpuBackend {
  type Delegate = RknpuDelegate;
  type Engine = RknpuEngine;

  fn list_devices(&self) -> Vec<DeviceDescriptor> {
    let devices = discover_devices(&self.char_device, &self.drm_class_dir);
    for device in &devices {
      info!("发现 NPU 设备: {}", device);
    }
    devices
  }

  fn load_engine(&self, model: &Path) -> Result<Self::Engine, EngineError> {
    info!("加载模型文件: {}", model.display());
    let model_data = std::fs::read(model).map_err(|source| EngineError::ModelRead {
      path: model.display().to_string(),
      source,
    })?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, InitFlags::default())
      .map_err(|e| EngineError::invalid("无法创建 RKNN 推理上下文", e))?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(EngineError::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| EngineError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| EngineError::invalid("无法获取输出数量", e))?;
    debug!("模型输入数量: {}", num_inputs);
    debug!("模型输出数量: {}", num_outputs);

    if num_inputs != RKNPU_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNPU_NUM_INPUTS, num_inputs
      );
      return Err(EngineError::invalid(
        &format!(
          "预期模型输入数量为 {}, 实际为 {}",
          RKNPU_NUM_INPUTS, num_inputs
        ),
        rknpu::Error::InvalidModel,
      ));
    }

    Ok(RknpuEngine {
      context,
      delegate: None,
      binding: self.input.clone(),
      declared: TensorDescriptor::unknown(),
      input: Vec::new(),
      outputs: None,
    })
  }

  fn create_delegate(&self, device: &DeviceDescriptor) -> Result<Self::Delegate, EngineError> {
    std::fs::metadata(&device.path).map_err(|e| EngineError::Delegate {
      device: device.to_string(),
      reason: e.to_string(),
    })?;
    info!("创建 NPU 代理: {}", device);
    Ok(RknpuDelegate {
      device: device.clone(),
    })
  }

  fn attach_delegate(
    &self,
    engine: &mut Self::Engine,
    delegate: Self::Delegate,
  ) -> Result<(), EngineError> {
    info!("代理已挂载到 {}", delegate.device());
    engine.delegate = Some(delegate);
    Ok(())
  }
}

impl RknpuEngine {
  pub fn delegate(&self) -> Option<&RknpuDelegate> {
    self.delegate.as_ref()
  }
}

impl InferenceEngine for RknpuEngine {
  fn allocate_tensors(&mut self) -> Result<(), EngineError> {
    if self.delegate.is_none() {
      return Err(EngineError::Allocate("NPU 代理未挂载".to_string()));
    }
    self.input = vec![0u8; self.binding.element_count()];
    if self.input.is_empty() {
      return Err(EngineError::Allocate("输入绑定为空".to_string()));
    }

    // 运行时拒绝则说明模型声明的输入与绑定不一致
    match self
      .context
      .set_input(0, &self.input, TensorFormat::NHWC, TensorType::UInt8)
    {
      Ok(_) => {
        debug!("模型接受输入绑定 {}", self.binding);
        self.declared = self.binding.clone();
      }
      Err(e) => {
        warn!("模型拒绝输入绑定 {}: {}", self.binding, e);
        self.declared = TensorDescriptor::unknown();
      }
    }
    Ok(())
  }

  fn input_tensor(&self, index: usize) -> Result<TensorDescriptor, EngineError> {
    if index != 0 {
      return Err(EngineError::Tensor {
        index,
        reason: "RKNPU 模型只有一个输入".to_string(),
      });
    }
    Ok(self.declared.clone())
  }

  fn input_buffer_mut(&mut self, index: usize) -> Result<&mut [u8], EngineError> {
    if index != 0 || self.input.is_empty() {
      return Err(EngineError::Tensor {
        index,
        reason: "输入缓冲区未分配".to_string(),
      });
    }
    Ok(self.input.as_mut_slice())
  }

  fn invoke(&mut self) -> Result<(), EngineError> {
    debug!("设置模型输入");
    self
      .context
      .set_input(0, &self.input, TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    debug!("获取模型输出");
    let outputs = self.context.get_outputs()?;
    self.outputs = Some(outputs);
    Ok(())
  }

  fn output_tensor(&self, index: usize) -> Result<OutputTensor<'_>, EngineError> {
    let outputs = self.outputs.as_ref().ok_or_else(|| EngineError::Tensor {
      index,
      reason: "尚未执行推理".to_string(),
    })?;
    let data: &[f32] = outputs.get_f32(index).map_err(|e| EngineError::Tensor {
      index,
      reason: e.to_string(),
    })?;
    Ok(OutputTensor::Float32(data))
  }
}
