// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/task.rs - 帧处理流水线
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

use std::path::Path;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  engine::{Backend, EngineError, InferenceEngine, TensorDescriptor},
  frame::Frame,
  input::{CaptureFormat, VideoSource},
  label::{LabelDictionary, LabelError},
  model::{ColorMap, PALETTE, PipelineMode, Postprocessed, PreprocessError, stage_input},
  output::{CANCEL_KEY, DisplaySink, draw::Overlay},
};

/// 每帧等待按键的时间
pub const KEY_POLL_TIMEOUT: Duration = Duration::from_millis(1);

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 进入运行状态之前的致命错误
#[derive(Error, Debug)]
pub enum StartupError {
  #[error("No connected NPU found")]
  NoDevice,
  #[error(transparent)]
  Labels(#[from] LabelError),
  #[error(transparent)]
  Engine(#[from] EngineError),
  #[error("Input tensor shape does not match input image: expected {expected}, model declares {actual}")]
  ShapeMismatch {
    expected: TensorDescriptor,
    actual: TensorDescriptor,
  },
  #[error("Cannot open camera: {0}")]
  Camera(BoxedError),
}

/// 运行过程中的致命错误，不重试也不跳帧
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("Cannot capture frame: {0}")]
  Capture(BoxedError),
  #[error("Cannot stage input: {0}")]
  Staging(#[from] PreprocessError),
  #[error(transparent)]
  Inference(EngineError),
  #[error("Cannot read inference outputs: {0}")]
  Postprocess(EngineError),
  #[error("Cannot present frame: {0}")]
  Display(BoxedError),
}

/// 运行结束时的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
  pub frames: u64,
}

/// 启动完成、可以进入循环的流水线
pub struct ReadyPipeline<E, S> {
  engine: E,
  source: S,
  labels: LabelDictionary,
  mode: PipelineMode,
  overlay: Overlay,
  colors: ColorMap<'static>,
}

/// 按固定顺序完成启动：
/// 设备发现、标签、模型与解释器、代理、张量分配、输入形状校验，最后打开摄像头。
/// 任一步失败即返回，摄像头只在前面全部成功后才打开。
pub fn initialize<B, S, F, OE>(
  backend: &B,
  model: &Path,
  labels: &Path,
  mode: PipelineMode,
  overlay: Overlay,
  open_source: F,
) -> Result<ReadyPipeline<B::Engine, S>, StartupError>
where
  B: Backend,
  S: VideoSource,
  F: FnOnce() -> Result<S, OE>,
  OE: std::error::Error + Send + Sync + 'static,
{
  info!("启动 {} 流水线", mode.name());

  let devices = backend.list_devices();
  let Some(device) = devices.first() else {
    error!("No connected NPU found");
    return Err(StartupError::NoDevice);
  };
  info!("共 {} 个 NPU 设备，使用 {}", devices.len(), device);

  let labels = LabelDictionary::from_file(labels)?;

  let mut engine = backend.load_engine(model)?;
  let delegate = backend.create_delegate(device)?;
  backend.attach_delegate(&mut engine, delegate)?;
  engine.allocate_tensors()?;

  let expected = mode.input_spec().descriptor();
  let actual = engine.input_tensor(0)?;
  if actual != expected {
    error!("输入张量不匹配: 期望 {}, 模型为 {}", expected, actual);
    return Err(StartupError::ShapeMismatch { expected, actual });
  }
  debug!("输入张量: {}", actual);

  let source = open_source().map_err(|e| {
    error!("无法打开摄像头: {}", e);
    StartupError::Camera(Box::new(e))
  })?;
  info!("摄像头就绪: {}", source.format());

  let colors = match mode {
    PipelineMode::Detection(config) => ColorMap::new(&PALETTE, config.palette_classes),
    PipelineMode::Classification(_) => ColorMap::default(),
  };

  Ok(ReadyPipeline {
    engine,
    source,
    labels,
    mode,
    overlay,
    colors,
  })
}

impl<E: InferenceEngine, S: VideoSource> ReadyPipeline<E, S> {
  pub fn mode(&self) -> &PipelineMode {
    &self.mode
  }

  pub fn labels(&self) -> &LabelDictionary {
    &self.labels
  }

  pub fn capture_format(&self) -> CaptureFormat {
    self.source.format()
  }

  /// 采集、预处理、推理并把结果画到帧上
  fn step(&mut self, started: Instant) -> Result<(Frame, Postprocessed), PipelineError> {
    let mut frame = self
      .source
      .next_frame()
      .map_err(|e| PipelineError::Capture(Box::new(e)))?;

    let spec = self.mode.input_spec();
    let buffer = self
      .engine
      .input_buffer_mut(0)
      .map_err(PipelineError::Inference)?;
    stage_input(&frame, &spec, buffer)?;

    self.engine.invoke().map_err(PipelineError::Inference)?;

    let result = self
      .mode
      .postprocess(&self.engine, frame.width(), frame.height())
      .map_err(PipelineError::Postprocess)?;

    match &result {
      Postprocessed::Ranked(entries) => {
        self.overlay.draw_ranked(&mut frame, entries, &self.labels);
      }
      Postprocessed::Detections(detections) => {
        self
          .overlay
          .draw_detections(&mut frame, detections, &self.labels, &self.colors);
        let elapsed = started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
          self.overlay.draw_fps(&mut frame, 1.0 / elapsed);
        }
      }
    }

    Ok((frame, result))
  }

  /// 循环处理直到收到取消键或发生错误
  pub fn run<D: DisplaySink>(mut self, sink: &mut D) -> Result<RunSummary, PipelineError> {
    info!("开始 {} 循环", self.mode.name());
    let mut frames = 0u64;

    loop {
      let started = Instant::now();
      let (frame, result) = self.step(started)?;

      sink
        .present(&frame)
        .map_err(|e| PipelineError::Display(Box::new(e)))?;

      frames += 1;
      info!(
        "第 {} 帧, {} 个结果, 耗时: {:.2?}",
        frames,
        result.len(),
        started.elapsed()
      );

      match sink
        .poll_key(KEY_POLL_TIMEOUT)
        .map_err(|e| PipelineError::Display(Box::new(e)))?
      {
        Some(key) if key == CANCEL_KEY => {
          warn!("收到取消键，退出循环");
          break;
        }
        Some(key) => debug!("忽略按键 {:?}", key),
        None => {}
      }
    }

    info!("共处理 {} 帧，退出", frames);
    Ok(RunSummary { frames })
  }
}
