// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/model.rs - 模型输入输出约定与后处理
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::debug;

use crate::{
  engine::{EngineError, InferenceEngine},
  frame::ChannelOrder,
};

mod color;
mod decode;
mod preprocess;
mod quant;
mod rank;

pub use self::color::{ColorMap, DEFAULT_PALETTE_CLASSES, PALETTE};
pub use self::decode::{
  DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_LABEL_OFFSET, DetectConfig, Detection, DetectionOutputs,
  PixelRect, decode_detections,
};
pub use self::preprocess::{InputSpec, PreprocessError, stage_input};
pub use self::quant::{QuantParams, QuantizedTensor, dequantize};
pub use self::rank::{RankedEntry, rank};

pub const CLASSIFY_INPUT: InputSpec = InputSpec {
  width: 224,
  height: 224,
  channels: 3,
  order: ChannelOrder::Rgb,
};

pub const DETECT_INPUT: InputSpec = InputSpec {
  width: 300,
  height: 300,
  channels: 3,
  order: ChannelOrder::Bgr,
};

pub const DEFAULT_CLASSIFY_THRESHOLD: f32 = 0.0001;

const DETECT_BOXES_OUTPUT: usize = 0;
const DETECT_CLASSES_OUTPUT: usize = 1;
const DETECT_SCORES_OUTPUT: usize = 2;
const DETECT_COUNT_OUTPUT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifyConfig {
  pub threshold: f32,
}

impl Default for ClassifyConfig {
  fn default() -> Self {
    Self {
      threshold: DEFAULT_CLASSIFY_THRESHOLD,
    }
  }
}

/// 流水线模式：分类或检测
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipelineMode {
  Classification(ClassifyConfig),
  Detection(DetectConfig),
}

impl PipelineMode {
  pub fn input_spec(&self) -> InputSpec {
    match self {
      PipelineMode::Classification(_) => CLASSIFY_INPUT,
      PipelineMode::Detection(_) => DETECT_INPUT,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      PipelineMode::Classification(_) => "classification",
      PipelineMode::Detection(_) => "detection",
    }
  }

  /// 读取推理输出并按模式解释
  pub fn postprocess<E: InferenceEngine + ?Sized>(
    &self,
    engine: &E,
    frame_width: u32,
    frame_height: u32,
  ) -> Result<Postprocessed, EngineError> {
    match self {
      PipelineMode::Classification(config) => {
        let scores = engine.output_tensor(0)?.values();
        debug!("分类输出长度: {}", scores.len());
        Ok(Postprocessed::Ranked(rank(&scores, config.threshold)))
      }
      PipelineMode::Detection(config) => {
        let boxes = engine.output_tensor(DETECT_BOXES_OUTPUT)?.values();
        let classes = engine.output_tensor(DETECT_CLASSES_OUTPUT)?.values();
        let scores = engine.output_tensor(DETECT_SCORES_OUTPUT)?.values();
        let count = engine
          .output_tensor(DETECT_COUNT_OUTPUT)?
          .values()
          .first()
          .copied()
          .ok_or_else(|| EngineError::Tensor {
            index: DETECT_COUNT_OUTPUT,
            reason: "检测数量输出为空".to_string(),
          })?;

        let outputs = DetectionOutputs {
          boxes: &boxes,
          classes: &classes,
          scores: &scores,
          count,
        };
        Ok(Postprocessed::Detections(decode_detections(
          &outputs,
          frame_width,
          frame_height,
          config,
        )))
      }
    }
  }
}

/// 单帧后处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum Postprocessed {
  Ranked(Vec<RankedEntry>),
  Detections(Vec<Detection>),
}

impl Postprocessed {
  pub fn len(&self) -> usize {
    match self {
      Postprocessed::Ranked(entries) => entries.len(),
      Postprocessed::Detections(detections) => detections.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
