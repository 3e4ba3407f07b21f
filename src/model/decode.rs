// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/model/decode.rs - 检测输出解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::{debug, warn};

use super::color::DEFAULT_PALETTE_CLASSES;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// 标签文件第 0 行保留，模型类别需加 1 才能对上标签
pub const DEFAULT_LABEL_OFFSET: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectConfig {
  pub confidence_threshold: f32,
  pub label_offset: i32,
  pub palette_classes: u32,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      label_offset: DEFAULT_LABEL_OFFSET,
      palette_classes: DEFAULT_PALETTE_CLASSES,
    }
  }
}

/// 像素坐标矩形 (x, y, width, height)，不裁剪到画面内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  /// 模型输出的原始类别
  pub class_index: i32,
  /// 查标签用的编号（原始类别加偏移）
  pub label_index: i32,
  pub score: f32,
  pub rect: PixelRect,
}

/// 检测模型的四路并行输出
#[derive(Debug, Clone, Copy)]
pub struct DetectionOutputs<'a> {
  /// 每个检测 4 个值：y1, x1, y2, x2（归一化）
  pub boxes: &'a [f32],
  pub classes: &'a [f32],
  pub scores: &'a [f32],
  pub count: f32,
}

/// 按置信度（严格大于）筛选并映射到画面像素坐标
///
/// 不做排序与 NMS，按模型输出顺序原样返回。
pub fn decode_detections(
  outputs: &DetectionOutputs<'_>,
  frame_width: u32,
  frame_height: u32,
  config: &DetectConfig,
) -> Vec<Detection> {
  let available = outputs
    .scores
    .len()
    .min(outputs.classes.len())
    .min(outputs.boxes.len() / 4);
  let reported = outputs.count as usize;
  if reported > available {
    warn!("模型报告 {} 个检测，实际只有 {} 个", reported, available);
  }
  let count = reported.min(available);

  let (w, h) = (frame_width as f32, frame_height as f32);
  let detections = (0..count)
    .filter(|&i| outputs.scores[i] > config.confidence_threshold)
    .map(|i| {
      let class_index = outputs.classes[i] as i32;
      let y1 = outputs.boxes[4 * i] * h;
      let x1 = outputs.boxes[4 * i + 1] * w;
      let y2 = outputs.boxes[4 * i + 2] * h;
      let x2 = outputs.boxes[4 * i + 3] * w;
      Detection {
        class_index,
        label_index: class_index.saturating_add(config.label_offset),
        score: outputs.scores[i],
        rect: PixelRect {
          x: x1 as i32,
          y: y1 as i32,
          width: (x2 - x1) as i32,
          height: (y2 - y1) as i32,
        },
      }
    })
    .collect::<Vec<_>>();

  debug!("检测到 {} 个物体", detections.len());
  detections
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn box_maps_to_frame_pixels() {
    let outputs = DetectionOutputs {
      boxes: &[0.1, 0.2, 0.4, 0.6],
      classes: &[0.0],
      scores: &[0.9],
      count: 1.0,
    };
    let detections = decode_detections(&outputs, 640, 480, &DetectConfig::default());
    assert_eq!(detections.len(), 1);
    assert_eq!(
      detections[0].rect,
      PixelRect {
        x: 128,
        y: 48,
        width: 256,
        height: 144
      }
    );
  }

  #[test]
  fn confidence_threshold_is_strict() {
    let outputs = DetectionOutputs {
      boxes: &[0.0; 12],
      classes: &[3.0, 4.0, 5.0],
      scores: &[0.5, 0.51, 0.49],
      count: 3.0,
    };
    let detections = decode_detections(&outputs, 300, 300, &DetectConfig::default());
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_index, 4);
    assert_eq!(detections[0].score, 0.51);
  }

  #[test]
  fn label_index_applies_offset() {
    let outputs = DetectionOutputs {
      boxes: &[0.0, 0.0, 1.0, 1.0],
      classes: &[16.0],
      scores: &[0.8],
      count: 1.0,
    };
    let detections = decode_detections(&outputs, 10, 10, &DetectConfig::default());
    assert_eq!(detections[0].class_index, 16);
    assert_eq!(detections[0].label_index, 17);

    let config = DetectConfig {
      label_offset: 0,
      ..DetectConfig::default()
    };
    let detections = decode_detections(&outputs, 10, 10, &config);
    assert_eq!(detections[0].label_index, 16);
  }

  #[test]
  fn non_finite_class_saturates_label_index() {
    let outputs = DetectionOutputs {
      boxes: &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0],
      classes: &[f32::INFINITY, f32::NEG_INFINITY],
      scores: &[0.9, 0.9],
      count: 2.0,
    };
    let detections = decode_detections(&outputs, 10, 10, &DetectConfig::default());
    assert_eq!(detections[0].class_index, i32::MAX);
    assert_eq!(detections[0].label_index, i32::MAX);

    let config = DetectConfig {
      label_offset: -1,
      ..DetectConfig::default()
    };
    let detections = decode_detections(&outputs, 10, 10, &config);
    assert_eq!(detections[1].class_index, i32::MIN);
    assert_eq!(detections[1].label_index, i32::MIN);
  }

  #[test]
  fn count_is_truncated_and_bounded_by_arrays() {
    let outputs = DetectionOutputs {
      boxes: &[0.0; 8],
      classes: &[1.0, 2.0],
      scores: &[0.9, 0.9],
      count: 1.9,
    };
    assert_eq!(decode_detections(&outputs, 10, 10, &DetectConfig::default()).len(), 1);

    let overreported = DetectionOutputs {
      count: 10.0,
      ..outputs
    };
    assert_eq!(decode_detections(&overreported, 10, 10, &DetectConfig::default()).len(), 2);
  }

  #[test]
  fn out_of_range_boxes_pass_through() {
    let outputs = DetectionOutputs {
      boxes: &[-0.5, -0.25, 1.5, 1.25],
      classes: &[0.0],
      scores: &[0.7],
      count: 1.0,
    };
    let rect = decode_detections(&outputs, 100, 100, &DetectConfig::default())[0].rect;
    assert_eq!(
      rect,
      PixelRect {
        x: -25,
        y: -50,
        width: 150,
        height: 200
      }
    );
  }
}
