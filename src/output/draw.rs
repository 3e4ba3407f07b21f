// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/output/draw.rs - 识别结果叠加绘制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
  frame::Frame,
  label::LabelDictionary,
  model::{ColorMap, Detection, PipelineMode, RankedEntry},
};

/// 缩放系数 1.0 时的字高（像素）
const BASE_TEXT_HEIGHT: f32 = 24.0;

const RANKED_TEXT_X: i32 = 10;
const RANKED_FIRST_Y: i32 = 20;
const RANKED_LINE_STEP: i32 = 20;
const RANKED_LAST_Y: i32 = 120;
const RANKED_TEXT_SCALE: f32 = 0.8;
const RANKED_COLOR: [u8; 3] = [128, 255, 128];

const BOX_THICKNESS: i32 = 2;
const BOX_LABEL_GAP: i32 = 5;
const BOX_LABEL_SCALE: f32 = 1.0;

const FPS_POSITION: (i32, i32) = (50, 50);
const FPS_TEXT_SCALE: f32 = 1.5;
const FPS_COLOR: [u8; 3] = [0, 255, 0];

/// 未指定字体时依次尝试的系统字体
const SYSTEM_FONTS: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
];

#[derive(Error, Debug)]
pub enum OverlayError {
  #[error("无法读取字体文件 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("无效的字体文件: {0}")]
  InvalidFont(PathBuf),
  #[error("{0} 模式需要字体，请用 --font 指定")]
  FontRequired(&'static str),
}

/// 叠加层绘制器
///
/// 文字基线坐标与颜色以屏幕上的 RGB 给出，按帧的通道顺序写入像素。
/// 没有可用字体时只画框，不画文字。
pub struct Overlay {
  font: Option<FontVec>,
}

impl Overlay {
  pub fn new(font: Option<FontVec>) -> Self {
    Self { font }
  }

  pub fn from_font_file(path: &Path) -> Result<Self, OverlayError> {
    let data = std::fs::read(path).map_err(|source| OverlayError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let font =
      FontVec::try_from_vec(data).map_err(|_| OverlayError::InvalidFont(path.to_path_buf()))?;
    Ok(Self::new(Some(font)))
  }

  /// 在常见系统路径中查找字体
  pub fn discover() -> Self {
    for candidate in SYSTEM_FONTS {
      let path = Path::new(candidate);
      if !path.exists() {
        continue;
      }
      match Self::from_font_file(path) {
        Ok(overlay) => {
          debug!("使用系统字体: {}", candidate);
          return overlay;
        }
        Err(e) => warn!("{}", e),
      }
    }
    warn!("未找到可用字体，叠加层将不绘制文字");
    Self::new(None)
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 分类结果只以文字呈现，没有字体时拒绝启动
  pub fn check_mode(&self, mode: &PipelineMode) -> Result<(), OverlayError> {
    match mode {
      PipelineMode::Classification(_) if !self.has_font() => {
        error!("未找到可用字体，{} 结果无法显示", mode.name());
        Err(OverlayError::FontRequired(mode.name()))
      }
      _ => Ok(()),
    }
  }

  /// 以基线坐标绘制一行文字
  fn draw_text(&self, frame: &mut Frame, rgb: [u8; 3], x: i32, baseline: i32, scale: f32, text: &str) {
    let Some(font) = &self.font else {
      return;
    };
    let px = BASE_TEXT_HEIGHT * scale;
    let color = frame.order().pixel(rgb);
    draw_text_mut(
      frame.pixels_mut(),
      color,
      x,
      baseline - px as i32,
      PxScale::from(px),
      font,
      text,
    );
  }

  /// 左上角逐行绘制分类结果，最多 6 行，返回绘制的行数
  pub fn draw_ranked(
    &self,
    frame: &mut Frame,
    entries: &[RankedEntry],
    labels: &LabelDictionary,
  ) -> usize {
    let mut y = RANKED_FIRST_Y;
    let mut lines = 0;
    for entry in entries {
      let text = format!(
        "{} : {:.6}",
        labels.get(entry.class_index as i64),
        entry.score
      );
      self.draw_text(frame, RANKED_COLOR, RANKED_TEXT_X, y, RANKED_TEXT_SCALE, &text);
      lines += 1;
      y += RANKED_LINE_STEP;
      if y > RANKED_LAST_Y {
        break;
      }
    }
    lines
  }

  /// 绘制检测框与标签；颜色按原始类别取，标签按偏移后的编号取
  pub fn draw_detections(
    &self,
    frame: &mut Frame,
    detections: &[Detection],
    labels: &LabelDictionary,
    colors: &ColorMap<'_>,
  ) {
    for detection in detections {
      let rgb = colors.color(detection.class_index);
      let color = frame.order().pixel(rgb);
      let rect = detection.rect;

      for inset in 0..BOX_THICKNESS {
        let (w, h) = (rect.width - 2 * inset, rect.height - 2 * inset);
        if w <= 0 || h <= 0 {
          break;
        }
        let outline = Rect::at(rect.x + inset, rect.y + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(frame.pixels_mut(), outline, color);
      }

      let text = labels.get(detection.label_index as i64);
      self.draw_text(
        frame,
        rgb,
        rect.x,
        rect.y - BOX_LABEL_GAP,
        BOX_LABEL_SCALE,
        &text,
      );
    }
  }

  pub fn draw_fps(&self, frame: &mut Frame, fps: f64) {
    let text = format!("{:.2} FPS", fps);
    let (x, y) = FPS_POSITION;
    self.draw_text(frame, FPS_COLOR, x, y, FPS_TEXT_SCALE, &text);
  }
}
