// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/model/color.rs - 类别颜色映射
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

/// 色相循环调色板（归一化 RGB）
pub const PALETTE: [[f32; 3]; 6] = [
  [1.0, 0.0, 1.0],
  [0.0, 0.0, 1.0],
  [0.0, 1.0, 1.0],
  [0.0, 1.0, 0.0],
  [1.0, 1.0, 0.0],
  [1.0, 0.0, 0.0],
];

pub const DEFAULT_PALETTE_CLASSES: u32 = 80;

/// 类别颜色映射，同一类别总是得到同一颜色
#[derive(Debug, Clone, Copy)]
pub struct ColorMap<'p> {
  palette: &'p [[f32; 3]; 6],
  classes: u32,
}

impl Default for ColorMap<'static> {
  fn default() -> Self {
    Self::new(&PALETTE, DEFAULT_PALETTE_CLASSES)
  }
}

impl<'p> ColorMap<'p> {
  pub fn new(palette: &'p [[f32; 3]; 6], classes: u32) -> Self {
    Self {
      palette,
      classes: classes.max(1),
    }
  }

  /// 单个通道的取值；超出调色板范围的类别会被夹到首尾两端
  pub fn channel(&self, channel: usize, class_index: i32) -> u8 {
    let last = (self.palette.len() - 1) as f32;
    let ratio = (class_index as f32 / self.classes as f32) * last;
    let i = ratio.floor().clamp(0.0, last);
    let j = ratio.ceil().clamp(0.0, last);
    let t = (ratio - i).clamp(0.0, 1.0);

    let value = (1.0 - t) * self.palette[i as usize][channel] + t * self.palette[j as usize][channel];
    (value * 255.0) as u8
  }

  /// `[r, g, b]`，依次为通道 0、1、2
  pub fn color(&self, class_index: i32) -> [u8; 3] {
    [
      self.channel(0, class_index),
      self.channel(1, class_index),
      self.channel(2, class_index),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_class_same_color() {
    let colors = ColorMap::default();
    for class in [0, 1, 17, 42, 79] {
      for channel in 0..3 {
        assert_eq!(colors.channel(channel, class), colors.channel(channel, class));
      }
      assert_eq!(colors.color(class), colors.color(class));
    }
  }

  #[test]
  fn palette_knots_are_exact() {
    let colors = ColorMap::default();
    // 80 / 5 = 16，每 16 个类别落在一个调色板节点上
    assert_eq!(colors.color(0), [255, 0, 255]);
    assert_eq!(colors.color(16), [0, 0, 255]);
    assert_eq!(colors.color(32), [0, 255, 255]);
    assert_eq!(colors.color(48), [0, 255, 0]);
    assert_eq!(colors.color(64), [255, 255, 0]);
    assert_eq!(colors.color(80), [255, 0, 0]);
  }

  #[test]
  fn halfway_between_knots_interpolates() {
    let colors = ColorMap::default();
    // ratio = 0.5，在 [1,0,1] 与 [0,0,1] 之间
    assert_eq!(colors.color(8), [127, 0, 255]);
  }

  #[test]
  fn out_of_palette_classes_are_clamped() {
    let colors = ColorMap::default();
    assert_eq!(colors.color(200), [255, 0, 0]);
    assert_eq!(colors.color(-3), [255, 0, 255]);
  }

  #[test]
  fn palette_spacing_is_configurable() {
    let colors = ColorMap::new(&PALETTE, 10);
    assert_eq!(colors.color(2), [0, 0, 255]);
  }
}
