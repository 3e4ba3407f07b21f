// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/frame.rs - 交错三通道帧定义
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

use image::{ImageBuffer, Rgb};

pub const FRAME_CHANNELS: usize = 3;

/// 三通道交错像素缓冲区，像素内通道顺序由 [`ChannelOrder`] 决定
pub type PixelBuffer = ImageBuffer<Rgb<u8>, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
  Rgb,
  Bgr,
}

impl ChannelOrder {
  /// 将 RGB 颜色排列为本顺序下的像素
  pub fn pixel(self, [r, g, b]: [u8; 3]) -> Rgb<u8> {
    match self {
      ChannelOrder::Rgb => Rgb([r, g, b]),
      ChannelOrder::Bgr => Rgb([b, g, r]),
    }
  }
}

/// 一帧图像（HWC 交错排列）
///
/// 由当前循环迭代独占，每次迭代被新帧覆盖。
#[derive(Debug, Clone)]
pub struct Frame {
  pixels: PixelBuffer,
  order: ChannelOrder,
}

impl Frame {
  pub fn new(pixels: PixelBuffer, order: ChannelOrder) -> Self {
    Self { pixels, order }
  }

  /// 由原始字节构造，长度必须等于 `width * height * 3`
  pub fn from_raw(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Option<Self> {
    ImageBuffer::from_raw(width, height, data).map(|pixels| Self { pixels, order })
  }

  pub fn width(&self) -> u32 {
    self.pixels.width()
  }

  pub fn height(&self) -> u32 {
    self.pixels.height()
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  pub fn pixels(&self) -> &PixelBuffer {
    &self.pixels
  }

  pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
    &mut self.pixels
  }

  pub fn as_bytes(&self) -> &[u8] {
    self.pixels.as_raw()
  }

  /// 交换 R/B 通道，返回指定顺序的新帧；顺序相同时直接克隆
  pub fn to_order(&self, order: ChannelOrder) -> Frame {
    self.clone().into_order(order)
  }

  /// 原地转换通道顺序
  pub fn into_order(mut self, order: ChannelOrder) -> Frame {
    if self.order != order {
      swap_red_blue(&mut self.pixels);
      self.order = order;
    }
    self
  }

  /// 转换为 RGB 顺序的图像，用于保存或显示
  pub fn to_rgb_image(&self) -> image::RgbImage {
    self.to_order(ChannelOrder::Rgb).pixels
  }
}

fn swap_red_blue(pixels: &mut PixelBuffer) {
  for pixel in pixels.pixels_mut() {
    pixel.0.swap(0, 2);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_raw_checks_length() {
    assert!(Frame::from_raw(2, 2, ChannelOrder::Bgr, vec![0; 12]).is_some());
    assert!(Frame::from_raw(2, 2, ChannelOrder::Bgr, vec![0; 11]).is_none());
  }

  #[test]
  fn to_order_swaps_red_and_blue() {
    let frame = Frame::from_raw(1, 1, ChannelOrder::Bgr, vec![10, 20, 30]).unwrap();
    let rgb = frame.to_order(ChannelOrder::Rgb);
    assert_eq!(rgb.order(), ChannelOrder::Rgb);
    assert_eq!(rgb.as_bytes(), &[30, 20, 10]);
    assert_eq!(frame.to_order(ChannelOrder::Bgr).as_bytes(), &[10, 20, 30]);
  }

  #[test]
  fn pixel_follows_channel_order() {
    assert_eq!(ChannelOrder::Rgb.pixel([1, 2, 3]), Rgb([1, 2, 3]));
    assert_eq!(ChannelOrder::Bgr.pixel([1, 2, 3]), Rgb([3, 2, 1]));
  }
}
