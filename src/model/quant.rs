// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/model/quant.rs - 量化张量与反量化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

/// 量化参数 `real = scale * (raw - zero_point)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
  pub scale: f32,
  pub zero_point: i32,
}

/// 8 位无符号量化张量，字节数即元素数
#[derive(Debug, Clone, Copy)]
pub struct QuantizedTensor<'a> {
  data: &'a [u8],
  params: QuantParams,
}

impl<'a> QuantizedTensor<'a> {
  pub fn new(data: &'a [u8], params: QuantParams) -> Self {
    Self { data, params }
  }

  pub fn params(&self) -> QuantParams {
    self.params
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn dequantize(&self) -> Vec<f32> {
    dequantize(self.data, self.params)
  }
}

pub fn dequantize(data: &[u8], QuantParams { scale, zero_point }: QuantParams) -> Vec<f32> {
  data
    .iter()
    .map(|&b| scale * (i32::from(b) - zero_point) as f32)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_byte_maps_to_scaled_offset() {
    let params = QuantParams {
      scale: 0.5,
      zero_point: 128,
    };
    let bytes: Vec<u8> = (0..=255).collect();
    let scores = dequantize(&bytes, params);
    assert_eq!(scores.len(), 256);
    for (b, score) in bytes.iter().zip(&scores) {
      assert_eq!(*score, 0.5 * (*b as f32 - 128.0));
    }
  }

  #[test]
  fn dequantize_is_linear_in_byte_value() {
    let params = QuantParams {
      scale: 0.00390625,
      zero_point: 3,
    };
    let scores = QuantizedTensor::new(&[10, 20, 30], params).dequantize();
    let step_a = scores[1] - scores[0];
    let step_b = scores[2] - scores[1];
    assert!((step_a - step_b).abs() < 1e-6);
    assert!((step_a - 10.0 * params.scale).abs() < 1e-6);
  }

  #[test]
  fn zero_point_maps_to_zero() {
    let params = QuantParams {
      scale: 0.1,
      zero_point: 0,
    };
    assert_eq!(dequantize(&[0, 255], params), vec![0.0, 0.1 * 255.0]);
  }
}
