// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/model/rank.rs - 分类结果排序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedEntry {
  pub class_index: usize,
  pub score: f32,
}

/// 按阈值筛选（含等于）后按分数降序排列
///
/// 同分项之间的先后不作保证。
pub fn rank(scores: &[f32], threshold: f32) -> Vec<RankedEntry> {
  let mut survivors: Vec<usize> = (0..scores.len())
    .filter(|&i| scores[i] >= threshold)
    .collect();
  survivors.sort_unstable_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  survivors
    .into_iter()
    .map(|class_index| RankedEntry {
      class_index,
      score: scores[class_index],
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_is_inclusive() {
    let ranked = rank(&[0.5, 0.3, 0.9], 0.5);
    assert_eq!(
      ranked,
      vec![
        RankedEntry {
          class_index: 2,
          score: 0.9
        },
        RankedEntry {
          class_index: 0,
          score: 0.5
        },
      ]
    );
  }

  #[test]
  fn threshold_above_max_is_empty() {
    assert!(rank(&[0.1, 0.2, 0.3], 0.31).is_empty());
    assert!(rank(&[], 0.0).is_empty());
  }

  #[test]
  fn output_is_filtered_and_non_increasing() {
    let scores = [0.02, 0.7, 0.0, 0.33, 0.7, 0.01, 0.95, 0.4, f32::NAN];
    let threshold = 0.01;
    let ranked = rank(&scores, threshold);

    assert!(ranked.len() <= scores.len());
    assert_eq!(ranked.len(), 7);
    assert!(ranked.iter().all(|e| e.score >= threshold));
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(ranked.iter().all(|e| scores[e.class_index] == e.score));
  }
}
