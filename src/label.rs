// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/label.rs - 标签字典
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

use std::{borrow::Cow, path::Path};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("Cannot read labels from {path}: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("Cannot read labels from {0}: file is empty")]
  Empty(String),
}

/// 标签字典，每行一个标签，行号即类别编号
///
/// 加载后不可修改，生命周期覆盖整个运行过程。
#[derive(Debug, Clone, Default)]
pub struct LabelDictionary {
  labels: Box<[String]>,
}

impl LabelDictionary {
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.display().to_string(),
      source,
    })?;

    let dictionary = Self::parse(&content);
    if dictionary.is_empty() {
      return Err(LabelError::Empty(path.display().to_string()));
    }

    debug!("标签数量: {}", dictionary.len());
    Ok(dictionary)
  }

  pub fn parse(content: &str) -> Self {
    content.lines().map(String::from).collect()
  }

  /// 按编号查找标签，越界时退回为编号本身的字符串
  pub fn get(&self, index: i64) -> Cow<'_, str> {
    usize::try_from(index)
      .ok()
      .and_then(|i| self.labels.get(i))
      .map(|label| Cow::Borrowed(label.as_str()))
      .unwrap_or_else(|| Cow::Owned(index.to_string()))
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

impl FromIterator<String> for LabelDictionary {
  fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cat_dog() -> LabelDictionary {
    ["cat", "dog"].into_iter().map(String::from).collect()
  }

  #[test]
  fn lookup_in_range() {
    let labels = cat_dog();
    assert_eq!(labels.get(0), "cat");
    assert_eq!(labels.get(1), "dog");
  }

  #[test]
  fn lookup_out_of_range_falls_back_to_index() {
    let labels = cat_dog();
    assert_eq!(labels.get(5), "5");
    assert_eq!(labels.get(-1), "-1");
  }

  #[test]
  fn parse_keeps_line_order_and_strips_crlf() {
    let labels = LabelDictionary::parse("background\r\nperson\nbicycle\n");
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.get(0), "background");
    assert_eq!(labels.get(1), "person");
    assert_eq!(labels.get(2), "bicycle");
  }

  #[test]
  fn missing_file_is_an_error() {
    let err = LabelDictionary::from_file("/nonexistent/shuofeng/labels.txt").unwrap_err();
    assert!(err.to_string().starts_with("Cannot read labels from"));
  }

  #[test]
  fn empty_file_is_an_error() {
    let path = std::env::temp_dir().join(format!("shuofeng-empty-labels-{}.txt", std::process::id()));
    std::fs::write(&path, "").unwrap();
    let result = LabelDictionary::from_file(&path);
    std::fs::remove_file(&path).ok();
    assert!(matches!(result, Err(LabelError::Empty(_))));
  }
}
