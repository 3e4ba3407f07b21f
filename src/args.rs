// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/args.rs - 命令行参数与程序入口
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser};
use tracing::info;
use url::Url;

use crate::{
  FromUrl,
  engine::RknpuBackend,
  input::InputWrapper,
  model::PipelineMode,
  output::{InterruptKeys, OutputWrapper, draw::Overlay},
  task::{self, RunSummary},
};

pub const DEFAULT_CAMERA_URL: &str = "v4l:///dev/video0";

#[cfg(feature = "gstreamer_output")]
pub const DEFAULT_DISPLAY_URL: &str = "gst://window";
#[cfg(not(feature = "gstreamer_output"))]
pub const DEFAULT_DISPLAY_URL: &str = "image:///tmp/shuofeng.png";

/// 两个程序共用的参数
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
  /// 模型文件路径
  #[arg(value_name = "MODEL_FILE")]
  pub model_file: PathBuf,

  /// 标签文件路径，每行一个标签
  #[arg(value_name = "LABEL_FILE")]
  pub label_file: PathBuf,

  /// 摄像头
  /// - V4L2: v4l:///dev/video0?width=1280&height=720&fps=30
  /// - GStreamer: gst://camera/dev/video0?format=MJPG
  #[arg(long, value_name = "URL", default_value = DEFAULT_CAMERA_URL)]
  pub camera: Url,

  /// 显示方式
  /// - 窗口: gst://window，全屏: gst://window?fullscreen=true
  /// - 预览图: image:///tmp/preview.png?every=10
  #[arg(long, value_name = "URL", default_value = DEFAULT_DISPLAY_URL)]
  pub display: Url,

  /// 叠加文字使用的 TrueType 字体，缺省时在系统字体目录中查找
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

/// 解析参数；用法错误退出码为 1，帮助与版本信息退出码为 0
pub fn parse_args<T: Parser>() -> T {
  match T::try_parse() {
    Ok(args) => args,
    Err(e) => {
      let code = if e.use_stderr() { 1 } else { 0 };
      let _ = e.print();
      std::process::exit(code);
    }
  }
}

/// 启动并运行流水线，直到取消或出错
pub fn run(common: &CommonArgs, mode: PipelineMode) -> Result<RunSummary> {
  info!("模型文件路径: {}", common.model_file.display());
  info!("标签文件路径: {}", common.label_file.display());
  info!("摄像头: {}", common.camera);
  info!("显示方式: {}", common.display);

  let overlay = match &common.font {
    Some(path) => Overlay::from_font_file(path)?,
    None => Overlay::discover(),
  };
  overlay.check_mode(&mode)?;

  let backend = RknpuBackend::new(mode.input_spec().descriptor());
  let pipeline = task::initialize(
    &backend,
    &common.model_file,
    &common.label_file,
    mode,
    overlay,
    || InputWrapper::from_url(&common.camera),
  )?;

  let keys = InterruptKeys::install()?;
  let mut display = OutputWrapper::from_url(&common.display)?.with_keys(keys);

  let summary = pipeline.run(&mut display)?;
  Ok(summary)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Parser, Debug)]
  struct TestArgs {
    #[command(flatten)]
    common: CommonArgs,
  }

  #[test]
  fn positionals_and_defaults() {
    let args = TestArgs::try_parse_from(["npu", "model.rknn", "labels.txt"]).unwrap();
    assert_eq!(args.common.model_file, PathBuf::from("model.rknn"));
    assert_eq!(args.common.label_file, PathBuf::from("labels.txt"));
    assert_eq!(args.common.camera.as_str(), DEFAULT_CAMERA_URL);
    assert_eq!(args.common.display.scheme(), Url::parse(DEFAULT_DISPLAY_URL).unwrap().scheme());
    assert!(args.common.font.is_none());
  }

  #[test]
  fn wrong_argument_count_is_a_usage_error() {
    let err = TestArgs::try_parse_from(["npu", "model.rknn"]).unwrap_err();
    assert!(err.use_stderr());
    let err = TestArgs::try_parse_from(["npu", "a", "b", "c"]).unwrap_err();
    assert!(err.use_stderr());
  }

  #[test]
  fn help_is_not_an_error_exit() {
    let err = TestArgs::try_parse_from(["npu", "--help"]).unwrap_err();
    assert!(!err.use_stderr());
  }

  #[test]
  fn camera_url_is_parsed() {
    let args = TestArgs::try_parse_from([
      "npu",
      "m",
      "l",
      "--camera",
      "gst://camera/dev/video2?width=640",
    ])
    .unwrap();
    assert_eq!(args.common.camera.host_str(), Some("camera"));
    assert_eq!(args.common.camera.path(), "/dev/video2");
  }
}
