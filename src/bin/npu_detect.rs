// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/bin/npu_detect.rs - 实时目标检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::info;

use shuofeng::{
  args::{CommonArgs, parse_args, run},
  model::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_LABEL_OFFSET, DEFAULT_PALETTE_CLASSES, DetectConfig,
    PipelineMode,
  },
};

/// 摄像头实时目标检测，画出检测框、标签与帧率
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub common: CommonArgs,

  /// 置信度阈值，严格大于才保留
  #[arg(long, value_name = "THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
  pub confidence: f32,

  /// 模型类别到标签行号的偏移
  #[arg(long, value_name = "N", default_value_t = DEFAULT_LABEL_OFFSET, allow_negative_numbers = true)]
  pub label_offset: i32,

  /// 调色板覆盖的类别数
  #[arg(long, value_name = "N", default_value_t = DEFAULT_PALETTE_CLASSES)]
  pub palette_classes: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args: Args = parse_args();
  info!(
    "置信度阈值: {}, 标签偏移: {}, 调色板类别数: {}",
    args.confidence, args.label_offset, args.palette_classes
  );

  let mode = PipelineMode::Detection(DetectConfig {
    confidence_threshold: args.confidence,
    label_offset: args.label_offset,
    palette_classes: args.palette_classes,
  });
  let summary = run(&args.common, mode)?;
  info!("检测结束，共 {} 帧", summary.frames);

  Ok(())
}
