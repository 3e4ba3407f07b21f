// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/bin/npu_classify.rs - 实时图像分类
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
  model::{ClassifyConfig, DEFAULT_CLASSIFY_THRESHOLD, PipelineMode},
};

/// 摄像头实时分类，结果叠加在画面左上角
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub common: CommonArgs,

  /// 显示的最低得分
  #[arg(long, value_name = "THRESHOLD", default_value_t = DEFAULT_CLASSIFY_THRESHOLD)]
  pub threshold: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args: Args = parse_args();
  info!("分类得分阈值: {}", args.threshold);

  let mode = PipelineMode::Classification(ClassifyConfig {
    threshold: args.threshold,
  });
  let summary = run(&args.common, mode)?;
  info!("分类结束，共 {} 帧", summary.frames);

  Ok(())
}
