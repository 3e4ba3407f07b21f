// 该文件是 Shuofeng （朔风） 项目的一部分。
// src/output/keys.rs - 中断信号转按键
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::info;

use super::{CANCEL_KEY, KeyCode};

/// 将 Ctrl-C 转为取消键
pub struct InterruptKeys {
  rx: Receiver<()>,
}

impl InterruptKeys {
  /// 安装 Ctrl-C 处理函数，每个进程只能调用一次
  pub fn install() -> Result<Self, ctrlc::Error> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
    })?;
    Ok(Self { rx })
  }

  pub fn from_receiver(rx: Receiver<()>) -> Self {
    Self { rx }
  }

  /// 最多等待 `timeout`，收到中断时返回取消键
  pub fn poll(&self, timeout: Duration) -> Option<KeyCode> {
    match self.rx.recv_timeout(timeout) {
      Ok(()) => Some(CANCEL_KEY),
      Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
    }
  }
}
