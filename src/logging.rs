// 该文件是 Yeguang （夜光） 项目的一部分。
// src/logging.rs - 日志初始化
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

pub const LOG_TAG: &str = "yeguang";

/// 安装日志输出，仅第一次调用生效。
///
/// Android 上标准输出会被丢弃，`tracing` 事件经由 `log` 桥接交给
/// `android_logger` 写入 logcat。
#[cfg(target_os = "android")]
pub fn init() {
  use android_logger::Config;
  use log::LevelFilter;

  android_logger::init_once(
    Config::default()
      .with_max_level(LevelFilter::Info)
      .with_tag(LOG_TAG),
  );
}

#[cfg(not(target_os = "android"))]
pub fn init() {
  use std::sync::Once;

  static INIT: Once = Once::new();
  INIT.call_once(|| {
    // 宿主进程可能已经安装了订阅者
    let _ = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::INFO)
      .try_init();
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn init_is_idempotent() {
    init();
    init();
    tracing::info!("日志已初始化");
  }
}
