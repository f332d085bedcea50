// 该文件是 Yeguang （夜光） 项目的一部分。
// src/bin/face_embedding.rs - 计算人脸特征向量
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use yeguang::{
  FromUrl,
  config::ModelSource,
  frame::{EnhanceFrame, INPUT_HEIGHT, INPUT_WIDTH},
  input::ImageFileInput,
  model::{Backend, FaceEmbedding, OrtBackend},
  output::JsonOutput,
  task::{OneShotTask, Task},
};
use tracing::info;

/// Yeguang 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 人脸特征模型，例如 model:///data/mobile_face_net.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出位置，json: 表示标准输出，json:///tmp/e.json?normalize 写入文件
  #[arg(long, value_name = "OUTPUT", default_value = "json:")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt().with_writer(std::io::stderr).init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);

  let source = ModelSource::from_url(&args.model)?;
  let mut backend = OrtBackend::load(&source.read()?, &source.config.backend)?;

  let input = ImageFileInput::<INPUT_WIDTH, INPUT_HEIGHT>::from_url(&args.input)?;
  let model = FaceEmbedding::<_, EnhanceFrame>::new(&mut backend, source.config.embedding);
  let output = JsonOutput::from_url(&args.output)?;

  OneShotTask.run_task(input, model, output)?;

  Ok(())
}
