// 该文件是 Yeguang （夜光） 项目的一部分。
// src/model/backend.rs - 推理后端约定
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

/// 跨越推理引擎边界的唯一数据形式
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  pub shape: Box<[usize]>,
  pub data: Box<[f32]>,
}

impl Tensor {
  pub fn new(shape: impl Into<Box<[usize]>>, data: impl Into<Box<[f32]>>) -> Self {
    Self {
      shape: shape.into(),
      data: data.into(),
    }
  }

  pub fn element_count(&self) -> usize {
    self.data.len()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOptions {
  /// 尝试启用硬件加速，失败时静默回退到 CPU
  pub use_gpu: bool,
  /// 算子内线程数，None 表示由运行时决定
  pub intra_threads: Option<usize>,
}

/// 外部推理引擎：加载、推理、释放（Drop）
pub trait Backend: Sized + Send {
  type Error: std::error::Error + Send + Sync + 'static;

  fn load(model: &[u8], options: &BackendOptions) -> Result<Self, Self::Error>;

  /// 模型声明的输入形状，非正数表示动态维度
  fn input_shape(&self) -> &[i64];

  /// 模型声明的输出形状，非正数表示动态维度
  fn output_shape(&self) -> &[i64];

  fn run(&mut self, input: Tensor) -> Result<Tensor, Self::Error>;
}
