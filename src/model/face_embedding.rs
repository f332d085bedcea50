// 该文件是 Yeguang （夜光） 项目的一部分。
// src/model/face_embedding.rs - 人脸特征模型
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

use std::marker::PhantomData;

use tracing::debug;

use crate::{
  frame::{Embedding, RgbFrame},
  model::{Backend, InputGeometry, Model, ModelError, Normalization},
};

pub struct FaceEmbedding<'a, B, Frame> {
  backend: &'a mut B,
  normalization: Normalization,
  _phantom: PhantomData<Frame>,
}

impl<'a, B: Backend, Frame> FaceEmbedding<'a, B, Frame> {
  pub fn new(backend: &'a mut B, normalization: Normalization) -> Self {
    Self {
      backend,
      normalization,
      _phantom: PhantomData,
    }
  }

  /// 模型声明的特征维度，批次维之外存在动态维度时返回 None
  pub fn declared_dimension(&self) -> Option<usize> {
    let shape = self.backend.output_shape();
    let features = shape.get(1..).filter(|dims| !dims.is_empty())?;
    features
      .iter()
      .try_fold(1usize, |acc, &d| (d > 0).then(|| acc * d as usize))
  }
}

impl<'a, B: Backend, const W: u32, const H: u32> Model for FaceEmbedding<'a, B, RgbFrame<W, H>> {
  type Input = RgbFrame<W, H>;
  type Output = Embedding;
  type Error = ModelError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let geometry = InputGeometry::resolve(self.backend.input_shape(), H as usize, W as usize)?;

    let tensor = if geometry.height == H as usize && geometry.width == W as usize {
      geometry.pack(input.as_hwc(), self.normalization)
    } else {
      debug!(
        "缩放输入 {}x{} -> {}x{}",
        W, H, geometry.width, geometry.height
      );
      let resized = input.resized(geometry.width as u32, geometry.height as u32);
      geometry.pack(resized.as_raw(), self.normalization)
    };

    debug!("执行模型推理");
    let output = self.backend.run(tensor).map_err(ModelError::backend)?;
    debug!("模型输出形状: {:?}", output.shape);

    if let Some(expected) = self.declared_dimension()
      && expected != output.element_count()
    {
      return Err(ModelError::OutputMismatch {
        expected,
        actual: output.element_count(),
      });
    }
    if output.element_count() == 0 {
      return Err(ModelError::OutputMismatch {
        expected: 1,
        actual: 0,
      });
    }

    Ok(Embedding::from(output.data.into_vec()))
  }
}
