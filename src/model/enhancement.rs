// 该文件是 Yeguang （夜光） 项目的一部分。
// src/model/enhancement.rs - 低照度增强模型
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

use tracing::debug;

use crate::{
  frame::{INPUT_HEIGHT, INPUT_WIDTH, RgbFrame},
  model::{Backend, InputGeometry, Model, ModelError, Normalization, Tensor, TensorLayout},
};

pub struct LowLightEnhancement<'a, B, const W: u32 = INPUT_WIDTH, const H: u32 = INPUT_HEIGHT> {
  backend: &'a mut B,
  normalization: Normalization,
}

impl<'a, B: Backend, const W: u32, const H: u32> LowLightEnhancement<'a, B, W, H> {
  pub fn new(backend: &'a mut B, normalization: Normalization) -> Self {
    Self {
      backend,
      normalization,
    }
  }

  fn postprocess(
    &self,
    input: &InputGeometry,
    output: Tensor,
  ) -> Result<RgbFrame<W, H>, ModelError> {
    let expected = RgbFrame::<W, H>::value_count();
    if output.element_count() != expected {
      return Err(ModelError::OutputMismatch {
        expected,
        actual: output.element_count(),
      });
    }

    // 输出排布以实际形状为准，无法判断时沿用输入排布
    let shape: Vec<i64> = output.shape.iter().map(|&d| d as i64).collect();
    let layout = TensorLayout::detect(&shape).unwrap_or(input.layout);
    let geometry = InputGeometry {
      layout,
      height: H as usize,
      width: W as usize,
    };

    let hwc = geometry.unpack(&output.data, self.normalization);
    Ok(RgbFrame::from_hwc(hwc)?)
  }
}

impl<'a, B: Backend, const W: u32, const H: u32> Model for LowLightEnhancement<'a, B, W, H> {
  type Input = RgbFrame<W, H>;
  type Output = RgbFrame<W, H>;
  type Error = ModelError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let geometry = InputGeometry::resolve(self.backend.input_shape(), H as usize, W as usize)?;
    if geometry.height != H as usize || geometry.width != W as usize {
      return Err(ModelError::UnsupportedShape(self.backend.input_shape().to_vec()));
    }

    debug!("设置模型输入: {:?}", geometry.shape());
    let tensor = geometry.pack(input.as_hwc(), self.normalization);

    debug!("执行模型推理");
    let output = self.backend.run(tensor).map_err(ModelError::backend)?;
    debug!("模型输出形状: {:?}", output.shape);

    self.postprocess(&geometry, output)
  }
}
