// 该文件是 Yeguang （夜光） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

use crate::frame::{FrameError, IMAGE_CHANNELS};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("推理后端错误: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("张量形状不支持: {0:?}")]
  UnsupportedShape(Vec<i64>),
  #[error("输出大小不匹配: 期望 {expected}, 实际 {actual}")]
  OutputMismatch { expected: usize, actual: usize },
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
}

impl ModelError {
  pub fn backend<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    ModelError::Backend(Box::new(err))
  }
}

/// 像素 v 以 (v - mean) / std 送入模型
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
  pub mean: f32,
  pub std: f32,
}

impl Normalization {
  /// 映射到 [0, 1]
  pub const UNIT: Normalization = Normalization {
    mean: 0.0,
    std: 255.0,
  };

  /// 映射到约 [-1, 1]
  pub const SYMMETRIC: Normalization = Normalization {
    mean: 127.5,
    std: 128.0,
  };

  pub fn normalize(&self, value: u8) -> f32 {
    (value as f32 - self.mean) / self.std
  }

  pub fn denormalize(&self, value: f32) -> u8 {
    (value * self.std + self.mean).round().clamp(0.0, 255.0) as u8
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
  Nhwc,
  Nchw,
}

impl TensorLayout {
  /// 通道维为 3 的位置决定排布，优先按 NHWC 判断
  pub fn detect(shape: &[i64]) -> Option<Self> {
    if shape.len() != 4 {
      return None;
    }
    if shape[3] == IMAGE_CHANNELS as i64 {
      Some(TensorLayout::Nhwc)
    } else if shape[1] == IMAGE_CHANNELS as i64 {
      Some(TensorLayout::Nchw)
    } else {
      None
    }
  }
}

/// 模型输入的排布与空间尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputGeometry {
  pub layout: TensorLayout,
  pub height: usize,
  pub width: usize,
}

impl InputGeometry {
  /// 动态维度取帧本身的尺寸
  pub fn resolve(shape: &[i64], height: usize, width: usize) -> Result<Self, ModelError> {
    let unsupported = || ModelError::UnsupportedShape(shape.to_vec());
    let layout = TensorLayout::detect(shape).ok_or_else(unsupported)?;
    if shape[0] > 1 {
      return Err(unsupported());
    }

    let (h, w) = match layout {
      TensorLayout::Nhwc => (shape[1], shape[2]),
      TensorLayout::Nchw => (shape[2], shape[3]),
    };
    let pick = |declared: i64, fallback: usize| {
      if declared > 0 {
        declared as usize
      } else {
        fallback
      }
    };

    Ok(InputGeometry {
      layout,
      height: pick(h, height),
      width: pick(w, width),
    })
  }

  pub fn value_count(&self) -> usize {
    self.height * self.width * IMAGE_CHANNELS
  }

  pub fn shape(&self) -> [usize; 4] {
    match self.layout {
      TensorLayout::Nhwc => [1, self.height, self.width, IMAGE_CHANNELS],
      TensorLayout::Nchw => [1, IMAGE_CHANNELS, self.height, self.width],
    }
  }

  /// 将 HWC 字节打包成模型输入
  pub fn pack(&self, hwc: &[u8], normalization: Normalization) -> Tensor {
    let data: Vec<f32> = match self.layout {
      TensorLayout::Nhwc => hwc.iter().map(|&v| normalization.normalize(v)).collect(),
      TensorLayout::Nchw => {
        let plane = self.height * self.width;
        let mut data = vec![0f32; plane * IMAGE_CHANNELS];
        for (i, rgb) in hwc.chunks_exact(IMAGE_CHANNELS).enumerate() {
          for (c, &v) in rgb.iter().enumerate() {
            data[c * plane + i] = normalization.normalize(v);
          }
        }
        data
      }
    };
    Tensor::new(self.shape(), data)
  }

  /// 将模型输出还原为 HWC 字节
  pub fn unpack(&self, values: &[f32], normalization: Normalization) -> Vec<u8> {
    match self.layout {
      TensorLayout::Nhwc => values.iter().map(|&v| normalization.denormalize(v)).collect(),
      TensorLayout::Nchw => {
        let plane = self.height * self.width;
        let mut hwc = Vec::with_capacity(values.len());
        for i in 0..plane {
          for c in 0..IMAGE_CHANNELS {
            hwc.push(normalization.denormalize(values[c * plane + i]));
          }
        }
        hwc
      }
    }
  }
}

mod backend;
mod enhancement;
mod face_embedding;
mod ort_backend;

pub use self::backend::{Backend, BackendOptions, Tensor};
pub use self::enhancement::LowLightEnhancement;
pub use self::face_embedding::FaceEmbedding;
pub use self::ort_backend::{OrtBackend, OrtBackendError};
