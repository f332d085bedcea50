// 该文件是 Yeguang （夜光） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;

pub const INPUT_WIDTH: u32 = 600;
pub const INPUT_HEIGHT: u32 = 400;
pub const IMAGE_CHANNELS: usize = 3;
pub const INPUT_VALUE_COUNT: usize = INPUT_WIDTH as usize * INPUT_HEIGHT as usize * IMAGE_CHANNELS;
pub const OUTPUT_WIDTH: u32 = INPUT_WIDTH;
pub const OUTPUT_HEIGHT: u32 = INPUT_HEIGHT;

/// 低照度增强模型的输入输出帧
pub type EnhanceFrame = RgbFrame<INPUT_WIDTH, INPUT_HEIGHT>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected} 或 {packed}, 实际长度 {actual}")]
  LengthMismatch {
    expected: usize,
    packed: usize,
    actual: usize,
  },
  #[error("像素值越界: 索引 {index}, 值 {value}")]
  ValueOutOfRange { index: usize, value: i32 },
  #[error("图像尺寸不匹配: 期望 {expected_w}x{expected_h}, 实际 {actual_w}x{actual_h}")]
  DimensionMismatch {
    expected_w: u32,
    expected_h: u32,
    actual_w: u32,
    actual_h: u32,
  },
}

/// 边界上整数像素缓冲区的排布方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
  /// 每个通道值一个整数，长度为 W * H * 3
  InterleavedRgb,
  /// 每个像素一个 0xAARRGGBB 整数（Android `Bitmap.getPixels`），长度为 W * H
  PackedArgb,
}

impl PixelLayout {
  pub fn detect<const W: u32, const H: u32>(len: usize) -> Result<Self, FrameError> {
    let pixels = W as usize * H as usize;
    if len == pixels * IMAGE_CHANNELS {
      Ok(PixelLayout::InterleavedRgb)
    } else if len == pixels {
      Ok(PixelLayout::PackedArgb)
    } else {
      Err(FrameError::LengthMismatch {
        expected: pixels * IMAGE_CHANNELS,
        packed: pixels,
        actual: len,
      })
    }
  }
}

/// HWC 排布的 RGB8 帧，长度恒为 W * H * 3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> Default for RgbFrame<W, H> {
  fn default() -> Self {
    let data = vec![0u8; Self::value_count()].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> RgbFrame<W, H> {
  pub const fn value_count() -> usize {
    W as usize * H as usize * IMAGE_CHANNELS
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    IMAGE_CHANNELS
  }

  pub fn as_hwc(&self) -> &[u8] {
    &self.data
  }

  /// 从 HWC 字节构造帧，长度必须恰好为 W * H * 3
  pub fn from_hwc(data: Vec<u8>) -> Result<Self, FrameError> {
    if data.len() != Self::value_count() {
      return Err(FrameError::LengthMismatch {
        expected: Self::value_count(),
        packed: W as usize * H as usize,
        actual: data.len(),
      });
    }
    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }

  /// 解析边界传入的整数像素，排布由长度决定
  pub fn from_pixels(pixels: &[i32]) -> Result<(Self, PixelLayout), FrameError> {
    let layout = PixelLayout::detect::<W, H>(pixels.len())?;
    let data = match layout {
      PixelLayout::InterleavedRgb => pixels
        .iter()
        .enumerate()
        .map(|(index, &value)| {
          u8::try_from(value).map_err(|_| FrameError::ValueOutOfRange { index, value })
        })
        .collect::<Result<Vec<u8>, _>>()?,
      PixelLayout::PackedArgb => {
        let mut data = Vec::with_capacity(Self::value_count());
        for &argb in pixels {
          let argb = argb as u32;
          data.push((argb >> 16) as u8);
          data.push((argb >> 8) as u8);
          data.push(argb as u8);
        }
        data
      }
    };

    Ok((
      Self {
        data: data.into_boxed_slice(),
      },
      layout,
    ))
  }

  pub fn to_pixels(&self, layout: PixelLayout) -> Vec<i32> {
    match layout {
      PixelLayout::InterleavedRgb => self.data.iter().map(|&v| v as i32).collect(),
      PixelLayout::PackedArgb => self
        .data
        .chunks_exact(IMAGE_CHANNELS)
        .map(|rgb| {
          (0xFF00_0000u32 | (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32) as i32
        })
        .collect(),
    }
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    let mut image = RgbImage::new(W, H);
    image.copy_from_slice(&self.data);
    image
  }

  /// 缩放到模型声明的输入尺寸，尺寸一致时直接复制
  pub fn resized(&self, width: u32, height: u32) -> RgbImage {
    let image = self.to_rgb_image();
    if width == W && height == H {
      return image;
    }
    image::imageops::resize(&image, width, height, FilterType::Triangle)
  }
}

impl<const W: u32, const H: u32> TryFrom<RgbImage> for RgbFrame<W, H> {
  type Error = FrameError;

  fn try_from(image: RgbImage) -> Result<Self, Self::Error> {
    let (actual_w, actual_h) = image.dimensions();
    if actual_w != W || actual_h != H {
      return Err(FrameError::DimensionMismatch {
        expected_w: W,
        expected_h: H,
        actual_w,
        actual_h,
      });
    }
    Self::from_hwc(image.into_raw())
  }
}

/// 人脸特征向量
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
  values: Box<[f32]>,
}

impl From<Vec<f32>> for Embedding {
  fn from(values: Vec<f32>) -> Self {
    Self {
      values: values.into_boxed_slice(),
    }
  }
}

impl Embedding {
  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.values
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.values.into_vec()
  }

  pub fn l2_normalized(&self) -> Embedding {
    let norm = self.values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
      return self.clone();
    }
    self.values.iter().map(|v| v / norm).collect::<Vec<_>>().into()
  }

  /// 余弦相似度，长度不一致或任一向量为零时返回 None
  pub fn cosine_similarity(&self, other: &Embedding) -> Option<f32> {
    if self.len() != other.len() || self.is_empty() {
      return None;
    }
    let dot: f32 = self.values.iter().zip(other.values.iter()).map(|(a, b)| a * b).sum();
    let na = self.values.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb = other.values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
      return None;
    }
    Some(dot / (na * nb))
  }
}
