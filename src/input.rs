// 该文件是 Yeguang （夜光） 项目的一部分。
// src/input.rs - 图像文件输入
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

use image::{ImageReader, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameError, RgbFrame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Frame error: {0}")]
  FrameError(#[from] FrameError),
}

/// 读取一张图像，缩放到 W x H 后作为单帧输出
pub struct ImageFileInput<const W: u32, const H: u32> {
  frame: Option<RgbFrame<W, H>>,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageFileInput<W, H> {
  const SCHEME: &'static str = "image";
}

impl<const W: u32, const H: u32> FromUrl for ImageFileInput<W, H> {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let image = ImageReader::open(url.path())?.decode()?.into_rgb8();
    Ok(ImageFileInput {
      frame: Some(fit(image)?),
    })
  }
}

fn fit<const W: u32, const H: u32>(image: RgbImage) -> Result<RgbFrame<W, H>, FrameError> {
  let (width, height) = image.dimensions();
  let image = if (width, height) == (W, H) {
    image
  } else {
    debug!("缩放输入图像 {}x{} -> {}x{}", width, height, W, H);
    image::imageops::resize(&image, W, H, FilterType::Triangle)
  };
  RgbFrame::try_from(image)
}

impl<const W: u32, const H: u32> Iterator for ImageFileInput<W, H> {
  type Item = RgbFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}
