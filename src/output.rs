// 该文件是 Yeguang （夜光） 项目的一部分。
// src/output.rs - 推理结果输出
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

use std::{io::Write, path::Path};

use image::RgbImage;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Embedding, RgbFrame},
};

pub trait Render<F, D> {
  type Error;
  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error>;
}

fn ensure_parent(path: &str) -> std::io::Result<()> {
  if let Some(parent) = Path::new(path).parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  Ok(())
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 保存增强后的图像；`?compare` 时左右拼接原图与结果
pub struct SaveImageFileOutput<const W: u32, const H: u32> {
  path: String,
  compare: bool,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for SaveImageFileOutput<W, H> {
  const SCHEME: &'static str = "image";
}

impl<const W: u32, const H: u32> FromUrl for SaveImageFileOutput<W, H> {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
      compare: uri.query_pairs().any(|(k, _)| k == "compare"),
    })
  }
}

impl<const W: u32, const H: u32> SaveImageFileOutput<W, H> {
  fn compose(&self, frame: &RgbFrame<W, H>, result: &RgbFrame<W, H>) -> RgbImage {
    if !self.compare {
      return result.to_rgb_image();
    }
    let mut canvas = RgbImage::new(W * 2, H);
    image::imageops::replace(&mut canvas, &frame.to_rgb_image(), 0, 0);
    image::imageops::replace(&mut canvas, &result.to_rgb_image(), W as i64, 0);
    canvas
  }
}

impl<const W: u32, const H: u32> Render<RgbFrame<W, H>, RgbFrame<W, H>>
  for SaveImageFileOutput<W, H>
{
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    frame: &RgbFrame<W, H>,
    result: &RgbFrame<W, H>,
  ) -> Result<(), Self::Error> {
    ensure_parent(&self.path)?;
    self.compose(frame, result).save(&self.path)?;
    warn!("保存图像到文件: {}", self.path);
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum JsonOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 将特征向量写为 JSON，路径为空时写到标准输出
pub struct JsonOutput {
  path: Option<String>,
  normalize: bool,
}

impl FromUrlWithScheme for JsonOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonOutput {
  type Error = JsonOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonOutputError::SchemeMismatch);
    }
    let path = match uri.path() {
      "" | "/" | "-" => None,
      path => Some(path.to_string()),
    };
    Ok(JsonOutput {
      path,
      normalize: uri.query_pairs().any(|(k, _)| k == "normalize"),
    })
  }
}

impl JsonOutput {
  pub fn to_json(&self, embedding: &Embedding) -> serde_json::Value {
    let embedding = if self.normalize {
      embedding.l2_normalized()
    } else {
      embedding.clone()
    };
    json!({
      "dimension": embedding.len(),
      "normalized": self.normalize,
      "embedding": embedding.as_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Render<RgbFrame<W, H>, Embedding> for JsonOutput {
  type Error = JsonOutputError;

  fn render_result(&self, _frame: &RgbFrame<W, H>, result: &Embedding) -> Result<(), Self::Error> {
    let value = self.to_json(result);
    match &self.path {
      Some(path) => {
        ensure_parent(path)?;
        std::fs::write(path, serde_json::to_vec_pretty(&value)?)?;
        info!("特征向量写入文件: {}", path);
      }
      None => {
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer(&mut stdout, &value)?;
        writeln!(stdout)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn json_output_targets() {
    let stdout = JsonOutput::from_url(&Url::parse("json:").unwrap()).unwrap();
    assert!(stdout.path.is_none());
    let file = JsonOutput::from_url(&Url::parse("json:///tmp/e.json?normalize").unwrap()).unwrap();
    assert_eq!(file.path.as_deref(), Some("/tmp/e.json"));
    assert!(file.normalize);
  }

  #[test]
  fn json_payload_carries_dimension() {
    let output = JsonOutput {
      path: None,
      normalize: true,
    };
    let value = output.to_json(&Embedding::from(vec![0.0, 2.0]));
    assert_eq!(value["dimension"], 2);
    assert_eq!(value["embedding"][1], 1.0);
  }

  #[test]
  fn compare_mode_doubles_width() {
    let output = SaveImageFileOutput::<4, 2>::from_url(&Url::parse("image:///tmp/x.png?compare").unwrap())
      .unwrap();
    let frame = RgbFrame::<4, 2>::default();
    assert_eq!(output.compose(&frame, &frame).dimensions(), (8, 2));
  }

  #[test]
  fn writes_enhanced_image() {
    let path = std::env::temp_dir().join("yeguang-output-test.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::<4, 2>::from_url(&url).unwrap();
    let frame = RgbFrame::<4, 2>::default();
    output.render_result(&frame, &frame).unwrap();
    assert_eq!(image::image_dimensions(&path).unwrap(), (4, 2));
    let _ = std::fs::remove_file(path);
  }
}
