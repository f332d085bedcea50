// 该文件是 Yeguang （夜光） 项目的一部分。
// src/config.rs - 解释器配置
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
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{BackendOptions, Normalization},
};

#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterConfig {
  pub backend: BackendOptions,
  pub enhancement: Normalization,
  pub embedding: Normalization,
}

impl Default for InterpreterConfig {
  fn default() -> Self {
    Self {
      backend: BackendOptions::default(),
      enhancement: Normalization::UNIT,
      embedding: Normalization::SYMMETRIC,
    }
  }
}

impl InterpreterConfig {
  pub fn with_gpu(mut self, use_gpu: bool) -> Self {
    self.backend.use_gpu = use_gpu;
    self
  }
}

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("参数 {key} 无效: {value}")]
  InvalidParameter { key: String, value: String },
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
}

/// 模型文件路径及其解释器配置，形如
/// `model:///path/zdce.onnx?gpu=true&threads=4&mean=0&std=255`
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
  pub path: String,
  pub config: InterpreterConfig,
}

impl FromUrlWithScheme for ModelSource {
  const SCHEME: &'static str = "model";
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
  value.parse().map_err(|_| ConfigError::InvalidParameter {
    key: key.to_string(),
    value: value.to_string(),
  })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
  match value {
    "" | "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(ConfigError::InvalidParameter {
      key: key.to_string(),
      value: value.to_string(),
    }),
  }
}

/// 标准差必须为有限正数，否则归一化会产生 inf 或 NaN
fn parse_std(key: &str, value: &str) -> Result<f32, ConfigError> {
  let std: f32 = parse(key, value)?;
  if std.is_finite() && std > 0.0 {
    Ok(std)
  } else {
    Err(ConfigError::InvalidParameter {
      key: key.to_string(),
      value: value.to_string(),
    })
  }
}

impl FromUrl for ModelSource {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ConfigError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let mut config = InterpreterConfig::default();
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "gpu" => config.backend.use_gpu = parse_bool(&key, &value)?,
        "threads" => config.backend.intra_threads = Some(parse(&key, &value)?),
        "mean" => config.enhancement.mean = parse(&key, &value)?,
        "std" => config.enhancement.std = parse_std(&key, &value)?,
        "embedding_mean" => config.embedding.mean = parse(&key, &value)?,
        "embedding_std" => config.embedding.std = parse_std(&key, &value)?,
        _ => {}
      }
    }

    Ok(ModelSource {
      path: url.path().to_string(),
      config,
    })
  }
}

impl ModelSource {
  pub fn read(&self) -> Result<Vec<u8>, ConfigError> {
    info!("加载模型文件: {}", self.path);
    Ok(std::fs::read(&self.path)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_without_query() {
    let url = Url::parse("model:///data/zdce.onnx").unwrap();
    let source = ModelSource::from_url(&url).unwrap();
    assert_eq!(source.path, "/data/zdce.onnx");
    assert_eq!(source.config, InterpreterConfig::default());
  }

  #[test]
  fn query_overrides() {
    let url = Url::parse(
      "model:///data/face.onnx?gpu=true&threads=2&embedding_mean=0&embedding_std=1&unknown=x",
    )
    .unwrap();
    let source = ModelSource::from_url(&url).unwrap();
    assert!(source.config.backend.use_gpu);
    assert_eq!(source.config.backend.intra_threads, Some(2));
    assert_eq!(source.config.embedding, Normalization { mean: 0.0, std: 1.0 });
    assert_eq!(source.config.enhancement, Normalization::UNIT);
  }

  #[test]
  fn malformed_values_are_rejected() {
    let url = Url::parse("model:///m.onnx?threads=many").unwrap();
    assert!(matches!(
      ModelSource::from_url(&url),
      Err(ConfigError::InvalidParameter { .. })
    ));
    let url = Url::parse("model:///m.onnx?gpu=maybe").unwrap();
    assert!(ModelSource::from_url(&url).is_err());
  }

  #[test]
  fn non_positive_std_is_rejected() {
    for query in ["std=0", "std=-255", "std=NaN", "embedding_std=inf", "embedding_std=0"] {
      let url = Url::parse(&format!("model:///m.onnx?{}", query)).unwrap();
      assert!(
        matches!(
          ModelSource::from_url(&url),
          Err(ConfigError::InvalidParameter { .. })
        ),
        "{} 应被拒绝",
        query
      );
    }
    let url = Url::parse("model:///m.onnx?std=127.5").unwrap();
    assert_eq!(ModelSource::from_url(&url).unwrap().config.enhancement.std, 127.5);
  }

  #[test]
  fn wrong_scheme() {
    let url = Url::parse("image:///m.onnx").unwrap();
    assert!(matches!(
      ModelSource::from_url(&url),
      Err(ConfigError::SchemeMismatch { .. })
    ));
  }
}
