// 该文件是 Yeguang （夜光） 项目的一部分。
// src/interpreter.rs - 解释器外观
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

//! 持有一个已加载模型及其执行上下文。
//!
//! `try_*` 方法返回结构化错误；`run_*` 方法面向 JNI 边界，
//! 任何失败都记录日志后返回 `None`，不会返回部分结果。

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::InterpreterConfig,
  frame::{EnhanceFrame, FrameError, INPUT_HEIGHT, INPUT_WIDTH},
  model::{Backend, FaceEmbedding, LowLightEnhancement, Model, ModelError},
};

#[derive(Error, Debug)]
pub enum InterpreterError {
  #[error("解释器未创建或已释放")]
  NotReady,
  #[error("模型加载失败: {0}")]
  Load(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("输入错误: {0}")]
  Frame(#[from] FrameError),
  #[error("推理失败: {0}")]
  Model(#[from] ModelError),
}

pub struct Interpreter<B> {
  backend: Option<B>,
  config: InterpreterConfig,
}

impl<B: Backend> Interpreter<B> {
  pub fn initialize(model: &[u8], config: InterpreterConfig) -> Result<Self, InterpreterError> {
    if config.backend.use_gpu {
      info!("创建解释器（请求 GPU 加速）");
    } else {
      info!("创建解释器（CPU）");
    }

    let backend =
      B::load(model, &config.backend).map_err(|e| InterpreterError::Load(Box::new(e)))?;

    info!("解释器创建成功");
    Ok(Interpreter {
      backend: Some(backend),
      config,
    })
  }

  pub fn is_ready(&self) -> bool {
    self.backend.is_some()
  }

  pub fn try_enhance(&mut self, pixels: &[i32]) -> Result<Vec<i32>, InterpreterError> {
    let backend = self.backend.as_mut().ok_or(InterpreterError::NotReady)?;
    let (frame, layout) = EnhanceFrame::from_pixels(pixels)?;
    debug!("输入像素排布: {:?}", layout);

    let now = std::time::Instant::now();
    let enhanced = LowLightEnhancement::<_, INPUT_WIDTH, INPUT_HEIGHT>::new(
      backend,
      self.config.enhancement,
    )
    .infer(&frame)?;
    debug!("低照度增强完成，耗时: {:.2?}", now.elapsed());

    Ok(enhanced.to_pixels(layout))
  }

  pub fn try_face_embedding(&mut self, pixels: &[i32]) -> Result<Vec<f32>, InterpreterError> {
    let backend = self.backend.as_mut().ok_or(InterpreterError::NotReady)?;
    let (frame, _) = EnhanceFrame::from_pixels(pixels)?;

    let now = std::time::Instant::now();
    let embedding =
      FaceEmbedding::<_, EnhanceFrame>::new(backend, self.config.embedding).infer(&frame)?;
    debug!(
      "人脸特征计算完成，维度 {}，耗时: {:.2?}",
      embedding.len(),
      now.elapsed()
    );

    Ok(embedding.into_vec())
  }

  pub fn run_enhancement(&mut self, pixels: &[i32]) -> Option<Vec<i32>> {
    self
      .try_enhance(pixels)
      .inspect_err(|e| error!("低照度增强失败: {}", e))
      .ok()
  }

  pub fn run_face_embedding(&mut self, pixels: &[i32]) -> Option<Vec<f32>> {
    self
      .try_face_embedding(pixels)
      .inspect_err(|e| error!("人脸特征计算失败: {}", e))
      .ok()
  }

  /// 释放推理引擎，可重复调用
  pub fn shutdown(&mut self) {
    match self.backend.take() {
      Some(backend) => {
        drop(backend);
        info!("解释器已释放");
      }
      None => warn!("解释器已经释放，忽略重复释放"),
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::{
    frame::INPUT_VALUE_COUNT,
    model::{BackendOptions, Tensor},
  };

  #[derive(Error, Debug)]
  #[error("mock backend: {0}")]
  pub struct MockError(&'static str);

  /// 按模型字节选择行为的测试后端
  pub struct MockBackend {
    input_shape: Vec<i64>,
    output_shape: Vec<i64>,
    mode: MockMode,
    pub runs: usize,
  }

  #[derive(Clone, Copy, PartialEq)]
  enum MockMode {
    /// 原样返回输入张量
    Identity,
    /// 返回一个比期望少一个元素的张量
    Truncated,
    /// 返回给定数量的特征值
    Embedding(usize),
    Fail,
  }

  impl Backend for MockBackend {
    type Error = MockError;

    fn load(model: &[u8], _options: &BackendOptions) -> Result<Self, Self::Error> {
      let h = INPUT_HEIGHT as i64;
      let w = INPUT_WIDTH as i64;
      let (mode, input_shape, output_shape) = match model {
        b"identity" => (MockMode::Identity, vec![1, h, w, 3], vec![1, h, w, 3]),
        b"identity-nchw" => (MockMode::Identity, vec![1, 3, -1, -1], vec![1, 3, -1, -1]),
        b"truncated" => (MockMode::Truncated, vec![1, h, w, 3], vec![1, h, w, 3]),
        b"face" => (MockMode::Embedding(192), vec![1, 112, 112, 3], vec![1, 192]),
        b"face-short" => (MockMode::Embedding(127), vec![1, 112, 112, 3], vec![1, 128]),
        b"face-empty" => (MockMode::Embedding(0), vec![1, 112, 112, 3], vec![1, -1]),
        b"face-nchw" => (MockMode::Embedding(128), vec![1, 3, 112, 112], vec![1, -1]),
        b"fail" => (MockMode::Fail, vec![1, h, w, 3], vec![1, h, w, 3]),
        _ => return Err(MockError("unparseable model")),
      };
      Ok(MockBackend {
        input_shape,
        output_shape,
        mode,
        runs: 0,
      })
    }

    fn input_shape(&self) -> &[i64] {
      &self.input_shape
    }

    fn output_shape(&self) -> &[i64] {
      &self.output_shape
    }

    fn run(&mut self, input: Tensor) -> Result<Tensor, Self::Error> {
      self.runs += 1;
      match self.mode {
        MockMode::Identity => Ok(input),
        MockMode::Truncated => {
          let mut data = input.data.into_vec();
          data.pop();
          Ok(Tensor::new(vec![data.len()], data))
        }
        MockMode::Embedding(values) => {
          let declared: Vec<usize> = self.input_shape.iter().map(|&d| d as usize).collect();
          assert_eq!(&*input.shape, declared.as_slice());
          assert_eq!(input.element_count(), declared.iter().product::<usize>());
          Ok(Tensor::new(vec![1, values], vec![0.5f32; values]))
        }
        MockMode::Fail => Err(MockError("invoke failed")),
      }
    }
  }

  fn gradient() -> Vec<i32> {
    (0..INPUT_VALUE_COUNT).map(|i| (i % 256) as i32).collect()
  }

  fn interpreter(model: &[u8]) -> Interpreter<MockBackend> {
    Interpreter::initialize(model, InterpreterConfig::default()).unwrap()
  }

  #[test]
  fn initialize_fails_on_unparseable_model() {
    let result = Interpreter::<MockBackend>::initialize(b"garbage", InterpreterConfig::default());
    assert!(matches!(result, Err(InterpreterError::Load(_))));
  }

  #[test]
  fn enhancement_keeps_fixed_shape() {
    let mut interp = interpreter(b"identity");
    assert!(interp.is_ready());
    let input = gradient();
    let output = interp.run_enhancement(&input).unwrap();
    assert_eq!(output.len(), INPUT_VALUE_COUNT);
    assert_eq!(output, input);
  }

  #[test]
  fn enhancement_handles_nchw_models() {
    let mut interp = interpreter(b"identity-nchw");
    let input = gradient();
    assert_eq!(interp.run_enhancement(&input), Some(input));
  }

  #[test]
  fn enhancement_preserves_packed_layout() {
    let mut interp = interpreter(b"identity");
    let input: Vec<i32> = (0..(INPUT_WIDTH * INPUT_HEIGHT) as i32)
      .map(|i| (0xFF00_0000u32 | (i as u32 & 0x00FF_FFFF)) as i32)
      .collect();
    let output = interp.run_enhancement(&input).unwrap();
    assert_eq!(output.len(), 240_000);
    assert_eq!(output, input);
  }

  #[test]
  fn enhancement_rejects_bad_input() {
    let mut interp = interpreter(b"identity");
    assert_eq!(interp.run_enhancement(&[0; 10]), None);
    assert!(matches!(
      interp.try_enhance(&[0; 10]),
      Err(InterpreterError::Frame(FrameError::LengthMismatch { .. }))
    ));
    assert_eq!(interp.backend.as_ref().map(|b| b.runs), Some(0));
  }

  #[test]
  fn no_partial_output_on_failure() {
    let mut interp = interpreter(b"truncated");
    assert!(matches!(
      interp.try_enhance(&gradient()),
      Err(InterpreterError::Model(ModelError::OutputMismatch { .. }))
    ));

    let mut interp = interpreter(b"fail");
    assert_eq!(interp.run_enhancement(&gradient()), None);
  }

  #[test]
  fn shutdown_is_idempotent_and_final() {
    let mut interp = interpreter(b"identity");
    interp.shutdown();
    interp.shutdown();
    assert!(!interp.is_ready());
    assert_eq!(interp.run_enhancement(&gradient()), None);
    assert_eq!(interp.run_face_embedding(&gradient()), None);
    assert!(matches!(
      interp.try_enhance(&gradient()),
      Err(InterpreterError::NotReady)
    ));
  }

  #[test]
  fn embedding_matches_declared_dimension() {
    let mut interp = interpreter(b"face");
    let embedding = interp.run_face_embedding(&gradient()).unwrap();
    assert_eq!(embedding.len(), 192);
  }

  #[test]
  fn embedding_rejects_dimension_mismatch() {
    let mut interp = interpreter(b"face-short");
    assert!(matches!(
      interp.try_face_embedding(&gradient()),
      Err(InterpreterError::Model(ModelError::OutputMismatch {
        expected: 128,
        actual: 127
      }))
    ));
    assert_eq!(interp.run_face_embedding(&gradient()), None);
  }

  #[test]
  fn embedding_rejects_empty_output() {
    let mut interp = interpreter(b"face-empty");
    assert!(matches!(
      interp.try_face_embedding(&gradient()),
      Err(InterpreterError::Model(ModelError::OutputMismatch { actual: 0, .. }))
    ));
  }

  #[test]
  fn embedding_resizes_for_nchw_models() {
    let mut interp = interpreter(b"face-nchw");
    let embedding = interp.run_face_embedding(&gradient()).unwrap();
    // 输出维度为动态时接受引擎给出的长度
    assert_eq!(embedding.len(), 128);
    assert_eq!(interp.backend.as_ref().map(|b| b.runs), Some(1));
  }
}
