// 该文件是 Yeguang （夜光） 项目的一部分。
// src/model/ort_backend.rs - ONNX Runtime 推理后端
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

use ndarray::{ArrayD, IxDyn};
use ort::{
  execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch},
  session::{Session, builder::GraphOptimizationLevel},
  value::{Tensor as OrtTensor, ValueType},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::backend::{Backend, BackendOptions, Tensor};

#[derive(Error, Debug)]
pub enum OrtBackendError {
  #[error("ONNX Runtime 错误（{stage}）: {message}")]
  Ort { stage: &'static str, message: String },
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("张量形状错误: {0}")]
  Shape(#[from] ndarray::ShapeError),
}

fn ort_error<E: std::fmt::Display>(stage: &'static str) -> impl FnOnce(E) -> OrtBackendError {
  move |e| OrtBackendError::Ort {
    stage,
    message: e.to_string(),
  }
}

fn declared_shape(value_type: &ValueType) -> Vec<i64> {
  match value_type {
    ValueType::Tensor { shape, .. } => shape.iter().copied().collect(),
    _ => Vec::new(),
  }
}

pub struct OrtBackend {
  session: Session,
  input_name: String,
  output_name: String,
  input_shape: Vec<i64>,
  output_shape: Vec<i64>,
}

fn execution_providers(options: &BackendOptions) -> Vec<ExecutionProviderDispatch> {
  #[allow(unused_mut)]
  let mut providers: Vec<ExecutionProviderDispatch> = Vec::new();

  if options.use_gpu {
    #[cfg(feature = "cuda")]
    providers.push(ort::execution_providers::CUDAExecutionProvider::default().build());
    #[cfg(feature = "nnapi")]
    providers.push(ort::execution_providers::NNAPIExecutionProvider::default().build());

    if providers.is_empty() {
      warn!("未编译任何硬件加速后端，回退到 CPU 推理");
    } else {
      info!("请求硬件加速，共 {} 个候选后端", providers.len());
    }
  }

  // 硬件后端注册失败时 ONNX Runtime 只记录警告，最终由 CPU 兜底
  providers.push(CPUExecutionProvider::default().build());
  providers
}

impl Backend for OrtBackend {
  type Error = OrtBackendError;

  fn load(model: &[u8], options: &BackendOptions) -> Result<Self, Self::Error> {
    debug!(
      "模型数据大小: {:.2} MB",
      model.len() as f64 / (1024.0 * 1024.0)
    );

    let mut builder = Session::builder()
      .map_err(ort_error("创建会话构建器"))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(ort_error("设置图优化等级"))?;
    if let Some(threads) = options.intra_threads {
      builder = builder
        .with_intra_threads(threads)
        .map_err(ort_error("设置线程数"))?;
    }

    info!("创建 ONNX Runtime 推理会话");
    let session = builder
      .with_execution_providers(execution_providers(options))
      .map_err(ort_error("注册执行后端"))?
      .commit_from_memory(model)
      .map_err(ort_error("解析模型"))?;

    if session.inputs.len() != 1 {
      return Err(OrtBackendError::ModelInvalid(format!(
        "预期模型输入数量为 1, 实际为 {}",
        session.inputs.len()
      )));
    }
    let Some(output) = session.outputs.first() else {
      return Err(OrtBackendError::ModelInvalid("模型没有输出".to_string()));
    };

    let input = &session.inputs[0];
    let input_name = input.name.clone();
    let input_shape = declared_shape(&input.input_type);
    let output_name = output.name.clone();
    let output_shape = declared_shape(&output.output_type);

    debug!("模型输入 {}: {:?}", input_name, input_shape);
    debug!("模型输出 {}: {:?}", output_name, output_shape);
    info!("模型加载完成");

    Ok(OrtBackend {
      session,
      input_name,
      output_name,
      input_shape,
      output_shape,
    })
  }

  fn input_shape(&self) -> &[i64] {
    &self.input_shape
  }

  fn output_shape(&self) -> &[i64] {
    &self.output_shape
  }

  fn run(&mut self, input: Tensor) -> Result<Tensor, Self::Error> {
    let array = ArrayD::from_shape_vec(IxDyn(&input.shape), input.data.into_vec())?;
    let value = OrtTensor::from_array(array).map_err(ort_error("创建输入张量"))?;

    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => &value])
      .map_err(ort_error("执行推理"))?;
    let view = outputs[self.output_name.as_str()]
      .try_extract_array::<f32>()
      .map_err(ort_error("读取输出张量"))?;

    Ok(Tensor::new(
      view.shape().to_vec(),
      view.iter().copied().collect::<Vec<f32>>(),
    ))
  }
}
