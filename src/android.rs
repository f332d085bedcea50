// 该文件是 Yeguang （夜光） 项目的一部分。
// src/android.rs - JNI 导出函数
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

//! # JNI 边界
//!
//! 对应 Java 类 `org.tensorflow.lite.examples.lowlightenhancementandID.MainActivity`
//! 中声明的 native 方法：
//!
//! ```java
//! private native long initWithByteBufferFromJNI(MappedByteBuffer modelBuffer, boolean useGPU);
//! private native int[] LowLightEnhancementFromJNI(long handle, int[] lowLightRGB);
//! private native float[] faceEmbeddingFromJNI(long handle, int[] rgb);
//! private native void deinitFromJNI(long handle);
//! ```
//!
//! 初始化失败返回 `0`，推理失败返回 `null`。panic 不会穿过边界。

use std::{
  panic::{AssertUnwindSafe, catch_unwind},
  sync::LazyLock,
};

use jni::{
  JNIEnv,
  objects::{JByteBuffer, JIntArray, JObject},
  sys::{JNI_FALSE, jboolean, jfloatArray, jint, jintArray, jlong},
};
use tracing::{error, info};

use crate::{
  config::InterpreterConfig,
  handle::{self, HandleTable, INVALID_HANDLE},
  interpreter::Interpreter,
  logging,
  model::{Backend, OrtBackend},
};

static INTERPRETERS: LazyLock<HandleTable<Interpreter<OrtBackend>>> =
  LazyLock::new(HandleTable::new);

fn interpreters() -> &'static HandleTable<Interpreter<OrtBackend>> {
  &INTERPRETERS
}

fn guard<R>(name: &str, fallback: R, f: impl FnOnce() -> R) -> R {
  catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
    error!("{} 发生 panic", name);
    fallback
  })
}

pub(crate) fn initialize_in<B: Backend>(
  table: &HandleTable<Interpreter<B>>,
  model: &[u8],
  use_gpu: bool,
) -> i64 {
  let config = InterpreterConfig::default().with_gpu(use_gpu);
  match Interpreter::<B>::initialize(model, config) {
    Ok(interpreter) => {
      let handle = table.insert(interpreter);
      info!("Interpreter is created successfully, handle {}", handle);
      handle
    }
    Err(e) => {
      error!("解释器创建失败: {}", e);
      INVALID_HANDLE
    }
  }
}

pub(crate) fn enhance_in<B: Backend>(
  table: &HandleTable<Interpreter<B>>,
  native_handle: i64,
  pixels: &[i32],
) -> Option<Vec<i32>> {
  let entry = table.get(native_handle)?;
  let mut interpreter = handle::lock(&entry);
  interpreter.run_enhancement(pixels)
}

pub(crate) fn embed_in<B: Backend>(
  table: &HandleTable<Interpreter<B>>,
  native_handle: i64,
  pixels: &[i32],
) -> Option<Vec<f32>> {
  let entry = table.get(native_handle)?;
  let mut interpreter = handle::lock(&entry);
  interpreter.run_face_embedding(pixels)
}

pub(crate) fn release_in<B: Backend>(table: &HandleTable<Interpreter<B>>, native_handle: i64) {
  if let Some(entry) = table.remove(native_handle) {
    handle::lock(&entry).shutdown();
  }
}

fn read_direct_buffer<'a>(
  env: &JNIEnv<'_>,
  buffer: &'a JByteBuffer<'_>,
) -> jni::errors::Result<&'a [u8]> {
  let address = env.get_direct_buffer_address(buffer)?;
  let capacity = env.get_direct_buffer_capacity(buffer)?;
  // SAFETY: Java 侧在调用期间持有该 direct buffer，地址非空且长度为其容量
  Ok(unsafe { std::slice::from_raw_parts(address, capacity) })
}

fn read_int_array(env: &JNIEnv<'_>, array: &JIntArray<'_>) -> jni::errors::Result<Vec<i32>> {
  let len = env.get_array_length(array)?;
  let mut pixels = vec![0 as jint; len as usize];
  env.get_int_array_region(array, 0, &mut pixels)?;
  Ok(pixels)
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_org_tensorflow_lite_examples_lowlightenhancementandID_MainActivity_initWithByteBufferFromJNI<
  'local,
>(
  env: JNIEnv<'local>,
  _this: JObject<'local>,
  model_buffer: JByteBuffer<'local>,
  use_gpu: jboolean,
) -> jlong {
  logging::init();
  guard("initWithByteBufferFromJNI", INVALID_HANDLE, || {
    let model = match read_direct_buffer(&env, &model_buffer) {
      Ok(model) => model,
      Err(e) => {
        error!("读取模型缓冲区失败: {}", e);
        return INVALID_HANDLE;
      }
    };
    initialize_in(interpreters(), model, use_gpu != JNI_FALSE)
  })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_org_tensorflow_lite_examples_lowlightenhancementandID_MainActivity_LowLightEnhancementFromJNI<
  'local,
>(
  mut env: JNIEnv<'local>,
  _this: JObject<'local>,
  native_handle: jlong,
  low_light_rgb: JIntArray<'local>,
) -> jintArray {
  guard("LowLightEnhancementFromJNI", std::ptr::null_mut(), || {
    let pixels = match read_int_array(&env, &low_light_rgb) {
      Ok(pixels) => pixels,
      Err(e) => {
        error!("读取输入像素失败: {}", e);
        return std::ptr::null_mut();
      }
    };

    let Some(enhanced) = enhance_in(interpreters(), native_handle, &pixels) else {
      return std::ptr::null_mut();
    };

    let result = env.new_int_array(enhanced.len() as i32).and_then(|array| {
      env.set_int_array_region(&array, 0, &enhanced)?;
      Ok(array)
    });
    match result {
      Ok(array) => array.into_raw(),
      Err(e) => {
        error!("写回增强结果失败: {}", e);
        std::ptr::null_mut()
      }
    }
  })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_org_tensorflow_lite_examples_lowlightenhancementandID_MainActivity_faceEmbeddingFromJNI<
  'local,
>(
  mut env: JNIEnv<'local>,
  _this: JObject<'local>,
  native_handle: jlong,
  rgb: JIntArray<'local>,
) -> jfloatArray {
  guard("faceEmbeddingFromJNI", std::ptr::null_mut(), || {
    let pixels = match read_int_array(&env, &rgb) {
      Ok(pixels) => pixels,
      Err(e) => {
        error!("读取输入像素失败: {}", e);
        return std::ptr::null_mut();
      }
    };

    let Some(embedding) = embed_in(interpreters(), native_handle, &pixels) else {
      return std::ptr::null_mut();
    };

    let result = env.new_float_array(embedding.len() as i32).and_then(|array| {
      env.set_float_array_region(&array, 0, &embedding)?;
      Ok(array)
    });
    match result {
      Ok(array) => array.into_raw(),
      Err(e) => {
        error!("写回人脸特征失败: {}", e);
        std::ptr::null_mut()
      }
    }
  })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_org_tensorflow_lite_examples_lowlightenhancementandID_MainActivity_deinitFromJNI<
  'local,
>(
  _env: JNIEnv<'local>,
  _this: JObject<'local>,
  native_handle: jlong,
) {
  guard("deinitFromJNI", (), || release_in(interpreters(), native_handle))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::INPUT_VALUE_COUNT,
    interpreter::tests::MockBackend,
  };

  fn pixels() -> Vec<i32> {
    vec![17; INPUT_VALUE_COUNT]
  }

  #[test]
  fn failed_initialization_returns_sentinel() {
    let table = HandleTable::<Interpreter<MockBackend>>::new();
    assert_eq!(initialize_in(&table, b"garbage", false), INVALID_HANDLE);
    assert!(table.is_empty());
  }

  #[test]
  fn lifecycle_through_handles() {
    let table = HandleTable::<Interpreter<MockBackend>>::new();
    let handle = initialize_in(&table, b"identity", true);
    assert_ne!(handle, INVALID_HANDLE);

    let output = enhance_in(&table, handle, &pixels()).unwrap();
    assert_eq!(output.len(), INPUT_VALUE_COUNT);

    release_in(&table, handle);
    assert_eq!(enhance_in(&table, handle, &pixels()), None);
    // 重复释放与未知句柄都被忽略
    release_in(&table, handle);
    release_in(&table, INVALID_HANDLE);
    release_in(&table, 9_999);
  }

  #[test]
  fn invalid_handles_yield_no_result() {
    let table = HandleTable::<Interpreter<MockBackend>>::new();
    assert_eq!(enhance_in(&table, INVALID_HANDLE, &pixels()), None);
    assert_eq!(embed_in(&table, 12_345, &pixels()), None);
  }

  #[test]
  fn embedding_through_handle() {
    let table = HandleTable::<Interpreter<MockBackend>>::new();
    let handle = initialize_in(&table, b"face", false);
    assert_eq!(embed_in(&table, handle, &pixels()).map(|e| e.len()), Some(192));
    // 人脸模型的输出无法还原为图像
    assert_eq!(enhance_in(&table, handle, &pixels()), None);
  }

  #[test]
  fn panics_are_contained() {
    assert_eq!(guard("test", -1, || panic!("boom")), -1);
    assert_eq!(guard("test", -1, || 3), 3);
  }
}
