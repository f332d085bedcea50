// 该文件是 Yeguang （夜光） 项目的一部分。
// src/task.rs - 推理任务
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

use std::time::Duration;
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复推理，统计平均耗时（忽略前两次预热）
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 100 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

/// 去掉前两次预热后的平均值，样本不足时使用全部样本
pub fn average_latency(times: &[Duration]) -> Option<Duration> {
  let samples = if times.len() > 2 { &times[2..] } else { times };
  if samples.is_empty() {
    return None;
  }
  Some(samples.iter().sum::<Duration>() / samples.len() as u32)
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.times);
    let mut last = None;
    for i in 0..self.times {
      let now = std::time::Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
      last = Some(result);
    }

    if let Some(result) = last {
      output.render_result(&frame, &result)?;
    }

    match average_latency(&times) {
      Some(avg) => warn!("平均推理时间: {:.2?}", avg),
      None => warn!("未执行推理"),
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("never")]
  struct Never;

  struct Doubler;

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = Never;

    fn infer(&mut self, input: &u32) -> Result<u32, Never> {
      Ok(input * 2)
    }
  }

  struct Collect<'a>(&'a Cell<Option<(u32, u32)>>);

  impl Render<u32, u32> for Collect<'_> {
    type Error = Never;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Never> {
      self.0.set(Some((*frame, *result)));
      Ok(())
    }
  }

  #[test]
  fn one_shot_renders_first_frame() {
    let seen = Cell::new(None);
    OneShotTask
      .run_task([21u32, 5].into_iter(), Doubler, Collect(&seen))
      .unwrap();
    assert_eq!(seen.get(), Some((21, 42)));
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let seen = Cell::new(None);
    assert!(
      OneShotTask
        .run_task(std::iter::empty::<u32>(), Doubler, Collect(&seen))
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_renders_once() {
    let seen = Cell::new(None);
    RepeatShotTask::default()
      .with_times(3)
      .run_task([4u32].into_iter(), Doubler, Collect(&seen))
      .unwrap();
    assert_eq!(seen.get(), Some((4, 8)));
  }

  #[test]
  fn average_skips_warmup() {
    let ms = Duration::from_millis;
    assert_eq!(average_latency(&[]), None);
    assert_eq!(average_latency(&[ms(10)]), Some(ms(10)));
    assert_eq!(average_latency(&[ms(100), ms(50), ms(10), ms(20)]), Some(ms(15)));
  }
}
