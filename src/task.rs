// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/task.rs - 检测任务
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

use std::sync::mpsc;

use tracing::{info, warn};

use crate::{
  detector::{DetectorListener, ObjectDetector},
  input::InputFrame,
  model::{BackendProbe, EngineLoader},
};

pub trait Task<I, Lo: EngineLoader, P, L>: Sized {
  type Error;
  fn run_task(self, input: I, detector: &mut ObjectDetector<Lo, P, L>) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<I, Lo, P, L> Task<I, Lo, P, L> for OneShotTask
where
  I: Iterator<Item = InputFrame>,
  Lo: EngineLoader,
  P: BackendProbe,
  L: DetectorListener,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    detector: &mut ObjectDetector<Lo, P, L>,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    detector.detect(&frame.bitmap, frame.rotation);
    info!("处理完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 收到 Ctrl-C 后在当前帧结束时退出
  pub fn with_interrupt(mut self) -> Self {
    self.handle_interrupt = true;
    self
  }
}

impl<I, Lo, P, L> Task<I, Lo, P, L> for ContinuousTask
where
  I: Iterator<Item = InputFrame>,
  Lo: EngineLoader,
  P: BackendProbe,
  L: DetectorListener,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, detector: &mut ObjectDetector<Lo, P, L>) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel();

    if self.handle_interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
      })?;
    }

    let mut frame_index = 0usize;
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let now = std::time::Instant::now();
      detector.detect(&frame.bitmap, frame.rotation);
      info!("处理完成，耗时: {:.2?}", now.elapsed());
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}
