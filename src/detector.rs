// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/detector.rs - 目标检测调度
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

//! # 目标检测调度
//!
//! [`ObjectDetector`] 持有一个惰性加载、可丢弃重建的模型句柄，
//! 每次 [`ObjectDetector::detect`] 都会把位图旋转到正向后执行一次同步推理，
//! 结果与错误都通过 [`DetectorListener`] 发布，从不向调用方返回错误。
//!
//! 同一实例上的 `setup`、`clear`、`detect` 需要由调用方串行调用。

use std::{borrow::Cow, sync::mpsc, time::Instant};

use image::{RgbImage, imageops};
use tracing::{debug, error, info, warn};

use crate::model::{
  AssetStore, BackendProbe, Detection, DetectionModelConfig, EngineLoader, EngineOptions,
  ExecutionBackend, InferenceEngine, ModelCatalog,
};

pub const GPU_UNSUPPORTED_MESSAGE: &str = "GPU is not supported on this device";
pub const INIT_FAILED_MESSAGE: &str =
  "Object detector failed to initialize. See error logs for details";

pub trait DetectorListener {
  fn on_error(&self, message: &str);
  fn on_results(
    &self,
    results: &[Detection],
    inference_time_ms: u64,
    image_height: u32,
    image_width: u32,
  );
}

/// 单次调用产生的通知：要么是错误，要么是结果
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
  Error(String),
  Results {
    results: Vec<Detection>,
    inference_time_ms: u64,
    image_height: u32,
    image_width: u32,
  },
}

impl DetectorListener for mpsc::Sender<DetectorEvent> {
  fn on_error(&self, message: &str) {
    if self.send(DetectorEvent::Error(message.to_string())).is_err() {
      warn!("事件接收端已关闭，丢弃错误通知");
    }
  }

  fn on_results(
    &self,
    results: &[Detection],
    inference_time_ms: u64,
    image_height: u32,
    image_width: u32,
  ) {
    let event = DetectorEvent::Results {
      results: results.to_vec(),
      inference_time_ms,
      image_height,
      image_width,
    };
    if self.send(event).is_err() {
      warn!("事件接收端已关闭，丢弃检测结果");
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorStatus {
  Uninitialized,
  Ready,
  Failed,
}

enum DetectorState<E> {
  Uninitialized,
  Ready(E),
  // 可重试：下一次 detect 会重新初始化
  Failed(String),
}

pub struct ObjectDetector<Lo: EngineLoader, P, L> {
  config: DetectionModelConfig,
  catalog: ModelCatalog,
  assets: AssetStore,
  loader: Lo,
  probe: P,
  listener: L,
  state: DetectorState<Lo::Engine>,
}

impl<Lo, P, L> ObjectDetector<Lo, P, L>
where
  Lo: EngineLoader,
  P: BackendProbe,
  L: DetectorListener,
{
  /// 创建调度器，模型在第一次 `setup` 或 `detect` 时才加载
  pub fn new(
    config: DetectionModelConfig,
    assets: AssetStore,
    loader: Lo,
    probe: P,
    listener: L,
  ) -> Self {
    Self {
      config,
      catalog: ModelCatalog::default(),
      assets,
      loader,
      probe,
      listener,
      state: DetectorState::Uninitialized,
    }
  }

  pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
    self.catalog = catalog;
    self
  }

  pub fn status(&self) -> DetectorStatus {
    match self.state {
      DetectorState::Uninitialized => DetectorStatus::Uninitialized,
      DetectorState::Ready(_) => DetectorStatus::Ready,
      DetectorState::Failed(_) => DetectorStatus::Failed,
    }
  }

  /// 最近一次初始化失败的原因
  pub fn last_error(&self) -> Option<&str> {
    match &self.state {
      DetectorState::Failed(reason) => Some(reason.as_str()),
      _ => None,
    }
  }

  fn resolve_backend(&self) -> ExecutionBackend {
    match self.config.backend() {
      ExecutionBackend::Gpu if !self.probe.gpu_supported() => {
        warn!("设备不支持 GPU，回退到 CPU");
        self.listener.on_error(GPU_UNSUPPORTED_MESSAGE);
        ExecutionBackend::Cpu
      }
      backend => backend,
    }
  }

  /// 加载模型；失败时通过监听器报告，状态变为可重试的 `Failed`
  pub fn setup(&mut self) -> DetectorStatus {
    let options = EngineOptions {
      score_threshold: self.config.threshold(),
      max_results: self.config.max_results(),
      num_threads: self.config.num_threads(),
      backend: self.resolve_backend(),
    };

    let loaded = self
      .assets
      .locate(&self.catalog, self.config.variant())
      .and_then(|path| {
        info!("加载模型文件: {} (后端 {})", path.display(), options.backend);
        self.loader.load(&path, &options)
      });

    self.state = match loaded {
      Ok(engine) => {
        info!("模型加载完成");
        DetectorState::Ready(engine)
      }
      Err(e) => {
        error!("模型加载失败: {}", e);
        self.listener.on_error(INIT_FAILED_MESSAGE);
        DetectorState::Failed(e.to_string())
      }
    };

    self.status()
  }

  /// 丢弃模型句柄，下一次 `detect` 会重新加载
  pub fn clear(&mut self) {
    debug!("释放模型句柄");
    self.state = DetectorState::Uninitialized;
  }

  /// 替换配置并丢弃当前模型
  pub fn reconfigure(&mut self, config: DetectionModelConfig) {
    self.config = config;
    self.clear();
  }

  /// 对一帧位图执行检测，结果通过监听器发布
  ///
  /// `rotation_degrees` 为传感器报告的旋转角度，图像会反向旋转到正向。
  pub fn detect(&mut self, image: &RgbImage, rotation_degrees: i32) {
    if !matches!(self.state, DetectorState::Ready(_)) {
      debug!("模型未就绪，尝试初始化");
      self.setup();
    }

    let DetectorState::Ready(engine) = &self.state else {
      warn!("模型不可用，跳过本帧");
      return;
    };

    let start = Instant::now();
    let tensor = rotate_quarter_turns(image, quarter_turns(rotation_degrees));
    let results = engine.detect(&tensor);
    let inference_time_ms = start.elapsed().as_millis() as u64;

    match results {
      Ok(results) => {
        debug!(
          "推理完成，耗时: {}ms, 检测到 {} 个物体",
          inference_time_ms,
          results.len()
        );
        self
          .listener
          .on_results(&results, inference_time_ms, tensor.height(), tensor.width());
      }
      Err(e) => {
        error!("推理失败: {}", e);
        self.listener.on_error(&e.to_string());
      }
    }
  }
}

/// 逆时针四分之一圈数，用于抵消传感器旋转
fn quarter_turns(rotation_degrees: i32) -> u32 {
  (-(rotation_degrees / 90)).rem_euclid(4) as u32
}

fn rotate_quarter_turns(image: &RgbImage, turns: u32) -> Cow<'_, RgbImage> {
  match turns {
    1 => Cow::Owned(imageops::rotate270(image)),
    2 => Cow::Owned(imageops::rotate180(image)),
    3 => Cow::Owned(imageops::rotate90(image)),
    _ => Cow::Borrowed(image),
  }
}
