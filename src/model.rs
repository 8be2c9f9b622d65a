// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/model.rs - 模型
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

mod catalog;
mod config;
mod probe;
#[cfg(feature = "rknpu_backend")]
pub mod rknn;

pub use self::catalog::{AssetStore, ModelCatalog, ModelVariant};
pub use self::config::{
  ConfigError, DetectionModelConfig, DetectionModelConfigBuilder, ExecutionBackend, ModelSource,
};
pub use self::probe::{BackendProbe, DeviceNodeProbe, StaticProbe};

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
  pub label: String,
  pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: [f32; 4], // [left, top, right, bottom]，处理后图像的像素坐标
  pub categories: Vec<Category>,
}

impl Detection {
  /// 得分最高的候选类别
  pub fn best(&self) -> Option<&Category> {
    self
      .categories
      .iter()
      .max_by(|a, b| a.score.total_cmp(&b.score))
  }
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("模型变体 {0} 未登记")]
  UnknownVariant(ModelVariant),
  #[error("模型文件不存在: {0}")]
  AssetNotFound(PathBuf),
  #[error("模型加载错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  Invalid(String),
  #[error("后端 {0} 不可用")]
  BackendUnsupported(ExecutionBackend),
}

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("推理引擎错误: {0}")]
  Engine(String),
  #[error("输入无效: {0}")]
  InvalidInput(String),
}

/// 传递给推理运行时的参数，后端已经过能力探测
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
  pub score_threshold: f32,
  pub max_results: usize,
  pub num_threads: usize,
  pub backend: ExecutionBackend,
}

/// 已加载的检测模型
///
/// 阈值过滤与结果数量上限由实现负责。
pub trait InferenceEngine {
  fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError>;
}

pub trait EngineLoader {
  type Engine: InferenceEngine;

  fn load(
    &self,
    model_path: &Path,
    options: &EngineOptions,
  ) -> Result<Self::Engine, ModelLoadError>;
}
