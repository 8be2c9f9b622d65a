// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/model/config.rs - 检测模型配置
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

use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{AssetStore, ModelVariant},
  query_value,
};

const DEFAULT_THRESHOLD: f32 = 0.5;
const DEFAULT_NUM_THREADS: usize = 2;
const DEFAULT_MAX_RESULTS: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 (0, 1] 之内: {0}")]
  InvalidThreshold(f32),
  #[error("线程数必须为正整数")]
  InvalidThreadCount,
  #[error("最大结果数必须为正整数")]
  InvalidMaxResults,
  #[error("未知的执行后端: {0}")]
  UnknownBackend(String),
  #[error("未知的模型变体: {0}")]
  UnknownVariant(String),
  #[error("参数 {key} 的值无效: {value}")]
  InvalidValue { key: &'static str, value: String },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionBackend {
  #[default]
  Cpu,
  Gpu,
  Accelerator,
}

impl fmt::Display for ExecutionBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExecutionBackend::Cpu => write!(f, "cpu"),
      ExecutionBackend::Gpu => write!(f, "gpu"),
      ExecutionBackend::Accelerator => write!(f, "npu"),
    }
  }
}

impl FromStr for ExecutionBackend {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "cpu" => Ok(ExecutionBackend::Cpu),
      "gpu" => Ok(ExecutionBackend::Gpu),
      "npu" | "nnapi" | "accelerator" => Ok(ExecutionBackend::Accelerator),
      _ => Err(ConfigError::UnknownBackend(s.to_string())),
    }
  }
}

/// 检测模型参数，构造后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionModelConfig {
  threshold: f32,
  num_threads: usize,
  max_results: usize,
  backend: ExecutionBackend,
  variant: ModelVariant,
}

impl Default for DetectionModelConfig {
  fn default() -> Self {
    Self {
      threshold: DEFAULT_THRESHOLD,
      num_threads: DEFAULT_NUM_THREADS,
      max_results: DEFAULT_MAX_RESULTS,
      backend: ExecutionBackend::default(),
      variant: ModelVariant::default(),
    }
  }
}

impl DetectionModelConfig {
  pub fn builder() -> DetectionModelConfigBuilder {
    DetectionModelConfigBuilder {
      config: Self::default(),
    }
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn num_threads(&self) -> usize {
    self.num_threads
  }

  pub fn max_results(&self) -> usize {
    self.max_results
  }

  pub fn backend(&self) -> ExecutionBackend {
    self.backend
  }

  pub fn variant(&self) -> ModelVariant {
    self.variant
  }
}

pub struct DetectionModelConfigBuilder {
  config: DetectionModelConfig,
}

impl DetectionModelConfigBuilder {
  pub fn threshold(mut self, threshold: f32) -> Self {
    self.config.threshold = threshold;
    self
  }

  pub fn num_threads(mut self, num_threads: usize) -> Self {
    self.config.num_threads = num_threads;
    self
  }

  pub fn max_results(mut self, max_results: usize) -> Self {
    self.config.max_results = max_results;
    self
  }

  pub fn backend(mut self, backend: ExecutionBackend) -> Self {
    self.config.backend = backend;
    self
  }

  pub fn variant(mut self, variant: ModelVariant) -> Self {
    self.config.variant = variant;
    self
  }

  pub fn build(self) -> Result<DetectionModelConfig, ConfigError> {
    let config = self.config;
    // NaN 也会落入这里
    if !(config.threshold > 0.0 && config.threshold <= 1.0) {
      return Err(ConfigError::InvalidThreshold(config.threshold));
    }
    if config.num_threads == 0 {
      return Err(ConfigError::InvalidThreadCount);
    }
    if config.max_results == 0 {
      return Err(ConfigError::InvalidMaxResults);
    }
    Ok(config)
  }
}

/// 模型来源：资源目录加检测参数
///
/// 形如 `model:///opt/assets?variant=mobilenetv1&threshold=0.5&threads=2&max_results=3&backend=gpu`，
/// 省略的参数取默认值。
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
  pub assets: AssetStore,
  pub config: DetectionModelConfig,
}

impl FromUrlWithScheme for ModelSource {
  const SCHEME: &'static str = "model";
}

fn parse_query<T: FromStr>(url: &Url, key: &'static str) -> Result<Option<T>, ConfigError> {
  match query_value(url, key) {
    Some(value) => value
      .parse()
      .map(Some)
      .map_err(|_| ConfigError::InvalidValue { key, value }),
    None => Ok(None),
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
      return Err(ConfigError::SchemeMismatch(url.scheme().to_string()));
    }

    let mut builder = DetectionModelConfig::builder();
    if let Some(threshold) = parse_query(url, "threshold")? {
      builder = builder.threshold(threshold);
    }
    if let Some(threads) = parse_query(url, "threads")? {
      builder = builder.num_threads(threads);
    }
    if let Some(max_results) = parse_query(url, "max_results")? {
      builder = builder.max_results(max_results);
    }
    if let Some(backend) = query_value(url, "backend") {
      builder = builder.backend(backend.parse()?);
    }
    if let Some(variant) = query_value(url, "variant") {
      builder = builder.variant(variant.parse()?);
    }
    let config = builder.build()?;
    debug!("模型配置: {:?}", config);

    Ok(ModelSource {
      assets: AssetStore::new(url.path()),
      config,
    })
  }
}
