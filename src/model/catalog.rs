// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/model/catalog.rs - 模型变体与资源目录
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

use std::{
  collections::HashMap,
  fmt,
  path::{Path, PathBuf},
  str::FromStr,
};

use tracing::debug;

use crate::model::{ConfigError, ModelLoadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelVariant {
  #[default]
  MobileNetV1,
  PreLast,
  DetectLast,
  Sign315,
}

impl ModelVariant {
  pub fn as_str(&self) -> &'static str {
    match self {
      ModelVariant::MobileNetV1 => "mobilenetv1",
      ModelVariant::PreLast => "pre_last",
      ModelVariant::DetectLast => "detect_last",
      ModelVariant::Sign315 => "31_5",
    }
  }
}

impl fmt::Display for ModelVariant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ModelVariant {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "mobilenetv1" => Ok(ModelVariant::MobileNetV1),
      "pre_last" => Ok(ModelVariant::PreLast),
      "detect_last" => Ok(ModelVariant::DetectLast),
      "31_5" => Ok(ModelVariant::Sign315),
      _ => Err(ConfigError::UnknownVariant(s.to_string())),
    }
  }
}

/// 模型变体到资源文件名的查找表
#[derive(Debug, Clone)]
pub struct ModelCatalog {
  entries: HashMap<ModelVariant, String>,
}

impl Default for ModelCatalog {
  fn default() -> Self {
    Self::empty()
      .with_entry(ModelVariant::MobileNetV1, "mobilenetv1.rknn")
      .with_entry(ModelVariant::PreLast, "pre_last.rknn")
      .with_entry(ModelVariant::DetectLast, "detect_last.rknn")
      .with_entry(ModelVariant::Sign315, "31_5.rknn")
  }
}

impl ModelCatalog {
  pub fn empty() -> Self {
    Self {
      entries: HashMap::new(),
    }
  }

  pub fn with_entry(mut self, variant: ModelVariant, file_name: impl Into<String>) -> Self {
    self.entries.insert(variant, file_name.into());
    self
  }

  pub fn asset_name(&self, variant: ModelVariant) -> Option<&str> {
    self.entries.get(&variant).map(String::as_str)
  }
}

/// 应用本地的模型资源目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetStore {
  root: PathBuf,
}

impl AssetStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// 查表得到变体对应的模型文件路径，文件必须存在
  pub fn locate(
    &self,
    catalog: &ModelCatalog,
    variant: ModelVariant,
  ) -> Result<PathBuf, ModelLoadError> {
    let name = catalog
      .asset_name(variant)
      .ok_or(ModelLoadError::UnknownVariant(variant))?;
    let path = self.root.join(name);
    debug!("模型 {} 对应资源文件: {}", variant, path.display());
    if !path.is_file() {
      return Err(ModelLoadError::AssetNotFound(path));
    }
    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_catalog_maps_every_variant() {
    let catalog = ModelCatalog::default();
    for variant in [
      ModelVariant::MobileNetV1,
      ModelVariant::PreLast,
      ModelVariant::DetectLast,
      ModelVariant::Sign315,
    ] {
      let name = catalog.asset_name(variant).unwrap();
      assert!(name.starts_with(variant.as_str()));
      assert_eq!(variant.as_str().parse::<ModelVariant>().unwrap(), variant);
    }
  }

  #[test]
  fn unknown_variant_name_is_rejected() {
    assert!(matches!(
      "resnet".parse::<ModelVariant>(),
      Err(ConfigError::UnknownVariant(_))
    ));
  }

  #[test]
  fn locate_requires_catalog_entry_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = AssetStore::new(dir.path());

    let empty = ModelCatalog::empty();
    assert!(matches!(
      store.locate(&empty, ModelVariant::PreLast),
      Err(ModelLoadError::UnknownVariant(ModelVariant::PreLast))
    ));

    let catalog = ModelCatalog::default();
    assert!(matches!(
      store.locate(&catalog, ModelVariant::MobileNetV1),
      Err(ModelLoadError::AssetNotFound(_))
    ));

    std::fs::write(dir.path().join("mobilenetv1.rknn"), b"model").unwrap();
    let path = store.locate(&catalog, ModelVariant::MobileNetV1).unwrap();
    assert_eq!(path, dir.path().join("mobilenetv1.rknn"));
  }
}
