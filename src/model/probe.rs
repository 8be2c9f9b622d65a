// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/model/probe.rs - 加速后端能力探测
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

use std::path::PathBuf;

use tracing::debug;

const DEFAULT_RENDER_NODE: &str = "/dev/dri/renderD128";

pub trait BackendProbe {
  fn gpu_supported(&self) -> bool;
}

/// 固定应答的探测器
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl BackendProbe for StaticProbe {
  fn gpu_supported(&self) -> bool {
    self.0
  }
}

/// 通过 GPU 渲染节点是否存在判断加速能力
#[derive(Debug, Clone)]
pub struct DeviceNodeProbe {
  node: PathBuf,
}

impl Default for DeviceNodeProbe {
  fn default() -> Self {
    Self::new(DEFAULT_RENDER_NODE)
  }
}

impl DeviceNodeProbe {
  pub fn new(node: impl Into<PathBuf>) -> Self {
    Self { node: node.into() }
  }
}

impl BackendProbe for DeviceNodeProbe {
  fn gpu_supported(&self) -> bool {
    let exists = self.node.exists();
    debug!("GPU 渲染节点 {}: {}", self.node.display(), exists);
    exists
  }
}
