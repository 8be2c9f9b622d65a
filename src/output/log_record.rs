// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/output/log_record.rs - 日志输出
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

use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::DetectorListener,
  model::Detection,
  output::OutputError,
};

/// 把检测结果写入 tracing 日志，`log://`
#[derive(Debug, Default)]
pub struct LogOutput;

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(LogOutput)
  }
}

impl DetectorListener for LogOutput {
  fn on_error(&self, message: &str) {
    error!("检测器错误: {}", message);
  }

  fn on_results(
    &self,
    results: &[Detection],
    inference_time_ms: u64,
    image_height: u32,
    image_width: u32,
  ) {
    info!(
      "推理完成，耗时: {}ms, 图像 {}x{}, 检测到 {} 个物体",
      inference_time_ms,
      image_width,
      image_height,
      results.len()
    );
    for detection in results {
      let [left, top, right, bottom] = detection.bbox;
      match detection.best() {
        Some(category) => info!(
          "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}, {:.0})",
          category.label,
          category.score * 100.0,
          left,
          top,
          right,
          bottom
        ),
        None => info!("  - 未分类 at ({:.0}, {:.0}, {:.0}, {:.0})", left, top, right, bottom),
      }
    }
  }
}
