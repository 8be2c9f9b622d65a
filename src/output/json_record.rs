// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/output/json_record.rs - JSON 行记录输出
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
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{error, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::DetectorListener,
  model::Detection,
  output::OutputError,
};

/// 每个事件写一行 JSON，`jsonl:///path/results.jsonl`
pub struct JsonRecordOutput {
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonRecordOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(url.scheme().to_string()));
    }
    Self::create(url.path())
  }
}

impl JsonRecordOutput {
  pub fn create(path: impl AsRef<Path>) -> Result<Self, OutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    warn!("记录检测结果到文件: {}", path.display());

    Ok(Self {
      writer: Mutex::new(BufWriter::new(File::create(path)?)),
    })
  }

  fn write_record(&self, record: Value) {
    let Ok(mut writer) = self.writer.lock() else {
      error!("记录文件锁已损坏");
      return;
    };
    let written = serde_json::to_writer(&mut *writer, &record)
      .map_err(std::io::Error::from)
      .and_then(|_| writer.write_all(b"\n"))
      .and_then(|_| writer.flush());
    if let Err(e) = written {
      error!("写入检测记录失败: {}", e);
    }
  }
}

fn detection_to_json(detection: &Detection) -> Value {
  json!({
    "bbox": detection.bbox,
    "categories": detection
      .categories
      .iter()
      .map(|c| json!({ "label": c.label, "score": c.score }))
      .collect::<Vec<_>>(),
  })
}

impl DetectorListener for JsonRecordOutput {
  fn on_error(&self, message: &str) {
    self.write_record(json!({
      "timestamp": Utc::now().to_rfc3339(),
      "event": "error",
      "message": message,
    }));
  }

  fn on_results(
    &self,
    results: &[Detection],
    inference_time_ms: u64,
    image_height: u32,
    image_width: u32,
  ) {
    self.write_record(json!({
      "timestamp": Utc::now().to_rfc3339(),
      "event": "results",
      "inference_time_ms": inference_time_ms,
      "image_height": image_height,
      "image_width": image_width,
      "detections": results.iter().map(detection_to_json).collect::<Vec<_>>(),
    }));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Category;

  #[test]
  fn writes_one_line_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/results.jsonl");
    let output = JsonRecordOutput::create(&path).unwrap();

    output.on_error("GPU is not supported on this device");
    output.on_results(
      &[Detection {
        bbox: [1.0, 2.0, 3.0, 4.0],
        categories: vec![Category {
          label: "stop".into(),
          score: 0.75,
        }],
      }],
      12,
      480,
      640,
    );

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> = content
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "error");
    assert_eq!(lines[0]["message"], "GPU is not supported on this device");
    assert_eq!(lines[1]["inference_time_ms"], 12);
    assert_eq!(lines[1]["image_width"], 640);
    assert_eq!(lines[1]["detections"][0]["categories"][0]["label"], "stop");
    assert_eq!(lines[1]["detections"][0]["bbox"][3], 4.0);
  }
}
