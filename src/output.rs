// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/output.rs - 检测结果输出
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, detector::DetectorListener, model::Detection};

mod json_record;
mod log_record;

pub use self::json_record::JsonRecordOutput;
pub use self::log_record::LogOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  Log(LogOutput),
  JsonRecord(JsonRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::Log(LogOutput::from_url(url)?)),
      JsonRecordOutput::SCHEME => Ok(OutputWrapper::JsonRecord(JsonRecordOutput::from_url(url)?)),
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl DetectorListener for OutputWrapper {
  fn on_error(&self, message: &str) {
    match self {
      OutputWrapper::Log(output) => output.on_error(message),
      OutputWrapper::JsonRecord(output) => output.on_error(message),
    }
  }

  fn on_results(
    &self,
    results: &[Detection],
    inference_time_ms: u64,
    image_height: u32,
    image_width: u32,
  ) {
    match self {
      OutputWrapper::Log(output) => {
        output.on_results(results, inference_time_ms, image_height, image_width)
      }
      OutputWrapper::JsonRecord(output) => {
        output.on_results(results, inference_time_ms, image_height, image_width)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scheme_selects_output() {
    let url = Url::parse("log://").unwrap();
    assert!(matches!(OutputWrapper::from_url(&url), Ok(OutputWrapper::Log(_))));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.jsonl");
    let url = Url::parse(&format!("jsonl://{}", path.display())).unwrap();
    let output = OutputWrapper::from_url(&url).unwrap();
    assert!(matches!(output, OutputWrapper::JsonRecord(_)));

    output.on_error("model missing");
    output.on_results(&[], 3, 2, 4);
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("ftp://host/results").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(scheme)) if scheme == "ftp"
    ));
  }
}
