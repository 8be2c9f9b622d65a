// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/input/raw_planes.rs - 原始 YUV 平面文件输入
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
  collections::VecDeque,
  path::{Path, PathBuf},
};

use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{CameraImage, PlaneBuffer, chroma_len, luma_len},
  input::{InputError, parse_param},
};

const RAW_PLANES_EXTENSION: &str = "yuv";

/// 按 I420 排列（Y、U、V 依次存放）的原始帧文件
///
/// `yuv:///path/frame.yuv?width=640&height=480&rotation=90`，
/// 路径为目录时按文件名顺序读取其中所有 `.yuv` 文件。
pub struct RawPlanesInput {
  files: VecDeque<PathBuf>,
  width: u32,
  height: u32,
  rotation: i32,
}

/// 从文件读取的一帧，数据按 Y、U、V 顺序存放
#[derive(Debug, Clone)]
pub struct RawFrame {
  pub source: PathBuf,
  pub width: u32,
  pub height: u32,
  pub rotation: i32,
  data: Vec<u8>,
}

impl RawFrame {
  pub fn new(source: PathBuf, width: u32, height: u32, rotation: i32, data: Vec<u8>) -> Self {
    Self {
      source,
      width,
      height,
      rotation,
      data,
    }
  }

  /// 按 4:2:0 尺寸切分出三个平面；数据不足时后面的平面会偏短
  pub fn camera_image(&self) -> CameraImage<'_> {
    let (luma, rest) = self
      .data
      .split_at(luma_len(self.width, self.height).min(self.data.len()));
    let (chroma_a, chroma_b) = rest.split_at(chroma_len(self.width, self.height).min(rest.len()));

    CameraImage::new(
      self.width,
      self.height,
      vec![
        PlaneBuffer::new(luma),
        PlaneBuffer::new(chroma_a),
        PlaneBuffer::new(chroma_b),
      ],
    )
  }
}

impl FromUrlWithScheme for RawPlanesInput {
  const SCHEME: &'static str = "yuv";
}

fn list_frames(path: &Path) -> Result<VecDeque<PathBuf>, InputError> {
  if !path.is_dir() {
    return Ok(VecDeque::from([path.to_path_buf()]));
  }

  let mut files = Vec::new();
  for entry in std::fs::read_dir(path)? {
    let file = entry?.path();
    if file.extension().is_some_and(|ext| ext == RAW_PLANES_EXTENSION) {
      files.push(file);
    }
  }
  files.sort();
  Ok(files.into())
}

impl FromUrl for RawPlanesInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let width = parse_param(url, "width")?.ok_or(InputError::MissingParameter("width"))?;
    let height = parse_param(url, "height")?.ok_or(InputError::MissingParameter("height"))?;
    let rotation = parse_param(url, "rotation")?.unwrap_or(0);

    let files = list_frames(Path::new(url.path()))?;
    info!(
      "原始平面输入: {} 个文件, {}x{}, 旋转 {}",
      files.len(),
      width,
      height,
      rotation
    );

    Ok(RawPlanesInput {
      files,
      width,
      height,
      rotation,
    })
  }
}

impl Iterator for RawPlanesInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.files.pop_front() {
      match std::fs::read(&path) {
        Ok(data) => {
          debug!("读取帧文件: {} ({} 字节)", path.display(), data.len());
          return Some(RawFrame::new(path, self.width, self.height, self.rotation, data));
        }
        Err(e) => error!("读取帧文件 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}
