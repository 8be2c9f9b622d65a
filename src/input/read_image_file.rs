// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{InputError, InputFrame, parse_param},
};

/// 已解码的单张图像，`image:///path/photo.jpg?rotation=90`
pub struct ImageFileInput {
  frame: Option<InputFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
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

    let rotation = parse_param(url, "rotation")?.unwrap_or(0);
    let bitmap = ImageReader::open(url.path())?.decode()?.to_rgb8();

    Ok(ImageFileInput {
      frame: Some(InputFrame { bitmap, rotation }),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = InputFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}
