// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/input.rs - 相机帧/图像输入
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

use image::RgbImage;
use thiserror::Error;
use tracing::warn;

use crate::{FromUrl, FromUrlWithScheme, repack::image_to_bitmap};

mod raw_planes;
mod read_image_file;

pub use self::raw_planes::{RawFrame, RawPlanesInput};
pub use self::read_image_file::ImageFileInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Missing query parameter: {0}")]
  MissingParameter(&'static str),
  #[error("Invalid query parameter {key}: {value}")]
  InvalidParameter { key: &'static str, value: String },
}

/// 交给检测器的一帧：已解码的位图与传感器旋转角度
#[derive(Debug, Clone)]
pub struct InputFrame {
  pub bitmap: RgbImage,
  pub rotation: i32,
}

pub enum InputWrapper {
  RawPlanes(RawPlanesInput),
  ImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      RawPlanesInput::SCHEME => Ok(InputWrapper::RawPlanes(RawPlanesInput::from_url(url)?)),
      ImageFileInput::SCHEME => Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?)),
      scheme => Err(InputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = InputFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::RawPlanes(input) => loop {
        let frame = input.next()?;
        match image_to_bitmap(Some(&mut frame.camera_image())) {
          Some(bitmap) => {
            return Some(InputFrame {
              bitmap,
              rotation: frame.rotation,
            });
          }
          None => warn!("跳过无法转换的帧: {}", frame.source.display()),
        }
      },
      InputWrapper::ImageFile(input) => input.next(),
    }
  }
}

pub(crate) fn parse_param<T: std::str::FromStr>(
  url: &url::Url,
  key: &'static str,
) -> Result<Option<T>, InputError> {
  match crate::query_value(url, key) {
    Some(value) => value
      .parse()
      .map(Some)
      .map_err(|_| InputError::InvalidParameter { key, value }),
    None => Ok(None),
  }
}
