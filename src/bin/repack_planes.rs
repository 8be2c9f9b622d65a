// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/bin/repack_planes.rs - 原始平面转 JPEG
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

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use url::Url;

use ardemo::{
  FromUrl,
  frame::CropRect,
  input::{RawFrame, RawPlanesInput},
  repack::{self, DEFAULT_JPEG_QUALITY, RepackError},
};

/// 将 I420 原始帧重排为 YV12 并压缩为 JPEG
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，例如 yuv:///data/frames?width=640&height=480
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出目录
  #[arg(long, value_name = "DIR")]
  pub output: PathBuf,
  /// JPEG 质量 (0 - 100)
  #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_name = "QUALITY")]
  pub quality: u8,
}

fn convert(frame: &RawFrame, quality: u8) -> Result<Vec<u8>, RepackError> {
  let mut image = frame.camera_image();
  let (width, height) = (image.width(), image.height());
  let packed = match image.planes_mut() {
    [luma, chroma_a, chroma_b] => repack::repack(luma, chroma_a, chroma_b, width, height)?,
    planes => return Err(RepackError::MissingPlanes(planes.len())),
  };
  let encoded = repack::encode(&packed, CropRect::full(width, height), quality)?;
  Ok(encoded.into_bytes())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出目录: {}", args.output.display());
  info!("JPEG 质量: {}", args.quality);

  let input = RawPlanesInput::from_url(&args.input)?;
  std::fs::create_dir_all(&args.output)?;

  let (mut converted, mut failed) = (0usize, 0usize);
  for frame in input {
    let Some(stem) = frame.source.file_stem() else {
      continue;
    };
    let target = args.output.join(stem).with_extension("jpg");
    match convert(&frame, args.quality) {
      Ok(bytes) => {
        std::fs::write(&target, bytes)?;
        info!("已写入: {}", target.display());
        converted += 1;
      }
      Err(e) => {
        error!("转换 {} 失败: {}", frame.source.display(), e);
        failed += 1;
      }
    }
  }

  info!("处理完成: 成功 {} 帧, 失败 {} 帧", converted, failed);
  Ok(())
}
