// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/repack.rs - 平面重排与 JPEG 编码
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

use image::{ImageFormat, RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use tracing::{debug, error};

use crate::frame::{
  CameraImage, CropRect, FrameError, PackedFrame, PlaneBuffer, PlaneKind, chroma_dims,
  chroma_len, luma_len,
};

/// 相机帧转位图时使用的 JPEG 质量
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

const REQUIRED_PLANES: usize = 3;

#[derive(Error, Debug)]
pub enum RepackError {
  #[error("{plane} 平面几何无效: 期望 {expected} 字节, 实际 {actual} 字节")]
  InvalidPlaneGeometry {
    plane: PlaneKind,
    expected: usize,
    actual: usize,
  },
  #[error("{plane} 平面不是紧密排列 (行跨度 {row_stride:?}, 像素跨度 {pixel_stride})")]
  PaddedPlane {
    plane: PlaneKind,
    row_stride: Option<usize>,
    pixel_stride: usize,
  },
  #[error("平面数量不足: {0}")]
  MissingPlanes(usize),
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
  #[error("裁剪区域 {crop:?} 超出 {width}x{height} 帧范围")]
  InvalidCrop {
    crop: CropRect,
    width: u32,
    height: u32,
  },
  #[error("JPEG 编码失败: {0}")]
  EncodeFailure(image::ImageError),
  #[error("JPEG 解码失败: {0}")]
  DecodeFailure(image::ImageError),
}

/// 压缩后的 JPEG 字节序列
#[derive(Debug, Clone)]
pub struct EncodedImage {
  data: Vec<u8>,
  width: u32,
  height: u32,
}

impl EncodedImage {
  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.data
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }
}

fn check_plane(
  plane: &PlaneBuffer<'_>,
  kind: PlaneKind,
  plane_width: u32,
  expected: usize,
) -> Result<(), RepackError> {
  if !plane.is_tightly_packed(plane_width) {
    return Err(RepackError::PaddedPlane {
      plane: kind,
      row_stride: plane.row_stride(),
      pixel_stride: plane.pixel_stride(),
    });
  }
  if plane.remaining() != expected {
    return Err(RepackError::InvalidPlaneGeometry {
      plane: kind,
      expected,
      actual: plane.remaining(),
    });
  }
  Ok(())
}

/// 将 Y、U、V 三个平面拼接为一个 YV12 打包帧
///
/// 输出顺序为 Y，然后是 `chroma_b`，最后是 `chroma_a`，色度顺序与参数顺序相反。
/// 三个平面都先校验再分配，校验失败时不会消耗任何游标。
pub fn repack(
  luma: &mut PlaneBuffer<'_>,
  chroma_a: &mut PlaneBuffer<'_>,
  chroma_b: &mut PlaneBuffer<'_>,
  width: u32,
  height: u32,
) -> Result<PackedFrame, RepackError> {
  if width == 0 || height == 0 {
    return Err(FrameError::EmptyDimensions { width, height }.into());
  }

  let total = PackedFrame::expected_len(width, height)?;
  let luma_size = luma_len(width, height);
  let chroma_size = chroma_len(width, height);
  let (chroma_width, _) = chroma_dims(width, height);

  check_plane(luma, PlaneKind::Luma, width, luma_size)?;
  check_plane(chroma_a, PlaneKind::ChromaA, chroma_width, chroma_size)?;
  check_plane(chroma_b, PlaneKind::ChromaB, chroma_width, chroma_size)?;

  let mut packed = vec![0u8; total];
  packed[..luma_size].copy_from_slice(luma.take_remaining());
  packed[luma_size..luma_size + chroma_size].copy_from_slice(chroma_b.take_remaining());
  packed[luma_size + chroma_size..].copy_from_slice(chroma_a.take_remaining());

  debug!("重排完成: {}x{}, {} 字节", width, height, packed.len());
  Ok(PackedFrame::from_parts(width, height, packed)?)
}

/// 将打包帧的裁剪区域压缩为 JPEG，质量限制在 1..=100
pub fn encode(
  frame: &PackedFrame,
  crop: CropRect,
  quality: u8,
) -> Result<EncodedImage, RepackError> {
  if !crop.fits(frame.width(), frame.height()) {
    return Err(RepackError::InvalidCrop {
      crop,
      width: frame.width(),
      height: frame.height(),
    });
  }

  let quality = quality.clamp(1, 100);
  let rgb = frame.to_rgb_image(&crop);

  let mut data = Vec::new();
  JpegEncoder::new_with_quality(&mut data, quality)
    .encode_image(&rgb)
    .map_err(RepackError::EncodeFailure)?;

  debug!(
    "JPEG 编码完成: {}x{}, 质量 {}, {} 字节",
    crop.width(),
    crop.height(),
    quality,
    data.len()
  );

  Ok(EncodedImage {
    data,
    width: crop.width(),
    height: crop.height(),
  })
}

pub fn decode(encoded: &EncodedImage) -> Result<RgbImage, RepackError> {
  let image = image::load_from_memory_with_format(encoded.as_bytes(), ImageFormat::Jpeg)
    .map_err(RepackError::DecodeFailure)?;
  Ok(image.to_rgb8())
}

fn camera_image_to_jpeg(image: &mut CameraImage<'_>) -> Result<EncodedImage, RepackError> {
  let (width, height) = (image.width(), image.height());
  let packed = match image.planes_mut() {
    [luma, chroma_a, chroma_b, ..] => repack(luma, chroma_a, chroma_b, width, height)?,
    planes => return Err(RepackError::MissingPlanes(planes.len())),
  };
  encode(&packed, CropRect::full(width, height), DEFAULT_JPEG_QUALITY)
}

/// 相机帧 -> 打包帧 -> JPEG -> 位图
///
/// 所有失败都在此处记录日志并吸收，调用方只会得到 `None`。
pub fn image_to_bitmap(image: Option<&mut CameraImage<'_>>) -> Option<RgbImage> {
  let Some(image) = image else {
    error!("输入图像为空");
    return None;
  };

  if image.plane_count() < REQUIRED_PLANES {
    error!("图像平面无效: {}", image.plane_count());
    return None;
  }

  let encoded = match camera_image_to_jpeg(image) {
    Ok(encoded) => encoded,
    Err(e) => {
      error!("相机帧转换失败: {}", e);
      return None;
    }
  };

  match decode(&encoded) {
    Ok(bitmap) => Some(bitmap),
    Err(e) => {
      error!("位图解码失败: {}", e);
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn planes(width: u32, height: u32) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let luma = (0..luma_len(width, height)).map(|i| i as u8).collect();
    let u = vec![0x55; chroma_len(width, height)];
    let v = vec![0xAA; chroma_len(width, height)];
    (luma, u, v)
  }

  fn uniform(width: u32, height: u32, value: u8) -> PackedFrame {
    let len = PackedFrame::expected_len(width, height).unwrap();
    PackedFrame::from_parts(width, height, vec![value; len]).unwrap()
  }

  #[test]
  fn repack_writes_luma_then_v_then_u() {
    let (y, u, v) = planes(6, 4);
    let packed = repack(
      &mut PlaneBuffer::new(&y),
      &mut PlaneBuffer::new(&u),
      &mut PlaneBuffer::new(&v),
      6,
      4,
    )
    .unwrap();

    let bytes = packed.as_bytes();
    assert_eq!(bytes.len(), 24 + 2 * 6);
    assert_eq!(&bytes[..24], y.as_slice());
    assert_eq!(&bytes[24..30], v.as_slice());
    assert_eq!(&bytes[30..], u.as_slice());
  }

  #[test]
  fn repack_handles_odd_dimensions() {
    let (y, u, v) = planes(5, 3);
    let packed = repack(
      &mut PlaneBuffer::new(&y),
      &mut PlaneBuffer::new(&u),
      &mut PlaneBuffer::new(&v),
      5,
      3,
    )
    .unwrap();
    assert_eq!(packed.as_bytes().len(), 15 + 2 * 3 * 2);
  }

  #[test]
  fn repack_consumes_every_cursor() {
    let (y, u, v) = planes(4, 4);
    let (mut py, mut pu, mut pv) = (
      PlaneBuffer::new(&y),
      PlaneBuffer::new(&u),
      PlaneBuffer::new(&v),
    );
    repack(&mut py, &mut pu, &mut pv, 4, 4).unwrap();
    assert_eq!((py.remaining(), pu.remaining(), pv.remaining()), (0, 0, 0));
  }

  #[test]
  fn repack_rejects_short_chroma_without_consuming() {
    let (y, u, v) = planes(4, 4);
    let mut py = PlaneBuffer::new(&y);
    let mut pu = PlaneBuffer::new(&u);
    let mut pv = PlaneBuffer::new(&v[..3]);
    let err = repack(&mut py, &mut pu, &mut pv, 4, 4).unwrap_err();
    assert!(matches!(
      err,
      RepackError::InvalidPlaneGeometry {
        plane: PlaneKind::ChromaB,
        expected: 4,
        actual: 3
      }
    ));
    assert_eq!(py.remaining(), 16);
  }

  #[test]
  fn repack_rejects_oversized_dimensions_before_allocating() {
    let err = repack(
      &mut PlaneBuffer::new(&[]),
      &mut PlaneBuffer::new(&[]),
      &mut PlaneBuffer::new(&[]),
      u32::MAX,
      u32::MAX,
    )
    .unwrap_err();
    assert!(matches!(err, RepackError::Frame(FrameError::DimensionOverflow { .. })));
  }

  #[test]
  fn repack_rejects_interleaved_chroma() {
    let (y, u, v) = planes(4, 4);
    let err = repack(
      &mut PlaneBuffer::new(&y),
      &mut PlaneBuffer::new(&u).with_strides(4, 2),
      &mut PlaneBuffer::new(&v),
      4,
      4,
    )
    .unwrap_err();
    assert!(matches!(err, RepackError::PaddedPlane { plane: PlaneKind::ChromaA, .. }));
  }

  #[test]
  fn encode_uniform_frame_at_quality_90() {
    let (w, h) = (64, 64);
    let frame = uniform(w, h, 128);
    let encoded = encode(&frame, CropRect::full(w, h), 90).unwrap();
    assert!(!encoded.as_bytes().is_empty());
    assert_eq!(decode(&encoded).unwrap().dimensions(), (64, 64));
  }

  #[test]
  fn decoded_dimensions_match_frame() {
    for (w, h) in [(1, 1), (3, 5), (17, 9), (32, 18)] {
      let frame = uniform(w, h, 90);
      let encoded = encode(&frame, CropRect::full(w, h), 75).unwrap();
      assert_eq!(decode(&encoded).unwrap().dimensions(), (w, h));
    }
  }

  #[test]
  fn encode_crops_and_clamps_quality() {
    let frame = uniform(8, 8, 200);
    let encoded = encode(&frame, CropRect::new(2, 2, 6, 8), 0).unwrap();
    assert_eq!((encoded.width(), encoded.height()), (4, 6));
    assert_eq!(decode(&encoded).unwrap().dimensions(), (4, 6));
  }

  #[test]
  fn encode_rejects_crop_outside_frame() {
    let frame = uniform(8, 8, 0);
    assert!(matches!(
      encode(&frame, CropRect::new(0, 0, 9, 8), 90),
      Err(RepackError::InvalidCrop { .. })
    ));
  }

  #[test]
  fn bitmap_pipeline_absorbs_failures() {
    assert!(image_to_bitmap(None).is_none());

    let (y, u, _) = planes(4, 4);
    let mut two_planes = CameraImage::new(4, 4, vec![PlaneBuffer::new(&y), PlaneBuffer::new(&u)]);
    assert!(image_to_bitmap(Some(&mut two_planes)).is_none());

    let mut wrong_size = CameraImage::new(
      8,
      8,
      vec![PlaneBuffer::new(&y), PlaneBuffer::new(&u), PlaneBuffer::new(&u)],
    );
    assert!(image_to_bitmap(Some(&mut wrong_size)).is_none());
  }

  #[test]
  fn bitmap_pipeline_produces_frame_sized_image() {
    let (y, u, v) = planes(16, 10);
    let mut image = CameraImage::new(
      16,
      10,
      vec![PlaneBuffer::new(&y), PlaneBuffer::new(&u), PlaneBuffer::new(&v)],
    );
    let bitmap = image_to_bitmap(Some(&mut image)).unwrap();
    assert_eq!(bitmap.dimensions(), (16, 10));
  }
}
