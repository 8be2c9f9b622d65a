// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/frame.rs - 平面缓冲区与打包帧定义
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

use std::fmt;

use image::{Rgb, RgbImage};
use thiserror::Error;

/// 4:2:0 采样下色度平面相对亮度平面的缩放因子
const CHROMA_SUBSAMPLING: u32 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("帧尺寸无效: {width}x{height}")]
  EmptyDimensions { width: u32, height: u32 },
  #[error("帧尺寸过大: {width}x{height}")]
  DimensionOverflow { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
  Luma,
  ChromaA,
  ChromaB,
}

impl fmt::Display for PlaneKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PlaneKind::Luma => write!(f, "Y"),
      PlaneKind::ChromaA => write!(f, "U"),
      PlaneKind::ChromaB => write!(f, "V"),
    }
  }
}

/// 亮度平面字节数
pub fn luma_len(width: u32, height: u32) -> usize {
  width as usize * height as usize
}

/// 色度平面的 (宽, 高)，奇数尺寸向上取整
pub fn chroma_dims(width: u32, height: u32) -> (u32, u32) {
  (
    width.div_ceil(CHROMA_SUBSAMPLING),
    height.div_ceil(CHROMA_SUBSAMPLING),
  )
}

/// 单个色度平面字节数
pub fn chroma_len(width: u32, height: u32) -> usize {
  let (cw, ch) = chroma_dims(width, height);
  cw as usize * ch as usize
}

/// 单通道采样平面的只读视图
///
/// 与字节缓冲区一样带有读取游标；一次转换会把游标推进到末尾。
#[derive(Debug, Clone)]
pub struct PlaneBuffer<'a> {
  data: &'a [u8],
  position: usize,
  row_stride: Option<usize>,
  pixel_stride: usize,
}

impl<'a> PlaneBuffer<'a> {
  /// 紧密排列的平面（行跨度等于平面宽度，像素跨度为 1）
  pub fn new(data: &'a [u8]) -> Self {
    Self {
      data,
      position: 0,
      row_stride: None,
      pixel_stride: 1,
    }
  }

  pub fn with_strides(mut self, row_stride: usize, pixel_stride: usize) -> Self {
    self.row_stride = Some(row_stride);
    self.pixel_stride = pixel_stride;
    self
  }

  pub fn remaining(&self) -> usize {
    self.data.len() - self.position
  }

  pub fn row_stride(&self) -> Option<usize> {
    self.row_stride
  }

  pub fn pixel_stride(&self) -> usize {
    self.pixel_stride
  }

  /// 平面是否按给定宽度紧密排列
  pub fn is_tightly_packed(&self, plane_width: u32) -> bool {
    self.pixel_stride == 1
      && self
        .row_stride
        .map(|stride| stride == plane_width as usize)
        .unwrap_or(true)
  }

  /// 取出全部剩余字节，游标移动到末尾
  pub(crate) fn take_remaining(&mut self) -> &'a [u8] {
    let rest = &self.data[self.position..];
    self.position = self.data.len();
    rest
  }
}

/// 相机子系统交付的一帧：同一分辨率下的若干采样平面
#[derive(Debug)]
pub struct CameraImage<'a> {
  width: u32,
  height: u32,
  planes: Vec<PlaneBuffer<'a>>,
}

impl<'a> CameraImage<'a> {
  pub fn new(width: u32, height: u32, planes: Vec<PlaneBuffer<'a>>) -> Self {
    Self {
      width,
      height,
      planes,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn plane_count(&self) -> usize {
    self.planes.len()
  }

  pub fn planes_mut(&mut self) -> &mut [PlaneBuffer<'a>] {
    &mut self.planes
  }
}

/// 裁剪矩形，右、下边界不包含在内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
  pub left: u32,
  pub top: u32,
  pub right: u32,
  pub bottom: u32,
}

impl CropRect {
  pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  pub fn full(width: u32, height: u32) -> Self {
    Self::new(0, 0, width, height)
  }

  pub fn width(&self) -> u32 {
    self.right.saturating_sub(self.left)
  }

  pub fn height(&self) -> u32 {
    self.bottom.saturating_sub(self.top)
  }

  /// 非空且完全位于 `[0, width) x [0, height)` 之内
  pub fn fits(&self, width: u32, height: u32) -> bool {
    self.left < self.right && self.top < self.bottom && self.right <= width && self.bottom <= height
  }
}

/// 打包后的 4:2:0 帧：Y 平面，随后是 V 平面，最后是 U 平面（YV12）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl PackedFrame {
  /// 打包后的总字节数，超出 `usize` 时返回 `DimensionOverflow`
  pub fn expected_len(width: u32, height: u32) -> Result<usize, FrameError> {
    let (cw, ch) = chroma_dims(width, height);
    let luma = (width as usize).checked_mul(height as usize);
    let chroma = (cw as usize).checked_mul(ch as usize);
    luma
      .zip(chroma)
      .and_then(|(luma, chroma)| chroma.checked_mul(2)?.checked_add(luma))
      .ok_or(FrameError::DimensionOverflow { width, height })
  }

  pub fn from_parts(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::EmptyDimensions { width, height });
    }
    let expected = Self::expected_len(width, height)?;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn luma(&self) -> &[u8] {
    &self.data[..luma_len(self.width, self.height)]
  }

  /// 紧随亮度块的第一个色度块（V）
  pub fn chroma_v(&self) -> &[u8] {
    let start = luma_len(self.width, self.height);
    &self.data[start..start + chroma_len(self.width, self.height)]
  }

  /// 最后一个色度块（U）
  pub fn chroma_u(&self) -> &[u8] {
    let start = luma_len(self.width, self.height) + chroma_len(self.width, self.height);
    &self.data[start..]
  }

  /// 返回 (x, y) 处的 (Y, U, V) 采样
  pub fn sample(&self, x: u32, y: u32) -> (u8, u8, u8) {
    let (cw, _) = chroma_dims(self.width, self.height);
    let luma_idx = y as usize * self.width as usize + x as usize;
    let chroma_idx =
      (y / CHROMA_SUBSAMPLING) as usize * cw as usize + (x / CHROMA_SUBSAMPLING) as usize;
    (
      self.luma()[luma_idx],
      self.chroma_u()[chroma_idx],
      self.chroma_v()[chroma_idx],
    )
  }

  /// 将裁剪区域转换为 RGB 图像（BT.601 全范围）
  ///
  /// 调用方保证 `crop` 位于帧内。
  pub fn to_rgb_image(&self, crop: &CropRect) -> RgbImage {
    let mut image = RgbImage::new(crop.width(), crop.height());
    for (x, y, pixel) in image.enumerate_pixels_mut() {
      let (luma, u, v) = self.sample(crop.left + x, crop.top + y);
      *pixel = Rgb(yuv_to_rgb(luma, u, v));
    }
    image
  }
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
  let y = y as f32;
  let u = u as f32 - 128.0;
  let v = v as f32 - 128.0;

  let r = y + 1.402 * v;
  let g = y - 0.344_136 * u - 0.714_136 * v;
  let b = y + 1.772 * u;

  [
    r.round().clamp(0.0, 255.0) as u8,
    g.round().clamp(0.0, 255.0) as u8,
    b.round().clamp(0.0, 255.0) as u8,
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn chroma_dims_round_up_for_odd_sizes() {
    assert_eq!(chroma_dims(4, 4), (2, 2));
    assert_eq!(chroma_dims(5, 3), (3, 2));
    assert_eq!(chroma_dims(1, 1), (1, 1));
    assert_eq!(PackedFrame::expected_len(5, 3), Ok(15 + 2 * 6));
  }

  #[test]
  fn oversized_dimensions_are_rejected() {
    let overflow = FrameError::DimensionOverflow {
      width: u32::MAX,
      height: u32::MAX,
    };
    assert_eq!(PackedFrame::expected_len(u32::MAX, u32::MAX), Err(overflow.clone()));
    assert_eq!(
      PackedFrame::from_parts(u32::MAX, u32::MAX, Vec::new()),
      Err(overflow)
    );
  }

  #[test]
  fn plane_cursor_is_consumed_once() {
    let bytes = [1u8, 2, 3, 4];
    let mut plane = PlaneBuffer::new(&bytes);
    assert_eq!(plane.remaining(), 4);
    assert_eq!(plane.take_remaining(), &[1, 2, 3, 4]);
    assert_eq!(plane.remaining(), 0);
    assert!(plane.take_remaining().is_empty());
  }

  #[test]
  fn strides_decide_tight_packing() {
    let bytes = [0u8; 8];
    assert!(PlaneBuffer::new(&bytes).is_tightly_packed(4));
    assert!(PlaneBuffer::new(&bytes).with_strides(4, 1).is_tightly_packed(4));
    assert!(!PlaneBuffer::new(&bytes).with_strides(8, 1).is_tightly_packed(4));
    assert!(!PlaneBuffer::new(&bytes).with_strides(4, 2).is_tightly_packed(4));
  }

  #[test]
  fn packed_frame_rejects_wrong_length() {
    let err = PackedFrame::from_parts(4, 4, vec![0; 23]).unwrap_err();
    assert_eq!(
      err,
      FrameError::LengthMismatch {
        expected: 24,
        actual: 23
      }
    );
    assert!(matches!(
      PackedFrame::from_parts(0, 4, Vec::new()),
      Err(FrameError::EmptyDimensions { .. })
    ));
  }

  #[test]
  fn packed_frame_blocks_follow_yv12_order() {
    let mut data = vec![10u8; 16];
    data.extend([20u8; 4]);
    data.extend([30u8; 4]);
    let frame = PackedFrame::from_parts(4, 4, data).unwrap();
    assert!(frame.luma().iter().all(|&b| b == 10));
    assert!(frame.chroma_v().iter().all(|&b| b == 20));
    assert!(frame.chroma_u().iter().all(|&b| b == 30));
    assert_eq!(frame.sample(3, 3), (10, 30, 20));
  }

  #[test]
  fn crop_rect_bounds() {
    assert!(CropRect::full(4, 4).fits(4, 4));
    assert!(CropRect::new(1, 1, 3, 2).fits(4, 4));
    assert!(!CropRect::new(0, 0, 5, 4).fits(4, 4));
    assert!(!CropRect::new(2, 0, 2, 4).fits(4, 4));
  }

  #[test]
  fn neutral_chroma_gives_grey() {
    let mut data = vec![128u8; 4];
    data.extend([128u8; 2]);
    let frame = PackedFrame::from_parts(2, 2, data).unwrap();
    let image = frame.to_rgb_image(&CropRect::full(2, 2));
    assert_eq!(image.dimensions(), (2, 2));
    assert_eq!(image.get_pixel(1, 1).0, [128, 128, 128]);
  }
}
