// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/model/rknn.rs - RKNN 推理后端
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

use std::path::Path;

use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info, warn};

use crate::model::{
  Category, Detection, EngineLoader, EngineOptions, ExecutionBackend, InferenceEngine,
  InferenceError, ModelLoadError,
};

const RKNN_NUM_INPUTS: u32 = 1;
const RKNN_NUM_OUTPUTS: u32 = 6;
const RKNN_CLASS_NUM: usize = 80;
const RKNN_INPUT_SIZE: u32 = 640;
const RKNN_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const RKNN_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];
const LABELS_EXTENSION: &str = "labels";

/// 从模型文件旁的 `<name>.labels` 读取类别名（每行一个）
fn read_labels(model_path: &Path) -> Vec<String> {
  let path = model_path.with_extension(LABELS_EXTENSION);
  match std::fs::read_to_string(&path) {
    Ok(content) => content.lines().map(|l| l.trim().to_string()).collect(),
    Err(_) => {
      debug!("未找到标签文件 {}, 使用类别编号", path.display());
      Vec::new()
    }
  }
}

/// RKNN 只能在 NPU 上执行；CPU 请求降级到 NPU，GPU 请求直接拒绝
fn check_backend(backend: ExecutionBackend) -> Result<(), ModelLoadError> {
  match backend {
    ExecutionBackend::Accelerator => Ok(()),
    ExecutionBackend::Cpu => {
      warn!("RKNN 模型只在 NPU 上执行, 忽略后端 {}", backend);
      Ok(())
    }
    ExecutionBackend::Gpu => {
      error!("RKNN 运行时无法使用 GPU");
      Err(ModelLoadError::BackendUnsupported(backend))
    }
  }
}

#[derive(Debug, Default)]
pub struct RknnLoader;

impl EngineLoader for RknnLoader {
  type Engine = RknnEngine;

  fn load(
    &self,
    model_path: &Path,
    options: &EngineOptions,
  ) -> Result<RknnEngine, ModelLoadError> {
    check_backend(options.backend)?;
    debug!("线程数 {} 由 RKNN 运行时管理", options.num_threads);

    let model_data = std::fs::read(model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, InitFlags::default())
      .map_err(|e| ModelLoadError::Invalid(format!("创建推理上下文失败: {}", e)))?;

    let num_inputs = context
      .num_inputs()
      .map_err(|e| ModelLoadError::Invalid(format!("无法获取输入数量: {}", e)))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| ModelLoadError::Invalid(format!("无法获取输出数量: {}", e)))?;

    if num_inputs != RKNN_NUM_INPUTS || num_outputs != RKNN_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        RKNN_NUM_INPUTS, RKNN_NUM_OUTPUTS, num_inputs, num_outputs
      );
      return Err(ModelLoadError::Invalid(format!(
        "输入/输出数量 {}/{} 不受支持",
        num_inputs, num_outputs
      )));
    }

    Ok(RknnEngine {
      context,
      labels: read_labels(model_path),
      score_threshold: options.score_threshold,
      max_results: options.max_results,
    })
  }
}

pub struct RknnEngine {
  context: Context,
  labels: Vec<String>,
  score_threshold: f32,
  max_results: usize,
}

impl RknnEngine {
  fn label(&self, class_id: usize) -> String {
    self
      .labels
      .get(class_id)
      .cloned()
      .unwrap_or_else(|| class_id.to_string())
  }
}

struct Candidate {
  class_id: usize,
  score: f32,
  bbox: [f32; 4], // 归一化 [x_min, y_min, x_max, y_max]
}

/// 根据张量大小区分回归与分类输出
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    Some((tensor2, tensor1))
  } else {
    None
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

fn decode_head(
  reg: &[f32],
  cls: &[f32],
  (map_h, map_w): (usize, usize),
  stride: f32,
  threshold: f32,
  candidates: &mut Vec<Candidate>,
) {
  let spatial = map_h * map_w;
  let size = RKNN_INPUT_SIZE as f32;

  for h in 0..map_h {
    for w in 0..map_w {
      let idx = h * map_w + w;

      let (class_id, max_logit) = (0..RKNN_CLASS_NUM)
        .map(|c| (c, cls[c * spatial + idx]))
        .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
      let score = sigmoid(max_logit);
      if score < threshold {
        continue;
      }

      let grid_x = w as f32 + 0.5;
      let grid_y = h as f32 + 0.5;
      let x_min = ((grid_x - reg[idx]) * stride).clamp(0.0, size);
      let y_min = ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, size);
      let x_max = ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, size);
      let y_max = ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, size);

      candidates.push(Candidate {
        class_id,
        score,
        bbox: [x_min / size, y_min / size, x_max / size, y_max / size],
      });
    }
  }
}

impl InferenceEngine for RknnEngine {
  fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError> {
    let engine_err = |e: rknpu::Error| InferenceError::Engine(e.to_string());
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(InferenceError::InvalidInput(format!("图像尺寸为 {}x{}", width, height)));
    }

    let input = imageops::resize(image, RKNN_INPUT_SIZE, RKNN_INPUT_SIZE, FilterType::Triangle);
    debug!("设置模型输入");
    self
      .context
      .set_input(0, input.as_raw(), TensorFormat::NHWC, TensorType::UInt8)
      .map_err(engine_err)?;

    debug!("执行模型推理");
    self.context.run().map_err(engine_err)?;
    let output = self.context.get_outputs().map_err(engine_err)?;

    let mut candidates = Vec::new();
    for (head_idx, (&head_size, stride)) in RKNN_HEAD_SIZES.iter().zip(RKNN_STRIDES).enumerate() {
      let spatial = head_size.0 * head_size.1;
      let tensor1 = output.get_f32(head_idx * 2).map_err(engine_err)?;
      let tensor2 = output.get_f32(head_idx * 2 + 1).map_err(engine_err)?;

      let Some((reg, cls)) =
        match_reg_cls_tensors(tensor1, tensor2, 4 * spatial, RKNN_CLASS_NUM * spatial)
      else {
        error!(
          "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}",
          head_idx,
          tensor1.len(),
          tensor2.len()
        );
        continue;
      };
      decode_head(reg, cls, head_size, stride, self.score_threshold, &mut candidates);
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(self.max_results);
    debug!("检测到 {} 个物体", candidates.len());

    let (w, h) = (width as f32, height as f32);
    Ok(
      candidates
        .into_iter()
        .map(|c| Detection {
          bbox: [c.bbox[0] * w, c.bbox[1] * h, c.bbox[2] * w, c.bbox[3] * h],
          categories: vec![Category {
            label: self.label(c.class_id),
            score: c.score,
          }],
        })
        .collect(),
    )
  }
}
