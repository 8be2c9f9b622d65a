// 该文件是 Ardemo （AR 演示） 项目的一部分。
// src/bin/simple_detect.rs - 简单的检测程序
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
use tracing::info;
use url::Url;

use ardemo::{
  FromUrl,
  detector::ObjectDetector,
  input::InputWrapper,
  model::{DeviceNodeProbe, ModelSource, rknn::RknnLoader},
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

/// Ardemo 检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型来源，例如 model:///opt/assets?variant=mobilenetv1&backend=npu
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源（yuv:// 或 image://）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出（log:// 或 jsonl://）
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,
  /// 最大处理帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 用于探测 GPU 能力的渲染节点
  #[arg(long, value_name = "NODE")]
  pub gpu_node: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let source = ModelSource::from_url(&args.model)?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let probe = args.gpu_node.map(DeviceNodeProbe::new).unwrap_or_default();

  let mut detector = ObjectDetector::new(source.config, source.assets, RknnLoader, probe, output);

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_interrupt()
    .run_task(input, &mut detector)?;

  Ok(())
}
