// 该文件是 Jianying （剪影） 项目的一部分。
// src/model/yolov10.rs - YOLOv10 ONNX 模型
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
use tracing::{debug, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Detection, Inference, Labels, Model},
};

const YOLOV10_INPUT_SIZE: u32 = 640;
const YOLOV10_ROW_LEN: usize = 6;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Error, Debug)]
pub enum Yolov10Error {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("推理计划错误: {0}")]
  PlanError(TractError),
  #[error("模型输出形状错误: {0:?}")]
  OutputShapeError(Vec<usize>),
}

impl From<std::io::Error> for Yolov10Error {
  fn from(err: std::io::Error) -> Self {
    Yolov10Error::ModelLoadError(err)
  }
}

impl From<TractError> for Yolov10Error {
  fn from(err: TractError) -> Self {
    Yolov10Error::PlanError(err)
  }
}

/// YOLOv10 ONNX 模型
///
/// 预处理把输入帧缩放到固定的方形输入，推理输出 output0 形状为
/// [1, N, 6]，每行是 (x_min, y_min, x_max, y_max, score, class_id)，
/// 坐标位于模型输入坐标空间。
pub struct Yolov10 {
  plan: Plan,
  input_size: u32,
  labels: Labels,
}

pub struct Yolov10Builder {
  model_path: String,
  input_size: u32,
  labels: Labels,
}

impl FromUrlWithScheme for Yolov10Builder {
  const SCHEME: &'static str = "yolov10";
}

impl FromUrl for Yolov10Builder {
  type Error = Yolov10Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolov10Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(Yolov10Builder {
      model_path: url.path().to_string(),
      input_size: YOLOV10_INPUT_SIZE,
      labels: Labels::coco(),
    })
  }
}

impl Yolov10Builder {
  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn labels(mut self, labels: Labels) -> Self {
    self.labels = labels;
    self
  }

  pub fn build(self) -> Result<Yolov10, Yolov10Error> {
    info!("加载模型文件: {}", self.model_path);
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    let size = self.input_size as usize;
    let input_fact = InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size));
    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)?
      .with_input_fact(0, input_fact)?
      .into_optimized()?
      .into_runnable()?;
    info!("模型加载完成");

    Ok(Yolov10 {
      plan,
      input_size: self.input_size,
      labels: self.labels,
    })
  }
}

impl Yolov10 {
  /// 预处理：缩放到模型输入尺寸，像素值归一到 0.0-1.0，产出 NCHW 张量。
  /// 返回张量和实际使用的输入尺寸（高, 宽）。
  fn process(&self, image: &RgbImage) -> (Tensor, (u32, u32)) {
    let size = self.input_size;
    let resized = image::imageops::resize(
      image,
      size,
      size,
      image::imageops::FilterType::Triangle,
    );

    let tensor: Tensor = tract_ndarray::Array4::from_shape_fn(
      (1, 3, size as usize, size as usize),
      |(_, c, y, x)| resized[(x as u32, y as u32)][c] as f32 / 255.0,
    )
    .into();

    (tensor, (size, size))
  }
}

/// 把 output0 的扁平数据解析为检测记录
fn parse_output0(rows: &[f32]) -> Box<[Detection]> {
  rows
    .chunks_exact(YOLOV10_ROW_LEN)
    .map(|row| Detection {
      bbox: [row[0], row[1], row[2], row[3]],
      score: row[4],
      class_id: row[5] as u32,
    })
    .collect()
}

impl Model for Yolov10 {
  type Input = RgbImage;
  type Output = Inference;
  type Error = Yolov10Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理输入图像");
    let (tensor, resized) = self.process(input);

    debug!("执行模型推理");
    let outputs = self.plan.run(tvec!(tensor.into()))?;

    debug!("解析模型输出");
    let output0 = outputs[0].to_array_view::<f32>()?;
    let shape = output0.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 || shape[2] != YOLOV10_ROW_LEN {
      return Err(Yolov10Error::OutputShapeError(shape));
    }

    let rows: Vec<f32> = output0.iter().copied().collect();
    let detections = parse_output0(&rows);
    debug!("检测到 {} 个候选目标", detections.len());

    Ok(Inference {
      detections,
      resized,
    })
  }

  fn labels(&self) -> Labels {
    self.labels.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_rejects_wrong_scheme() {
    let url = Url::parse("yolo26:///models/net.onnx").unwrap();
    assert!(matches!(
      Yolov10Builder::from_url(&url),
      Err(Yolov10Error::ModelPathError(_))
    ));
  }

  #[test]
  fn builder_missing_model_file_is_a_load_error() {
    let url = Url::parse("yolov10:///no/such/model.onnx").unwrap();
    let builder = Yolov10Builder::from_url(&url).unwrap();
    assert!(matches!(
      builder.build(),
      Err(Yolov10Error::ModelLoadError(_))
    ));
  }

  #[test]
  fn parse_output0_splits_rows() {
    let rows = [
      10.0, 20.0, 50.0, 60.0, 0.9, 0.0, //
      1.0, 2.0, 3.0, 4.0, 0.4, 7.0,
    ];
    let detections = parse_output0(&rows);

    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].bbox, [10.0, 20.0, 50.0, 60.0]);
    assert_eq!(detections[0].score, 0.9);
    assert_eq!(detections[0].class_id, 0);
    assert_eq!(detections[1].class_id, 7);
  }

  #[test]
  fn parse_output0_drops_trailing_partial_row() {
    let rows = [10.0, 20.0, 50.0, 60.0, 0.9, 0.0, 1.0, 2.0];
    let detections = parse_output0(&rows);
    assert_eq!(detections.len(), 1);
  }
}
