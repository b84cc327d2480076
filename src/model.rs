// 该文件是 Jianying （剪影） 项目的一部分。
// src/model.rs - 模型
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

#[cfg(feature = "model_yolov10")]
mod yolov10;
#[cfg(feature = "model_yolov10")]
pub use self::yolov10::{Yolov10, Yolov10Builder, Yolov10Error};

/// 推理模型 trait
///
/// 流水线只依赖这个约定，模型本身是不透明能力。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;

  /// 模型是否已就绪，构造完成的模型默认就绪
  fn ready(&self) -> bool {
    true
  }

  /// 模型自带的类别标签表
  fn labels(&self) -> Labels {
    Labels::default()
  }
}

/// 一条检测记录，坐标位于模型输入坐标空间
#[derive(Debug, Clone)]
pub struct Detection {
  /// [x_min, y_min, x_max, y_max]
  pub bbox: [f32; 4],
  /// 置信度（0.0 - 1.0）
  pub score: f32,
  /// 类别编号
  pub class_id: u32,
}

/// 一帧的推理结果
#[derive(Debug, Clone)]
pub struct Inference {
  /// 检测记录列表
  pub detections: Box<[Detection]>,
  /// 模型实际使用的输入尺寸（高, 宽）
  ///
  /// 坐标还原的缩放因子必须由它推导，而不是原始帧尺寸。
  pub resized: (u32, u32),
}

impl Inference {
  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }
}

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

const UNKNOWN_LABEL: &str = "unknown";

/// 类别编号到可读标签的映射表
#[derive(Debug, Clone)]
pub struct Labels {
  names: Box<[String]>,
}

impl Labels {
  pub fn new(names: impl IntoIterator<Item = String>) -> Self {
    Self {
      names: names.into_iter().collect(),
    }
  }

  /// COCO 80 类标签表
  pub fn coco() -> Self {
    Self::new(COCO_CLASSES.iter().map(|name| name.to_string()))
  }

  /// 查询标签，未知编号返回 "unknown"
  pub fn get(&self, id: u32) -> &str {
    self
      .names
      .get(id as usize)
      .map(String::as_str)
      .unwrap_or(UNKNOWN_LABEL)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

impl Default for Labels {
  fn default() -> Self {
    Self::coco()
  }
}
