// 该文件是 Jianying （剪影） 项目的一部分。
// src/rescale.rs - 坐标还原
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

use crate::model::{Inference, Labels};

/// 默认置信度阈值
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// 还原到显示坐标空间的检测框
///
/// 不可变，渲染一次后即丢弃，绝不跨帧保留。
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayBox {
  /// [x_min, y_min, x_max, y_max]，显示像素坐标
  pub bbox: [f32; 4],
  /// 置信度
  pub score: f32,
  /// 可读标签
  pub label: String,
}

/// 把模型输入坐标空间的检测结果还原到显示坐标空间
///
/// 纯函数。低于阈值（严格按 >= 保留）的检测在还原之前就被丢弃，
/// 缩放因子由模型报告的实际输入尺寸推导。所有坐标四舍五入到
/// 两位小数，保证输出可复现。
pub fn rescale_detections(
  inference: &Inference,
  labels: &Labels,
  display_width: u32,
  display_height: u32,
  threshold: f32,
) -> Vec<DisplayBox> {
  let (new_height, new_width) = inference.resized;
  let sx = display_width as f32 / new_width as f32;
  let sy = display_height as f32 / new_height as f32;

  inference
    .detections
    .iter()
    .filter(|detection| detection.score >= threshold)
    .map(|detection| DisplayBox {
      bbox: [
        round2(detection.bbox[0] * sx),
        round2(detection.bbox[1] * sy),
        round2(detection.bbox[2] * sx),
        round2(detection.bbox[3] * sy),
      ],
      score: detection.score,
      label: labels.get(detection.class_id).to_string(),
    })
    .collect()
}

fn round2(value: f32) -> f32 {
  (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Detection;

  fn inference(detections: Vec<Detection>, resized: (u32, u32)) -> Inference {
    Inference {
      detections: detections.into_boxed_slice(),
      resized,
    }
  }

  #[test]
  fn rescales_to_display_space() {
    // 640x480 显示，模型输入 320x320：sx = 2.0, sy = 1.5
    let inference = inference(
      vec![Detection {
        bbox: [10.0, 20.0, 50.0, 60.0],
        score: 0.9,
        class_id: 0,
      }],
      (320, 320),
    );

    let boxes = rescale_detections(&inference, &Labels::coco(), 640, 480, 0.5);

    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].bbox, [20.0, 30.0, 100.0, 90.0]);
    assert_eq!(boxes[0].label, "person");
    assert_eq!(boxes[0].score, 0.9);
  }

  #[test]
  fn threshold_is_strict_on_greater_equal() {
    let inference = inference(
      vec![
        Detection {
          bbox: [0.0, 0.0, 10.0, 10.0],
          score: 0.49,
          class_id: 0,
        },
        Detection {
          bbox: [0.0, 0.0, 10.0, 10.0],
          score: 0.5,
          class_id: 0,
        },
      ],
      (320, 320),
    );

    let boxes = rescale_detections(&inference, &Labels::coco(), 640, 480, 0.5);

    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].score, 0.5);
  }

  #[test]
  fn box_count_matches_surviving_detections() {
    let detections = vec![
      Detection {
        bbox: [0.0, 0.0, 1.0, 1.0],
        score: 0.6,
        class_id: 0,
      },
      Detection {
        bbox: [0.0, 0.0, 1.0, 1.0],
        score: 0.3,
        class_id: 1,
      },
      Detection {
        bbox: [0.0, 0.0, 1.0, 1.0],
        score: 0.8,
        class_id: 2,
      },
    ];
    let survivors = detections.iter().filter(|d| d.score >= 0.5).count();
    let inference = inference(detections, (320, 320));

    let boxes = rescale_detections(&inference, &Labels::coco(), 640, 480, 0.5);

    assert_eq!(boxes.len(), survivors);
  }

  #[test]
  fn rescale_is_reversible_within_rounding() {
    let original = [10.0_f32, 20.0, 50.0, 60.0];
    let inference = inference(
      vec![Detection {
        bbox: original,
        score: 0.9,
        class_id: 0,
      }],
      (320, 320),
    );

    let boxes = rescale_detections(&inference, &Labels::coco(), 640, 480, 0.5);
    let (sx, sy) = (640.0 / 320.0, 480.0 / 320.0);
    let bbox = &boxes[0].bbox;
    let inverted = [bbox[0] / sx, bbox[1] / sy, bbox[2] / sx, bbox[3] / sy];

    for (a, b) in inverted.iter().zip(original.iter()) {
      assert!((a - b).abs() < 0.01);
    }
  }

  #[test]
  fn coordinates_are_rounded_to_two_decimals() {
    // sx = 643 / 320 = 2.009375
    let inference = inference(
      vec![Detection {
        bbox: [10.0, 10.0, 20.0, 20.0],
        score: 0.9,
        class_id: 0,
      }],
      (320, 320),
    );

    let boxes = rescale_detections(&inference, &Labels::coco(), 643, 480, 0.5);

    assert_eq!(boxes[0].bbox[0], 20.09);
    assert_eq!(boxes[0].bbox[2], 40.19);
  }

  #[test]
  fn unknown_class_id_gets_fallback_label() {
    let inference = inference(
      vec![Detection {
        bbox: [0.0, 0.0, 1.0, 1.0],
        score: 0.9,
        class_id: 200,
      }],
      (320, 320),
    );

    let boxes = rescale_detections(&inference, &Labels::coco(), 640, 480, 0.5);

    assert_eq!(boxes[0].label, "unknown");
  }
}
