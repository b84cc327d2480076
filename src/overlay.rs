// 该文件是 Jianying （剪影） 项目的一部分。
// src/overlay.rs - 检测框叠加渲染
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

use ab_glyph::{FontArc, PxScale};
use image::Rgb;

use crate::{canvas::Canvas, rescale::DisplayBox};

const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: u32 = 2;
const LABEL_FONT_SIZE: f32 = 12.0;
const LABEL_OFFSET: f32 = 5.0;
const LABEL_MIN_Y: f32 = 10.0;

/// 叠加渲染器
///
/// 每次调用都是幂等的：相同的画布和相同的框列表产生逐像素相同的
/// 输出。
pub struct Overlay {
  font: FontArc,
  font_scale: PxScale,
  color: Rgb<u8>,
}

impl Default for Overlay {
  fn default() -> Self {
    Self::new()
  }
}

impl Overlay {
  pub fn new() -> Self {
    let font_data = include_bytes!("../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      color: Rgb(BOX_COLOR),
    }
  }

  /// 把每个检测框画到画布上：空心矩形加 `"{label} ({score})"` 标签
  pub fn draw(&self, canvas: &mut Canvas, boxes: &[DisplayBox]) {
    for display_box in boxes {
      canvas.stroke_rect(&display_box.bbox, self.color, BOX_THICKNESS);

      let label = label_text(display_box);
      let (x, y) = label_anchor(&display_box.bbox);
      canvas.fill_text(&label, x, y, self.font_scale, &self.font, self.color);
    }
  }
}

/// 标签文本，形如 `person (0.90)`
fn label_text(display_box: &DisplayBox) -> String {
  format!("{} ({:.2})", display_box.label, display_box.score)
}

/// 标签锚点：框左上角上方 5 像素，但不允许超出画布顶边
fn label_anchor(bbox: &[f32; 4]) -> (f32, f32) {
  let y = if bbox[1] - LABEL_OFFSET < LABEL_MIN_Y {
    LABEL_MIN_Y
  } else {
    bbox[1] - LABEL_OFFSET
  };
  (bbox[0], y)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn display_box(bbox: [f32; 4], score: f32, label: &str) -> DisplayBox {
    DisplayBox {
      bbox,
      score,
      label: label.to_string(),
    }
  }

  #[test]
  fn label_text_shows_two_decimal_score() {
    let text = label_text(&display_box([20.0, 30.0, 100.0, 90.0], 0.9, "person"));
    assert_eq!(text, "person (0.90)");
  }

  #[test]
  fn label_anchor_sits_above_the_box() {
    let (x, y) = label_anchor(&[20.0, 30.0, 100.0, 90.0]);
    assert_eq!((x, y), (20.0, 25.0));
  }

  #[test]
  fn label_anchor_is_clamped_at_the_top_edge() {
    // y - 5 < 10 时锚点固定为 10
    let (_, y) = label_anchor(&[20.0, 12.0, 100.0, 90.0]);
    assert_eq!(y, 10.0);

    // 边界：15 - 5 = 10，不小于 10，保持 10
    let (_, y) = label_anchor(&[20.0, 15.0, 100.0, 90.0]);
    assert_eq!(y, 10.0);

    let (_, y) = label_anchor(&[20.0, 14.9, 100.0, 90.0]);
    assert_eq!(y, 10.0);
  }

  #[test]
  fn draw_is_idempotent_for_identical_inputs() {
    let boxes = vec![
      display_box([20.0, 30.0, 100.0, 90.0], 0.9, "person"),
      display_box([5.0, 8.0, 40.0, 60.0], 0.75, "cat"),
    ];
    let overlay = Overlay::new();

    let mut first = Canvas::new(160, 120, false);
    overlay.draw(&mut first, &boxes);
    let mut second = Canvas::new(160, 120, false);
    overlay.draw(&mut second, &boxes);

    assert_eq!(first.image(), second.image());
  }

  #[test]
  fn draw_strokes_the_box_outline() {
    let overlay = Overlay::new();
    let mut canvas = Canvas::new(160, 120, false);
    overlay.draw(
      &mut canvas,
      &[display_box([20.0, 30.0, 100.0, 90.0], 0.9, "person")],
    );

    assert_eq!(canvas.image().get_pixel(20, 30), &Rgb(BOX_COLOR));
    assert_eq!(canvas.image().get_pixel(60, 30), &Rgb(BOX_COLOR));
    assert_eq!(canvas.image().get_pixel(60, 60), &Rgb([0, 0, 0]));
  }

  #[test]
  fn empty_box_list_leaves_the_canvas_untouched() {
    let overlay = Overlay::new();
    let mut canvas = Canvas::new(32, 32, false);
    overlay.draw(&mut canvas, &[]);

    assert!(canvas.image().pixels().all(|p| *p == Rgb([0, 0, 0])));
  }
}
