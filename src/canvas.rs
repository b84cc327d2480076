// 该文件是 Jianying （剪影） 项目的一部分。
// src/canvas.rs - 显示画布
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
use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

/// 固定尺寸的显示画布
///
/// 镜像变换（自拍视角）只在构造时设置一次，之后所有绘制操作的坐标都
/// 经过该变换映射，变换本身不会再被修改。
pub struct Canvas {
  image: RgbImage,
  mirrored: bool,
}

impl Canvas {
  pub fn new(width: u32, height: u32, mirrored: bool) -> Self {
    Self {
      image: RgbImage::new(width, height),
      mirrored,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn is_mirrored(&self) -> bool {
    self.mirrored
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }

  /// 把一帧画面整体复制到画布上
  ///
  /// 尺寸不一致时先缩放到画布大小。画布上每个像素都会被覆盖，
  /// 上一次迭代留下的内容不需要单独清除。
  pub fn blit(&mut self, source: &RgbImage) {
    let (width, height) = self.image.dimensions();
    let resized;
    let source = if source.dimensions() == (width, height) {
      source
    } else {
      resized = imageops::resize(source, width, height, imageops::FilterType::Triangle);
      &resized
    };

    if self.mirrored {
      for (x, y, pixel) in source.enumerate_pixels() {
        self.image.put_pixel(width - 1 - x, y, *pixel);
      }
    } else {
      imageops::replace(&mut self.image, source, 0, 0);
    }
  }

  /// 绘制一个空心矩形框，bbox 为显示坐标 [x_min, y_min, x_max, y_max]
  pub fn stroke_rect(&mut self, bbox: &[f32; 4], color: Rgb<u8>, thickness: u32) {
    let (width, height) = (self.image.width() as f32, self.image.height() as f32);

    let (x_min, x_max) = if self.mirrored {
      (width - bbox[2], width - bbox[0])
    } else {
      (bbox[0], bbox[2])
    };

    let x_min = x_min.clamp(0.0, width - 1.0).floor() as i32;
    let y_min = bbox[1].clamp(0.0, height - 1.0).floor() as i32;
    let x_max = x_max.clamp(0.0, width - 1.0).ceil() as i32;
    let y_max = bbox[3].clamp(0.0, height - 1.0).ceil() as i32;

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..thickness as i32 {
      let rect_width = (x_max - x_min - 2 * t).max(0) as u32;
      let rect_height = (y_max - y_min - 2 * t).max(0) as u32;
      if rect_width == 0 || rect_height == 0 {
        break;
      }

      let rect = Rect::at(x_min + t, y_min + t).of_size(rect_width, rect_height);
      draw_hollow_rect_mut(&mut self.image, rect, color);
    }
  }

  /// 在指定锚点绘制文本，锚点横坐标经过镜像映射，字形本身保持正向
  pub fn fill_text(
    &mut self,
    text: &str,
    x: f32,
    y: f32,
    scale: PxScale,
    font: &FontArc,
    color: Rgb<u8>,
  ) {
    let x = if self.mirrored {
      self.image.width() as f32 - x
    } else {
      x
    };

    draw_text_mut(&mut self.image, color, x as i32, y as i32, scale, font, text);
  }
}
