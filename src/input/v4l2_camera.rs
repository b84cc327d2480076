// 该文件是 Jianying （剪影） 项目的一部分。
// src/input/v4l2_camera.rs - V4L2 摄像头输入
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

use std::pin::Pin;
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{CaptureSource, InputError},
};

const DEFAULT_DEVICE_PATH: &str = "/dev/video0";
const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const CAPTURE_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum V4l2CameraError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("设备错误: {0}")]
  DeviceError(#[from] std::io::Error),
  #[error("无法创建 RGB 图像")]
  InvalidFrameBuffer,
}

/// V4L2 摄像头输入
///
/// v4l 库的 Stream 需要引用 Device，这里用 Pin<Box> 固定 Device 的
/// 内存地址，使引用它的 Stream 可以安全存放在同一个结构体里。
pub struct V4l2Camera {
  /// V4L2 设备（Pin<Box> 固定内存位置）
  device: Pin<Box<Device>>,
  /// 捕获流（生命周期与 device 关联）
  stream: Option<Stream<'static>>,
  /// 帧索引
  frame_index: u64,
  /// 视频宽度
  width: u32,
  /// 视频高度
  height: u32,
  /// 开始时间
  start_time: Instant,
}

impl FromUrlWithScheme for V4l2Camera {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2Camera {
  type Error = V4l2CameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(V4l2CameraError::SchemeMismatch);
    }

    let device_path = if url.path().is_empty() {
      DEFAULT_DEVICE_PATH
    } else {
      url.path()
    };

    Self::open(device_path)
  }
}

impl V4l2Camera {
  pub fn open(device_path: &str) -> Result<Self, V4l2CameraError> {
    info!("打开 V4L2 设备: {}", device_path);
    let device = Box::pin(Device::with_path(device_path)?);

    // 协商 YUYV 格式
    let mut format = device.format()?;
    format.width = CAPTURE_WIDTH;
    format.height = CAPTURE_HEIGHT;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;
    debug!(
      "协商到的格式: {}x{} {}",
      format.width, format.height, format.fourcc
    );

    let width = format.width;
    let height = format.height;

    let mut source = Self {
      device,
      stream: None,
      frame_index: 0,
      width,
      height,
      start_time: Instant::now(),
    };

    // SAFETY: device 被 Pin<Box> 固定在堆上，不会移动，引用始终有效。
    // stream 存放在同一个结构体中，Drop 里先取走 stream 再释放 device，
    // 所以把设备引用的生命周期延长到 'static 是安全的。
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, CAPTURE_BUFFERS)?
    };

    source.stream = Some(stream);
    info!("V4L2 捕获流已建立: {}x{}", width, height);
    Ok(source)
  }

  /// 将 YUYV 格式转换为 RGB
  fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

    for chunk in yuyv.chunks(4) {
      if chunk.len() < 4 {
        break;
      }

      let y0 = chunk[0] as f32;
      let u = chunk[1] as f32 - 128.0;
      let y1 = chunk[2] as f32;
      let v = chunk[3] as f32 - 128.0;

      // 第一个像素
      let r = (y0 + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y0 - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y0 + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);

      // 第二个像素
      let r = (y1 + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y1 - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y1 + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }

    rgb
  }
}

impl Drop for V4l2Camera {
  fn drop(&mut self) {
    // 保证 stream 在 device 之前被释放
    self.stream.take();
  }
}

impl Iterator for V4l2Camera {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let stream = self.stream.as_mut()?;

    match stream.next() {
      Ok((buffer, _meta)) => {
        let rgb_data = Self::yuyv_to_rgb(buffer);

        let image = match RgbImage::from_raw(self.width, self.height, rgb_data) {
          Some(image) => image,
          None => {
            return Some(Err(V4l2CameraError::InvalidFrameBuffer.into()));
          }
        };

        let frame = Frame {
          image,
          index: self.frame_index,
          timestamp_ms: self.start_time.elapsed().as_millis() as u64,
        };

        self.frame_index += 1;
        Some(Ok(frame))
      }
      Err(e) => Some(Err(V4l2CameraError::DeviceError(e).into())),
    }
  }
}

impl CaptureSource for V4l2Camera {
  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn ready(&self) -> bool {
    self.stream.is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_scheme() {
    let url = Url::parse("camera:///dev/video0").unwrap();
    assert!(matches!(
      V4l2Camera::from_url(&url),
      Err(V4l2CameraError::SchemeMismatch)
    ));
  }

  #[test]
  fn yuyv_gray_converts_to_gray_rgb() {
    // Y=128, U=V=128 是中性灰
    let rgb = V4l2Camera::yuyv_to_rgb(&[128, 128, 128, 128]);
    assert_eq!(rgb, vec![128, 128, 128, 128, 128, 128]);
  }

  #[test]
  fn yuyv_ignores_trailing_partial_chunk() {
    let rgb = V4l2Camera::yuyv_to_rgb(&[128, 128, 128, 128, 0, 0]);
    assert_eq!(rgb.len(), 6);
  }
}
