// 该文件是 Jianying （剪影） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;

use crate::{FromUrl, frame::Frame};

#[cfg(feature = "read_image_file")]
mod image_file;
#[cfg(feature = "read_image_file")]
pub use self::image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "v4l2_input")]
mod v4l2_camera;
#[cfg(feature = "v4l2_input")]
pub use self::v4l2_camera::{V4l2Camera, V4l2CameraError};

/// 捕获源 trait
///
/// 迭代器每次产出一帧；`ready` 表示源当前可以产出帧，
/// 任务循环在就绪之前不会开始检测工作。
pub trait CaptureSource: Iterator<Item = Result<Frame, InputError>> {
  /// 获取帧宽度
  fn width(&self) -> u32;

  /// 获取帧高度
  fn height(&self) -> u32;

  /// 源是否已就绪
  fn ready(&self) -> bool;
}

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "v4l2_input")]
  #[error("V4L2 摄像头输入错误: {0}")]
  V4l2CameraError(#[from] V4l2CameraError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "v4l2_input")]
  V4l2Camera(V4l2Camera),
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "v4l2_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4l2Camera::SCHEME {
        let input = V4l2Camera::from_url(url)?;
        return Ok(InputWrapper::V4l2Camera(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ImageFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "v4l2_input")]
      InputWrapper::V4l2Camera(input) => input.next(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.next(),
    }
  }
}

impl CaptureSource for InputWrapper {
  fn width(&self) -> u32 {
    match self {
      #[cfg(feature = "v4l2_input")]
      InputWrapper::V4l2Camera(input) => input.width(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.width(),
    }
  }

  fn height(&self) -> u32 {
    match self {
      #[cfg(feature = "v4l2_input")]
      InputWrapper::V4l2Camera(input) => input.height(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.height(),
    }
  }

  fn ready(&self) -> bool {
    match self {
      #[cfg(feature = "v4l2_input")]
      InputWrapper::V4l2Camera(input) => input.ready(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.ready(),
    }
  }
}
