// 该文件是 Jianying （剪影） 项目的一部分。
// src/task.rs - 任务循环
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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{thread, time::Duration};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
  canvas::Canvas,
  input::CaptureSource,
  model::{Inference, Model},
  output::Present,
  overlay::Overlay,
  rescale::{self, DEFAULT_THRESHOLD},
};

/// 就绪轮询间隔
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// 单帧失败后的退避时间
const FAILURE_BACKOFF: Duration = Duration::from_millis(200);

/// 取消令牌，在每次迭代边界检查
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }
}

/// 任务循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  /// 输入源或模型尚未就绪，不做任何检测工作
  Idle,
  /// 输入源与模型均已就绪，循环运行中
  Running,
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 单帧任务：取一帧，走完整条流水线后退出
#[derive(Debug)]
pub struct OneShotTask {
  threshold: f32,
  mirrored: bool,
}

impl Default for OneShotTask {
  fn default() -> Self {
    Self {
      threshold: DEFAULT_THRESHOLD,
      mirrored: true,
    }
  }
}

impl OneShotTask {
  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn with_mirror(mut self, mirrored: bool) -> Self {
    self.mirrored = mirrored;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  OE: std::error::Error + Sync + Send + 'static,
  I: CaptureSource,
  M: Model<Input = RgbImage, Output = Inference, Error = ME>,
  O: Present<Error = OE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;
    info!("输入帧获取成功，开始推理...");

    let labels = model.labels();
    let overlay = Overlay::new();
    let mut canvas = Canvas::new(input.width(), input.height(), self.mirrored);

    canvas.blit(&frame.image);
    let now = std::time::Instant::now();
    let inference = model.infer(canvas.image())?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let boxes = rescale::rescale_detections(
      &inference,
      &labels,
      canvas.width(),
      canvas.height(),
      self.threshold,
    );
    overlay.draw(&mut canvas, &boxes);
    output.present(&canvas, &boxes)?;
    info!("渲染完成，共 {} 个目标", boxes.len());

    Ok(())
  }
}

/// 连续任务：自拍视角的实时检测循环
///
/// 迭代严格串行，一次迭代完整结束后才开始下一次；没有固定帧率，
/// 循环跑多快取决于推理多快。取消只在迭代边界生效，悬死的推理调用
/// 会悬死整个循环。
#[derive(Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  threshold: f32,
  mirrored: bool,
  token: CancelToken,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      frame_number: None,
      threshold: DEFAULT_THRESHOLD,
      mirrored: true,
      token: CancelToken::new(),
    }
  }
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn with_mirror(mut self, mirrored: bool) -> Self {
    self.mirrored = mirrored;
    self
  }

  pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
    self.token = token;
    self
  }

  /// 取得这个任务的取消令牌
  pub fn cancel_token(&self) -> CancelToken {
    self.token.clone()
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  OE: std::error::Error + Sync + Send + 'static,
  I: CaptureSource,
  M: Model<Input = RgbImage, Output = Inference, Error = ME>,
  O: Present<Error = OE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  // run_task 按值消耗任务和输入源，同一组资源无法再启动第二条循环。
  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let token = self.token.clone();

    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      handler_token.cancel();
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    }) {
      warn!("注册 Ctrl-C 处理器失败: {}", e);
    }

    // Idle -> Running：输入源和模型都就绪之前不做检测工作
    let mut state = LoopState::Idle;
    while state == LoopState::Idle {
      if token.is_cancelled() {
        info!("任务在就绪前被取消，退出");
        return Ok(());
      }
      if input.ready() && model.ready() {
        state = LoopState::Running;
      } else {
        debug!("等待输入源与模型就绪...");
        thread::sleep(READY_POLL_INTERVAL);
      }
    }
    info!("输入源与模型均已就绪，进入运行状态");

    let labels = model.labels();
    let overlay = Overlay::new();
    let mut canvas = Canvas::new(input.width(), input.height(), self.mirrored);

    let mut frame_index = 0;
    let mut now = std::time::Instant::now();
    while !token.is_cancelled() {
      let frame = match input.next() {
        None => {
          info!("输入源结束，退出任务循环");
          break;
        }
        Some(Err(e)) => {
          warn!("读取帧失败: {}，跳过该帧", e);
          thread::sleep(FAILURE_BACKOFF);
          continue;
        }
        Some(Ok(frame)) => frame,
      };

      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);

      canvas.blit(&frame.image);
      let inference = match model.infer(canvas.image()) {
        Ok(inference) => inference,
        Err(e) => {
          warn!("推理失败: {}，跳过该帧", e);
          thread::sleep(FAILURE_BACKOFF);
          continue;
        }
      };
      let elapsed_a = now.elapsed();

      let boxes = rescale::rescale_detections(
        &inference,
        &labels,
        canvas.width(),
        canvas.height(),
        self.threshold,
      );
      overlay.draw(&mut canvas, &boxes);
      output.present(&canvas, &boxes)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
    }

    if token.is_cancelled() {
      warn!("中断信号接收，退出任务循环");
    }

    info!("任务完成，退出");
    Ok(())
  }
}
