// 该文件是 Jianying （剪影） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  canvas::Canvas,
  output::Present,
  rescale::DisplayBox,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化错误: {0}")]
  RecordError(#[from] serde_json::Error),
}

/// 把带标注的画面按日期目录树归档
///
/// 每帧存为 `YYYY/MM/DD/HH-MM-SS-XXXX.png`，旁边放一份 JSON 记录
/// 这一帧的检测框。默认只记录有检测框的帧，`?always` 查询参数改为
/// 每帧都记录。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counters: Arc<Mutex<u16>>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = url.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url.path()),
      frame_counters: Arc::new(Mutex::new(0)),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self.frame_counters.lock().unwrap();
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn record(
    &self,
    boxes: &[DisplayBox],
    path: &std::path::Path,
  ) -> Result<(), DirectoryRecordOutputError> {
    let records: Vec<serde_json::Value> = boxes
      .iter()
      .map(|b| {
        serde_json::json!({
          "label": b.label,
          "score": b.score,
          "bbox": b.bbox,
        })
      })
      .collect();

    let body = serde_json::to_string_pretty(&serde_json::Value::Array(records))?;
    std::fs::write(path.with_extension("json"), body)?;
    Ok(())
  }
}

impl Present for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn present(&self, canvas: &Canvas, boxes: &[DisplayBox]) -> Result<(), Self::Error> {
    if !self.always && boxes.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;
    canvas.image().save(&path)?;
    self.record(boxes, &path)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn output_for(dir: &std::path::Path, query: &str) -> DirectoryRecordOutput {
    let url = Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  fn collect_files(dir: &std::path::Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
      let Ok(entries) = std::fs::read_dir(&current) else {
        continue;
      };
      for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == extension) {
          found.push(path);
        }
      }
    }
    found
  }

  #[test]
  fn rejects_wrong_scheme() {
    let url = Url::parse("directory:///tmp/records").unwrap();
    assert!(matches!(
      DirectoryRecordOutput::from_url(&url),
      Err(DirectoryRecordOutputError::SchemeMismatch)
    ));
  }

  #[test]
  fn skips_empty_frames_by_default() {
    let dir = std::env::temp_dir().join(format!("jianying-record-skip-{}", std::process::id()));
    let output = output_for(&dir, "");

    let canvas = Canvas::new(4, 4, false);
    output.present(&canvas, &[]).unwrap();

    assert!(collect_files(&dir, "png").is_empty());
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn always_query_records_empty_frames_too() {
    let dir = std::env::temp_dir().join(format!("jianying-record-always-{}", std::process::id()));
    let output = output_for(&dir, "?always");

    let canvas = Canvas::new(4, 4, false);
    output.present(&canvas, &[]).unwrap();

    assert_eq!(collect_files(&dir, "png").len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn writes_image_and_json_record_into_date_tree() {
    let dir = std::env::temp_dir().join(format!("jianying-record-tree-{}", std::process::id()));
    let output = output_for(&dir, "");

    let canvas = Canvas::new(4, 4, false);
    let boxes = vec![DisplayBox {
      bbox: [20.0, 30.0, 100.0, 90.0],
      score: 0.9,
      label: "person".to_string(),
    }];
    output.present(&canvas, &boxes).unwrap();

    let images = collect_files(&dir, "png");
    let records = collect_files(&dir, "json");
    assert_eq!(images.len(), 1);
    assert_eq!(records.len(), 1);

    // 日期目录结构：<root>/YYYY/MM/DD/...
    let relative = images[0].strip_prefix(&dir).unwrap();
    assert_eq!(relative.components().count(), 4);

    let body = std::fs::read_to_string(&records[0]).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed[0]["label"], "person");
    assert_eq!(parsed[0]["bbox"][0], 20.0);

    let _ = std::fs::remove_dir_all(&dir);
  }
}
