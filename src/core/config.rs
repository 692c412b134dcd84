use crate::core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 单帧音频的最大字节数（1 秒 48kHz 32 位）
pub const MAX_AUDIO_FRAME_SIZE: usize = 192_000;

/// 播放器配置（JSON，所有字段都有默认值）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub display: DisplayConfig,
    pub audio: AudioConfig,
    pub queue: QueueConfig,
    pub video: VideoConfig,
    pub playback: PlaybackConfig,
}

impl PlayerConfig {
    /// 从 JSON 文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// 显示目标尺寸（Scaler 的输出尺寸）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// 固定的设备缓冲帧数；None 表示使用设备默认值
    pub device_buffer_frames: Option<u32>,
    /// 残留缓冲区容量（字节）
    pub residual_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_buffer_frames: None,
            residual_capacity: MAX_AUDIO_FRAME_SIZE * 3 / 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// None 表示不限制队列长度
    pub limit: Option<QueueLimit>,
}

/// 队列上限与溢出策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueLimit {
    pub max_bytes: usize,
    #[serde(default)]
    pub policy: OverflowPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// 生产者阻塞，直到有空间或退出
    #[default]
    Block,
    /// 丢弃队首的旧包
    DropOldest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// 每次呈现后的固定延迟（毫秒），0 表示不延迟
    pub present_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// 读到文件末尾后，是否等待音频队列播完再退出
    pub drain_audio_on_eos: bool,
    pub drain_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            drain_audio_on_eos: true,
            drain_timeout_ms: 5000,
        }
    }
}
