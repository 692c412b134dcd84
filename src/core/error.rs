use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg 错误: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("无法打开文件: {0}")]
    OpenError(String),

    #[error("无法找到可播放的音频或视频流")]
    NoPlayableStream,

    #[error("无法打开解码器: {0}")]
    DecoderOpenError(String),

    #[error("解码错误: {0}")]
    DecodeError(String),

    #[error("重采样错误: {0}")]
    ResampleError(String),

    #[error("图像转换错误: {0}")]
    ScaleError(String),

    #[error("渲染错误: {0}")]
    RenderError(String),

    #[error("音频输出错误: {0}")]
    AudioError(String),

    #[error("数据包复制失败: {0}")]
    AllocError(#[from] TryReserveError),

    #[error("配置解析失败: {0}")]
    ConfigError(#[from] serde_json::Error),

    #[error("其他错误: {0}")]
    Other(String),

    #[error("Anyhow 错误: {0}")]
    AnyhowError(#[from] anyhow::Error),
}

impl PlayerError {
    /// 是否为会话级致命错误（播放无法开始）
    ///
    /// 其余错误只影响单个数据包/帧，记录日志后跳过即可。
    pub fn is_fatal(&self) -> bool {
        match self {
            #[cfg(feature = "ffmpeg")]
            PlayerError::FFmpegError(_) => false,
            PlayerError::IoError(_)
            | PlayerError::OpenError(_)
            | PlayerError::NoPlayableStream
            | PlayerError::DecoderOpenError(_)
            | PlayerError::AudioError(_)
            | PlayerError::ConfigError(_) => true,
            PlayerError::DecodeError(_)
            | PlayerError::ResampleError(_)
            | PlayerError::ScaleError(_)
            | PlayerError::RenderError(_)
            | PlayerError::AllocError(_) => false,
            PlayerError::Other(_) | PlayerError::AnyhowError(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
