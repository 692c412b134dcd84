//! 命令行参数

use crate::core::{PlayerError, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "mini_player")]
#[command(about = "最小播放引擎：拉取式音频回调 + 同步视频渲染")]
#[command(group(ArgGroup::new("mode").required(true).args(["url", "info", "pcm"])))]
pub struct Cli {
    /// JSON 配置文件
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 要播放的文件或网络流
    pub url: Option<String>,

    /// 只探测并以 JSON 打印流信息
    #[arg(long, value_name = "URL")]
    pub info: Option<String>,

    /// 播放裸 S16 交织 PCM 文件
    #[arg(long, value_name = "FILE", requires_all = ["rate", "channels"])]
    pub pcm: Option<PathBuf>,

    /// PCM 采样率
    #[arg(long, requires = "pcm")]
    pub rate: Option<u32>,

    /// PCM 声道数
    #[arg(long, requires = "pcm")]
    pub channels: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 播放文件或网络流
    Play(String),
    /// 只探测并打印流信息
    Info(String),
    /// 播放裸 S16 PCM 文件
    Pcm { path: PathBuf, rate: u32, channels: u16 },
}

impl Cli {
    /// 运行模式（`mode` 参数组保证三者恰好出现一个）
    pub fn mode(&self) -> Result<Command> {
        match (&self.url, &self.info, &self.pcm, self.rate, self.channels) {
            (Some(url), None, None, _, _) => Ok(Command::Play(url.clone())),
            (None, Some(url), None, _, _) => Ok(Command::Info(url.clone())),
            (None, None, Some(path), Some(rate), Some(channels)) => Ok(Command::Pcm {
                path: path.clone(),
                rate,
                channels,
            }),
            _ => Err(PlayerError::Other("需要且只能指定一种模式: <URL> | --info | --pcm".to_string())),
        }
    }
}
