// 播放器核心模块

pub mod audio_pipeline;
pub mod dispatch;
pub mod packet_queue;
pub mod pcm_file;
pub mod quit;
pub mod session;
pub mod source;
pub mod video_loop;

#[cfg(feature = "audio-device")]
pub mod audio_output;
#[cfg(feature = "ffmpeg")]
pub mod decoder;
#[cfg(feature = "ffmpeg")]
pub mod demuxer;

#[cfg(test)]
pub(crate) mod test_support;

pub use audio_pipeline::{AudioPipeline, AudioStats, AudioStatsSnapshot};
pub use dispatch::{DispatchLoop, DispatchStats, StopReason};
pub use packet_queue::{PacketQueue, Pop, Put};
pub use pcm_file::PcmFileSource;
pub use quit::QuitFlag;
pub use session::{Session, SessionEvent, SessionHandle};
pub use source::{AudioFill, AudioOutput, Decoder, Demuxer, Receive, Renderer, Resampler, Scaler};
pub use video_loop::{VideoRenderLoop, VideoStats};

#[cfg(feature = "audio-device")]
pub use audio_output::CpalAudioOutput;
#[cfg(feature = "ffmpeg")]
pub use decoder::{FfmpegAudioDecoder, FfmpegVideoDecoder, SwrResampler, SwsScaler};
#[cfg(feature = "ffmpeg")]
pub use demuxer::{inspect, rational, FfmpegDemuxer};

use std::{process, thread};

/// 日志前缀：进程号 + 线程号
pub(crate) fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}
