use crate::core::Packet;
use crate::player::log_ctx;
use crate::player::packet_queue::{PacketQueue, Put};
use crate::player::quit::QuitFlag;
use crate::player::source::Demuxer;
use crate::player::video_loop::VideoRenderLoop;
use log::{debug, info, warn};

// 前几个包和之后每 100 个包打一次日志
const LOG_FIRST_N: u64 = 5;

/// 分发循环停止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    /// 读包出错，按文件末尾正常结束
    ReadError,
    /// 外部停止请求（窗口关闭、会话句柄）
    QuitRequested,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub packets: u64,
    pub audio: u64,
    pub video: u64,
    pub skipped: u64,
    pub dropped: u64,
}

/// 解复用/分发循环
///
/// READING → {ROUTE_AUDIO | ROUTE_VIDEO | SKIP} → READING，直到 STOPPED。
/// 音频包入队交给音频回调，视频包在本线程同步解码呈现。
pub struct DispatchLoop {
    audio_stream: Option<usize>,
    video_stream: Option<usize>,
    stats: DispatchStats,
}

impl DispatchLoop {
    pub fn new(audio_stream: Option<usize>, video_stream: Option<usize>) -> Self {
        Self {
            audio_stream,
            video_stream,
            stats: DispatchStats::default(),
        }
    }

    pub fn run<F>(
        &mut self,
        demuxer: &mut dyn Demuxer,
        queue: &PacketQueue,
        mut video: Option<&mut VideoRenderLoop<F>>,
        quit: &QuitFlag,
    ) -> StopReason {
        info!("{} 🎬 分发循环启动: {}", log_ctx(), demuxer.description());

        let reason = loop {
            if quit.is_raised() {
                break StopReason::QuitRequested;
            }

            let packet = match demuxer.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    info!("{} 📄 到达文件末尾", log_ctx());
                    break StopReason::EndOfStream;
                }
                Err(e) => {
                    warn!("{} ⚠️ 读取包失败，按文件末尾处理: {}", log_ctx(), e);
                    break StopReason::ReadError;
                }
            };

            self.stats.packets += 1;
            self.route(packet, queue, video.as_deref_mut());

            let stop_requested = video.as_deref_mut().map_or(false, |v| v.quit_requested());
            if stop_requested || quit.is_raised() {
                if quit.raise() {
                    info!("{} ⏹ 收到外部停止请求", log_ctx());
                }
                queue.wake_all();
                break StopReason::QuitRequested;
            }
        };

        info!(
            "{} 🛑 分发循环退出（{:?}，共读取 {} 个包：{} 视频，{} 音频，{} 跳过，{} 丢弃）",
            log_ctx(),
            reason,
            self.stats.packets,
            self.stats.video,
            self.stats.audio,
            self.stats.skipped,
            self.stats.dropped
        );
        reason
    }

    fn route<F>(&mut self, packet: Packet, queue: &PacketQueue, video: Option<&mut VideoRenderLoop<F>>) {
        let index = packet.stream_index;

        if Some(index) == self.audio_stream {
            self.stats.audio += 1;
            if self.stats.audio <= LOG_FIRST_N || self.stats.audio % 100 == 0 {
                debug!(
                    "🔊 音频包 #{} 入队（{} 字节，队列 {:?}）",
                    self.stats.audio,
                    packet.size(),
                    queue.stats()
                );
            }
            match queue.put(packet) {
                Ok(Put::Queued) => {}
                Ok(Put::Evicted(n)) => self.stats.dropped += n as u64,
                Ok(Put::Stopped) => self.stats.dropped += 1,
                Err(e) => {
                    self.stats.dropped += 1;
                    warn!("音频包入队失败（已丢弃）: {}", e);
                }
            }
        } else if Some(index) == self.video_stream {
            match video {
                Some(video) => {
                    self.stats.video += 1;
                    if self.stats.video <= LOG_FIRST_N || self.stats.video % 100 == 0 {
                        debug!("📦 视频包 #{}（{} 字节）", self.stats.video, packet.size());
                    }
                    video.handle_packet(&packet);
                }
                None => self.stats.skipped += 1,
            }
        } else {
            self.stats.skipped += 1;
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
