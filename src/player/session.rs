use crate::core::{AudioClock, PlaybackConfig, PlayerConfig, PlayerError, Result};
use crate::player::audio_pipeline::{AudioPipeline, AudioStats};
use crate::player::dispatch::{DispatchLoop, DispatchStats, StopReason};
use crate::player::log_ctx;
use crate::player::packet_queue::PacketQueue;
use crate::player::quit::QuitFlag;
use crate::player::source::{AudioFill, AudioOutput, Demuxer};
use crate::player::video_loop::{VideoParts, VideoRenderLoop, VideoStats};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// 会话事件（供 UI 关闭窗口等）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    EndOfStream,
    Stopped(StopReason),
}

/// 会话句柄 - 可在任意线程请求停止
#[derive(Clone)]
pub struct SessionHandle {
    quit: QuitFlag,
    queue: Arc<PacketQueue>,
}

impl SessionHandle {
    /// 置位退出标志并唤醒所有队列等待者
    pub fn request_stop(&self) {
        if self.quit.raise() {
            info!("{} ⏹ 请求停止会话", log_ctx());
        }
        self.queue.wake_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.quit.is_raised()
    }
}

/// 播放会话 - 拥有队列、退出标志以及分发线程上的全部资源
///
/// 分发循环在调用 `run` 的线程上同步执行；音频管线交给音频设备，在设备线程上运行。
/// 两者之间只共享数据包队列和退出标志。
pub struct Session<F> {
    playback: PlaybackConfig,
    quit: QuitFlag,
    queue: Arc<PacketQueue>,
    clock: AudioClock,

    demuxer: Option<Box<dyn Demuxer>>,
    audio_stream: Option<usize>,
    audio_output: Option<Box<dyn AudioOutput>>,
    pending_audio: Option<Box<dyn AudioFill>>,
    audio_stats: Option<Arc<AudioStats>>,
    video_stream: Option<usize>,
    video: Option<VideoRenderLoop<F>>,

    events: Vec<Sender<SessionEvent>>,
    dispatch_stats: DispatchStats,
    shut_down: bool,
}

impl<F> Session<F> {
    pub fn new(demuxer: Box<dyn Demuxer>, config: &PlayerConfig) -> Self {
        let quit = QuitFlag::new();
        let queue = Arc::new(PacketQueue::with_limit(quit.clone(), config.queue.limit));
        info!("{} 🎮 创建播放会话: {}", log_ctx(), demuxer.description());
        Self {
            playback: config.playback.clone(),
            quit,
            queue,
            clock: AudioClock::new(),
            demuxer: Some(demuxer),
            audio_stream: None,
            audio_output: None,
            pending_audio: None,
            audio_stats: None,
            video_stream: None,
            video: None,
            events: Vec::new(),
            dispatch_stats: DispatchStats::default(),
            shut_down: false,
        }
    }

    /// 音频管线要从这个队列取包
    pub fn queue(&self) -> Arc<PacketQueue> {
        self.queue.clone()
    }

    /// 由音频管线校准、供视频循环读取的时钟
    pub fn clock(&self) -> AudioClock {
        self.clock.clone()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            quit: self.quit.clone(),
            queue: self.queue.clone(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.events.push(tx);
        rx
    }

    /// 挂接音频流：管线在 `run` 开始时交给设备
    pub fn attach_audio<AF: 'static>(&mut self, pipeline: AudioPipeline<AF>, output: Box<dyn AudioOutput>) {
        self.audio_stream = self.demuxer.as_ref().and_then(|d| d.audio_stream_index());
        self.audio_stats = Some(pipeline.stats());
        self.pending_audio = Some(Box::new(pipeline));
        self.audio_output = Some(output);
    }

    pub fn attach_video(&mut self, video: VideoRenderLoop<F>) {
        self.video_stream = self.demuxer.as_ref().and_then(|d| d.video_stream_index());
        self.video = Some(video);
    }

    /// 启动音频设备并在当前线程运行分发循环，直到文件末尾或停止请求
    pub fn run(&mut self) -> Result<StopReason> {
        if self.pending_audio.is_none() && self.video.is_none() {
            return Err(PlayerError::NoPlayableStream);
        }
        let demuxer = self
            .demuxer
            .as_deref_mut()
            .ok_or_else(|| PlayerError::Other("会话已关闭".to_string()))?;

        if let (Some(output), Some(fill)) = (self.audio_output.as_mut(), self.pending_audio.take()) {
            output.start(fill)?;
            info!("{} 🔊 音频设备已启动", log_ctx());
        }
        Self::emit(&self.events, SessionEvent::Started);

        let mut dispatch = DispatchLoop::new(self.audio_stream, self.video_stream);
        let reason = dispatch.run(demuxer, &self.queue, self.video.as_mut(), &self.quit);
        self.dispatch_stats = dispatch.stats();

        if reason != StopReason::QuitRequested {
            if let Some(video) = self.video.as_mut() {
                video.finish();
            }
            Self::emit(&self.events, SessionEvent::EndOfStream);
            self.drain_audio();
        }

        Self::emit(&self.events, SessionEvent::Stopped(reason));
        Ok(reason)
    }

    /// 文件读完后等待音频队列被回调取空（有超时，且可被停止请求打断）
    fn drain_audio(&self) {
        if !self.playback.drain_audio_on_eos || self.audio_output.is_none() {
            return;
        }
        let deadline = Instant::now() + Duration::from_millis(self.playback.drain_timeout_ms);
        while !self.queue.is_empty() && !self.quit.is_raised() {
            if Instant::now() >= deadline {
                warn!("{} ⚠️ 等待音频播完超时，剩余 {:?}", log_ctx(), self.queue.stats());
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        debug!("{} 音频队列已排空", log_ctx());
    }

    fn emit(events: &[Sender<SessionEvent>], event: SessionEvent) {
        for tx in events {
            let _ = tx.send(event);
        }
    }

    /// 关闭会话，可重复调用
    ///
    /// 顺序：停止音频设备 → 清空队列 → 关闭解码器 → 关闭 Demuxer → 关闭渲染器 → 释放转换器。
    /// 每一步都容忍资源从未创建成功。
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("{} 🛑 开始关闭会话", log_ctx());

        self.quit.raise();
        self.queue.wake_all();

        if let Some(mut output) = self.audio_output.take() {
            output.stop();
            debug!("音频设备已停止");
        }
        // 从未启动过的管线
        self.pending_audio.take();

        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!("清空队列，丢弃 {} 个数据包", dropped);
        }

        let (decoder, renderer, scaler) = match self.video.take().map(VideoRenderLoop::into_parts) {
            Some(VideoParts {
                decoder,
                renderer,
                scaler,
            }) => (Some(decoder), Some(renderer), Some(scaler)),
            None => (None, None, None),
        };
        drop(decoder);
        drop(self.demuxer.take());
        drop(renderer);
        drop(scaler);

        info!("{} ✅ 会话已关闭", log_ctx());
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatch_stats
    }

    pub fn video_stats(&self) -> Option<VideoStats> {
        self.video.as_ref().map(|v| v.stats())
    }

    pub fn audio_stats(&self) -> Option<Arc<AudioStats>> {
        self.audio_stats.clone()
    }
}

impl<F> Drop for Session<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
