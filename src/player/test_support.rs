//! 测试用的合成协作者

use crate::core::{MediaInfo, Packet, PixelFormat, PlayerError, Result, VideoFrame};
use crate::player::source::{AudioFill, AudioOutput, Decoder, Demuxer, Receive, Renderer, Resampler, Scaler};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// 合成的"原始帧"：解码结果就是负载字节本身
#[derive(Debug, Clone, PartialEq)]
pub struct TestFrame {
    pub pts: i64,
    pub bytes: Vec<u8>,
}

/// 负载等于该值的数据包会解码失败
pub const BAD_PAYLOAD: &[u8] = b"bad";

/// 脚本化解码器：把负载按 `chunk` 切成若干帧
///
/// - 空负载产生零帧
/// - `delay = true` 时模拟带重排序的编码器：一个包的帧要等下一个包送入
///   （或 send_eof）后才能取出
pub struct ScriptedDecoder {
    chunk: usize,
    delay: bool,
    ready: VecDeque<TestFrame>,
    held: VecDeque<TestFrame>,
    eof: bool,
}

impl ScriptedDecoder {
    pub fn new(chunk: usize) -> Self {
        Self {
            chunk,
            delay: false,
            ready: VecDeque::new(),
            held: VecDeque::new(),
            eof: false,
        }
    }

    pub fn delayed(chunk: usize) -> Self {
        Self {
            delay: true,
            ..Self::new(chunk)
        }
    }
}

impl Decoder for ScriptedDecoder {
    type Frame = TestFrame;

    fn send(&mut self, packet: &Packet) -> Result<()> {
        if packet.data == BAD_PAYLOAD {
            return Err(PlayerError::DecodeError("corrupt packet".into()));
        }
        let pts = packet.pts.unwrap_or(0);
        let frames: Vec<TestFrame> = packet
            .data
            .chunks(self.chunk)
            .map(|c| TestFrame {
                pts,
                bytes: c.to_vec(),
            })
            .collect();

        if self.delay {
            self.ready.extend(self.held.drain(..));
            self.held.extend(frames);
        } else {
            self.ready.extend(frames);
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Receive<TestFrame>> {
        if let Some(frame) = self.ready.pop_front() {
            return Ok(Receive::Frame(frame));
        }
        if self.eof {
            Ok(Receive::EndOfStream)
        } else {
            Ok(Receive::NeedMoreInput)
        }
    }

    fn send_eof(&mut self) -> Result<()> {
        self.ready.extend(self.held.drain(..));
        self.eof = true;
        Ok(())
    }
}

/// 直通重采样器：把帧字节原样拷贝到输出（假定已是 S16 交织）
pub struct PassThroughResampler {
    pub channels: usize,
}

impl Resampler for PassThroughResampler {
    type Frame = TestFrame;

    fn convert(&mut self, frame: &TestFrame, out: &mut [u8]) -> Result<usize> {
        if frame.bytes.len() > out.len() {
            return Err(PlayerError::ResampleError("output buffer too small".into()));
        }
        out[..frame.bytes.len()].copy_from_slice(&frame.bytes);
        Ok(frame.bytes.len() / (2 * self.channels))
    }
}

/// 把帧字节当作 RGBA 像素的转换器；负载为 "noscale" 时失败
pub struct TestScaler;

impl Scaler for TestScaler {
    type Frame = TestFrame;

    fn scale(&mut self, frame: &TestFrame) -> Result<VideoFrame> {
        if frame.bytes == b"noscale" {
            return Err(PlayerError::ScaleError("unsupported frame".into()));
        }
        Ok(VideoFrame {
            pts: frame.pts,
            width: (frame.bytes.len() / 4) as u32,
            height: 1,
            format: PixelFormat::RGBA,
            data: frame.bytes.clone(),
        })
    }
}

/// 记录呈现过的帧 PTS；可在呈现 N 帧后报告停止请求
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    pub presented: Arc<Mutex<Vec<i64>>>,
    pub quit_after: Option<usize>,
    pub closed: Arc<AtomicBool>,
}

impl RecordingRenderer {
    pub fn quitting_after(frames: usize) -> Self {
        let mut renderer = Self::default();
        renderer.quit_after = Some(frames);
        renderer
    }
}

impl Renderer for RecordingRenderer {
    fn present(&mut self, frame: &VideoFrame) -> Result<()> {
        self.presented.lock().push(frame.pts);
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        matches!(self.quit_after, Some(n) if self.presented.lock().len() >= n)
    }
}

impl Drop for RecordingRenderer {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// 内存中的 Demuxer，按给定顺序吐出数据包（或读取错误）
pub struct VecDemuxer {
    items: VecDeque<Result<Packet>>,
    info: MediaInfo,
    audio: Option<usize>,
    video: Option<usize>,
    pub closed: Arc<AtomicBool>,
}

impl VecDemuxer {
    pub fn new(items: Vec<Result<Packet>>, audio: Option<usize>, video: Option<usize>) -> Self {
        Self {
            items: items.into(),
            info: MediaInfo::default(),
            audio,
            video,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_packets(packets: Vec<Packet>, audio: Option<usize>, video: Option<usize>) -> Self {
        Self::new(packets.into_iter().map(Ok).collect(), audio, video)
    }
}

impl Demuxer for VecDemuxer {
    fn read_packet(&mut self) -> Result<Option<Packet>> {
        match self.items.pop_front() {
            Some(Ok(packet)) => Ok(Some(packet)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn media_info(&self) -> &MediaInfo {
        &self.info
    }

    fn video_stream_index(&self) -> Option<usize> {
        self.video
    }

    fn audio_stream_index(&self) -> Option<usize> {
        self.audio
    }

    fn description(&self) -> String {
        "VecDemuxer".to_string()
    }
}

impl Drop for VecDemuxer {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// 模拟音频设备：后台线程以固定长度反复调用 `fill`，收集输出
pub struct FakeAudioOutput {
    pub chunk: usize,
    pub captured: Arc<Mutex<Vec<u8>>>,
    pub stops: Arc<Mutex<usize>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeAudioOutput {
    pub fn new(chunk: usize) -> Self {
        Self {
            chunk,
            captured: Arc::new(Mutex::new(Vec::new())),
            stops: Arc::new(Mutex::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl AudioOutput for FakeAudioOutput {
    fn start(&mut self, mut fill: Box<dyn AudioFill>) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let captured = self.captured.clone();
        let chunk = self.chunk;
        self.handle = Some(thread::spawn(move || {
            let mut buf = vec![0xAAu8; chunk];
            while running.load(Ordering::SeqCst) {
                fill.fill(&mut buf);
                captured.lock().extend_from_slice(&buf);
                thread::sleep(std::time::Duration::from_millis(1));
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            *self.stops.lock() += 1;
        }
    }
}
