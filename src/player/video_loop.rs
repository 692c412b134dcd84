use crate::core::{AudioClock, Packet, VideoStreamInfo};
use crate::player::source::{Decoder, Receive, Renderer, Scaler};
use log::{debug, info, warn};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    pub packets: u64,
    pub frames_presented: u64,
    pub decode_errors: u64,
    pub scale_errors: u64,
    pub render_errors: u64,
}

/// 视频渲染循环 - 在分发线程上同步执行 解码 → 转换 → 呈现
///
/// 不做独立的定时：帧解码出来就立即呈现，节奏只来自读包速度
/// （可选的固定呈现延迟除外）。音频时钟只用来记录音画偏差。
pub struct VideoRenderLoop<F> {
    decoder: Box<dyn Decoder<Frame = F> + Send>,
    scaler: Box<dyn Scaler<Frame = F> + Send>,
    renderer: Box<dyn Renderer + Send>,
    present_delay: Option<Duration>,
    clock: Option<AudioClock>,
    stats: VideoStats,
}

/// 按释放顺序拆开的组件
pub struct VideoParts<F> {
    pub decoder: Box<dyn Decoder<Frame = F> + Send>,
    pub renderer: Box<dyn Renderer + Send>,
    pub scaler: Box<dyn Scaler<Frame = F> + Send>,
}

impl<F> VideoRenderLoop<F> {
    pub fn new(
        decoder: Box<dyn Decoder<Frame = F> + Send>,
        scaler: Box<dyn Scaler<Frame = F> + Send>,
        renderer: Box<dyn Renderer + Send>,
        stream: &VideoStreamInfo,
    ) -> Self {
        info!(
            "🎬 创建视频渲染循环: 流 #{}, {}x{} → {}x{} {:?}",
            stream.index,
            stream.width,
            stream.height,
            stream.display_width,
            stream.display_height,
            stream.display_format
        );
        Self {
            decoder,
            scaler,
            renderer,
            present_delay: None,
            clock: None,
            stats: VideoStats::default(),
        }
    }

    /// 每次呈现后固定睡眠一段时间（0 表示不延迟）
    pub fn with_present_delay(mut self, delay_ms: u64) -> Self {
        self.present_delay = (delay_ms > 0).then(|| Duration::from_millis(delay_ms));
        self
    }

    pub fn with_clock(mut self, clock: AudioClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 处理一个视频数据包：解码出的每一帧都转换并立即呈现
    ///
    /// 单个包解码失败只记录日志，不中断循环。
    pub fn handle_packet(&mut self, packet: &Packet) {
        self.stats.packets += 1;
        if let Err(e) = self.decoder.send(packet) {
            self.stats.decode_errors += 1;
            warn!("视频数据包解码失败（已跳过）: {}", e);
            return;
        }
        self.drain_frames();
    }

    /// 输入结束：冲刷解码器，呈现缓存在里面的帧
    pub fn finish(&mut self) {
        if let Err(e) = self.decoder.send_eof() {
            warn!("视频解码器冲刷失败: {}", e);
            return;
        }
        self.drain_frames();
        debug!("视频解码器已冲刷，共呈现 {} 帧", self.stats.frames_presented);
    }

    fn drain_frames(&mut self) {
        loop {
            match self.decoder.receive_frame() {
                Ok(Receive::Frame(frame)) => self.present(&frame),
                Ok(Receive::NeedMoreInput) | Ok(Receive::EndOfStream) => break,
                Err(e) => {
                    self.stats.decode_errors += 1;
                    warn!("视频解码错误（已跳过）: {}", e);
                    break;
                }
            }
        }
    }

    fn present(&mut self, frame: &F) {
        let scaled = match self.scaler.scale(frame) {
            Ok(scaled) => scaled,
            Err(e) => {
                self.stats.scale_errors += 1;
                warn!("视频帧转换失败（已跳过）: {}", e);
                return;
            }
        };

        if let Some(audio_now) = self.clock.as_ref().and_then(|c| c.now()) {
            let video_pts = scaled.pts;
            if self.stats.frames_presented % 100 == 0 {
                debug!(
                    "音画偏差: 视频 {}ms, 音频 {}ms, 差 {}ms",
                    video_pts,
                    audio_now,
                    video_pts - audio_now
                );
            }
        }

        match self.renderer.present(&scaled) {
            Ok(()) => self.stats.frames_presented += 1,
            Err(e) => {
                self.stats.render_errors += 1;
                warn!("视频帧呈现失败: {}", e);
            }
        }

        if let Some(delay) = self.present_delay {
            thread::sleep(delay);
        }
    }

    /// 渲染器是否收到了外部停止请求
    pub fn quit_requested(&mut self) -> bool {
        self.renderer.quit_requested()
    }

    pub fn stats(&self) -> VideoStats {
        self.stats
    }

    pub fn into_parts(self) -> VideoParts<F> {
        VideoParts {
            decoder: self.decoder,
            renderer: self.renderer,
            scaler: self.scaler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PixelFormat, Rational};
    use crate::player::test_support::{RecordingRenderer, ScriptedDecoder, TestFrame, TestScaler, BAD_PAYLOAD};

    fn stream() -> VideoStreamInfo {
        VideoStreamInfo {
            index: 0,
            time_base: Rational::new(1, 1000),
            width: 2,
            height: 1,
            display_width: 2,
            display_height: 1,
            display_format: PixelFormat::RGBA,
        }
    }

    fn render_loop(decoder: ScriptedDecoder, renderer: RecordingRenderer) -> VideoRenderLoop<TestFrame> {
        VideoRenderLoop::new(Box::new(decoder), Box::new(TestScaler), Box::new(renderer), &stream())
    }

    #[test]
    fn test_each_frame_presented_immediately() {
        let renderer = RecordingRenderer::default();
        let mut video = render_loop(ScriptedDecoder::new(8), renderer.clone());

        // 16 字节 → 2 帧
        video.handle_packet(&Packet::new(0, vec![1; 16]).with_pts(40));
        assert_eq!(*renderer.presented.lock(), vec![40, 40]);

        // 空包不产生帧
        video.handle_packet(&Packet::new(0, Vec::new()).with_pts(80));
        assert_eq!(renderer.presented.lock().len(), 2);

        let stats = video.stats();
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.frames_presented, 2);
    }

    #[test]
    fn test_decode_error_does_not_abort() {
        let renderer = RecordingRenderer::default();
        let mut video = render_loop(ScriptedDecoder::new(8), renderer.clone());

        video.handle_packet(&Packet::new(0, BAD_PAYLOAD.to_vec()).with_pts(0));
        video.handle_packet(&Packet::new(0, b"noscale".to_vec()).with_pts(1));
        video.handle_packet(&Packet::new(0, vec![3; 8]).with_pts(2));

        assert_eq!(*renderer.presented.lock(), vec![2]);
        let stats = video.stats();
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(stats.scale_errors, 1);
        assert_eq!(stats.frames_presented, 1);
    }

    #[test]
    fn test_reordering_decoder_flushed_on_finish() {
        let renderer = RecordingRenderer::default();
        let mut video = render_loop(ScriptedDecoder::delayed(8), renderer.clone());

        video.handle_packet(&Packet::new(0, vec![1; 8]).with_pts(0));
        assert!(renderer.presented.lock().is_empty());
        video.handle_packet(&Packet::new(0, vec![1; 8]).with_pts(40));
        assert_eq!(*renderer.presented.lock(), vec![0]);

        video.finish();
        assert_eq!(*renderer.presented.lock(), vec![0, 40]);
    }

    #[test]
    fn test_quit_requested_from_renderer() {
        let renderer = RecordingRenderer::quitting_after(1);
        let mut video = render_loop(ScriptedDecoder::new(8), renderer);
        assert!(!video.quit_requested());
        video.handle_packet(&Packet::new(0, vec![1; 8]));
        assert!(video.quit_requested());
    }
}
