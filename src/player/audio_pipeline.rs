use crate::core::{AudioClock, AudioSpec, AudioStreamInfo, Rational};
use crate::player::packet_queue::{PacketQueue, Pop};
use crate::player::source::{AudioFill, Decoder, Receive, Resampler};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 音频管线统计（设备线程写，其他线程读）
#[derive(Debug, Default)]
pub struct AudioStats {
    callbacks: AtomicU64,
    bytes_delivered: AtomicU64,
    silence_bytes: AtomicU64,
    underruns: AtomicU64,
    decode_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioStatsSnapshot {
    pub callbacks: u64,
    pub bytes_delivered: u64,
    pub silence_bytes: u64,
    pub underruns: u64,
    pub decode_errors: u64,
}

impl AudioStats {
    pub fn snapshot(&self) -> AudioStatsSnapshot {
        AudioStatsSnapshot {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            silence_bytes: self.silence_bytes.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// 音频拉取管线 - 每条音频流一个实例
///
/// 由音频设备回调驱动：`fill` 从队列取包、解码、重采样，恰好写满请求的字节数。
/// 取不到数据（退出）或出错时用静音补齐，从不向回调抛出错误。
///
/// 解码/重采样状态和残留缓冲区只属于本实例，不与解复用线程共享。
pub struct AudioPipeline<F> {
    queue: Arc<PacketQueue>,
    decoder: Box<dyn Decoder<Frame = F> + Send>,
    resampler: Box<dyn Resampler<Frame = F> + Send>,
    output: AudioSpec,
    time_base: Rational,
    clock: Option<AudioClock>,

    // 已解码、已重采样但尚未交付的字节；0 ≤ index ≤ size ≤ residual.len()
    residual: Vec<u8>,
    index: usize,
    size: usize,

    // 当前数据包可能还有帧未取出
    draining: bool,
    stats: Arc<AudioStats>,
}

impl<F> AudioPipeline<F> {
    pub fn new(
        queue: Arc<PacketQueue>,
        decoder: Box<dyn Decoder<Frame = F> + Send>,
        resampler: Box<dyn Resampler<Frame = F> + Send>,
        stream: &AudioStreamInfo,
        residual_capacity: usize,
    ) -> Self {
        info!(
            "🔊 创建音频拉取管线: 流 #{}, 输出 {} Hz / {} 声道 / {}",
            stream.index,
            stream.output.sample_rate,
            stream.output.channels,
            stream.output.format.name()
        );
        Self {
            queue,
            decoder,
            resampler,
            output: stream.output,
            time_base: stream.time_base,
            clock: None,
            residual: vec![0u8; residual_capacity],
            index: 0,
            size: 0,
            draining: false,
            stats: Arc::new(AudioStats::default()),
        }
    }

    /// 用解码出的包 PTS 校准该时钟
    pub fn with_clock(mut self, clock: AudioClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn stats(&self) -> Arc<AudioStats> {
        self.stats.clone()
    }

    /// 恰好写满 `out`：先交付残留数据，不足时解码下一段，取不到则补静音
    pub fn fill(&mut self, mut out: &mut [u8]) {
        self.stats.callbacks.fetch_add(1, Ordering::Relaxed);

        while !out.is_empty() {
            if self.index >= self.size {
                match self.decode_next() {
                    Some(size) => {
                        self.size = size;
                        self.index = 0;
                    }
                    None => {
                        self.pad_silence(out);
                        return;
                    }
                }
            }

            let len = (self.size - self.index).min(out.len());
            let (head, tail) = std::mem::take(&mut out).split_at_mut(len);
            head.copy_from_slice(&self.residual[self.index..self.index + len]);
            self.index += len;
            self.stats
                .bytes_delivered
                .fetch_add(len as u64, Ordering::Relaxed);
            out = tail;
        }
    }

    fn pad_silence(&mut self, out: &mut [u8]) {
        out.fill(self.output.format.silence_byte());
        self.stats
            .silence_bytes
            .fetch_add(out.len() as u64, Ordering::Relaxed);
        let underruns = self.stats.underruns.fetch_add(1, Ordering::Relaxed) + 1;
        if underruns == 1 || underruns % 100 == 0 {
            debug!("音频欠载 #{}，补 {} 字节静音", underruns, out.len());
        }
    }

    /// 把下一段音频解码到残留缓冲区，返回字节数；欠载或退出时返回 None
    ///
    /// 先把当前包剩余的帧取完，再从队列阻塞取下一个包。
    /// 不产生帧的包不算错误，直接继续下一个。
    fn decode_next(&mut self) -> Option<usize> {
        loop {
            if self.draining {
                match self.decoder.receive_frame() {
                    Ok(Receive::Frame(frame)) => {
                        match self.resampler.convert(&frame, &mut self.residual) {
                            Ok(samples) => {
                                let bytes = self.output.bytes_for(samples).min(self.residual.len());
                                if bytes > 0 {
                                    return Some(bytes);
                                }
                            }
                            Err(e) => {
                                self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                                warn!("音频重采样失败（已跳过该帧）: {}", e);
                            }
                        }
                    }
                    Ok(Receive::NeedMoreInput) | Ok(Receive::EndOfStream) => {
                        self.draining = false;
                    }
                    Err(e) => {
                        self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("音频解码失败（已跳过剩余帧）: {}", e);
                        self.draining = false;
                    }
                }
                continue;
            }

            let packet = match self.queue.get(true) {
                Pop::Packet(packet) => packet,
                Pop::Empty | Pop::Stopped => return None,
            };

            if let (Some(clock), Some(pts)) = (&self.clock, packet.pts) {
                clock.set_time(self.time_base.to_millis(pts));
            }

            match self.decoder.send(&packet) {
                Ok(()) => self.draining = true,
                Err(e) => {
                    self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("音频数据包解码失败（已跳过）: {}", e);
                }
            }
        }
    }
}

impl<F: 'static> AudioFill for AudioPipeline<F> {
    fn fill(&mut self, out: &mut [u8]) {
        AudioPipeline::fill(self, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Packet;
    use crate::player::quit::QuitFlag;
    use crate::player::test_support::{PassThroughResampler, ScriptedDecoder, TestFrame, BAD_PAYLOAD};
    use std::thread;
    use std::time::Duration;

    fn stream() -> AudioStreamInfo {
        AudioStreamInfo {
            index: 1,
            time_base: Rational::new(1, 1000),
            source: AudioSpec::s16(44100, 2),
            output: AudioSpec::s16(44100, 2),
        }
    }

    fn pipeline(queue: &Arc<PacketQueue>, chunk: usize) -> AudioPipeline<TestFrame> {
        AudioPipeline::new(
            queue.clone(),
            Box::new(ScriptedDecoder::new(chunk)),
            Box::new(PassThroughResampler { channels: 2 }),
            &stream(),
            288_000,
        )
    }

    fn new_queue() -> (QuitFlag, Arc<PacketQueue>) {
        let quit = QuitFlag::new();
        let queue = Arc::new(PacketQueue::new(quit.clone()));
        (quit, queue)
    }

    fn raise(quit: &QuitFlag, queue: &PacketQueue) {
        quit.raise();
        queue.wake_all();
    }

    #[test]
    fn test_fill_exact_silence_when_stopped() {
        let (quit, queue) = new_queue();
        raise(&quit, &queue);
        let mut pipeline = pipeline(&queue, 1024);

        for n in [0usize, 1, 3, 512, 4096, 10_000] {
            let mut buf = vec![0xFFu8; n];
            pipeline.fill(&mut buf);
            assert_eq!(buf.len(), n);
            assert!(buf.iter().all(|b| *b == 0), "len {} not silent", n);
        }
    }

    #[test]
    fn test_end_to_end_three_packets_then_silence() {
        let (quit, queue) = new_queue();
        for i in 0..3u8 {
            queue
                .put(Packet::new(1, vec![i + 1; 1024]).with_pts(i as i64 * 10))
                .unwrap();
        }
        let mut pipeline = pipeline(&queue, 1024);

        let mut delivered = Vec::new();
        for _ in 0..6 {
            let mut buf = [0u8; 512];
            pipeline.fill(&mut buf);
            delivered.extend_from_slice(&buf);
        }
        assert_eq!(delivered.len(), 3072);
        assert!(delivered[..1024].iter().all(|b| *b == 1));
        assert!(delivered[1024..2048].iter().all(|b| *b == 2));
        assert!(delivered[2048..].iter().all(|b| *b == 3));
        assert_eq!(queue.stats(), (0, 0));

        raise(&quit, &queue);
        let mut buf = [0xEEu8; 512];
        pipeline.fill(&mut buf);
        assert!(buf.iter().all(|b| *b == 0));

        let stats = pipeline.stats().snapshot();
        assert_eq!(stats.callbacks, 7);
        assert_eq!(stats.bytes_delivered, 3072);
        assert_eq!(stats.silence_bytes, 512);
        assert_eq!(stats.underruns, 1);
    }

    #[test]
    fn test_multiple_frames_per_packet_in_order() {
        let (quit, queue) = new_queue();
        let payload: Vec<u8> = (0..1000u32).map(|i| (i / 100) as u8 + 1).collect();
        queue.put(Packet::new(1, payload.clone())).unwrap();
        let mut pipeline = pipeline(&queue, 100);

        let mut buf = vec![0u8; 1000];
        pipeline.fill(&mut buf);
        assert_eq!(buf, payload);

        raise(&quit, &queue);
        let mut tail = [1u8; 16];
        pipeline.fill(&mut tail);
        assert_eq!(tail, [0u8; 16]);
    }

    #[test]
    fn test_frameless_and_bad_packets_are_skipped() {
        let (quit, queue) = new_queue();
        queue.put(Packet::new(1, Vec::new())).unwrap();
        queue.put(Packet::new(1, BAD_PAYLOAD.to_vec())).unwrap();
        queue.put(Packet::new(1, vec![7; 256])).unwrap();
        let mut pipeline = pipeline(&queue, 1024);

        let mut buf = [0u8; 256];
        pipeline.fill(&mut buf);
        assert!(buf.iter().all(|b| *b == 7));
        assert_eq!(pipeline.stats().snapshot().decode_errors, 1);

        raise(&quit, &queue);
    }

    #[test]
    fn test_partial_audio_then_silence_on_quit() {
        let (quit, queue) = new_queue();
        queue.put(Packet::new(1, vec![5; 300])).unwrap();
        let mut pipeline = pipeline(&queue, 1024);

        let stopper = {
            let quit = quit.clone();
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                raise(&quit, &queue);
            })
        };

        let mut buf = vec![0xFFu8; 1000];
        pipeline.fill(&mut buf);
        stopper.join().unwrap();

        assert!(buf[..300].iter().all(|b| *b == 5));
        assert!(buf[300..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_fill_waits_for_producer() {
        let (quit, queue) = new_queue();
        let mut pipeline = pipeline(&queue, 4096);

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..4u8 {
                    thread::sleep(Duration::from_millis(10));
                    queue.put(Packet::new(1, vec![i + 1; 512])).unwrap();
                }
            })
        };

        let mut buf = vec![0u8; 2048];
        pipeline.fill(&mut buf);
        producer.join().unwrap();

        for (i, chunk) in buf.chunks(512).enumerate() {
            assert!(chunk.iter().all(|b| *b == i as u8 + 1));
        }
        raise(&quit, &queue);
    }

    #[test]
    fn test_residual_spans_callbacks() {
        let (quit, queue) = new_queue();
        queue.put(Packet::new(1, (0..=255u8).collect())).unwrap();
        let mut pipeline = pipeline(&queue, 1024);

        let mut a = [0u8; 100];
        let mut b = [0u8; 156];
        pipeline.fill(&mut a);
        pipeline.fill(&mut b);
        let joined: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
        assert_eq!(joined, (0..=255u8).collect::<Vec<_>>());
        raise(&quit, &queue);
    }

    #[test]
    fn test_clock_follows_packet_pts() {
        let (quit, queue) = new_queue();
        queue.put(Packet::new(1, vec![1; 64]).with_pts(2500)).unwrap();
        let clock = AudioClock::new();
        let mut pipeline = pipeline(&queue, 1024).with_clock(clock.clone());

        let mut buf = [0u8; 64];
        pipeline.fill(&mut buf);
        assert!(clock.now().unwrap() >= 2500);
        raise(&quit, &queue);
    }
}
