use crate::core::{AudioSpec, Packet, PixelFormat, PlayerError, Rational, Result, SampleFormat, VideoFrame};
use crate::player::source::{Decoder, Receive, Resampler, Scaler};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, software, util};
use log::{debug, info};

fn to_av_packet(packet: &Packet) -> ffmpeg::Packet {
    let mut av = ffmpeg::Packet::copy(&packet.data);
    av.set_stream(packet.stream_index);
    av.set_pts(packet.pts);
    av.set_dts(packet.dts);
    av.set_duration(packet.duration);
    av
}

fn receive<T>(result: std::result::Result<(), ffmpeg::Error>, frame: T) -> Result<Receive<T>> {
    match result {
        Ok(()) => Ok(Receive::Frame(frame)),
        Err(ffmpeg::Error::Other { errno }) if errno == util::error::EAGAIN => Ok(Receive::NeedMoreInput),
        Err(ffmpeg::Error::Eof) => Ok(Receive::EndOfStream),
        Err(e) => Err(PlayerError::DecodeError(e.to_string())),
    }
}

fn send(decoder: &mut codec::decoder::Opened, packet: &Packet) -> Result<()> {
    // 空包在 FFmpeg 里表示冲刷，这里按"零帧"处理
    if packet.data.is_empty() {
        return Ok(());
    }
    decoder
        .send_packet(&to_av_packet(packet))
        .map_err(|e| PlayerError::DecodeError(e.to_string()))
}

/// FFmpeg 音频解码器
pub struct FfmpegAudioDecoder {
    decoder: codec::decoder::Audio,
}

// 解码器上下文只在音频回调里使用
unsafe impl Send for FfmpegAudioDecoder {}

impl FfmpegAudioDecoder {
    pub fn from_stream(stream: &format::stream::Stream) -> Result<Self> {
        let context = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| PlayerError::DecoderOpenError(format!("音频: {}", e)))?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| PlayerError::DecoderOpenError(format!("音频: {}", e)))?;

        debug!(
            "音频解码器: {} Hz, {} 声道, 格式: {:?}",
            decoder.rate(),
            decoder.channels(),
            decoder.format()
        );
        Ok(Self { decoder })
    }

    /// 源音频规格
    pub fn spec(&self) -> AudioSpec {
        AudioSpec {
            sample_rate: self.decoder.rate(),
            channels: self.decoder.channels(),
            format: sample_format(self.decoder.format()),
        }
    }
}

impl Decoder for FfmpegAudioDecoder {
    type Frame = util::frame::Audio;

    fn send(&mut self, packet: &Packet) -> Result<()> {
        send(&mut self.decoder, packet)
    }

    fn receive_frame(&mut self) -> Result<Receive<Self::Frame>> {
        let mut frame = util::frame::Audio::empty();
        let result = self.decoder.receive_frame(&mut frame);
        receive(result, frame)
    }

    fn send_eof(&mut self) -> Result<()> {
        self.decoder.send_eof().map_err(|e| PlayerError::DecodeError(e.to_string()))
    }
}

/// FFmpeg 视频解码器（软件解码）
pub struct FfmpegVideoDecoder {
    decoder: codec::decoder::Video,
}

unsafe impl Send for FfmpegVideoDecoder {}

impl FfmpegVideoDecoder {
    pub fn from_stream(stream: &format::stream::Stream) -> Result<Self> {
        let context = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| PlayerError::DecoderOpenError(format!("视频: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| PlayerError::DecoderOpenError(format!("视频: {}", e)))?;

        debug!(
            "视频解码器: {}x{}, 格式: {:?}",
            decoder.width(),
            decoder.height(),
            decoder.format()
        );
        Ok(Self { decoder })
    }

    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub fn height(&self) -> u32 {
        self.decoder.height()
    }
}

impl Decoder for FfmpegVideoDecoder {
    type Frame = util::frame::Video;

    fn send(&mut self, packet: &Packet) -> Result<()> {
        send(&mut self.decoder, packet)
    }

    fn receive_frame(&mut self) -> Result<Receive<Self::Frame>> {
        let mut frame = util::frame::Video::empty();
        let result = self.decoder.receive_frame(&mut frame);
        receive(result, frame)
    }

    fn send_eof(&mut self) -> Result<()> {
        self.decoder.send_eof().map_err(|e| PlayerError::DecodeError(e.to_string()))
    }
}

/// swresample 重采样器：任意源格式 → 交织 S16
pub struct SwrResampler {
    context: Option<software::resampling::Context>,
    output: AudioSpec,
}

// SwrContext 本身不是 Send，但它只在音频回调线程里使用
unsafe impl Send for SwrResampler {}

impl SwrResampler {
    pub fn new(output: AudioSpec) -> Self {
        Self { context: None, output }
    }
}

impl Resampler for SwrResampler {
    type Frame = util::frame::Audio;

    fn convert(&mut self, frame: &util::frame::Audio, out: &mut [u8]) -> Result<usize> {
        // 首帧到来时才知道真实的源格式
        if self.context.is_none() {
            let mut source_layout = frame.channel_layout();
            if source_layout.is_empty() {
                source_layout = util::channel_layout::ChannelLayout::default(frame.channels() as i32);
            }
            let target_layout = util::channel_layout::ChannelLayout::default(self.output.channels as i32);

            info!(
                "🔧 初始化音频重采样器: {}Hz/{}ch/{:?} → {}Hz/{}ch/s16",
                frame.rate(),
                frame.channels(),
                frame.format(),
                self.output.sample_rate,
                self.output.channels
            );
            let context = software::resampling::Context::get(
                frame.format(),
                source_layout,
                frame.rate(),
                util::format::Sample::I16(util::format::sample::Type::Packed),
                target_layout,
                self.output.sample_rate,
            )
            .map_err(|e| PlayerError::ResampleError(e.to_string()))?;
            self.context = Some(context);
        }

        let context = self
            .context
            .as_mut()
            .ok_or_else(|| PlayerError::ResampleError("重采样器未初始化".to_string()))?;

        let mut resampled = util::frame::Audio::empty();
        context
            .run(frame, &mut resampled)
            .map_err(|e| PlayerError::ResampleError(e.to_string()))?;

        let samples = resampled.samples();
        let bytes = self.output.bytes_for(samples);
        if bytes > out.len() {
            return Err(PlayerError::ResampleError(format!(
                "输出缓冲区不足: 需要 {} 字节，只有 {}",
                bytes,
                out.len()
            )));
        }
        out[..bytes].copy_from_slice(&resampled.data(0)[..bytes]);
        Ok(samples)
    }
}

/// swscale 转换器：任意像素格式 → RGBA（显示尺寸）
pub struct SwsScaler {
    context: Option<software::scaling::Context>,
    source: Option<(util::format::Pixel, u32, u32)>,
    time_base: Rational,
    width: u32,
    height: u32,
}

// SwsContext 本身不是 Send，但我们确保只在分发线程中使用它
unsafe impl Send for SwsScaler {}

impl SwsScaler {
    pub fn new(time_base: Rational, width: u32, height: u32) -> Self {
        Self {
            context: None,
            source: None,
            time_base,
            width,
            height,
        }
    }
}

impl Scaler for SwsScaler {
    type Frame = util::frame::Video;

    fn scale(&mut self, frame: &util::frame::Video) -> Result<VideoFrame> {
        let source = (frame.format(), frame.width(), frame.height());
        // 源格式或尺寸变化时重建
        if self.source != Some(source) {
            let context = software::scaling::Context::get(
                source.0,
                source.1,
                source.2,
                util::format::Pixel::RGBA,
                self.width,
                self.height,
                software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| PlayerError::ScaleError(e.to_string()))?;
            debug!("创建图像转换器: {:?} {}x{} → RGBA {}x{}", source.0, source.1, source.2, self.width, self.height);
            self.context = Some(context);
            self.source = Some(source);
        }

        let context = self
            .context
            .as_mut()
            .ok_or_else(|| PlayerError::ScaleError("转换器未初始化".to_string()))?;

        let mut rgba_frame = util::frame::Video::empty();
        context
            .run(frame, &mut rgba_frame)
            .map_err(|e| PlayerError::ScaleError(e.to_string()))?;

        // 复制数据到连续内存
        let row_size = self.width as usize * 4;
        let mut data = vec![0u8; PixelFormat::RGBA.buffer_size(self.width, self.height)];
        let stride = rgba_frame.stride(0);
        let frame_data = rgba_frame.data(0);
        for y in 0..self.height as usize {
            let src_offset = y * stride;
            let dst_offset = y * row_size;
            data[dst_offset..dst_offset + row_size].copy_from_slice(&frame_data[src_offset..src_offset + row_size]);
        }

        Ok(VideoFrame {
            pts: self.time_base.to_millis(frame.timestamp().unwrap_or(0)),
            width: self.width,
            height: self.height,
            format: PixelFormat::RGBA,
            data,
        })
    }
}

/// FFmpeg 采样格式 → 本地采样格式（平面/交织不区分）
pub fn sample_format(format: util::format::Sample) -> SampleFormat {
    use util::format::Sample;
    match format {
        Sample::U8(_) => SampleFormat::U8,
        Sample::I16(_) => SampleFormat::S16,
        Sample::I32(_) => SampleFormat::S32,
        Sample::F32(_) => SampleFormat::F32,
        Sample::F64(_) => SampleFormat::F64,
        _ => SampleFormat::S16,
    }
}
