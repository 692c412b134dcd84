use crate::core::{MediaInfo, Packet, PlayerError, Rational, Result, StreamKind, StreamSummary};
use crate::player::source::Demuxer;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, media};
use log::{debug, info};

/// FFmpeg 解封装器 - 读取容器并按流拆出数据包
pub struct FfmpegDemuxer {
    input_ctx: format::context::Input,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    media_info: MediaInfo, // 缓存媒体信息
    source_path: String,
}

// 输入上下文只在分发线程上使用，创建后整体移交过去
unsafe impl Send for FfmpegDemuxer {}

impl FfmpegDemuxer {
    /// 打开媒体文件或网络流，至少要有一路音频或视频
    pub fn open(path: &str) -> Result<Self> {
        info!("正在打开: {}", path);

        let input_ctx = open_input(path)?;

        let video_stream_index = input_ctx.streams().best(media::Type::Video).map(|s| s.index());
        let audio_stream_index = input_ctx.streams().best(media::Type::Audio).map(|s| s.index());

        if video_stream_index.is_none() && audio_stream_index.is_none() {
            return Err(PlayerError::NoPlayableStream);
        }

        debug!("视频流索引: {:?}", video_stream_index);
        debug!("音频流索引: {:?}", audio_stream_index);

        let media_info = summarize(&input_ctx, path)?;
        Ok(Self {
            input_ctx,
            video_stream_index,
            audio_stream_index,
            media_info,
            source_path: path.to_string(),
        })
    }

    pub fn video_stream(&self) -> Option<format::stream::Stream<'_>> {
        self.video_stream_index.and_then(|idx| self.input_ctx.stream(idx))
    }

    pub fn audio_stream(&self) -> Option<format::stream::Stream<'_>> {
        self.audio_stream_index.and_then(|idx| self.input_ctx.stream(idx))
    }
}

impl Demuxer for FfmpegDemuxer {
    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input_ctx) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        Ok(Some(Packet {
            stream_index: packet.stream(),
            data: packet.data().map(|d| d.to_vec()).unwrap_or_default(),
            pts: packet.pts(),
            dts: packet.dts(),
            duration: packet.duration(),
        }))
    }

    fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }

    fn video_stream_index(&self) -> Option<usize> {
        self.video_stream_index
    }

    fn audio_stream_index(&self) -> Option<usize> {
        self.audio_stream_index
    }

    fn description(&self) -> String {
        format!("FFmpeg Demuxer: {}", self.source_path)
    }
}

/// 只探测不播放：列出容器里的全部流
pub fn inspect(path: &str) -> Result<MediaInfo> {
    let input_ctx = open_input(path)?;
    summarize(&input_ctx, path)
}

fn open_input(path: &str) -> Result<format::context::Input> {
    match network_options(path) {
        Some(options) => {
            info!("🌐 检测到网络流，应用超时选项");
            format::input_with_dictionary(&path, options)
                .map_err(|e| PlayerError::OpenError(format!("无法打开网络流: {}", e)))
        }
        None => format::input(&path).map_err(|e| PlayerError::OpenError(format!("无法打开文件: {}", e))),
    }
}

/// 网络流只设读写超时，不自动重连
fn network_options(path: &str) -> Option<ffmpeg::Dictionary<'static>> {
    let is_network = ["http://", "https://", "rtsp://", "rtmp://"]
        .iter()
        .any(|scheme| path.starts_with(scheme));
    if !is_network {
        return None;
    }
    let mut options = ffmpeg::Dictionary::new();
    options.set("rw_timeout", "8000000"); // 读写操作 8s 超时
    Some(options)
}

pub fn rational(r: ffmpeg::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

fn summarize(input_ctx: &format::context::Input, path: &str) -> Result<MediaInfo> {
    let mut streams = Vec::new();

    for stream in input_ctx.streams() {
        let params = stream.parameters();
        let codec_name = params.id().name().to_string();
        let time_base = rational(stream.time_base());

        let summary = match params.medium() {
            media::Type::Audio => {
                let mut summary = StreamSummary::new(stream.index(), StreamKind::Audio, codec_name, time_base);
                // 打不开解码器的流照样列出，只是没有采样参数
                if let Some((rate, channels)) = audio_details(params) {
                    summary.sample_rate = Some(rate);
                    summary.channels = Some(channels);
                }
                summary
            }
            media::Type::Video => {
                let mut summary = StreamSummary::new(stream.index(), StreamKind::Video, codec_name, time_base);
                if let Some((width, height)) = video_details(params) {
                    summary.width = Some(width);
                    summary.height = Some(height);
                }
                summary
            }
            media::Type::Subtitle => StreamSummary::new(stream.index(), StreamKind::Subtitle, codec_name, time_base),
            media::Type::Data | media::Type::Attachment => {
                StreamSummary::new(stream.index(), StreamKind::Data, codec_name, time_base)
            }
            _ => StreamSummary::new(stream.index(), StreamKind::Unknown, codec_name, time_base),
        };
        streams.push(summary);
    }

    Ok(MediaInfo {
        url: path.to_string(),
        format: input_ctx.format().name().to_string(),
        duration: input_ctx.duration() / 1000, // 微秒转毫秒
        streams,
    })
}

fn audio_details(params: codec::Parameters) -> Option<(u32, u16)> {
    match codec::context::Context::from_parameters(params).and_then(|ctx| ctx.decoder().audio()) {
        Ok(decoder) => Some((decoder.rate(), decoder.channels())),
        Err(e) => {
            debug!("读取音频参数失败: {}", e);
            None
        }
    }
}

fn video_details(params: codec::Parameters) -> Option<(u32, u32)> {
    match codec::context::Context::from_parameters(params).and_then(|ctx| ctx.decoder().video()) {
        Ok(decoder) => Some((decoder.width(), decoder.height())),
        Err(e) => {
            debug!("读取视频参数失败: {}", e);
            None
        }
    }
}
