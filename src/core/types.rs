use serde::{Deserialize, Serialize};

/// 时间基（分数秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 将以本时间基表示的时间戳换算为毫秒
    pub fn to_millis(&self, ts: i64) -> i64 {
        if self.den == 0 {
            return 0;
        }
        (ts as i128 * self.num as i128 * 1000 / self.den as i128) as i64
    }
}

impl Default for Rational {
    fn default() -> Self {
        // 毫秒时间基
        Self::new(1, 1000)
    }
}

/// 流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Unknown,
}

/// 压缩数据包
///
/// 由 Demuxer 创建，入队时所有权转移给 PacketQueue，出队后归消费者所有。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub stream_index: usize,
    pub data: Vec<u8>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
}

impl Packet {
    pub fn new(stream_index: usize, data: Vec<u8>) -> Self {
        Self {
            stream_index,
            data,
            pts: None,
            dts: None,
            duration: 0,
        }
    }

    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self.dts.get_or_insert(pts);
        self
    }

    /// 负载字节数（用于队列的字节统计）
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 复制一份数据包，分配失败时返回错误而不是中止进程
    pub fn try_clone(&self) -> std::result::Result<Self, std::collections::TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(self.data.len())?;
        data.extend_from_slice(&self.data);
        Ok(Self {
            stream_index: self.stream_index,
            data,
            pts: self.pts,
            dts: self.dts,
            duration: self.duration,
        })
    }
}

/// 音频采样格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    /// 格式名称（与 FFmpeg 的命名一致）
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "flt",
            SampleFormat::F64 => "dbl",
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    /// 静音对应的字节值（无符号 8 位的零点在 0x80）
    pub fn silence_byte(&self) -> u8 {
        match self {
            SampleFormat::U8 => 0x80,
            _ => 0,
        }
    }
}

/// 音频输出规格（交织 PCM）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

impl AudioSpec {
    /// 16 位有符号交织 PCM
    pub fn s16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            format: SampleFormat::S16,
        }
    }

    /// 每声道 `samples` 个采样对应的字节数
    pub fn bytes_for(&self, samples: usize) -> usize {
        self.format.bytes_per_sample() * self.channels as usize * samples
    }
}

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    RGBA,
    RGB,
    YUV420P,
    NV12,
}

impl PixelFormat {
    pub fn buffer_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::RGBA => pixels * 4,
            PixelFormat::RGB => pixels * 3,
            PixelFormat::YUV420P | PixelFormat::NV12 => pixels * 3 / 2,
        }
    }
}

/// 转换到显示格式后的视频帧
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFrame {
    pub pts: i64, // 显示时间戳（毫秒）
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// 音频流描述（打开流时确定，之后不再变化）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub index: usize,
    pub time_base: Rational,
    pub source: AudioSpec,
    pub output: AudioSpec,
}

/// 视频流描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub index: usize,
    pub time_base: Rational,
    pub width: u32,
    pub height: u32,
    pub display_width: u32,
    pub display_height: u32,
    pub display_format: PixelFormat,
}

/// 单个流的探测信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSummary {
    pub index: usize,
    pub kind: StreamKind,
    pub codec: String,
    pub time_base: Rational,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// 媒体信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    pub url: String,
    pub format: String,
    pub duration: i64, // 总时长（毫秒）
    pub streams: Vec<StreamSummary>,
}

impl StreamSummary {
    /// 只有基本信息，解码参数读不到时其余字段留空
    pub fn new(index: usize, kind: StreamKind, codec: impl Into<String>, time_base: Rational) -> Self {
        Self {
            index,
            kind,
            codec: codec.into(),
            time_base,
            sample_rate: None,
            channels: None,
            width: None,
            height: None,
        }
    }
}

impl MediaInfo {
    pub fn stream(&self, index: usize) -> Option<&StreamSummary> {
        self.streams.iter().find(|s| s.index == index)
    }
}
