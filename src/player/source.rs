use crate::core::{MediaInfo, Packet, Result, VideoFrame};

/// Demuxer 数据源抽象接口
///
/// 不同的媒体源（本地文件、网络流、测试用的内存流）都实现这个接口。
pub trait Demuxer: Send {
    /// 读取下一个数据包
    ///
    /// 返回：
    /// - Ok(Some(packet)): 成功读取一个包
    /// - Ok(None): 到达文件末尾
    /// - Err(e): 读取错误（分发循环把它当作文件末尾处理）
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// 获取媒体信息
    fn media_info(&self) -> &MediaInfo;

    fn video_stream_index(&self) -> Option<usize>;

    fn audio_stream_index(&self) -> Option<usize>;

    /// 获取描述信息（用于调试）
    fn description(&self) -> String;
}

/// `Decoder::receive_frame` 的结果
#[derive(Debug, PartialEq)]
pub enum Receive<F> {
    Frame(F),
    /// 需要再送入数据包
    NeedMoreInput,
    /// 解码器已完全排空
    EndOfStream,
}

/// 按流的解码器：数据包 → 原始帧
///
/// 一个数据包可能产生零个、一个或多个帧。
pub trait Decoder {
    type Frame;

    fn send(&mut self, packet: &Packet) -> Result<()>;

    fn receive_frame(&mut self) -> Result<Receive<Self::Frame>>;

    /// 通知解码器输入结束，之后 `receive_frame` 会吐出缓存的帧直到 EndOfStream
    fn send_eof(&mut self) -> Result<()>;
}

/// 重采样器：原始音频帧 → 协商好的输出格式（交织 PCM）
pub trait Resampler {
    type Frame;

    /// 转换一帧写入 `out`，返回写入的每声道采样数
    fn convert(&mut self, frame: &Self::Frame, out: &mut [u8]) -> Result<usize>;
}

/// 图像转换器：原始视频帧 → 显示像素格式/尺寸
pub trait Scaler {
    type Frame;

    fn scale(&mut self, frame: &Self::Frame) -> Result<VideoFrame>;
}

/// 渲染器：呈现一帧，并报告外部停止请求（例如窗口关闭）
pub trait Renderer {
    fn present(&mut self, frame: &VideoFrame) -> Result<()>;

    /// 是否收到了外部停止请求
    fn quit_requested(&mut self) -> bool {
        false
    }
}

/// 音频拉取接口：设备每次需要数据时调用，必须恰好写满 `out`
pub trait AudioFill: Send {
    fn fill(&mut self, out: &mut [u8]);
}

/// 音频设备：在自己的线程上回调 `AudioFill`
pub trait AudioOutput: Send {
    /// 开始播放；之后设备线程会不断调用 `fill`
    fn start(&mut self, fill: Box<dyn AudioFill>) -> Result<()>;

    /// 停止播放并释放回调（可重复调用）
    fn stop(&mut self);
}
