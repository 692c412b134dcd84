use crate::core::{AudioSpec, PlayerError, Result};
use crate::player::source::{AudioFill, AudioOutput};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};
use log::{debug, error, info, warn};

/// 音频设备 - cpal 输出流，回调线程里调用 `fill`
pub struct CpalAudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
}

// cpal::Stream 本身不是 Send，但它只在创建它的会话里启动和停止
unsafe impl Send for CpalAudioOutput {}

impl CpalAudioOutput {
    /// 打开默认输出设备（不支持请求的配置时自动回退）
    ///
    /// `buffer_frames` 为 None 时使用设备默认缓冲，回调长度由设备决定。
    pub fn new(sample_rate: u32, channels: u16, buffer_frames: Option<u32>) -> Result<Self> {
        info!("初始化音频输出: {} Hz, {} 声道", sample_rate, channels);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::AudioError("无法找到音频输出设备".to_string()))?;

        debug!("使用音频设备: {}", device.name().unwrap_or_default());

        let buffer_size = match buffer_frames {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => cpal::BufferSize::Default,
        };

        let mut candidates = vec![(sample_rate, channels)];
        candidates.extend([
            (48000, 2), // 最常见
            (44100, 2), // CD 音质
            (48000, 1),
            (44100, 1),
        ]);

        for (index, (rate, chans)) in candidates.into_iter().enumerate() {
            let config = StreamConfig {
                channels: chans,
                sample_rate: cpal::SampleRate(rate),
                buffer_size: buffer_size.clone(),
            };
            if let Some(sample_format) = Self::find_sample_format(&device, &config)? {
                if index > 0 {
                    warn!(
                        "⚠️  音频设备不支持 {} Hz, {} 声道，回退到 {} Hz, {} 声道",
                        sample_rate, channels, rate, chans
                    );
                }
                info!("✅ 音频输出配置: {} Hz, {} 声道, {:?}", rate, chans, sample_format);
                return Ok(Self {
                    device,
                    config,
                    sample_format,
                    stream: None,
                });
            }
        }

        Err(PlayerError::AudioError(format!(
            "音频设备不支持任何标准配置 (原请求: {} Hz, {} 声道)",
            sample_rate, channels
        )))
    }

    /// 优先 i16（直接交付 S16），其次 f32（由 S16 转换）
    fn find_sample_format(device: &Device, config: &StreamConfig) -> Result<Option<SampleFormat>> {
        let supported = device
            .supported_output_configs()
            .map_err(|e| PlayerError::AudioError(format!("无法获取支持的音频配置: {}", e)))?;

        let mut found = None;
        for range in supported.filter(|r| Self::is_config_compatible(config, r)) {
            match range.sample_format() {
                SampleFormat::I16 => return Ok(Some(SampleFormat::I16)),
                SampleFormat::F32 => found = Some(SampleFormat::F32),
                _ => {}
            }
        }
        Ok(found)
    }

    fn is_config_compatible(config: &StreamConfig, supported: &SupportedStreamConfigRange) -> bool {
        let rate_in_range = config.sample_rate.0 >= supported.min_sample_rate().0
            && config.sample_rate.0 <= supported.max_sample_rate().0;

        rate_in_range && config.channels == supported.channels()
    }

    /// 实际使用的输出规格（管线总是交付 S16）
    pub fn actual_spec(&self) -> AudioSpec {
        AudioSpec::s16(self.config.sample_rate.0, self.config.channels)
    }
}

impl AudioOutput for CpalAudioOutput {
    fn start(&mut self, mut fill: Box<dyn AudioFill>) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let on_error = |err: cpal::StreamError| error!("音频流错误: {}", err);

        let stream = match self.sample_format {
            SampleFormat::I16 => self.device.build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    fill.fill(bytemuck::cast_slice_mut(data));
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => {
                let mut scratch: Vec<i16> = Vec::new();
                self.device.build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0);
                        fill.fill(bytemuck::cast_slice_mut(&mut scratch));
                        for (dst, src) in data.iter_mut().zip(&scratch) {
                            *dst = *src as f32 / 32768.0;
                        }
                    },
                    on_error,
                    None,
                )
            }
            other => {
                return Err(PlayerError::AudioError(format!("不支持的设备采样格式: {:?}", other)));
            }
        }
        .map_err(|e| PlayerError::AudioError(format!("创建音频流失败: {}", e)))?;

        stream
            .play()
            .map_err(|e| PlayerError::AudioError(format!("启动音频流失败: {}", e)))?;

        self.stream = Some(stream);
        info!("音频输出已启动");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
            info!("音频输出已停止");
        }
    }
}

impl Drop for CpalAudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
