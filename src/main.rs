use anyhow::{anyhow, Result};
use clap::Parser;
use ffmpeg_next as ffmpeg;
use log::{info, warn};
use mini_player::cli::{Cli, Command};
use mini_player::logging;
use mini_player::core::{AudioStreamInfo, PixelFormat, PlayerConfig, VideoStreamInfo};
use mini_player::player::{
    inspect, rational, AudioOutput, AudioPipeline, CpalAudioOutput, FfmpegAudioDecoder, FfmpegDemuxer, FfmpegVideoDecoder,
    PcmFileSource, QuitFlag, Session, SessionEvent, SwrResampler, SwsScaler, VideoRenderLoop,
};
use mini_player::renderer::{run_window, FrameSlot, PlayerWindow, SlotRenderer};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    // 初始化日志，RUST_LOG 覆盖默认级别
    logging::builder(std::env::var("RUST_LOG").ok().as_deref()).init();

    let cli = Cli::parse();
    let command = cli.mode()?;
    let config = match &cli.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };

    ffmpeg::init().map_err(|e| anyhow!("FFmpeg 初始化失败: {}", e))?;
    info!("✅ FFmpeg 初始化成功");

    match command {
        Command::Info(url) => {
            let media_info = inspect(&url)?;
            println!("{}", serde_json::to_string_pretty(&media_info)?);
            Ok(())
        }
        Command::Pcm { path, rate, channels } => play_pcm(&path, rate, channels, &config),
        Command::Play(url) => play(&url, &config),
    }
}

fn play(url: &str, config: &PlayerConfig) -> Result<()> {
    let demuxer = FfmpegDemuxer::open(url)?;

    // 解码器打开失败属于会话级错误，播放不会开始
    let video = demuxer
        .video_stream()
        .map(|stream| -> Result<_> {
            let decoder = FfmpegVideoDecoder::from_stream(&stream)?;
            let info = VideoStreamInfo {
                index: stream.index(),
                time_base: rational(stream.time_base()),
                width: decoder.width(),
                height: decoder.height(),
                display_width: config.display.width,
                display_height: config.display.height,
                display_format: PixelFormat::RGBA,
            };
            Ok((decoder, info))
        })
        .transpose()?;

    let audio = demuxer
        .audio_stream()
        .map(|stream| -> Result<_> {
            let decoder = FfmpegAudioDecoder::from_stream(&stream)?;
            Ok((decoder, stream.index(), rational(stream.time_base())))
        })
        .transpose()?;

    let mut session: Session<ffmpeg::frame::Video> = Session::new(Box::new(demuxer), config);

    if let Some((decoder, index, time_base)) = audio {
        let source = decoder.spec();
        let device = CpalAudioOutput::new(source.sample_rate, source.channels, config.audio.device_buffer_frames)?;
        let info = AudioStreamInfo {
            index,
            time_base,
            source,
            output: device.actual_spec(),
        };
        let pipeline = AudioPipeline::new(
            session.queue(),
            Box::new(decoder),
            Box::new(SwrResampler::new(info.output)),
            &info,
            config.audio.residual_capacity,
        )
        .with_clock(session.clock());
        session.attach_audio(pipeline, Box::new(device));
    }

    let slot = FrameSlot::new();
    let has_video = video.is_some();
    if let Some((decoder, info)) = video {
        let scaler = SwsScaler::new(info.time_base, info.display_width, info.display_height);
        let render_loop = VideoRenderLoop::new(
            Box::new(decoder),
            Box::new(scaler),
            Box::new(SlotRenderer::new(slot.clone())),
            &info,
        )
        .with_present_delay(config.video.present_delay_ms)
        .with_clock(session.clock());
        session.attach_video(render_loop);
    }

    let events = session.subscribe();
    let handle = session.handle();

    let dispatch = thread::Builder::new()
        .name("dispatch".to_string())
        .spawn(move || {
            let result = session.run();
            session.shutdown();
            result
        })?;

    if has_video {
        let window = PlayerWindow::new(slot, handle.clone(), events);
        if let Err(e) = run_window(url, config.display.width, config.display.height, window) {
            warn!("{}", e);
        }
        handle.request_stop();
    } else {
        // 纯音频：等会话自己结束
        for event in events.iter() {
            if let SessionEvent::Stopped(_) = event {
                break;
            }
        }
    }

    let reason = dispatch.join().map_err(|_| anyhow!("分发线程异常退出"))??;
    info!("👋 播放结束: {:?}", reason);
    Ok(())
}

fn play_pcm(path: &Path, rate: u32, channels: u16, config: &PlayerConfig) -> Result<()> {
    let quit = QuitFlag::new();
    let source = PcmFileSource::open(path, rate, channels, quit.clone())?;
    let finished = source.finished();

    let mut device = CpalAudioOutput::new(rate, channels, config.audio.device_buffer_frames)?;
    if device.actual_spec() != source.spec() {
        warn!(
            "⚠️ 设备不支持 {} Hz / {} 声道，按 {:?} 播放（不做重采样）",
            rate,
            channels,
            device.actual_spec()
        );
    }

    device.start(Box::new(source))?;
    while !finished.load(Ordering::SeqCst) && !quit.is_raised() {
        thread::sleep(Duration::from_millis(20));
    }
    device.stop();
    Ok(())
}
