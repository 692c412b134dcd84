use crate::core::{Result, VideoFrame};
use crate::player::source::Renderer;
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct SlotInner {
    frame: Option<VideoFrame>,
    presented: u64,
}

/// 最新帧槽位 - 分发线程写入，窗口线程取走
///
/// 只保留最新的一帧：窗口来不及取的帧直接被覆盖。
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<SlotInner>>,
    close_requested: Arc<AtomicBool>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, frame: VideoFrame) {
        let mut inner = self.inner.lock();
        inner.frame = Some(frame);
        inner.presented += 1;
    }

    /// 取走尚未显示的最新帧
    pub fn take(&self) -> Option<VideoFrame> {
        self.inner.lock().frame.take()
    }

    /// 累计写入的帧数
    pub fn presented(&self) -> u64 {
        self.inner.lock().presented
    }

    /// 窗口关闭时调用
    pub fn request_close(&self) {
        if !self.close_requested.swap(true, Ordering::SeqCst) {
            debug!("窗口请求关闭");
        }
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }
}

/// 把呈现的帧放进 `FrameSlot` 的渲染器；窗口关闭即报告停止请求
pub struct SlotRenderer {
    slot: FrameSlot,
}

impl SlotRenderer {
    pub fn new(slot: FrameSlot) -> Self {
        Self { slot }
    }
}

impl Renderer for SlotRenderer {
    fn present(&mut self, frame: &VideoFrame) -> Result<()> {
        self.slot.store(frame.clone());
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        self.slot.close_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PixelFormat;

    fn frame(pts: i64) -> VideoFrame {
        VideoFrame {
            pts,
            width: 1,
            height: 1,
            format: PixelFormat::RGBA,
            data: vec![0, 0, 0, 255],
        }
    }

    #[test]
    fn test_slot_keeps_latest_frame() {
        let slot = FrameSlot::new();
        let mut renderer = SlotRenderer::new(slot.clone());

        renderer.present(&frame(0)).unwrap();
        renderer.present(&frame(40)).unwrap();
        assert_eq!(slot.presented(), 2);

        assert_eq!(slot.take().map(|f| f.pts), Some(40));
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_close_reported_as_quit() {
        let slot = FrameSlot::new();
        let mut renderer = SlotRenderer::new(slot.clone());
        assert!(!renderer.quit_requested());

        slot.request_close();
        slot.request_close();
        assert!(renderer.quit_requested());
    }
}
