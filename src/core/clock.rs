use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// 音频时钟 - 由音频拉取管线驱动的播放位置
///
/// 音频回调每解码一个数据包就用它的 PTS 校准一次，两次校准之间按墙钟外推。
/// 视频渲染循环只读取它用于记录音画偏差，不据此调整节奏。
#[derive(Clone)]
pub struct AudioClock {
    inner: Arc<Mutex<ClockInner>>,
}

struct ClockInner {
    base_pts: i64,         // 基准 PTS（毫秒）
    base_instant: Instant, // 基准时刻
    started: bool,
}

impl AudioClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockInner {
                base_pts: 0,
                base_instant: Instant::now(),
                started: false,
            })),
        }
    }

    /// 获取当前播放时间（毫秒），尚未校准时返回 None
    pub fn now(&self) -> Option<i64> {
        let inner = self.inner.lock();
        if !inner.started {
            return None;
        }
        let elapsed = inner.base_instant.elapsed().as_millis() as i64;
        Some(inner.base_pts + elapsed)
    }

    /// 用新的 PTS 校准时钟
    pub fn set_time(&self, pts: i64) {
        let mut inner = self.inner.lock();
        inner.base_pts = pts;
        inner.base_instant = Instant::now();
        inner.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new()
    }
}
