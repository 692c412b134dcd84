use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 退出标志 - 会话内所有阻塞等待都要观察它
///
/// 只会从 false 变为 true 一次。置位后还需要唤醒队列上的等待者，
/// 见 `PacketQueue::wake_all`。
#[derive(Clone, Debug, Default)]
pub struct QuitFlag {
    flag: Arc<AtomicBool>,
}

impl QuitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 置位，返回本次调用是否是第一次置位
    pub fn raise(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
