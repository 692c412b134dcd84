use crate::core::{OverflowPolicy, Packet, QueueLimit, Result};
use crate::player::quit::QuitFlag;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// `get` 的结果
#[derive(Debug, PartialEq, Eq)]
pub enum Pop {
    /// 取到队首数据包
    Packet(Packet),
    /// 队列为空（非阻塞模式）
    Empty,
    /// 退出标志已置位
    Stopped,
}

/// `put` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Put {
    Queued,
    /// 入队前按 DropOldest 策略丢弃了若干旧包
    Evicted(usize),
    /// 等待空间时退出标志被置位，数据包未入队
    Stopped,
}

struct QueueInner {
    packets: VecDeque<Packet>,
    total_bytes: usize,
}

/// 数据包队列 - 解复用线程与音频回调之间唯一共享的可变状态
///
/// - FIFO，从不重排
/// - `count == 0 ⇔ total_bytes == 0`
/// - 阻塞的 `get` 只会被新数据包或退出标志唤醒
pub struct PacketQueue {
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
    quit: QuitFlag,
    limit: Option<QueueLimit>,
}

impl PacketQueue {
    /// 无上限队列
    pub fn new(quit: QuitFlag) -> Self {
        Self::with_limit(quit, None)
    }

    pub fn with_limit(quit: QuitFlag, limit: Option<QueueLimit>) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                packets: VecDeque::new(),
                total_bytes: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            quit,
            limit,
        }
    }

    /// 追加到队尾
    ///
    /// 只有在为新节点分配内存失败时才返回错误；调用方应把它当作丢包处理。
    pub fn put(&self, packet: Packet) -> Result<Put> {
        let size = packet.size();
        let mut inner = self.inner.lock();
        let mut outcome = Put::Queued;

        if let Some(limit) = self.limit {
            match limit.policy {
                OverflowPolicy::Block => {
                    while !inner.packets.is_empty() && inner.total_bytes + size > limit.max_bytes {
                        if self.quit.is_raised() {
                            return Ok(Put::Stopped);
                        }
                        self.not_full.wait(&mut inner);
                    }
                }
                OverflowPolicy::DropOldest => {
                    let mut evicted = 0;
                    while inner.total_bytes + size > limit.max_bytes {
                        match inner.packets.pop_front() {
                            Some(old) => {
                                inner.total_bytes -= old.size();
                                evicted += 1;
                            }
                            None => break,
                        }
                    }
                    if evicted > 0 {
                        debug!("队列已满，丢弃 {} 个旧数据包", evicted);
                        outcome = Put::Evicted(evicted);
                    }
                }
            }
        }

        inner.packets.try_reserve(1)?;
        inner.packets.push_back(packet);
        inner.total_bytes += size;
        self.not_empty.notify_one();

        Ok(outcome)
    }

    /// 取出队首数据包
    ///
    /// 退出标志优先：置位后即使队列非空也返回 `Pop::Stopped`。
    /// 标志在睡眠前和每次醒来后都会检查。
    pub fn get(&self, block: bool) -> Pop {
        let mut inner = self.inner.lock();
        loop {
            if self.quit.is_raised() {
                return Pop::Stopped;
            }

            if let Some(packet) = inner.packets.pop_front() {
                inner.total_bytes -= packet.size();
                if self.limit.is_some() {
                    self.not_full.notify_one();
                }
                return Pop::Packet(packet);
            }

            if !block {
                return Pop::Empty;
            }

            self.not_empty.wait(&mut inner);
        }
    }

    /// 唤醒所有阻塞在队列上的线程（置位退出标志后调用）
    ///
    /// 持锁通知，保证不会与正在检查标志、准备睡眠的线程错过。
    pub fn wake_all(&self) {
        let _inner = self.inner.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// 清空队列，返回丢弃的数据包数
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.packets.len();
        inner.packets.clear();
        inner.total_bytes = 0;
        self.not_full.notify_all();
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().packets.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// (count, total_bytes) 的一致快照
    pub fn stats(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.packets.len(), inner.total_bytes)
    }

    pub fn quit_flag(&self) -> &QuitFlag {
        &self.quit
    }
}
