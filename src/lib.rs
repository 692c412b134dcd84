//! 最小播放引擎
//!
//! 解复用线程读包：音频包入队，由音频设备回调拉取解码；视频包在同一线程上
//! 同步解码并呈现。两者之间只共享数据包队列和退出标志。

pub mod cli;
pub mod core;
pub mod logging;
pub mod player;
pub mod renderer;
