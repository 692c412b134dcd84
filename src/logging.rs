//! 日志初始化

use env_logger::Builder;
use log::LevelFilter;

/// 默认 Info 级别，wgpu 只保留错误；`filters` 为 RUST_LOG 语法，优先级最高
pub fn builder(filters: Option<&str>) -> Builder {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        // 过滤掉 wgpu_hal 和 wgpu_core 的警告日志，减少日志噪音
        .filter_module("wgpu_hal", LevelFilter::Error)
        .filter_module("wgpu_core", LevelFilter::Error);
    if let Some(filters) = filters {
        builder.parse_filters(filters);
    }
    builder
}
