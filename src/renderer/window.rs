use crate::player::session::{SessionEvent, SessionHandle};
use crate::renderer::frame_slot::FrameSlot;
use crossbeam_channel::Receiver;
use egui::{Color32, ColorImage, Context, TextureHandle, TextureOptions};
use log::{debug, info};
use std::time::Duration;

/// 播放窗口 - 显示 `FrameSlot` 里的最新帧，关闭窗口即停止会话
pub struct PlayerWindow {
    slot: FrameSlot,
    handle: SessionHandle,
    events: Receiver<SessionEvent>,
    texture: Option<TextureHandle>,
    frame_size: [usize; 2],
}

impl PlayerWindow {
    pub fn new(slot: FrameSlot, handle: SessionHandle, events: Receiver<SessionEvent>) -> Self {
        Self {
            slot,
            handle,
            events,
            texture: None,
            frame_size: [0, 0],
        }
    }

    fn upload_latest_frame(&mut self, ctx: &Context) {
        let Some(frame) = self.slot.take() else {
            return;
        };
        let size = [frame.width as usize, frame.height as usize];
        let image = ColorImage::from_rgba_unmultiplied(size, &frame.data);

        match self.texture.as_mut() {
            // 尺寸不变时只更新纹理数据
            Some(texture) if self.frame_size == size => texture.set(image, TextureOptions::LINEAR),
            _ => {
                info!("🆕 创建视频纹理: {}x{}", size[0], size[1]);
                self.texture = Some(ctx.load_texture("video_frame", image, TextureOptions::LINEAR));
                self.frame_size = size;
            }
        }
    }

    fn poll_session(&mut self, ctx: &Context) {
        while let Ok(event) = self.events.try_recv() {
            debug!("会话事件: {:?}", event);
            if let SessionEvent::Stopped(reason) = event {
                info!("🛑 会话结束（{:?}），关闭窗口", reason);
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }
}

impl eframe::App for PlayerWindow {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.slot.request_close();
            self.handle.request_stop();
        }

        self.poll_session(ctx);
        self.upload_latest_frame(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::BLACK))
            .show(ctx, |ui| {
                if let Some(texture) = &self.texture {
                    // 保持宽高比居中显示
                    let available = ui.available_size();
                    let [w, h] = self.frame_size;
                    let scale = (available.x / w as f32).min(available.y / h as f32);
                    let size = egui::vec2(w as f32 * scale, h as f32 * scale);
                    ui.centered_and_justified(|ui| {
                        ui.image((texture.id(), size));
                    });
                }
            });

        ctx.request_repaint_after(Duration::from_millis(16));
    }
}

/// 在当前（主）线程上运行窗口，直到窗口关闭
pub fn run_window(title: &str, width: u32, height: u32, window: PlayerWindow) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width as f32, height as f32])
            .with_title(title),
        ..Default::default()
    };

    eframe::run_native(title, options, Box::new(|_cc| Box::new(window)))
        .map_err(|e| anyhow::anyhow!("窗口启动失败: {}", e))
}
