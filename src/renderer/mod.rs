// 渲染器

pub mod frame_slot;
#[cfg(feature = "gui")]
pub mod window;

pub use frame_slot::{FrameSlot, SlotRenderer};
#[cfg(feature = "gui")]
pub use window::{run_window, PlayerWindow};
