pub mod display_loop;
pub mod frame_renderer;
