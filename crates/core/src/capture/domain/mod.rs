pub mod device_probe;
pub mod frame_source;
