pub mod camera;
pub mod detector;
pub mod frame_loop;
pub mod rgba_converter;

// Re-exports for convenience
pub use camera::{CameraStream, available_cameras, choose_device, start_camera_stream};
pub use detector::OrtHandDetector;
pub use frame_loop::{FrameLoop, LoopEvent, start_frame_loop};
