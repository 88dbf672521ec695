pub mod beam;
pub mod frame;
pub mod grid;
pub mod mapper;
pub mod params;
pub mod pitch;
pub mod source;
pub mod visualizer;
