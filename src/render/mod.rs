pub mod canvas;
pub mod phosphor;
pub mod surface;
pub mod text;
