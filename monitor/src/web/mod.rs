pub mod bridge;
pub mod model;
pub mod stream;

pub use bridge::WebBridge;
