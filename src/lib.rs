pub mod error;
pub mod graph;
pub mod linalg;
pub mod logger;
pub mod noise;
pub mod scatter;
pub mod slots;

pub use error::{LinearError, LinearResult};
pub use logger::{init_logger, init_logger_with_level};
pub use noise::NoiseModel;
