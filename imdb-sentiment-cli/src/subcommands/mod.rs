mod decode;
pub use decode::DecodeApp;

mod train;
pub use train::TrainApp;
