pub mod assembler;
pub mod attribute;
pub mod constants;
pub mod crc;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod packet;
pub mod request;
pub mod session;
pub mod sink;
pub mod transport;


pub use assembler::FrameAssembler;
pub use dispatcher::Dispatcher;
pub use error::NeoError;
pub use request::RequestBuilder;
pub use session::{Session, SessionConfig, SessionEnd, SessionHandle};
pub use sink::DeviceState;
