//! 命令定义和实现

pub mod monitor;
pub mod ports;
pub mod schema;
pub mod send_buffer;
pub mod stop;
pub mod stream;
pub mod zero;

pub use monitor::MonitorCommand;
pub use ports::PortsCommand;
pub use schema::SchemaCommand;
pub use send_buffer::SendBufferCommand;
pub use stop::StopCommand;
pub use stream::StreamCommand;
pub use zero::ZeroCommand;
