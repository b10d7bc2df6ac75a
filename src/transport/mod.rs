pub mod tcp;
pub mod traits;

pub use tcp::TcpDialer;
pub use traits::Dialer;
