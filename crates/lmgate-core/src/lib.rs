pub mod access;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod providers;
pub mod state;
pub mod upstream;

pub use dispatch::{Dispatcher, Reply};
pub use error::{ErrorKind, GatewayError};
pub use state::Gateway;
