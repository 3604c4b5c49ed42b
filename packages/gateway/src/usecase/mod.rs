//! Use case layer.

mod delete_message;
mod disconnect_session;
mod error;
mod get_presence;
mod register_session;
mod relay_message;
mod relay_read;

pub use delete_message::DeleteMessageUseCase;
pub use disconnect_session::DisconnectSessionUseCase;
pub use error::{DeleteError, RegisterError, RelayError};
pub use get_presence::GetPresenceUseCase;
pub use register_session::RegisterSessionUseCase;
pub use relay_message::RelayMessageUseCase;
pub use relay_read::RelayReadUseCase;
