//! Shared application state.

use std::sync::Arc;

use crate::usecase::{
    DeleteMessageUseCase, DisconnectSessionUseCase, GetPresenceUseCase, RegisterSessionUseCase,
    RelayMessageUseCase, RelayReadUseCase,
};

pub struct AppState {
    pub register_session_usecase: Arc<RegisterSessionUseCase>,
    pub disconnect_session_usecase: Arc<DisconnectSessionUseCase>,
    pub relay_message_usecase: Arc<RelayMessageUseCase>,
    pub relay_read_usecase: Arc<RelayReadUseCase>,
    pub delete_message_usecase: Arc<DeleteMessageUseCase>,
    pub get_presence_usecase: Arc<GetPresenceUseCase>,
}
