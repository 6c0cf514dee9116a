use tracing::{debug, error, info, warn};

/// Logs a dialog state change with consistent format
pub fn log_dialog_transition(user: &str, user_id: i64, chat_id: i64, from: &str, to: &str) {
    info!(
        "DIALOG: {}({}) in chat {} moved {} -> {}",
        user, user_id, chat_id, from, to
    );
}

/// Logs dialog input that the current state does not accept
pub fn log_invalid_input(user: &str, user_id: i64, chat_id: i64, state: &str, input: &str) {
    warn!(
        "INVALID_INPUT: {}({}) in chat {} sent '{}' while {}",
        user, user_id, chat_id, input, state
    );
}

/// Logs a rejected caller
pub fn log_unauthorized(user: &str, user_id: i64, chat_id: i64) {
    warn!("UNAUTHORIZED: {}({}) in chat {}", user, user_id, chat_id);
}

/// Logs database operations with consistent format
pub fn log_database_operation(operation: &str, table: &str, details: Option<&str>) {
    match details {
        Some(d) => debug!("DB_OP: {} on {} - {}", operation, table, d),
        None => debug!("DB_OP: {} on {}", operation, table),
    }
}

/// Logs database errors with consistent format
pub fn log_database_error(operation: &str, table: &str, error: &str, details: Option<&str>) {
    match details {
        Some(d) => error!("DB_ERROR: {} on {} failed: {} - {}", operation, table, error, d),
        None => error!("DB_ERROR: {} on {} failed: {}", operation, table, error),
    }
}

/// Logs a failed send/edit/delete towards the messenger
pub fn log_delivery_error(operation: &str, chat_id: i64, error: &str) {
    warn!("DELIVERY_ERROR: {} to chat {} failed: {}", operation, chat_id, error);
}

/// Logs system events with consistent format
pub fn log_system_event(event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("SYSTEM: {} - {}", event, d),
        None => info!("SYSTEM: {}", event),
    }
}
