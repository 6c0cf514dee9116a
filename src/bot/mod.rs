pub mod commands;
pub mod dialog;
pub mod handlers;
pub mod presentation;
pub mod transport;
