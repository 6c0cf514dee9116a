//! # Feeding Tracker Bot
//!
//! A Telegram bot for logging infant feedings and nagging when the baby is
//! overdue for the next one.
//!
//! ## Features
//! - Guided dialog: pick when the feeding happened, then the feeding type
//! - Last feeding summary and a trailing 24 hour report
//! - Periodic reminders once a configurable threshold is exceeded
//! - Username whitelist
//! - Persistent storage with SQLite

/// Dialog, command handlers and message formatting
pub mod bot;
/// Configuration management and environment variables
pub mod config;
/// Database models, connections, and migrations
pub mod database;
/// Background services: reminders, health endpoint, timezone conversion
pub mod services;
/// Utility functions for datetime, validation, and logging
pub mod utils;
