use anyhow::{anyhow, Result};

/// Splits a comma-separated list of Telegram usernames.
///
/// Entries are trimmed, a leading `@` is dropped and empty entries are
/// skipped, so `"alice, @bob,,"` yields `["alice", "bob"]`.
pub fn parse_whitelist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('@').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn validate_username(username: &str) -> Result<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(anyhow!("Username cannot be empty"));
    }

    // Telegram usernames are 5-32 characters, but test fixtures and legacy rows
    // use shorter names, so only the upper bound is enforced.
    if username.len() > 32 {
        return Err(anyhow!("Username '{}' is longer than 32 characters", username));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(anyhow!("Username '{}' contains invalid characters", username));
    }

    Ok(())
}

pub fn parse_time_offsets(raw: &str) -> Result<Vec<u32>> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(anyhow!("Time offsets cannot be empty"));
    }

    let mut offsets = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let minutes: u32 = part
            .parse()
            .map_err(|_| anyhow!("Invalid time offset '{}': expected whole minutes", part))?;

        if minutes > 24 * 60 {
            return Err(anyhow!("Time offset '{}' is more than a day", part));
        }

        if offsets.contains(&minutes) {
            return Err(anyhow!("Duplicate time offset '{}'", part));
        }
        offsets.push(minutes);
    }

    if offsets.is_empty() {
        return Err(anyhow!("Must provide at least one time offset"));
    }

    if offsets.len() > 12 {
        return Err(anyhow!("Cannot have more than 12 time offsets"));
    }

    offsets.sort_unstable();
    Ok(offsets)
}

pub fn parse_seconds(name: &str, raw: &str) -> Result<u64> {
    let seconds: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid {}", name))?;

    if seconds == 0 {
        return Err(anyhow!("{} must be greater than zero", name));
    }

    Ok(seconds)
}
