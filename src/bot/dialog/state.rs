use chrono::DateTime;
use chrono_tz::Tz;
use std::fmt;

use crate::database::models::FeedingType;

/// Where a conversation currently is.
///
/// The resolved feeding time only exists while choosing the feeding type, so
/// leaving that state (by logging, `BACK` or "Done") always drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogState {
    ChoosingAction,
    ChooseTimeOption,
    ChooseFeedingType {
        minutes_ago: u32,
        feeding_at: DateTime<Tz>,
    },
}

impl DialogState {
    pub fn name(&self) -> &'static str {
        match self {
            DialogState::ChoosingAction => "CHOOSING_ACTION",
            DialogState::ChooseTimeOption => "CHOOSE_TIME_OPTION",
            DialogState::ChooseFeedingType { .. } => "CHOOSE_FEEDING_TYPE",
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    LogFeeding,
    LastFeeding,
    DailyStats,
}

/// A button the user can press. Encoded into Telegram callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Menu(MenuAction),
    TimeOffset(u32),
    FeedingType(FeedingType),
    Cancel,
    Back,
}

impl Choice {
    pub fn to_callback_data(self) -> String {
        match self {
            Choice::Menu(MenuAction::LogFeeding) => "action:log".to_string(),
            Choice::Menu(MenuAction::LastFeeding) => "action:last".to_string(),
            Choice::Menu(MenuAction::DailyStats) => "action:stats".to_string(),
            Choice::TimeOffset(minutes) => format!("time:{minutes}"),
            Choice::FeedingType(FeedingType::Bottle) => "type:bottle".to_string(),
            Choice::FeedingType(FeedingType::LeftBreast) => "type:left".to_string(),
            Choice::FeedingType(FeedingType::RightBreast) => "type:right".to_string(),
            Choice::Cancel => "nav:cancel".to_string(),
            Choice::Back => "nav:back".to_string(),
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        let (kind, value) = data.split_once(':')?;
        match (kind, value) {
            ("action", "log") => Some(Choice::Menu(MenuAction::LogFeeding)),
            ("action", "last") => Some(Choice::Menu(MenuAction::LastFeeding)),
            ("action", "stats") => Some(Choice::Menu(MenuAction::DailyStats)),
            ("time", minutes) => minutes.parse().ok().map(Choice::TimeOffset),
            ("type", "bottle") => Some(Choice::FeedingType(FeedingType::Bottle)),
            ("type", "left") => Some(Choice::FeedingType(FeedingType::LeftBreast)),
            ("type", "right") => Some(Choice::FeedingType(FeedingType::RightBreast)),
            ("nav", "cancel") => Some(Choice::Cancel),
            ("nav", "back") => Some(Choice::Back),
            _ => None,
        }
    }
}

/// Everything the dialog reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogInput {
    /// `/start`
    Start,
    Choice(Choice),
    /// Free text or a button payload we could not decode.
    Unrecognized(String),
    /// The global "Done" fallback.
    Done,
}

impl DialogInput {
    pub fn from_callback_data(data: &str) -> Self {
        match Choice::from_callback_data(data) {
            Some(choice) => DialogInput::Choice(choice),
            None => DialogInput::Unrecognized(data.to_string()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DialogInput::Start => "/start".to_string(),
            DialogInput::Choice(choice) => choice.to_callback_data(),
            DialogInput::Unrecognized(raw) => raw.clone(),
            DialogInput::Done => "Done".to_string(),
        }
    }
}

/// Matches the "Done" fallback phrase.
pub fn is_done_phrase(text: &str) -> bool {
    text.trim() == "Done"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_data_is_stable() {
        let choices = [
            Choice::Menu(MenuAction::LogFeeding),
            Choice::Menu(MenuAction::LastFeeding),
            Choice::Menu(MenuAction::DailyStats),
            Choice::TimeOffset(0),
            Choice::TimeOffset(45),
            Choice::FeedingType(FeedingType::Bottle),
            Choice::FeedingType(FeedingType::LeftBreast),
            Choice::FeedingType(FeedingType::RightBreast),
            Choice::Cancel,
            Choice::Back,
        ];
        for choice in choices {
            assert_eq!(Choice::from_callback_data(&choice.to_callback_data()), Some(choice));
        }
    }

    #[test]
    fn test_unknown_callback_data() {
        assert_eq!(Choice::from_callback_data("time:soon"), None);
        assert_eq!(Choice::from_callback_data("log_feeding"), None);
        assert_eq!(
            DialogInput::from_callback_data("7"),
            DialogInput::Unrecognized("7".to_string())
        );
    }

    #[test]
    fn test_done_phrase() {
        assert!(is_done_phrase("Done"));
        assert!(is_done_phrase(" Done\n"));
        assert!(!is_done_phrase("done later"));
    }
}
