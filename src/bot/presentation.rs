//! Message texts, keyboards and human-readable time formatting.
//!
//! Everything here is pure; the dialog and the reminder job decide when to
//! send what.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

use crate::bot::dialog::state::{Choice, MenuAction};
use crate::database::models::{FeedingRecord, FeedingType};

pub const GREETING: &str =
    "Привет! Давайте запишем новое кормление или проверим последнее кормление. Выберите опцию ниже:";
pub const ADD_MORE: &str = "Добавить еще?";
pub const TIME_PROMPT: &str = "Когда произошло кормление?";
pub const TYPE_PROMPT: &str = "Выберите тип кормления:";
pub const INVALID_ACTION: &str =
    "Неверный выбор. Пожалуйста, выберите 'Записать кормление', 'Проверить последнее кормление' или 'Статистика за 24 часа'.";
pub const INVALID_TIME: &str = "Неверный выбор. Пожалуйста, выберите время из списка.";
pub const INVALID_TYPE: &str = "Неверный выбор. Пожалуйста, выберите тип кормления из списка.";
pub const UNAUTHORIZED: &str = "Nothing of interest here";
pub const FAREWELL: &str = "До свидания! Хорошего дня!";
pub const NO_RECORDS: &str = "Нет записей о кормлении.";
pub const NO_RECORDS_24H: &str = "За последние 24 часа кормлений не было.";
pub const STORAGE_FAILURE: &str = "Не удалось сохранить данные. Попробуйте еще раз.";
pub const HELP: &str = "Я записываю кормления и напоминаю, если прошло слишком много времени.\n\n\
/start - открыть меню\n/done - завершить разговор";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    fn new(label: impl Into<String>, choice: Choice) -> Self {
        Self {
            label: label.into(),
            data: choice.to_callback_data(),
        }
    }
}

/// Inline keyboard, one row per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    fn column(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

pub fn main_menu() -> Keyboard {
    Keyboard::column([
        Button::new("Записать кормление", Choice::Menu(MenuAction::LogFeeding)),
        Button::new("Проверить последнее кормление", Choice::Menu(MenuAction::LastFeeding)),
        Button::new("Статистика за 24 часа", Choice::Menu(MenuAction::DailyStats)),
    ])
}

pub fn time_options(offsets: &[u32]) -> Keyboard {
    let mut keyboard = Keyboard::column(
        offsets
            .iter()
            .map(|&minutes| Button::new(time_offset_label(minutes), Choice::TimeOffset(minutes))),
    );
    keyboard.rows.push(vec![Button::new("Отмена", Choice::Cancel)]);
    keyboard
}

pub fn feeding_types() -> Keyboard {
    let mut keyboard = Keyboard::column(
        FeedingType::ALL
            .iter()
            .map(|&t| Button::new(feeding_type_label(t), Choice::FeedingType(t))),
    );
    keyboard.rows.push(vec![Button::new("Назад", Choice::Back)]);
    keyboard
}

pub fn time_offset_label(minutes: u32) -> String {
    match minutes {
        0 => "Сейчас".to_string(),
        60 => "1 час назад".to_string(),
        m if m < 60 => format!("{m} минут назад"),
        m if m % 60 == 0 => format!("{} ч назад", m / 60),
        m => format!("{} ч {} мин назад", m / 60, m % 60),
    }
}

pub fn feeding_type_label(feeding_type: FeedingType) -> &'static str {
    match feeding_type {
        FeedingType::Bottle => "Бутылочка",
        FeedingType::LeftBreast => "Левая грудь",
        FeedingType::RightBreast => "Правая грудь",
    }
}

pub fn format_clock_time(dt: &DateTime<Tz>) -> String {
    dt.format("%H:%M").to_string()
}

/// `"H часов M минут"`. Negative durations (clock skew) render as zero.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_minutes = elapsed.num_minutes().max(0);
    format!("{} часов {} минут", total_minutes / 60, total_minutes % 60)
}

pub fn feeding_logged(at_user_time: &DateTime<Tz>, feeding_type: FeedingType) -> String {
    format!(
        "Кормление записано на {} ({})!",
        format_clock_time(at_user_time),
        feeding_type_label(feeding_type)
    )
}

pub fn last_feeding_summary(at_user_time: &DateTime<Tz>, feeding_type: FeedingType, elapsed: Duration) -> String {
    format!(
        "Последнее кормление было в {} ({}). Прошло времени: {}.",
        format_clock_time(at_user_time),
        feeding_type_label(feeding_type),
        format_elapsed(elapsed)
    )
}

pub fn reminder(elapsed: Duration, last_at_user_time: &DateTime<Tz>) -> String {
    format!(
        "Прошло {} минут с последнего кормления в {}. Пожалуйста, проверьте.",
        elapsed.num_minutes().max(0),
        format_clock_time(last_at_user_time)
    )
}

/// Report for the trailing 24 hours. `records` must be oldest first.
pub fn daily_stats(records: &[FeedingRecord], user_tz: Tz) -> String {
    if records.is_empty() {
        return NO_RECORDS_24H.to_string();
    }

    let mut text = format!(
        "Статистика за последние 24 часа:\nВсего кормлений: {}\n",
        records.len()
    );

    for feeding_type in FeedingType::ALL {
        let count = records.iter().filter(|r| r.feeding_type == feeding_type).count();
        text.push_str(&format!("• {}: {}\n", feeding_type_label(feeding_type), count));
    }

    text.push_str("\nВремя кормлений:\n");
    for record in records {
        text.push_str(&format!(
            "{} ({})\n",
            format_clock_time(&record.timestamp.with_timezone(&user_tz)),
            feeding_type_label(record.feeding_type)
        ));
    }

    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        if records.len() > 1 {
            let span = last.timestamp.signed_duration_since(first.timestamp);
            let gaps = i32::try_from(records.len() - 1).unwrap_or(i32::MAX);
            text.push_str(&format!("\nСредний интервал: {}", format_elapsed(span / gaps)));
        }
    }

    text.trim_end().to_string()
}
