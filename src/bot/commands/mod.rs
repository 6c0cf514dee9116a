use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Feeding tracker commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Open the feeding menu")]
    Start,
    #[command(description = "End the conversation")]
    Done,
}
