pub mod feeding_log;
pub mod user;

pub use feeding_log::*;
pub use user::*;
