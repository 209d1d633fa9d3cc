//! Discord side of the bot, on serenity
//!
//! - `adapter` - [`DiscordGateway`]: history paging, channel and member lookups over HTTP
//! - `handler` - gateway event handler routing new messages and button clicks
//! - `control` - the "start historical count" button and its ephemeral reply

pub mod adapter;
pub mod control;
pub mod handler;

pub use adapter::{to_chat_message, DiscordGateway};
pub use control::{ControlPanel, START_BUTTON_ID};
pub use handler::{gateway_intents, Handler};
