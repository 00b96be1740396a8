//! Application state shared across routes

use std::sync::Arc;

use crate::chat::CommandDispatcher;
use crate::config::Config;
use crate::game::RoundHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub round: RoundHandle,
    pub dispatcher: Arc<CommandDispatcher>,
}

impl AppState {
    pub fn new(config: Config, round: RoundHandle) -> Self {
        let dispatcher = Arc::new(CommandDispatcher::new(
            config.channel.clone(),
            config.command_cooldown,
        ));

        Self {
            config: Arc::new(config),
            round,
            dispatcher,
        }
    }
}
