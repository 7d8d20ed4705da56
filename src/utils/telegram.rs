use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Telegram clears a chat action after about five seconds.
const CHAT_ACTION_REFRESH: Duration = Duration::from_secs(4);

/// Keeps "typing..." (or "sending photo...") visible while a generation stage
/// runs. The indicator stops when the value is dropped.
pub struct ChatActionHeartbeat {
    action: ChatAction,
    task: Option<JoinHandle<()>>,
}

impl ChatActionHeartbeat {
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Stopped {:?} heartbeat", self.action);
        }
    }
}

impl Drop for ChatActionHeartbeat {
    fn drop(&mut self) {
        self.abort();
    }
}

pub fn start_chat_action_heartbeat(
    bot: Bot,
    chat_id: ChatId,
    action: ChatAction,
) -> ChatActionHeartbeat {
    let task_action = action.clone();
    let task = tokio::spawn(async move {
        let mut warned = false;
        loop {
            match bot.send_chat_action(chat_id, task_action.clone()).await {
                Ok(_) => warned = false,
                // One warning per outage; the loop keeps retrying quietly.
                Err(err) if !warned => {
                    warn!("send_chat_action({:?}) failed in chat {}: {err}", task_action, chat_id);
                    warned = true;
                }
                Err(_) => {}
            }
            tokio::time::sleep(CHAT_ACTION_REFRESH).await;
        }
    });

    ChatActionHeartbeat {
        action,
        task: Some(task),
    }
}
