//! Bounded collection of a single qualifying DM reply.
//!
//! Mailbox provisioning sometimes needs the user to supply a usable
//! mailbox name. The collector watches the DM channel for a limited
//! window and resolves on the first reply the caller's predicate
//! accepts. The window elapsing is an ordinary outcome, not an error.

use super::{DiscordClient, DiscordError};
use log::debug;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How a collection window ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectOutcome {
    /// A qualifying reply arrived; carries the predicate's accepted value.
    Resolved(String),
    /// The window elapsed without a qualifying reply.
    TimedOut,
}

/// Internal collector state. The window is a small state machine:
/// `AwaitingReply` until either a reply qualifies or the deadline passes.
#[derive(Debug)]
enum State {
    AwaitingReply,
    Resolved(String),
    TimedOut,
}

pub struct ReplyCollector<'a> {
    discord: &'a DiscordClient,
    channel_id: String,
    author_id: String,
    /// Only messages after this id are considered (the prompt we sent)
    after: String,
    window: Duration,
    poll_interval: Duration,
}

impl<'a> ReplyCollector<'a> {
    pub fn new(
        discord: &'a DiscordClient,
        channel_id: impl Into<String>,
        author_id: impl Into<String>,
        after: impl Into<String>,
        window: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            discord,
            channel_id: channel_id.into(),
            author_id: author_id.into(),
            after: after.into(),
            window,
            poll_interval,
        }
    }

    /// Run the window. `accept` returns the value to resolve with when a
    /// reply qualifies; a rejected reply gets a retry prompt and the
    /// window keeps running. Upstream failures abort the window.
    pub async fn run<F>(mut self, accept: F) -> Result<CollectOutcome, DiscordError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let deadline = Instant::now() + self.window;
        let mut state = State::AwaitingReply;

        loop {
            match state {
                State::Resolved(value) => return Ok(CollectOutcome::Resolved(value)),
                State::TimedOut => return Ok(CollectOutcome::TimedOut),
                State::AwaitingReply => {}
            }

            let now = Instant::now();
            if now >= deadline {
                state = State::TimedOut;
                continue;
            }
            sleep(self.poll_interval.min(deadline - now)).await;

            let messages = self
                .discord
                .messages_after(&self.channel_id, &self.after)
                .await?;
            for message in messages {
                self.after = message.id.clone();
                if message.author.id != self.author_id {
                    continue;
                }
                match accept(&message.content) {
                    Some(value) => {
                        debug!("Reply collector resolved on message {}", message.id);
                        state = State::Resolved(value);
                        break;
                    }
                    None => {
                        self.discord
                            .send_message(&self.channel_id, "Invalid username")
                            .await?;
                    }
                }
            }
        }
    }
}
