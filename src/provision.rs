//! Account and mailbox provisioning.
//!
//! A user reaching reconciliation without a Jira key gets a mailbox and
//! a Jira account created on the spot. Mailbox creation may need the
//! user's help: when their Discord username is not a usable mailbox
//! name, they are asked over DM and given a bounded window to answer.

use crate::config::ProvisionConfig;
use crate::discord::collector::{CollectOutcome, ReplyCollector};
use crate::discord::{DiscordClient, DiscordError};
use crate::jira::{JiraClient, JiraError, JiraUser};
use crate::mailcow::{MailcowClient, MailcowError};
use crate::models::User;
use crate::store::{Store, StoreBackend, StoreError};
use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during provisioning
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The reply collection window elapsed without a usable mailbox name
    #[error("no valid mailbox name received within the collection window")]
    Timeout,
    #[error(transparent)]
    Discord(#[from] DiscordError),
    #[error(transparent)]
    Jira(#[from] JiraError),
    #[error(transparent)]
    Mailcow(#[from] MailcowError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct Provisioner {
    store: Store,
    discord: DiscordClient,
    jira: JiraClient,
    mailcow: MailcowClient,
    config: ProvisionConfig,
}

impl Provisioner {
    pub fn new(
        store: Store,
        discord: DiscordClient,
        jira: JiraClient,
        mailcow: MailcowClient,
        config: ProvisionConfig,
    ) -> Self {
        Self {
            store,
            discord,
            jira,
            mailcow,
            config,
        }
    }

    /// Make sure the user has a mailbox and a Jira account, persisting
    /// both facts on first assignment. Returns the canonical Jira record.
    pub async fn provision(&self, user: &User) -> Result<JiraUser, ProvisionError> {
        let email = self.ensure_mailbox(user).await?;

        let jira_user = match self.jira.user_by_name(&user.username).await {
            Ok(existing) => existing,
            Err(JiraError::UserNotFound) => {
                let created = self.jira.create_user(&user.username, &email).await?;
                self.store
                    .set_jira_key_if_unset(&user.discord_id, &created.key)
                    .await?;
                // Re-query for the canonical record, groups included
                self.jira.user_by_name(&user.username).await?
            }
            Err(err) => return Err(err.into()),
        };

        self.store
            .set_jira_key_if_unset(&user.discord_id, &jira_user.key)
            .await?;
        Ok(jira_user)
    }

    /// Returns the user's mailbox address, creating the mailbox when
    /// missing. Interactive: an unusable Discord username opens a DM
    /// collection window for a replacement.
    pub async fn ensure_mailbox(&self, user: &User) -> Result<String, ProvisionError> {
        if let Some(email) = &user.mailcow_email {
            return Ok(email.clone());
        }

        let candidate = normalize_local_part(&user.username);
        let local_part = if is_valid_local_part(&candidate) {
            candidate
        } else {
            self.collect_local_part(user).await?
        };

        let password = generate_password();
        let address = self.mailcow.create_mailbox(&local_part, &password).await?;
        self.store
            .set_mailcow_email_if_unset(&user.discord_id, &address)
            .await?;

        self.discord
            .send_dm(
                &user.discord_id,
                &format!(
                    "Your email account is ready:\nEmail: `{address}`\nPassword: `{password}`\n\
                     Please change your password immediately. If you need help or want to set \
                     up forwarding, check the internal wiki."
                ),
            )
            .await?;

        info!("Provisioned mailbox {address} for user {}", user.discord_id);
        Ok(address)
    }

    /// Ask the user for a usable mailbox name and wait for one reply that
    /// qualifies. The elapsed window is a first-class outcome.
    async fn collect_local_part(&self, user: &User) -> Result<String, ProvisionError> {
        let window = Duration::from_secs(self.config.reply_window_secs);
        let (channel, prompt) = self
            .discord
            .send_dm(
                &user.discord_id,
                &format!(
                    "Your Discord username can't be used as an email address. Please reply \
                     within {} seconds with an alphanumeric mailbox name.",
                    window.as_secs()
                ),
            )
            .await?;

        // Only replies after the prompt count
        let collector = ReplyCollector::new(
            &self.discord,
            &channel,
            &user.discord_id,
            &prompt,
            window,
            Duration::from_millis(self.config.poll_interval_millis),
        );

        match collector
            .run(|content| {
                let normalized = normalize_local_part(content);
                is_valid_local_part(&normalized).then_some(normalized)
            })
            .await?
        {
            CollectOutcome::Resolved(local_part) => Ok(local_part),
            CollectOutcome::TimedOut => {
                warn!(
                    "Mailbox name collection timed out for user {}",
                    user.discord_id
                );
                self.discord
                    .send_dm(
                        &user.discord_id,
                        &format!(
                            "No valid mailbox name received. Please request an email at {}, \
                             or log in once again to restart the process.",
                            self.config.request_channel_url
                        ),
                    )
                    .await?;
                Err(ProvisionError::Timeout)
            }
        }
    }
}

/// Lowercase and replace whitespace with dashes, the shape mailbox
/// local-parts are derived in.
pub fn normalize_local_part(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// A usable local-part: non-empty ASCII alphanumerics and dashes.
pub fn is_valid_local_part(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// 14-character random password with at least one digit.
fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(14)
            .map(char::from)
            .collect();
        if candidate.chars().any(|c| c.is_ascii_digit()) {
            return candidate;
        }
    }
}
