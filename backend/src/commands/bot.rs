//! Admin chat bot for managing user accounts from Telegram.

use axum::{body::Bytes, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::commands::records::get_all_records;
use crate::commands::user::{
    create_user, delete_user, set_user_permission, update_user, verify_admin_password,
    NewUserInput, UserPatch,
};
use crate::db::{Permission, User};
use crate::error::{DairyError, DairyResult};
use crate::state::AppState;

pub const REFUSED: &str = "Wrong admin password. Request refused.";

const COMMAND_LIST: &str = "All available commands:
-> /commands
-> /new
-> /update
-> /view
-> /delete
-> /permissions
Usage:
/new [username] [email] [password] [admin password]
/update [id] [new username] [new email] [new password] [admin password]
/view [admin password]
/delete [id] [admin password]
/permissions [id] [permission] [admin password]";

const GREETING: &str = "Hello there! I am the farm bot, your virtual admin assistant.
I can help with the following operations:
-> Adding new users to the database.
-> Updating user information.
-> Viewing user information.
-> Deleting users from the database.
-> Changing user permissions.
Type /commands to see the list of commands at your disposal.";

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub text: Option<String>,
    pub chat: TelegramChat,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    New {
        username: String,
        email: String,
        password: String,
        secret: String,
    },
    Update {
        id: i64,
        username: String,
        email: String,
        password: String,
        secret: String,
    },
    View {
        secret: String,
    },
    Delete {
        id: i64,
        secret: String,
    },
    Permissions {
        id: i64,
        permission: Permission,
        secret: String,
    },
    Commands,
    Start,
}

fn usage(line: &str) -> DairyError {
    DairyError::Validation(format!("Usage: {}", line))
}

fn parse_id(raw: &str) -> DairyResult<i64> {
    raw.parse()
        .map_err(|_| DairyError::Validation(format!("'{}' is not a valid user id.", raw)))
}

impl BotCommand {
    pub fn parse(text: &str) -> DairyResult<Self> {
        let args: Vec<&str> = text.split_whitespace().collect();
        let Some(head) = args.first() else {
            return Err(DairyError::Validation("Empty message.".to_string()));
        };
        // "/view@farm_bot" addresses the same command in group chats.
        let name = head
            .strip_prefix('/')
            .map(|cmd| cmd.split('@').next().unwrap_or(cmd))
            .ok_or_else(|| {
                DairyError::Validation("Commands start with '/'. Type /commands.".to_string())
            })?;
        let owned = |i: usize| args[i].to_string();

        match (name, args.len()) {
            ("new", 5) => Ok(BotCommand::New {
                username: owned(1),
                email: owned(2),
                password: owned(3),
                secret: owned(4),
            }),
            ("new", _) => Err(usage("/new [username] [email] [password] [admin password]")),
            ("update", 6) => Ok(BotCommand::Update {
                id: parse_id(args[1])?,
                username: owned(2),
                email: owned(3),
                password: owned(4),
                secret: owned(5),
            }),
            ("update", _) => Err(usage(
                "/update [id] [new username] [new email] [new password] [admin password]",
            )),
            ("view", 2) => Ok(BotCommand::View { secret: owned(1) }),
            ("view", _) => Err(usage("/view [admin password]")),
            ("delete", 3) => Ok(BotCommand::Delete {
                id: parse_id(args[1])?,
                secret: owned(2),
            }),
            ("delete", _) => Err(usage("/delete [id] [admin password]")),
            ("permissions", 4) => Ok(BotCommand::Permissions {
                id: parse_id(args[1])?,
                permission: args[2].parse()?,
                secret: owned(3),
            }),
            ("permissions", _) => Err(usage("/permissions [id] [permission] [admin password]")),
            ("commands", _) => Ok(BotCommand::Commands),
            ("start", _) => Ok(BotCommand::Start),
            (other, _) => Err(DairyError::Validation(format!(
                "Unknown command '/{}'. Type /commands.",
                other
            ))),
        }
    }

    fn secret(&self) -> Option<&str> {
        match self {
            BotCommand::New { secret, .. }
            | BotCommand::Update { secret, .. }
            | BotCommand::View { secret }
            | BotCommand::Delete { secret, .. }
            | BotCommand::Permissions { secret, .. } => Some(secret),
            BotCommand::Commands | BotCommand::Start => None,
        }
    }
}

fn describe(heading: &str, user: &User) -> String {
    format!(
        "{}\nid: {}\nusername: {}\nemail: {}\npermission: {}",
        heading,
        user.id,
        user.username,
        user.email,
        user.permission.as_str()
    )
}

pub async fn execute(state: &AppState, command: BotCommand) -> DairyResult<String> {
    let store = state.store.as_ref();
    let config = state.config.as_ref();

    if let Some(secret) = command.secret() {
        if !verify_admin_password(store, config, secret).await? {
            tracing::warn!("bot command with wrong admin password");
            return Ok(REFUSED.to_string());
        }
    }

    match command {
        BotCommand::New {
            username,
            email,
            password,
            ..
        } => {
            let user = create_user(
                store,
                config,
                NewUserInput {
                    username,
                    email,
                    password,
                },
            )
            .await?;
            Ok(describe("Created new user.", &user))
        }
        BotCommand::Update {
            id,
            username,
            email,
            password,
            ..
        } => {
            let patch = UserPatch {
                username: Some(username),
                email: Some(email),
                password: Some(password),
                status: None,
            };
            let user = update_user(store, config, id, patch).await?;
            Ok(describe("Updated user.", &user))
        }
        BotCommand::View { .. } => {
            let users = get_all_records::<User>(store).await?;
            let lines: Vec<String> = users
                .iter()
                .map(|u| {
                    format!(
                        "[id: {}, username: {}, email: {}, permission: {}]",
                        u.id,
                        u.username,
                        u.email,
                        u.permission.as_str()
                    )
                })
                .collect();
            Ok(format!("All users in the database:\n{}", lines.join("\n")))
        }
        BotCommand::Delete { id, .. } => {
            delete_user(store, config, id).await?;
            Ok(format!("Deleted user {} successfully.", id))
        }
        BotCommand::Permissions { id, permission, .. } => {
            let user = set_user_permission(store, id, permission).await?;
            Ok(describe("Updated user permissions.", &user))
        }
        BotCommand::Commands => Ok(COMMAND_LIST.to_string()),
        BotCommand::Start => Ok(GREETING.to_string()),
    }
}

/// Works out the reply for one update. Returns `None` for updates without a
/// text message.
pub async fn handle_update(state: &AppState, update: TelegramUpdate) -> Option<(i64, String)> {
    let message = update.message?;
    let text = message.text?;
    let chat_id = message.chat.id;

    let reply = match BotCommand::parse(&text) {
        Ok(command) => match execute(state, command).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "bot command failed");
                format!("Operation failed: {}", e)
            }
        },
        Err(e) => e.to_string(),
    };
    Some((chat_id, reply))
}

/// Telegram retries anything that is not a 200, so every outcome answers "ok".
pub async fn telegram_webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable telegram update");
            return (StatusCode::OK, "ok");
        }
    };

    if let Some((chat_id, reply)) = handle_update(&state, update).await {
        if let Err(e) = state.bot.send(&chat_id.to_string(), &reply).await {
            tracing::warn!(chat_id, error = %e, "bot reply not delivered");
        }
    }
    (StatusCode::OK, "ok")
}
