use std::{fmt::Write, future::Future, pin::Pin};

use bot_commons::{
    teloxide_retry,
    useful_methods::*,
    user_resolving::{get_mentioned_users, resolve_user_id, UserLike},
};
use chrono::{DateTime, Utc};
use html_escape::encode_text;
use teloxide::{
    requests::Requester,
    sugar::request::RequestReplyExt,
    types::{BotCommand, Chat, ChatId, InputFile, Me, Message, UserId},
    Bot, RequestError,
};

use crate::{
    auth::{permitted, Capabilities, Denial, Requirement, Tier},
    config::Config,
    database::Database,
    error::CommandError,
    misc::{interval_prettyprint, user_name_prettyprint},
    stats,
};

pub const COMMANDS: &[Command] = &[
    START,
    COMMANDS_LIST,
    FB_STATS,
    CHECK,
    FBCOUNT,
    ADDREMINDER,
    REMOVEREMINDER,
    ADDGROUP,
    REMOVEGROUP,
    ADDAUTH,
    REMOVEAUTH,
    AUTHLIST,
    ADDPLACE,
    REMOVEPLACE,
    LOGS,
    CLEARDB,
];

/// HTML text to reply to the command with, if the command didn't reply on its own.
pub type Ret = Result<Option<String>, CommandError>;
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Ret> + Send + 'a>>;

/// Which group a command is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Doesn't need a group. Still about the group it's sent in, if any.
    Anywhere,
    /// The authorized group the command is sent in.
    ThisGroup,
    /// The authorized group given by ID as the first parameter, or the one the command is sent in.
    ThisOrGivenGroup,
    /// Like [`Scope::ThisOrGivenGroup`], but the group doesn't have to be authorized.
    SetupGroup,
}

impl Scope {
    #[must_use]
    pub fn requirement(self, tier: Tier) -> Requirement {
        let (needs_group, needs_authorized_group) = match self {
            Scope::Anywhere => (false, false),
            Scope::SetupGroup => (true, false),
            Scope::ThisGroup | Scope::ThisOrGivenGroup => (true, true),
        };
        Requirement {
            tier,
            needs_group,
            needs_authorized_group,
        }
    }

    /// Figures out which group a command sent in `chat` with `params` is about.
    pub fn target_group(self, chat: &Chat, params: &str) -> Result<Option<ChatId>, CommandError> {
        let this_group = (!chat.is_private()).then_some(chat.id);

        match self {
            Scope::Anywhere | Scope::ThisGroup => Ok(this_group),
            Scope::ThisOrGivenGroup | Scope::SetupGroup => {
                match params.split_whitespace().next() {
                    None => Ok(this_group),
                    Some(word) => word
                        .parse()
                        .map(|id| Some(ChatId(id)))
                        .map_err(|_| CommandError::Usage("Expected a group ID, like -1001234567890.")),
                }
            }
        }
    }
}

/// Splits a command message into the command's callname and its parameters.
///
/// `/check@Feedback_Bot @someone` becomes `("/check", "@someone")`. Returns `None` if the
/// text is not a command, or if it's a command addressed to some other bot.
#[must_use]
pub fn split_command<'t>(text: &'t str, bot_username: &str) -> Option<(&'t str, &'t str)> {
    if !text.starts_with('/') {
        return None;
    }

    let command = text.split_whitespace().next()?;

    if !command.is_ascii() {
        // Telegram commands must be ASCII.
        // See https://core.telegram.org/bots/api#botcommand
        return None;
    }

    let params = text[command.len()..].trim();

    let callname = match command.find('@') {
        Some(username_start) => {
            // Bot names are guaranteed ASCII, so ignore ASCII case specifically.
            if !command[username_start + '@'.len_utf8()..].eq_ignore_ascii_case(bot_username) {
                return None;
            }
            &command[..username_start]
        }
        None => command,
    };

    Some((callname, params))
}

pub struct CommandParams<'a> {
    pub bot: &'a Bot,
    pub message: &'a Message,
    pub database: &'a Database,
    pub config: &'a Config,
    pub callname: &'a str,
    pub params: &'a str,
    /// The group this command is about, as decided by the command's [`Scope`].
    pub group: Option<ChatId>,
    /// The highest tier the sender belongs to.
    pub caller: Tier,
    pub now: DateTime<Utc>,
}

impl<'a> CommandParams<'a> {
    /// Returns `None` if the message is not a command for this bot.
    pub fn new(
        bot: &'a Bot,
        bot_me: &Me,
        message: &'a Message,
        database: &'a Database,
        config: &'a Config,
    ) -> Option<CommandParams<'a>> {
        let (callname, params) = split_command(message.text_full()?, bot_me.username())?;

        Some(CommandParams {
            bot,
            message,
            database,
            config,
            callname,
            params,
            group: None,
            caller: Tier::Anyone,
            now: Utc::now(),
        })
    }

    /// Get text parameters for this command.
    ///
    /// If the input command is `/addreminder Post your feedback!`,
    /// this will be the substring `Post your feedback!`.
    #[inline]
    #[must_use]
    pub fn get_params(&self) -> &'a str {
        self.params
    }

    fn group(&self) -> Result<ChatId, CommandError> {
        self.group.ok_or(CommandError::Denied(Denial::GroupOnly))
    }

    /// Finds the command, checks that the sender may run it, runs it and replies.
    /// Messages that look like commands this bot doesn't know are ignored.
    pub async fn run(self) -> Result<(), RequestError> {
        let Some(command) = find_command(self.callname) else {
            return Ok(());
        };

        let bot = self.bot;
        let message = self.message;

        let Some(reply) = self.execute(command).await else {
            return Ok(());
        };

        bot.archsendmsg(message.chat.id, reply.as_str(), message.id)
            .await?;
        Ok(())
    }

    /// Checks that the sender may run `command`, runs it if so,
    /// and returns what to reply with.
    async fn execute(mut self, command: &Command) -> Option<String> {
        let message = self.message;

        let result = match self.authorize(command).await {
            Ok(()) => (command.function)(self).await,
            Err(e) => Err(e),
        };

        reply_for(command, message, result)
    }

    async fn authorize(&mut self, command: &Command) -> Result<(), CommandError> {
        self.group = command
            .scope
            .target_group(&self.message.chat, self.params)?;

        let caps = Capabilities::gather(
            self.bot,
            self.database,
            self.config,
            self.message,
            self.group,
            command.tier,
        )
        .await?;

        permitted(&caps, command.scope.requirement(command.tier))?;

        self.caller = if caps.is_owner {
            Tier::Owner
        } else if caps.is_authorized_user || caps.is_group_admin {
            Tier::Admin
        } else {
            Tier::Anyone
        };

        Ok(())
    }
}

#[must_use]
pub fn find_command(callname: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.is_matching_callname(callname))
}

/// Logs how running `command` went and turns that into reply text.
/// Error texts are escaped, since they're sent as HTML.
fn reply_for(command: &Command, message: &Message, result: Ret) -> Option<String> {
    let e = match result {
        Ok(reply) => return reply,
        Err(e) => e,
    };

    match &e {
        CommandError::Denied(_) | CommandError::Resolution(_) | CommandError::Usage(_) => {
            log::info!("{} from {}: {e}", command.name(), sender_of(message));
        }
        CommandError::Persistence(_) | CommandError::Send(_) => {
            log::error!("{} from {} failed: {e}", command.name(), sender_of(message));
        }
    }

    e.reply_text().map(|text| encode_text(&text).into_owned())
}

fn sender_of(message: &Message) -> String {
    match &message.from {
        Some(user) => user_name_prettyprint(user, true),
        None => "someone".to_string(),
    }
}

pub struct Command {
    /// The command itself, optionally followed by a description of its parameters.
    pub callname: &'static str,
    pub description: &'static str,
    pub tier: Tier,
    pub scope: Scope,
    pub function: fn(CommandParams) -> CommandFuture,
    /// Not advertised in Telegram's command menu.
    hidden: bool,
}

impl Command {
    /// The command without its parameters, like `/check`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.callname
            .split_ascii_whitespace()
            .next()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_matching_callname(&self, command: &str) -> bool {
        self.name().eq_ignore_ascii_case(command)
    }

    pub fn get_help(&self, mut output: impl std::fmt::Write) -> Result<(), std::fmt::Error> {
        output.write_str(self.callname)?;
        if !self.description.is_empty() {
            output.write_str(" - ")?;
            output.write_str(self.description)?;
        }

        Ok(())
    }

    /// Lists every command someone of `caller` tier may use.
    #[must_use]
    pub fn generate_help(caller: Tier) -> String {
        let mut response = String::from("📋 <b>Commands:</b>\n\n");
        for command in COMMANDS {
            if command.tier > caller || command.description.is_empty() {
                continue;
            }
            let _ = command.get_help(&mut response);
            response.push('\n');
        }
        response.pop();
        response
    }

    #[must_use]
    pub fn generate_bot_commands() -> Vec<BotCommand> {
        let mut output = Vec::new();

        for command in COMMANDS {
            if command.hidden {
                continue;
            }

            // Cut off the /
            let callname = command.name()[1..].trim().to_string();
            let description = command
                .description
                .replace("&lt;", "<")
                .replace("&gt;", ">");

            output.push(BotCommand {
                command: callname,
                description,
            });
        }

        output
    }
}

///////////////////////////////////////
/////////////////COMMAND DEFINITIONS
///////////////////////////////////////

/// Wraps the function's return value in a pinning closure.
macro_rules! wrap {
    ($thing:expr) => {
        |tp| Box::pin($thing(tp))
    };
}

/// Finds out who a command is about: the replied-to user, a text mention, a user ID, or an
/// `@username` of someone who posted feedback in `group`.
async fn resolve_target(
    tp: &CommandParams<'_>,
    group: Option<ChatId>,
) -> Result<(UserId, String), CommandError> {
    let Some(target) = get_mentioned_users(tp.message).into_iter().next() else {
        return Err(CommandError::Usage(
            "Reply to someone's message, or mention them by @username or user ID.",
        ));
    };

    match target {
        UserLike::User(user) => Ok((user.id, user_name_prettyprint(&user, false))),
        UserLike::Id(id) => {
            let user = match group {
                Some(group) => resolve_user_id(tp.bot, group, id).await?,
                None => None,
            };
            let name = user.map_or_else(|| format!("User {id}"), |u| user_name_prettyprint(&u, false));
            Ok((id, name))
        }
        UserLike::Username(username) => {
            let found = match group {
                Some(group) => tp.database.username_to_userid(group, &username).await?,
                None => None,
            };
            match found {
                Some(id) => Ok((id, format!("@{username}"))),
                None => Err(CommandError::Resolution(format!(
                    "I don't know who @{username} is. Reply to their message or use their user ID."
                ))),
            }
        }
    }
}

pub const START: Command = Command {
    callname: "/start",
    description: "",
    tier: Tier::Anyone,
    scope: Scope::Anywhere,
    function: wrap!(start),
    hidden: true,
};
async fn start(_: CommandParams<'_>) -> Ret {
    Ok(Some(
        "👋 Welcome to the Feedback Bot!

Post a photo, video or file with <code>#feedback</code> in the caption in an authorized group, \
or reply to one with <code>#feedback</code>, and I'll keep track of it.

Admins can see everything I can do with /commands."
            .to_string(),
    ))
}

pub const COMMANDS_LIST: Command = Command {
    callname: "/commands",
    description: "List the commands you can use.",
    tier: Tier::Admin,
    scope: Scope::Anywhere,
    function: wrap!(commands_list),
    hidden: false,
};
async fn commands_list(tp: CommandParams<'_>) -> Ret {
    Ok(Some(Command::generate_help(tp.caller)))
}

pub const FB_STATS: Command = Command {
    callname: "/fb_stats [group id]",
    description: "Show all feedback of the last 3 days.",
    tier: Tier::Admin,
    scope: Scope::ThisOrGivenGroup,
    function: wrap!(fb_stats),
    hidden: false,
};
async fn fb_stats(tp: CommandParams<'_>) -> Ret {
    let group = tp.group()?;
    let records = tp
        .database
        .recent_feedback(group, stats::window_start(tp.now))
        .await?;
    Ok(Some(stats::format_recent_feedback(&records)))
}

pub const CHECK: Command = Command {
    callname: "/check &lt;user&gt;",
    description: "Check if a user posted feedback in the last 3 days. Reply to them or mention them.",
    tier: Tier::Admin,
    scope: Scope::ThisGroup,
    function: wrap!(check),
    hidden: false,
};
async fn check(tp: CommandParams<'_>) -> Ret {
    let group = tp.group()?;
    let (user_id, name) = resolve_target(&tp, Some(group)).await?;
    let records = tp
        .database
        .user_feedback(group, user_id, stats::window_start(tp.now))
        .await?;
    Ok(Some(stats::format_user_check(&name, &records)))
}

pub const FBCOUNT: Command = Command {
    callname: "/fbcount [days]",
    description: "Count all stored feedback per user, or per day with \"days\".",
    tier: Tier::Admin,
    scope: Scope::ThisGroup,
    function: wrap!(fbcount),
    hidden: false,
};
async fn fbcount(tp: CommandParams<'_>) -> Ret {
    let group = tp.group()?;
    match tp.get_params().to_ascii_lowercase().as_str() {
        "" | "users" => {
            let counts = tp.database.feedback_counts_by_user(group).await?;
            Ok(Some(stats::format_counts_by_user(&counts)))
        }
        "days" => {
            let counts = tp.database.feedback_counts_by_day(group).await?;
            Ok(Some(stats::format_counts_by_day(&counts)))
        }
        _ => Err(CommandError::Usage("Usage: /fbcount or /fbcount days")),
    }
}

pub const ADDREMINDER: Command = Command {
    callname: "/addreminder &lt;text&gt;",
    description: "Set the reminder this group periodically gets.",
    tier: Tier::Admin,
    scope: Scope::ThisGroup,
    function: wrap!(addreminder),
    hidden: false,
};
async fn addreminder(tp: CommandParams<'_>) -> Ret {
    let group = tp.group()?;
    let text = tp.get_params();
    if text.is_empty() {
        return Err(CommandError::Usage(
            "Please provide reminder text. Usage: /addreminder <text>",
        ));
    }

    let set_by = tp.message.from.as_ref().map_or(UserId(0), |u| u.id);
    tp.database.set_reminder(group, text, set_by, tp.now).await?;
    log::info!("Reminder set in {group} by {}", sender_of(tp.message));

    Ok(Some(format!(
        "✅ Reminder set! It will be sent every {}.",
        interval_prettyprint(tp.config.reminder_interval)
    )))
}

pub const REMOVEREMINDER: Command = Command {
    callname: "/removereminder",
    description: "Stop sending this group its reminder.",
    tier: Tier::Admin,
    scope: Scope::ThisGroup,
    function: wrap!(removereminder),
    hidden: false,
};
async fn removereminder(tp: CommandParams<'_>) -> Ret {
    let group = tp.group()?;
    Ok(Some(if tp.database.remove_reminder(group).await? {
        "✅ Reminder removed.".to_string()
    } else {
        "ℹ️ This group has no reminder set.".to_string()
    }))
}

pub const ADDGROUP: Command = Command {
    callname: "/addgroup [group id]",
    description: "Authorize this group to use the bot.",
    tier: Tier::Owner,
    scope: Scope::SetupGroup,
    function: wrap!(addgroup),
    hidden: true,
};
async fn addgroup(tp: CommandParams<'_>) -> Ret {
    let group = tp.group()?;
    let name = match tp.message.chat.title() {
        Some(title) if group == tp.message.chat.id => title.to_string(),
        _ => format!("Group {group}"),
    };

    tp.database
        .authorize_group(group, &name, tp.config.owner_id, tp.now)
        .await?;
    log::info!("Authorized group {name} ({group})");

    Ok(Some(format!(
        "✅ Group '{}' has been authorized to use the feedback bot!",
        encode_text(&name)
    )))
}

pub const REMOVEGROUP: Command = Command {
    callname: "/removegroup [group id]",
    description: "Take the authorization of this group away.",
    tier: Tier::Owner,
    scope: Scope::SetupGroup,
    function: wrap!(removegroup),
    hidden: true,
};
async fn removegroup(tp: CommandParams<'_>) -> Ret {
    let group = tp.group()?;
    let removed = tp.database.deauthorize_group(group).await?;
    tp.database.remove_reminder(group).await?;

    Ok(Some(if removed {
        log::info!("Deauthorized group {group}");
        format!("✅ Group {group} is no longer authorized.")
    } else {
        format!("ℹ️ Group {group} was not authorized.")
    }))
}

pub const ADDAUTH: Command = Command {
    callname: "/addauth &lt;user&gt;",
    description: "Let a user run admin commands anywhere.",
    tier: Tier::Owner,
    scope: Scope::Anywhere,
    function: wrap!(addauth),
    hidden: true,
};
async fn addauth(tp: CommandParams<'_>) -> Ret {
    let (user_id, name) = resolve_target(&tp, tp.group).await?;

    tp.database
        .authorize_user(user_id, tp.config.owner_id, tp.now)
        .await?;
    log::info!("Authorized user {name} ({user_id})");

    Ok(Some(format!(
        "✅ {} can now use admin commands.",
        encode_text(&name)
    )))
}

pub const REMOVEAUTH: Command = Command {
    callname: "/removeauth &lt;user&gt;",
    description: "Take a user's admin command access away.",
    tier: Tier::Owner,
    scope: Scope::Anywhere,
    function: wrap!(removeauth),
    hidden: true,
};
async fn removeauth(tp: CommandParams<'_>) -> Ret {
    let (user_id, name) = resolve_target(&tp, tp.group).await?;

    Ok(Some(if tp.database.deauthorize_user(user_id).await? {
        log::info!("Deauthorized user {name} ({user_id})");
        format!("✅ {} can no longer use admin commands.", encode_text(&name))
    } else {
        format!("ℹ️ {} was not authorized.", encode_text(&name))
    }))
}

pub const AUTHLIST: Command = Command {
    callname: "/authlist",
    description: "List authorized groups and users.",
    tier: Tier::Owner,
    scope: Scope::Anywhere,
    function: wrap!(authlist),
    hidden: true,
};
async fn authlist(tp: CommandParams<'_>) -> Ret {
    let groups = tp.database.authorized_groups().await?;
    let users = tp.database.authorized_users().await?;
    let destination = tp.database.forward_destination().await?;

    let mut response = String::from("<b>Authorized groups:</b>\n");
    if groups.is_empty() {
        response.push_str("none\n");
    }
    for group in &groups {
        let _ = writeln!(
            response,
            "• {} (<code>{}</code>) since {}",
            encode_text(&group.group_name),
            group.group_id,
            group.timestamp.format("%Y-%m-%d")
        );
    }

    response.push_str("\n<b>Authorized users:</b>\n");
    if users.is_empty() {
        response.push_str("none\n");
    }
    for user in &users {
        let _ = writeln!(
            response,
            "• <code>{}</code> since {}",
            user.user_id,
            user.timestamp.format("%Y-%m-%d")
        );
    }

    response.push_str("\n<b>Feedback is forwarded to:</b> ");
    match destination {
        Some(chat) => {
            let _ = write!(response, "<code>{chat}</code>");
        }
        None => response.push_str("nowhere"),
    }

    Ok(Some(response))
}

pub const ADDPLACE: Command = Command {
    callname: "/addplace [chat id]",
    description: "Forward all new feedback to this chat.",
    tier: Tier::Owner,
    scope: Scope::Anywhere,
    function: wrap!(addplace),
    hidden: true,
};
async fn addplace(tp: CommandParams<'_>) -> Ret {
    let destination = match tp.get_params().split_whitespace().next() {
        None => tp.message.chat.id,
        Some(word) => ChatId(word.parse().map_err(|_| {
            CommandError::Usage("Expected a chat ID, like -1001234567890.")
        })?),
    };

    tp.database
        .set_forward_destination(Some(destination))
        .await?;
    log::info!("Feedback will be forwarded to {destination}");

    Ok(Some(format!(
        "✅ New feedback will be forwarded to <code>{destination}</code>."
    )))
}

pub const REMOVEPLACE: Command = Command {
    callname: "/removeplace",
    description: "Stop forwarding feedback.",
    tier: Tier::Owner,
    scope: Scope::Anywhere,
    function: wrap!(removeplace),
    hidden: true,
};
async fn removeplace(tp: CommandParams<'_>) -> Ret {
    tp.database.set_forward_destination(None).await?;
    log::info!("Feedback forwarding turned off");
    Ok(Some("✅ Feedback will no longer be forwarded.".to_string()))
}

pub const LOGS: Command = Command {
    callname: "/logs",
    description: "Send the bot's log file.",
    tier: Tier::Owner,
    scope: Scope::Anywhere,
    function: wrap!(logs),
    hidden: true,
};
async fn logs(tp: CommandParams<'_>) -> Ret {
    if tokio::fs::metadata(&tp.config.log_file).await.is_err() {
        return Ok(Some("ℹ️ There is no log file yet.".to_string()));
    }

    teloxide_retry!(
        tp.bot
            .send_document(
                tp.message.chat.id,
                InputFile::file(tp.config.log_file.clone())
            )
            .reply_to(tp.message.id)
            .await
    )?;

    Ok(None)
}

pub const CLEARDB: Command = Command {
    callname: "/cleardb",
    description: "Delete all stored feedback.",
    tier: Tier::Owner,
    scope: Scope::Anywhere,
    function: wrap!(cleardb),
    hidden: true,
};
async fn cleardb(tp: CommandParams<'_>) -> Ret {
    let deleted = tp.database.clear_feedback().await?;
    log::warn!("Feedback database cleared by {}, {deleted} entries gone", sender_of(tp.message));
    Ok(Some(format!(
        "🗑️ Cleared {deleted} feedback entries from the database."
    )))
}
