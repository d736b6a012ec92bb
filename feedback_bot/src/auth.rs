//! Deciding who may run which command where.
//!
//! Gathering what the sender is ([`Capabilities::gather`]) is kept apart from deciding
//! what they may do ([`permitted`]), so that the decision is a plain function.

use teloxide::{
    requests::Requester,
    types::{ChatId, Message, UserId},
    Bot, RequestError,
};
use thiserror::Error;

use crate::{config::Config, database::Database, error::CommandError};

/// The user Telegram puts as the sender of messages posted by anonymous group admins.
pub const GROUP_ANONYMOUS_BOT: UserId = UserId(1087968824);

/// Who may run a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Anyone,
    /// Group admins, anonymous admins and manually authorized users.
    Admin,
    Owner,
}

/// What a command needs from the group it is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requirement {
    pub tier: Tier,
    /// The command is about some group.
    pub needs_group: bool,
    /// That group must be authorized too.
    pub needs_authorized_group: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupStatus {
    /// The command is not about any group, e.g. sent in a private chat.
    NoGroup,
    Unauthorized,
    Authorized,
}

/// What is known about the sender of a command and the group it's about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub is_owner: bool,
    pub is_authorized_user: bool,
    pub is_group_admin: bool,
    pub group: GroupStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Only the bot owner can use this command.")]
    OwnerOnly,
    #[error("Only group administrators can use this command.")]
    AdminOnly,
    #[error("This command can only be used in groups.")]
    GroupOnly,
    #[error("This group is not authorized. Ask the owner to run /addgroup first.")]
    GroupNotAuthorized,
}

/// Decides whether someone with these capabilities may run a command with this requirement.
/// The owner passes every tier check, but group commands still need a group,
/// and an authorized one unless the command is for setting groups up.
pub fn permitted(caps: &Capabilities, requirement: Requirement) -> Result<(), Denial> {
    match requirement.tier {
        _ if caps.is_owner => (),
        Tier::Owner => return Err(Denial::OwnerOnly),
        Tier::Admin if !(caps.is_authorized_user || caps.is_group_admin) => {
            return Err(Denial::AdminOnly)
        }
        Tier::Admin | Tier::Anyone => (),
    }

    if requirement.needs_group && caps.group == GroupStatus::NoGroup {
        return Err(Denial::GroupOnly);
    }

    if requirement.needs_authorized_group && caps.group != GroupStatus::Authorized {
        return Err(match caps.group {
            GroupStatus::NoGroup => Denial::GroupOnly,
            _ => Denial::GroupNotAuthorized,
        });
    }

    Ok(())
}

/// Returns `true` if this message was posted by an anonymous admin of the chat it's in.
///
/// Such messages have the chat itself as the sender chat, and the special
/// [`GROUP_ANONYMOUS_BOT`] user as the sender, so there's nobody to look up.
#[must_use]
pub fn is_anonymous_admin(message: &Message) -> bool {
    if message.chat.is_private() {
        return false;
    }

    let sent_as_chat = message
        .sender_chat
        .as_ref()
        .is_some_and(|chat| chat.id == message.chat.id);
    let sent_by_anon_bot = message
        .from
        .as_ref()
        .is_some_and(|user| user.id == GROUP_ANONYMOUS_BOT);

    sent_as_chat || sent_by_anon_bot
}

impl Capabilities {
    /// Finds out what the sender of `message` is, regarding `group`.
    ///
    /// Only asks Telegram about admin status when the answer could matter for `tier`.
    pub async fn gather(
        bot: &Bot,
        database: &Database,
        config: &Config,
        message: &Message,
        group: Option<ChatId>,
        tier: Tier,
    ) -> Result<Capabilities, CommandError> {
        let sender = message.from.as_ref().map(|user| user.id);

        let is_owner = sender == Some(config.owner_id);

        let is_authorized_user = match sender {
            Some(id) if !is_owner && tier == Tier::Admin => database.is_user_authorized(id).await?,
            _ => false,
        };

        let is_group_admin = match group {
            _ if is_owner || is_authorized_user || tier != Tier::Admin => false,
            Some(group) if group == message.chat.id && is_anonymous_admin(message) => true,
            Some(group) => match sender {
                Some(user) => is_admin_of(bot, user, group).await?,
                None => false,
            },
            None => false,
        };

        let group = match group {
            None => GroupStatus::NoGroup,
            Some(group) if database.is_group_authorized(group).await? => GroupStatus::Authorized,
            Some(_) => GroupStatus::Unauthorized,
        };

        Ok(Capabilities {
            is_owner,
            is_authorized_user,
            is_group_admin,
            group,
        })
    }
}

/// Asks Telegram if the user is an admin or the creator of the group.
/// Groups the bot can't see count as "no".
async fn is_admin_of(bot: &Bot, user: UserId, group: ChatId) -> Result<bool, RequestError> {
    match bot.get_chat_member(group, user).await {
        Ok(member) => Ok(member.kind.is_privileged()),
        Err(RequestError::Api(e)) => {
            log::debug!("Could not check if {user} is an admin of {group}: {e}");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
