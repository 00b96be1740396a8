//! Chat command parsing, permissions and cooldowns
//!
//! Turns raw chat lines into [`GameCommand`]s. Rejections (unknown command,
//! missing permission, cooldown) are silent: nothing is said back to chat.

use std::time::Duration;
use tracing::debug;

use crate::game::{DropVariant, GameCommand};
use crate::util::rate_limit::CommandCooldown;

use super::ChatUser;

/// `!drop koaladuru` picks the koala character
const KOALA_KEYWORD: &str = "koaladuru";

/// Parses chat lines and applies the permission/cooldown policy
pub struct CommandDispatcher {
    channel: String,
    cooldown: CommandCooldown,
}

impl CommandDispatcher {
    pub fn new(channel: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            channel: channel.into(),
            cooldown: CommandCooldown::new(cooldown),
        }
    }

    pub fn is_broadcaster(&self, user: &ChatUser) -> bool {
        user.username.eq_ignore_ascii_case(&self.channel) || user.has_badge("broadcaster")
    }

    pub fn is_moderator(&self, user: &ChatUser) -> bool {
        user.has_badge("moderator")
    }

    fn is_privileged(&self, user: &ChatUser) -> bool {
        self.is_broadcaster(user) || self.is_moderator(user)
    }

    /// Parse one chat line. `None` means nothing should happen.
    pub fn dispatch(&self, text: &str, user: &ChatUser, self_echo: bool) -> Option<GameCommand> {
        if self_echo {
            return None;
        }
        let (name, args) = parse_command(text)?;
        let privileged = self.is_privileged(user);

        if !privileged && !self.cooldown.try_acquire(user.id, &name) {
            debug!(username = %user.username, command = %name, "Command on cooldown");
            return None;
        }

        let command = match name.as_str() {
            "drop" | "join" => GameCommand::Drop {
                username: user.username.clone(),
                variant: parse_variant(args),
            },
            "droptop" => GameCommand::DropTop,
            "droplow" => GameCommand::DropLow,
            "droprecent" => GameCommand::DropRecent,
            "dropstats" => GameCommand::DropStats {
                username: user.username.clone(),
            },
            "help" | "commands" => GameCommand::Help {
                username: user.username.clone(),
            },
            "queuedrop" | "startdrop" | "resetdrop" | "clearscores" | "dropgame" if !privileged => {
                debug!(username = %user.username, command = %name, "Ignoring privileged command");
                return None;
            }
            "queuedrop" => GameCommand::QueueDrop {
                delay_secs: args.and_then(leading_integer),
            },
            "startdrop" => GameCommand::StartDrop,
            "resetdrop" => GameCommand::ResetDrop,
            "dropgame" => GameCommand::DropGame,
            "clearscores" => GameCommand::ClearScores {
                usernames: args.map(|a| {
                    a.split(' ')
                        .filter(|s| !s.is_empty())
                        .map(str::to_lowercase)
                        .collect()
                }),
            },
            _ => return None,
        };

        debug!(username = %user.username, ?command, "Dispatching command");
        Some(command)
    }

    /// Forget cooldown buckets that have expired
    pub fn sweep(&self) {
        self.cooldown.sweep();
    }
}

/// Split `!name args` into a lowercased name and the optional argument text.
/// Names may contain letters, digits, `-`, `_` and `.`.
fn parse_command(text: &str) -> Option<(String, Option<&str>)> {
    let rest = text.strip_prefix('!')?;
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }

    let (name, tail) = rest.split_at(end);
    if tail.is_empty() {
        return Some((name.to_ascii_lowercase(), None));
    }
    if !tail.starts_with(char::is_whitespace) {
        return None;
    }

    let args = tail.trim_start();
    let args = (!args.is_empty()).then_some(args);
    Some((name.to_ascii_lowercase(), args))
}

/// Pick the drop variant from the argument text
fn parse_variant(args: Option<&str>) -> DropVariant {
    let Some(args) = args else {
        return DropVariant::Default;
    };

    if args.to_lowercase().contains(KOALA_KEYWORD) {
        return DropVariant::Koala;
    }
    if let Some((id, name)) = find_emote_token(args) {
        return DropVariant::Emote { id: Some(id), name };
    }
    match first_word(args) {
        Some(word) => DropVariant::Hint(word.to_string()),
        None => DropVariant::Default,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// First `[emote:ID:name]` token in the text
fn find_emote_token(text: &str) -> Option<(u64, String)> {
    const OPEN: &str = "[emote:";

    let mut search = text;
    while let Some(start) = search.find(OPEN) {
        let body = &search[start + OPEN.len()..];
        if let Some(found) = parse_emote_body(body) {
            return Some(found);
        }
        search = body;
    }
    None
}

/// Parse `ID:name]` at the start of `body`
fn parse_emote_body(body: &str) -> Option<(u64, String)> {
    let digits = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
    if digits == 0 {
        return None;
    }
    let id = body[..digits].parse().ok()?;

    let rest = body[digits..].strip_prefix(':')?;
    let name_len = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
    if name_len == 0 || !rest[name_len..].starts_with(']') {
        return None;
    }

    Some((id, rest[..name_len].to_string()))
}

fn first_word(text: &str) -> Option<&str> {
    let start = text.find(is_word_char)?;
    let rest = &text[start..];
    let len = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
    Some(&rest[..len])
}

/// Leading decimal integer, ignoring leading whitespace
fn leading_integer(text: &str) -> Option<u64> {
    let text = text.trim_start();
    let len = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    text[..len].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chatter(name: &str, id: u64) -> ChatUser {
        ChatUser {
            username: name.to_string(),
            id,
            badges: Vec::new(),
        }
    }

    fn moderator(name: &str, id: u64) -> ChatUser {
        ChatUser {
            badges: vec!["moderator".to_string()],
            ..chatter(name, id)
        }
    }

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new("streamer", Duration::from_secs(3))
    }

    #[test]
    fn plain_drop() {
        let d = dispatcher();
        assert_eq!(
            d.dispatch("!drop", &chatter("alice", 1), false),
            Some(GameCommand::Drop {
                username: "alice".into(),
                variant: DropVariant::Default
            })
        );
    }

    #[test]
    fn join_is_an_alias_and_names_are_case_insensitive() {
        let d = dispatcher();
        assert!(matches!(
            d.dispatch("!JOIN", &chatter("alice", 1), false),
            Some(GameCommand::Drop { .. })
        ));
    }

    #[test]
    fn self_echo_and_non_commands_are_ignored() {
        let d = dispatcher();
        let alice = chatter("alice", 1);
        assert_eq!(d.dispatch("!drop", &alice, true), None);
        assert_eq!(d.dispatch("drop", &alice, false), None);
        assert_eq!(d.dispatch("!", &alice, false), None);
        assert_eq!(d.dispatch("!drop!", &alice, false), None);
        assert_eq!(d.dispatch("!fly", &alice, false), None);
    }

    #[test]
    fn drop_variants() {
        let d = dispatcher();
        let cases = [
            ("!drop KoalaDuru please", DropVariant::Koala),
            (
                "!drop [emote:37226:KEKW]",
                DropVariant::Emote {
                    id: Some(37226),
                    name: "KEKW".into(),
                },
            ),
            ("!drop  happy face", DropVariant::Hint("happy".into())),
            ("!drop :)", DropVariant::Default),
        ];

        for (i, (line, expected)) in cases.into_iter().enumerate() {
            let user = chatter("alice", i as u64);
            assert_eq!(
                d.dispatch(line, &user, false),
                Some(GameCommand::Drop {
                    username: "alice".into(),
                    variant: expected
                }),
                "{line}"
            );
        }
    }

    #[test]
    fn broken_emote_token_falls_back_to_a_hint() {
        assert_eq!(
            parse_variant(Some("[emote:abc:KEKW]")),
            DropVariant::Hint("emote".into())
        );
        assert_eq!(
            parse_variant(Some("[emote:1:] [emote:2:ok]")),
            DropVariant::Emote {
                id: Some(2),
                name: "ok".into()
            }
        );
    }

    #[test]
    fn cooldown_applies_to_chatters_only() {
        let d = dispatcher();
        let alice = chatter("alice", 1);
        assert!(d.dispatch("!droptop", &alice, false).is_some());
        assert_eq!(d.dispatch("!droptop", &alice, false), None);
        assert!(d.dispatch("!droplow", &alice, false).is_some());

        let bob = moderator("bob", 2);
        assert!(d.dispatch("!droptop", &bob, false).is_some());
        assert!(d.dispatch("!droptop", &bob, false).is_some());
    }

    #[test]
    fn privileged_commands_need_a_role() {
        let d = dispatcher();
        let alice = chatter("alice", 1);
        for line in ["!queuedrop", "!startdrop", "!resetdrop", "!clearscores", "!dropgame"] {
            assert_eq!(d.dispatch(line, &alice, false), None, "{line}");
        }

        let owner = chatter("Streamer", 3);
        assert_eq!(d.dispatch("!startdrop", &owner, false), Some(GameCommand::StartDrop));

        let badge = ChatUser {
            badges: vec!["broadcaster".into()],
            ..chatter("other", 4)
        };
        assert_eq!(d.dispatch("!resetdrop", &badge, false), Some(GameCommand::ResetDrop));
    }

    #[test]
    fn queuedrop_delay_parsing() {
        let d = dispatcher();
        let bob = moderator("bob", 2);
        assert_eq!(
            d.dispatch("!queuedrop 30", &bob, false),
            Some(GameCommand::QueueDrop { delay_secs: Some(30) })
        );
        assert_eq!(
            d.dispatch("!queuedrop 15s", &bob, false),
            Some(GameCommand::QueueDrop { delay_secs: Some(15) })
        );
        assert_eq!(
            d.dispatch("!queuedrop soon", &bob, false),
            Some(GameCommand::QueueDrop { delay_secs: None })
        );
        assert_eq!(
            d.dispatch("!queuedrop", &bob, false),
            Some(GameCommand::QueueDrop { delay_secs: None })
        );
    }

    #[test]
    fn clearscores_lowercases_names() {
        let d = dispatcher();
        let bob = moderator("bob", 2);
        assert_eq!(
            d.dispatch("!clearscores Alice  CAROL", &bob, false),
            Some(GameCommand::ClearScores {
                usernames: Some(vec!["alice".into(), "carol".into()])
            })
        );
        assert_eq!(
            d.dispatch("!clearscores", &bob, false),
            Some(GameCommand::ClearScores { usernames: None })
        );
    }

    #[test]
    fn personal_commands_carry_the_caller() {
        let d = dispatcher();
        let alice = chatter("alice", 1);
        assert_eq!(
            d.dispatch("!dropstats", &alice, false),
            Some(GameCommand::DropStats {
                username: "alice".into()
            })
        );
        assert_eq!(
            d.dispatch("!commands", &alice, false),
            Some(GameCommand::Help {
                username: "alice".into()
            })
        );
    }
}
