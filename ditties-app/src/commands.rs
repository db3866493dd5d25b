//! Chat command surface.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `<prefix> start` | ensure playback is running |
//! | `<prefix> skip` | skip the current song |
//! | `<prefix> stop` | stop playback and wait for it |
//! | `<prefix> info` | "Now playing <title> - <url>" |
//! | `<prefix> play <url>` | record a user request and queue it |
//! | `<prefix> say <text>` | announce `<text>` |
//!
//! Matching is case-sensitive, like the rest of the chat bot.

use ditties_core::SongCatalog;
use tracing::{debug, info};

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    Skip,
    Stop,
    Info,
    Play(String),
    Say(String),
    /// Prefixed but not a known command.
    Unknown(String),
}

impl ChatCommand {
    /// `None` when the line is not addressed to the bot.
    pub fn parse(prefix: &str, line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(prefix)?;
        // "!ddplay" is not a command.
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim();
        let (word, arg) = match rest.split_once(char::is_whitespace) {
            Some((w, a)) => (w, a.trim()),
            None => (rest, ""),
        };
        Some(match (word, arg) {
            ("start", _) => Self::Start,
            ("skip", _) => Self::Skip,
            ("stop", _) => Self::Stop,
            ("info", _) => Self::Info,
            ("play", url) if !url.is_empty() => Self::Play(url.to_string()),
            ("say", text) if !text.is_empty() => Self::Say(text.to_string()),
            _ => Self::Unknown(rest.to_string()),
        })
    }
}

/// Execute `command` on behalf of `author` and return the chat reply.
pub async fn handle(state: &AppState, command: ChatCommand, author: &str) -> anyhow::Result<Option<String>> {
    debug!(?command, author, "chat command");
    let reply = match command {
        ChatCommand::Start => {
            if state.playback.try_ensure_started() {
                info!(author, "playback started from chat");
            }
            None
        }
        ChatCommand::Skip => {
            state.playback.try_skip();
            None
        }
        ChatCommand::Stop => {
            state.playback.stop().await;
            None
        }
        ChatCommand::Info => Some(match state.playback.current_song() {
            Some(song) => format!("Now playing {} - {}", song.title, song.url),
            None => "Nothing is playing right now".to_string(),
        }),
        ChatCommand::Play(url) => {
            let song = state.catalog.add_user_request(&url, author).await?;
            state.playback.enqueue(song.id);
            Some("The song has been added to the queue".to_string())
        }
        ChatCommand::Say(text) => {
            state.playback.say(text);
            None
        }
        ChatCommand::Unknown(rest) => Some(format!(
            "Unknown command {rest:?}. Try start, skip, stop, info, play <url> or say <text>"
        )),
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use ditties_core::{MemoryCatalog, PlaybackConfig, PlaybackWorker, Song, SongId};

    use crate::player::SimulatedSink;
    use crate::settings::AppSettings;

    fn state() -> AppState {
        let catalog = Arc::new(
            MemoryCatalog::new(vec![Song::new("1", "All Star", "https://x/1")])
                .ready_on_request(true),
        );
        let playback = Arc::new(PlaybackWorker::new(
            PlaybackConfig {
                autoplay: false,
                pending_poll_interval: Duration::from_millis(10),
            },
            catalog.clone(),
            Arc::new(SimulatedSink::new(Duration::from_secs(60))),
        ));
        AppState::new(AppSettings::default(), catalog, playback)
    }

    #[test]
    fn parses_prefixed_commands_case_sensitively() {
        assert_eq!(ChatCommand::parse("!dd", "!dd start"), Some(ChatCommand::Start));
        assert_eq!(
            ChatCommand::parse("!dd", "  !dd play https://y/2 "),
            Some(ChatCommand::Play("https://y/2".into()))
        );
        assert_eq!(
            ChatCommand::parse("!dd", "!dd say hello all"),
            Some(ChatCommand::Say("hello all".into()))
        );
        assert_eq!(
            ChatCommand::parse("!dd", "!dd START"),
            Some(ChatCommand::Unknown("START".into()))
        );
        assert_eq!(ChatCommand::parse("!dd", "!DD start"), None);
        assert_eq!(ChatCommand::parse("!dd", "!ddstart"), None);
        assert_eq!(ChatCommand::parse("!dd", "hello"), None);
    }

    #[tokio::test]
    async fn play_records_request_and_queues_it() {
        let state = state();
        let cmd = ChatCommand::parse("!dd", "!dd play https://y/2").unwrap();
        let reply = handle(&state, cmd, "carol").await.unwrap();
        assert_eq!(reply.as_deref(), Some("The song has been added to the queue"));
        assert_eq!(state.playback.queue_snapshot(), vec![SongId::from("req-1")]);
        let song = state.catalog.get(&SongId::from("req-1")).unwrap();
        assert_eq!(song.requested_by.as_deref(), Some("carol"));
    }

    #[tokio::test]
    async fn info_reports_the_current_song() {
        let state = state();
        state.playback.enqueue(SongId::from("1"));
        handle(&state, ChatCommand::Start, "carol").await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while state.playback.current_song().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let reply = handle(&state, ChatCommand::Info, "carol").await.unwrap();
        assert_eq!(reply.as_deref(), Some("Now playing All Star - https://x/1"));

        handle(&state, ChatCommand::Stop, "carol").await.unwrap();
        assert!(state.playback.current_song().is_none());
    }

    #[tokio::test]
    async fn play_rejects_non_urls() {
        let state = state();
        let err = handle(&state, ChatCommand::Play("all star".into()), "carol").await;
        assert!(err.is_err());
        assert!(state.playback.queue_snapshot().is_empty());
    }
}
