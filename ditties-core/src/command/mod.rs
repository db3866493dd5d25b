//! Command Interpreter: transcribed text and intents → one playback action.
//!
//! | Text (case-insensitive, trimmed) | Action |
//! |----------------------------------|--------|
//! | `i'm <name>`                     | greet `<name>` |
//! | `play next`                      | skip |
//! | `play <search>`                  | enqueue best fuzzy title match among ready songs |
//! | `what song is this`              | report the current song |
//! | anything else                    | "didn't understand" |
//!
//! When the text matches no rule but a `play_song` intent carries a `song`
//! or `search_query` slot, the slot is searched as if `play <slot>` was said.

pub mod fuzzy;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{Song, SongCatalog};
use crate::playback::PlaybackWorker;
use crate::transcribe::Utterance;
use fuzzy::{best_match, LevenshteinRatio, SimilarityScorer};

pub const PLAY_SONG_INTENT: &str = "play_song";
pub const NOT_UNDERSTOOD_REPLY: &str = "I'm sorry, I didn't understand that!";

/// What a recognised command asks the playback side to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Action {
    Greet { name: String },
    Skip,
    Enqueue { song: Song },
    ReportCurrentSong { title: Option<String> },
    NotUnderstood,
    /// A `play` request whose search found nothing. Deliberately silent.
    NoMatch { query: String },
}

impl Action {
    /// Same tag the serialised form carries in `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Greet { .. } => "greet",
            Action::Skip => "skip",
            Action::Enqueue { .. } => "enqueue",
            Action::ReportCurrentSong { .. } => "reportCurrentSong",
            Action::NotUnderstood => "notUnderstood",
            Action::NoMatch { .. } => "noMatch",
        }
    }

    /// Phrase to announce for this action, if any, assuming it succeeds.
    /// [`Action::execute`] returns what was actually said.
    pub fn reply(&self, bot_name: &str) -> Option<String> {
        match self {
            Action::Greet { name } => Some(format!("Hello {name}, I'm {bot_name}.")),
            Action::Enqueue { song } => Some(format!(
                "I have added your song, {} to the queue",
                song.title
            )),
            Action::ReportCurrentSong { title: Some(title) } => {
                Some(format!("I am currently playing {title}"))
            }
            Action::ReportCurrentSong { title: None } => {
                Some("I'm not playing anything right now".to_string())
            }
            Action::NotUnderstood => Some(NOT_UNDERSTOOD_REPLY.to_string()),
            Action::Skip | Action::NoMatch { .. } => None,
        }
    }

    /// Carry the action out against the playback worker and announce the
    /// outcome. Returns the phrase that was queued for announcement.
    pub fn execute(&self, playback: &PlaybackWorker, bot_name: &str) -> Option<String> {
        let reply = match self {
            Action::Skip => {
                playback.try_skip();
                None
            }
            Action::Enqueue { song } => {
                if playback.enqueue(song.id.clone()) {
                    info!(id = %song.id, title = %song.title, "voice request queued");
                    self.reply(bot_name)
                } else {
                    info!(id = %song.id, title = %song.title, "voice request already queued");
                    Some(format!("{} is already queued", song.title))
                }
            }
            Action::NoMatch { query } => {
                debug!(query = %query, "no ready song matched");
                None
            }
            _ => self.reply(bot_name),
        };
        if let Some(reply) = &reply {
            playback.say(reply.clone());
        }
        reply
    }
}

/// Maps utterances to actions using the catalog for song search.
pub struct CommandInterpreter {
    catalog: Arc<dyn SongCatalog>,
    scorer: Box<dyn SimilarityScorer>,
}

impl CommandInterpreter {
    pub fn new(catalog: Arc<dyn SongCatalog>) -> Self {
        Self::with_scorer(catalog, Box::new(LevenshteinRatio))
    }

    pub fn with_scorer(catalog: Arc<dyn SongCatalog>, scorer: Box<dyn SimilarityScorer>) -> Self {
        Self { catalog, scorer }
    }

    /// Interpret one utterance. `now_playing` answers "what song is this".
    pub fn interpret(&self, utterance: &Utterance, now_playing: Option<&Song>) -> Action {
        let normalized = utterance.text.trim().replace('\u{2019}', "'");
        let text = normalized.as_str();

        if let Some(name) = strip_prefix_ci(text, "i'm ") {
            return Action::Greet {
                name: name.trim().to_string(),
            };
        }

        if let Some(search) = strip_prefix_ci(text, "play ") {
            let search = search.trim();
            if search.eq_ignore_ascii_case("next") {
                return Action::Skip;
            }
            return self.search(search);
        }

        if text.eq_ignore_ascii_case("what song is this") {
            return Action::ReportCurrentSong {
                title: now_playing.map(|s| s.title.clone()),
            };
        }

        if let Some(slot) = utterance.intent(PLAY_SONG_INTENT).and_then(|i| {
            i.slots
                .get("song")
                .or_else(|| i.slots.get("search_query"))
        }) {
            debug!(slot = %slot, "falling back to play_song intent");
            return self.search(slot);
        }

        Action::NotUnderstood
    }

    fn search(&self, query: &str) -> Action {
        let ready = self.catalog.ready_songs();
        match best_match(self.scorer.as_ref(), &ready, query) {
            Some((song, score)) => {
                debug!(title = %song.title, score, "best song match");
                Action::Enqueue { song: song.clone() }
            }
            None => Action::NoMatch {
                query: query.to_string(),
            },
        }
    }
}

/// ASCII case-insensitive `strip_prefix`.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}
