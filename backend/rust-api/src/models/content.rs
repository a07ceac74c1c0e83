use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// The registered content kinds. Each kind is backed by its own collection;
/// there is no unified content table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Document,
    EmbeddedVideo,
    QuizTask,
    Image,
    AudioClip,
    RankingQuestion,
}

impl ContentKind {
    pub const ALL: [ContentKind; 6] = [
        ContentKind::Document,
        ContentKind::EmbeddedVideo,
        ContentKind::QuizTask,
        ContentKind::Image,
        ContentKind::AudioClip,
        ContentKind::RankingQuestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Document => "document",
            ContentKind::EmbeddedVideo => "embedded-video",
            ContentKind::QuizTask => "quiz-task",
            ContentKind::Image => "image",
            ContentKind::AudioClip => "audio-clip",
            ContentKind::RankingQuestion => "ranking-question",
        }
    }

    /// Collaborator-owned collection holding items of this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            ContentKind::Document => "documents",
            ContentKind::EmbeddedVideo => "embedded_videos",
            ContentKind::QuizTask => "quiz_tasks",
            ContentKind::Image => "images",
            ContentKind::AudioClip => "audio_clips",
            ContentKind::RankingQuestion => "ranking_questions",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "document" => Ok(ContentKind::Document),
            "embedded-video" => Ok(ContentKind::EmbeddedVideo),
            "quiz-task" => Ok(ContentKind::QuizTask),
            "image" => Ok(ContentKind::Image),
            "audio-clip" => Ok(ContentKind::AudioClip),
            "ranking-question" => Ok(ContentKind::RankingQuestion),
            _ => Err(format!("Unregistered content kind: {}", value)),
        }
    }
}

/// Polymorphic pointer into the content registry: a type tag plus an item id.
/// Never persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub item_id: Uuid,
}

impl ContentRef {
    pub fn parse(kind: &str, item_id: &str) -> EngineResult<Self> {
        let kind = kind
            .parse::<ContentKind>()
            .map_err(EngineError::InvalidArgument)?;
        let item_id = Uuid::parse_str(item_id).map_err(|_| {
            EngineError::invalid_argument(format!("Malformed content id: {}", item_id))
        })?;
        Ok(ContentRef { kind, item_id })
    }
}
