use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::code::GameCode;
use crate::session::model::{Answer, GameSettings, Participant, Session};
use crate::session::status::SessionStatus;

/// Persistent shape of a session aggregate.
///
/// `revision` is the optimistic-concurrency token: it never leaves the DAO
/// layer and is bumped on every committed mutation so a conditional
/// `replace_one` can detect lost write races.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    quiz_id: Uuid,
    teacher_id: Uuid,
    class_id: Uuid,
    game_code: GameCode,
    status: SessionStatus,
    current_question_index: u32,
    participants: Vec<ParticipantDocument>,
    settings: GameSettings,
    created_at: DateTime,
    started_at: Option<DateTime>,
    completed_at: Option<DateTime>,
    revision: i64,
}

/// Persistent shape of a roster entry; answers stay list-shaped on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDocument {
    user_id: Uuid,
    user_name: String,
    avatar_url: Option<String>,
    joined_at: DateTime,
    score: u32,
    answers: Vec<AnswerDocument>,
}

/// Persistent shape of a graded answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerDocument {
    question_id: Uuid,
    answer: String,
    is_correct: bool,
    time_spent: u32,
    points: u32,
}

impl SessionDocument {
    /// Project a domain session into its persistent shape at `revision`.
    pub fn from_session(session: Session, revision: i64) -> Self {
        Self {
            id: session.id,
            quiz_id: session.quiz_id,
            teacher_id: session.teacher_id,
            class_id: session.class_id,
            game_code: session.game_code,
            status: session.status,
            current_question_index: session.current_question_index as u32,
            participants: session
                .participants
                .into_values()
                .map(Into::into)
                .collect(),
            settings: session.settings,
            created_at: DateTime::from_system_time(session.created_at),
            started_at: session.started_at.map(DateTime::from_system_time),
            completed_at: session.completed_at.map(DateTime::from_system_time),
            revision,
        }
    }

    /// Rebuild the domain session and its concurrency token.
    pub fn into_session(self) -> (Session, i64) {
        let session = Session {
            id: self.id,
            quiz_id: self.quiz_id,
            teacher_id: self.teacher_id,
            class_id: self.class_id,
            game_code: self.game_code,
            status: self.status,
            current_question_index: self.current_question_index as usize,
            participants: self
                .participants
                .into_iter()
                .map(|doc| {
                    let participant: Participant = doc.into();
                    (participant.user_id, participant)
                })
                .collect(),
            settings: self.settings,
            created_at: self.created_at.to_system_time(),
            started_at: self.started_at.map(|at| at.to_system_time()),
            completed_at: self.completed_at.map(|at| at.to_system_time()),
        };
        (session, self.revision)
    }
}

impl From<Participant> for ParticipantDocument {
    fn from(value: Participant) -> Self {
        Self {
            user_id: value.user_id,
            user_name: value.user_name,
            avatar_url: value.avatar_url,
            joined_at: DateTime::from_system_time(value.joined_at),
            score: value.score,
            answers: value.answers.into_values().map(Into::into).collect(),
        }
    }
}

impl From<ParticipantDocument> for Participant {
    fn from(value: ParticipantDocument) -> Self {
        Self {
            user_id: value.user_id,
            user_name: value.user_name,
            avatar_url: value.avatar_url,
            joined_at: value.joined_at.to_system_time(),
            score: value.score,
            answers: value
                .answers
                .into_iter()
                .map(|doc| {
                    let answer: Answer = doc.into();
                    (answer.question_id, answer)
                })
                .collect(),
        }
    }
}

impl From<Answer> for AnswerDocument {
    fn from(value: Answer) -> Self {
        Self {
            question_id: value.question_id,
            answer: value.answer,
            is_correct: value.is_correct,
            time_spent: value.time_spent,
            points: value.points,
        }
    }
}

impl From<AnswerDocument> for Answer {
    fn from(value: AnswerDocument) -> Self {
        Self {
            question_id: value.question_id,
            answer: value.answer,
            is_correct: value.is_correct,
            time_spent: value.time_spent,
            points: value.points,
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
