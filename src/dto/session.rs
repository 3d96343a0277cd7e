use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::directory::Question;
use crate::dto::format_system_time;
use crate::session::model::{Answer, GameSettings, Participant, Session};
use crate::session::status::SessionStatus;

/// Public projection of a session shared with every participant.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: Uuid,
    /// Quiz being played.
    pub quiz_id: Uuid,
    /// Hosting teacher.
    pub teacher_id: Uuid,
    /// Class the session was opened for.
    pub class_id: Uuid,
    /// Join code, six digits.
    pub game_code: String,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Index of the question currently in play.
    pub current_question_index: usize,
    /// Roster in join order.
    pub participants: Vec<ParticipantSummary>,
    /// Display configuration.
    pub settings: GameSettings,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 start timestamp, once started.
    pub started_at: Option<String>,
    /// RFC3339 completion timestamp, once completed.
    pub completed_at: Option<String>,
}

/// Public projection of a roster entry. Never exposes answer contents.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantSummary {
    /// Platform user id.
    pub user_id: Uuid,
    /// Display name.
    pub user_name: String,
    /// Optional avatar.
    pub avatar_url: Option<String>,
    /// Current score.
    pub score: u32,
    /// Number of questions answered so far.
    pub answer_count: usize,
    /// RFC3339 join timestamp.
    pub joined_at: String,
}

/// A question as clients may see it: the answer key is stripped here and
/// nowhere else, so every outbound path goes through this type.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    /// Question identifier, echoed back in submissions.
    pub question_id: Uuid,
    /// Prompt text.
    pub question_text: String,
    /// Choice options; empty for free-text questions.
    pub options: Vec<String>,
    /// Base points at stake.
    pub points: u32,
    /// Effective time limit in seconds (session override applied).
    pub time_limit: u32,
    /// Zero-based index of this question in the quiz.
    pub question_index: usize,
    /// Total number of questions, for progress display.
    pub total_questions: usize,
}

impl QuestionView {
    /// Build the stripped view of `question` at `index` of `total`.
    pub fn strip(
        question: &Question,
        index: usize,
        total: usize,
        settings: &GameSettings,
    ) -> Self {
        Self {
            question_id: question.id,
            question_text: question.text.clone(),
            options: question.options.clone(),
            points: question.points,
            time_limit: settings.time_per_question.unwrap_or(question.time_limit),
            question_index: index,
            total_questions: total,
        }
    }
}

/// One row of the ranked leaderboard.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// 1-based rank after a stable sort by descending score.
    pub rank: u32,
    /// Platform user id.
    pub user_id: Uuid,
    /// Display name.
    pub user_name: String,
    /// Optional avatar.
    pub avatar_url: Option<String>,
    /// Score the rank was computed from.
    pub score: u32,
}

/// Per-answer line of a finished participant's result sheet.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerSummary {
    /// Question answered.
    pub question_id: Uuid,
    /// Raw submitted value.
    pub answer: String,
    /// Whether it was graded correct.
    pub is_correct: bool,
    /// Client-reported seconds spent.
    pub time_spent: u32,
    /// Points awarded.
    pub points: u32,
}

/// Full result sheet for one participant of a completed session.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantResult {
    /// Platform user id.
    pub user_id: Uuid,
    /// Display name.
    pub user_name: String,
    /// Optional avatar.
    pub avatar_url: Option<String>,
    /// Final score.
    pub score: u32,
    /// All recorded answers in submission order.
    pub answers: Vec<AnswerSummary>,
}

/// Export view of a completed session, served by the REST facade.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResults {
    /// Session identifier.
    pub session_id: Uuid,
    /// Quiz that was played.
    pub quiz_id: Uuid,
    /// Quiz title, for report headers.
    pub quiz_title: String,
    /// RFC3339 completion timestamp.
    pub completed_at: Option<String>,
    /// Final ranked leaderboard.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Per-participant result sheets.
    pub participants: Vec<ParticipantResult>,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id,
            user_name: participant.user_name.clone(),
            avatar_url: participant.avatar_url.clone(),
            score: participant.score,
            answer_count: participant.answers.len(),
            joined_at: format_system_time(participant.joined_at),
        }
    }
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            quiz_id: session.quiz_id,
            teacher_id: session.teacher_id,
            class_id: session.class_id,
            game_code: session.game_code.as_str().to_owned(),
            status: session.status,
            current_question_index: session.current_question_index,
            participants: session.participants.values().map(Into::into).collect(),
            settings: session.settings.clone(),
            created_at: format_system_time(session.created_at),
            started_at: session.started_at.map(format_system_time),
            completed_at: session.completed_at.map(format_system_time),
        }
    }
}

impl From<&Answer> for AnswerSummary {
    fn from(answer: &Answer) -> Self {
        Self {
            question_id: answer.question_id,
            answer: answer.answer.clone(),
            is_correct: answer.is_correct,
            time_spent: answer.time_spent,
            points: answer.points,
        }
    }
}

impl From<&Participant> for ParticipantResult {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id,
            user_name: participant.user_name.clone(),
            avatar_url: participant.avatar_url.clone(),
            score: participant.score,
            answers: participant.answers.values().map(Into::into).collect(),
        }
    }
}
