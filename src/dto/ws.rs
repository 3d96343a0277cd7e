use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dto::session::{LeaderboardEntry, ParticipantSummary, QuestionView, SessionSummary};
use crate::dto::validation::validate_game_code;
use crate::session::model::GameSettings;

/// Commands accepted from game WebSocket clients.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Teacher opens a new session for a quiz.
    CreateGame {
        /// Quiz to play.
        quiz_id: Uuid,
        /// Hosting teacher.
        teacher_id: Uuid,
        /// Class the session is for.
        class_id: Uuid,
        /// Display configuration; defaults apply when omitted.
        #[serde(default)]
        settings: GameSettings,
    },
    /// Student joins the lobby with the code on the board.
    JoinGame {
        /// Six-digit join code.
        game_code: String,
        /// Joining user.
        user_id: Uuid,
    },
    /// Student leaves the session.
    LeaveGame {
        /// Session to leave.
        session_id: Uuid,
        /// Leaving user.
        user_id: Uuid,
    },
    /// Teacher removes a student from the roster.
    KickParticipant {
        /// Session to mutate.
        session_id: Uuid,
        /// Student being removed.
        user_id: Uuid,
        /// Caller; must be the hosting teacher.
        teacher_id: Uuid,
    },
    /// Teacher starts the quiz.
    StartGame {
        /// Session to start.
        session_id: Uuid,
        /// Caller; must be the hosting teacher.
        teacher_id: Uuid,
    },
    /// Teacher advances to the next question.
    NextQuestion {
        /// Session to advance.
        session_id: Uuid,
        /// Caller; must be the hosting teacher.
        teacher_id: Uuid,
    },
    /// Student submits an answer for a question.
    SubmitAnswer {
        /// Session being played.
        session_id: Uuid,
        /// Answering user.
        user_id: Uuid,
        /// Question being answered.
        question_id: Uuid,
        /// Free text or an option index.
        answer: AnswerInput,
        /// Client-reported seconds spent.
        time_spent: u32,
    },
    /// Teacher ends the quiz.
    EndGame {
        /// Session to end.
        session_id: Uuid,
        /// Caller; must be the hosting teacher.
        teacher_id: Uuid,
    },
    /// Anything this backend does not understand.
    #[serde(other)]
    Unknown,
}

/// Submitted answer value: clients send either plain text or the numeric
/// index of the chosen option. Both are carried as text downstream.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AnswerInput {
    /// Option index, e.g. `2`.
    Index(u64),
    /// Literal text, e.g. `"Paris"`.
    Text(String),
}

impl fmt::Display for AnswerInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerInput::Index(index) => write!(f, "{index}"),
            AnswerInput::Text(text) => f.write_str(text),
        }
    }
}

/// Parse failure for an inbound text frame.
#[derive(Debug, Error)]
pub enum CommandParseError {
    /// The frame was not valid JSON for any known command.
    #[error("malformed command: {0}")]
    Json(#[from] serde_json::Error),
    /// The command parsed but carried invalid field values.
    #[error("invalid command: {0}")]
    Validation(#[from] ValidationErrors),
}

impl ClientCommand {
    /// Parse and validate a raw text frame from a client connection.
    pub fn from_json_str(raw: &str) -> Result<Self, CommandParseError> {
        let command: Self = serde_json::from_str(raw)?;
        command.validate()?;
        Ok(command)
    }
}

impl Validate for ClientCommand {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self {
            ClientCommand::JoinGame { game_code, .. } => {
                if let Err(e) = validate_game_code(game_code) {
                    errors.add("game_code", e);
                }
            }
            ClientCommand::CreateGame { settings, .. } => {
                if settings.time_per_question == Some(0) {
                    let mut e = ValidationError::new("time_per_question");
                    e.message = Some("Time per question must be strictly positive".into());
                    errors.add("settings", e);
                }
            }
            _ => {}
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Direct replies sent only to the connection that issued a command.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerReply {
    /// Session opened; share the code with the class.
    GameCreated {
        /// New session id.
        session_id: Uuid,
        /// Join code.
        game_code: String,
    },
    /// Join succeeded; full current session state for the new participant.
    GameJoined {
        /// Session snapshot.
        session: SessionSummary,
    },
    /// Graded feedback for the submitting student only.
    AnswerResult {
        /// Question that was answered.
        question_id: Uuid,
        /// Whether the submission was correct.
        is_correct: bool,
        /// Points awarded, including any speed bonus.
        points: u32,
    },
    /// Generic success acknowledgement.
    Ok,
    /// The command failed; `message` is safe to show to the user.
    Error {
        /// Human-readable failure reason.
        message: String,
    },
}

/// State-delta events fanned out to every connection of a session.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// A student entered the lobby.
    ParticipantJoined {
        /// The new roster entry.
        participant: ParticipantSummary,
    },
    /// A student left (or was cleaned up after a disconnect).
    ParticipantLeft {
        /// The departed user.
        user_id: Uuid,
    },
    /// The teacher removed a student.
    ParticipantKicked {
        /// The removed user.
        user_id: Uuid,
    },
    /// The quiz started.
    GameStarted {
        /// Session that started.
        session_id: Uuid,
        /// RFC3339 start timestamp.
        started_at: String,
    },
    /// A new question is in play (also emitted for question 0 on start).
    QuestionChanged {
        /// The stripped question, with progress counters.
        question: QuestionView,
    },
    /// A participant answered the current question. Carries no content so
    /// other students learn nothing about the answer itself.
    AnswerSubmitted {
        /// Who answered.
        user_id: Uuid,
        /// Which question.
        question_id: Uuid,
    },
    /// Fresh ranking after a recorded answer.
    LeaderboardUpdated {
        /// Full ranked list, dense from rank 1.
        leaderboard: Vec<LeaderboardEntry>,
    },
    /// The quiz ended; final standings attached.
    GameEnded {
        /// Final ranked list.
        leaderboard: Vec<LeaderboardEntry>,
    },
}
