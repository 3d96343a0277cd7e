//! The game session manager: every state-changing operation of a live quiz
//! session, funneled through the session store's atomic `mutate` primitive.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::directory::Quiz;
use crate::dao::session_store::{MutateOutcome, SessionStore, UpdateDecision};
use crate::dto::session::{LeaderboardEntry, QuestionView, SessionResults};
use crate::error::ServiceError;
use crate::session::SharedState;
use crate::session::code::GameCode;
use crate::session::model::{
    Answer, AnswerRecord, GameSettings, Participant, RosterChange, Session,
};
use crate::session::status::{GuardError, SessionStatus};
use crate::services::grading;

/// How many times a lost optimistic write is retried on a fresh read before
/// the operation surfaces as transient.
const MAX_WRITE_ATTEMPTS: u32 = 5;
/// How many game-code draws are attempted before giving up. Collisions are
/// rare (six random digits against the handful of live sessions) but checked,
/// never assumed away.
const MAX_CODE_ATTEMPTS: u32 = 16;

/// Input for [`create_session`].
#[derive(Debug, Clone)]
pub struct CreateSessionInput {
    /// Quiz to play.
    pub quiz_id: Uuid,
    /// Hosting teacher.
    pub teacher_id: Uuid,
    /// Class the session is for.
    pub class_id: Uuid,
    /// Display configuration.
    pub settings: GameSettings,
}

/// Result of [`create_session`].
#[derive(Debug, Clone)]
pub struct CreatedSession {
    /// New session id.
    pub session_id: Uuid,
    /// Allocated join code.
    pub game_code: GameCode,
}

/// Result of a join: the fresh session state plus what actually changed.
#[derive(Debug)]
pub struct JoinedSession {
    /// Session state after the join.
    pub session: Session,
    /// Whether the roster grew or the participant was already present.
    pub change: RosterChange,
}

/// Result of a leave or kick.
#[derive(Debug)]
pub struct RemovalOutcome {
    /// Session state after the removal.
    pub session: Session,
    /// Whether a roster entry was actually removed.
    pub removed: bool,
}

/// Result of [`start_session`]: the active session and its first question.
#[derive(Debug)]
pub struct StartedSession {
    /// Session state after the start.
    pub session: Session,
    /// Stripped view of the question at index 0.
    pub question: QuestionView,
}

/// Input for [`submit_answer`].
#[derive(Debug, Clone)]
pub struct SubmitAnswerInput {
    /// Session being played.
    pub session_id: Uuid,
    /// Answering user.
    pub user_id: Uuid,
    /// Question being answered.
    pub question_id: Uuid,
    /// Submitted value as text.
    pub answer: String,
    /// Client-reported seconds spent.
    pub time_spent: u32,
}

/// Result of [`submit_answer`].
#[derive(Debug)]
pub struct AnswerOutcome {
    /// Session state after the submission.
    pub session: Session,
    /// Question that was answered.
    pub question_id: Uuid,
    /// Grading verdict reported back to the submitting student.
    pub is_correct: bool,
    /// Points awarded (for a duplicate, the originally awarded points).
    pub points: u32,
    /// Whether the answer was recorded or was a duplicate no-op.
    pub record: AnswerRecord,
    /// Whether a recovery roster entry had to be synthesized.
    pub recovered: bool,
}

/// Result of [`complete_session`].
#[derive(Debug)]
pub struct CompletedSession {
    /// Session state after the call.
    pub session: Session,
    /// `false` when the session was already completed (idempotent repeat).
    pub changed: bool,
}

fn session_not_found(session_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("game session `{session_id}` not found"))
}

/// Run `apply` through the store's atomic read-modify-write, retrying a
/// bounded number of times when an optimistic backend loses the write race.
/// This is the only path by which session state changes; it returns the
/// stored state after the call, whether or not anything was written.
async fn mutate_session<F>(
    store: &Arc<dyn SessionStore>,
    session_id: Uuid,
    mut apply: F,
) -> Result<Session, ServiceError>
where
    F: FnMut(&mut Session) -> Result<UpdateDecision, GuardError> + Send,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        match store.mutate(session_id, Box::new(&mut apply)).await? {
            MutateOutcome::Committed(session) | MutateOutcome::Unchanged(session) => {
                return Ok(session);
            }
            MutateOutcome::Rejected(guard) => return Err(guard.into()),
            MutateOutcome::NotFound => return Err(session_not_found(session_id)),
            MutateOutcome::Conflict => {
                warn!(session_id = %session_id, attempt, "session write conflict; retrying");
            }
        }
    }
    Err(ServiceError::Transient)
}

async fn require_quiz(state: &SharedState, quiz_id: Uuid) -> Result<Quiz, ServiceError> {
    let quiz = state.quizzes().get_quiz(quiz_id).await?;
    quiz.ok_or_else(|| ServiceError::NotFound(format!("quiz `{quiz_id}` not found")))
}

/// Open a new session: allocate a unique live game code and persist the
/// waiting session with an empty roster.
pub async fn create_session(
    state: &SharedState,
    input: CreateSessionInput,
) -> Result<CreatedSession, ServiceError> {
    let store = state.require_session_store().await?;

    let quiz = require_quiz(state, input.quiz_id).await?;
    if quiz.questions.is_empty() {
        return Err(ServiceError::InvalidInput(
            "cannot host a quiz with no questions".into(),
        ));
    }

    let game_code = allocate_game_code(&store).await?;
    let session = Session::new(
        input.quiz_id,
        input.teacher_id,
        input.class_id,
        game_code.clone(),
        input.settings,
    );
    let session_id = session.id;
    store.insert(session).await?;

    info!(session_id = %session_id, code = %game_code, "game session created");
    Ok(CreatedSession {
        session_id,
        game_code,
    })
}

async fn allocate_game_code(store: &Arc<dyn SessionStore>) -> Result<GameCode, ServiceError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = GameCode::random();
        if store.find_by_code(candidate.clone()).await?.is_none() {
            return Ok(candidate);
        }
        warn!(code = %candidate, "game code already in use by a live session; drawing again");
    }
    Err(ServiceError::Transient)
}

/// Resolve a join code to its live session and add the participant.
pub async fn join_by_code(
    state: &SharedState,
    code: GameCode,
    user_id: Uuid,
) -> Result<JoinedSession, ServiceError> {
    let store = state.require_session_store().await?;
    let Some(session) = store.find_by_code(code.clone()).await? else {
        return Err(ServiceError::NotFound(format!(
            "No live game found for code {code}"
        )));
    };
    add_participant(state, session.id, user_id).await
}

/// Add a participant to the roster, resolving the display profile through
/// the user directory. Idempotent for a user already present (reconnects).
///
/// The append happens inside the atomic mutate, so two concurrent joins for
/// different users are both retained.
pub async fn add_participant(
    state: &SharedState,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<JoinedSession, ServiceError> {
    let store = state.require_session_store().await?;

    let profile = state
        .users()
        .get_user_profile(user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{user_id}` not found")))?;
    let entrant = Participant::new(user_id, profile.display_name(), profile.avatar_url.clone());

    let mut change = RosterChange::Rejoined;
    let session = mutate_session(&store, session_id, |session| {
        change = session.join(entrant.clone())?;
        Ok(match change {
            RosterChange::Joined => UpdateDecision::Commit,
            RosterChange::Rejoined => UpdateDecision::Noop,
        })
    })
    .await?;

    if change == RosterChange::Joined {
        info!(session_id = %session_id, user_id = %user_id, "participant joined");
    }
    Ok(JoinedSession {
        session,
        change,
    })
}

/// Remove a participant. A no-op when absent; allowed in any status since it
/// backs leave, kick, and disconnect cleanup.
pub async fn remove_participant(
    state: &SharedState,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<RemovalOutcome, ServiceError> {
    let store = state.require_session_store().await?;

    let mut removed = false;
    let session = mutate_session(&store, session_id, |session| {
        removed = session.leave(user_id);
        Ok(if removed {
            UpdateDecision::Commit
        } else {
            UpdateDecision::Noop
        })
    })
    .await?;

    if removed {
        info!(session_id = %session_id, user_id = %user_id, "participant removed");
    }
    Ok(RemovalOutcome {
        session,
        removed,
    })
}

/// Host-only removal of a participant.
pub async fn kick_participant(
    state: &SharedState,
    session_id: Uuid,
    user_id: Uuid,
    teacher_id: Uuid,
) -> Result<RemovalOutcome, ServiceError> {
    let store = state.require_session_store().await?;

    let mut removed = false;
    let session = mutate_session(&store, session_id, |session| {
        session.ensure_host(teacher_id)?;
        removed = session.leave(user_id);
        Ok(if removed {
            UpdateDecision::Commit
        } else {
            UpdateDecision::Noop
        })
    })
    .await?;

    if removed {
        info!(session_id = %session_id, user_id = %user_id, "participant kicked by host");
    }
    Ok(RemovalOutcome {
        session,
        removed,
    })
}

/// Start the quiz. The non-empty-roster check runs inside the atomic mutate
/// against the freshest state, so a join racing the start is never lost.
pub async fn start_session(
    state: &SharedState,
    session_id: Uuid,
    teacher_id: Uuid,
) -> Result<StartedSession, ServiceError> {
    let store = state.require_session_store().await?;

    let current = store
        .find(session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;
    let quiz = require_quiz(state, current.quiz_id).await?;

    let session = mutate_session(&store, session_id, |session| {
        session.ensure_host(teacher_id)?;
        session.start()?;
        Ok(UpdateDecision::Commit)
    })
    .await?;

    let question = quiz
        .question_at(session.current_question_index)
        .map(|q| {
            QuestionView::strip(
                q,
                session.current_question_index,
                quiz.questions.len(),
                &session.settings,
            )
        })
        .ok_or_else(|| ServiceError::InvalidInput("quiz has no questions".into()))?;

    info!(session_id = %session_id, participants = session.participants.len(), "game started");
    Ok(StartedSession { session, question })
}

/// Advance to the next question and return its stripped view.
///
/// Two racing advances cannot double-increment: the loser observes an index
/// already past the base it read and adopts the winner's question instead.
pub async fn advance_question(
    state: &SharedState,
    session_id: Uuid,
    teacher_id: Uuid,
) -> Result<QuestionView, ServiceError> {
    let store = state.require_session_store().await?;

    let current = store
        .find(session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;
    let quiz = require_quiz(state, current.quiz_id).await?;
    let total = quiz.questions.len();
    let base = current.current_question_index;

    let session = mutate_session(&store, session_id, |session| {
        session.ensure_host(teacher_id)?;
        session.ensure_active()?;
        if session.current_question_index > base {
            return Ok(UpdateDecision::Noop);
        }
        session.next_question(total)?;
        Ok(UpdateDecision::Commit)
    })
    .await?;

    let index = session.current_question_index;
    let question = quiz
        .question_at(index)
        .ok_or_else(|| ServiceError::NotFound(format!("question {index} missing from quiz")))?;
    Ok(QuestionView::strip(question, index, total, &session.settings))
}

/// Stripped view of the question currently in play, for progress display
/// and reconnecting clients.
pub async fn current_question(
    state: &SharedState,
    session_id: Uuid,
) -> Result<QuestionView, ServiceError> {
    let store = state.require_session_store().await?;
    let session = store
        .find(session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;

    if session.status == SessionStatus::Waiting {
        return Err(GuardError::NotStarted.into());
    }

    let quiz = require_quiz(state, session.quiz_id).await?;
    let index = session.current_question_index;
    let question = quiz
        .question_at(index)
        .ok_or_else(|| ServiceError::NotFound(format!("question {index} missing from quiz")))?;
    Ok(QuestionView::strip(
        question,
        index,
        quiz.questions.len(),
        &session.settings,
    ))
}

/// Grade and record a submitted answer.
///
/// At-most-once per `(user, question)`: a duplicate submission is a silent
/// no-op echoing the originally awarded result. A participant missing from
/// the roster of an active session (reconnect without re-join) gets a
/// synthesized recovery entry instead of a rejection.
pub async fn submit_answer(
    state: &SharedState,
    input: SubmitAnswerInput,
) -> Result<AnswerOutcome, ServiceError> {
    let store = state.require_session_store().await?;

    let current = store
        .find(input.session_id)
        .await?
        .ok_or_else(|| session_not_found(input.session_id))?;

    let quiz = require_quiz(state, current.quiz_id).await?;
    let question = quiz.question(input.question_id).ok_or_else(|| {
        ServiceError::NotFound(format!(
            "question `{}` is not part of this quiz",
            input.question_id
        ))
    })?;

    let is_correct = grading::is_correct(question, &input.answer);
    let points = grading::score(question, &current.settings, is_correct, input.time_spent);
    let graded = Answer {
        question_id: input.question_id,
        answer: input.answer.clone(),
        is_correct,
        time_spent: input.time_spent,
        points,
    };

    // The mutation closure must stay synchronous, so the recovery display
    // name is resolved up front when the roster read suggests it is needed.
    let recovery_name = if current.participants.contains_key(&input.user_id) {
        None
    } else {
        Some(recovery_display_name(state, input.user_id).await)
    };

    let mut recovered = false;
    let mut record = AnswerRecord::Duplicate;
    let session = mutate_session(&store, input.session_id, |session| {
        session.ensure_active()?;

        recovered = !session.participants.contains_key(&input.user_id);
        if recovered {
            let name = recovery_name
                .clone()
                .unwrap_or_else(|| placeholder_name(input.user_id));
            session
                .participants
                .insert(input.user_id, Participant::new(input.user_id, name, None));
        }

        record = session.record_answer(input.user_id, graded.clone());
        Ok(match record {
            AnswerRecord::Recorded => UpdateDecision::Commit,
            AnswerRecord::Duplicate => UpdateDecision::Noop,
        })
    })
    .await?;

    if recovered {
        warn!(
            session_id = %input.session_id,
            user_id = %input.user_id,
            "answer from a user missing in the roster; synthesized a recovery entry"
        );
    }

    // A duplicate echoes what was originally recorded, never the re-grade.
    let (is_correct, points) = match record {
        AnswerRecord::Recorded => (is_correct, points),
        AnswerRecord::Duplicate => session
            .participants
            .get(&input.user_id)
            .and_then(|p| p.answers.get(&input.question_id))
            .map(|a| (a.is_correct, a.points))
            .unwrap_or((is_correct, 0)),
    };

    Ok(AnswerOutcome {
        session,
        question_id: input.question_id,
        is_correct,
        points,
        record,
        recovered,
    })
}

async fn recovery_display_name(state: &SharedState, user_id: Uuid) -> String {
    match state.users().get_user_profile(user_id).await {
        Ok(Some(profile)) => profile.display_name(),
        Ok(None) => placeholder_name(user_id),
        Err(err) => {
            warn!(user_id = %user_id, error = %err, "user lookup failed; using placeholder name");
            placeholder_name(user_id)
        }
    }
}

fn placeholder_name(user_id: Uuid) -> String {
    let short = &user_id.simple().to_string()[..6];
    format!("Player-{short}")
}

/// End the quiz. Repeat calls are no-ops that never rewrite `completed_at`.
pub async fn complete_session(
    state: &SharedState,
    session_id: Uuid,
    teacher_id: Uuid,
) -> Result<CompletedSession, ServiceError> {
    let store = state.require_session_store().await?;

    let mut changed = false;
    let session = mutate_session(&store, session_id, |session| {
        session.ensure_host(teacher_id)?;
        changed = session.complete()?;
        Ok(if changed {
            UpdateDecision::Commit
        } else {
            UpdateDecision::Noop
        })
    })
    .await?;

    if changed {
        info!(session_id = %session_id, "game ended");
    }
    Ok(CompletedSession {
        session,
        changed,
    })
}

/// Grade an answer without touching any session state.
pub async fn validate_answer(
    state: &SharedState,
    quiz_id: Uuid,
    question_id: Uuid,
    answer: &str,
) -> Result<bool, ServiceError> {
    let quiz = require_quiz(state, quiz_id).await?;
    let question = quiz.question(question_id).ok_or_else(|| {
        ServiceError::NotFound(format!("question `{question_id}` is not part of this quiz"))
    })?;
    Ok(grading::is_correct(question, answer))
}

/// Point lookup for the REST facade.
pub async fn get_session(state: &SharedState, session_id: Uuid) -> Result<Session, ServiceError> {
    let store = state.require_session_store().await?;
    store
        .find(session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))
}

/// Result/export view of a completed session.
pub async fn session_results(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionResults, ServiceError> {
    let session = get_session(state, session_id).await?;
    if session.status != SessionStatus::Completed {
        return Err(ServiceError::InvalidState(
            "Results are only available once the game has ended".into(),
        ));
    }
    let quiz = require_quiz(state, session.quiz_id).await?;

    Ok(SessionResults {
        session_id: session.id,
        quiz_id: session.quiz_id,
        quiz_title: quiz.title,
        completed_at: session.completed_at.map(crate::dto::format_system_time),
        leaderboard: leaderboard(&session),
        participants: session.participants.values().map(Into::into).collect(),
    })
}

/// Ranked view of the roster: stable sort by descending score, ties broken
/// by join order, 1-based positional ranks. Recomputed on demand, never
/// persisted.
pub fn leaderboard(session: &Session) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&Participant> = session.participants.values().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
        .into_iter()
        .enumerate()
        .map(|(position, participant)| LeaderboardEntry {
            rank: position as u32 + 1,
            user_id: participant.user_id,
            user_name: participant.user_name.clone(),
            avatar_url: participant.avatar_url.clone(),
            score: participant.score,
        })
        .collect()
}
