use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle states of a game session.
///
/// The machine is linear: `waiting -> active -> completed`. There is no way
/// back and no way to skip `active`. Once `completed` the session is
/// read-only and only historical reads may touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Lobby phase: participants can join, the quiz has not started.
    Waiting,
    /// The quiz is running; answers are accepted for the current question.
    Active,
    /// The quiz has ended; the session is frozen for historical reads.
    Completed,
}

/// Events that move a session through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Teacher starts the quiz from the lobby.
    Start,
    /// Teacher ends the quiz.
    Complete,
}

/// Reasons the lifecycle guard refuses a mutation.
///
/// Messages are surfaced verbatim to clients, so they are phrased for
/// humans rather than for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Operation requires an active game but the session is still waiting.
    #[error("This game has not started yet")]
    NotStarted,
    /// Operation requires the lobby phase but the game is already running.
    #[error("This game has already started")]
    AlreadyStarted,
    /// The session is completed and therefore read-only.
    #[error("This game has already ended")]
    AlreadyCompleted,
    /// A game cannot start with an empty roster.
    #[error("Cannot start a game with no participants")]
    NoParticipants,
    /// The question index is already at the last question of the quiz.
    #[error("There are no more questions in this quiz")]
    NoMoreQuestions,
    /// The caller is not the teacher hosting this session.
    #[error("Only the hosting teacher can do that")]
    NotHost,
}

impl SessionStatus {
    /// Compute the next state for `event`, or the reason the transition is
    /// illegal. This is the single transition table; every lifecycle write
    /// goes through it.
    pub fn advance(self, event: LifecycleEvent) -> Result<SessionStatus, GuardError> {
        match (self, event) {
            (SessionStatus::Waiting, LifecycleEvent::Start) => Ok(SessionStatus::Active),
            (SessionStatus::Active, LifecycleEvent::Complete) => Ok(SessionStatus::Completed),
            (SessionStatus::Waiting, LifecycleEvent::Complete) => Err(GuardError::NotStarted),
            (SessionStatus::Active, LifecycleEvent::Start) => Err(GuardError::AlreadyStarted),
            (SessionStatus::Completed, _) => Err(GuardError::AlreadyCompleted),
        }
    }

    /// Whether a `game_code` lookup should still resolve to this session.
    pub fn is_live(self) -> bool {
        matches!(self, SessionStatus::Waiting | SessionStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let status = SessionStatus::Waiting;
        let status = status.advance(LifecycleEvent::Start).unwrap();
        assert_eq!(status, SessionStatus::Active);
        let status = status.advance(LifecycleEvent::Complete).unwrap();
        assert_eq!(status, SessionStatus::Completed);
    }

    #[test]
    fn cannot_skip_active() {
        let err = SessionStatus::Waiting
            .advance(LifecycleEvent::Complete)
            .unwrap_err();
        assert_eq!(err, GuardError::NotStarted);
    }

    #[test]
    fn cannot_start_twice() {
        let err = SessionStatus::Active
            .advance(LifecycleEvent::Start)
            .unwrap_err();
        assert_eq!(err, GuardError::AlreadyStarted);
    }

    #[test]
    fn completed_is_terminal() {
        for event in [LifecycleEvent::Start, LifecycleEvent::Complete] {
            let err = SessionStatus::Completed.advance(event).unwrap_err();
            assert_eq!(err, GuardError::AlreadyCompleted);
        }
    }

    #[test]
    fn liveness_matches_code_index_contract() {
        assert!(SessionStatus::Waiting.is_live());
        assert!(SessionStatus::Active.is_live());
        assert!(!SessionStatus::Completed.is_live());
    }
}
