//! Broadcast constructors: one function per session-scoped event.
//!
//! Serialization happens once per broadcast; every connection subscribed to
//! the session's channel receives the same frame.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::dto::format_system_time;
use crate::dto::session::{LeaderboardEntry, ParticipantSummary, QuestionView};
use crate::dto::ws::SessionEvent;
use crate::session::SharedState;
use crate::session::channels::ChannelEvent;
use crate::session::model::Session;
use crate::services::session_service;

/// Announce a new roster entry.
pub fn broadcast_participant_joined(
    state: &SharedState,
    session_id: Uuid,
    participant: ParticipantSummary,
) {
    send_session_event(
        state,
        session_id,
        &SessionEvent::ParticipantJoined { participant },
    );
}

/// Announce a leave (explicit or disconnect cleanup).
pub fn broadcast_participant_left(state: &SharedState, session_id: Uuid, user_id: Uuid) {
    send_session_event(state, session_id, &SessionEvent::ParticipantLeft { user_id });
}

/// Announce a host-initiated removal.
pub fn broadcast_participant_kicked(state: &SharedState, session_id: Uuid, user_id: Uuid) {
    send_session_event(
        state,
        session_id,
        &SessionEvent::ParticipantKicked { user_id },
    );
}

/// Announce that the quiz started.
pub fn broadcast_game_started(state: &SharedState, session: &Session) {
    let started_at = session
        .started_at
        .map(format_system_time)
        .unwrap_or_default();
    send_session_event(
        state,
        session.id,
        &SessionEvent::GameStarted {
            session_id: session.id,
            started_at,
        },
    );
}

/// Announce the question now in play (including question 0 on start).
pub fn broadcast_question_changed(state: &SharedState, session_id: Uuid, question: QuestionView) {
    send_session_event(
        state,
        session_id,
        &SessionEvent::QuestionChanged { question },
    );
}

/// Announce that a participant answered, without revealing anything about
/// the answer itself.
pub fn broadcast_answer_submitted(
    state: &SharedState,
    session_id: Uuid,
    user_id: Uuid,
    question_id: Uuid,
) {
    send_session_event(
        state,
        session_id,
        &SessionEvent::AnswerSubmitted {
            user_id,
            question_id,
        },
    );
}

/// Recompute and announce the ranked leaderboard.
pub fn broadcast_leaderboard(state: &SharedState, session: &Session) {
    let leaderboard = session_service::leaderboard(session);
    send_session_event(
        state,
        session.id,
        &SessionEvent::LeaderboardUpdated { leaderboard },
    );
}

/// Announce the end of the quiz with final standings.
pub fn broadcast_game_ended(state: &SharedState, session: &Session) {
    let leaderboard: Vec<LeaderboardEntry> = session_service::leaderboard(session);
    send_session_event(state, session.id, &SessionEvent::GameEnded { leaderboard });
}

fn send_session_event(state: &SharedState, session_id: Uuid, event: &impl Serialize) {
    match serde_json::to_string(event) {
        Ok(data) => state.channels().broadcast(session_id, ChannelEvent { data }),
        Err(err) => {
            warn!(session_id = %session_id, error = %err, "failed to serialize session event")
        }
    }
}
