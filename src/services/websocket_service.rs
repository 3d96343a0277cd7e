//! Realtime gateway: one WebSocket per client, commands in, acks back to the
//! originating connection, state-delta events fanned out to the session's
//! channel. A failed operation only ever answers the caller; it never
//! broadcasts.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientCommand, ServerReply},
    error::ServiceError,
    services::{
        events,
        session_service::{self, CreateSessionInput, SubmitAnswerInput},
    },
    session::SharedState,
    session::code::GameCode,
    session::model::{AnswerRecord, RosterChange},
};

/// Connection-local association with a session channel.
///
/// `participant` is set for joined students only; it is what disconnect
/// cleanup uses to mirror an explicit leave. Teacher connections subscribe
/// without a participant entry.
struct Binding {
    session_id: Uuid,
    participant: Option<Uuid>,
    forwarder: JoinHandle<()>,
}

/// Handle the full lifecycle of one client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps broadcasts flowing even while we await
    // inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut binding: Option<Binding> = None;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientCommand::from_json_str(&text) {
                Ok(command) => {
                    handle_command(&state, &outbound_tx, &mut binding, command).await;
                }
                Err(err) => {
                    warn!(error = %err, "failed to parse or validate client command");
                    send_reply(
                        &outbound_tx,
                        &ServerReply::Error {
                            message: err.to_string(),
                        },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(error = %err, "websocket error");
                break;
            }
        }
    }

    if let Some(binding) = binding.take() {
        disconnect_cleanup(&state, binding).await;
    }

    finalize(writer_task, outbound_tx).await;
}

/// Dispatch one parsed command: call the manager, ack the caller, broadcast
/// the resulting state delta.
async fn handle_command(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    binding: &mut Option<Binding>,
    command: ClientCommand,
) {
    match command {
        ClientCommand::CreateGame {
            quiz_id,
            teacher_id,
            class_id,
            settings,
        } => {
            let input = CreateSessionInput {
                quiz_id,
                teacher_id,
                class_id,
                settings,
            };
            match session_service::create_session(state, input).await {
                Ok(created) => {
                    bind(state, outbound_tx, binding, created.session_id, None);
                    send_reply(
                        outbound_tx,
                        &ServerReply::GameCreated {
                            session_id: created.session_id,
                            game_code: created.game_code.to_string(),
                        },
                    );
                }
                Err(err) => send_error(outbound_tx, err),
            }
        }

        ClientCommand::JoinGame { game_code, user_id } => {
            let code: GameCode = match game_code.parse() {
                Ok(code) => code,
                Err(err) => {
                    send_reply(
                        outbound_tx,
                        &ServerReply::Error {
                            message: err.to_string(),
                        },
                    );
                    return;
                }
            };
            match session_service::join_by_code(state, code, user_id).await {
                Ok(joined) => {
                    bind(state, outbound_tx, binding, joined.session.id, Some(user_id));
                    send_reply(
                        outbound_tx,
                        &ServerReply::GameJoined {
                            session: (&joined.session).into(),
                        },
                    );
                    if joined.change == RosterChange::Joined
                        && let Some(participant) = joined.session.participants.get(&user_id)
                    {
                        events::broadcast_participant_joined(
                            state,
                            joined.session.id,
                            participant.into(),
                        );
                    }
                }
                Err(err) => send_error(outbound_tx, err),
            }
        }

        ClientCommand::LeaveGame {
            session_id,
            user_id,
        } => {
            // Broadcast-only command: the leaving client gets no ack.
            match session_service::remove_participant(state, session_id, user_id).await {
                Ok(outcome) if outcome.removed => {
                    events::broadcast_participant_left(state, session_id, user_id);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(session_id = %session_id, user_id = %user_id, error = %err, "leave failed");
                }
            }
            if binding
                .as_ref()
                .is_some_and(|b| b.session_id == session_id && b.participant == Some(user_id))
            {
                unbind(state, binding);
            }
        }

        ClientCommand::KickParticipant {
            session_id,
            user_id,
            teacher_id,
        } => {
            match session_service::kick_participant(state, session_id, user_id, teacher_id).await {
                Ok(outcome) if outcome.removed => {
                    events::broadcast_participant_kicked(state, session_id, user_id);
                }
                Ok(_) => {}
                Err(ServiceError::Unauthorized(_)) => {
                    // Silently ignored, per the command contract.
                    warn!(session_id = %session_id, caller = %teacher_id, "unauthorized kick ignored");
                }
                Err(err) => {
                    warn!(session_id = %session_id, user_id = %user_id, error = %err, "kick failed");
                }
            }
        }

        ClientCommand::StartGame {
            session_id,
            teacher_id,
        } => match session_service::start_session(state, session_id, teacher_id).await {
            Ok(started) => {
                bind(state, outbound_tx, binding, session_id, None);
                send_reply(outbound_tx, &ServerReply::Ok);
                events::broadcast_game_started(state, &started.session);
                // Push question 0 right away so clients need no extra read.
                events::broadcast_question_changed(state, session_id, started.question);
            }
            Err(err) => send_error(outbound_tx, err),
        },

        ClientCommand::NextQuestion {
            session_id,
            teacher_id,
        } => match session_service::advance_question(state, session_id, teacher_id).await {
            Ok(question) => {
                bind(state, outbound_tx, binding, session_id, None);
                events::broadcast_question_changed(state, session_id, question);
            }
            Err(err) => send_error(outbound_tx, err),
        },

        ClientCommand::SubmitAnswer {
            session_id,
            user_id,
            question_id,
            answer,
            time_spent,
        } => {
            let input = SubmitAnswerInput {
                session_id,
                user_id,
                question_id,
                answer: answer.to_string(),
                time_spent,
            };
            match session_service::submit_answer(state, input).await {
                Ok(outcome) => {
                    bind(state, outbound_tx, binding, session_id, Some(user_id));
                    send_reply(
                        outbound_tx,
                        &ServerReply::AnswerResult {
                            question_id: outcome.question_id,
                            is_correct: outcome.is_correct,
                            points: outcome.points,
                        },
                    );
                    if outcome.record == AnswerRecord::Recorded {
                        events::broadcast_answer_submitted(state, session_id, user_id, question_id);
                        events::broadcast_leaderboard(state, &outcome.session);
                    }
                }
                Err(err) => send_error(outbound_tx, err),
            }
        }

        ClientCommand::EndGame {
            session_id,
            teacher_id,
        } => match session_service::complete_session(state, session_id, teacher_id).await {
            Ok(outcome) => {
                send_reply(outbound_tx, &ServerReply::Ok);
                if outcome.changed {
                    events::broadcast_game_ended(state, &outcome.session);
                }
            }
            Err(err) => send_error(outbound_tx, err),
        },

        ClientCommand::Unknown => {
            send_reply(
                outbound_tx,
                &ServerReply::Error {
                    message: "unsupported command".into(),
                },
            );
        }
    }
}

/// Associate this connection with a session channel, spawning the forwarder
/// that pumps broadcast events into the connection's writer. Re-binding to
/// the same session only upgrades the participant association.
fn bind(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    binding: &mut Option<Binding>,
    session_id: Uuid,
    participant: Option<Uuid>,
) {
    if let Some(existing) = binding.as_mut() {
        if existing.session_id == session_id {
            if participant.is_some() {
                existing.participant = participant;
            }
            return;
        }
        existing.forwarder.abort();
        let stale = existing.session_id;
        state.channels().release(stale);
    }

    let forwarder = subscribe_to_session(state, outbound_tx, session_id);
    *binding = Some(Binding {
        session_id,
        participant,
        forwarder,
    });
}

fn unbind(state: &SharedState, binding: &mut Option<Binding>) {
    if let Some(binding) = binding.take() {
        binding.forwarder.abort();
        state.channels().release(binding.session_id);
    }
}

fn subscribe_to_session(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    session_id: Uuid,
) -> JoinHandle<()> {
    let receiver = state.channels().subscribe(session_id);
    let tx = outbound_tx.clone();
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(receiver);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if tx.send(Message::Text(event.data.into())).is_err() {
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(session_id = %session_id, skipped, "connection lagging behind session events");
                }
            }
        }
    })
}

/// A dropped connection of a joined student behaves exactly like an
/// explicit leave: remove from the roster and tell the room.
async fn disconnect_cleanup(state: &SharedState, binding: Binding) {
    binding.forwarder.abort();

    if let Some(user_id) = binding.participant {
        match session_service::remove_participant(state, binding.session_id, user_id).await {
            Ok(outcome) if outcome.removed => {
                info!(
                    session_id = %binding.session_id,
                    user_id = %user_id,
                    "connection dropped; participant removed"
                );
                events::broadcast_participant_left(state, binding.session_id, user_id);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    session_id = %binding.session_id,
                    user_id = %user_id,
                    error = %err,
                    "disconnect cleanup failed"
                );
            }
        }
    }

    state.channels().release(binding.session_id);
}

fn send_reply(tx: &mpsc::UnboundedSender<Message>, reply: &ServerReply) {
    match serde_json::to_string(reply) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => warn!(error = %err, "failed to serialize reply `{reply:?}`"),
    }
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, err: ServiceError) {
    send_reply(
        tx,
        &ServerReply::Error {
            message: err.to_string(),
        },
    );
}

/// Ensure the writer task winds down before we return from the handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{AppConfig, StoreBackend};
    use crate::dao::directory::stub::{StubQuizDirectory, StubUserDirectory};
    use crate::dao::directory::{Question, Quiz, UserProfile};
    use crate::dao::session_store::memory::MemorySessionStore;
    use crate::session::AppState;

    struct Connection {
        tx: mpsc::UnboundedSender<Message>,
        rx: mpsc::UnboundedReceiver<Message>,
        binding: Option<Binding>,
    }

    impl Connection {
        fn open() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                tx,
                rx,
                binding: None,
            }
        }

        async fn send(&mut self, state: &SharedState, raw: &str) {
            let command = ClientCommand::from_json_str(raw).unwrap();
            handle_command(state, &self.tx, &mut self.binding, command).await;
        }

        fn next_json(&mut self) -> serde_json::Value {
            match self.rx.try_recv() {
                Ok(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
                other => panic!("expected a text frame, got {other:?}"),
            }
        }

        fn assert_silent(&mut self) {
            assert!(self.rx.try_recv().is_err(), "expected no frame");
        }
    }

    async fn fixture(users: &[(Uuid, &str)]) -> (SharedState, Uuid) {
        let quiz = Quiz {
            id: Uuid::new_v4(),
            title: "Geography".into(),
            questions: vec![Question {
                id: Uuid::new_v4(),
                text: "Capital of France?".into(),
                options: vec!["London".into(), "Paris".into()],
                correct_answer: "Paris".into(),
                points: 10,
                time_limit: 30,
            }],
        };
        let quiz_id = quiz.id;
        let mut user_dir = StubUserDirectory::new();
        for (user_id, name) in users {
            user_dir = user_dir.with_profile(
                *user_id,
                UserProfile {
                    first_name: (*name).into(),
                    last_name: "Tester".into(),
                    avatar_url: None,
                },
            );
        }
        let state = AppState::new(
            AppConfig {
                port: 0,
                store: StoreBackend::Memory,
                platform_api_url: "http://localhost:3000".into(),
                platform_api_token: None,
                channel_capacity: 16,
            },
            Arc::new(StubQuizDirectory::new().with_quiz(quiz)),
            Arc::new(user_dir),
        );
        state
            .install_session_store(Arc::new(MemorySessionStore::new()))
            .await;
        (state, quiz_id)
    }

    #[tokio::test]
    async fn create_join_flow_acks_the_caller_and_broadcasts_to_the_room() {
        let student = Uuid::new_v4();
        let (state, quiz_id) = fixture(&[(student, "Alice")]).await;
        let teacher_id = Uuid::new_v4();

        let mut host = Connection::open();
        host.send(
            &state,
            &format!(
                r#"{{"type":"create-game","quiz_id":"{quiz_id}","teacher_id":"{teacher_id}","class_id":"{}"}}"#,
                Uuid::new_v4()
            ),
        )
        .await;

        let created = host.next_json();
        assert_eq!(created["type"], "game-created");
        let game_code = created["game_code"].as_str().unwrap().to_owned();
        assert_eq!(game_code.len(), 6);

        let mut joiner = Connection::open();
        joiner
            .send(
                &state,
                &format!(
                    r#"{{"type":"join-game","game_code":"{game_code}","user_id":"{student}"}}"#
                ),
            )
            .await;

        let joined = joiner.next_json();
        assert_eq!(joined["type"], "game-joined");
        assert_eq!(joined["session"]["participants"][0]["user_name"], "Alice Tester");

        // The host's forwarder delivers the roster delta.
        tokio::task::yield_now().await;
        let delta = host.next_json();
        assert_eq!(delta["event"], "participant-joined");
        assert_eq!(delta["participant"]["user_name"], "Alice Tester");
    }

    #[tokio::test]
    async fn failed_commands_ack_the_caller_only_and_never_broadcast() {
        let student = Uuid::new_v4();
        let (state, quiz_id) = fixture(&[(student, "Alice")]).await;
        let teacher_id = Uuid::new_v4();

        let mut host = Connection::open();
        host.send(
            &state,
            &format!(
                r#"{{"type":"create-game","quiz_id":"{quiz_id}","teacher_id":"{teacher_id}","class_id":"{}"}}"#,
                Uuid::new_v4()
            ),
        )
        .await;
        let created = host.next_json();
        let session_id = created["session_id"].as_str().unwrap().to_owned();

        // Starting with an empty roster fails: caller gets the error frame.
        host.send(
            &state,
            &format!(
                r#"{{"type":"start-game","session_id":"{session_id}","teacher_id":"{teacher_id}"}}"#
            ),
        )
        .await;
        let error = host.next_json();
        assert_eq!(error["type"], "error");
        assert!(
            error["message"]
                .as_str()
                .unwrap()
                .contains("no participants")
        );

        // And nothing was fanned out to the room.
        tokio::task::yield_now().await;
        host.assert_silent();
    }

    #[tokio::test]
    async fn unauthorized_kick_is_silently_ignored() {
        let student = Uuid::new_v4();
        let (state, quiz_id) = fixture(&[(student, "Alice")]).await;
        let teacher_id = Uuid::new_v4();

        let mut host = Connection::open();
        host.send(
            &state,
            &format!(
                r#"{{"type":"create-game","quiz_id":"{quiz_id}","teacher_id":"{teacher_id}","class_id":"{}"}}"#,
                Uuid::new_v4()
            ),
        )
        .await;
        let created = host.next_json();
        let session_id = created["session_id"].as_str().unwrap().to_owned();

        let mut joiner = Connection::open();
        let game_code = created["game_code"].as_str().unwrap();
        joiner
            .send(
                &state,
                &format!(
                    r#"{{"type":"join-game","game_code":"{game_code}","user_id":"{student}"}}"#
                ),
            )
            .await;
        joiner.next_json();
        tokio::task::yield_now().await;
        assert_eq!(joiner.next_json()["event"], "participant-joined");

        // A student pretending to be the host gets no reply and no effect.
        joiner
            .send(
                &state,
                &format!(
                    r#"{{"type":"kick-participant","session_id":"{session_id}","user_id":"{student}","teacher_id":"{student}"}}"#
                ),
            )
            .await;
        joiner.assert_silent();

        let session = session_service::get_session(&state, session_id.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(session.participants.len(), 1);
    }

    #[tokio::test]
    async fn answers_ack_with_grades_and_refresh_the_leaderboard() {
        let student = Uuid::new_v4();
        let (state, quiz_id) = fixture(&[(student, "Alice")]).await;
        let teacher_id = Uuid::new_v4();

        let mut host = Connection::open();
        host.send(
            &state,
            &format!(
                r#"{{"type":"create-game","quiz_id":"{quiz_id}","teacher_id":"{teacher_id}","class_id":"{}"}}"#,
                Uuid::new_v4()
            ),
        )
        .await;
        let created = host.next_json();
        let session_id = created["session_id"].as_str().unwrap().to_owned();
        let game_code = created["game_code"].as_str().unwrap().to_owned();

        let mut joiner = Connection::open();
        joiner
            .send(
                &state,
                &format!(
                    r#"{{"type":"join-game","game_code":"{game_code}","user_id":"{student}"}}"#
                ),
            )
            .await;
        let joined = joiner.next_json();
        tokio::task::yield_now().await;
        host.next_json(); // participant-joined

        host.send(
            &state,
            &format!(
                r#"{{"type":"start-game","session_id":"{session_id}","teacher_id":"{teacher_id}"}}"#
            ),
        )
        .await;
        assert_eq!(host.next_json()["type"], "ok");
        tokio::task::yield_now().await;
        assert_eq!(host.next_json()["event"], "game-started");
        let question = host.next_json();
        assert_eq!(question["event"], "question-changed");
        let question_id = question["question"]["question_id"].as_str().unwrap();
        assert_eq!(
            joined["session"]["status"], "waiting",
            "join snapshot predates the start"
        );

        // The joiner's channel carries the same room events; drain them so
        // the next frame is the direct grading reply.
        assert_eq!(joiner.next_json()["event"], "participant-joined");
        assert_eq!(joiner.next_json()["event"], "game-started");
        assert_eq!(joiner.next_json()["event"], "question-changed");

        joiner
            .send(
                &state,
                &format!(
                    r#"{{"type":"submit-answer","session_id":"{session_id}","user_id":"{student}","question_id":"{question_id}","answer":"paris","time_spent":5}}"#
                ),
            )
            .await;
        let result = joiner.next_json();
        assert_eq!(result["type"], "answer-result");
        assert_eq!(result["is_correct"], true);
        assert_eq!(result["points"], 12);

        tokio::task::yield_now().await;
        // The host sees the submission marker and the fresh ranking.
        assert_eq!(host.next_json()["event"], "answer-submitted");
        let board = host.next_json();
        assert_eq!(board["event"], "leaderboard-updated");
        assert_eq!(board["leaderboard"][0]["score"], 12);
        assert_eq!(board["leaderboard"][0]["rank"], 1);
    }
}
