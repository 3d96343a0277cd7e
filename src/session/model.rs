use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::session::code::GameCode;
use crate::session::status::{GuardError, LifecycleEvent, SessionStatus};

/// Display configuration chosen by the teacher when creating a session.
///
/// These are pass-through preferences for clients, except for
/// `time_per_question` which also overrides each question's own limit in the
/// speed-bonus computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GameSettings {
    /// Whether clients should reveal correct answers after each question.
    pub show_answers: bool,
    /// Whether clients should display the live leaderboard.
    pub show_leaderboard: bool,
    /// Optional per-question time limit override, in seconds.
    pub time_per_question: Option<u32>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            show_answers: true,
            show_leaderboard: true,
            time_per_question: None,
        }
    }
}

/// A single graded answer, embedded in a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Question this answer belongs to; unique within a participant.
    pub question_id: Uuid,
    /// Raw submitted value (free text or an option index rendered as text).
    pub answer: String,
    /// Whether the submission matched the stored correct answer.
    pub is_correct: bool,
    /// Client-reported time spent on the question, in seconds.
    pub time_spent: u32,
    /// Points awarded, 0 when incorrect.
    pub points: u32,
}

/// A student in a session's roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Platform user id; unique within the roster.
    pub user_id: Uuid,
    /// Display name resolved at join time.
    pub user_name: String,
    /// Optional avatar shown next to the name.
    pub avatar_url: Option<String>,
    /// When the participant entered the roster.
    pub joined_at: SystemTime,
    /// Running total; always the sum of `answers` points.
    pub score: u32,
    /// Answer log keyed by question id, in submission order.
    pub answers: IndexMap<Uuid, Answer>,
}

impl Participant {
    /// Build a fresh roster entry with a zero score and no answers.
    pub fn new(user_id: Uuid, user_name: String, avatar_url: Option<String>) -> Self {
        Self {
            user_id,
            user_name,
            avatar_url,
            joined_at: SystemTime::now(),
            score: 0,
            answers: IndexMap::new(),
        }
    }
}

/// Outcome of [`Session::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterChange {
    /// The participant was appended to the roster.
    Joined,
    /// The participant was already present; nothing changed.
    Rejoined,
}

/// Outcome of [`Session::record_answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRecord {
    /// The answer was appended and the score updated.
    Recorded,
    /// An answer for this question already existed; nothing changed.
    Duplicate,
}

/// The central aggregate: one live (or historical) game session.
///
/// All mutation happens through the methods below, invoked inside the
/// session store's atomic `mutate` closure so concurrent writers cannot lose
/// each other's updates.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable identifier assigned at creation.
    pub id: Uuid,
    /// Quiz being played; resolved through the quiz directory.
    pub quiz_id: Uuid,
    /// Hosting teacher; the only caller allowed to drive the lifecycle.
    pub teacher_id: Uuid,
    /// Class this session was opened for.
    pub class_id: Uuid,
    /// Join code; unique among live sessions only.
    pub game_code: GameCode,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Index of the question currently in play; meaningful once started.
    pub current_question_index: usize,
    /// Roster keyed by user id, in join order.
    pub participants: IndexMap<Uuid, Participant>,
    /// Display configuration.
    pub settings: GameSettings,
    /// Set once at creation.
    pub created_at: SystemTime,
    /// Set once by [`Session::start`].
    pub started_at: Option<SystemTime>,
    /// Set once by [`Session::complete`].
    pub completed_at: Option<SystemTime>,
}

impl Session {
    /// Build a new `waiting` session with an empty roster.
    pub fn new(
        quiz_id: Uuid,
        teacher_id: Uuid,
        class_id: Uuid,
        game_code: GameCode,
        settings: GameSettings,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            quiz_id,
            teacher_id,
            class_id,
            game_code,
            status: SessionStatus::Waiting,
            current_question_index: 0,
            participants: IndexMap::new(),
            settings,
            created_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Verify that `caller` is the hosting teacher.
    pub fn ensure_host(&self, caller: Uuid) -> Result<(), GuardError> {
        if self.teacher_id == caller {
            Ok(())
        } else {
            Err(GuardError::NotHost)
        }
    }

    /// Verify the session is accepting answers and question advances.
    pub fn ensure_active(&self) -> Result<(), GuardError> {
        match self.status {
            SessionStatus::Waiting => Err(GuardError::NotStarted),
            SessionStatus::Active => Ok(()),
            SessionStatus::Completed => Err(GuardError::AlreadyCompleted),
        }
    }

    /// Add `participant` to the roster.
    ///
    /// A participant already present is left untouched regardless of status,
    /// so a reconnecting client can re-issue its join mid-game. New joins are
    /// only accepted while the session is waiting.
    pub fn join(&mut self, participant: Participant) -> Result<RosterChange, GuardError> {
        if self.participants.contains_key(&participant.user_id) {
            return Ok(RosterChange::Rejoined);
        }
        match self.status {
            SessionStatus::Waiting => {
                self.participants.insert(participant.user_id, participant);
                Ok(RosterChange::Joined)
            }
            SessionStatus::Active => Err(GuardError::AlreadyStarted),
            SessionStatus::Completed => Err(GuardError::AlreadyCompleted),
        }
    }

    /// Remove a participant; returns whether anything was removed.
    ///
    /// Allowed in any status: it backs leave, kick, and disconnect cleanup.
    /// `shift_remove` keeps the join order of the remaining roster intact.
    pub fn leave(&mut self, user_id: Uuid) -> bool {
        self.participants.shift_remove(&user_id).is_some()
    }

    /// Transition `waiting -> active`, stamping `started_at`.
    ///
    /// The roster check happens here, against the state this closure runs
    /// on, so a join racing the start can never be clobbered.
    pub fn start(&mut self) -> Result<(), GuardError> {
        let next = self.status.advance(LifecycleEvent::Start)?;
        if self.participants.is_empty() {
            return Err(GuardError::NoParticipants);
        }
        self.status = next;
        self.started_at = Some(SystemTime::now());
        Ok(())
    }

    /// Move to the next question, returning the new index.
    pub fn next_question(&mut self, total_questions: usize) -> Result<usize, GuardError> {
        self.ensure_active()?;
        if self.current_question_index + 1 >= total_questions {
            return Err(GuardError::NoMoreQuestions);
        }
        self.current_question_index += 1;
        Ok(self.current_question_index)
    }

    /// Append a graded answer for `user_id`, bumping the score.
    ///
    /// The question-id key enforces at-most-once answering: a duplicate
    /// submission leaves both the log and the score untouched. The caller is
    /// responsible for the participant existing in the roster.
    pub fn record_answer(&mut self, user_id: Uuid, answer: Answer) -> AnswerRecord {
        let Some(participant) = self.participants.get_mut(&user_id) else {
            return AnswerRecord::Duplicate;
        };
        if participant.answers.contains_key(&answer.question_id) {
            return AnswerRecord::Duplicate;
        }
        participant.score += answer.points;
        participant.answers.insert(answer.question_id, answer);
        AnswerRecord::Recorded
    }

    /// Transition `active -> completed`, stamping `completed_at`.
    ///
    /// Returns `false` without touching anything when the session is already
    /// completed, so repeated end-game calls never rewrite the timestamp.
    pub fn complete(&mut self) -> Result<bool, GuardError> {
        if self.status == SessionStatus::Completed {
            return Ok(false);
        }
        self.status = self.status.advance(LifecycleEvent::Complete)?;
        self.completed_at = Some(SystemTime::now());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiting_session() -> Session {
        Session::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "123456".parse().unwrap(),
            GameSettings::default(),
        )
    }

    fn student(name: &str) -> Participant {
        Participant::new(Uuid::new_v4(), name.to_owned(), None)
    }

    fn graded(question_id: Uuid, points: u32) -> Answer {
        Answer {
            question_id,
            answer: "42".into(),
            is_correct: points > 0,
            time_spent: 5,
            points,
        }
    }

    #[test]
    fn join_appends_in_order() {
        let mut session = waiting_session();
        let alice = student("Alice");
        let bob = student("Bob");
        assert_eq!(session.join(alice.clone()).unwrap(), RosterChange::Joined);
        assert_eq!(session.join(bob.clone()).unwrap(), RosterChange::Joined);
        let names: Vec<_> = session
            .participants
            .values()
            .map(|p| p.user_name.as_str())
            .collect();
        assert_eq!(names, ["Alice", "Bob"]);
    }

    #[test]
    fn join_is_idempotent_per_user() {
        let mut session = waiting_session();
        let alice = student("Alice");
        session.join(alice.clone()).unwrap();
        assert_eq!(session.join(alice).unwrap(), RosterChange::Rejoined);
        assert_eq!(session.participants.len(), 1);
    }

    #[test]
    fn rejoin_is_allowed_mid_game_but_new_joins_are_not() {
        let mut session = waiting_session();
        let alice = student("Alice");
        session.join(alice.clone()).unwrap();
        session.start().unwrap();

        assert_eq!(session.join(alice).unwrap(), RosterChange::Rejoined);
        let err = session.join(student("Late")).unwrap_err();
        assert_eq!(err, GuardError::AlreadyStarted);
    }

    #[test]
    fn start_requires_participants_and_stamps_once() {
        let mut session = waiting_session();
        assert_eq!(session.start().unwrap_err(), GuardError::NoParticipants);
        assert_eq!(session.status, SessionStatus::Waiting);
        assert!(session.started_at.is_none());

        session.join(student("Alice")).unwrap();
        session.start().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.started_at.is_some());
    }

    #[test]
    fn next_question_stops_at_the_last_index() {
        let mut session = waiting_session();
        session.join(student("Alice")).unwrap();
        session.start().unwrap();

        assert_eq!(session.next_question(3).unwrap(), 1);
        assert_eq!(session.next_question(3).unwrap(), 2);
        let err = session.next_question(3).unwrap_err();
        assert_eq!(err, GuardError::NoMoreQuestions);
        assert_eq!(session.current_question_index, 2);
    }

    #[test]
    fn record_answer_is_at_most_once_per_question() {
        let mut session = waiting_session();
        let alice = student("Alice");
        let alice_id = alice.user_id;
        session.join(alice).unwrap();
        session.start().unwrap();

        let question_id = Uuid::new_v4();
        assert_eq!(
            session.record_answer(alice_id, graded(question_id, 10)),
            AnswerRecord::Recorded
        );
        assert_eq!(
            session.record_answer(alice_id, graded(question_id, 10)),
            AnswerRecord::Duplicate
        );

        let alice = &session.participants[&alice_id];
        assert_eq!(alice.answers.len(), 1);
        assert_eq!(alice.score, 10);
    }

    #[test]
    fn score_stays_the_sum_of_answer_points() {
        let mut session = waiting_session();
        let alice = student("Alice");
        let alice_id = alice.user_id;
        session.join(alice).unwrap();
        session.start().unwrap();

        session.record_answer(alice_id, graded(Uuid::new_v4(), 10));
        session.record_answer(alice_id, graded(Uuid::new_v4(), 0));
        session.record_answer(alice_id, graded(Uuid::new_v4(), 12));

        let alice = &session.participants[&alice_id];
        let total: u32 = alice.answers.values().map(|a| a.points).sum();
        assert_eq!(alice.score, total);
        assert_eq!(alice.score, 22);
    }

    #[test]
    fn complete_is_a_noop_the_second_time() {
        let mut session = waiting_session();
        session.join(student("Alice")).unwrap();
        session.start().unwrap();

        assert!(session.complete().unwrap());
        let stamped = session.completed_at;
        assert!(stamped.is_some());

        assert!(!session.complete().unwrap());
        assert_eq!(session.completed_at, stamped);
    }

    #[test]
    fn leave_works_in_any_status() {
        let mut session = waiting_session();
        let alice = student("Alice");
        let alice_id = alice.user_id;
        session.join(alice).unwrap();
        session.join(student("Bob")).unwrap();
        session.start().unwrap();

        assert!(session.leave(alice_id));
        assert!(!session.leave(alice_id));
        assert_eq!(session.participants.len(), 1);
    }
}
