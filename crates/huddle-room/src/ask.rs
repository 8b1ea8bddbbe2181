//! The `ASK` protocol: a synchronized multi-stage quiz.
//!
//! A round cycles `waiting → question → answer → result → waiting`. The
//! stage advances only when every connected participant has signaled
//! readiness (the full barrier). During `question`, each ready signal
//! contributes a question text; during `answer`, each contributes one
//! answer per collected question; during `result`, the room steps through
//! the collected pairs one at a time before the cycle restarts.
//!
//! Rooms with an id of `DEBUG` or `DEBUG:<stage>` run in debug mode: they
//! are always joinable, their stage is frozen, and stages past `waiting`
//! start pre-seeded with synthetic data for inspection.

use std::collections::HashSet;

use huddle_protocol::{ParticipantId, ReadySignal, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Recipient, RoomLogic, Roster};

/// Protocol tag for Ask rooms.
pub const PROTOCOL: &str = "ASK";

/// Number of synthetic question/answer pairs seeded into debug rooms.
const DEBUG_SEED_PAIRS: usize = 5;

/// The stages of one quiz round, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Waiting,
    Question,
    Answer,
    Result,
}

impl Stage {
    /// The next stage in the cycle (`result` wraps to `waiting`).
    pub fn next(self) -> Self {
        match self {
            Stage::Waiting => Stage::Question,
            Stage::Question => Stage::Answer,
            Stage::Answer => Stage::Result,
            Stage::Result => Stage::Waiting,
        }
    }
}

/// The status projection broadcast to a room.
///
/// One variant per stage, tagged on `stage`, so each stage carries
/// exactly the fields that are valid for it: `answer` exposes the
/// collected question texts, `result` the pair under the cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum Status {
    Waiting {
        players: usize,
        ready: usize,
    },
    Question {
        players: usize,
        ready: usize,
    },
    Answer {
        players: usize,
        ready: usize,
        questions: Vec<String>,
    },
    Result {
        players: usize,
        ready: usize,
        answers: (String, Vec<String>),
    },
}

/// A ready payload after stage-dependent validation.
enum ReadyData {
    None,
    Question(String),
    Answers(Vec<String>),
}

/// Why a ready payload was rejected at the room boundary.
#[derive(Debug, thiserror::Error)]
enum PayloadError {
    #[error("question stage expects a string payload")]
    ExpectedQuestion,

    #[error("answer stage expects an array of strings")]
    ExpectedAnswers,

    #[error("{got} answers submitted for {questions} questions")]
    TooManyAnswers { got: usize, questions: usize },
}

/// One Ask room's game state. Owned by its room actor; every mutation
/// happens inside a single hook call.
pub struct Ask {
    debug: bool,
    stage: Stage,
    /// Participants ready to advance the current stage.
    ready: HashSet<ParticipantId>,
    /// Participants that have contributed data in the current stage.
    /// Keeps readiness toggling from appending twice.
    submitted: HashSet<ParticipantId>,
    /// Collected (question, answers) pairs for the current round.
    answers: Vec<(String, Vec<String>)>,
    /// Index of the pair shown during `result`.
    current_answer: usize,
}

impl Ask {
    /// Builds the room for the given id.
    ///
    /// `DEBUG` and `DEBUG:<stage>` ids produce debug rooms; the suffix
    /// picks the starting stage (unrecognized suffixes fall back to
    /// `waiting`).
    pub fn new(id: RoomId) -> Self {
        let (debug, stage) = match id.as_str().split_once(':') {
            Some(("DEBUG", suffix)) => (true, parse_stage(suffix)),
            _ => (id.as_str() == "DEBUG", Stage::Waiting),
        };

        let answers = if debug && stage != Stage::Waiting {
            seed_pairs()
        } else {
            Vec::new()
        };

        Self {
            debug,
            stage,
            ready: HashSet::new(),
            submitted: HashSet::new(),
            answers,
            current_answer: 0,
        }
    }

    /// The current stage projection.
    pub fn projection(&self, roster: &Roster) -> Status {
        let players = roster.len();
        let ready = self.ready.len();
        match self.stage {
            Stage::Waiting => Status::Waiting { players, ready },
            Stage::Question => Status::Question { players, ready },
            Stage::Answer => Status::Answer {
                players,
                ready,
                questions: self
                    .answers
                    .iter()
                    .map(|(question, _)| question.clone())
                    .collect(),
            },
            Stage::Result => Status::Result {
                players,
                ready,
                answers: self
                    .answers
                    .get(self.current_answer)
                    .cloned()
                    .unwrap_or_default(),
            },
        }
    }

    fn projection_value(&self, roster: &Roster) -> Value {
        serde_json::to_value(self.projection(roster))
            .expect("stage projection serializes to JSON")
    }

    /// Validates a signal's payload against the current stage. Stages
    /// that collect no data accept (and drop) anything.
    fn parse_data(
        &self,
        data: Option<&Value>,
    ) -> Result<ReadyData, PayloadError> {
        match self.stage {
            Stage::Question => match data {
                Some(Value::String(text)) => {
                    Ok(ReadyData::Question(text.clone()))
                }
                _ => Err(PayloadError::ExpectedQuestion),
            },
            Stage::Answer => match data {
                Some(Value::Array(items)) => {
                    if items.len() > self.answers.len() {
                        return Err(PayloadError::TooManyAnswers {
                            got: items.len(),
                            questions: self.answers.len(),
                        });
                    }
                    let mut list = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::String(answer) => {
                                list.push(answer.clone());
                            }
                            _ => return Err(PayloadError::ExpectedAnswers),
                        }
                    }
                    Ok(ReadyData::Answers(list))
                }
                _ => Err(PayloadError::ExpectedAnswers),
            },
            Stage::Waiting | Stage::Result => Ok(ReadyData::None),
        }
    }

    /// Appends validated payload data into the answer collection.
    fn record(&mut self, data: ReadyData) {
        match data {
            ReadyData::Question(text) => {
                self.answers.push((text, Vec::new()));
            }
            ReadyData::Answers(list) => {
                // Positional: answer i belongs to question i. A short
                // list leaves trailing questions with fewer answers.
                for (index, answer) in list.into_iter().enumerate() {
                    self.answers[index].1.push(answer);
                }
            }
            ReadyData::None => {}
        }
    }

    /// Runs the barrier check: every connected participant ready.
    fn advance_if_barrier_met(&mut self, roster: &Roster) {
        if roster.is_empty() || self.ready.len() != roster.len() {
            return;
        }

        // Step through collected pairs one at a time before the stage
        // itself moves on. The ready set survives the step: each further
        // signal while the room stays fully ready steps the cursor again.
        if self.stage == Stage::Result
            && self.current_answer + 1 < self.answers.len()
        {
            self.current_answer += 1;
            return;
        }

        if !self.debug {
            if self.stage == Stage::Result {
                self.answers.clear();
                self.current_answer = 0;
            }
            self.stage = self.stage.next();
        }
        self.ready.clear();
        self.submitted.clear();
    }
}

impl RoomLogic for Ask {
    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    fn joinable(&self) -> bool {
        self.debug || self.stage == Stage::Waiting
    }

    fn on_join(
        &mut self,
        _participant: ParticipantId,
        roster: &Roster,
    ) -> Vec<(Recipient, Value)> {
        vec![(Recipient::All, self.projection_value(roster))]
    }

    fn on_leave(
        &mut self,
        participant: ParticipantId,
        roster: &Roster,
    ) -> Vec<(Recipient, Value)> {
        self.ready.remove(&participant);
        self.submitted.remove(&participant);
        // A departure can complete the barrier for everyone left behind.
        self.advance_if_barrier_met(roster);
        vec![(Recipient::All, self.projection_value(roster))]
    }

    fn on_ready(
        &mut self,
        participant: ParticipantId,
        signal: ReadySignal,
        roster: &Roster,
    ) -> Vec<(Recipient, Value)> {
        if signal.ready {
            let data = match self.parse_data(signal.data.as_ref()) {
                Ok(data) => data,
                Err(error) => {
                    tracing::warn!(
                        %participant,
                        stage = ?self.stage,
                        %error,
                        "rejected ready payload"
                    );
                    return Vec::new();
                }
            };

            self.ready.insert(participant);
            if self.submitted.insert(participant) {
                self.record(data);
            }
        } else {
            // No rollback: anything already contributed stays.
            self.ready.remove(&participant);
        }

        self.advance_if_barrier_met(roster);
        vec![(Recipient::All, self.projection_value(roster))]
    }

    fn status(&self, roster: &Roster) -> Value {
        self.projection_value(roster)
    }
}

fn parse_stage(suffix: &str) -> Stage {
    if suffix.eq_ignore_ascii_case("question") {
        Stage::Question
    } else if suffix.eq_ignore_ascii_case("answer") {
        Stage::Answer
    } else if suffix.eq_ignore_ascii_case("result") {
        Stage::Result
    } else {
        Stage::Waiting
    }
}

/// Synthetic data for debug rooms.
fn seed_pairs() -> Vec<(String, Vec<String>)> {
    (1..=DEBUG_SEED_PAIRS)
        .map(|n| {
            (
                format!("Sample question {n}?"),
                vec![
                    format!("first answer to {n}"),
                    format!("second answer to {n}"),
                ],
            )
        })
        .collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pid(id: u64) -> ParticipantId {
        ParticipantId(id)
    }

    fn roster_of(count: u64) -> Roster {
        let mut roster = Roster::new();
        for id in 1..=count {
            roster.insert(pid(id));
        }
        roster
    }

    fn fresh_room() -> Ask {
        Ask::new(RoomId::normalized("A1B2C3"))
    }

    fn ready(data: Option<Value>) -> ReadySignal {
        ReadySignal { ready: true, data }
    }

    fn not_ready() -> ReadySignal {
        ReadySignal {
            ready: false,
            data: None,
        }
    }

    /// Drives a room from `waiting` into `question` with every
    /// participant in the roster.
    fn into_question_stage(room: &mut Ask, roster: &Roster) {
        for participant in roster.iter() {
            room.on_ready(participant, ready(None), roster);
        }
        assert_eq!(room.stage, Stage::Question);
    }

    // =====================================================================
    // Stage cycle
    // =====================================================================

    #[test]
    fn test_stage_cycle_wraps() {
        assert_eq!(Stage::Waiting.next(), Stage::Question);
        assert_eq!(Stage::Question.next(), Stage::Answer);
        assert_eq!(Stage::Answer.next(), Stage::Result);
        assert_eq!(Stage::Result.next(), Stage::Waiting);
    }

    #[test]
    fn test_new_room_starts_waiting_and_joinable() {
        let room = fresh_room();
        assert_eq!(room.stage, Stage::Waiting);
        assert!(room.joinable());
        assert!(!room.debug);
    }

    #[test]
    fn test_room_not_joinable_past_waiting() {
        let mut room = fresh_room();
        let roster = roster_of(1);
        room.on_ready(pid(1), ready(None), &roster);
        assert_eq!(room.stage, Stage::Question);
        assert!(!room.joinable());
    }

    // =====================================================================
    // Barrier
    // =====================================================================

    #[test]
    fn test_barrier_requires_every_participant() {
        let mut room = fresh_room();
        let roster = roster_of(3);

        room.on_ready(pid(1), ready(None), &roster);
        assert_eq!(room.stage, Stage::Waiting);
        room.on_ready(pid(2), ready(None), &roster);
        assert_eq!(room.stage, Stage::Waiting);

        // The third signal completes the barrier.
        room.on_ready(pid(3), ready(None), &roster);
        assert_eq!(room.stage, Stage::Question);
        assert!(room.ready.is_empty(), "ready set clears on advance");
    }

    #[test]
    fn test_withdrawing_readiness_blocks_the_barrier() {
        let mut room = fresh_room();
        let roster = roster_of(2);

        room.on_ready(pid(1), ready(None), &roster);
        room.on_ready(pid(1), not_ready(), &roster);
        room.on_ready(pid(2), ready(None), &roster);
        assert_eq!(room.stage, Stage::Waiting, "1 of 2 ready");

        room.on_ready(pid(1), ready(None), &roster);
        assert_eq!(room.stage, Stage::Question);
    }

    #[test]
    fn test_every_signal_broadcasts_status() {
        let mut room = fresh_room();
        let roster = roster_of(2);

        let msgs = room.on_ready(pid(1), ready(None), &roster);
        assert_eq!(msgs.len(), 1);
        let (recipient, projection) = &msgs[0];
        assert_eq!(*recipient, Recipient::All);
        assert_eq!(
            *projection,
            json!({"stage": "waiting", "players": 2, "ready": 1})
        );
    }

    // =====================================================================
    // Question stage
    // =====================================================================

    #[test]
    fn test_question_stage_collects_one_entry_per_participant() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_question_stage(&mut room, &roster);

        room.on_ready(
            pid(1),
            ready(Some(json!("What's your favorite color?"))),
            &roster,
        );
        assert_eq!(room.stage, Stage::Question, "1 of 2 ready");
        assert_eq!(
            room.answers,
            vec![("What's your favorite color?".to_string(), vec![])]
        );

        room.on_ready(pid(2), ready(Some(json!("What's your pet?"))), &roster);
        assert_eq!(room.stage, Stage::Answer);
        assert_eq!(room.answers.len(), 2);
        assert!(room.ready.is_empty());
    }

    #[test]
    fn test_toggling_readiness_does_not_double_append() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_question_stage(&mut room, &roster);

        room.on_ready(pid(1), ready(Some(json!("First?"))), &roster);
        room.on_ready(pid(1), not_ready(), &roster);
        room.on_ready(pid(1), ready(Some(json!("Second?"))), &roster);

        assert_eq!(room.answers, vec![("First?".to_string(), vec![])]);
        assert!(room.ready.contains(&pid(1)));
    }

    #[test]
    fn test_repeated_ready_does_not_double_append() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_question_stage(&mut room, &roster);

        room.on_ready(pid(1), ready(Some(json!("Only once?"))), &roster);
        room.on_ready(pid(1), ready(Some(json!("Only once?"))), &roster);
        assert_eq!(room.answers.len(), 1);
    }

    #[test]
    fn test_question_stage_rejects_non_string_payload() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_question_stage(&mut room, &roster);

        let msgs = room.on_ready(pid(1), ready(Some(json!(["a"]))), &roster);
        assert!(msgs.is_empty(), "rejected signal sends nothing");
        assert!(room.ready.is_empty(), "rejected signal never enters");
        assert!(room.answers.is_empty());

        let msgs = room.on_ready(pid(1), ready(None), &roster);
        assert!(msgs.is_empty(), "missing payload is rejected too");
        assert!(room.ready.is_empty());
    }

    // =====================================================================
    // Answer stage
    // =====================================================================

    /// Builds a 2-participant room sitting in `answer` with two
    /// collected questions.
    fn into_answer_stage(room: &mut Ask, roster: &Roster) {
        into_question_stage(room, roster);
        room.on_ready(pid(1), ready(Some(json!("Q1?"))), roster);
        room.on_ready(pid(2), ready(Some(json!("Q2?"))), roster);
        assert_eq!(room.stage, Stage::Answer);
    }

    #[test]
    fn test_answer_stage_appends_positionally() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_answer_stage(&mut room, &roster);

        room.on_ready(pid(1), ready(Some(json!(["blue", "a dog"]))), &roster);
        assert_eq!(room.answers[0].1, vec!["blue"]);
        assert_eq!(room.answers[1].1, vec!["a dog"]);

        room.on_ready(pid(2), ready(Some(json!(["red", "a cat"]))), &roster);
        assert_eq!(room.answers[0].1, vec!["blue", "red"]);
        assert_eq!(room.answers[1].1, vec!["a dog", "a cat"]);
        assert_eq!(room.stage, Stage::Result);
    }

    #[test]
    fn test_short_answer_payload_leaves_trailing_questions() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_answer_stage(&mut room, &roster);

        room.on_ready(pid(1), ready(Some(json!(["only one"]))), &roster);
        assert_eq!(room.answers[0].1, vec!["only one"]);
        assert!(room.answers[1].1.is_empty());
        assert!(room.ready.contains(&pid(1)));
    }

    #[test]
    fn test_overlong_answer_payload_rejected() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_answer_stage(&mut room, &roster);

        let msgs = room.on_ready(
            pid(1),
            ready(Some(json!(["a", "b", "c"]))),
            &roster,
        );
        assert!(msgs.is_empty());
        assert!(room.ready.is_empty());
        assert!(room.answers[0].1.is_empty(), "no partial append");
    }

    #[test]
    fn test_answer_stage_rejects_non_array_payload() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_answer_stage(&mut room, &roster);

        let msgs =
            room.on_ready(pid(1), ready(Some(json!("not a list"))), &roster);
        assert!(msgs.is_empty());
        assert!(room.ready.is_empty());
    }

    // =====================================================================
    // Result stage
    // =====================================================================

    /// Builds a 2-participant room sitting in `result` with two answered
    /// questions.
    fn into_result_stage(room: &mut Ask, roster: &Roster) {
        into_answer_stage(room, roster);
        room.on_ready(pid(1), ready(Some(json!(["blue", "a dog"]))), roster);
        room.on_ready(pid(2), ready(Some(json!(["red", "a cat"]))), roster);
        assert_eq!(room.stage, Stage::Result);
        assert_eq!(room.answers.len(), 2);
    }

    #[test]
    fn test_result_steps_cursor_before_advancing() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_result_stage(&mut room, &roster);
        assert_eq!(room.current_answer, 0);

        // First full barrier: cursor steps, stage holds, ready survives.
        room.on_ready(pid(1), ready(None), &roster);
        room.on_ready(pid(2), ready(None), &roster);
        assert_eq!(room.stage, Stage::Result);
        assert_eq!(room.current_answer, 1);
        assert_eq!(room.ready.len(), 2);

        // Cursor is on the last pair; the next satisfied barrier wraps
        // the cycle and clears the collection.
        room.on_ready(pid(1), ready(None), &roster);
        assert_eq!(room.stage, Stage::Waiting);
        assert!(room.answers.is_empty());
        assert_eq!(room.current_answer, 0);
        assert!(room.ready.is_empty());
    }

    #[test]
    fn test_result_projection_follows_cursor() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_result_stage(&mut room, &roster);

        match room.projection(&roster) {
            Status::Result { answers, .. } => {
                assert_eq!(answers.0, "Q1?");
                assert_eq!(answers.1, vec!["blue", "red"]);
            }
            other => panic!("expected result projection, got {other:?}"),
        }

        room.on_ready(pid(1), ready(None), &roster);
        room.on_ready(pid(2), ready(None), &roster);
        match room.projection(&roster) {
            Status::Result { answers, .. } => {
                assert_eq!(answers.0, "Q2?");
            }
            other => panic!("expected result projection, got {other:?}"),
        }
    }

    // =====================================================================
    // Leave handling
    // =====================================================================

    #[test]
    fn test_leave_completes_barrier_for_the_rest() {
        let mut room = fresh_room();
        let mut roster = roster_of(3);

        room.on_ready(pid(1), ready(None), &roster);
        room.on_ready(pid(2), ready(None), &roster);
        assert_eq!(room.stage, Stage::Waiting);

        // The one unready participant disconnects; the two remaining are
        // all ready, so the room advances instead of wedging.
        roster.remove(pid(3));
        let msgs = room.on_leave(pid(3), &roster);
        assert_eq!(room.stage, Stage::Question);
        assert_eq!(msgs.len(), 1, "leave broadcasts the new status");
    }

    #[test]
    fn test_leave_of_last_participant_does_not_advance() {
        let mut room = fresh_room();
        let mut roster = roster_of(1);

        room.on_ready(pid(1), ready(None), &roster);
        assert_eq!(room.stage, Stage::Question);

        roster.remove(pid(1));
        room.on_leave(pid(1), &roster);
        assert_eq!(room.stage, Stage::Question, "empty room holds its stage");
    }

    #[test]
    fn test_leave_drops_readiness_without_rollback() {
        let mut room = fresh_room();
        let mut roster = roster_of(3);
        into_question_stage(&mut room, &roster);

        room.on_ready(pid(1), ready(Some(json!("Stays?"))), &roster);
        roster.remove(pid(1));
        room.on_leave(pid(1), &roster);

        assert!(!room.ready.contains(&pid(1)));
        assert_eq!(
            room.answers,
            vec![("Stays?".to_string(), vec![])],
            "contributed data is not retracted"
        );
    }

    // =====================================================================
    // Debug rooms
    // =====================================================================

    #[test]
    fn test_debug_room_parses_stage_suffix() {
        let room = Ask::new(RoomId::normalized("debug:result"));
        assert!(room.debug);
        assert_eq!(room.stage, Stage::Result);
        assert_eq!(room.answers.len(), DEBUG_SEED_PAIRS);

        let room = Ask::new(RoomId::normalized("DEBUG:QUESTION"));
        assert_eq!(room.stage, Stage::Question);

        let room = Ask::new(RoomId::normalized("DEBUG"));
        assert!(room.debug);
        assert_eq!(room.stage, Stage::Waiting);
        assert!(room.answers.is_empty());
    }

    #[test]
    fn test_debug_room_with_unknown_suffix_waits() {
        let room = Ask::new(RoomId::normalized("DEBUG:NONSENSE"));
        assert!(room.debug);
        assert_eq!(room.stage, Stage::Waiting);
    }

    #[test]
    fn test_debug_room_always_joinable() {
        let room = Ask::new(RoomId::normalized("DEBUG:ANSWER"));
        assert_eq!(room.stage, Stage::Answer);
        assert!(room.joinable());
    }

    #[test]
    fn test_debug_room_freezes_stage_and_keeps_data() {
        let mut room = Ask::new(RoomId::normalized("DEBUG:RESULT"));
        let roster = roster_of(1);

        // Step the cursor through all five pairs.
        for expected in 1..DEBUG_SEED_PAIRS {
            room.on_ready(pid(1), ready(None), &roster);
            assert_eq!(room.current_answer, expected);
        }

        // One more satisfied barrier: no advance, no clearing.
        room.on_ready(pid(1), ready(None), &roster);
        assert_eq!(room.stage, Stage::Result);
        assert_eq!(room.answers.len(), DEBUG_SEED_PAIRS);
        assert!(room.ready.is_empty(), "ready still clears in debug");
    }

    // =====================================================================
    // Projection shapes
    // =====================================================================

    #[test]
    fn test_answer_projection_lists_questions() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_answer_stage(&mut room, &roster);

        let json = serde_json::to_value(room.projection(&roster)).unwrap();
        assert_eq!(
            json,
            json!({
                "stage": "answer",
                "players": 2,
                "ready": 0,
                "questions": ["Q1?", "Q2?"]
            })
        );
    }

    #[test]
    fn test_result_projection_shape() {
        let mut room = fresh_room();
        let roster = roster_of(2);
        into_result_stage(&mut room, &roster);

        let json = serde_json::to_value(room.projection(&roster)).unwrap();
        assert_eq!(
            json,
            json!({
                "stage": "result",
                "players": 2,
                "ready": 0,
                "answers": ["Q1?", ["blue", "red"]]
            })
        );
    }
}
