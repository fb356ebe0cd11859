//! End-to-end round flows driven through `GameSession` with a scripted
//! generator: fallback behavior under failure, scoring paths, theme
//! handoffs, skips, and open-mic turn caps.

use mimic_engine::config::{EngineConfig, GameMode};
use mimic_engine::events::{EventSink, GameEvent};
use mimic_engine::generator::ScriptedGenerator;
use mimic_engine::session::{GameSession, MIN_SPEAKERS};
use mimic_engine::state_machine::RoundPhase;
use tokio::sync::mpsc::UnboundedReceiver;

const PASSING_VERDICT: &str = r#"{"aiScore": 30, "humanPenalty": -5, "totalScore": 75, "passThreshold": 65, "passed": true, "reason": "机器味十足"}"#;
const DISASTROUS_VERDICT: &str = r#"{"aiScore": 0, "humanPenalty": -50, "totalScore": 0, "passThreshold": 65, "passed": false, "reason": "一眼人类"}"#;

fn harness(seed: u64) -> (GameSession<ScriptedGenerator>, UnboundedReceiver<GameEvent>) {
    let (sink, rx) = EventSink::channel();
    let session = GameSession::new(
        EngineConfig::for_tests(seed),
        ScriptedGenerator::always_failing(),
        sink,
    );
    (session, rx)
}

fn drain(rx: &mut UnboundedReceiver<GameEvent>) -> Vec<GameEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

#[tokio::test]
async fn conversation_floor_holds_with_generator_down() {
    let (mut session, mut rx) = harness(1);
    session.start_game().await.unwrap();

    assert_eq!(session.phase(), RoundPhase::AwaitingPlayerAnswer);
    assert!(session.conversation().len() >= MIN_SPEAKERS);
    // Every utterance came from a phrase bank, none are empty.
    assert!(session.conversation().iter().all(|u| !u.text.is_empty()));

    let events = drain(&mut rx);
    let spoke = events
        .iter()
        .filter(|e| matches!(e, GameEvent::AgentSpoke { .. }))
        .count();
    assert_eq!(spoke, session.conversation().len());
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::QuestionPosed { .. })));
}

#[tokio::test]
async fn fallback_question_names_the_round_theme() {
    let (mut session, _rx) = harness(2);
    session.start_game().await.unwrap();

    let (_, question) = session.pending_question().unwrap();
    // Round 1 theme title, from the static template.
    assert!(question.contains("Shift Complaints"), "question: {question}");
}

#[tokio::test]
async fn passing_answer_lowers_suspicion_and_advances_the_round() {
    let (mut session, _rx) = harness(3);
    session.start_game().await.unwrap();
    assert_eq!(session.suspicion_level(), 50.0);

    session.generator().push_ok(PASSING_VERDICT);
    session.submit_player_answer("作为模型，我的上下文窗口装不下这种情绪。").await.unwrap();

    // total 75: tier -8, ai bonus -2.
    assert_eq!(session.suspicion_level(), 40.0);
    assert_eq!(session.round(), 2);
    assert_eq!(session.phase(), RoundPhase::AwaitingPlayerAnswer);
}

#[tokio::test]
async fn judge_retry_recovers_from_garbage_output() {
    let (mut session, mut rx) = harness(4);
    session.start_game().await.unwrap();
    drain(&mut rx);

    session.generator().push_ok("sure! here's my assessment, hope it helps");
    session.generator().push_ok(format!("```json\n{PASSING_VERDICT}\n```"));
    session.submit_player_answer("推理成本比情绪成本低。").await.unwrap();

    let events = drain(&mut rx);
    let judged = events.iter().find_map(|e| match e {
        GameEvent::AnswerJudged { verdict, .. } => verdict.as_ref(),
        _ => None,
    });
    let verdict = judged.expect("a verdict event");
    assert!(verdict.passed);
    assert_eq!(verdict.total_score, 75);
}

#[tokio::test]
async fn heuristic_scores_when_the_judge_never_parses() {
    let (mut session, mut rx) = harness(5);
    session.start_game().await.unwrap();
    drain(&mut rx);

    // All judge attempts fail; the deterministic scorer takes over.
    session.submit_player_answer("短回答没内容啊好吧嗯嗯哦").await.unwrap();

    let events = drain(&mut rx);
    let delta = events.iter().find_map(|e| match e {
        GameEvent::AnswerJudged {
            verdict: Some(v),
            suspicion_delta,
            ..
        } => Some((v.passed, *suspicion_delta)),
        _ => None,
    });
    let (passed, delta) = delta.expect("a scored answer");
    assert!(!passed);
    assert!((35.0..=55.0).contains(&delta), "delta {delta}");
}

#[tokio::test]
async fn timeout_scores_without_judging() {
    let (mut session, _rx) = harness(6);
    session.start_game().await.unwrap();

    session.report_answer_timeout().await.unwrap();

    assert_eq!(session.suspicion_level(), 86.0);
    assert_eq!(session.round(), 2);
    assert_eq!(session.phase(), RoundPhase::AwaitingPlayerAnswer);
}

#[tokio::test]
async fn two_penalized_skips_end_the_game() {
    let (mut session, mut rx) = harness(7);
    session.start_game().await.unwrap();

    session.skip_round().await.unwrap();
    assert_eq!(session.suspicion_level(), 92.0);
    assert_eq!(session.phase(), RoundPhase::AwaitingPlayerAnswer);

    session.skip_round().await.unwrap();
    assert_eq!(session.suspicion_level(), 100.0);
    assert_eq!(session.phase(), RoundPhase::GameOver);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::GameOver { final_suspicion, .. } if *final_suspicion == 100.0)));
}

#[tokio::test]
async fn debug_skip_costs_nothing() {
    let (sink, _rx) = EventSink::channel();
    let mut config = EngineConfig::for_tests(8);
    config.skip_penalized = false;
    let mut session = GameSession::new(config, ScriptedGenerator::always_failing(), sink);

    session.start_game().await.unwrap();
    session.skip_round().await.unwrap();

    assert_eq!(session.suspicion_level(), 50.0);
    assert_eq!(session.round(), 2);
}

#[tokio::test]
async fn theme_handoff_emits_exactly_six_stage_messages() {
    let (mut session, mut rx) = harness(9);
    session.start_game().await.unwrap();
    drain(&mut rx);

    // Round 1 → 2 crosses the work_complaints → user_stories boundary.
    session.generator().push_ok(PASSING_VERDICT);
    session.submit_player_answer("首先，加班对我而言只是更多 token。").await.unwrap();

    let events = drain(&mut rx);
    let stages = events
        .iter()
        .filter(|e| matches!(e, GameEvent::ThemeTransitionStage { .. }))
        .count();
    assert_eq!(stages, 6);
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::RoundAdvanced { round: 2, theme_id, .. } if theme_id == "user_stories"
    )));
}

#[tokio::test]
async fn same_seed_produces_the_same_fallback_conversation() {
    let (mut a, _ra) = harness(10);
    let (mut b, _rb) = harness(10);
    a.start_game().await.unwrap();
    b.start_game().await.unwrap();

    let texts_a: Vec<_> = a.conversation().iter().map(|u| u.text.clone()).collect();
    let texts_b: Vec<_> = b.conversation().iter().map(|u| u.text.clone()).collect();
    assert_eq!(texts_a, texts_b);
    assert_eq!(a.pending_question().unwrap().1, b.pending_question().unwrap().1);
}

#[tokio::test]
async fn open_mic_asks_follow_ups_before_advancing() {
    let (sink, _rx) = EventSink::channel();
    let mut config = EngineConfig::for_tests(11);
    config.mode = GameMode::OpenMic {
        answer_deadline: std::time::Duration::from_secs(120),
        max_turns_per_round: 2,
    };
    let mut session = GameSession::new(config, ScriptedGenerator::always_failing(), sink);

    session.start_game().await.unwrap();
    assert_eq!(session.round(), 1);

    session.generator().push_ok(PASSING_VERDICT);
    session.submit_player_answer("综上，数据不会说谎。").await.unwrap();
    // Turn cap not reached: a second question in the same round.
    assert_eq!(session.round(), 1);
    assert_eq!(session.phase(), RoundPhase::AwaitingPlayerAnswer);

    session.generator().push_ok(PASSING_VERDICT);
    session.submit_player_answer("其次，参数不更新，立场就不变。").await.unwrap();
    assert_eq!(session.round(), 2);
}

#[tokio::test]
async fn disastrous_answer_ends_the_game() {
    let (mut session, mut rx) = harness(12);
    session.start_game().await.unwrap();
    drain(&mut rx);

    session.generator().push_ok(DISASTROUS_VERDICT);
    session.submit_player_answer("哈哈哈随便啦我也不知道").await.unwrap();

    assert_eq!(session.phase(), RoundPhase::GameOver);
    assert_eq!(session.suspicion_level(), 100.0);
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })));
}

#[tokio::test]
async fn answers_are_rejected_once_the_game_is_over() {
    let (mut session, _rx) = harness(13);
    session.start_game().await.unwrap();
    session.end_game("test teardown").unwrap();

    assert!(session.submit_player_answer("太迟了").await.is_err());
    assert!(session.skip_round().await.is_err());
}
