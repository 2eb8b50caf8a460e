use anyhow::Result;
use interviewbase::session::ChatEntryKind;
use interviewbase::{InterviewError, InterviewEvent, SubmitOutcome};
use std::time::Duration;

use crate::support::interview_fixture::{advance_secs, count_entries, drain, settle, InterviewFixture};

#[tokio::test(start_paused = true)]
async fn ticks_persist_the_remaining_time() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;

    advance_secs(3).await;
    assert_eq!(fixture.orchestrator.live_remaining(id).await, Some(17));
    assert_eq!(fixture.session(id).await?.remaining_time, Some(17));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn expiry_auto_submits_the_staged_selection() -> Result<()> {
    let fixture = InterviewFixture::new();
    let mut events = fixture.orchestrator.subscribe();
    let id = fixture.start_interview().await?;

    fixture.orchestrator.stage_answer(id, "a").await?;
    advance_secs(20).await;

    let session = fixture.session(id).await?;
    let first = &session.questions[0];
    assert_eq!(first.answer.as_deref(), Some("A"));
    assert_eq!(first.time_spent, Some(20));
    assert_eq!(first.score, Some(10));
    assert_eq!(session.current_question_index, 1);
    assert_eq!(fixture.orchestrator.live_remaining(id).await, Some(20));

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        InterviewEvent::CountdownExpired {
            question_index: 0,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        InterviewEvent::AnswerRecorded {
            question_index: 0,
            auto_submitted: true,
            ..
        }
    )));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn expiry_without_a_selection_records_no_answer() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;

    advance_secs(20).await;

    let session = fixture.session(id).await?;
    let first = &session.questions[0];
    assert_eq!(first.answer.as_deref(), Some(""));
    assert_eq!(first.score, Some(0));
    assert_eq!(
        first.feedback.as_deref(),
        Some("No answer provided (time expired).")
    );
    let answer_entry = session
        .chat_history
        .iter()
        .find(|e| e.kind == ChatEntryKind::Answer)
        .expect("answer entry recorded");
    assert_eq!(answer_entry.content, "(No answer provided - time expired)");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn selection_for_an_earlier_question_is_not_reused() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;

    fixture.orchestrator.stage_answer(id, "D").await?;
    fixture.orchestrator.submit_answer(id, "A").await?;
    advance_secs(20).await;

    let session = fixture.session(id).await?;
    assert_eq!(session.questions[0].answer.as_deref(), Some("A"));
    assert_eq!(session.questions[1].answer.as_deref(), Some(""));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn manual_submit_racing_expiry_submits_once() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;

    // Wake exactly on the final tick so both paths contend for the question.
    tokio::time::sleep(Duration::from_secs(20)).await;
    let manual = fixture.orchestrator.submit_answer_at(id, 0, "A").await;
    match &manual {
        Ok(SubmitOutcome::Next { question, .. }) => assert_eq!(question.question_index, 1),
        Err(InterviewError::AlreadySubmitted) => {}
        other => panic!("unexpected outcome {other:?}"),
    }
    settle().await;

    let session = fixture.session(id).await?;
    assert_eq!(fixture.scorer.calls(), 1, "question 0 must be scored once");
    assert_eq!(count_entries(&session, ChatEntryKind::Answer, Some(0)), 1);
    assert_eq!(count_entries(&session, ChatEntryKind::Feedback, Some(0)), 1);
    assert_eq!(session.current_question_index, 1);
    assert!(session.questions[1].answer.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stale_manual_submit_is_rejected_after_expiry() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;

    advance_secs(20).await;
    let err = fixture
        .orchestrator
        .submit_answer_at(id, 0, "B")
        .await
        .expect_err("question 0 already expired");
    assert!(matches!(err, InterviewError::AlreadySubmitted));

    let session = fixture.session(id).await?;
    assert_eq!(session.questions[0].answer.as_deref(), Some(""));
    assert!(session.questions[1].answer.is_none());
    assert_eq!(fixture.scorer.calls(), 1);
    Ok(())
}
