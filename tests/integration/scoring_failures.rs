use anyhow::{bail, Result};
use interviewbase::{InterviewError, InterviewEvent, SessionStatus, SubmitOutcome};

use crate::support::interview_fixture::{drain, FixtureOptions, InterviewFixture};
use crate::support::providers::ScriptedScorer;

#[tokio::test(start_paused = true)]
async fn failed_scoring_keeps_the_answer_until_retried() -> Result<()> {
    let fixture = InterviewFixture::with_options(FixtureOptions {
        scorer: ScriptedScorer::failing(1, false),
        ..Default::default()
    });
    let mut events = fixture.orchestrator.subscribe();
    let id = fixture.start_interview().await?;

    let err = fixture
        .orchestrator
        .submit_answer_at(id, 0, "A")
        .await
        .expect_err("first scoring attempt fails");
    assert!(matches!(err, InterviewError::ScoringFailed(_)), "got {err:?}");
    assert!(err.is_retryable());

    let pending = fixture.session(id).await?;
    assert_eq!(pending.status, SessionStatus::InProgress);
    assert_eq!(pending.current_question_index, 0);
    assert_eq!(pending.questions[0].answer.as_deref(), Some("A"));
    assert!(pending.questions[0].time_spent.is_some());
    assert_eq!(pending.questions[0].score, None);
    assert_eq!(fixture.orchestrator.live_remaining(id).await, None);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        InterviewEvent::ScoringPending {
            question_index: 0,
            ..
        }
    )));

    // The recorded answer cannot be replaced.
    let resubmit = fixture.orchestrator.submit_answer_at(id, 0, "B").await;
    assert!(matches!(resubmit, Err(InterviewError::AlreadySubmitted)));

    match fixture.orchestrator.retry_scoring(id).await? {
        SubmitOutcome::Next { grade, question } => {
            assert_eq!(grade.score, 10);
            assert_eq!(question.question_index, 1);
        }
        other => bail!("expected to advance, got {other:?}"),
    }
    assert_eq!(fixture.scorer.calls(), 2);

    let retry = fixture.orchestrator.retry_scoring(id).await;
    assert!(matches!(
        retry,
        Err(InterviewError::InvalidTransition { .. })
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_scoring_failures_score_zero_and_advance() -> Result<()> {
    let fixture = InterviewFixture::with_options(FixtureOptions {
        scorer: ScriptedScorer::failing(u32::MAX, false),
        max_scoring_failures: 3,
        ..Default::default()
    });
    let id = fixture.start_interview().await?;

    assert!(fixture.orchestrator.submit_answer(id, "A").await.is_err());
    assert!(fixture.orchestrator.retry_scoring(id).await.is_err());
    match fixture.orchestrator.retry_scoring(id).await? {
        SubmitOutcome::Next { grade, question } => {
            assert_eq!(grade.score, 0);
            assert!(
                grade.feedback.starts_with("Scoring was unavailable after 3 attempts"),
                "{}",
                grade.feedback
            );
            assert_eq!(question.question_index, 1);
        }
        other => bail!("expected to advance, got {other:?}"),
    }
    assert_eq!(fixture.scorer.calls(), 3);

    let session = fixture.session(id).await?;
    assert_eq!(session.questions[0].score, Some(0));
    assert_eq!(session.questions[0].answer.as_deref(), Some("A"));
    assert_eq!(session.current_question_index, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transient_scoring_errors_are_retried_with_backoff() -> Result<()> {
    let fixture = InterviewFixture::with_options(FixtureOptions {
        scorer: ScriptedScorer::failing(2, true),
        ..Default::default()
    });
    let id = fixture.start_interview().await?;

    match fixture.orchestrator.submit_answer(id, "A").await? {
        SubmitOutcome::Next { grade, .. } => assert_eq!(grade.score, 10),
        other => bail!("expected to advance, got {other:?}"),
    }
    assert_eq!(fixture.scorer.calls(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn pending_scoring_survives_pause_and_resume() -> Result<()> {
    let fixture = InterviewFixture::with_options(FixtureOptions {
        scorer: ScriptedScorer::failing(1, false),
        ..Default::default()
    });
    let id = fixture.start_interview().await?;
    assert!(fixture.orchestrator.submit_answer(id, "C").await.is_err());

    fixture.orchestrator.pause(id).await?;
    let view = fixture.orchestrator.resume(id).await?;
    assert!(view.is_none(), "no countdown for an answered question");
    assert_eq!(fixture.orchestrator.live_remaining(id).await, None);

    match fixture.orchestrator.retry_scoring(id).await? {
        SubmitOutcome::Next { grade, .. } => assert_eq!(grade.score, 0),
        other => bail!("expected to advance, got {other:?}"),
    }
    Ok(())
}
