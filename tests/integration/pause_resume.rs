use anyhow::{Context, Result};
use interviewbase::session::snapshot;
use interviewbase::{InterviewError, InterviewOrchestrator, SessionStatus};

use crate::support::interview_fixture::{
    advance_secs, drain, FixtureOptions, InterviewFixture,
};

#[tokio::test(start_paused = true)]
async fn pause_keeps_the_live_countdown_and_resume_consumes_it_once() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;

    advance_secs(5).await;
    fixture.orchestrator.pause(id).await?;

    let paused = fixture.session(id).await?;
    assert_eq!(paused.status, SessionStatus::Paused);
    assert_eq!(paused.remaining_time, Some(15));
    assert!(paused.paused_at.is_some());
    assert_eq!(fixture.orchestrator.live_remaining(id).await, None);

    // Nothing moves while paused.
    let mut events = fixture.orchestrator.subscribe();
    advance_secs(60).await;
    assert!(drain(&mut events).is_empty());
    let still = fixture.session(id).await?;
    assert!(still.questions[0].answer.is_none());
    assert_eq!(still.remaining_time, Some(15));

    let welcome = fixture
        .orchestrator
        .resume_view(id)
        .await?
        .context("paused session offers a welcome back")?;
    assert_eq!(welcome.questions_completed, 0);
    assert_eq!(welcome.questions_remaining, 6);
    assert_eq!(welcome.remaining_time, Some(15));
    assert_eq!(welcome.name.as_deref(), paused.name.as_deref());

    let view = fixture
        .orchestrator
        .resume(id)
        .await?
        .context("resumed question")?;
    assert_eq!(view.question_index, 0);
    assert_eq!(view.remaining, 15);

    let resumed = fixture.session(id).await?;
    assert_eq!(resumed.status, SessionStatus::InProgress);
    assert_eq!(resumed.remaining_time, None, "carried value is consumed");
    assert_eq!(fixture.orchestrator.resume_view(id).await?, None);

    advance_secs(15).await;
    let expired = fixture.session(id).await?;
    assert_eq!(expired.questions[0].answer.as_deref(), Some(""));
    assert_eq!(expired.current_question_index, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn time_spent_counts_only_running_time() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;

    advance_secs(4).await;
    fixture.orchestrator.pause(id).await?;
    advance_secs(30).await;
    fixture.orchestrator.resume(id).await?;
    advance_secs(2).await;
    fixture.orchestrator.submit_answer_at(id, 0, "A").await?;

    let session = fixture.session(id).await?;
    assert_eq!(session.questions[0].time_spent, Some(6));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn only_running_interviews_can_pause() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;

    fixture.orchestrator.pause(id).await?;
    let again = fixture.orchestrator.pause(id).await;
    assert!(matches!(
        again,
        Err(InterviewError::InvalidTransition {
            from: SessionStatus::Paused,
            ..
        })
    ));

    fixture.orchestrator.resume(id).await?;
    for answer in ["A", "B", "C", "D", "A", "B"] {
        fixture.orchestrator.submit_answer(id, answer).await?;
    }
    assert!(matches!(
        fixture.orchestrator.pause(id).await,
        Err(InterviewError::InvalidTransition {
            from: SessionStatus::Completed,
            ..
        })
    ));
    assert!(matches!(
        fixture.orchestrator.resume(id).await,
        Err(InterviewError::InvalidTransition { .. })
    ));
    assert_eq!(fixture.orchestrator.resume_view(id).await?, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restored_snapshot_resumes_from_the_persisted_countdown() -> Result<()> {
    let fixture = InterviewFixture::with_options(FixtureOptions {
        snapshot: true,
        ..Default::default()
    });
    let id = fixture.start_interview().await?;
    advance_secs(7).await;

    // The last persisted tick is what survives an abrupt stop.
    let store = snapshot::load(&fixture.snapshot_path())?.context("snapshot written")?;
    let mut settings = fixture.settings();
    settings.snapshot_path = None;
    let restored = InterviewOrchestrator::with_store(store, fixture.providers(), settings);

    assert_eq!(restored.current_session_id().await, Some(id));
    let session = restored.session(id).await?;
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.remaining_time, Some(13));
    assert_eq!(restored.live_remaining(id).await, None);

    let welcome = restored
        .resume_view(id)
        .await?
        .context("interrupted session offers a welcome back")?;
    assert_eq!(welcome.remaining_time, Some(13));

    let view = restored.resume(id).await?.context("resumed question")?;
    assert_eq!(view.remaining, 13);
    assert_eq!(restored.session(id).await?.remaining_time, None);
    assert_eq!(restored.live_remaining(id).await, Some(13));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_pauses_running_interviews() -> Result<()> {
    let fixture = InterviewFixture::with_options(FixtureOptions {
        snapshot: true,
        ..Default::default()
    });
    let id = fixture.start_interview().await?;
    advance_secs(2).await;

    fixture.orchestrator.shutdown().await;

    let store = snapshot::load(&fixture.snapshot_path())?.context("snapshot written")?;
    let saved = store.get(&id).context("session saved")?;
    assert_eq!(saved.status, SessionStatus::Paused);
    assert_eq!(saved.remaining_time, Some(18));
    Ok(())
}
