use anyhow::{bail, Context, Result};
use interviewbase::{
    DashboardQuery, InterviewError, InterviewEvent, NextStep, SessionStatus, SortKey,
    SubmitOutcome,
};

use crate::support::interview_fixture::{
    advance_secs, complete_resume, drain, resume_with, FixtureOptions, InterviewFixture,
};
use crate::support::providers::{ScriptedQuestions, ScriptedScorer};

#[tokio::test(start_paused = true)]
async fn deleting_sessions_only_clears_the_matching_pointer() -> Result<()> {
    let fixture = InterviewFixture::new();
    let first = fixture.start_interview().await?;
    let second = fixture.start_interview().await?;
    assert_eq!(fixture.orchestrator.current_session_id().await, Some(second));

    fixture.orchestrator.delete(first).await?;
    assert_eq!(fixture.orchestrator.current_session_id().await, Some(second));

    fixture.orchestrator.delete(second).await?;
    assert_eq!(fixture.orchestrator.current_session_id().await, None);

    assert!(matches!(
        fixture.orchestrator.delete(second).await,
        Err(InterviewError::NotFound(id)) if id == second
    ));
    assert!(matches!(
        fixture.orchestrator.pause(second).await,
        Err(InterviewError::NotFound(_))
    ));
    assert!(matches!(
        fixture.orchestrator.submit_field(second, "x").await,
        Err(InterviewError::NotFound(_))
    ));
    assert!(fixture
        .orchestrator
        .dashboard(&DashboardQuery::default())
        .await
        .is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deleting_a_running_interview_stops_its_countdown() -> Result<()> {
    let fixture = InterviewFixture::new();
    let id = fixture.start_interview().await?;
    let mut events = fixture.orchestrator.subscribe();

    advance_secs(2).await;
    fixture.orchestrator.delete(id).await?;
    let before = drain(&mut events);
    assert!(before
        .iter()
        .any(|e| matches!(e, InterviewEvent::SessionDeleted { session_id } if *session_id == id)));

    advance_secs(30).await;
    assert!(
        drain(&mut events).is_empty(),
        "no countdown activity after deletion"
    );
    assert_eq!(fixture.scorer.calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn opening_a_new_session_pauses_the_running_one() -> Result<()> {
    let fixture = InterviewFixture::new();
    let first = fixture.start_interview().await?;
    advance_secs(4).await;

    let second = fixture.start_interview().await?;
    let paused = fixture.session(first).await?;
    assert_eq!(paused.status, SessionStatus::Paused);
    assert_eq!(paused.remaining_time, Some(16));
    assert_eq!(fixture.orchestrator.live_remaining(first).await, None);

    // Switching back pauses the second one in turn.
    fixture.orchestrator.select_session(first).await?;
    assert_eq!(fixture.orchestrator.current_session_id().await, Some(first));
    assert_eq!(
        fixture.session(second).await?.status,
        SessionStatus::Paused
    );
    let welcome = fixture
        .orchestrator
        .resume_view(first)
        .await?
        .context("paused session offers a welcome back")?;
    assert_eq!(welcome.remaining_time, Some(16));

    let view = fixture
        .orchestrator
        .resume(first)
        .await?
        .context("resumed question")?;
    assert_eq!(view.remaining, 16);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn session_left_during_question_generation_starts_paused() -> Result<()> {
    let fixture = InterviewFixture::with_options(FixtureOptions {
        questions: ScriptedQuestions::failing(1, true),
        ..Default::default()
    });
    let orchestrator = fixture.orchestrator.clone();
    let opening = tokio::spawn(async move { orchestrator.open_session(complete_resume()).await });

    // First attempt failed; the first session is backing off.
    while fixture.questions.calls() == 0 {
        tokio::task::yield_now().await;
    }
    let second = fixture.start_interview().await?;

    let opened = opening.await??;
    let first = opened.session_id;
    let question = match opened.next {
        NextStep::Started { question } => question,
        other => bail!("expected the first question, got {other:?}"),
    };
    assert_eq!(question.remaining, question.time_limit);

    assert_eq!(fixture.orchestrator.current_session_id().await, Some(second));
    let parked = fixture.session(first).await?;
    assert_eq!(parked.status, SessionStatus::Paused);
    assert_eq!(parked.remaining_time, Some(question.time_limit));
    assert_eq!(fixture.orchestrator.live_remaining(first).await, None);

    advance_secs(u64::from(question.time_limit) + 5).await;
    let parked = fixture.session(first).await?;
    assert_eq!(parked.current_question_index, 0);
    assert_eq!(parked.questions[0].answer, None);

    let view = fixture
        .orchestrator
        .resume(first)
        .await?
        .context("resumed question")?;
    assert_eq!(view.question_index, 0);
    assert_eq!(view.remaining, question.time_limit);
    assert_eq!(
        fixture.orchestrator.live_remaining(first).await,
        Some(question.time_limit)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn session_left_during_scoring_waits_paused_on_the_next_question() -> Result<()> {
    let fixture = InterviewFixture::with_options(FixtureOptions {
        scorer: ScriptedScorer::failing(1, true),
        ..Default::default()
    });
    let first = fixture.start_interview().await?;

    let orchestrator = fixture.orchestrator.clone();
    let submitting =
        tokio::spawn(async move { orchestrator.submit_answer_at(first, 0, "A").await });
    while fixture.scorer.calls() == 0 {
        tokio::task::yield_now().await;
    }
    let second = fixture.start_interview().await?;

    let question = match submitting.await?? {
        SubmitOutcome::Next { grade, question } => {
            assert_eq!(grade.score, 10);
            question
        }
        other => bail!("expected the next question, got {other:?}"),
    };
    assert_eq!(question.question_index, 1);
    assert_eq!(question.remaining, question.time_limit);

    assert_eq!(fixture.orchestrator.current_session_id().await, Some(second));
    let parked = fixture.session(first).await?;
    assert_eq!(parked.status, SessionStatus::Paused);
    assert_eq!(parked.current_question_index, 1);
    assert_eq!(parked.remaining_time, Some(question.time_limit));
    assert_eq!(fixture.orchestrator.live_remaining(first).await, None);

    advance_secs(u64::from(question.time_limit) + 5).await;
    assert_eq!(fixture.session(first).await?.questions[1].answer, None);

    let view = fixture
        .orchestrator
        .resume(first)
        .await?
        .context("resumed question")?;
    assert_eq!(view.question_index, 1);
    assert_eq!(view.remaining, question.time_limit);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dashboard_ranks_search_and_filters_live_sessions() -> Result<()> {
    let fixture = InterviewFixture::new();
    let finished = fixture.start_interview().await?;
    for answer in ["A", "B", "C", "D", "A", "A"] {
        fixture.orchestrator.submit_answer(finished, answer).await?;
    }

    let outcome = fixture
        .orchestrator
        .open_session(resume_with(Some("Grace Hopper"), None, None))
        .await?;
    assert!(matches!(outcome.next, NextStep::Collect { .. }));
    let collecting = outcome.session_id;

    let rows = fixture
        .orchestrator
        .dashboard(&DashboardQuery::default())
        .await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].session_id, finished);
    assert_eq!(rows[0].rank, 1);
    assert_eq!(rows[0].final_score, Some(50));
    assert_eq!(rows[1].session_id, collecting);
    assert_eq!(rows[1].final_score, None);

    let rows = fixture
        .orchestrator
        .dashboard(&DashboardQuery {
            search: Some("grace".into()),
            ..Default::default()
        })
        .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, SessionStatus::CollectingInfo);

    let rows = fixture
        .orchestrator
        .dashboard(&DashboardQuery {
            status: Some(SessionStatus::Completed),
            sort: SortKey::Name,
            ..Default::default()
        })
        .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].session_id, finished);
    Ok(())
}
