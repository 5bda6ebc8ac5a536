//! Then steps for board mutation BDD scenarios.

use super::world::BoardWorld;
use gantry::task::{
    domain::{TaskDomainError, TaskStatus},
    services::BoardServiceError,
};
use rstest_bdd_macros::then;

#[then("the request succeeds")]
fn request_succeeds(world: &BoardWorld) -> Result<(), eyre::Report> {
    match world.last_result.as_ref() {
        Some(Ok(_)) => Ok(()),
        Some(Err(err)) => Err(eyre::eyre!("expected success, got {err}")),
        None => Err(eyre::eyre!("no request has been made")),
    }
}

#[then("the request is denied")]
fn request_denied(world: &BoardWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no request has been made"))?;
    if !matches!(
        result,
        Err(BoardServiceError::Domain(
            TaskDomainError::PermissionDenied { .. }
        ))
    ) {
        return Err(eyre::eyre!("expected PermissionDenied, got {result:?}"));
    }
    Ok(())
}

#[then("the request fails with an invalid transition")]
fn request_fails_invalid_transition(world: &BoardWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no request has been made"))?;
    if !matches!(
        result,
        Err(BoardServiceError::Domain(
            TaskDomainError::InvalidStatusTransition { .. }
        ))
    ) {
        return Err(eyre::eyre!(
            "expected InvalidStatusTransition, got {result:?}"
        ));
    }
    Ok(())
}

#[then("the request fails with a commit error")]
fn request_fails_commit(world: &BoardWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no request has been made"))?;
    if !matches!(result, Err(BoardServiceError::Commit(_))) {
        return Err(eyre::eyre!("expected a commit failure, got {result:?}"));
    }
    Ok(())
}

#[then(r#"the board shows "{title}" as "{status}""#)]
fn board_shows_status(
    world: &BoardWorld,
    title: String,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task_id = world.task(&title)?;
    let projected = world
        .service
        .projected_task(world.project, task_id)
        .map_err(|err| eyre::eyre!("projected task: {err}"))?;

    if projected.task.status() != expected {
        return Err(eyre::eyre!(
            "expected status {}, found {}",
            expected.as_str(),
            projected.task.status().as_str()
        ));
    }
    Ok(())
}

#[then("the store received no status commits")]
fn store_received_no_status_commits(world: &BoardWorld) -> Result<(), eyre::Report> {
    let calls = world.store.status_calls();
    if calls != 0 {
        return Err(eyre::eyre!("expected zero status commits, found {calls}"));
    }
    Ok(())
}

#[then(r#"the board order is "{first}", "{second}", "{third}""#)]
fn board_order_is(
    world: &BoardWorld,
    first: String,
    second: String,
    third: String,
) -> Result<(), eyre::Report> {
    let expected = [
        world.task(&first)?,
        world.task(&second)?,
        world.task(&third)?,
    ];
    let projection = world
        .service
        .local_projection(world.project)
        .map_err(|err| eyre::eyre!("local projection: {err}"))?;
    let actual: Vec<_> = projection.iter().map(|task| task.id()).collect();

    if actual != expected {
        return Err(eyre::eyre!("board order mismatch: {actual:?}"));
    }
    Ok(())
}
