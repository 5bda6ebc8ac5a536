//! When steps for board mutation BDD scenarios.

use super::world::{BoardWorld, run_async};
use rstest_bdd_macros::when;

#[when(r#""{user}" moves "{title}" to "{status}""#)]
fn move_task_status(
    world: &mut BoardWorld,
    user: String,
    title: String,
    status: String,
) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let task_id = world.task(&title)?;
    let result = run_async(world.service.request_status_change(
        actor,
        world.project,
        task_id,
        &status,
    ));
    world.last_result = Some(result);
    Ok(())
}

#[when(r#""{user}" moves "{title}" to position {index:usize}"#)]
fn move_task_position(
    world: &mut BoardWorld,
    user: String,
    title: String,
    index: usize,
) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let task_id = world.task(&title)?;
    let result = run_async(
        world
            .service
            .request_reorder(actor, world.project, task_id, index),
    );
    world.last_result = Some(result);
    Ok(())
}
