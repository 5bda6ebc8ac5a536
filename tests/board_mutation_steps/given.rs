//! Given steps for board mutation BDD scenarios.

use super::world::{BoardWorld, run_async};
use gantry::task::domain::ProjectRole;
use rstest_bdd_macros::given;

#[given(r#"a project with an admin "{admin}" and a member "{member}""#)]
fn project_with_members(
    world: &mut BoardWorld,
    admin: String,
    member: String,
) -> Result<(), eyre::Report> {
    world.register_user(&admin, ProjectRole::Admin)?;
    world.register_user(&member, ProjectRole::User)?;
    Ok(())
}

#[given(r#"a member "{name}""#)]
fn additional_member(world: &mut BoardWorld, name: String) -> Result<(), eyre::Report> {
    world.register_user(&name, ProjectRole::User)?;
    Ok(())
}

#[given(r#"a task "{title}" assigned to "{user}" with sequence {sequence:i64}"#)]
fn seeded_task(
    world: &mut BoardWorld,
    title: String,
    user: String,
    sequence: i64,
) -> Result<(), eyre::Report> {
    let assigned_to = world.user(&user)?;
    let task = world.build_task(&title, assigned_to, sequence);
    world.tasks.insert(title, task.id());
    world.pending_tasks.push(task);
    Ok(())
}

#[given("the board has been loaded")]
fn board_loaded(world: &mut BoardWorld) -> Result<(), eyre::Report> {
    world
        .store
        .seed_project(world.project, world.pending_tasks.clone())
        .map_err(|err| eyre::eyre!("seed project: {err}"))?;
    run_async(world.service.load_project(world.project))
        .map_err(|err| eyre::eyre!("load project: {err}"))?;
    Ok(())
}

#[given("the store rejects the next commit")]
fn store_rejects_next_commit(world: &mut BoardWorld) {
    world.store.reject_next_commits(1);
}
