//! The guided step loop and session picker
//!
//! The loop repeatedly offers every registered operation (marking the ones
//! the session's history doesn't support yet), plus preview, undo, and
//! done. A failed step is displayed and the loop continues; the engine
//! guarantees the session was left untouched.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Error;
use crate::interaction::{SelectItem, UserInteraction};
use crate::ops::{OpContext, Operation, OperationRegistry};
use crate::session::{
    Session, SessionEngine, SessionStore, StepArgs, SESSION_EXTENSION,
};
use crate::types;

const WELCOME: &str = "\
Welcome to armada! You'll be guided through some steps to discover
repositories and make changes across them. First, give your session a
memorable name, so you can come back to it later.";

/// Run the interactive loop until the user picks `done`.
pub async fn run_loop(
    engine: &mut SessionEngine,
    registry: &OperationRegistry,
    ctx: &OpContext,
    interaction: &dyn UserInteraction,
    prefill: &StepArgs,
) -> Result<()> {
    loop {
        let ops: Vec<Arc<Operation>> = registry.all().cloned().collect();

        let mut items: Vec<SelectItem> = ops
            .iter()
            .map(|op| {
                SelectItem::new(op.name.as_str())
                    .hint(op.description.as_str())
                    .enabled(engine.is_valid(op))
            })
            .collect();
        items.push(SelectItem::new("preview").hint("show everything produced so far"));
        items.push(
            SelectItem::new("undo")
                .hint("undo last step")
                .enabled(!engine.steps().is_empty()),
        );
        items.push(SelectItem::new("done").hint(format!(
            "your work is autosaved as {}{SESSION_EXTENSION}",
            engine.session().name
        )));

        let header = types::session_summary(&engine.produced_outputs(), engine.data());
        let header = (!header.is_empty()).then_some(header);

        let choice = interaction
            .select("available operations", header.as_deref(), &items)
            .await?;

        if choice < ops.len() {
            let op = Arc::clone(&ops[choice]);
            let args = collect_args(&op, prefill, interaction).await?;
            match engine.run_step(&op, args, ctx).await {
                Ok(()) => interaction.success(&format!("{} complete", op.name)),
                Err(e @ (Error::OperationFailed { .. } | Error::InvalidOperation { .. })) => {
                    interaction.error(&e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        } else if choice == ops.len() {
            preview(engine, interaction);
        } else if choice == ops.len() + 1 {
            match engine.undo(prefill, ctx).await {
                Ok(()) => interaction.success("undone"),
                Err(e @ (Error::OperationFailed { .. } | Error::NothingToUndo)) => {
                    interaction.error(&e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            debug!("leaving the loop");
            return Ok(());
        }
    }
}

/// Collect the operation's declared parameters, preferring values the CLI
/// already supplied when they pass the parameter's rule.
async fn collect_args(
    op: &Operation,
    prefill: &StepArgs,
    interaction: &dyn UserInteraction,
) -> Result<StepArgs> {
    let mut args = StepArgs::new();
    for param in &op.params {
        if let Some(value) = prefill.get(param.name) {
            if param.rule.check(value).is_ok() {
                args.set(param.name, value);
                continue;
            }
        }

        loop {
            let answer = interaction.text(param.prompt, None).await?;
            match param.rule.check(&answer) {
                Ok(()) => {
                    args.set(param.name, answer);
                    break;
                }
                Err(message) => interaction.error(&message),
            }
        }
    }
    Ok(args)
}

/// Render every produced type's current value.
fn preview(engine: &SessionEngine, interaction: &dyn UserInteraction) {
    for tag in engine.produced_outputs() {
        interaction.info(&format!("───── {tag}"));
        let rendered = types::format(tag, engine.data());
        if !rendered.is_empty() {
            interaction.info(&rendered);
        }
    }
    interaction.info("─────");
}

/// Resolve which session to run: the named one when `--session` was given
/// (created on first use), otherwise whatever the picker ends on.
pub async fn resolve_session(
    store: &Arc<dyn SessionStore>,
    interaction: &dyn UserInteraction,
    name: Option<&str>,
) -> Result<Session> {
    match name {
        Some(name) => {
            if store.exists(name).await? {
                open_with_recovery(store, interaction, name).await
            } else {
                Ok(store.create(name).await?)
            }
        }
        None => pick_session(store, interaction).await,
    }
}

/// The session picker: resume, start new, or delete saved sessions.
async fn pick_session(
    store: &Arc<dyn SessionStore>,
    interaction: &dyn UserInteraction,
) -> Result<Session> {
    loop {
        let entries = store.list().await?;

        if entries.is_empty() {
            interaction.info(WELCOME);
            let name = prompt_session_name(interaction).await?;
            return Ok(store.create(&name).await?);
        }

        let mut items: Vec<SelectItem> = entries
            .iter()
            .map(|entry| SelectItem::new(entry.name.as_str()).hint(relative_time(entry.modified, Utc::now())))
            .collect();
        items.push(SelectItem::new("new").hint("start a new session"));
        items.push(SelectItem::new("delete").hint("delete saved sessions"));

        let choice = interaction
            .select("resume a session", None, &items)
            .await?;

        if choice < entries.len() {
            let name = &entries[choice].name;
            match open_with_recovery(store, interaction, name).await {
                Ok(session) => return Ok(session),
                // Recovery declined; show the picker again.
                Err(e) if e.is::<Declined>() => continue,
                Err(e) => return Err(e),
            }
        } else if choice == entries.len() {
            let name = prompt_session_name(interaction).await?;
            match store.create(&name).await {
                Ok(session) => return Ok(session),
                Err(Error::SessionExists(name)) => {
                    interaction.error(&format!("a session named '{name}' already exists"));
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            delete_sessions(store, interaction).await?;
        }
    }
}

/// Marker for "the user chose not to recover a corrupt session".
#[derive(Debug, thiserror::Error)]
#[error("recovery declined")]
struct Declined;

/// Open a saved session; on a corrupt file, offer to start it fresh.
async fn open_with_recovery(
    store: &Arc<dyn SessionStore>,
    interaction: &dyn UserInteraction,
    name: &str,
) -> Result<Session> {
    match store.open(name).await {
        Ok(session) => Ok(session),
        Err(Error::CorruptSession { path, source }) => {
            interaction.error(&format!("{} couldn't be parsed: {source}", path.display()));
            if interaction
                .confirm(&format!("start '{name}' over with an empty session?"))
                .await?
            {
                store.delete(name).await?;
                Ok(store.create(name).await?)
            } else {
                Err(Declined.into())
            }
        }
        Err(e) => Err(e.into()),
    }
}

async fn prompt_session_name(interaction: &dyn UserInteraction) -> Result<String> {
    loop {
        let name = interaction.text("name this session", None).await?;
        let trimmed = name.trim();
        if trimmed.is_empty() {
            interaction.error("please enter a session name");
        } else if trimmed.contains(['/', '\\']) {
            interaction.error("session names can't contain path separators");
        } else {
            return Ok(trimmed.to_string());
        }
    }
}

async fn delete_sessions(
    store: &Arc<dyn SessionStore>,
    interaction: &dyn UserInteraction,
) -> Result<()> {
    let entries = store.list().await?;
    let mut items: Vec<SelectItem> = entries
        .iter()
        .map(|entry| SelectItem::new(entry.name.as_str()).hint(relative_time(entry.modified, Utc::now())))
        .collect();
    items.push(SelectItem::new("back"));

    let choice = interaction
        .select("select a session to delete", None, &items)
        .await?;
    if choice == entries.len() {
        return Ok(());
    }

    let name = &entries[choice].name;
    if interaction
        .confirm(&format!("really delete '{name}'?"))
        .await?
    {
        store.delete(name).await?;
        interaction.success(&format!("deleted '{name}'"));
    }
    Ok(())
}

/// Coarse relative time for the picker, e.g. `2 hours ago`.
fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    plural(elapsed.num_days(), "day")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::MockInteraction;
    use crate::ops::{OperationAction, ParamRule, ParamSpec, TypeTag};
    use crate::session::store::InMemorySessionStore;
    use crate::session::{RepoRecord, SessionData};
    use crate::testkit::bare_context;
    use async_trait::async_trait;
    use chrono::Duration;

    struct Discover;

    #[async_trait]
    impl OperationAction for Discover {
        async fn execute(
            &self,
            args: &StepArgs,
            data: &mut SessionData,
            _ctx: &OpContext,
        ) -> anyhow::Result<()> {
            let owner = args.require("owner")?;
            data.repos = Some(vec![RepoRecord::new(owner, "widgets")]);
            Ok(())
        }
    }

    fn test_registry() -> OperationRegistry {
        let mut registry = OperationRegistry::new();
        registry
            .register(Operation {
                name: "discover".to_string(),
                description: "find repos".to_string(),
                inputs: vec![],
                output: TypeTag::Repos,
                params: vec![ParamSpec::new("owner", "repo owner", ParamRule::NonEmpty)],
                action: Arc::new(Discover),
                undo: None,
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn loop_runs_a_step_then_exits() {
        let registry = Arc::new(test_registry());
        let store = Arc::new(InMemorySessionStore::new());
        let session = store.create("test").await.unwrap();
        let mut engine = SessionEngine::new(
            session,
            Arc::clone(&registry),
            store.clone() as Arc<dyn SessionStore>,
        )
        .unwrap();
        let ctx = bare_context();

        let interaction = MockInteraction::new();
        interaction.push_selection(0); // discover
        interaction.push_text("acme"); // owner
        interaction.push_selection(3); // done (discover, preview, undo, done)

        run_loop(&mut engine, &registry, &ctx, &interaction, &StepArgs::new())
            .await
            .unwrap();

        assert_eq!(engine.steps().len(), 1);
        assert_eq!(engine.data().repos.as_ref().unwrap()[0].owner, "acme");
    }

    #[tokio::test]
    async fn prefilled_args_skip_the_prompt() {
        let registry = Arc::new(test_registry());
        let store = Arc::new(InMemorySessionStore::new());
        let session = store.create("test").await.unwrap();
        let mut engine = SessionEngine::new(
            session,
            Arc::clone(&registry),
            store.clone() as Arc<dyn SessionStore>,
        )
        .unwrap();
        let ctx = bare_context();

        let interaction = MockInteraction::new();
        interaction.push_selection(0); // discover; no text queued
        interaction.push_selection(3); // done

        let prefill: StepArgs = [("owner", "acme")].into_iter().collect();
        run_loop(&mut engine, &registry, &ctx, &interaction, &prefill)
            .await
            .unwrap();

        assert_eq!(engine.steps()[0].args.get("owner"), Some("acme"));
    }

    #[tokio::test]
    async fn picker_creates_a_named_session_on_first_run() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let interaction = MockInteraction::new();
        interaction.push_text("migration");

        let session = resolve_session(&store, &interaction, None).await.unwrap();
        assert_eq!(session.name, "migration");
        assert!(interaction
            .recorded_messages()
            .iter()
            .any(|m| m.contains("Welcome to armada")));
    }

    #[tokio::test]
    async fn named_session_is_created_then_reopened() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let interaction = MockInteraction::new();

        let session = resolve_session(&store, &interaction, Some("batch"))
            .await
            .unwrap();
        assert_eq!(session.name, "batch");

        // Second resolve finds the saved file instead of creating.
        let again = resolve_session(&store, &interaction, Some("batch"))
            .await
            .unwrap();
        assert_eq!(again.name, "batch");
    }

    #[test]
    fn relative_times_read_naturally() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(relative_time(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(relative_time(now - Duration::days(3), now), "3 days ago");
    }
}
