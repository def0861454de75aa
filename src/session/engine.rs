//! The session state machine
//!
//! The engine owns the [`Session`] for the duration of a run. Every mutation
//! goes through [`SessionEngine::run_step`] or [`SessionEngine::undo`], each
//! of which executes on a working copy of the data and commits only on
//! success, then persists before returning. Validity of a candidate
//! operation is derived from the step history, not from whatever happens to
//! be in the data, so an undone step cannot leave stale values re-enabling
//! work downstream of it.

use std::sync::Arc;

use tracing::{debug, info};

use super::data::{SessionData, Step, StepArgs};
use super::store::{Session, SessionStore};
use crate::error::{Error, Result};
use crate::ops::{OpContext, Operation, OperationRegistry, TypeTag};

pub struct SessionEngine {
    session: Session,
    registry: Arc<OperationRegistry>,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SessionEngine {
    /// Take ownership of a session. Every recorded step must reference a
    /// registered operation; a history referencing unknown names is treated
    /// as unusable up front rather than failing mid-run.
    pub fn new(
        session: Session,
        registry: Arc<OperationRegistry>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        for step in &session.steps {
            registry.lookup(&step.name)?;
        }
        Ok(Self {
            session,
            registry,
            store,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn data(&self) -> &SessionData {
        &self.session.data
    }

    pub fn steps(&self) -> &[Step] {
        &self.session.steps
    }

    /// Type-tags produced by the steps run so far, oldest first, deduplicated.
    pub fn produced_outputs(&self) -> Vec<TypeTag> {
        let mut seen = Vec::new();
        for step in &self.session.steps {
            if let Some(op) = self.registry.get(&step.name) {
                if !seen.contains(&op.output) {
                    seen.push(op.output);
                }
            }
        }
        seen
    }

    /// Whether `op` may run next, derived purely from the step history.
    pub fn is_valid(&self, op: &Operation) -> bool {
        Self::is_valid_operation(&self.session.steps, &self.registry, op)
    }

    /// An operation is valid when every input tag is the output of some
    /// prior step, and its own output either hasn't been produced yet or
    /// the operation is a filter narrowing that output in place.
    pub fn is_valid_operation(
        steps: &[Step],
        registry: &OperationRegistry,
        op: &Operation,
    ) -> bool {
        let previous: Vec<TypeTag> = steps
            .iter()
            .filter_map(|step| registry.get(&step.name))
            .map(|op| op.output)
            .collect();

        let has_all_inputs = op.inputs.iter().all(|input| previous.contains(input));
        let output_exists = previous.contains(&op.output);

        has_all_inputs && (op.is_filter() || !output_exists)
    }

    fn check_valid(&self, op: &Operation) -> Result<()> {
        let previous: Vec<TypeTag> = self
            .session
            .steps
            .iter()
            .filter_map(|step| self.registry.get(&step.name))
            .map(|op| op.output)
            .collect();

        let missing: Vec<TypeTag> = op
            .inputs
            .iter()
            .filter(|input| !previous.contains(input))
            .copied()
            .collect();
        let existing = (!op.is_filter() && previous.contains(&op.output)).then_some(op.output);

        if missing.is_empty() && existing.is_none() {
            Ok(())
        } else {
            Err(Error::InvalidOperation {
                operation: op.name.clone(),
                missing,
                existing,
            })
        }
    }

    /// Execute `op` and append it to the history.
    ///
    /// The handler runs against a working copy of the session data. On
    /// success the copy is committed, the step recorded, and the session
    /// persisted. On failure the session is byte-for-byte what it was, and
    /// is re-persisted so the file on disk is known fresh before the error
    /// surfaces.
    pub async fn run_step(
        &mut self,
        op: &Operation,
        args: StepArgs,
        ctx: &OpContext,
    ) -> Result<()> {
        self.check_valid(op)?;

        debug!(operation = %op.name, "running step");
        let mut working = self.session.data.clone();

        match op.action.execute(&args, &mut working, ctx).await {
            Ok(()) => {
                self.session.data = working;
                self.session.steps.push(Step {
                    name: op.name.clone(),
                    args,
                });
                self.store.save(&self.session).await?;
                info!(operation = %op.name, "step complete");
                Ok(())
            }
            Err(source) => {
                self.store.save(&self.session).await?;
                Err(Error::OperationFailed {
                    operation: op.name.clone(),
                    source,
                })
            }
        }
    }

    /// Undo the last step.
    ///
    /// Repeated applications of operations sharing the last step's output
    /// tag are one logical unit: the maximal suffix of such steps is
    /// unwound (undo handlers invoked most-recent-first, each given its
    /// recorded args overlaid with `extra`), then every unwound step except
    /// the final one is replayed in order to rebuild the intermediate
    /// state. Steps whose operations define no undo handler are unwound
    /// from history without reversing their external effects.
    pub async fn undo(&mut self, extra: &StepArgs, ctx: &OpContext) -> Result<()> {
        let Some(last) = self.session.steps.last() else {
            return Err(Error::NothingToUndo);
        };
        let target = self.registry.lookup(&last.name)?.output;

        let mut start = self.session.steps.len();
        while start > 0 {
            let op = self.registry.lookup(&self.session.steps[start - 1].name)?;
            if op.output != target {
                break;
            }
            start -= 1;
        }
        let unwound: Vec<Step> = self.session.steps[start..].to_vec();

        debug!(output = %target, steps = unwound.len(), "undoing last step");

        let mut working = self.session.data.clone();
        for step in unwound.iter().rev() {
            let op = self.registry.lookup(&step.name)?;
            if let Some(undo) = &op.undo {
                let merged = step.args.merged(extra);
                undo.undo(&merged, &mut working, ctx)
                    .await
                    .map_err(|source| Error::OperationFailed {
                        operation: step.name.clone(),
                        source,
                    })?;
            }
        }

        self.session.data = working;
        self.session.steps.truncate(start);
        self.store.save(&self.session).await?;

        // Rebuild the intermediate state: everything unwound except the
        // step actually being discarded.
        for step in &unwound[..unwound.len() - 1] {
            let op = Arc::clone(self.registry.lookup(&step.name)?);
            self.run_step(&op, step.args.clone(), ctx).await?;
        }

        info!(output = %target, "undo complete");
        Ok(())
    }
}
