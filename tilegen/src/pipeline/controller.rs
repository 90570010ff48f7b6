//! Plan → Generate → Validate → Retry* → Report.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::observer::ProgressObserver;
use super::retry::{RetryController, RetryVerdict};
use super::state::{PipelineState, RunOutcome};
use super::PipelineError;
use crate::context::RunContext;
use crate::plan::{GridPlanner, Scope, ZoomRange};
use crate::reconcile::{TileCheck, ValidationReport};
use crate::supervisor::RoundRunner;
use crate::worker::WorkerScriptSynthesizer;

/// Final account of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub project: String,
    /// Terminal state.
    pub state: PipelineState,
    pub outcome: RunOutcome,
    /// Planned tile count.
    pub estimate: u64,
    /// Disk scan taken after the last round.
    pub validation: ValidationReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Completed
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Project:  {}", self.project)?;
        writeln!(f, "Status:   {}", self.state)?;
        writeln!(
            f,
            "Tiles:    {} planned, {} produced, {} failed",
            self.estimate,
            self.outcome.produced.len(),
            self.outcome.failed.len()
        )?;
        writeln!(f, "Rounds:   {}", self.outcome.rounds_attempted)?;
        writeln!(f, "Duration: {}s", self.duration().num_seconds())?;
        write!(f, "{}", self.validation)
    }
}

/// Drives one project from scope to a terminal [`PipelineState`].
///
/// A controller holds no per-run state and can serve several projects
/// concurrently. Two runs for the same project must not overlap; callers
/// serialize them.
#[derive(Debug, Clone)]
pub struct PipelineController {
    retry: RetryController,
}

impl PipelineController {
    pub fn new(runner: Arc<dyn RoundRunner>, synthesizer: WorkerScriptSynthesizer) -> Self {
        Self {
            retry: RetryController::new(runner, synthesizer),
        }
    }

    pub fn with_tile_check(mut self, check: TileCheck) -> Self {
        self.retry = self.retry.with_tile_check(check);
        self
    }

    /// Maximum retry rounds after round 0.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.retry = self.retry.with_max_rounds(max_rounds);
        self
    }

    pub fn retry_controller(&self) -> &RetryController {
        &self.retry
    }

    /// Runs the whole pipeline.
    ///
    /// Invalid or empty scopes are rejected with `Err` before any worker
    /// starts. Everything after planning ends in a report whose state is
    /// `Completed`, `PartialFailure` or `Aborted`.
    pub async fn run(
        &self,
        scope: &Scope,
        zoom_range: ZoomRange,
        ctx: &RunContext,
        cancel: CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Result<PipelineReport, PipelineError> {
        let started_at = Utc::now();
        let project = ctx.project_name();

        observer.on_state(&PipelineState::Planning);
        let plan = GridPlanner::plan(scope, zoom_range)?;
        let estimate = GridPlanner::estimate(scope, zoom_range)?;
        if plan.is_empty() {
            return Err(PipelineError::EmptyScope {
                scope: scope.mode_name(),
                min_zoom: zoom_range.min(),
                max_zoom: zoom_range.max(),
            });
        }
        info!(
            project,
            scope = scope.mode_name(),
            min_zoom = zoom_range.min(),
            max_zoom = zoom_range.max(),
            tiles = estimate,
            "Planned generation"
        );

        let mut outcome = RunOutcome::new(plan.iter().collect());

        // Round 0 only asks for what is not on disk yet.
        let initial = self.retry.validate(&plan, ctx, &mut outcome);
        let pending: BTreeSet<_> = initial.missing().clone();
        if pending.is_empty() {
            info!(project, "All planned tiles already present");
        } else {
            if pending.len() as u64 != estimate {
                info!(
                    project,
                    present = estimate - pending.len() as u64,
                    pending = pending.len(),
                    "Resuming from existing tiles"
                );
            }
            observer.on_state(&PipelineState::Generating {
                tiles: pending.len() as u64,
            });
            let summary = self
                .retry
                .run_round(0, &pending, ctx, &cancel, observer)
                .await;
            outcome.rounds_attempted = 1;

            if let Some(message) = summary.error {
                let validation = self.retry.validate(&plan, ctx, &mut outcome);
                let state = PipelineState::Aborted { message };
                return Ok(self.finish(ctx, state, outcome, estimate, validation, started_at, observer));
            }
        }

        let result = self
            .retry
            .retry(&plan, ctx, &mut outcome, &cancel, observer)
            .await;

        let state = match result.verdict {
            RetryVerdict::Converged => PipelineState::Completed,
            RetryVerdict::Exhausted => PipelineState::PartialFailure {
                failed: outcome.failed.clone(),
            },
            RetryVerdict::Aborted { message } => PipelineState::Aborted { message },
        };
        Ok(self.finish(ctx, state, outcome, estimate, result.validation, started_at, observer))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        ctx: &RunContext,
        state: PipelineState,
        outcome: RunOutcome,
        estimate: u64,
        validation: ValidationReport,
        started_at: DateTime<Utc>,
        observer: &dyn ProgressObserver,
    ) -> PipelineReport {
        match &state {
            PipelineState::Completed => info!(
                project = ctx.project_name(),
                tiles = outcome.produced.len(),
                rounds = outcome.rounds_attempted,
                "Generation completed"
            ),
            PipelineState::PartialFailure { failed } => warn!(
                project = ctx.project_name(),
                failed = failed.len(),
                rounds = outcome.rounds_attempted,
                "Generation finished with missing tiles"
            ),
            PipelineState::Aborted { message } => warn!(
                project = ctx.project_name(),
                message = %message,
                rounds = outcome.rounds_attempted,
                "Generation aborted"
            ),
            _ => {}
        }
        observer.on_state(&state);

        PipelineReport {
            project: ctx.project_name().to_string(),
            state,
            outcome,
            estimate,
            validation,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::pipeline::NoopObserver;
    use crate::plan::GeoBoundingBox;
    use crate::supervisor::{EventStream, ProgressEvent, SupervisorError};
    use crate::worker::WorkerProgram;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Writes every tile of the program and reports success.
    struct WritingRunner {
        ctx: RunContext,
        rounds: AtomicU32,
    }

    impl RoundRunner for WritingRunner {
        fn start_round(
            &self,
            program: &WorkerProgram,
            _cancel: CancellationToken,
        ) -> Result<EventStream, SupervisorError> {
            self.rounds.fetch_add(1, Ordering::SeqCst);
            let mut events = Vec::new();
            for tile in program.tiles() {
                let path = self.ctx.tile_path(&tile);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, b"png").unwrap();
                events.push(ProgressEvent::TileCompleted { coord: tile });
            }
            events.push(ProgressEvent::RunFinished {
                success_count: program.tile_count(),
                fail_count: 0,
            });
            Ok(EventStream::from_events(events))
        }
    }

    struct FailingSpawn;

    impl RoundRunner for FailingSpawn {
        fn start_round(
            &self,
            _program: &WorkerProgram,
            _cancel: CancellationToken,
        ) -> Result<EventStream, SupervisorError> {
            Err(SupervisorError::EmptyLauncher)
        }
    }

    fn setup() -> (TempDir, RunContext) {
        let dir = TempDir::new().unwrap();
        let ctx = RunContext::new(dir.path(), "test", "http://localhost/tile").unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_full_scope_completes_in_one_round() {
        let (_dir, ctx) = setup();
        let runner = Arc::new(WritingRunner {
            ctx: ctx.clone(),
            rounds: AtomicU32::new(0),
        });
        let controller = PipelineController::new(runner.clone(), WorkerScriptSynthesizer::python());

        let report = controller
            .run(
                &Scope::Full,
                ZoomRange::new(0, 1).unwrap(),
                &ctx,
                CancellationToken::new(),
                &NoopObserver,
            )
            .await
            .unwrap();

        assert_eq!(report.state, PipelineState::Completed);
        assert_eq!(report.estimate, 5);
        assert_eq!(report.outcome.produced.len(), 5);
        assert!(report.outcome.failed.is_empty());
        assert_eq!(report.outcome.rounds_attempted, 1);
        assert!(report.outcome.is_accounted());
        assert_eq!(runner.rounds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rerun_on_complete_project_launches_nothing() {
        let (_dir, ctx) = setup();
        let runner = Arc::new(WritingRunner {
            ctx: ctx.clone(),
            rounds: AtomicU32::new(0),
        });
        let controller = PipelineController::new(runner.clone(), WorkerScriptSynthesizer::python());
        let zooms = ZoomRange::new(0, 2).unwrap();

        controller
            .run(&Scope::Full, zooms, &ctx, CancellationToken::new(), &NoopObserver)
            .await
            .unwrap();
        let second = controller
            .run(&Scope::Full, zooms, &ctx, CancellationToken::new(), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(second.state, PipelineState::Completed);
        assert_eq!(second.outcome.rounds_attempted, 0);
        assert_eq!(runner.rounds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resume_requests_only_missing_tiles() {
        let (_dir, ctx) = setup();
        let present = TileCoord { zoom: 0, x: 0, y: 0 };
        let path = ctx.tile_path(&present);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"png").unwrap();

        struct AssertingRunner(WritingRunner, TileCoord);
        impl RoundRunner for AssertingRunner {
            fn start_round(
                &self,
                program: &WorkerProgram,
                cancel: CancellationToken,
            ) -> Result<EventStream, SupervisorError> {
                assert!(program.tiles().all(|t| t != self.1));
                assert_eq!(program.tile_count(), 4);
                self.0.start_round(program, cancel)
            }
        }

        let runner = Arc::new(AssertingRunner(
            WritingRunner {
                ctx: ctx.clone(),
                rounds: AtomicU32::new(0),
            },
            present,
        ));
        let report = PipelineController::new(runner, WorkerScriptSynthesizer::python())
            .run(
                &Scope::Full,
                ZoomRange::new(0, 1).unwrap(),
                &ctx,
                CancellationToken::new(),
                &NoopObserver,
            )
            .await
            .unwrap();
        assert_eq!(report.state, PipelineState::Completed);
    }

    #[tokio::test]
    async fn test_zero_area_bbox_is_empty_scope() {
        let (_dir, ctx) = setup();
        let scope = Scope::BoundingBox(GeoBoundingBox::new(35.1, 35.1, 33.3, 33.4).unwrap());
        let result = PipelineController::new(Arc::new(FailingSpawn), WorkerScriptSynthesizer::python())
            .run(
                &scope,
                ZoomRange::single(10).unwrap(),
                &ctx,
                CancellationToken::new(),
                &NoopObserver,
            )
            .await;
        assert!(matches!(result, Err(PipelineError::EmptyScope { .. })));
    }

    #[tokio::test]
    async fn test_spawn_failure_aborts() {
        let (_dir, ctx) = setup();
        let report = PipelineController::new(Arc::new(FailingSpawn), WorkerScriptSynthesizer::python())
            .run(
                &Scope::Full,
                ZoomRange::single(1).unwrap(),
                &ctx,
                CancellationToken::new(),
                &NoopObserver,
            )
            .await
            .unwrap();

        assert!(matches!(report.state, PipelineState::Aborted { .. }));
        assert_eq!(report.outcome.rounds_attempted, 1);
        assert_eq!(report.outcome.failed.len(), 4);
        assert!(report.outcome.is_accounted());
    }
}
