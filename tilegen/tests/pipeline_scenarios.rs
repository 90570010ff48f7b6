//! End-to-end pipeline behaviour with a scripted worker runner.
//!
//! The runner writes tile files itself, so the real filesystem validation and
//! retry logic run unchanged.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tilegen::coord::TileCoord;
use tilegen::pipeline::{PipelineController, PipelineState, ProgressObserver};
use tilegen::plan::{GeoBoundingBox, GridPlanner, Scope, ZoomRange};
use tilegen::supervisor::{EventStream, ProgressEvent, RoundRunner, SupervisorError};
use tilegen::worker::{WorkerProgram, WorkerScriptSynthesizer};
use tilegen::RunContext;
use tokio_util::sync::CancellationToken;

type FailRule = Box<dyn Fn(usize, &TileCoord) -> bool + Send + Sync>;

/// Writes every tile of a round except those `fails` selects, and records
/// which tiles each round was asked for.
struct ScriptedRunner {
    ctx: RunContext,
    fails: FailRule,
    rounds: Mutex<Vec<BTreeSet<TileCoord>>>,
}

impl ScriptedRunner {
    fn new(ctx: &RunContext, fails: FailRule) -> Arc<Self> {
        Arc::new(Self {
            ctx: ctx.clone(),
            fails,
            rounds: Mutex::new(Vec::new()),
        })
    }

    fn rounds(&self) -> Vec<BTreeSet<TileCoord>> {
        self.rounds.lock().unwrap().clone()
    }
}

impl RoundRunner for ScriptedRunner {
    fn start_round(
        &self,
        program: &WorkerProgram,
        _cancel: CancellationToken,
    ) -> Result<EventStream, SupervisorError> {
        let mut rounds = self.rounds.lock().unwrap();
        let round = rounds.len();
        rounds.push(program.tiles().collect());

        let mut events = vec![ProgressEvent::Diagnostic {
            line: format!("# round {}", round),
        }];
        let (mut ok, mut err) = (0, 0);
        for tile in program.tiles() {
            if (self.fails)(round, &tile) {
                err += 1;
                events.push(ProgressEvent::TileFailed {
                    coord: tile,
                    reason: "http_502".to_string(),
                });
            } else {
                let path = self.ctx.tile_path(&tile);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").unwrap();
                ok += 1;
                events.push(ProgressEvent::TileCompleted { coord: tile });
            }
        }
        events.push(ProgressEvent::RunFinished {
            success_count: ok,
            fail_count: err,
        });
        Ok(EventStream::from_events(events))
    }
}

/// Runner whose worker dies at run level.
struct BrokenEnvironment;

impl RoundRunner for BrokenEnvironment {
    fn start_round(
        &self,
        _program: &WorkerProgram,
        _cancel: CancellationToken,
    ) -> Result<EventStream, SupervisorError> {
        Ok(EventStream::from_events(vec![
            ProgressEvent::Diagnostic {
                line: "Traceback (most recent call last):".to_string(),
            },
            ProgressEvent::RunError {
                message: "rendering endpoint unreachable".to_string(),
            },
        ]))
    }
}

#[derive(Default)]
struct RecordingObserver {
    states: Mutex<Vec<PipelineState>>,
    events: Mutex<Vec<(u32, ProgressEvent)>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_state(&self, state: &PipelineState) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn on_event(&self, round: u32, event: &ProgressEvent) {
        self.events.lock().unwrap().push((round, event.clone()));
    }
}

/// 2 columns x 5 rows at zoom 10 around Cyprus.
fn ten_tile_scope() -> (Scope, ZoomRange) {
    let bbox = GeoBoundingBox::new(34.25, 35.2, 33.3, 33.45).unwrap();
    (Scope::BoundingBox(bbox), ZoomRange::single(10).unwrap())
}

fn setup() -> (TempDir, RunContext) {
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::new(dir.path(), "cyprus", "http://localhost/tile").unwrap();
    (dir, ctx)
}

fn tile(x: u32, y: u32) -> TileCoord {
    TileCoord { zoom: 10, x, y }
}

#[test]
fn test_ten_tile_scope_shape() {
    let (scope, zooms) = ten_tile_scope();
    let plan = GridPlanner::plan(&scope, zooms).unwrap();
    assert_eq!(plan.len(), 10);
    assert_eq!(GridPlanner::estimate(&scope, zooms).unwrap(), 10);
    assert!(plan.contains(&tile(606, 404)));
    assert!(plan.contains(&tile(607, 408)));
}

#[tokio::test]
async fn test_failed_tiles_are_retried_alone_and_converge() {
    let (_dir, ctx) = setup();
    let (scope, zooms) = ten_tile_scope();
    let flaky: BTreeSet<TileCoord> = [tile(607, 405), tile(606, 407)].into_iter().collect();
    let flaky_in_round_0 = flaky.clone();
    let runner = ScriptedRunner::new(
        &ctx,
        Box::new(move |round, t| round == 0 && flaky_in_round_0.contains(t)),
    );
    let observer = RecordingObserver::default();

    let report = PipelineController::new(runner.clone(), WorkerScriptSynthesizer::python())
        .run(&scope, zooms, &ctx, CancellationToken::new(), &observer)
        .await
        .unwrap();

    assert_eq!(report.state, PipelineState::Completed);
    assert_eq!(report.outcome.requested.len(), 10);
    assert_eq!(report.outcome.produced, report.outcome.requested);
    assert!(report.outcome.failed.is_empty());
    assert_eq!(report.outcome.rounds_attempted, 2);
    assert!(report.validation.is_complete());

    let rounds = runner.rounds();
    assert_eq!(rounds.len(), 2);
    assert_eq!(rounds[0].len(), 10);
    assert_eq!(rounds[1], flaky);

    let states = observer.states.lock().unwrap().clone();
    assert_eq!(
        states,
        vec![
            PipelineState::Planning,
            PipelineState::Generating { tiles: 10 },
            PipelineState::Validating { round: 0 },
            PipelineState::Retrying { round: 1, missing: 2 },
            PipelineState::Validating { round: 1 },
            PipelineState::Completed,
        ]
    );

    let events = observer.events.lock().unwrap();
    let round_0_failures = events
        .iter()
        .filter(|(round, e)| *round == 0 && matches!(e, ProgressEvent::TileFailed { .. }))
        .count();
    assert_eq!(round_0_failures, 2);
    assert!(events.contains(&(
        0,
        ProgressEvent::RunFinished {
            success_count: 8,
            fail_count: 2
        }
    )));
}

#[tokio::test]
async fn test_persistent_failure_ends_as_partial_failure() {
    let (_dir, ctx) = setup();
    let (scope, zooms) = ten_tile_scope();
    let stubborn = tile(606, 406);
    let runner = ScriptedRunner::new(&ctx, Box::new(move |_, t| *t == stubborn));

    let report = PipelineController::new(runner.clone(), WorkerScriptSynthesizer::python())
        .with_max_rounds(2)
        .run(&scope, zooms, &ctx, CancellationToken::new(), &RecordingObserver::default())
        .await
        .unwrap();

    let expected: BTreeSet<TileCoord> = [stubborn].into_iter().collect();
    assert_eq!(
        report.state,
        PipelineState::PartialFailure {
            failed: expected.clone()
        }
    );
    assert_eq!(report.outcome.failed, expected);
    assert_eq!(report.outcome.produced.len(), 9);
    assert!(report.outcome.is_accounted());
    // Round 0 plus two retries, each retry scoped to the one tile
    assert_eq!(report.outcome.rounds_attempted, 3);
    let rounds = runner.rounds();
    assert_eq!(rounds.len(), 3);
    assert_eq!(rounds[1], expected);
    assert_eq!(rounds[2], expected);
}

#[tokio::test]
async fn test_zero_max_rounds_reports_round_zero_failures() {
    let (_dir, ctx) = setup();
    let (scope, zooms) = ten_tile_scope();
    let runner = ScriptedRunner::new(&ctx, Box::new(|_, t| t.y == 404));

    let report = PipelineController::new(runner.clone(), WorkerScriptSynthesizer::python())
        .with_max_rounds(0)
        .run(&scope, zooms, &ctx, CancellationToken::new(), &RecordingObserver::default())
        .await
        .unwrap();

    assert!(matches!(report.state, PipelineState::PartialFailure { ref failed } if failed.len() == 2));
    assert_eq!(report.outcome.rounds_attempted, 1);
    assert_eq!(runner.rounds().len(), 1);
}

#[tokio::test]
async fn test_rerun_after_partial_failure_only_requests_missing_tiles() {
    let (_dir, ctx) = setup();
    let (scope, zooms) = ten_tile_scope();
    let stubborn = tile(607, 408);

    let first = ScriptedRunner::new(&ctx, Box::new(move |_, t| *t == stubborn));
    PipelineController::new(first, WorkerScriptSynthesizer::python())
        .with_max_rounds(1)
        .run(&scope, zooms, &ctx, CancellationToken::new(), &RecordingObserver::default())
        .await
        .unwrap();

    let second = ScriptedRunner::new(&ctx, Box::new(|_, _| false));
    let report = PipelineController::new(second.clone(), WorkerScriptSynthesizer::python())
        .run(&scope, zooms, &ctx, CancellationToken::new(), &RecordingObserver::default())
        .await
        .unwrap();

    assert_eq!(report.state, PipelineState::Completed);
    assert_eq!(second.rounds(), vec![[stubborn].into_iter().collect::<BTreeSet<_>>()]);
}

#[tokio::test]
async fn test_run_error_in_round_zero_aborts() {
    let (_dir, ctx) = setup();
    let (scope, zooms) = ten_tile_scope();
    let observer = RecordingObserver::default();

    let report = PipelineController::new(Arc::new(BrokenEnvironment), WorkerScriptSynthesizer::python())
        .run(&scope, zooms, &ctx, CancellationToken::new(), &observer)
        .await
        .unwrap();

    assert_eq!(
        report.state,
        PipelineState::Aborted {
            message: "rendering endpoint unreachable".to_string()
        }
    );
    assert_eq!(report.outcome.rounds_attempted, 1);
    assert_eq!(report.outcome.failed.len(), 10);
    let states = observer.states.lock().unwrap();
    assert!(!states.iter().any(|s| matches!(s, PipelineState::Retrying { .. })));
}

#[test]
fn test_inverted_inputs_are_rejected_before_work() {
    assert!(ZoomRange::new(12, 10).is_err());
    assert!(GeoBoundingBox::new(35.2, 35.1, 33.3, 33.4).is_err());
}
