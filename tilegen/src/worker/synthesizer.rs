//! Builds worker programs from tile sets.

use std::sync::Arc;

use tracing::debug;

use crate::context::RunContext;
use crate::coord::TileCoord;
use crate::plan::GenerationPlan;

use super::program::{runs_from_plan, runs_from_tiles, FetchPolicy, TileRun, WorkerProgram};
use super::python::PythonTemplate;
use super::template::{WorkerParams, WorkerTemplate};

/// Turns a set of tiles plus a [`RunContext`] into a [`WorkerProgram`].
///
/// Synthesis is pure template instantiation: no I/O, no network, and the
/// same inputs always produce the same program text.
#[derive(Clone)]
pub struct WorkerScriptSynthesizer {
    template: Arc<dyn WorkerTemplate>,
    fetch: FetchPolicy,
}

impl WorkerScriptSynthesizer {
    pub fn new(template: Arc<dyn WorkerTemplate>) -> Self {
        Self {
            template,
            fetch: FetchPolicy::default(),
        }
    }

    /// Synthesizer using the Python template.
    pub fn python() -> Self {
        Self::new(Arc::new(PythonTemplate))
    }

    pub fn with_fetch_policy(mut self, fetch: FetchPolicy) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn template(&self) -> &dyn WorkerTemplate {
        self.template.as_ref()
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        self.fetch
    }

    /// Program covering exactly `tiles` (order and duplicates don't matter).
    pub fn synthesize(
        &self,
        tiles: impl IntoIterator<Item = TileCoord>,
        ctx: &RunContext,
    ) -> WorkerProgram {
        self.render(runs_from_tiles(tiles), ctx)
    }

    /// Program covering a whole plan, without materializing its tiles.
    pub fn synthesize_plan(&self, plan: &GenerationPlan, ctx: &RunContext) -> WorkerProgram {
        self.render(runs_from_plan(plan), ctx)
    }

    fn render(&self, runs: Vec<TileRun>, ctx: &RunContext) -> WorkerProgram {
        let tile_count = runs.iter().map(TileRun::tile_count).sum();
        let params = WorkerParams {
            endpoint_base_url: ctx.endpoint_base_url(),
            project_dir: ctx.worker_project_dir(),
            runs: &runs,
            tile_count,
            fetch: self.fetch,
        };
        let source = self.template.render(&params);

        debug!(
            template = self.template.name(),
            tiles = tile_count,
            runs = runs.len(),
            bytes = source.len(),
            "Synthesized worker program"
        );

        WorkerProgram::new(source, runs, self.template.name())
    }
}

impl Default for WorkerScriptSynthesizer {
    fn default() -> Self {
        Self::python()
    }
}

impl std::fmt::Debug for WorkerScriptSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerScriptSynthesizer")
            .field("template", &self.template.name())
            .field("fetch", &self.fetch)
            .finish()
    }
}
