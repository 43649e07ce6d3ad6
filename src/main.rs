//! Task Pipeline RS binary entry point

use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use task_pipeline_rs::config::{Config, SolverKind};
use task_pipeline_rs::task::memo::Memoized;
use task_pipeline_rs::task::solver::{QuadraticSolver, Solver, SquareSolver};
use task_pipeline_rs::task::{Coefficients, ComputeTask, Outcome, Ticket};
use task_pipeline_rs::worker::pool::{Pipeline, PipelineOptions};
use task_pipeline_rs::worker::producer::{SkipFilter, TaskSource};
use task_pipeline_rs::MemoryStore;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Serialize)]
struct Summary<R> {
    run_id: String,
    started_at: String,
    finished_at: String,
    submitted: usize,
    skipped: usize,
    processed: usize,
    failed: usize,
    results: Vec<(Ticket, Outcome<R>)>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Task Pipeline RS");

    let config = Config::load()?;
    config.validate()?;

    info!(
        "Running {} producer(s) x {} task(s) against {} consumer(s) with the {:?} solver",
        config.producer_count, config.tasks_per_producer, config.consumer_count, config.solver
    );

    match config.solver {
        SolverKind::Quadratic => {
            let source: TaskSource<Coefficients> = Arc::new(|producer: usize, index: usize| {
                Coefficients::new(
                    ((producer + index) % 3) as f64 - 1.0,
                    index as f64 - 2.0,
                    producer as f64 - 1.0,
                )
            });
            run(&config, Arc::new(QuadraticSolver::default()), source, None)
        }
        SolverKind::Square => {
            let per_producer = config.tasks_per_producer;
            let source: TaskSource<ComputeTask> = Arc::new(move |producer: usize, index: usize| {
                let id = (producer * per_producer + index) as u64;
                ComputeTask::new(id, id as i64)
            });
            let solver = SquareSolver::new(Duration::from_millis(config.compute_latency_ms));
            if config.memoize {
                let solver = Arc::new(Memoized::new(solver));
                let skip = solver.skip_filter();
                run(&config, Arc::clone(&solver), source, Some(skip))?;
                info!(
                    "Memo holds {} result(s), {} reused",
                    solver.cached(),
                    solver.hits()
                );
                Ok(())
            } else {
                run(&config, Arc::new(solver), source, None)
            }
        }
    }
}

fn run<V>(
    config: &Config,
    solver: Arc<V>,
    source: TaskSource<V::Task>,
    skip: Option<SkipFilter<V::Task>>,
) -> Result<(), Box<dyn std::error::Error>>
where
    V: Solver + 'static,
    V::Task: 'static,
    V::Output: Clone + Serialize + Sync + 'static,
{
    let store = Arc::new(MemoryStore::<V::Task, V::Output>::new());
    let mut pipeline = Pipeline::start_with_skip(
        PipelineOptions::from(config),
        Arc::clone(&store),
        solver,
        source,
        skip,
    )?;

    thread::sleep(Duration::from_millis(config.run_duration_ms));
    let report = pipeline.stop();

    // Results awaited by producers were taken; anything else is still cached.
    let mut results = Vec::new();
    for producer in &report.producers {
        results.extend(producer.results.iter().cloned());
        for &ticket in &producer.tickets {
            if let Some(outcome) = store.peek_result(ticket) {
                results.push((ticket, outcome));
            }
        }
    }
    results.sort_by_key(|(ticket, _)| *ticket);

    let summary = Summary {
        run_id: report.run_id.to_string(),
        started_at: report.started_at.to_rfc3339(),
        finished_at: report.finished_at.to_rfc3339(),
        submitted: report.submitted(),
        skipped: report.skipped(),
        processed: report.processed(),
        failed: report.failed(),
        results,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
