use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use task_pipeline_rs::storage::memory::MemoryStore;
use task_pipeline_rs::task::solver::SquareSolver;
use task_pipeline_rs::task::{ComputeTask, Outcome, Ticket};
use task_pipeline_rs::worker::pool::{Pipeline, PipelineOptions};
use task_pipeline_rs::worker::producer::{SubmissionMode, TaskSource};

fn run_once(producers: usize, tasks: usize, consumers: usize, mode: SubmissionMode) {
    let store = Arc::new(MemoryStore::<ComputeTask, i64>::new());
    let source: TaskSource<ComputeTask> = Arc::new(move |producer: usize, index: usize| {
        let id = (producer * tasks + index) as u64;
        ComputeTask::new(id, id as i64)
    });

    let mut pipeline = Pipeline::start(
        PipelineOptions::new(producers, consumers, tasks).with_mode(mode),
        Arc::clone(&store),
        Arc::new(SquareSolver::new(Duration::ZERO)),
        source,
    )
    .unwrap();

    let total = producers * tasks;
    // Wait until every task has been submitted and claimed
    while store.issued() < total as u64 || store.pending() > 0 {
        thread::sleep(Duration::from_millis(1));
    }
    let report = pipeline.stop();

    assert_eq!(report.panicked, 0);
    assert_eq!(report.submitted(), total, "lost submissions");
    assert_eq!(report.processed(), total, "lost or duplicated results");

    let mut tickets = HashSet::new();
    for producer in &report.producers {
        assert_eq!(producer.tickets.len(), tasks);
        for &ticket in &producer.tickets {
            assert!(tickets.insert(ticket), "ticket {ticket} issued twice");
        }
    }
    let expected: HashSet<_> = (0..total as u64).map(Ticket).collect();
    assert_eq!(tickets, expected);

    match mode {
        SubmissionMode::AwaitResult => {
            let received: usize = report.producers.iter().map(|p| p.results.len()).sum();
            assert_eq!(received, total);
            assert_eq!(store.cached_results(), 0);
        }
        SubmissionMode::FireAndForget => {
            assert_eq!(store.cached_results(), total);
            for producer in &report.producers {
                for (index, &ticket) in producer.tickets.iter().enumerate() {
                    let id = (producer.producer_id * tasks + index) as i64;
                    assert_eq!(store.peek_result(ticket), Some(Outcome::Solved(id * id)));
                }
            }
        }
    }
}

#[test]
fn test_stress_fire_and_forget() {
    for _ in 0..10 {
        run_once(6, 200, 4, SubmissionMode::FireAndForget);
    }
}

#[test]
fn test_stress_await_result() {
    for _ in 0..10 {
        run_once(8, 50, 3, SubmissionMode::AwaitResult);
    }
}

#[test]
fn test_stress_more_consumers_than_work() {
    for _ in 0..20 {
        run_once(2, 5, 16, SubmissionMode::AwaitResult);
    }
}
