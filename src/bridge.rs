//! Hand-off between blocking background work and the UI thread.
//!
//! Every task gets its own unbounded channel. The worker pushes progress
//! events and then exactly one completion; the UI thread drains the channel
//! once per frame, so all callbacks run on the UI thread in the order they
//! were produced.

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError, unbounded_channel},
};
use tracing::{debug, error};

use crate::{error::TaskError, model::ProgressEvent};

/// Which user action a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Fetch,
    Thumbnail,
    Download,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Fetch => "fetch",
            TaskKind::Thumbnail => "thumbnail",
            TaskKind::Download => "download",
        })
    }
}

#[derive(Debug)]
pub enum TaskEvent<T, E> {
    Progress(ProgressEvent),
    Completed(Result<T, TaskError<E>>),
}

type Repaint = Arc<dyn Fn() + Send + Sync>;

/// Worker-side end of the channel, lent to the running task
pub struct ProgressSink<T, E> {
    tx: UnboundedSender<TaskEvent<T, E>>,
    repaint: Repaint,
}

impl<T, E> ProgressSink<T, E> {
    pub fn progress(&self, event: ProgressEvent) {
        self.send(TaskEvent::Progress(event));
    }

    fn send(&self, event: TaskEvent<T, E>) {
        // The UI may have dropped the worker handle; nothing left to notify then
        if self.tx.send(event).is_ok() {
            (self.repaint)();
        }
    }
}

/// UI-side handle of a running task
pub struct Worker<T, E> {
    kind: TaskKind,
    rx: UnboundedReceiver<TaskEvent<T, E>>,
    completed: bool,
}

impl<T, E> Worker<T, E> {
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Takes every event currently queued, stopping after the completion.
    ///
    /// If the task vanished without reporting, a [`TaskError::Lost`]
    /// completion is synthesised so callers always see exactly one.
    pub fn drain(&mut self) -> Vec<TaskEvent<T, E>> {
        let mut events = Vec::new();
        while !self.completed {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.completed = matches!(event, TaskEvent::Completed(_));
                    events.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("{} task ended without a result", self.kind);
                    self.completed = true;
                    events.push(TaskEvent::Completed(Err(TaskError::Lost)));
                }
            }
        }
        events
    }
}

/// Spawns one-off background tasks on the runtime's blocking pool
#[derive(Clone)]
pub struct TaskRunner {
    handle: Handle,
    repaint: Repaint,
}

impl TaskRunner {
    /// `repaint` is invoked after every event so the UI wakes up to drain it.
    pub fn new(handle: Handle, repaint: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            handle,
            repaint: Arc::new(repaint),
        }
    }

    pub fn run_in_background<T, E, F>(&self, kind: TaskKind, work: F) -> Worker<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(&ProgressSink<T, E>) -> Result<T, E> + Send + 'static,
    {
        let (tx, rx) = unbounded_channel();
        let sink = ProgressSink {
            tx,
            repaint: Arc::clone(&self.repaint),
        };

        debug!("Spawning {kind} task");
        self.handle.spawn_blocking(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(|| work(&sink))) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed(err)),
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    error!("{kind} task panicked: {msg}");
                    Err(TaskError::Panicked(msg))
                }
            };
            debug!("{kind} task finished (ok = {})", outcome.is_ok());
            sink.send(TaskEvent::Completed(outcome));
        });

        Worker {
            kind,
            rx,
            completed: false,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::{Duration, Instant},
    };

    use tokio::runtime::Runtime;

    use super::*;

    pub(crate) fn runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap()
    }

    fn drain_all<T, E>(worker: &mut Worker<T, E>) -> Vec<TaskEvent<T, E>> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while !worker.is_completed() {
            assert!(Instant::now() < deadline, "worker did not complete");
            events.extend(worker.drain());
            thread::sleep(Duration::from_millis(2));
        }
        events
    }

    #[test]
    fn progress_arrives_in_order_and_completion_is_last() {
        let rt = runtime();
        let runner = TaskRunner::new(rt.handle().clone(), || {});
        let mut worker = runner.run_in_background(TaskKind::Download, |sink| {
            for p in [0.0, 12.5, 12.5, 40.0, 99.9, 100.0] {
                sink.progress(ProgressEvent::downloading(p, None));
            }
            Ok::<_, String>("done")
        });

        let events = drain_all(&mut worker);
        let percents: Vec<f32> = events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Progress(p) => Some(p.percent),
                TaskEvent::Completed(_) => None,
            })
            .collect();
        assert_eq!(percents, [0.0, 12.5, 12.5, 40.0, 99.9, 100.0]);
        assert!(matches!(events.last(), Some(TaskEvent::Completed(Ok("done")))));
        assert_eq!(
            events.iter().filter(|e| matches!(e, TaskEvent::Completed(_))).count(),
            1
        );
        assert!(worker.drain().is_empty());
    }

    #[test]
    fn errors_are_delivered_as_completion() {
        let rt = runtime();
        let runner = TaskRunner::new(rt.handle().clone(), || {});
        let mut worker = runner.run_in_background(TaskKind::Fetch, |_sink| {
            Err::<(), _>("network unreachable".to_owned())
        });
        match drain_all(&mut worker).pop() {
            Some(TaskEvent::Completed(Err(TaskError::Failed(msg)))) => {
                assert_eq!(msg, "network unreachable")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn panics_are_caught() {
        let rt = runtime();
        let runner = TaskRunner::new(rt.handle().clone(), || {});
        let mut worker = runner.run_in_background(TaskKind::Download, |_sink| -> Result<(), String> {
            panic!("extractor blew up")
        });
        match drain_all(&mut worker).pop() {
            Some(TaskEvent::Completed(Err(TaskError::Panicked(msg)))) => {
                assert_eq!(msg, "extractor blew up")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn work_runs_off_the_calling_thread() {
        let rt = runtime();
        let runner = TaskRunner::new(rt.handle().clone(), || {});
        let caller = thread::current().id();
        let mut worker = runner.run_in_background(TaskKind::Fetch, move |_sink| {
            Ok::<_, ()>(thread::current().id() != caller)
        });
        assert!(matches!(
            drain_all(&mut worker).pop(),
            Some(TaskEvent::Completed(Ok(true)))
        ));
    }

    #[test]
    fn every_event_requests_a_repaint() {
        let rt = runtime();
        let repaints = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&repaints);
        let runner = TaskRunner::new(rt.handle().clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut worker = runner.run_in_background(TaskKind::Download, |sink| {
            sink.progress(ProgressEvent::downloading(50.0, None));
            sink.progress(ProgressEvent::finished());
            Ok::<_, ()>(())
        });
        drain_all(&mut worker);
        assert_eq!(repaints.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn vanished_task_yields_lost_completion() {
        let (tx, rx) = unbounded_channel::<TaskEvent<(), ()>>();
        let mut worker = Worker {
            kind: TaskKind::Thumbnail,
            rx,
            completed: false,
        };
        tx.send(TaskEvent::Progress(ProgressEvent::postprocessing())).unwrap();
        drop(tx);

        let events = worker.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], TaskEvent::Completed(Err(TaskError::Lost))));
        assert!(worker.is_completed());
        assert!(worker.drain().is_empty());
    }
}
