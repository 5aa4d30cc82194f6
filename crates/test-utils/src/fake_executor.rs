use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use flowdag::exec::{ExecutorBackend, Job};

/// An executor that only queues jobs; the test decides when and in which
/// order they run.
#[derive(Clone, Default)]
pub struct QueuedExecutor {
    queue: Arc<Mutex<VecDeque<Job>>>,
    submitted: Arc<Mutex<usize>>,
}

impl QueuedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Total number of jobs ever submitted.
    pub fn submitted(&self) -> usize {
        *self.submitted.lock().unwrap()
    }

    /// Run the oldest queued job. Returns `false` when the queue is empty.
    pub fn run_next(&self) -> bool {
        let job = self.queue.lock().unwrap().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run the newest queued job.
    pub fn run_newest(&self) -> bool {
        let job = self.queue.lock().unwrap().pop_back();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Drain the queue in submission order, including jobs submitted while
    /// draining. Returns the number of jobs run.
    pub fn run_all(&self) -> usize {
        let mut n = 0;
        while self.run_next() {
            n += 1;
        }
        n
    }

    /// Drain the queue newest-first.
    pub fn run_all_reversed(&self) -> usize {
        let mut n = 0;
        while self.run_newest() {
            n += 1;
        }
        n
    }
}

impl ExecutorBackend for QueuedExecutor {
    fn spawn(&self, job: Job) {
        *self.submitted.lock().unwrap() += 1;
        self.queue.lock().unwrap().push_back(job);
    }
}

/// An executor with exactly one worker thread: jobs run one at a time, in
/// submission order.
pub struct SingleSlotExecutor {
    tx: Mutex<mpsc::Sender<Job>>,
}

impl SingleSlotExecutor {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name("single-slot".to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
            })
            .expect("failed to spawn single-slot worker");
        Self { tx: Mutex::new(tx) }
    }
}

impl Default for SingleSlotExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorBackend for SingleSlotExecutor {
    fn spawn(&self, job: Job) {
        let _ = self.tx.lock().unwrap().send(job);
    }
}
