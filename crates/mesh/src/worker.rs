use std::collections::HashSet;
use std::sync::mpsc;
use std::thread;

use tracing::warn;

use crate::mesh::TriangulatedMesh;
use crate::triangulate::{TriangulationError, triangulate_rings};

/// Correlation id carried through a triangulation request so results can be
/// matched back to their originating country in any completion order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone)]
pub struct TriangulationJob {
    /// Exterior ring first, then holes.
    pub rings: Vec<Vec<[f64; 2]>>,
    pub radius: f64,
    /// Attached to any error this job produces.
    pub country: Option<String>,
}

pub type TriangulationResult = Result<TriangulatedMesh, TriangulationError>;

/// Strategy seam between in-thread and background triangulation.
///
/// Selected once at startup (see [`new_triangulator`]); callers never branch
/// on the execution context at use sites. Results may arrive in any order
/// relative to submission.
pub trait Triangulator {
    fn submit(&mut self, job: TriangulationJob) -> RequestId;

    /// Completed results since the last call. Never blocks.
    fn poll(&mut self) -> Vec<(RequestId, TriangulationResult)>;

    /// Blocks until every outstanding request has completed or been
    /// rejected, then returns everything not yet collected.
    fn drain(&mut self) -> Vec<(RequestId, TriangulationResult)>;

    fn pending(&self) -> usize;
}

fn run_job(job: &TriangulationJob) -> TriangulationResult {
    triangulate_rings(&job.rings, job.radius).map_err(|e| e.with_country(job.country.as_deref()))
}

/// Blocking fallback: triangulates on the calling thread at submit time.
///
/// Functionally identical to the worker path; batching many countries here
/// blocks the caller proportionally, so large datasets should be chunked.
#[derive(Debug, Default)]
pub struct SyncTriangulator {
    next_id: u64,
    completed: Vec<(RequestId, TriangulationResult)>,
}

impl SyncTriangulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Triangulator for SyncTriangulator {
    fn submit(&mut self, job: TriangulationJob) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.completed.push((id, run_job(&job)));
        id
    }

    fn poll(&mut self) -> Vec<(RequestId, TriangulationResult)> {
        std::mem::take(&mut self.completed)
    }

    fn drain(&mut self) -> Vec<(RequestId, TriangulationResult)> {
        std::mem::take(&mut self.completed)
    }

    fn pending(&self) -> usize {
        0
    }
}

/// Background triangulator on a dedicated worker thread.
///
/// There is no per-request cancellation: terminating the worker rejects all
/// outstanding requests with [`TriangulationError::WorkerTerminated`], which
/// callers treat as retryable against a fresh worker or the sync fallback.
#[derive(Debug)]
pub struct WorkerTriangulator {
    sender: Option<mpsc::Sender<(RequestId, TriangulationJob)>>,
    receiver: mpsc::Receiver<(RequestId, TriangulationResult)>,
    handle: Option<thread::JoinHandle<()>>,
    next_id: u64,
    outstanding: HashSet<RequestId>,
    /// Results produced locally (rejections after termination).
    local: Vec<(RequestId, TriangulationResult)>,
}

impl WorkerTriangulator {
    pub fn spawn() -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<(RequestId, TriangulationJob)>();
        let (result_tx, result_rx) = mpsc::channel::<(RequestId, TriangulationResult)>();

        let handle = thread::Builder::new()
            .name("triangulator".to_string())
            .spawn(move || {
                for (id, job) in job_rx {
                    if result_tx.send((id, run_job(&job))).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            sender: Some(job_tx),
            receiver: result_rx,
            handle: Some(handle),
            next_id: 0,
            outstanding: HashSet::new(),
            local: Vec::new(),
        })
    }

    /// Shuts the worker down. Outstanding and future requests reject with
    /// `WorkerTerminated`.
    pub fn terminate(&mut self) {
        self.sender = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        // Collect whatever finished before the shutdown; the rest rejects.
        while let Ok((id, result)) = self.receiver.try_recv() {
            self.outstanding.remove(&id);
            self.local.push((id, result));
        }
        self.reject_outstanding();
    }

    pub fn is_terminated(&self) -> bool {
        self.sender.is_none()
    }

    fn reject_outstanding(&mut self) {
        for id in std::mem::take(&mut self.outstanding) {
            self.local.push((id, Err(TriangulationError::WorkerTerminated)));
        }
    }
}

impl Triangulator for WorkerTriangulator {
    fn submit(&mut self, job: TriangulationJob) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;

        let sent = match &self.sender {
            Some(sender) => sender.send((id, job)).is_ok(),
            None => false,
        };
        if sent {
            self.outstanding.insert(id);
        } else {
            self.local.push((id, Err(TriangulationError::WorkerTerminated)));
        }
        id
    }

    fn poll(&mut self) -> Vec<(RequestId, TriangulationResult)> {
        let mut out = std::mem::take(&mut self.local);
        loop {
            match self.receiver.try_recv() {
                Ok((id, result)) => {
                    self.outstanding.remove(&id);
                    out.push((id, result));
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.reject_outstanding();
                    out.append(&mut self.local);
                    break;
                }
            }
        }
        out
    }

    fn drain(&mut self) -> Vec<(RequestId, TriangulationResult)> {
        let mut out = std::mem::take(&mut self.local);
        while !self.outstanding.is_empty() {
            match self.receiver.recv() {
                Ok((id, result)) => {
                    self.outstanding.remove(&id);
                    out.push((id, result));
                }
                Err(_) => {
                    self.reject_outstanding();
                    out.append(&mut self.local);
                    break;
                }
            }
        }
        out
    }

    fn pending(&self) -> usize {
        self.outstanding.len()
    }
}

impl Drop for WorkerTriangulator {
    fn drop(&mut self) {
        self.sender = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Picks the background worker when the environment supports it, otherwise
/// the blocking fallback. Callers hold one triangulator for the lifetime of
/// a dataset instead of re-deciding per call.
pub fn new_triangulator() -> Box<dyn Triangulator> {
    match WorkerTriangulator::spawn() {
        Ok(worker) => Box::new(worker),
        Err(e) => {
            warn!(error = %e, "triangulation worker unavailable, falling back to sync");
            Box::new(SyncTriangulator::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        RequestId, SyncTriangulator, TriangulationJob, Triangulator, WorkerTriangulator,
        new_triangulator,
    };
    use crate::triangulate::TriangulationError;

    fn square_job(country: &str) -> TriangulationJob {
        TriangulationJob {
            rings: vec![vec![
                [0.0, 0.0],
                [1.0, 0.0],
                [1.0, 1.0],
                [0.0, 1.0],
                [0.0, 0.0],
            ]],
            radius: 1.0,
            country: Some(country.to_string()),
        }
    }

    fn bad_job(country: &str) -> TriangulationJob {
        TriangulationJob {
            rings: vec![vec![[0.0, 0.0], [1.0, 0.0]]],
            radius: 1.0,
            country: Some(country.to_string()),
        }
    }

    #[test]
    fn sync_triangulator_completes_at_submit() {
        let mut t = SyncTriangulator::new();
        let id = t.submit(square_job("AAA"));
        assert_eq!(t.pending(), 0);
        let results = t.drain();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, id);
        assert!(results[0].1.is_ok());
    }

    #[test]
    fn worker_returns_every_result_with_matching_ids() {
        let mut t = WorkerTriangulator::spawn().expect("spawn worker");
        let ids: Vec<RequestId> = (0..4).map(|i| t.submit(square_job(&format!("C{i}")))).collect();
        let mut results = t.drain();
        assert_eq!(results.len(), 4);
        results.sort_by_key(|(id, _)| *id);
        let got: Vec<RequestId> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(got, ids);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }

    #[test]
    fn worker_errors_carry_the_country_id() {
        let mut t = WorkerTriangulator::spawn().expect("spawn worker");
        t.submit(bad_job("BRK"));
        let results = t.drain();
        let err = results[0].1.as_ref().unwrap_err();
        assert_eq!(err.country(), Some("BRK"));
    }

    #[test]
    fn submit_after_terminate_rejects_with_worker_terminated() {
        let mut t = WorkerTriangulator::spawn().expect("spawn worker");
        t.terminate();
        assert!(t.is_terminated());
        let id = t.submit(square_job("AAA"));
        let results = t.poll();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, id);
        assert!(matches!(
            results[0].1,
            Err(TriangulationError::WorkerTerminated)
        ));
    }

    #[test]
    fn sync_and_worker_produce_identical_meshes() {
        let mut sync = SyncTriangulator::new();
        sync.submit(square_job("AAA"));
        let sync_mesh = sync.drain().remove(0).1.expect("sync mesh");

        let mut worker = WorkerTriangulator::spawn().expect("spawn worker");
        worker.submit(square_job("AAA"));
        let worker_mesh = worker.drain().remove(0).1.expect("worker mesh");

        assert_eq!(sync_mesh, worker_mesh);
    }

    #[test]
    fn default_strategy_is_usable() {
        let mut t = new_triangulator();
        t.submit(square_job("AAA"));
        let results = t.drain();
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());
    }
}
