//! Two-phase commit transaction coordinator: resources vote, a terminator drives commit or
//! rollback, synchronizations observe the boundary.

use crate::error::{CorbaError, CorbaResult};
use lazy_static::lazy_static;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

/// Transaction lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    MarkedRollback,
    Preparing,
    Prepared,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    NoTransaction,
    Unknown,
}

/// A resource's vote in response to `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Commit,
    Rollback,
    ReadOnly,
}

/// A participant in two-phase commit.
pub trait Resource: Send + Sync + std::fmt::Debug {
    fn prepare(&self) -> CorbaResult<Vote>;
    fn commit(&self) -> CorbaResult<()>;
    fn rollback(&self) -> CorbaResult<()>;
    /// Single-resource fast path: prepare and commit collapsed into one call.
    fn commit_one_phase(&self) -> CorbaResult<()> {
        match self.prepare()? {
            Vote::Rollback => {
                self.rollback()?;
                Err(CorbaError::TransactionRolledBack)
            }
            Vote::Commit | Vote::ReadOnly => self.commit(),
        }
    }
}

/// Observes the transaction boundary without participating in the vote.
pub trait Synchronization: Send + Sync + std::fmt::Debug {
    fn before_completion(&self);
    fn after_completion(&self, status: Status);
}

fn generate_id() -> String {
    let mut octets = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut octets);
    format!("TXN:{}", hex::encode(octets))
}

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, Arc<Transaction>>> = RwLock::new(HashMap::new());
}

fn register(txn: &Arc<Transaction>) {
    if let Ok(mut guard) = REGISTRY.write() {
        guard.insert(txn.id.clone(), Arc::clone(txn));
    }
}

fn deregister(id: &str) {
    if let Ok(mut guard) = REGISTRY.write() {
        guard.remove(id);
    }
}

/// Looks up an active transaction by its stringified id, for reconnection/recovery flows.
pub fn lookup(id: &str) -> Option<Arc<Transaction>> {
    REGISTRY.read().ok().and_then(|guard| guard.get(id).cloned())
}

/// A single transaction: its id, status, timeout, and the resources/synchronizations/children
/// registered against it.
#[derive(Debug)]
pub struct Transaction {
    id: String,
    status: RwLock<Status>,
    created: Instant,
    timeout: Duration,
    resources: Mutex<Vec<Arc<dyn Resource>>>,
    synchronizations: Mutex<Vec<Arc<dyn Synchronization>>>,
    children: Mutex<Vec<Arc<Transaction>>>,
    parent: Option<Weak<Transaction>>,
    timed_out: AtomicBool,
}

impl Transaction {
    fn new(timeout: Duration, parent: Option<Weak<Transaction>>) -> Arc<Self> {
        Arc::new(Self {
            id: generate_id(),
            status: RwLock::new(Status::Active),
            created: Instant::now(),
            timeout,
            resources: Mutex::new(Vec::new()),
            synchronizations: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            parent,
            timed_out: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> CorbaResult<Status> {
        Ok(*self.status.read()?)
    }

    fn set_status(&self, status: Status) -> CorbaResult<()> {
        *self.status.write()? = status;
        Ok(())
    }

    pub fn created_at(&self) -> Instant {
        self.created
    }

    pub fn parent(&self) -> Option<Arc<Transaction>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Spawns a background timer that, if the timeout elapses while still Active, marks the
    /// transaction MarkedRollback and rolls it back. Runs unconditionally, independent of the
    /// sync/async transport features in use, since the timer owns no socket state.
    fn arm_timeout(self: &Arc<Self>) {
        if self.timeout.is_zero() {
            return;
        }
        let txn = Arc::clone(self);
        std::thread::spawn(move || {
            std::thread::sleep(txn.timeout);
            let should_rollback = matches!(txn.status(), Ok(Status::Active));
            if should_rollback {
                warn!("transaction {} timed out, rolling back", txn.id());
                txn.timed_out.store(true, Ordering::Release);
                let _ = txn.set_status(Status::MarkedRollback);
                let _ = Terminator { txn: Arc::clone(&txn) }.rollback();
            }
        });
    }
}

/// Returned by transaction creation: the single handle a caller uses to reach the coordinator
/// and terminator facets of a fresh transaction.
#[derive(Debug, Clone)]
pub struct Control {
    txn: Arc<Transaction>,
}

impl Control {
    pub fn coordinator(&self) -> Coordinator {
        Coordinator { txn: Arc::clone(&self.txn) }
    }

    pub fn terminator(&self) -> Terminator {
        Terminator { txn: Arc::clone(&self.txn) }
    }

    pub fn id(&self) -> &str {
        self.txn.id()
    }

    pub fn status(&self) -> CorbaResult<Status> {
        self.txn.status()
    }
}

/// Creates transactions and registers them in the process-wide active-transaction table.
#[derive(Debug, Default, Clone, Copy)]
pub struct Factory;

impl Factory {
    pub fn create(&self, timeout_secs: u64) -> Control {
        let txn = Transaction::new(Duration::from_secs(timeout_secs), None);
        register(&txn);
        txn.arm_timeout();
        Control { txn }
    }
}

/// The facet resources and synchronizations register against.
#[derive(Debug, Clone)]
pub struct Coordinator {
    txn: Arc<Transaction>,
}

impl Coordinator {
    pub fn register_resource(&self, resource: Arc<dyn Resource>) -> CorbaResult<RecoveryCoordinator> {
        if self.txn.status()? != Status::Active {
            return Err(CorbaError::TransactionInactive);
        }
        self.txn.resources.lock()?.push(resource);
        Ok(RecoveryCoordinator { txn: Arc::clone(&self.txn) })
    }

    pub fn register_synchronization(&self, sync: Arc<dyn Synchronization>) -> CorbaResult<()> {
        if self.txn.status()? != Status::Active {
            return Err(CorbaError::TransactionInactive);
        }
        self.txn.synchronizations.lock()?.push(sync);
        Ok(())
    }

    /// Creates a child transaction bound to this one: its commit merges into the parent, its
    /// rollback does not abort the parent.
    pub fn create_subtransaction(&self) -> CorbaResult<Control> {
        let child = Transaction::new(self.txn.timeout, Some(Arc::downgrade(&self.txn)));
        register(&child);
        self.txn.children.lock()?.push(Arc::clone(&child));
        Ok(Control { txn: child })
    }

    pub fn id(&self) -> &str {
        self.txn.id()
    }
}

/// The facet that drives the transaction to a terminal outcome.
#[derive(Debug, Clone)]
pub struct Terminator {
    txn: Arc<Transaction>,
}

impl Terminator {
    pub fn commit(&self, report_heuristics: bool) -> CorbaResult<()> {
        let txn = &self.txn;
        debug!("committing transaction {}", txn.id());
        if txn.status()? == Status::MarkedRollback {
            self.rollback()?;
            return Err(CorbaError::TransactionRolledBack);
        }
        if txn.status()? != Status::Active {
            return Err(CorbaError::TransactionInactive);
        }

        if let Some(parent) = txn.parent() {
            return self.commit_subtransaction(&parent);
        }

        for sync in txn.synchronizations.lock()?.iter() {
            sync.before_completion();
        }
        txn.set_status(Status::Preparing)?;

        let resources = txn.resources.lock()?.clone();

        if resources.is_empty() {
            txn.set_status(Status::Committed)?;
            self.run_after_completion(Status::Committed)?;
            deregister(txn.id());
            return Ok(());
        }

        if resources.len() == 1 {
            return match resources[0].commit_one_phase() {
                Ok(()) => {
                    txn.set_status(Status::Committed)?;
                    self.run_after_completion(Status::Committed)?;
                    deregister(txn.id());
                    Ok(())
                }
                Err(_) => {
                    txn.set_status(Status::RolledBack)?;
                    self.run_after_completion(Status::RolledBack)?;
                    deregister(txn.id());
                    Err(CorbaError::TransactionRolledBack)
                }
            };
        }

        let votes: Vec<Vote> = resources.iter().map(|r| r.prepare().unwrap_or(Vote::Rollback)).collect();
        let rollback_triggered = votes.iter().any(|v| *v == Vote::Rollback);

        if rollback_triggered {
            txn.set_status(Status::RollingBack)?;
            // a resource that already voted Rollback has decided its own outcome and needs no
            // further call; ReadOnly resources hold no state to undo. Only resources that voted
            // Commit must be told to undo.
            for (resource, vote) in resources.iter().zip(votes.iter()) {
                if *vote == Vote::Commit {
                    let _ = resource.rollback();
                }
            }
            txn.set_status(Status::RolledBack)?;
            self.run_after_completion(Status::RolledBack)?;
            deregister(txn.id());
            return Err(CorbaError::TransactionRolledBack);
        }

        if votes.iter().all(|v| *v == Vote::ReadOnly) {
            txn.set_status(Status::Committed)?;
            self.run_after_completion(Status::Committed)?;
            deregister(txn.id());
            return Ok(());
        }

        txn.set_status(Status::Committing)?;
        let mut any_commit_failed = false;
        for (resource, vote) in resources.iter().zip(votes.iter()) {
            if *vote == Vote::Commit && resource.commit().is_err() {
                any_commit_failed = true;
            }
        }

        if any_commit_failed {
            txn.set_status(Status::Unknown)?;
            deregister(txn.id());
            warn!("transaction {} left in Unknown status after a partial commit failure", txn.id());
            if report_heuristics {
                return Err(CorbaError::HeuristicHazard);
            }
            return Ok(());
        }

        txn.set_status(Status::Committed)?;
        self.run_after_completion(Status::Committed)?;
        deregister(txn.id());
        debug!("transaction {} committed", txn.id());
        Ok(())
    }

    /// A subtransaction's commit (§4.H: "a subtransaction's commit merges its effects into the
    /// parent") moves its registered resources onto the parent's resource list instead of
    /// running its own prepare/commit vote: the parent's own `Terminator::commit` is what
    /// eventually calls `prepare`/`commit` on them, as part of the parent's outcome. The child's
    /// own synchronizations still observe their own boundary here, since they registered against
    /// the child's scope, not the parent's.
    fn commit_subtransaction(&self, parent: &Arc<Transaction>) -> CorbaResult<()> {
        let txn = &self.txn;
        for sync in txn.synchronizations.lock()?.iter() {
            sync.before_completion();
        }
        let merged = std::mem::take(&mut *txn.resources.lock()?);
        parent.resources.lock()?.extend(merged);
        parent.children.lock()?.retain(|c| c.id() != txn.id());

        txn.set_status(Status::Committed)?;
        self.run_after_completion(Status::Committed)?;
        deregister(txn.id());
        debug!("subtransaction {} merged into parent {}", txn.id(), parent.id());
        Ok(())
    }

    pub fn rollback(&self) -> CorbaResult<()> {
        let txn = &self.txn;
        debug!("rolling back transaction {}", txn.id());
        let status = txn.status()?;
        if !matches!(status, Status::Active | Status::MarkedRollback) {
            return Err(CorbaError::TransactionInactive);
        }
        txn.set_status(Status::RollingBack)?;
        for sync in txn.synchronizations.lock()?.iter() {
            sync.before_completion();
        }
        for resource in txn.resources.lock()?.iter() {
            let _ = resource.rollback();
        }
        txn.set_status(Status::RolledBack)?;
        self.run_after_completion(Status::RolledBack)?;
        deregister(txn.id());
        Ok(())
    }

    fn run_after_completion(&self, status: Status) -> CorbaResult<()> {
        for sync in self.txn.synchronizations.lock()?.iter() {
            sync.after_completion(status);
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        self.txn.id()
    }
}

/// Tied to a single (transaction, resource) registration; used to replay the final outcome to a
/// resource that reconnects after a crash.
#[derive(Debug, Clone)]
pub struct RecoveryCoordinator {
    txn: Arc<Transaction>,
}

impl RecoveryCoordinator {
    pub fn replay_completion(&self, resource: &Arc<dyn Resource>) -> CorbaResult<Status> {
        let status = self.txn.status()?;
        match status {
            Status::Committed => resource.commit()?,
            Status::RolledBack => resource.rollback()?,
            _ => {}
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[derive(Debug)]
    struct ScriptedResource {
        vote: Vote,
        prepared: AtomicBool,
        committed: AtomicBool,
        rolled_back: AtomicBool,
    }

    impl ScriptedResource {
        fn new(vote: Vote) -> Arc<Self> {
            Arc::new(Self {
                vote,
                prepared: AtomicBool::new(false),
                committed: AtomicBool::new(false),
                rolled_back: AtomicBool::new(false),
            })
        }
    }

    impl Resource for ScriptedResource {
        fn prepare(&self) -> CorbaResult<Vote> {
            self.prepared.store(true, Ordering::SeqCst);
            Ok(self.vote)
        }
        fn commit(&self) -> CorbaResult<()> {
            self.committed.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn rollback(&self) -> CorbaResult<()> {
            self.rolled_back.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CountingSync {
        before: AtomicUsize,
        after: Mutex<Vec<Status>>,
    }

    impl Synchronization for CountingSync {
        fn before_completion(&self) {
            self.before.fetch_add(1, AtomicOrdering::SeqCst);
        }
        fn after_completion(&self, status: Status) {
            self.after.lock().unwrap().push(status);
        }
    }

    #[test]
    fn two_phase_commit_happy_path() {
        let control = Factory.create(0);
        let coordinator = control.coordinator();
        let r1 = ScriptedResource::new(Vote::Commit);
        let r2 = ScriptedResource::new(Vote::Commit);
        coordinator.register_resource(r1.clone()).unwrap();
        coordinator.register_resource(r2.clone()).unwrap();
        let sync = Arc::new(CountingSync::default());
        coordinator.register_synchronization(sync.clone()).unwrap();

        control.terminator().commit(false).unwrap();

        assert!(r1.prepared.load(Ordering::SeqCst) && r1.committed.load(Ordering::SeqCst));
        assert!(r2.prepared.load(Ordering::SeqCst) && r2.committed.load(Ordering::SeqCst));
        assert_eq!(control.status().unwrap(), Status::Committed);
        assert_eq!(sync.before.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(*sync.after.lock().unwrap(), vec![Status::Committed]);
    }

    #[test]
    fn rollback_vote_stops_commit_on_every_resource() {
        let control = Factory.create(0);
        let coordinator = control.coordinator();
        let r1 = ScriptedResource::new(Vote::Commit);
        let r2 = ScriptedResource::new(Vote::Rollback);
        coordinator.register_resource(r1.clone()).unwrap();
        coordinator.register_resource(r2.clone()).unwrap();

        let err = control.terminator().commit(false).unwrap_err();
        assert!(matches!(err, CorbaError::TransactionRolledBack));
        assert!(r1.rolled_back.load(Ordering::SeqCst));
        assert!(!r1.committed.load(Ordering::SeqCst));
        assert!(!r2.committed.load(Ordering::SeqCst));
        assert_eq!(control.status().unwrap(), Status::RolledBack);
    }

    #[test]
    fn explicit_rollback_runs_after_completion_once() {
        let control = Factory.create(0);
        let coordinator = control.coordinator();
        let r1 = ScriptedResource::new(Vote::Commit);
        coordinator.register_resource(r1.clone()).unwrap();
        let sync = Arc::new(CountingSync::default());
        coordinator.register_synchronization(sync.clone()).unwrap();

        control.terminator().rollback().unwrap();
        assert!(r1.rolled_back.load(Ordering::SeqCst));
        assert_eq!(*sync.after.lock().unwrap(), vec![Status::RolledBack]);
        assert_eq!(control.status().unwrap(), Status::RolledBack);
    }

    #[test]
    fn single_resource_uses_commit_one_phase() {
        let control = Factory.create(0);
        let r1 = ScriptedResource::new(Vote::Commit);
        control.coordinator().register_resource(r1.clone()).unwrap();
        control.terminator().commit(false).unwrap();
        assert!(r1.committed.load(Ordering::SeqCst));
        assert_eq!(control.status().unwrap(), Status::Committed);
    }

    #[test]
    fn subtransaction_has_its_own_id_and_rollback_does_not_touch_parent() {
        let parent = Factory.create(0);
        let child = parent.coordinator().create_subtransaction().unwrap();
        assert_ne!(parent.id(), child.id());
        child.terminator().rollback().unwrap();
        assert_eq!(parent.status().unwrap(), Status::Active);
    }

    #[test]
    fn subtransaction_commit_merges_resource_into_parent() {
        let parent = Factory.create(0);
        let child = parent.coordinator().create_subtransaction().unwrap();
        let r = ScriptedResource::new(Vote::Commit);
        child.coordinator().register_resource(r.clone()).unwrap();

        child.terminator().commit(false).unwrap();
        assert_eq!(child.status().unwrap(), Status::Committed);
        assert!(!r.committed.load(Ordering::SeqCst), "merge defers commit to the parent");

        parent.terminator().commit(false).unwrap();
        assert!(r.committed.load(Ordering::SeqCst));
        assert_eq!(parent.status().unwrap(), Status::Committed);
    }
}
