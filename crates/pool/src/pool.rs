// SPDX-License-Identifier: MIT

//! The sandbox pool (§3, §4.4): the single owner of every live sandbox on
//! this host. One [`SandboxPool`] per process; the coordinator's local
//! backend wraps it, a remote backend talks to another host's copy over
//! HTTP.

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::hooks::{BeforeEvictHook, EvictionContext};
use crate::live::{LiveEntry, SandboxHandleInfo};
use crate::stats::{Counters, PoolStats, StateHistogram};
use ash_core::clock::{Clock, SystemClock};
use ash_core::ids::{SandboxId, SessionId};
use ash_core::sandbox::{CreateSandboxRequest, Sandbox, SandboxState};
use ash_db::Db;
use ash_sandbox::{BridgeClient, BridgeEvent, ExitClassification, SandboxRuntime};
use ash_wire::Command;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Outcome of inspecting a live entry's process (§3 "Get", §4.2 crash/OOM
/// detection): all of it lazy, nothing here runs on a timer of its own
/// besides the idle/cold sweeps.
enum Liveness {
    Alive(SandboxHandleInfo),
    Dead { classification: Option<ExitClassification>, session_id: Option<SessionId> },
    Missing,
}

pub struct SandboxPool<C: Clock = SystemClock> {
    db: Db,
    runtime: SandboxRuntime,
    clock: C,
    config: PoolConfig,
    live: Mutex<HashMap<SandboxId, LiveEntry>>,
    sessions: Mutex<HashMap<SessionId, SandboxId>>,
    counters: Counters,
    before_evict: BeforeEvictHook,
    bridge_connect_timeout: Duration,
}

impl<C: Clock> SandboxPool<C> {
    pub fn new(
        db: Db,
        runtime: SandboxRuntime,
        clock: C,
        config: PoolConfig,
        before_evict: BeforeEvictHook,
        bridge_connect_timeout: Duration,
    ) -> Self {
        Self {
            db,
            runtime,
            clock,
            config,
            live: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            before_evict,
            bridge_connect_timeout,
        }
    }

    /// Startup recovery (§4.4): this host's DB rows from before a restart
    /// carry no live entries, so reconcile all of them to `cold`.
    pub async fn init(&self) -> Result<(), PoolError> {
        self.db.mark_all_owned_cold(&self.config.owner_host).await?;
        Ok(())
    }

    /// Spawn and warm a new sandbox, admitting it under capacity first
    /// (§4.4, §8). On any failure partway through, the DB row and any
    /// partially-started process are cleaned up before returning.
    pub async fn create(&self, req: CreateSandboxRequest) -> Result<SandboxHandleInfo, PoolError> {
        self.admit_capacity().await?;

        let sandbox_id = req.id;
        let workspace_dir = self.runtime.paths_for(sandbox_id.as_str()).workspace;
        let sandbox = Sandbox::new_warming(
            sandbox_id,
            req.tenant_id,
            req.agent_name.clone(),
            workspace_dir.clone(),
            self.now_utc(),
        );
        self.db.insert_sandbox(&sandbox, &self.config.owner_host).await?;

        let disk_exceeded = Arc::new(AtomicBool::new(false));
        let disk_exceeded_flag = disk_exceeded.clone();
        let handle = match self.runtime.spawn(&req, move || disk_exceeded_flag.store(true, Ordering::SeqCst)) {
            Ok(handle) => handle,
            Err(err) => {
                let _ = self.db.delete_sandbox(sandbox_id).await;
                return Err(PoolError::Sandbox(err));
            }
        };

        if let Err(err) = self.runtime.wait_for_socket(&handle).await {
            self.runtime.destroy(handle).await;
            let _ = self.db.delete_sandbox(sandbox_id).await;
            return Err(PoolError::Sandbox(err));
        }

        let bridge = match BridgeClient::connect(&handle.paths.socket, self.bridge_connect_timeout).await {
            Ok(bridge) => bridge,
            Err(err) => {
                self.runtime.destroy(handle).await;
                let _ = self.db.delete_sandbox(sandbox_id).await;
                return Err(PoolError::Sandbox(err));
            }
        };

        self.db.update_sandbox_state(sandbox_id, SandboxState::Warm, self.now_utc()).await?;

        let entry = LiveEntry {
            id: sandbox_id,
            tenant_id: req.tenant_id,
            handle,
            bridge,
            state: SandboxState::Warm,
            session_id: req.session_id,
            agent_name: req.agent_name,
            workspace_dir: workspace_dir.clone(),
            last_used_at_ms: self.clock.epoch_ms(),
            disk_exceeded,
        };

        {
            let mut live = self.live.lock();
            if let Some(session_id) = entry.session_id {
                self.sessions.lock().insert(session_id, sandbox_id);
            }
            live.insert(sandbox_id, entry);
        }

        Ok(SandboxHandleInfo { sandbox_id, workspace_dir })
    }

    /// Lazily check a sandbox's liveness (§3 "Get"): reaps an exited child
    /// non-blockingly, tears down a disk-limit violation, and drops
    /// bookkeeping for anything no longer alive. Returns `None` for any
    /// sandbox that isn't currently live, including one just discovered
    /// dead by this call.
    pub async fn get(&self, id: SandboxId) -> Option<SandboxHandleInfo> {
        let liveness = {
            let mut live = self.live.lock();
            match live.get_mut(&id) {
                None => Liveness::Missing,
                Some(entry) => {
                    let reaped = entry.handle.try_reap();
                    let disk_exceeded = entry.disk_exceeded.load(Ordering::SeqCst);
                    if reaped.is_some() || disk_exceeded {
                        Liveness::Dead { classification: reaped, session_id: entry.session_id }
                    } else {
                        Liveness::Alive(SandboxHandleInfo::from(&*entry))
                    }
                }
            }
        };

        match liveness {
            Liveness::Alive(info) => Some(info),
            Liveness::Missing => None,
            Liveness::Dead { classification: None, .. } => {
                // Disk-limit violation while the process is still alive: we
                // own the teardown, including the bridge `shutdown` send.
                if let Err(err) = self.evict_live(id, false).await {
                    warn!(sandbox_id = %id, %err, "teardown after disk limit exceeded failed");
                }
                None
            }
            Liveness::Dead { classification: Some(classification), session_id } => {
                {
                    let mut live = self.live.lock();
                    live.remove(&id);
                    if let Some(sid) = session_id {
                        self.sessions.lock().remove(&sid);
                    }
                }
                let _ = self.db.update_sandbox_state(id, SandboxState::Cold, self.now_utc()).await;
                if matches!(classification, ExitClassification::Oom | ExitClassification::Crash(_)) {
                    (self.before_evict)(EvictionContext { sandbox_id: id, session_id }).await;
                }
                None
            }
        }
    }

    pub async fn is_alive(&self, id: SandboxId) -> bool {
        self.get(id).await.is_some()
    }

    pub fn sandbox_for_session(&self, session_id: SessionId) -> Option<SandboxId> {
        self.sessions.lock().get(&session_id).copied()
    }

    /// Transition a live sandbox to `running`. Synchronous and
    /// lock-guarded so the change is visible to the idle sweep the instant
    /// it happens, with no await between the decision and the update (§4.4
    /// "markRunning races the idle sweeper").
    pub fn mark_running(&self, id: SandboxId) -> Result<(), PoolError> {
        let mut live = self.live.lock();
        let entry = live.get_mut(&id).ok_or_else(|| PoolError::NotFound(id.to_string()))?;
        entry.state = SandboxState::Running;
        entry.last_used_at_ms = self.clock.epoch_ms();
        Ok(())
    }

    /// Transition a live sandbox to `waiting`, starting its idle-timeout
    /// clock (§4.4).
    pub fn mark_waiting(&self, id: SandboxId) -> Result<(), PoolError> {
        let mut live = self.live.lock();
        let entry = live.get_mut(&id).ok_or_else(|| PoolError::NotFound(id.to_string()))?;
        entry.state = SandboxState::Waiting;
        entry.last_used_at_ms = self.clock.epoch_ms();
        Ok(())
    }

    /// Best-effort mirror of a live entry's current state into the DB row
    /// (§4.4): the in-memory map is authoritative for a live sandbox, this
    /// just keeps the row from going stale for startup recovery / stats.
    pub async fn persist_state(&self, id: SandboxId) -> Result<(), PoolError> {
        let (state, last_used_at_ms) = {
            let live = self.live.lock();
            let entry = live.get(&id).ok_or_else(|| PoolError::NotFound(id.to_string()))?;
            (entry.state, entry.last_used_at_ms)
        };
        self.db.update_sandbox_state(id, state, ms_to_datetime(last_used_at_ms)).await?;
        Ok(())
    }

    /// Send a `query` command, returning the event stream for the caller to
    /// drain (§4.3). A clone of the bridge handle is taken under the lock
    /// and the send itself happens outside it.
    pub async fn send_command(&self, id: SandboxId, command: &Command) -> Result<mpsc::Receiver<BridgeEvent>, PoolError> {
        let bridge = self.bridge_for(id)?;
        bridge.send_command(command).await.map_err(PoolError::from)
    }

    /// Fire-and-forget an `interrupt` or `shutdown` (§4.3).
    pub async fn send_fire_and_forget(&self, id: SandboxId, command: &Command) -> Result<(), PoolError> {
        let bridge = self.bridge_for(id)?;
        bridge.send_fire_and_forget(command).await.map_err(PoolError::from)
    }

    fn bridge_for(&self, id: SandboxId) -> Result<BridgeClient, PoolError> {
        let live = self.live.lock();
        live.get(&id).map(|e| e.bridge.clone()).ok_or_else(|| PoolError::NotFound(id.to_string()))
    }

    /// Tear down a sandbox on purpose (e.g. the bound session ended):
    /// shutdown over the bridge, process teardown, DB row deleted outright
    /// since nothing should resume it.
    pub async fn destroy(&self, id: SandboxId) -> Result<(), PoolError> {
        self.evict_live(id, true).await
    }

    /// Pre-warm `count` unbound sandboxes for `agent_name` (§3, §4.4),
    /// stopping early on the first failure. Returns how many actually
    /// started.
    pub async fn warm_up(&self, template: CreateSandboxRequest, count: usize) -> usize {
        let mut spawned = 0;
        for _ in 0..count {
            let mut req = template.clone();
            req.id = SandboxId::new();
            req.session_id = None;
            match self.create(req).await {
                Ok(_) => spawned += 1,
                Err(err) => {
                    warn!(agent_name = %template.agent_name, %err, "pre-warm attempt failed");
                    break;
                }
            }
        }
        spawned
    }

    /// Find an unbound, warm sandbox for `agent_name` to resume into,
    /// oldest first (§3 pre-warm consumption). Does not bind it; callers
    /// must follow up with [`Self::bind_session`].
    pub fn consume_pre_warmed(&self, agent_name: &str) -> Option<SandboxId> {
        let live = self.live.lock();
        live.values()
            .filter(|e| e.state == SandboxState::Warm && e.session_id.is_none() && e.agent_name == agent_name)
            .min_by_key(|e| e.last_used_at_ms)
            .map(|e| e.id)
    }

    /// Bind a previously-unowned sandbox to a session (§4.4 warm-hit path).
    pub async fn bind_session(&self, id: SandboxId, session_id: SessionId) -> Result<(), PoolError> {
        {
            let mut live = self.live.lock();
            let entry = live.get_mut(&id).ok_or_else(|| PoolError::NotFound(id.to_string()))?;
            entry.session_id = Some(session_id);
        }
        self.sessions.lock().insert(session_id, id);
        self.db.bind_sandbox_session(id, session_id).await?;
        self.counters.record_warm_hit();
        Ok(())
    }

    pub fn record_cold_local_hit(&self) {
        self.counters.record_cold_local_hit();
    }

    pub fn record_cold_cloud_hit(&self) {
        self.counters.record_cold_cloud_hit();
    }

    pub fn record_cold_fresh_hit(&self) {
        self.counters.record_cold_fresh_hit();
    }

    /// Record a warm-resume hit for a session whose sandbox was already
    /// bound and found alive (§4.8 resume "warm path"), as distinct from
    /// [`Self::bind_session`]'s own warm-hit recording for the pre-warm
    /// consumption path.
    pub fn record_warm_hit(&self) {
        self.counters.record_warm_hit();
    }

    pub async fn stats(&self) -> Result<PoolStats, PoolError> {
        let histogram = {
            let live = self.live.lock();
            live.values().fold(StateHistogram::default(), |mut hist, entry| {
                match entry.state {
                    SandboxState::Warming => hist.warming += 1,
                    SandboxState::Warm => hist.warm += 1,
                    SandboxState::Waiting => hist.waiting += 1,
                    SandboxState::Running => hist.running += 1,
                    SandboxState::Cold => {}
                }
                hist
            })
        };
        let cold_count = self.db.count_cold(&self.config.owner_host).await? as u64;
        Ok(PoolStats {
            histogram,
            cold_count,
            resume_warm_hits: self.counters.resume_warm_hits.load(Ordering::Relaxed),
            resume_cold_hits: self.counters.resume_cold_hits(),
            resume_cold_local_hits: self.counters.resume_cold_local_hits.load(Ordering::Relaxed),
            resume_cold_cloud_hits: self.counters.resume_cold_cloud_hits.load(Ordering::Relaxed),
            resume_cold_fresh_hits: self.counters.resume_cold_fresh_hits.load(Ordering::Relaxed),
            pre_warm_hits: self.counters.pre_warm_hits.load(Ordering::Relaxed),
        })
    }

    /// Start the idle-sweep and cold-cleanup background loops. Takes
    /// `Arc<Self>` because both loops outlive the call and need to keep the
    /// pool alive for as long as they run.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        let idle = self.clone();
        tokio::spawn(async move { idle.idle_sweep_loop().await });
        let cold = self.clone();
        tokio::spawn(async move { cold.cold_cleanup_loop().await });
    }

    async fn idle_sweep_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.idle_sweep_interval);
        loop {
            ticker.tick().await;
            self.sweep_idle().await;
        }
    }

    async fn cold_cleanup_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.cold_cleanup_interval);
        loop {
            ticker.tick().await;
            self.sweep_cold().await;
        }
    }

    /// Evict every `waiting` sandbox that has sat past `idle_timeout_ms`
    /// (§4.4). Eviction here marks the row `cold` rather than deleting it:
    /// the sandbox may still be resumed later, just not without a cold
    /// restore.
    async fn sweep_idle(&self) {
        let now_ms = self.clock.epoch_ms();
        let stale: Vec<SandboxId> = {
            let live = self.live.lock();
            live.values()
                .filter(|e| e.state == SandboxState::Waiting)
                .filter(|e| now_ms.saturating_sub(e.last_used_at_ms) >= self.config.idle_timeout_ms)
                .map(|e| e.id)
                .collect()
        };
        for id in stale {
            if let Err(err) = self.evict_live(id, false).await {
                warn!(sandbox_id = %id, %err, "idle sweep eviction failed");
            }
        }
    }

    /// Delete `cold` rows past `cold_cleanup_ttl_ms` and best-effort remove
    /// their workspace directories (§4.4): once a sandbox has been cold for
    /// this long, resuming it should go through cloud/fresh restore rather
    /// than keep local files around indefinitely.
    async fn sweep_cold(&self) {
        let cutoff = ms_to_datetime(self.clock.epoch_ms().saturating_sub(self.config.cold_cleanup_ttl_ms));
        let rows = match self.db.list_cold_older_than(&self.config.owner_host, cutoff).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(%err, "cold cleanup sweep could not list rows");
                return;
            }
        };
        for sandbox in rows {
            if let Err(err) = self.db.delete_sandbox(sandbox.id).await {
                warn!(sandbox_id = %sandbox.id, %err, "cold cleanup delete failed");
                continue;
            }
            self.runtime.paths_for(sandbox.id.as_str()).remove_all();
        }
    }

    /// Free a capacity slot, preferring a candidate that costs nothing to
    /// evict (§4.4 tier order: `cold` first since it has no live process,
    /// then `waiting`, then `warm`; `running`/`warming` are never touched).
    /// A `cold` candidate's row is deleted outright, freeing the slot
    /// immediately; a live candidate is fully torn down and its row deleted
    /// too, since admission eviction (unlike the idle sweep) must actually
    /// shrink the DB-counted total to make room.
    async fn admit_capacity(&self) -> Result<(), PoolError> {
        let owned = self.db.count_owned(&self.config.owner_host).await?;
        if (owned as u64) < self.config.max_sandboxes as u64 {
            return Ok(());
        }

        if let Some(cold) = self.db.oldest_cold(&self.config.owner_host).await? {
            self.db.delete_sandbox(cold.id).await?;
            self.runtime.paths_for(cold.id.as_str()).remove_all();
            return Ok(());
        }

        match self.pick_live_eviction_candidate() {
            Some(id) => self.evict_live(id, true).await,
            None => Err(PoolError::CapacityReached),
        }
    }

    fn pick_live_eviction_candidate(&self) -> Option<SandboxId> {
        let live = self.live.lock();
        live.values()
            .filter_map(|e| e.state.eviction_tier().map(|tier| (tier, e.last_used_at_ms, e.id)))
            .min()
            .map(|(_, _, id)| id)
    }

    /// Remove a live entry, notify the hook, shut its bridge and process
    /// down, then reconcile the DB row either to `cold` (idle-sweep /
    /// disk-limit teardown, resumable later) or deleted outright (capacity
    /// eviction, explicit destroy: not meant to resume).
    async fn evict_live(&self, id: SandboxId, delete_row: bool) -> Result<(), PoolError> {
        let entry = {
            let mut live = self.live.lock();
            let entry = live.remove(&id);
            if let Some(e) = &entry {
                if let Some(sid) = e.session_id {
                    self.sessions.lock().remove(&sid);
                }
            }
            entry
        };
        let Some(entry) = entry else { return Ok(()) };

        (self.before_evict)(EvictionContext { sandbox_id: id, session_id: entry.session_id }).await;

        let _ = entry.bridge.send_fire_and_forget(&Command::Shutdown).await;
        self.runtime.destroy(entry.handle).await;

        if delete_row {
            self.db.delete_sandbox(id).await?;
        } else {
            self.db.update_sandbox_state(id, SandboxState::Cold, self.now_utc()).await?;
        }
        Ok(())
    }

    fn now_utc(&self) -> DateTime<Utc> {
        ms_to_datetime(self.clock.epoch_ms())
    }
}

fn ms_to_datetime(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_else(Utc::now)
}
