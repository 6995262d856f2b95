//! Scripted in-memory container runtime for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use golf_sandbox::{ContainerId, ContainerLogs, ContainerRuntime, RuntimeError, SandboxSpec};
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Exit code reported for a killed container (SIGKILL).
pub const KILLED_EXIT_CODE: i64 = 137;

/// How every container created by a [`FakeRuntime`] behaves.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    /// How long the "build" runs before exiting on its own.
    pub run_time: Duration,
    /// Print the uploaded source as stdout instead of `stdout`.
    pub echo_source: bool,
    /// Keep running after a kill, as a wedged daemon would.
    pub ignore_kill: bool,
    pub fail_create: bool,
    pub fail_upload: bool,
    pub fail_start: bool,
    /// Lose the daemon connection while waiting for the exit status.
    pub fail_wait: bool,
    pub fail_logs: bool,
    /// How long fetching the output takes.
    pub logs_delay: Duration,
}

impl Script {
    pub fn success(stdout: &str) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failure(exit_code: i64, stderr: &str) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    pub fn running_for(run_time: Duration) -> Self {
        Self {
            stdout: "100".into(),
            run_time,
            ..Self::default()
        }
    }

    pub fn echo() -> Self {
        Self {
            echo_source: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub uploads: AtomicUsize,
    pub starts: AtomicUsize,
    pub waits: AtomicUsize,
    pub kills: AtomicUsize,
    pub logs: AtomicUsize,
    pub removes: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Container {
    killed: Arc<Notify>,
    source: Option<String>,
    upload_dest: Option<String>,
}

/// Container runtime double that records every call.
#[derive(Default)]
pub struct FakeRuntime {
    script: Script,
    pub counters: Counters,
    containers: Mutex<HashMap<ContainerId, Container>>,
    last_spec: Mutex<Option<SandboxSpec>>,
}

impl FakeRuntime {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            ..Self::default()
        })
    }

    pub fn created(&self) -> usize {
        Counters::get(&self.counters.created)
    }

    pub fn removes(&self) -> usize {
        Counters::get(&self.counters.removes)
    }

    pub fn kills(&self) -> usize {
        Counters::get(&self.counters.kills)
    }

    pub fn starts(&self) -> usize {
        Counters::get(&self.counters.starts)
    }

    pub fn logs_calls(&self) -> usize {
        Counters::get(&self.counters.logs)
    }

    /// The spec passed to the most recent `create`.
    pub fn last_spec(&self) -> Option<SandboxSpec> {
        self.last_spec.lock().unwrap().clone()
    }

    /// Destination and source text of every upload, in no particular order.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.containers
            .lock()
            .unwrap()
            .values()
            .filter_map(|c| Some((c.upload_dest.clone()?, c.source.clone()?)))
            .collect()
    }

    fn source_of(&self, id: &ContainerId) -> Option<String> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .and_then(|c| c.source.clone())
    }
}

fn unpack_source(archive: &[u8]) -> Option<String> {
    let mut archive = tar::Archive::new(archive);
    let mut entry = archive.entries().ok()?.next()?.ok()?;
    let mut source = String::new();
    entry.read_to_string(&mut source).ok()?;
    Some(source)
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, spec: &SandboxSpec, name: &str) -> golf_sandbox::Result<ContainerId> {
        if self.script.fail_create {
            return Err(RuntimeError::Create("no such image".into()));
        }
        let n = self.counters.created.fetch_add(1, Ordering::SeqCst);
        let id = ContainerId::new(format!("fake{n:08}-{name}"));
        self.containers
            .lock()
            .unwrap()
            .insert(id.clone(), Container::default());
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        Ok(id)
    }

    async fn upload_archive(
        &self,
        id: &ContainerId,
        dest: &str,
        archive: Bytes,
    ) -> golf_sandbox::Result<()> {
        self.counters.uploads.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_upload {
            return Err(RuntimeError::Upload("disk full".into()));
        }
        let mut containers = self.containers.lock().unwrap();
        let container = containers.get_mut(id).expect("upload to unknown container");
        container.source = unpack_source(&archive);
        container.upload_dest = Some(dest.to_string());
        Ok(())
    }

    async fn start(&self, _id: &ContainerId) -> golf_sandbox::Result<()> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_start {
            return Err(RuntimeError::Start("cgroup setup failed".into()));
        }
        Ok(())
    }

    async fn wait(&self, id: &ContainerId) -> golf_sandbox::Result<i64> {
        self.counters.waits.fetch_add(1, Ordering::SeqCst);
        let killed = self
            .containers
            .lock()
            .unwrap()
            .get(id)
            .map(|c| Arc::clone(&c.killed))
            .expect("wait on unknown container");

        if self.script.fail_wait {
            tokio::time::sleep(self.script.run_time).await;
            return Err(RuntimeError::Wait("daemon connection reset".into()));
        }
        if self.script.ignore_kill {
            tokio::time::sleep(self.script.run_time).await;
            return Ok(self.script.exit_code);
        }
        tokio::select! {
            _ = tokio::time::sleep(self.script.run_time) => Ok(self.script.exit_code),
            _ = killed.notified() => Ok(KILLED_EXIT_CODE),
        }
    }

    async fn kill(&self, id: &ContainerId) -> golf_sandbox::Result<()> {
        self.counters.kills.fetch_add(1, Ordering::SeqCst);
        if let Some(c) = self.containers.lock().unwrap().get(id) {
            c.killed.notify_one();
        }
        Ok(())
    }

    async fn logs(&self, id: &ContainerId) -> golf_sandbox::Result<ContainerLogs> {
        self.counters.logs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.script.logs_delay).await;
        if self.script.fail_logs {
            return Err(RuntimeError::Logs("log driver unavailable".into()));
        }
        let stdout = if self.script.echo_source {
            self.source_of(id).unwrap_or_default()
        } else {
            self.script.stdout.clone()
        };
        Ok(ContainerLogs {
            stdout,
            stderr: self.script.stderr.clone(),
        })
    }

    async fn remove(&self, _id: &ContainerId) -> golf_sandbox::Result<()> {
        self.counters.removes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
