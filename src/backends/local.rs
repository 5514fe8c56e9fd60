//! Local-process backend: runs each job as a child process on the machine
//! the engine itself runs on.
//!
//! Grounded on the subprocess-spawning idiom of the legacy job runner (build
//! the argv, spawn, capture combined stdout+stderr) and on its signal-based
//! termination code (`SIGTERM` on Unix with ESRCH treated as already-gone;
//! a Job Object plus a `Toolhelp32` process-tree fallback on Windows).
//!
//! Each worker id maps to at most one running child at a time; availability
//! is tracked locally rather than queried from the OS.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::warn;

use crate::backend::{Backend, JobHandle, JobStatus};
use crate::error::BackendError;

struct RunningJob {
    child: Child,
    worker_id: usize,
    output: Arc<Mutex<String>>,
}

/// Spawns `program base_args... params_string` as a child process per job.
/// `params_string` is appended as a single trailing argument — this backend
/// does not attempt to shell-split it.
pub struct LocalProcessBackend {
    program: String,
    base_args: Vec<String>,
    num_workers: usize,
    worker_busy: Mutex<Vec<bool>>,
    jobs: Mutex<HashMap<String, RunningJob>>,
    next_id: AtomicU64,
}

impl LocalProcessBackend {
    pub fn new(program: impl Into<String>, base_args: Vec<String>, num_workers: usize) -> Self {
        Self {
            program: program.into(),
            base_args,
            num_workers,
            worker_busy: Mutex::new(vec![false; num_workers]),
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn mark_free(&self, worker_id: usize) {
        self.worker_busy.lock().unwrap()[worker_id] = false;
    }
}

#[async_trait]
impl Backend for LocalProcessBackend {
    fn num_workers(&self) -> usize {
        self.num_workers
    }

    async fn is_worker_available(&self, worker_id: usize) -> Result<bool, BackendError> {
        Ok(!self.worker_busy.lock().unwrap()[worker_id])
    }

    async fn launch_job(&self, worker_id: usize, params_string: &str) -> Result<JobHandle, BackendError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .arg(params_string)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| BackendError::Launch(format!("{}: {e}", self.program)))?;

        let output = Arc::new(Mutex::new(String::new()));
        spawn_reader(child.stdout.take(), output.clone());
        spawn_reader(child.stderr.take(), output.clone());

        self.worker_busy.lock().unwrap()[worker_id] = true;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job_id = format!("local-{id}");
        self.jobs.lock().unwrap().insert(
            job_id.clone(),
            RunningJob {
                child,
                worker_id,
                output,
            },
        );
        Ok(JobHandle::new(job_id))
    }

    async fn get_job_status(&self, handle: &JobHandle) -> Result<JobStatus, BackendError> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&handle.0) else {
            return Ok(JobStatus::NotFound);
        };
        match job.child.try_wait() {
            Ok(None) => Ok(JobStatus::Running),
            Ok(Some(status)) => {
                self.mark_free(job.worker_id);
                Ok(if status.success() {
                    JobStatus::Succeeded
                } else {
                    JobStatus::Failed
                })
            }
            Err(e) => Err(BackendError::Status(e.to_string())),
        }
    }

    async fn get_logs_for_job(&self, handle: &JobHandle) -> Result<String, BackendError> {
        let jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get(&handle.0)
            .ok_or_else(|| BackendError::LogRetrieval(format!("unknown job {}", handle.0)))?;
        Ok(job.output.lock().unwrap().clone())
    }

    async fn kill_job(&self, handle: &JobHandle) -> Result<(), BackendError> {
        let (pid, worker_id) = {
            let jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get(&handle.0)
                .ok_or_else(|| BackendError::Kill(format!("unknown job {}", handle.0)))?;
            let pid = job.child.id().ok_or_else(|| BackendError::Kill("process already reaped".to_string()))?;
            (pid, job.worker_id)
        };
        signal::terminate(pid).map_err(|e| BackendError::Kill(e.to_string()))?;
        self.mark_free(worker_id);
        Ok(())
    }
}

fn spawn_reader<R>(stream: Option<R>, output: Arc<Mutex<String>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let Some(stream) = stream else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let mut buf = output.lock().unwrap();
                    buf.push_str(&line);
                    buf.push('\n');
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "error reading child process output");
                    break;
                }
            }
        }
    });
}

mod signal {
    #[cfg(unix)]
    pub fn terminate(pid: u32) -> std::io::Result<()> {
        // SAFETY: kill(2) is safe to call with any pid and a valid signal number.
        let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if ret != 0 {
            let err = std::io::Error::last_os_error();
            // ESRCH: no such process — already gone, treat as success.
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err);
            }
        }
        Ok(())
    }

    #[cfg(windows)]
    pub fn terminate(pid: u32) -> std::io::Result<()> {
        use windows::Win32::Foundation::{CloseHandle, ERROR_INVALID_PARAMETER, HANDLE};
        use windows::Win32::System::Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot, Process32First, Process32Next, PROCESSENTRY32, TH32CS_SNAPPROCESS,
        };
        use windows::Win32::System::JobObjects::{AssignProcessToJobObject, CreateJobObjectW, TerminateJobObject};
        use windows::Win32::System::Threading::{OpenProcess, PROCESS_SET_QUOTA, PROCESS_TERMINATE};

        fn to_io_err(e: windows::core::Error) -> std::io::Error {
            std::io::Error::other(e.to_string())
        }

        unsafe {
            let proc_handle: HANDLE =
                OpenProcess(PROCESS_TERMINATE | PROCESS_SET_QUOTA, false, pid).map_err(to_io_err)?;
            let job: HANDLE = CreateJobObjectW(None, None).map_err(to_io_err)?;

            if AssignProcessToJobObject(job, proc_handle).is_err() {
                let _ = CloseHandle(job);
                let _ = CloseHandle(proc_handle);
                return terminate_process_tree(pid);
            }

            let result = TerminateJobObject(job, 1);
            let _ = CloseHandle(proc_handle);
            let _ = CloseHandle(job);
            result.map_err(to_io_err)
        }

        #[allow(unreachable_code)]
        unsafe fn terminate_process_tree(root_pid: u32) -> std::io::Result<()> {
            use windows::Win32::Foundation::CloseHandle;
            use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).map_err(to_io_err)?;

            let mut entries: Vec<(u32, u32)> = Vec::new();
            let mut entry = PROCESSENTRY32 {
                dwSize: std::mem::size_of::<PROCESSENTRY32>() as u32,
                ..Default::default()
            };
            if Process32First(snapshot, &mut entry).is_ok() {
                loop {
                    entries.push((entry.th32ProcessID, entry.th32ParentProcessID));
                    entry = PROCESSENTRY32 {
                        dwSize: std::mem::size_of::<PROCESSENTRY32>() as u32,
                        ..Default::default()
                    };
                    if Process32Next(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);

            let mut to_kill = vec![root_pid];
            let mut i = 0;
            while i < to_kill.len() {
                let parent = to_kill[i];
                for &(child_pid, parent_pid) in &entries {
                    if parent_pid == parent && !to_kill.contains(&child_pid) {
                        to_kill.push(child_pid);
                    }
                }
                i += 1;
            }

            for &target_pid in to_kill.iter().rev() {
                match OpenProcess(PROCESS_TERMINATE, false, target_pid) {
                    Ok(h) => {
                        let result = TerminateProcess(h, 1);
                        let _ = CloseHandle(h);
                        result.map_err(to_io_err)?;
                    }
                    Err(e) => {
                        if e.code() != ERROR_INVALID_PARAMETER.to_hresult() {
                            return Err(to_io_err(e));
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[cfg(not(any(unix, windows)))]
    pub fn terminate(_pid: u32) -> std::io::Result<()> {
        Err(std::io::Error::other("process termination not supported on this platform"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_job_runs_to_completion_and_reports_logs() {
        let backend = LocalProcessBackend::new("echo", vec!["Result:".to_string()], 1);
        let handle = backend.launch_job(0, "42").await.unwrap();

        let mut status = backend.get_job_status(&handle).await.unwrap();
        for _ in 0..50 {
            if status != JobStatus::Running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            status = backend.get_job_status(&handle).await.unwrap();
        }
        assert_eq!(status, JobStatus::Succeeded);

        let log = backend.get_logs_for_job(&handle).await.unwrap();
        assert!(log.contains("Result: 42"));
        assert!(backend.is_worker_available(0).await.unwrap());
    }

    #[tokio::test]
    async fn worker_is_busy_while_job_runs() {
        let backend = LocalProcessBackend::new("sleep", vec!["0.3".to_string()], 1);
        let handle = backend.launch_job(0, "").await.unwrap();
        assert!(!backend.is_worker_available(0).await.unwrap());
        backend.kill_job(&handle).await.unwrap();
        assert!(backend.is_worker_available(0).await.unwrap());
    }
}
