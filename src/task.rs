//! Worker thread that repeatedly runs one processing step.
//!
//! A [`Task`] owns a named OS thread. While running, the thread calls the
//! step closure in a loop; between steps it polls a `kanal` command channel
//! for start, pause and stop requests. A step can pause its own task by
//! returning [`TaskFlow::Pause`].

use crate::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

/// What the worker does after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFlow {
    /// Run the next step.
    Continue,
    /// Stop calling the step until the task is started again.
    Pause,
}

/// Observable task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// The thread has exited.
    Stopped = 0,
    /// The thread waits for a command.
    Paused = 1,
    /// The thread is running steps.
    Running = 2,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Paused,
            2 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

enum Command {
    Start,
    Pause(kanal::Sender<()>),
    Stop,
}

/// Handle to a worker thread.
pub struct Task {
    name: String,
    commands: kanal::Sender<Command>,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Task {
    /// Spawn a paused worker thread running `step`.
    pub fn spawn<F>(name: impl Into<String>, mut step: F) -> Result<Self>
    where
        F: FnMut() -> TaskFlow + Send + 'static,
    {
        let name = name.into();
        let (commands, inbox) = kanal::unbounded::<Command>();
        let state = Arc::new(AtomicU8::new(TaskState::Paused as u8));

        let worker_state = Arc::clone(&state);
        let worker_name = name.clone();
        let thread = thread::Builder::new().name(name.clone()).spawn(move || {
            let mut running = false;
            loop {
                let command = if running {
                    match inbox.try_recv() {
                        Ok(command) => command,
                        Err(_) => break,
                    }
                } else {
                    match inbox.recv() {
                        Ok(command) => Some(command),
                        Err(_) => break,
                    }
                };

                match command {
                    Some(Command::Start) => running = true,
                    Some(Command::Pause(ack)) => {
                        running = false;
                        worker_state.store(TaskState::Paused as u8, Ordering::Release);
                        let _ = ack.send(());
                        continue;
                    }
                    Some(Command::Stop) => break,
                    None => {}
                }

                if !running {
                    continue;
                }
                worker_state.store(TaskState::Running as u8, Ordering::Release);
                if step() == TaskFlow::Pause {
                    tracing::trace!(task = %worker_name, "step requested pause");
                    running = false;
                    worker_state.store(TaskState::Paused as u8, Ordering::Release);
                }
            }
            worker_state.store(TaskState::Stopped as u8, Ordering::Release);
            tracing::debug!(task = %worker_name, "worker exited");
        })?;

        let thread_id = thread.thread().id();
        Ok(Self {
            name,
            commands,
            state,
            thread: Some(thread),
            thread_id,
        })
    }

    /// Thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true while steps are being run.
    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// Start or resume running steps.
    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    /// Stop running steps.
    ///
    /// Blocks until the step in progress has returned, unless called from
    /// the worker thread itself.
    pub fn pause(&self) {
        let (ack, done) = kanal::bounded(1);
        if self.commands.send(Command::Pause(ack)).is_err() {
            return;
        }
        if thread::current().id() != self.thread_id {
            let _ = done.recv();
        }
    }

    /// Terminate the thread and wait for it to exit.
    pub fn stop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(thread) = self.thread.take() {
            if thread::current().id() == self.thread_id {
                return;
            }
            if thread.join().is_err() {
                tracing::error!(task = %self.name, "worker panicked");
            }
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
