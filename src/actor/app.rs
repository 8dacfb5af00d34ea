//! The app actor serializes accessibility calls for one application.
//!
//! Accessibility calls block until the target process answers, so each
//! process gets its own thread. The thread owns the app element and every
//! window element it has handed out; the coordinator only ever sees window
//! ids and plain data. Jobs run in submission order.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;
use tokio::select;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, instrument, trace};

use crate::common::collections::{BTreeMap, HashMap, HashSet};
use crate::sys::ax::{
    AppInfo, AxApp, AxConnector, AxError, AxEventSender, AxWindow, WINDOW_NOTIFICATIONS,
    WindowAttributes, WindowId, pid_t,
};
use crate::sys::enhanced_ui::with_enhanced_ui_disabled;
use crate::sys::geometry::{Point, Rect, Size};

/// The caller's token was cancelled before the job produced a result.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation was cancelled")]
pub struct Cancelled;

#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    #[error("an actor for pid {0} is already starting")]
    AlreadyStarting(pid_t),
    #[error("failed to spawn app thread: {0}")]
    Thread(#[from] std::io::Error),
    #[error("failed to connect to app: {0}")]
    Connect(#[from] AxError),
    #[error("app thread exited during startup")]
    Exited,
}

/// State owned by the actor thread.
pub struct AppState {
    pub pid: pid_t,
    pub info: AppInfo,
    pub app: Box<dyn AxApp>,
    pub windows: HashMap<WindowId, Box<dyn AxWindow>>,
}

impl AppState {
    fn window(&self, id: WindowId) -> Option<&dyn AxWindow> { self.windows.get(&id).map(|w| &**w) }
}

type Job = Box<dyn FnOnce(&mut AppState, &CancellationToken) + Send>;

enum Message {
    Job { job: Job, token: CancellationToken, span: Span },
    Terminate,
}

/// A window seen for the first time, already subscribed to notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWindow {
    pub id: WindowId,
    pub attributes: WindowAttributes,
    pub is_app_focused_window: bool,
    pub title: Option<String>,
    pub rect: Option<Rect>,
}

/// Native state the OS reports for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeState {
    pub fullscreen: bool,
    pub minimized: bool,
}

/// Handle to an app actor, used from the coordination context.
pub struct AppActor {
    pid: pid_t,
    info: AppInfo,
    tx: Sender<Message>,
    frame_jobs: Mutex<HashMap<WindowId, CancellationToken>>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for AppActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppActor").field("pid", &self.pid).field("info", &self.info).finish()
    }
}

impl AppActor {
    /// Starts the actor thread and connects to the app from it.
    #[instrument(skip(connector, events), fields(app = info.display_name()))]
    pub async fn spawn(
        pid: pid_t,
        info: AppInfo,
        connector: Arc<dyn AxConnector>,
        events: AxEventSender,
    ) -> Result<AppActor, SpawnError> {
        let (tx, rx) = unbounded::<Message>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let thread_name = format!("{}({})", info.bundle_id.as_deref().unwrap_or(""), pid);
        let thread_info = info.clone();
        let thread = thread::Builder::new().name(thread_name).spawn(move || {
            let app = match connector.connect(pid, &thread_info, events) {
                Ok(app) => app,
                Err(err) => {
                    _ = ready_tx.send(Err(err));
                    return;
                }
            };
            _ = ready_tx.send(Ok(()));
            let state = AppState {
                pid,
                info: thread_info,
                app,
                windows: HashMap::default(),
            };
            app_thread_main(state, rx);
        })?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(AppActor {
                pid,
                info,
                tx,
                frame_jobs: Mutex::new(HashMap::default()),
                thread: Some(thread),
            }),
            Ok(Err(err)) => Err(SpawnError::Connect(err)),
            Err(_) => Err(SpawnError::Exited),
        }
    }

    pub fn pid(&self) -> pid_t { self.pid }

    pub fn info(&self) -> &AppInfo { &self.info }

    fn send_job(&self, token: CancellationToken, job: Job) -> bool {
        self.tx.send(Message::Job { job, token, span: Span::current() }).is_ok()
    }

    /// Queues `job` without waiting for it.
    pub fn submit(
        &self,
        token: CancellationToken,
        job: impl FnOnce(&mut AppState, &CancellationToken) + Send + 'static,
    ) {
        if !self.send_job(token, Box::new(job)) {
            trace!(pid = self.pid, "app thread is gone; dropping job");
        }
    }

    /// Runs `job` on the actor thread and waits for its result.
    ///
    /// Returns `Err(Cancelled)` if `token` is cancelled first and `Ok(None)`
    /// if the actor went away before answering. Dropping the returned future
    /// cancels the job if it has not started yet.
    pub async fn call<T: Send + 'static>(
        &self,
        token: &CancellationToken,
        job: impl FnOnce(&mut AppState, &CancellationToken) -> T + Send + 'static,
    ) -> Result<Option<T>, Cancelled> {
        if token.is_cancelled() {
            return Err(Cancelled);
        }
        let job_token = token.child_token();
        let _guard = job_token.clone().drop_guard();
        let (tx, rx) = oneshot::channel();
        let sent = self.send_job(
            job_token,
            Box::new(move |state: &mut AppState, token: &CancellationToken| {
                _ = tx.send(job(state, token));
            }),
        );
        if !sent {
            return Ok(None);
        }
        select! {
            biased;
            _ = token.cancelled() => Err(Cancelled),
            result = rx => Ok(result.ok()),
        }
    }

    /// Lists app windows that have not been seen before and subscribes to their
    /// notifications. Windows that can't be subscribed to are dropped.
    pub async fn detect_new_windows(&self, token: &CancellationToken) -> Result<Option<Vec<NewWindow>>, Cancelled> {
        self.call(token, |state, _| {
            let elements = match state.app.windows() {
                Ok(elements) => elements,
                Err(err) => {
                    trace!(?err, "could not list windows");
                    return Vec::new();
                }
            };
            let focused = state.app.focused_window();
            let mut new = Vec::new();
            for element in elements {
                let Some(id) = element.window_id() else { continue };
                if state.windows.contains_key(&id) {
                    continue;
                }
                if let Err(err) = state.app.subscribe(element.as_ref(), WINDOW_NOTIFICATIONS) {
                    debug!(%id, ?err, "subscribing failed; ignoring window");
                    state.app.unsubscribe(id);
                    continue;
                }
                let rect = match (element.position(), element.size()) {
                    (Ok(origin), Ok(size)) => Some(Rect::from_parts(origin, size)),
                    _ => None,
                };
                new.push(NewWindow {
                    id,
                    attributes: element.attributes(),
                    is_app_focused_window: focused == Some(id),
                    title: element.title().ok(),
                    rect,
                });
                state.windows.insert(id, element);
            }
            new
        })
        .await
    }

    /// Ids of known windows that still refer to a live OS window.
    pub async fn resolvable_windows(&self, token: &CancellationToken) -> Result<Option<HashSet<WindowId>>, Cancelled> {
        self.call(token, |state, _| {
            state
                .windows
                .iter()
                .filter(|(id, w)| w.window_id() == Some(**id))
                .map(|(id, _)| *id)
                .collect()
        })
        .await
    }

    pub async fn native_states(&self, token: &CancellationToken) -> Result<Option<BTreeMap<WindowId, NativeState>>, Cancelled> {
        self.call(token, |state, _| {
            state
                .windows
                .iter()
                .map(|(&id, w)| {
                    let fullscreen = w.is_fullscreen().unwrap_or(false);
                    let minimized = !fullscreen && w.is_minimized().unwrap_or(false);
                    (id, NativeState { fullscreen, minimized })
                })
                .collect()
        })
        .await
    }

    /// Attributes of a known window and whether it is the app's focused
    /// window.
    pub async fn window_attributes(
        &self,
        id: WindowId,
        token: &CancellationToken,
    ) -> Result<Option<(WindowAttributes, bool)>, Cancelled> {
        let result = self
            .call(token, move |state, _| {
                let attributes = state.window(id)?.attributes();
                Some((attributes, state.app.focused_window() == Some(id)))
            })
            .await?;
        Ok(result.flatten())
    }

    pub async fn focused_window(&self, token: &CancellationToken) -> Result<Option<WindowId>, Cancelled> {
        Ok(self.call(token, |state, _| state.app.focused_window()).await?.flatten())
    }

    pub async fn window_count(&self, token: &CancellationToken) -> Result<Option<usize>, Cancelled> {
        self.call(token, |state, _| state.app.windows().map(|w| w.len()).unwrap_or(0)).await
    }

    pub async fn top_left(&self, id: WindowId, token: &CancellationToken) -> Result<Option<Point>, Cancelled> {
        let result = self.call(token, move |state, _| state.window(id)?.position().ok()).await?;
        Ok(result.flatten())
    }

    pub async fn size(&self, id: WindowId, token: &CancellationToken) -> Result<Option<Size>, Cancelled> {
        let result = self.call(token, move |state, _| state.window(id)?.size().ok()).await?;
        Ok(result.flatten())
    }

    pub async fn rect(&self, id: WindowId, token: &CancellationToken) -> Result<Option<Rect>, Cancelled> {
        let result = self
            .call(token, move |state, _| {
                let window = state.window(id)?;
                Some(Rect::from_parts(window.position().ok()?, window.size().ok()?))
            })
            .await?;
        Ok(result.flatten())
    }

    /// Changes a window frame. A newer request for the same window cancels
    /// this one if it has not run yet.
    pub fn set_frame(&self, id: WindowId, origin: Option<Point>, size: Option<Size>, token: &CancellationToken) {
        let job_token = token.child_token();
        if let Some(previous) = self.frame_jobs.lock().insert(id, job_token.clone()) {
            previous.cancel();
        }
        self.submit(job_token, move |state, _| {
            let Some(window) = state.window(id) else { return };
            with_enhanced_ui_disabled(state.app.as_ref(), || {
                // Setting the size first lets the window grow into its new
                // position; the second pass fixes sizes clamped at the old one.
                if let Some(size) = size {
                    _ = window.set_size(size);
                }
                if let Some(origin) = origin {
                    if let Err(err) = window.set_position(origin) {
                        trace!(%id, ?err, "set_position failed");
                    }
                }
                if let Some(size) = size {
                    _ = window.set_size(size);
                }
            });
        });
    }

    pub fn set_top_left(&self, id: WindowId, origin: Point, token: &CancellationToken) {
        self.set_frame(id, Some(origin), None, token);
    }

    pub async fn close_window(&self, id: WindowId, token: &CancellationToken) -> Result<Option<bool>, Cancelled> {
        let closed = self
            .call(token, move |state, _| {
                let closed = state.window(id).is_some_and(|w| w.close().is_ok());
                if closed {
                    state.app.unsubscribe(id);
                    state.windows.remove(&id);
                }
                closed
            })
            .await?;
        if closed == Some(true) {
            self.frame_jobs.lock().remove(&id);
        }
        Ok(closed)
    }

    pub fn set_native_fullscreen(&self, id: WindowId, fullscreen: bool, token: &CancellationToken) {
        self.submit(token.child_token(), move |state, _| {
            if let Some(Err(err)) = state.window(id).map(|w| w.set_fullscreen(fullscreen)) {
                debug!(%id, ?err, "set_fullscreen failed");
            }
        });
    }

    pub fn set_native_minimized(&self, id: WindowId, minimized: bool, token: &CancellationToken) {
        self.submit(token.child_token(), move |state, _| {
            if let Some(Err(err)) = state.window(id).map(|w| w.set_minimized(minimized)) {
                debug!(%id, ?err, "set_minimized failed");
            }
        });
    }

    /// Activates the app and raises the window.
    pub fn focus_window(&self, id: WindowId, token: &CancellationToken) {
        self.submit(token.child_token(), move |state, _| {
            if let Err(err) = state.app.activate() {
                debug!(?err, "activate failed");
            }
            if let Some(Err(err)) = state.window(id).map(|w| w.raise()) {
                debug!(%id, ?err, "raise failed");
            }
        });
    }

    /// Drops the window handle and its subscriptions.
    pub fn forget_window(&self, id: WindowId) {
        if let Some(pending) = self.frame_jobs.lock().remove(&id) {
            pending.cancel();
        }
        self.submit(CancellationToken::new(), move |state, _| {
            state.app.unsubscribe(id);
            state.windows.remove(&id);
        });
    }

    /// Stops the actor thread after the jobs already queued.
    pub fn terminate(mut self) {
        for (_, pending) in self.frame_jobs.lock().drain() {
            pending.cancel();
        }
        _ = self.tx.send(Message::Terminate);
        // The thread may be stuck on an unresponsive app; don't wait for it.
        drop(self.thread.take());
    }
}

fn app_thread_main(mut state: AppState, rx: crossbeam_channel::Receiver<Message>) {
    debug!(pid = state.pid, "app thread started");
    while let Ok(message) = rx.recv() {
        match message {
            Message::Job { job, token, span } => {
                let _guard = span.enter();
                if token.is_cancelled() {
                    trace!(pid = state.pid, "skipping cancelled job");
                    continue;
                }
                job(&mut state, &token);
            }
            Message::Terminate => break,
        }
    }
    state.app.unsubscribe_all();
    state.windows.clear();
    debug!(pid = state.pid, "app thread exiting");
}

/// All app actors, keyed by pid.
pub struct AppRegistry {
    connector: Arc<dyn AxConnector>,
    events: AxEventSender,
    apps: BTreeMap<pid_t, AppActor>,
    starting: HashSet<pid_t>,
    /// Apps that refused a connection. Not retried until [`AppRegistry::retry`].
    refused: HashSet<pid_t>,
}

impl AppRegistry {
    pub fn new(connector: Arc<dyn AxConnector>, events: AxEventSender) -> AppRegistry {
        AppRegistry {
            connector,
            events,
            apps: BTreeMap::new(),
            starting: HashSet::default(),
            refused: HashSet::default(),
        }
    }

    pub fn get(&self, pid: pid_t) -> Option<&AppActor> { self.apps.get(&pid) }

    pub fn contains(&self, pid: pid_t) -> bool { self.apps.contains_key(&pid) }

    pub fn is_refused(&self, pid: pid_t) -> bool { self.refused.contains(&pid) }

    /// Allows another connection attempt to an app that refused one.
    pub fn retry(&mut self, pid: pid_t) {
        if self.refused.remove(&pid) {
            trace!(pid, "will retry connecting to app");
        }
    }

    pub fn pids(&self) -> Vec<pid_t> { self.apps.keys().copied().collect() }

    pub fn iter(&self) -> impl Iterator<Item = &AppActor> { self.apps.values() }

    pub fn len(&self) -> usize { self.apps.len() }

    pub fn is_empty(&self) -> bool { self.apps.is_empty() }

    /// Returns the actor for `pid`, starting one if needed.
    pub async fn get_or_start(&mut self, pid: pid_t, info: &AppInfo) -> Result<&AppActor, SpawnError> {
        if !self.apps.contains_key(&pid) {
            if !self.starting.insert(pid) {
                return Err(SpawnError::AlreadyStarting(pid));
            }
            let spawned =
                AppActor::spawn(pid, info.clone(), self.connector.clone(), self.events.clone()).await;
            self.starting.remove(&pid);
            match spawned {
                Ok(actor) => {
                    debug!(pid, app = info.display_name(), "started app actor");
                    self.apps.insert(pid, actor);
                }
                Err(err) => {
                    debug!(pid, app = info.display_name(), %err, "could not start app actor");
                    if matches!(err, SpawnError::Connect(_)) {
                        self.refused.insert(pid);
                    }
                    return Err(err);
                }
            }
        }
        self.apps.get(&pid).ok_or(SpawnError::Exited)
    }

    /// Removes and stops the actor for `pid`.
    pub fn terminate(&mut self, pid: pid_t) -> bool {
        match self.apps.remove(&pid) {
            Some(actor) => {
                actor.terminate();
                true
            }
            None => false,
        }
    }

    pub fn terminate_all(&mut self) {
        for (pid, actor) in std::mem::take(&mut self.apps) {
            trace!(pid, "stopping app actor");
            actor.terminate();
        }
    }
}

impl Drop for AppRegistry {
    fn drop(&mut self) {
        if !self.apps.is_empty() {
            self.terminate_all();
        }
    }
}
