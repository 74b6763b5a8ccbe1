// Menu navigation state machine
// Page history, item selection and animated page transitions run by a worker thread.
// Requests reach the worker over a channel; a newer request ends the running transition at once.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::page::{ItemAction, MenuPage, PageItem};
use crate::tasks::TaskQueue;
use crate::ui::{Key, RepaintFlag};

/// High level menu events. All methods default to doing nothing.
#[allow(unused_variables)]
pub trait MenuListener: Send + Sync {
    fn new_page(&self, from: Option<&Arc<MenuPage>>, to: &Arc<MenuPage>, back: bool) {}
    fn item_selected(&self, page: &Arc<MenuPage>, old: Option<&PageItem>, new: Option<&PageItem>) {}
    fn action_called(&self, page: &Arc<MenuPage>, item: &PageItem) {}
    fn transition_started(
        &self,
        from: Option<&Arc<MenuPage>>,
        to: &Arc<MenuPage>,
        frame_delay: Duration,
        frames: u32,
        back: bool,
    ) {
    }
    fn transition_stopped(&self, from: Option<&Arc<MenuPage>>, to: &Arc<MenuPage>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionSettings {
    pub frames: u32,
    pub frame_delay: Duration,
}

struct Request {
    generation: u64,
    from: Option<Arc<MenuPage>>,
    to: Arc<MenuPage>,
    back: bool,
}

#[derive(Default)]
struct NavState {
    current: Option<Arc<MenuPage>>,
    // Set while a transition is in flight
    target: Option<Arc<MenuPage>>,
    back: bool,
    frame: u32,
    generation: u64,
    history: Vec<Arc<MenuPage>>,
}

impl NavState {
    fn visible(&self) -> Option<Arc<MenuPage>> {
        self.target.clone().or_else(|| self.current.clone())
    }
}

struct Shared {
    nav: Mutex<NavState>,
    idle: Condvar,
    listener: Mutex<Option<Arc<dyn MenuListener>>>,
    repaint: RepaintFlag,
    settings: TransitionSettings,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, NavState> {
        self.nav.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listener(&self) -> Option<Arc<dyn MenuListener>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// A transition as the renderer sees it.
#[derive(Debug, Clone)]
pub struct TransitionView {
    pub from: Option<Arc<MenuPage>>,
    pub to: Arc<MenuPage>,
    pub frame: u32,
    pub frames: u32,
    pub back: bool,
}

#[derive(Debug, Clone)]
pub struct MenuView {
    pub page: Option<Arc<MenuPage>>,
    pub transition: Option<TransitionView>,
}

pub struct Menu {
    shared: Arc<Shared>,
    start_page: Arc<MenuPage>,
    requests: Mutex<Option<Sender<Request>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    tasks: Arc<TaskQueue>,
}

impl Menu {
    pub fn new(
        start_page: Arc<MenuPage>,
        settings: TransitionSettings,
        repaint: RepaintFlag,
        tasks: Arc<TaskQueue>,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            nav: Mutex::new(NavState::default()),
            idle: Condvar::new(),
            listener: Mutex::new(None),
            repaint,
            settings,
        });
        let (tx, rx) = mpsc::channel();
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("menu-transition".to_string())
            .spawn(move || transition_loop(&worker_shared, &rx))?;
        Ok(Self {
            shared,
            start_page,
            requests: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            tasks,
        })
    }

    pub fn set_listener(&self, listener: Arc<dyn MenuListener>) {
        *self.shared.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener);
    }

    pub fn start_page(&self) -> &Arc<MenuPage> {
        &self.start_page
    }

    /// Shows the start page.
    pub fn start(&self) {
        self.go_to_page(self.start_page.clone());
    }

    /// The page keys go to: the target of a running transition, else the current page.
    pub fn current_page(&self) -> Option<Arc<MenuPage>> {
        self.shared.lock().visible()
    }

    pub fn in_transition(&self) -> bool {
        self.shared.lock().target.is_some()
    }

    pub fn history_len(&self) -> usize {
        self.shared.lock().history.len()
    }

    pub fn go_to_page(&self, page: Arc<MenuPage>) {
        let from = {
            let mut nav = self.shared.lock();
            let from = nav.visible();
            if let Some(current) = &from {
                nav.history.push(current.clone());
            }
            from
        };
        if let Some(listener) = self.shared.listener() {
            listener.new_page(from.as_ref(), &page, false);
            listener.item_selected(&page, None, page.selected_item().as_ref());
        }
        self.start_transition(from, page, false);
    }

    /// Steps back one page. Returns false if there is no history.
    pub fn go_back(&self) -> bool {
        let (from, back_page) = {
            let mut nav = self.shared.lock();
            let from = nav.visible();
            (from, nav.history.pop())
        };
        let Some(back_page) = back_page else {
            return false;
        };
        if let Some(listener) = self.shared.listener() {
            listener.new_page(from.as_ref(), &back_page, true);
            listener.item_selected(&back_page, None, back_page.selected_item().as_ref());
        }
        self.start_transition(from, back_page, true);
        true
    }

    /// Drops the history and steps back to the start page.
    pub fn go_home(&self) {
        let from = {
            let mut nav = self.shared.lock();
            nav.history.clear();
            nav.visible()
        };
        if from.as_ref().map_or(false, |p| Arc::ptr_eq(p, &self.start_page)) {
            return;
        }
        let home = self.start_page.clone();
        if let Some(listener) = self.shared.listener() {
            listener.new_page(from.as_ref(), &home, true);
        }
        self.start_transition(from, home, true);
    }

    pub fn selected_item_index(&self) -> i32 {
        self.current_page().map_or(-1, |p| p.selected_index())
    }

    pub fn selected_item(&self) -> Option<PageItem> {
        self.current_page().and_then(|p| p.selected_item())
    }

    pub fn set_selected_item_index(&self, index: i32) {
        let Some(page) = self.current_page() else {
            return;
        };
        let old = page.selected_item();
        page.set_selected_index(index);
        let new = page.selected_item();
        if let Some(listener) = self.shared.listener() {
            listener.item_selected(&page, old.as_ref(), new.as_ref());
        }
        self.shared.repaint.request();
    }

    /// Menu key handling. Fire runs the item's action and opens its subpage,
    /// Right only opens the subpage.
    pub fn key_pressed(&self, key: Key) -> bool {
        let Some(page) = self.current_page() else {
            return false;
        };
        match key {
            Key::Back | Key::Left => {
                self.go_back();
            }
            Key::Up => self.set_selected_item_index(page.selected_index() - 1),
            Key::Down => self.set_selected_item_index(page.selected_index() + 1),
            Key::Fire | Key::Right => {
                let Some(item) = page.selected_item() else {
                    return true;
                };
                if key == Key::Fire {
                    if let Some(action) = item.action() {
                        self.run_action(action.clone(), page.clone(), item.clone());
                    }
                }
                if let Some(sub_page) = item.sub_page() {
                    self.go_to_page(sub_page.clone());
                }
            }
            _ => return false,
        }
        true
    }

    fn run_action(&self, action: Arc<dyn ItemAction>, page: Arc<MenuPage>, item: PageItem) {
        let shared = self.shared.clone();
        let name = format!("item {}", item.label());
        let submitted = self.tasks.submit(&name, move || {
            let result = action.item_action(&page, &item);
            if result.is_ok() {
                if let Some(listener) = shared.listener() {
                    listener.action_called(&page, &item);
                }
            }
            // A failed action may still have changed what is shown
            shared.repaint.request();
            result
        });
        if let Err(e) = submitted {
            warn!("Dropped {}: {}", name, e);
        }
    }

    fn start_transition(&self, from: Option<Arc<MenuPage>>, to: Arc<MenuPage>, back: bool) {
        let request = {
            let mut nav = self.shared.lock();
            nav.generation += 1;
            nav.current = from.clone();
            nav.target = Some(to.clone());
            nav.back = back;
            nav.frame = 0;
            Request {
                generation: nav.generation,
                from,
                to,
                back,
            }
        };
        let sender = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let undelivered = match sender.as_ref() {
            Some(tx) => tx.send(request).err().map(|e| e.0),
            None => Some(request),
        };
        drop(sender);
        if let Some(request) = undelivered {
            // No worker: jump straight to the page
            finish(&self.shared, &request);
        }
        self.shared.repaint.request();
    }

    /// Blocks until no transition is in flight. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let nav = self.shared.lock();
        let (_nav, result) = self
            .shared
            .idle
            .wait_timeout_while(nav, timeout, |nav| nav.target.is_some())
            .unwrap_or_else(|e| e.into_inner());
        !result.timed_out()
    }

    pub fn view(&self) -> MenuView {
        let nav = self.shared.lock();
        let transition = nav.target.clone().map(|to| TransitionView {
            from: nav.current.clone(),
            to,
            frame: nav.frame,
            frames: self.shared.settings.frames,
            back: nav.back,
        });
        MenuView {
            page: nav.current.clone(),
            transition,
        }
    }
}

impl Drop for Menu {
    fn drop(&mut self) {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).take();
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                warn!("Menu transition worker panicked");
            }
        }
    }
}

/// Skips to the newest queued request.
fn latest(mut request: Request, rx: &Receiver<Request>) -> Request {
    while let Ok(newer) = rx.try_recv() {
        request = newer;
    }
    request
}

fn transition_loop(shared: &Shared, rx: &Receiver<Request>) {
    let settings = shared.settings;
    let mut pending: Option<Request> = None;
    loop {
        let request = match pending.take() {
            Some(request) => request,
            None => match rx.recv() {
                Ok(request) => request,
                Err(_) => return,
            },
        };
        let request = latest(request, rx);
        if let Some(listener) = shared.listener() {
            listener.transition_started(
                request.from.as_ref(),
                &request.to,
                settings.frame_delay,
                settings.frames,
                request.back,
            );
        }

        for frame in 0..settings.frames {
            match rx.recv_timeout(settings.frame_delay) {
                Ok(newer) => {
                    debug!("Transition to {} preempted", request.to.title());
                    pending = Some(newer);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            {
                let mut nav = shared.lock();
                if nav.generation != request.generation {
                    break;
                }
                nav.frame = frame + 1;
            }
            shared.repaint.request();
        }
        finish(shared, &request);
    }
}

fn finish(shared: &Shared, request: &Request) {
    {
        let mut nav = shared.lock();
        // A newer request already owns the state
        if nav.generation == request.generation {
            nav.current = Some(request.to.clone());
            nav.target = None;
            nav.frame = 0;
        }
    }
    shared.idle.notify_all();
    if let Some(listener) = shared.listener() {
        listener.transition_stopped(request.from.as_ref(), &request.to);
    }
    shared.repaint.request();
}
