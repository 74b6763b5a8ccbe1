// Application context and run loop
// Builds the menu tree, wires the mediator to the screen and routes keys

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use anyhow::Context;
use ratatui::{backend::Backend, Frame, Terminal};
use tracing::{debug, info};

use crate::config::{save_config, Config};
use crate::game::mediator::{BoardMediator, GameType, Presenter};
use crate::game::session::Sessions;
use crate::menu::{render_menu, Menu, MenuListener, MenuPage, PageItem, TransitionSettings};
use crate::network::DeviceIdentity;
use crate::tasks::TaskQueue;
use crate::ui::input::poll_key;
use crate::ui::overlay::{popup_area, render_popup, render_soft_buttons, render_text_input};
use crate::ui::render::render_board;
use crate::ui::soft_buttons::{Command, CommandKind, CommandListener, SoftButtons};
use crate::ui::strings;
use crate::ui::text_input::{StringInputHandler, TextInput};
use crate::ui::{Key, PopupHost, PopupRequest, RepaintFlag, Screen, ScreenSwitch};
use crate::workflow::{ClientWorkflow, ServerWorkflow, ADDRESS};

/// Key poll timeout, which is also the redraw granularity
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Redraw at least this often so resizes and the clock show up
const IDLE_REDRAW: Duration = Duration::from_millis(250);
const TASK_WORKERS: usize = 2;
const TASK_CAPACITY: usize = 16;
/// Seconds the help and about popups stay up
const INFO_POPUP_SECS: u32 = 120;

/// The mediator's view of the terminal UI.
pub struct UiPresenter {
    popups: Arc<PopupHost>,
    screens: Arc<ScreenSwitch>,
    // Set once the menu exists; the menu needs the mediator first
    menu: OnceLock<Arc<Menu>>,
    repaint: RepaintFlag,
}

impl Presenter for UiPresenter {
    fn show_popup(&self, request: PopupRequest) {
        self.popups.show(request);
    }

    fn dismiss_popup(&self) {
        self.popups.dismiss();
    }

    fn show_board(&self) {
        self.screens.show(Screen::Board);
    }

    fn show_menu(&self) {
        self.screens.show(Screen::Menu);
        if let Some(menu) = self.menu.get() {
            menu.go_home();
        }
    }

    fn repaint(&self) {
        self.repaint.request();
    }
}

/// Soft button commands of the board screen.
struct BoardCommands {
    sessions: Arc<Sessions>,
    text_input: Arc<TextInput>,
    exit: Command,
    message: Command,
}

impl CommandListener for BoardCommands {
    fn command_action(&self, command: &Command) {
        let Some(local) = self.sessions.local_player() else {
            debug!("{} pressed without a game", command.label);
            return;
        };
        if *command == self.exit {
            local.request_exit();
        } else if *command == self.message {
            self.text_input.open(strings::ENTER_MESSAGE, "", local);
        }
    }
}

/// Applies a new player name and stores it in the config file.
struct NameChange {
    sessions: Arc<Sessions>,
    config: Arc<Mutex<Config>>,
    config_path: Option<PathBuf>,
}

impl StringInputHandler for NameChange {
    fn handle_string_input(&self, text: String) -> anyhow::Result<()> {
        info!("Player name set to {:?}", text);
        self.sessions.set_name(&text);
        let mut config = self.config.lock().unwrap_or_else(|e| e.into_inner());
        config.player.name = text;
        if let Some(path) = &self.config_path {
            save_config(path, &config)
                .with_context(|| format!("failed to save {}", path.display()))?;
        }
        Ok(())
    }
}

struct MenuLog;

impl MenuListener for MenuLog {
    fn new_page(&self, from: Option<&Arc<MenuPage>>, to: &Arc<MenuPage>, back: bool) {
        debug!(
            "Menu {} -> {}{}",
            from.map_or("-", |p| p.title()),
            to.title(),
            if back { " (back)" } else { "" }
        );
    }

    fn action_called(&self, page: &Arc<MenuPage>, item: &PageItem) {
        debug!("Menu action {} on {}", item.label(), page.title());
    }
}

/// Everything the running application shares, built once at start-up.
pub struct AppContext {
    config: Arc<Mutex<Config>>,
    repaint: RepaintFlag,
    screens: Arc<ScreenSwitch>,
    popups: Arc<PopupHost>,
    tasks: Arc<TaskQueue>,
    text_input: Arc<TextInput>,
    menu: Arc<Menu>,
    sessions: Arc<Sessions>,
    soft_buttons: Mutex<SoftButtons>,
    message: Command,
    quit: Arc<AtomicBool>,
}

impl AppContext {
    /// `config_path` is where a changed name gets saved; None keeps changes in memory.
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        identity: DeviceIdentity,
    ) -> anyhow::Result<Self> {
        let repaint = RepaintFlag::default();
        let screens = Arc::new(ScreenSwitch::new(repaint.clone()));
        let popups = Arc::new(PopupHost::new(
            Duration::from_millis(config.popup.poll_interval_ms),
            repaint.clone(),
        ));
        let tasks = Arc::new(
            TaskQueue::new(TASK_WORKERS, TASK_CAPACITY).context("failed to start task workers")?,
        );
        let text_input = Arc::new(TextInput::new(tasks.clone(), repaint.clone()));

        let presenter = Arc::new(UiPresenter {
            popups: popups.clone(),
            screens: screens.clone(),
            menu: OnceLock::new(),
            repaint: repaint.clone(),
        });
        let mediator = Arc::new(BoardMediator::new(
            presenter.clone(),
            config.game.board_size,
            Duration::from_secs(config.game.round_secs),
        ));
        let sessions = Arc::new(Sessions::new(mediator, identity));
        let quit = Arc::new(AtomicBool::new(false));
        let config = Arc::new(Mutex::new(config));

        let start_page = build_menu(&MenuParts {
            config: &config,
            config_path,
            sessions: &sessions,
            popups: &popups,
            text_input: &text_input,
            quit: &quit,
        });
        let settings = {
            let config = config.lock().unwrap_or_else(|e| e.into_inner());
            TransitionSettings {
                frames: config.menu.transition_frames,
                frame_delay: Duration::from_millis(config.menu.frame_delay_ms),
            }
        };
        let menu = Arc::new(
            Menu::new(start_page, settings, repaint.clone(), tasks.clone())
                .context("failed to start menu")?,
        );
        menu.set_listener(Arc::new(MenuLog));
        // Only this function sets it
        let _ = presenter.menu.set(menu.clone());

        let exit = Command::new(strings::EXIT, CommandKind::Back);
        let message = Command::new(strings::MESSAGE, CommandKind::Screen);
        let mut soft_buttons = SoftButtons::new(Some(exit.clone()), Some(message.clone()));
        soft_buttons.set_listener(Arc::new(BoardCommands {
            sessions: sessions.clone(),
            text_input: text_input.clone(),
            exit,
            message: message.clone(),
        }));

        Ok(Self {
            config,
            repaint,
            screens,
            popups,
            tasks,
            text_input,
            menu,
            sessions,
            soft_buttons: Mutex::new(soft_buttons),
            message,
            quit,
        })
    }

    fn buttons(&self) -> MutexGuard<'_, SoftButtons> {
        self.soft_buttons.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn menu(&self) -> &Arc<Menu> {
        &self.menu
    }

    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }

    pub fn screen(&self) -> Screen {
        self.screens.current()
    }

    pub fn player_name(&self) -> String {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).player.name.clone()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    /// Routes a key: popup first, then the text dialog, then the soft buttons
    /// of the board, then the screen itself.
    pub fn key_pressed(&self, key: Key) {
        if self.popups.key_pressed(key) || self.text_input.key_pressed(key) {
            return;
        }
        match self.screen() {
            Screen::Menu => {
                self.menu.key_pressed(key);
            }
            Screen::Board => {
                self.sync_buttons();
                if self.buttons().key_pressed(key) {
                    return;
                }
                if let Some(local) = self.sessions.local_player() {
                    local.key_pressed(key);
                }
                self.repaint.request();
            }
        }
    }

    /// Messages only make sense while a remote game runs.
    fn sync_buttons(&self) {
        let mediator = self.sessions.mediator();
        let remote = !mediator.is_game_finished()
            && matches!(
                mediator.game_type(),
                Some(GameType::RemoteServer | GameType::RemoteClient)
            );
        self.buttons().enable(&self.message, remote);
    }

    pub fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        self.popups.set_area(popup_area(area));

        match self.screen() {
            Screen::Menu => render_menu(frame, &self.menu.view(), area),
            Screen::Board => {
                if let Some(snapshot) = self.sessions.mediator().snapshot() {
                    render_board(frame, &snapshot, area);
                }
                self.sync_buttons();
                let buttons = self.buttons();
                render_soft_buttons(
                    frame,
                    buttons.left_view().as_ref(),
                    buttons.right_view().as_ref(),
                    area,
                );
            }
        }

        if let Some(view) = self.text_input.view() {
            render_text_input(frame, &view, area);
        }
        if let Some(view) = self.popups.view() {
            render_popup(frame, &view, area);
        }
    }

    /// Ends any game and stops the background workers.
    pub fn shutdown(&self) {
        self.sessions.shutdown();
        self.popups.dismiss();
        self.tasks.shutdown();
    }
}

struct MenuParts<'a> {
    config: &'a Arc<Mutex<Config>>,
    config_path: Option<PathBuf>,
    sessions: &'a Arc<Sessions>,
    popups: &'a Arc<PopupHost>,
    text_input: &'a Arc<TextInput>,
    quit: &'a Arc<AtomicBool>,
}

fn info_item(label: &str, text: &'static str, popups: &Arc<PopupHost>) -> PageItem {
    let popups = popups.clone();
    PageItem::new(label).with_action(
        move |_: &Arc<MenuPage>, _: &PageItem| -> anyhow::Result<()> {
            popups.show(PopupRequest::ok(text).with_timeout(INFO_POPUP_SECS));
            Ok(())
        },
    )
}

fn build_menu(parts: &MenuParts<'_>) -> Arc<MenuPage> {
    let config = parts.config.lock().unwrap_or_else(|e| e.into_inner()).clone();

    let server = Arc::new(ServerWorkflow::new(
        parts.sessions.clone(),
        config.network.listen_port,
        Duration::from_millis(config.network.accept_poll_ms),
    ));
    let client = ClientWorkflow::new(
        parts.sessions.clone(),
        parts.text_input.clone(),
        Duration::from_secs(config.network.connect_timeout_secs),
    );

    let mut join_items: Vec<PageItem> = config
        .network
        .known_hosts
        .iter()
        .map(|host| {
            PageItem::new(host.as_str())
                .with_property(ADDRESS, host.as_str())
                .with_shared_action(client.clone())
        })
        .collect();
    join_items.push(PageItem::new(strings::ENTER_ADDRESS).with_shared_action(client));
    let join_page = MenuPage::with_items(strings::JOIN_GAME, join_items);

    let name_change = Arc::new(NameChange {
        sessions: parts.sessions.clone(),
        config: parts.config.clone(),
        config_path: parts.config_path.clone(),
    });
    let change_name = {
        let sessions = parts.sessions.clone();
        let text_input = parts.text_input.clone();
        PageItem::new(strings::CHANGE_NAME).with_action(
            move |_: &Arc<MenuPage>, _: &PageItem| -> anyhow::Result<()> {
                let current = sessions.identity().name;
                text_input.open(strings::ENTER_NAME, &current, name_change.clone());
                Ok(())
            },
        )
    };
    let settings_page = MenuPage::with_items(strings::SETTINGS, vec![change_name]);

    let play_local = {
        let sessions = parts.sessions.clone();
        PageItem::new(strings::PLAY_LOCAL).with_action(
            move |_: &Arc<MenuPage>, _: &PageItem| -> anyhow::Result<()> {
                sessions.start_local();
                Ok(())
            },
        )
    };
    let quit = {
        let quit = parts.quit.clone();
        PageItem::new(strings::QUIT).with_action(
            move |_: &Arc<MenuPage>, _: &PageItem| -> anyhow::Result<()> {
                quit.store(true, Ordering::SeqCst);
                Ok(())
            },
        )
    };

    MenuPage::with_items(
        strings::TITLE,
        vec![
            play_local,
            PageItem::new(strings::HOST_GAME).with_shared_action(server),
            PageItem::new(strings::JOIN_GAME).with_sub_page(join_page),
            PageItem::new(strings::SETTINGS).with_sub_page(settings_page),
            info_item(strings::HELP, strings::HELP_TEXT, parts.popups),
            info_item(strings::ABOUT, strings::ABOUT_TEXT, parts.popups),
            quit,
        ],
    )
}

/// Main loop: poll keys, run the round clock and redraw when needed.
pub fn run<B: Backend>(terminal: &mut Terminal<B>, ctx: &AppContext) -> io::Result<()> {
    ctx.menu.start();
    let mut last_draw: Option<Instant> = None;

    while !ctx.quit_requested() {
        if let Some(key) = poll_key(POLL_INTERVAL)? {
            ctx.key_pressed(key);
        }
        ctx.sessions.mediator().poll_clock();

        let stale = last_draw.map_or(true, |t| t.elapsed() >= IDLE_REDRAW);
        if ctx.repaint.take() || stale {
            terminal.draw(|frame| ctx.draw(frame))?;
            last_draw = Some(Instant::now());
        }
    }

    info!("Quit requested");
    ctx.shutdown();
    Ok(())
}
