use std::io::{self, Stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, EventStream, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use iris_config::ClientConfig;
use iris_core::{
    bus::EventBus,
    console::Console,
    event::Event,
    input::InputBinding,
    logging::{self, LogBuffer, LogSettings},
    rate::RateMeter,
    state::{AppState, Update},
    video::VideoFrame,
};
use iris_remote::{ActionRequester, HttpVisionClient, Poller, VideoFeed, VisionApi};
use iris_ui::{
    console::render_console,
    frame::render_frame,
    layout::{vision_layout, VisionRects},
    shell::{button_width, render_shell, ShellView},
};

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const SCROLL_STEP: usize = 10;

/// Terminal client for the Iris vision service.
#[derive(Debug, Parser)]
#[command(name = "iris", version, about)]
struct Args {
    /// Config file. Defaults to <config dir>/iris/iris.toml when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Vision service base URL, overriding the config file.
    #[arg(long, env = "IRIS_BASE_URL", value_name = "URL")]
    base_url: Option<String>,

    /// Status poll interval in milliseconds, overriding the config file.
    #[arg(long, value_name = "MS")]
    poll_ms: Option<u64>,

    /// Query the service once, print the result and exit 0 if reachable.
    #[arg(long)]
    probe: bool,
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(url) = &args.base_url {
        config.server.base_url = url.clone();
    }
    if let Some(ms) = args.poll_ms {
        config.poll.interval_ms = ms;
    }
    config
        .validate()
        .context("invalid command-line override")?;
    Ok(config)
}

/// The running video feed task and the latest frame it produced.
struct VideoSlot {
    enabled: bool,
    max_width: u32,
    task: Option<(CancellationToken, JoinHandle<()>)>,
    frames: watch::Receiver<Option<Arc<VideoFrame>>>,
    latest: Option<Arc<VideoFrame>>,
    rate: RateMeter,
    fps: f64,
}

impl VideoSlot {
    fn new(enabled: bool, max_width: u32) -> Self {
        let (_, frames) = watch::channel(None);
        Self {
            enabled,
            max_width,
            task: None,
            frames,
            latest: None,
            rate: RateMeter::default(),
            fps: 0.0,
        }
    }

    fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Start the feed while connected, stop it while not. A feed that ended
    /// on its own is restarted on the next call made while connected.
    fn sync<C: VisionApi>(
        &mut self,
        connected: bool,
        client: &Arc<C>,
        root: &CancellationToken,
    ) {
        if !self.enabled || root.is_cancelled() {
            return;
        }
        if connected && !self.is_running() {
            self.start(client, root);
        } else if !connected && self.task.is_some() {
            self.stop();
        }
    }

    fn start<C: VisionApi>(&mut self, client: &Arc<C>, root: &CancellationToken) {
        let token = root.child_token();
        let (tx, rx) = watch::channel(None);
        let handle = VideoFeed::new(Arc::clone(client), self.max_width, tx).spawn(token.clone());
        self.frames = rx;
        self.task = Some((token, handle));
        tracing::info!("video feed starting");
    }

    fn stop(&mut self) {
        if let Some((token, _)) = self.task.take() {
            token.cancel();
            tracing::info!("video feed stopped");
        }
        self.latest = None;
        self.rate.reset();
        self.fps = 0.0;
    }

    /// Pick up a new frame if the feed produced one since the last call.
    fn sample(&mut self, now: Instant) {
        if self.frames.has_changed().unwrap_or(false) {
            self.latest = self.frames.borrow_and_update().clone();
            self.rate.record(now);
        }
    }

    fn hud_line(&self) -> String {
        if !self.enabled {
            "video: disabled".to_string()
        } else if self.is_running() {
            format!("video: {:.1} fps", self.fps)
        } else {
            "video: idle".to_string()
        }
    }
}

struct App<C: VisionApi> {
    state: AppState,
    bus: EventBus,
    console: Console,
    log_buffer: LogBuffer,
    client: Arc<C>,
    actions: ActionRequester<C>,
    trigger_key: char,
    cancel: CancellationToken,
    video: VideoSlot,
    rects: Option<VisionRects>,
}

impl<C: VisionApi> App<C> {
    fn new(config: &ClientConfig, client: Arc<C>, log_buffer: LogBuffer) -> Result<Self> {
        let bus = EventBus::new();
        let cancel = CancellationToken::new();
        let actions = ActionRequester::new(Arc::clone(&client), bus.publisher(), cancel.clone())
            .with_single_flight(config.read_text.single_flight);
        Ok(Self {
            state: AppState::new(),
            bus,
            console: Console::default(),
            log_buffer,
            client,
            actions,
            trigger_key: config.trigger_key()?,
            cancel,
            video: VideoSlot::new(config.video.enabled, config.video.max_width),
            rects: None,
        })
    }

    /// Drain new entries from the shared log buffer into the console.
    fn sync_logs(&mut self) {
        if let Ok(mut buf) = self.log_buffer.lock() {
            for entry in buf.drain(..) {
                self.console.push_log(entry);
            }
        }
    }

    fn hud_lines(&self) -> Vec<String> {
        let (ok, failed) = self.state.poll_counts();
        vec![
            format!(
                "[{}] read text  [q] quit  [`] logs",
                self.trigger_key.to_uppercase()
            ),
            format!(
                "polls: {ok} ok / {failed} failed   pending reads: {}",
                self.state.pending_reads()
            ),
            format!(
                "{}   uptime: {}s",
                self.video.hud_line(),
                self.state.uptime().as_secs()
            ),
        ]
    }

    fn render(&mut self, f: &mut Frame) {
        let area = f.area();
        let rects = vision_layout(area, 4, button_width(self.trigger_key));
        self.rects = Some(rects);

        let view = ShellView {
            connection: self.state.connection(),
            caption: self.state.caption(),
            trigger_key: self.trigger_key,
            busy: self.state.pending_reads() > 0,
            hud: self.hud_lines(),
        };
        let frame = self.video.latest.as_deref();
        render_shell(f, rects, view, |f, video_area| {
            render_frame(f.buffer_mut(), video_area, frame);
        });

        if self.console.visible {
            render_console(f, area, &self.console);
        }
    }

    /// Handle one drained event. Returns `true` when the app should quit.
    fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Tick { now } => {
                self.video.fps = self.video.rate.per_second(now);
                false
            }
            Event::Key(key) => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                false
            }
            Event::Resize { cols, rows } => {
                tracing::debug!(cols, rows, "terminal resized");
                false
            }
            Event::Update(update) => {
                self.apply(update);
                false
            }
            Event::Quit => true,
        }
    }

    fn apply(&mut self, update: Update) {
        let affects_connection = matches!(update, Update::PollSucceeded { .. } | Update::PollFailed);
        let before = self.state.connection();
        if !self.state.apply(update) {
            return;
        }
        let after = self.state.connection();
        if before != after {
            tracing::info!(from = %before, to = %after, "connection state changed");
        }
        if affects_connection {
            self.video
                .sync(after.is_connected(), &self.client, &self.cancel);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::Char('`') | KeyCode::Char('~') => self.console.toggle(),
            KeyCode::PageUp if self.console.visible => self.console.scroll_up(SCROLL_STEP),
            KeyCode::PageDown if self.console.visible => self.console.scroll_down(SCROLL_STEP),
            KeyCode::Esc if self.console.visible => self.console.toggle(),
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.bus.publish(Event::Quit);
            }
            // The trigger key is handled by the input binding.
            _ => {}
        }
        false
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let hit = self
            .rects
            .is_some_and(|rects| rects.button_hit(mouse.column, mouse.row));
        if hit {
            tracing::debug!("read text button clicked");
            self.actions.invoke();
        }
    }

    /// Cancel every background task and refuse further state updates.
    fn teardown(&mut self) {
        self.cancel.cancel();
        self.state.dispose();
    }
}

/// One status request, reported on stdout. Returns `true` if the service
/// answered.
async fn probe<C: VisionApi>(client: &C, base: &str) -> bool {
    match client.status().await {
        Ok(snapshot) => {
            let caption = snapshot.caption.unwrap_or_default();
            println!("{base}: reachable, caption {caption:?}");
            true
        }
        Err(err) => {
            println!("{base}: unreachable ({err})");
            false
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let log = logging::init(&LogSettings {
        filter: config.logging.filter.clone(),
        dir: config.logging.dir.clone(),
        retention_days: config.logging.retention_days,
    });
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.server.base_url,
        log_dir = %log.dir.display(),
        "iris starting up"
    );

    let client = Arc::new(HttpVisionClient::new(
        config.base_url()?,
        config.request_timeout(),
    )?);

    if args.probe {
        let base = client.base_url().to_string();
        let reachable = probe(client.as_ref(), &base).await;
        return Ok(if reachable {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let mut terminal = setup_terminal()?;
    let res = run(&mut terminal, &config, client, log.buffer.clone()).await;
    restore_terminal(terminal)?;
    tracing::info!("iris shut down");
    res.map(|()| ExitCode::SUCCESS)
}

async fn run<C: VisionApi>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    config: &ClientConfig,
    client: Arc<C>,
    log_buffer: LogBuffer,
) -> Result<()> {
    let mut app = App::new(config, Arc::clone(&client), log_buffer)?;

    let poller = Poller::new(client, config.poll_interval(), app.bus.publisher())
        .spawn(app.cancel.clone());
    let input = InputBinding::new(app.trigger_key).mount(
        EventStream::new(),
        app.actions.clone(),
        app.bus.publisher(),
    );

    let mut last_tick = Instant::now();
    let result = loop {
        // ── Sync logs and video into the view ──
        app.sync_logs();
        app.video.sample(Instant::now());

        // ── Render ──
        if let Err(err) = terminal.draw(|f| app.render(f)) {
            break Err(err.into());
        }

        // ── Wait for input, remote outcomes, or the next frame ──
        tokio::select! {
            _ = app.bus.wait() => {}
            _ = tokio::time::sleep(FRAME_INTERVAL) => {}
        }

        if last_tick.elapsed() >= TICK_INTERVAL {
            last_tick = Instant::now();
            app.bus.publish(Event::Tick { now: last_tick });
        }

        // ── Drain → Apply ──
        let mut quit = false;
        for ev in app.bus.drain() {
            if app.handle(ev) {
                quit = true;
                break;
            }
        }
        if quit {
            break Ok(());
        }
        if !input.is_mounted() {
            tracing::warn!("terminal input closed");
            break Ok(());
        }
    };

    app.teardown();
    input.unmount().await;
    app.video.stop();
    if let Err(err) = poller.await {
        tracing::warn!(error = %err, "poller task failed");
    }
    result
}
