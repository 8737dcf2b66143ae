use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use viewconfig::ViewerConfig;
use viewdispatch::{FrameSize, GpuOptions, ViewDispatcher, ViewMode, WgpuDevice};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::session;
use crate::synthetic::SyntheticEngine;

type Dispatcher = ViewDispatcher<WgpuDevice, SyntheticEngine>;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Everything a run needs once CLI flags, config and session are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: ViewMode,
    pub frame_size: FrameSize,
    pub window_size: FrameSize,
    pub gpu: GpuOptions,
    pub snapshot: Option<PathBuf>,
}

impl Settings {
    /// `--mode` wins over the restored session, which wins over the config.
    pub fn resolve(args: &RunArgs, config: &ViewerConfig, restored: Option<ViewMode>) -> Self {
        Self {
            mode: args
                .mode
                .or(restored)
                .unwrap_or(config.view.initial_mode),
            frame_size: args.frame_size.unwrap_or(config.view.frame_size),
            window_size: args.window_size.unwrap_or(config.view.window_size),
            gpu: GpuOptions {
                power: args.power.unwrap_or(config.gpu.power),
                vsync: config.gpu.vsync && !args.no_vsync,
            },
            snapshot: args.snapshot.clone(),
        }
    }
}

pub fn load_config(args: &RunArgs, paths: &AppPaths) -> Result<ViewerConfig> {
    match &args.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            let path = paths.config_file();
            ViewerConfig::load_or_default(&path)
                .with_context(|| format!("failed to load config {}", path.display()))
        }
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = load_config(&args, &paths)?;
    let session_file = paths.session_file();
    // A snapshot renders exactly what was asked for, not the last session.
    let restored = if args.snapshot.is_none() {
        session::load(&session_file)
    } else {
        None
    };
    let settings = Settings::resolve(&args, &config, restored);
    info!(
        mode = %settings.mode,
        frame = %settings.frame_size,
        window = %settings.window_size,
        "starting viewer"
    );

    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(window_title(settings.mode))
        .with_inner_size(winit::dpi::PhysicalSize::<u32>::from(settings.window_size))
        .with_visible(settings.snapshot.is_none())
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create viewer window: {err}"))?;
    let window = Arc::new(window);

    let window_size = if settings.snapshot.is_some() {
        settings.window_size
    } else {
        let actual = FrameSize::from(window.inner_size());
        if actual.is_empty() {
            settings.window_size
        } else {
            actual
        }
    };

    let device = WgpuDevice::new(window.as_ref(), window_size, settings.gpu)
        .context("failed to initialise GPU device")?;
    let engine = SyntheticEngine::new(settings.frame_size, &config.engine)?;
    let mut dispatcher = ViewDispatcher::create(device, engine, settings.frame_size, window_size)
        .context("failed to initialise view dispatcher")?;
    dispatcher.set_mode(settings.mode);

    if let Some(path) = &settings.snapshot {
        let result = write_snapshot(&mut dispatcher, path);
        drop(dispatcher);
        drop(window);
        return result;
    }

    let mut viewer = Viewer {
        dispatcher,
        window,
        shift: false,
        blanked: false,
        session_file,
    };

    let mut result = Ok(());
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == viewer.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::ModifiersChanged(modifiers) => {
                viewer.shift = modifiers.state().shift_key();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let Some(action) = key_action(&event.logical_key, viewer.shift) {
                        if viewer.apply(action) == Flow::Exit {
                            elwt.exit();
                        }
                    }
                }
            }
            WindowEvent::Resized(new_size) => {
                viewer.dispatcher.set_window_size(FrameSize::from(new_size));
            }
            WindowEvent::RedrawRequested => {
                if viewer.render() == Flow::Exit {
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            viewer.window.request_redraw();
            elwt.set_control_flow(ControlFlow::Wait);
        }
        Event::LoopExiting => viewer.shutdown(),
        _ => {}
    });

    if let Err(err) = run_result {
        result = Err(anyhow!("window event loop error: {err}"));
    }
    result
}

fn window_title(mode: ViewMode) -> String {
    format!("trackview - {}", mode.label())
}

/// Renders one cycle and writes the window contents to `path` as PNG.
fn write_snapshot(dispatcher: &mut Dispatcher, path: &Path) -> Result<()> {
    dispatcher.engine_mut().advance();
    dispatcher
        .redraw()
        .context("failed to render snapshot frame")?;

    let size = dispatcher.window_size();
    let mut pixels = vec![0u8; size.rgba_len()];
    dispatcher
        .read_pixels(&mut pixels)
        .context("failed to read back snapshot frame")?;
    bgra_to_rgba(&mut pixels);

    let image = RgbaImage::from_raw(size.width, size.height, pixels)
        .ok_or_else(|| anyhow!("snapshot buffer does not match {size}"))?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save(path)
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    info!(path = %path.display(), mode = %dispatcher.mode(), "snapshot written");
    Ok(())
}

pub fn bgra_to_rgba(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Select(usize),
    Next,
    Previous,
    Clear,
    Quit,
}

/// Key that selects each mode, in ordinal order.
pub const MODE_KEYS: [&str; ViewMode::COUNT] =
    ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "-", "="];

/// Maps a pressed key to a viewer action.
pub fn key_action(key: &Key, shift: bool) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Named(NamedKey::Tab) if shift => Some(KeyAction::Previous),
        Key::Named(NamedKey::Tab) => Some(KeyAction::Next),
        Key::Character(value) => match value.as_str() {
            "c" | "C" => Some(KeyAction::Clear),
            other => MODE_KEYS
                .iter()
                .position(|key| *key == other)
                .map(KeyAction::Select),
        },
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

struct Viewer {
    // Declared before the window so the GPU surface is released first.
    dispatcher: Dispatcher,
    window: Arc<Window>,
    shift: bool,
    /// Set by `C`: frames are blanked until a mode is picked or `C` is
    /// pressed again.
    blanked: bool,
    session_file: PathBuf,
}

impl Viewer {
    fn apply(&mut self, action: KeyAction) -> Flow {
        let mode = self.dispatcher.mode();
        match action {
            KeyAction::Quit => return Flow::Exit,
            KeyAction::Clear => {
                self.blanked = !self.blanked;
                debug!(blanked = self.blanked, "toggled blank view");
                return Flow::Continue;
            }
            KeyAction::Select(index) => self.dispatcher.set_mode_ordinal(index),
            KeyAction::Next => self.dispatcher.set_mode(mode.next()),
            KeyAction::Previous => self.dispatcher.set_mode(mode.previous()),
        }
        self.blanked = false;
        if self.dispatcher.mode() != mode {
            info!(mode = %self.dispatcher.mode(), "view mode selected");
            self.window.set_title(&window_title(self.dispatcher.mode()));
        }
        Flow::Continue
    }

    fn render(&mut self) -> Flow {
        let result = if self.blanked {
            self.dispatcher.clear()
        } else {
            self.dispatcher.engine_mut().advance();
            self.dispatcher.redraw()
        };

        let Err(err) = result else {
            return Flow::Continue;
        };
        match err.as_surface_error() {
            Some(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.dispatcher.device_mut().reconfigure_surface();
                Flow::Continue
            }
            Some(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory; exiting viewer");
                Flow::Exit
            }
            Some(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; retrying next frame");
                Flow::Continue
            }
            Some(other) => {
                warn!(error = ?other, "surface error; retrying next frame");
                Flow::Continue
            }
            None => {
                error!(error = %err, "redraw failed");
                Flow::Exit
            }
        }
    }

    fn shutdown(&mut self) {
        let mode = self.dispatcher.mode();
        match session::persist(&self.session_file, mode) {
            Ok(()) => debug!(%mode, path = %self.session_file.display(), "session saved"),
            Err(err) => warn!(error = %err, "failed to save session"),
        }
        self.dispatcher.teardown();
    }
}
