//! Window and event-loop glue around [`AppState`].

use std::sync::Arc;
use std::task::Poll;

use anyhow::{anyhow, Result};
use log::{error, info, warn};
use thiserror::Error;
use winit::application::ApplicationHandler;
#[cfg(not(target_arch = "wasm32"))]
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::Key;
use winit::window::{Window, WindowId};

use crate::app::AppState;
use crate::deferred::Deferred;
use crate::render::{FrameError, Renderer};

const WINDOW_TITLE: &str = "glyph-glow";

/// Raised when no window can be opened, e.g. without a display server.
#[derive(Debug, Error)]
#[error("failed to initialize {stage}: {message}")]
pub struct WindowInitError {
    stage: &'static str,
    message: String,
}

impl WindowInitError {
    fn new(stage: &'static str, message: impl ToString) -> Self {
        Self {
            stage,
            message: message.to_string(),
        }
    }
}

/// Maps a logical key to the identifier the input controller binds against:
/// the produced text for character keys, the key name otherwise.
pub fn key_identifier(key: &Key) -> Option<String> {
    match key {
        Key::Character(text) => Some(text.to_string()),
        Key::Named(named) => Some(format!("{named:?}")),
        _ => None,
    }
}

/// Event handler owning the app state, its window and the renderer.
pub struct Shell {
    app: AppState,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    pending_renderer: Option<Deferred<Renderer, anyhow::Error>>,
    error: Option<anyhow::Error>,
}

impl Shell {
    pub fn new(app: AppState) -> Self {
        Self {
            app,
            window: None,
            renderer: None,
            pending_renderer: None,
            error: None,
        }
    }

    pub fn into_app(self) -> AppState {
        self.app
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn window_attributes() -> winit::window::WindowAttributes {
        let attributes = Window::default_attributes().with_title(WINDOW_TITLE);
        #[cfg(not(target_arch = "wasm32"))]
        let attributes = attributes.with_inner_size(LogicalSize::new(1280.0, 720.0));
        #[cfg(target_arch = "wasm32")]
        let attributes = {
            use winit::platform::web::WindowAttributesExtWebSys;
            attributes.with_append(true)
        };
        attributes
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn start_renderer(window: Arc<Window>) -> Deferred<Renderer, anyhow::Error> {
        Deferred::settled(pollster::block_on(Renderer::new(window)))
    }

    #[cfg(target_arch = "wasm32")]
    fn start_renderer(window: Arc<Window>) -> Deferred<Renderer, anyhow::Error> {
        use winit::platform::web::WindowExtWebSys;

        if let Some(canvas) = window.canvas() {
            let styled = canvas.set_attribute(
                "style",
                "position: fixed; inset: 0; width: 100vw; height: 100vh; display: block;",
            );
            if styled.is_err() {
                warn!("unable to style the canvas");
            }
        }
        let (pending, resolver) = Deferred::channel();
        wasm_bindgen_futures::spawn_local(async move {
            resolver.resolve(Renderer::new(window).await);
        });
        pending
    }

    fn poll_renderer(&mut self, event_loop: &ActiveEventLoop) {
        let Some(pending) = self.pending_renderer.as_ref() else {
            return;
        };
        match pending.poll() {
            Poll::Pending => {}
            Poll::Ready(Ok(mut renderer)) => {
                self.pending_renderer = None;
                if let Some(window) = self.window.as_ref() {
                    let size = window.inner_size();
                    renderer.resize(size);
                    self.app.resize(size.width, size.height);
                }
                info!("renderer ready");
                self.renderer = Some(renderer);
            }
            Poll::Ready(Err(err)) => {
                self.pending_renderer = None;
                self.fail(event_loop, err);
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.poll_renderer(event_loop);
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match self.app.tick(renderer) {
            Ok(()) => {}
            Err(FrameError::Lost | FrameError::Outdated) => renderer.recover(),
            Err(FrameError::Timeout) => warn!("surface timeout; retrying next frame"),
            Err(FrameError::OutOfMemory) => {
                self.fail(event_loop, anyhow!(FrameError::OutOfMemory));
            }
            Err(err) => warn!("frame skipped: {err}"),
        }
    }

    fn key_down(&mut self, event_loop: &ActiveEventLoop, key: &Key) {
        let Some(id) = key_identifier(key) else {
            return;
        };
        if cfg!(not(target_arch = "wasm32")) && id == "Escape" {
            event_loop.exit();
            return;
        }
        self.app.handle_key(&id);
    }
}

impl ApplicationHandler for Shell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match event_loop.create_window(Self::window_attributes()) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                let err = WindowInitError::new("window", err);
                self.error = Some(err.into());
                event_loop.exit();
                return;
            }
        };
        let size = window.inner_size();
        self.app.resize(size.width, size.height);
        self.pending_renderer = Some(Self::start_renderer(Arc::clone(&window)));
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|window| window.id()) != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.app.resize(size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                self.key_down(event_loop, &event.logical_key);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn create_event_loop() -> Result<EventLoop<()>, WindowInitError> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let created = std::panic::catch_unwind(std::panic::AssertUnwindSafe(EventLoop::new));
    std::panic::set_hook(default_hook);
    match created {
        Ok(Ok(event_loop)) => Ok(event_loop),
        Ok(Err(err)) => Err(WindowInitError::new("event loop", err)),
        Err(panic) => Err(WindowInitError::new("event loop", panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// Runs the native window until it is closed and hands the final state
/// back. Fails with [`WindowInitError`] when no window can be created.
#[cfg(not(target_arch = "wasm32"))]
pub fn run_native(app: AppState) -> Result<AppState> {
    let event_loop = create_event_loop()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut shell = Shell::new(app);
    event_loop.run_app(&mut shell)?;
    match shell.error.take() {
        Some(err) => Err(err),
        None => Ok(shell.into_app()),
    }
}

/// Hands the shell to the browser's event loop and returns immediately.
#[cfg(target_arch = "wasm32")]
pub fn run_web(app: AppState) -> Result<()> {
    use winit::platform::web::EventLoopExtWebSys;

    let event_loop = create_event_loop()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.spawn_app(Shell::new(app));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::NamedKey;

    #[test]
    fn character_keys_keep_their_text() {
        assert_eq!(key_identifier(&Key::Character("w".into())), Some("w".into()));
        assert_eq!(key_identifier(&Key::Character("W".into())), Some("W".into()));
    }

    #[test]
    fn named_keys_use_their_names() {
        assert_eq!(
            key_identifier(&Key::Named(NamedKey::ArrowUp)),
            Some("ArrowUp".into())
        );
        assert_eq!(
            key_identifier(&Key::Named(NamedKey::Escape)),
            Some("Escape".into())
        );
    }

    #[test]
    fn window_errors_name_their_stage() {
        let err = WindowInitError::new("window", "no display");
        assert_eq!(err.to_string(), "failed to initialize window: no display");
    }
}
