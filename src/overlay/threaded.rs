/*!
 * Threaded Overlay
 *
 * Owns a dedicated render thread. Draw calls enqueue a command and return
 * immediately; the thread drains everything queued since its last frame,
 * folds it into one scene and renders once, so the most recent state wins.
 * A renderer failure stops the thread and later draw calls report
 * `OverlayFailed` until a resize respawns it.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use super::render::Renderer;
use super::{CursorDot, DotStyle, DrawCommand, GridStyle, Highlight, HintStyle, Overlay, ResizeDone, Scene};
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{Point, Rect};
use crate::grid::GridCell;
use crate::hints::Hint;

/// Builds a fresh renderer for a (re)spawned render thread.
pub type RendererFactory = dyn Fn() -> Result<Box<dyn Renderer>> + Send + Sync;

enum Message {
    Draw(DrawCommand),
    Resize(ResizeDone),
    Shutdown,
}

struct Worker {
    tx: Sender<Message>,
    alive: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(factory: &RendererFactory) -> Result<Self> {
        let renderer = factory()?;
        let (tx, rx) = mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let thread_alive = Arc::clone(&alive);
        let handle = thread::Builder::new()
            .name("overlay-render".into())
            .spawn(move || render_loop(renderer, rx, thread_alive))
            .map_err(|e| Error::wrap(e, ErrorCode::OverlayFailed, "failed to start render thread"))?;
        Ok(Self {
            tx,
            alive,
            handle: Some(handle),
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("[Overlay] render thread panicked");
            }
        }
    }
}

fn render_loop(mut renderer: Box<dyn Renderer>, rx: Receiver<Message>, alive: Arc<AtomicBool>) {
    let mut scene = Scene::default();
    while let Ok(first) = rx.recv() {
        let mut batch = vec![first];
        batch.extend(rx.try_iter());

        let mut finished = Vec::new();
        let mut shutdown = false;
        let mut failed = false;
        let mut dirty = false;
        for message in batch {
            match message {
                Message::Draw(command) => {
                    scene.apply(command);
                    dirty = true;
                }
                Message::Resize(done) => {
                    dirty = true;
                    match renderer.resize() {
                        Ok(frame) => debug!("[Overlay] frame {:?}", frame),
                        Err(e) => {
                            error!("[Overlay] resize failed: {}", e);
                            failed = true;
                        }
                    }
                    finished.push(done);
                }
                Message::Shutdown => shutdown = true,
            }
        }

        if dirty && !failed {
            if let Err(e) = renderer.render(&scene) {
                error!("[Overlay] render failed: {}", e);
                failed = true;
            }
        }
        if failed {
            alive.store(false, Ordering::SeqCst);
        }
        for done in finished {
            done();
        }
        if failed || shutdown {
            break;
        }
    }
    alive.store(false, Ordering::SeqCst);
}

/// Overlay backed by a render thread and a pluggable renderer.
pub struct ThreadedOverlay {
    factory: Arc<RendererFactory>,
    worker: Mutex<Worker>,
    visible: AtomicBool,
}

impl ThreadedOverlay {
    pub fn new<F>(factory: F) -> Result<Self>
    where
        F: Fn() -> Result<Box<dyn Renderer>> + Send + Sync + 'static,
    {
        let factory: Arc<RendererFactory> = Arc::new(factory);
        let worker = Worker::spawn(factory.as_ref())?;
        info!("[Overlay] render thread started");
        Ok(Self {
            factory,
            worker: Mutex::new(worker),
            visible: AtomicBool::new(false),
        })
    }

    fn send(&self, command: DrawCommand) -> Result<()> {
        let shows = command.shows();
        let worker = self.worker.lock()?;
        if !worker.is_alive() {
            return Err(Error::new(ErrorCode::OverlayFailed, "render thread is not running"));
        }
        worker
            .tx
            .send(Message::Draw(command))
            .map_err(|_| Error::new(ErrorCode::OverlayFailed, "render thread is not running"))?;
        if let Some(visible) = shows {
            self.visible.store(visible, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Overlay for ThreadedOverlay {
    fn show_hints(&self, hints: &[Hint], style: &HintStyle) -> Result<()> {
        self.send(DrawCommand::Hints(hints.to_vec(), style.clone()))
    }

    fn show_grid(&self, cells: &[GridCell], style: &GridStyle) -> Result<()> {
        self.send(DrawCommand::Grid(cells.to_vec(), style.clone()))
    }

    fn draw_scroll_highlight(&self, rect: Rect, color: &str, width: u32) -> Result<()> {
        self.send(DrawCommand::ScrollHighlight(Highlight {
            rect,
            color: color.to_string(),
            width,
        }))
    }

    fn draw_action_highlight(&self, rect: Rect, color: &str, width: u32) -> Result<()> {
        self.send(DrawCommand::ActionHighlight(Highlight {
            rect,
            color: color.to_string(),
            width,
        }))
    }

    fn draw_cursor_dot(&self, center: Point, radius: u32, style: &DotStyle) -> Result<()> {
        self.send(DrawCommand::CursorDot(CursorDot {
            center,
            radius,
            style: style.clone(),
        }))
    }

    fn hide(&self) -> Result<()> {
        if !self.visible.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.send(DrawCommand::Hide)
    }

    fn refresh(&self) -> Result<()> {
        self.send(DrawCommand::Refresh)
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn resize_to_active_screen(&self, done: ResizeDone) {
        let mut worker = match self.worker.lock() {
            Ok(worker) => worker,
            Err(e) => {
                error!("[Overlay] worker lock poisoned: {}", e);
                done();
                return;
            }
        };

        if !worker.is_alive() {
            warn!("[Overlay] render thread is down, respawning");
            worker.stop();
            match Worker::spawn(self.factory.as_ref()) {
                Ok(fresh) => *worker = fresh,
                Err(e) => {
                    error!("[Overlay] respawn failed: {}", e);
                    done();
                    return;
                }
            }
        }

        if let Err(SendError(Message::Resize(done))) = worker.tx.send(Message::Resize(done)) {
            done();
        }
    }

    fn is_healthy(&self) -> bool {
        self.worker.lock().map(|w| w.is_alive()).unwrap_or(false)
    }
}

impl Drop for ThreadedOverlay {
    fn drop(&mut self) {
        if let Ok(worker) = self.worker.get_mut() {
            worker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Observed {
        scenes: Mutex<Vec<Scene>>,
        resizes: AtomicUsize,
    }

    struct TestRenderer {
        observed: Arc<Observed>,
        entered: Option<Sender<()>>,
        gate: Option<Receiver<()>>,
        fail: bool,
    }

    impl Renderer for TestRenderer {
        fn render(&mut self, scene: &Scene) -> Result<()> {
            if let Some(entered) = self.entered.take() {
                let _ = entered.send(());
            }
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv();
            }
            if self.fail {
                return Err(Error::new(ErrorCode::OverlayFailed, "window server gone"));
            }
            self.observed.scenes.lock().unwrap().push(scene.clone());
            Ok(())
        }

        fn resize(&mut self) -> Result<Rect> {
            self.observed.resizes.fetch_add(1, Ordering::SeqCst);
            Ok(Rect::new(0, 0, 800, 600))
        }
    }

    fn wait_until(mut f: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !f() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn dot() -> DotStyle {
        DotStyle::default()
    }

    #[test]
    fn queued_commands_coalesce_into_one_frame() {
        let observed = Arc::new(Observed::default());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel();
        let slot = Mutex::new(Some((entered_tx, gate_rx)));
        let factory_observed = Arc::clone(&observed);
        let overlay = ThreadedOverlay::new(move || {
            let (entered, gate) = match slot.lock().unwrap().take() {
                Some((e, g)) => (Some(e), Some(g)),
                None => (None, None),
            };
            Ok(Box::new(TestRenderer {
                observed: Arc::clone(&factory_observed),
                entered,
                gate,
                fail: false,
            }) as Box<dyn Renderer>)
        })
        .unwrap();

        overlay.show_grid(&[], &GridStyle::default()).unwrap();
        entered_rx.recv().unwrap();

        overlay.hide().unwrap();
        overlay.refresh().unwrap();
        overlay.draw_cursor_dot(Point::new(5, 5), 4, &dot()).unwrap();
        assert!(overlay.is_visible());
        gate_tx.send(()).unwrap();
        drop(overlay);

        let scenes = observed.scenes.lock().unwrap();
        assert_eq!(scenes.len(), 2);
        assert!(scenes[0].grid.is_some());
        assert!(scenes[1].grid.is_none());
        assert_eq!(scenes[1].cursor_dot.as_ref().map(|d| d.center), Some(Point::new(5, 5)));
    }

    #[test]
    fn hide_when_hidden_is_a_no_op() {
        let observed = Arc::new(Observed::default());
        let factory_observed = Arc::clone(&observed);
        let overlay = ThreadedOverlay::new(move || {
            Ok(Box::new(TestRenderer {
                observed: Arc::clone(&factory_observed),
                entered: None,
                gate: None,
                fail: false,
            }) as Box<dyn Renderer>)
        })
        .unwrap();
        overlay.hide().unwrap();
        assert!(!overlay.is_visible());
        drop(overlay);
        assert!(observed.scenes.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_renderer_is_respawned_on_resize() {
        let observed = Arc::new(Observed::default());
        let spawns = Arc::new(AtomicUsize::new(0));
        let factory_observed = Arc::clone(&observed);
        let factory_spawns = Arc::clone(&spawns);
        let overlay = ThreadedOverlay::new(move || {
            let n = factory_spawns.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TestRenderer {
                observed: Arc::clone(&factory_observed),
                entered: None,
                gate: None,
                fail: n == 0,
            }) as Box<dyn Renderer>)
        })
        .unwrap();

        overlay.show_hints(&[], &HintStyle::default()).unwrap();
        wait_until(|| !overlay.is_healthy());
        let err = overlay.show_hints(&[], &HintStyle::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OverlayFailed);

        let (done_tx, done_rx) = mpsc::channel();
        overlay.resize_to_active_screen(Box::new(move || {
            let _ = done_tx.send(());
        }));
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(overlay.is_healthy());
        assert_eq!(spawns.load(Ordering::SeqCst), 2);
        assert_eq!(observed.resizes.load(Ordering::SeqCst), 1);

        overlay.show_hints(&[], &HintStyle::default()).unwrap();
    }
}
