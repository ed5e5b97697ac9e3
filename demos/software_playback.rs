//! Plays a short synthetic paint sequence through the compositor on the
//! in-memory device and reports what the surface saw.
//!
//! Run with `RUST_LOG=debug` to see the handler's logs. An optional first
//! argument points at a JSON config file. Set `OSR_DEMO_GPU=1` to also open
//! the wgpu device described by the config's `device` section.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use osr_compositor::error::{OptionExt, ResultExt};
use osr_compositor::{
    channel, CompositorConfig, CompositorResult, ContextLostCallback, DisplaySurface,
    GraphicsDevice, Rect, RenderHandler, SharedGraphicsContext, SoftwareDevice,
    SoftwarePresentation, SurfaceHandle,
};

const WIDTH: u32 = 100;
const HEIGHT: u32 = 100;

#[derive(Default)]
struct Stats {
    texture: Option<Arc<SoftwarePresentation>>,
    binds: usize,
    redraws: usize,
}

struct HeadlessView(Rc<RefCell<Stats>>);

impl DisplaySurface<SoftwarePresentation> for HeadlessView {
    fn bind(&mut self, texture: Arc<SoftwarePresentation>) {
        let mut stats = self.0.borrow_mut();
        stats.texture = Some(texture);
        stats.binds += 1;
    }

    fn invalidate(&mut self) {
        self.0.borrow_mut().redraws += 1;
    }

    fn on_context_lost(&mut self, _callback: ContextLostCallback) {}
}

fn solid(color: [u8; 4]) -> Vec<u8> {
    color.repeat((WIDTH * HEIGHT) as usize)
}

fn load_config() -> CompositorResult<CompositorConfig> {
    match std::env::args().nth(1) {
        Some(path) => CompositorConfig::load(&path),
        None => Ok(CompositorConfig::from_env()),
    }
}

fn main() -> CompositorResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!("Config: {}", serde_json::to_string(&config)?);

    if std::env::var_os("OSR_DEMO_GPU").is_some() {
        let gpu = SharedGraphicsContext::wgpu_from(&config);
        match gpu.get() {
            Ok(device) => log::info!("GPU device available: {}", device.name()),
            Err(e) => log::warn!("GPU device unavailable, staying on software: {}", e),
        }
    }

    let context = SharedGraphicsContext::new(|| Ok(SoftwareDevice::new()));
    let (sender, mut bridge) = channel();
    let handler = RenderHandler::new(&context, config, sender)?;

    let surface = SurfaceHandle::next();
    let stats = Rc::new(RefCell::new(Stats::default()));
    bridge.register(surface, HeadlessView(Rc::clone(&stats)));

    let black = solid([0, 0, 0, 0xFF]);
    let white_popup = [0xFFu8; 4].repeat(100);
    let full = Rect::full(WIDTH, HEIGHT);

    handler.set_popup_rect(Rect::new(5, 5, 10, 10));

    let started = Instant::now();
    let mut frames = 0u32;
    while started.elapsed() < Duration::from_millis(2100) {
        let popup_on = (frames / 30) % 2 == 1;
        handler.set_popup_visible(popup_on);
        if popup_on && frames % 30 == 0 {
            handler.deliver_frame(true, Rect::full(10, 10), Some(&white_popup), 10, 10, surface);
        }
        handler.deliver_frame(false, full, Some(&black), WIDTH, HEIGHT, surface);
        bridge.drain();

        frames += 1;
        std::thread::sleep(Duration::from_millis(16));
    }

    let stats = stats.borrow();
    let texture = stats
        .texture
        .as_ref()
        .context("surface never received a texture")?;
    let centre = texture
        .pixel(WIDTH / 2, HEIGHT / 2)
        .context("centre pixel out of range")?;

    println!("frames delivered : {}", frames);
    println!("frame rate       : {} fps", handler.frame_rate());
    println!("surface binds    : {}", stats.binds);
    println!("surface redraws  : {}", stats.redraws);
    println!("centre pixel     : {:?}", centre);

    handler.close();
    let out = std::env::temp_dir().join("osr-compositor-frame.bgra");
    std::fs::write(&out, texture.snapshot())
        .with_context(|| format!("writing final frame to {}", out.display()))?;
    Ok(())
}
