//! Continuous scanning demo
//!
//! Drives the full scanner pipeline (camera worker, preview negotiation,
//! background decoding) against a scripted synthetic camera, so it runs
//! headless on any machine with no camera hardware attached.
//!
//! Usage: cargo run --example continuous_scan

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use framescan::testing::{ScriptedDecoderFactory, SyntheticOpener, SyntheticScript};
use framescan::{BarcodeScanner, PreviewSurface, ScanError, Size, StateListener};

const SCAN_BUDGET: Duration = Duration::from_secs(10);
const EXPECTED_RESULTS: usize = 5;

struct LifecyclePrinter;

impl StateListener for LifecyclePrinter {
    fn preview_started(&mut self) {
        println!("📸 Preview running, decoding started");
    }

    fn camera_error(&mut self, error: &ScanError) {
        println!("❌ Camera error: {error}");
    }

    fn camera_closed(&mut self) {
        println!("🕶️  Camera closed");
    }
}

fn main() -> Result<()> {
    framescan::init_logging();

    println!("🔍 Framescan Continuous Scanning Demo");
    println!("=====================================");

    // A scripted device: serves gradient frames at ~30fps, and the decoder
    // factory is loaded with a mix of misses and hits to play back.
    let script = SyntheticScript::new();
    script.set_grab_delay(Duration::from_millis(30));
    let factory = ScriptedDecoderFactory::new();
    for i in 0..EXPECTED_RESULTS {
        factory.push_miss();
        factory.push_miss();
        factory.push_result(&format!("ticket-{:04}", i + 1));
    }

    let found = Arc::new(AtomicUsize::new(0));
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let mut scanner = BarcodeScanner::new();
    scanner.set_source_opener(Arc::new(SyntheticOpener::new(script.clone())));
    scanner.set_decoder_factory(Arc::new(factory.clone()));
    scanner.set_surface(PreviewSurface::Window(1));
    scanner.add_state_listener(Box::new(LifecyclePrinter));

    let counter = found.clone();
    scanner.decode_continuous(Box::new(move |result: &framescan::BarcodeResult| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("✅ [{n}] {} ({:?})", result.text(), result.format());
    }));

    // A portrait phone-style viewfinder over a landscape sensor.
    scanner.set_container_size(Size::new(1080, 1920));
    scanner.resume()?;

    println!("🎬 Scanning (Ctrl+C to stop early)\n");
    let start = Instant::now();
    let mut announced = false;
    while running.load(Ordering::SeqCst)
        && found.load(Ordering::SeqCst) < EXPECTED_RESULTS
        && start.elapsed() < SCAN_BUDGET
    {
        scanner.pump_events();
        if !announced && scanner.is_preview_active() {
            announced = true;
            if let Some(size) = scanner.preview_size() {
                println!("📐 Preview negotiated: {size}");
            }
            if let Some(rect) = scanner.framing_rect() {
                println!("🎯 Viewfinder framing: {rect:?}\n");
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    println!("\n⏹️  Shutting down...");
    scanner.stop_decoding();
    scanner.pause_and_wait();
    scanner.pump_events();

    let elapsed = start.elapsed().as_secs_f64();
    let frames = script.frames_served();
    println!("\n📊 Session summary:");
    println!("   - Barcodes found: {}", found.load(Ordering::SeqCst));
    println!("   - Frames decoded: {frames} ({:.1} fps)", frames as f64 / elapsed);
    println!("   - Elapsed: {elapsed:.2}s");

    Ok(())
}
