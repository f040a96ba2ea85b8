//! gesture_volume - webcam entry point.

use anyhow::Context;
use gesture_volume::app::run;
use gesture_volume::config::AppConfig;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Gesture Volume - pinch to set master volume         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Thumb + index close together  → quieter");
    println!("  Thumb + index spread apart    → louder");
    println!("  q in the preview window       → quit");
    println!();

    let cfg = AppConfig::load().context("loading configuration")?;
    log::debug!("{:?}", cfg);

    run(cfg).context("gesture volume loop failed")?;
    Ok(())
}
