use rust_gb_apu::apu::tables::VERTICAL_SYNC;
use rust_gb_apu::player::{Player, RegisterScript};
use rust_gb_apu::utils::logger;
use rust_gb_apu::{Apu, ApuConfig, Result};

fn main() -> Result<()> {
    if let Err(e) = logger::init() {
        eprintln!("無法啟動 logger: {}", e);
    }

    // 獲取命令行參數
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("用法: {} <script.json> [config.json]", args[0]);
        return Ok(());
    }

    let config = match args.get(2) {
        Some(path) => ApuConfig::load(path)?,
        None => ApuConfig::default(),
    };
    let script = RegisterScript::load(&args[1])?;

    let mut apu = Apu::with_config(config.clone())?;
    let mut player = Player::new(script)?;
    println!(
        "=== 播放 {} ({} 幀, {} Hz) ===",
        args[1],
        player.total_frames(),
        config.output_sample_rate
    );

    run(&mut apu, &mut player, &config)
}

#[cfg(feature = "sdl")]
fn run(apu: &mut Apu, player: &mut Player, config: &ApuConfig) -> Result<()> {
    use rust_gb_apu::Error;
    use rust_gb_apu::interface::audio::{AudioInterface, SampleQueue};
    use std::time::{Duration, Instant};

    let sdl_context = sdl3::init().map_err(|e| Error::Audio(format!("SDL init error: {:?}", e)))?;
    let (producer, consumer) = SampleQueue::new();
    let audio = AudioInterface::new(&sdl_context, config.output_sample_rate, consumer)?;
    audio.start()?;

    let frame_time = Duration::from_secs_f64(1.0 / VERTICAL_SYNC);
    let per_frame = apu.samples_per_frame();
    let mut left = vec![0i16; per_frame];
    let mut right = vec![0i16; per_frame];
    let mut next_frame = Instant::now();

    while !player.is_finished() {
        if player.step_frame(apu, &mut left, &mut right) {
            producer.push_block(&left, &right);
        }
        next_frame += frame_time;
        if let Some(wait) = next_frame.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
    }

    // 等待佇列播放完畢
    while producer.queued() > 0 {
        std::thread::sleep(frame_time);
    }
    audio.stop()?;
    log::info!("Playback finished after {} frames", player.frame());
    Ok(())
}

#[cfg(not(feature = "sdl"))]
fn run(apu: &mut Apu, player: &mut Player, config: &ApuConfig) -> Result<()> {
    use rust_gb_apu::player::LevelStats;

    let (left, right) = player.render_all(apu);
    let left_stats = LevelStats::measure(&left);
    let right_stats = LevelStats::measure(&right);
    let seconds = left.len() as f64 / config.output_sample_rate as f64;

    log::info!(
        "Rendered {} frames ({:.2} s @ {:.2} fps): L peak {} rms {:.1}, R peak {} rms {:.1}",
        player.frame(),
        seconds,
        VERTICAL_SYNC,
        left_stats.peak,
        left_stats.rms,
        right_stats.peak,
        right_stats.rms
    );
    println!(
        "L: peak {:>6} rms {:>8.1}\nR: peak {:>6} rms {:>8.1}",
        left_stats.peak, left_stats.rms, right_stats.peak, right_stats.rms
    );
    Ok(())
}
