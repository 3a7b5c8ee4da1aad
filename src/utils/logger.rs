use log::{LevelFilter, Log, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

// 全域 log 檔案鎖，避免多執行緒寫入衝突
static LOG_MUTEX: Mutex<()> = Mutex::new(());

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "emulator.log";
/// Env var holding the log level (off, error, warn, info, debug, trace).
pub const LOG_LEVEL_VAR: &str = "GB_APU_LOG";

/// 將訊息寫入 log 檔案 (logs/emulator.log)
pub fn log_to_file(msg: &str) {
    let _lock = LOG_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if !Path::new(LOG_DIR).exists() {
        let _ = std::fs::create_dir_all(LOG_DIR);
    }
    let log_path = Path::new(LOG_DIR).join(LOG_FILE);
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
        let _ = writeln!(file, "{}", msg);
    }
}

#[derive(Debug)]
struct FileLogger;

static LOGGER: FileLogger = FileLogger;

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            log_to_file(&format_record(record));
        }
    }

    fn flush(&self) {}
}

fn format_record(record: &Record) -> String {
    format!("[{:<5}] {}: {}", record.level(), record.target(), record.args())
}

fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Level requested through `GB_APU_LOG`, `info` when unset or unparsable.
pub fn level_from_env() -> LevelFilter {
    parse_level(std::env::var(LOG_LEVEL_VAR).ok().as_deref())
}

/// Routes the `log` macros to logs/emulator.log. Fails if a logger is
/// already installed.
pub fn init() -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level_from_env());
    Ok(())
}
