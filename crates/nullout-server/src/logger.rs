//! Minimal stderr logger. Stdout carries the RPC frames and must stay clean,
//! so every diagnostic goes to stderr.

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{}] {}",
                record.level().to_string().to_lowercase(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> eyre::Result<()> {
    log::set_logger(&LOGGER).map_err(|err| eyre::eyre!("installing logger: {err}"))?;
    log::set_max_level(level);
    Ok(())
}
