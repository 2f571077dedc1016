use std::io::Write;

use colored::Colorize;
use log::Level;

/// Installs the process-wide logger. `RUST_LOG` overrides the default `info`
/// filter. Safe to call more than once.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "ERROR".red().bold(),
                Level::Warn => "WARN ".yellow().bold(),
                Level::Info => "INFO ".green(),
                Level::Debug => "DEBUG".blue(),
                Level::Trace => "TRACE".purple(),
            };
            writeln!(
                buf,
                "{} {} {} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
                level,
                record.target().cyan(),
                record.args()
            )
        })
        .try_init();
}
