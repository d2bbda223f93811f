use std::io::{self, Write};

/// Tagged messages collected during a run and printed in one go.
///
/// Lines are kept in call order until [`Logger::flush`] writes them out.
#[derive(Debug, Default)]
pub struct Logger {
    log: String,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_log_entry(&mut self, tag: &str, msg: &str) {
        self.log.push_str(&format!("[{}]: {}\n", tag, msg));
    }

    pub fn log_info(&mut self, msg: impl AsRef<str>) {
        log::debug!("{}", msg.as_ref());
        self.add_log_entry("INFO", msg.as_ref());
    }

    pub fn log_warn(&mut self, msg: impl AsRef<str>) {
        log::debug!("{}", msg.as_ref());
        self.add_log_entry("WARN", msg.as_ref());
    }

    pub fn log_error(&mut self, msg: impl AsRef<str>) {
        log::debug!("{}", msg.as_ref());
        self.add_log_entry("ERROR", msg.as_ref());
    }

    pub fn contents(&self) -> &str {
        &self.log
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Print everything to stdout and start over.
    pub fn flush(&mut self) {
        let stdout = io::stdout();
        if let Err(e) = self.flush_to(&mut stdout.lock()) {
            log::warn!("could not write build log: {}", e);
        }
    }

    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if !self.log.is_empty() {
            writeln!(out, "{}", self.log)?;
            out.flush()?;
            self.log.clear();
        }
        Ok(())
    }
}
