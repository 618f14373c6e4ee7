//! Captures per job logs so they can be recorded on the deployment

use tracing::{event, Level};

/// The captured log sink for one deploy job
///
/// Each job gets its own sink so the captured text never interleaves with
/// other jobs. Lines are mirrored to the local tracer as they are added.
#[derive(Debug, Default)]
pub struct JobLog {
    /// The captured log lines
    lines: Vec<String>,
}

impl JobLog {
    /// Create a new empty job log
    #[must_use]
    pub fn new() -> Self {
        JobLog::default()
    }

    /// Capture an info line
    ///
    /// # Arguments
    ///
    /// * `msg` - The line to capture
    pub fn info<T: Into<String>>(&mut self, msg: T) {
        let msg = msg.into();
        event!(Level::INFO, msg = &msg);
        self.lines.push(msg);
    }

    /// Capture an error line
    ///
    /// # Arguments
    ///
    /// * `msg` - The line to capture
    pub fn error<T: Into<String>>(&mut self, msg: T) {
        let msg = msg.into();
        event!(Level::ERROR, msg = &msg);
        self.lines.push(format!("ERROR: {msg}"));
    }

    /// Render the captured log as one block of text
    #[must_use]
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_render_in_order() {
        let mut log = JobLog::new();
        log.info("Connecting to rtr1");
        log.error("Connection refused");
        assert_eq!(
            log.render(),
            "Connecting to rtr1\nERROR: Connection refused"
        );
    }
}
