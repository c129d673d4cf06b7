use std::io::IsTerminal;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use vigil_core::format::render_console;
use vigil_core::LogRecord;

use super::{Sink, SinkError};

type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Colorized single-line output to stdout or stderr.
///
/// The stderr variant doubles as the fan-out logger's fallback channel.
pub struct ConsoleSink {
    name: &'static str,
    colored: bool,
    out: Mutex<Output>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        let colored = std::io::stdout().is_terminal();
        Self::with_writer("console", Box::new(tokio::io::stdout()), colored)
    }

    pub fn stderr() -> Self {
        let colored = std::io::stderr().is_terminal();
        Self::with_writer("console", Box::new(tokio::io::stderr()), colored)
    }

    pub fn with_writer(name: &'static str, out: Output, colored: bool) -> Self {
        Self {
            name,
            colored,
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        self.name
    }

    async fn accept(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = render_console(record, self.colored);
        line.push('\n');

        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}
