//! Terminal status display for fetch requests
//!
//! [`TerminalObserver`] is the CLI's [`StatusObserver`]: it draws an indicatif
//! bar when stderr is a terminal and falls back to plain status lines when
//! output is piped or captured.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};

use crate::app::ports::{Notice, StatusObserver};
use crate::errors::ObserverResult;

const BAR_TEMPLATE: &str = "{prefix:>6} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// Human-readable line for a lifecycle notice
pub fn describe_notice(notice: &Notice) -> String {
    match notice {
        Notice::Started { quality } => format!("Downloading at {}", quality),
        Notice::Delivering { size_bytes } => {
            format!("Sending file ({:.1} MiB)", mib(*size_bytes))
        }
        Notice::Delivered { quality } => format!("Delivered at {}", quality),
        Notice::Oversize {
            size_bytes,
            ceiling,
            candidates,
        } => {
            let options: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
            format!(
                "File is {:.1} MiB, over the {:.0} MiB limit. Smaller qualities: {}",
                mib(*size_bytes),
                mib(*ceiling),
                options.join(", ")
            )
        }
        Notice::Rejected {
            size_bytes,
            ceiling,
        } => format!(
            "File is {:.1} MiB, over the {:.0} MiB limit, and no smaller quality exists",
            mib(*size_bytes),
            mib(*ceiling)
        ),
        Notice::Failed { reason } => format!("Failed: {}", reason),
    }
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Progress and notices rendered on stderr
pub struct TerminalObserver {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl TerminalObserver {
    /// Pick a bar or plain lines depending on whether stderr is a terminal
    pub fn new(quiet: bool) -> Self {
        let interactive = !quiet && atty::is(atty::Stream::Stderr);
        if interactive {
            Self::with_bar()
        } else {
            Self::plain(quiet)
        }
    }

    /// Plain line output, nothing at all when `quiet`
    pub fn plain(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn with_bar() -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = ProgressBar::new(100);
        bar.set_style(style);

        Self {
            bar: Some(bar),
            quiet: false,
        }
    }

    fn line(&self, message: &str) {
        match &self.bar {
            Some(bar) => bar.println(message),
            None if !self.quiet => eprintln!("{}", message),
            None => {}
        }
    }
}

#[async_trait]
impl StatusObserver for TerminalObserver {
    async fn update_status(&self, phase: &str, percent: u8) -> ObserverResult<()> {
        match &self.bar {
            Some(bar) => {
                bar.set_position(u64::from(percent));
                bar.set_message(phase.to_string());
            }
            None if !self.quiet => eprintln!("{:>3}% {}", percent, phase),
            None => {}
        }
        Ok(())
    }

    async fn notify(&self, notice: Notice) -> ObserverResult<()> {
        if let (Some(bar), Notice::Started { quality }) = (&self.bar, &notice) {
            bar.reset();
            bar.set_prefix(quality.to_string());
        }

        let message = describe_notice(&notice);
        match (&self.bar, &notice) {
            (Some(bar), Notice::Delivered { .. }) => bar.finish_with_message(message),
            (Some(bar), Notice::Rejected { .. } | Notice::Failed { .. }) => {
                bar.abandon_with_message(message)
            }
            _ => self.line(&message),
        }
        Ok(())
    }
}

impl Drop for TerminalObserver {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}
