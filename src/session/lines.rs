//! Module `lines`
//!
//! Lazy, pull-based sequence of text lines produced by a RETR in ASCII mode.

use crate::error::Result;
use crate::session::Session;

/// Lines of a download in progress.
///
/// Holds the session mutably, so no other command can be issued until the
/// sequence is exhausted, finished or dropped. After exhaustion the
/// completion reply has been consumed and the session is ready for the
/// next command. A sequence dropped early is drained by the session's next
/// operation.
pub struct RetrieveLines<'s> {
    session: &'s mut Session,
    done: bool,
}

impl<'s> RetrieveLines<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            done: false,
        }
    }

    /// Pulls the next line from the data channel.
    ///
    /// `None` means the server closed the data channel and its completion
    /// reply was a success. A failing completion reply is returned as an
    /// error instead.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.done {
            return Ok(None);
        }

        let result = match self.session.data_channel() {
            Ok(data) => data.next_line().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => {
                self.done = true;
                self.session.finish_transfer().await?;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                self.session.abandon_transfer().await;
                Err(e.into())
            }
        }
    }

    /// Reads every remaining line.
    pub async fn collect_lines(mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Stops reading: closes the data channel and drains the completion reply.
    pub async fn finish(mut self) -> Result<()> {
        if !self.done {
            self.done = true;
            self.session.abort_transfer().await?;
        }
        Ok(())
    }
}
