//! First-error latch and shared cancellation for one stream.

use std::sync::OnceLock;

use super::cancel::CancelToken;
use super::error::StreamingError;
use super::source::StreamingResult;

/// Externally visible lifecycle of a chunked stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Bytes remain to be delivered.
    Active,
    /// Every byte has been delivered; reads return end-of-stream.
    Exhausted,
    /// A fatal error, cancellation or close was latched; reads return that error.
    Errored,
}

/// How a stream ended.
#[derive(Debug)]
pub(crate) enum Outcome {
    Exhausted,
    Failed(StreamingError),
}

impl Outcome {
    /// The result a read observes once the stream has ended.
    pub(crate) fn read_result(&self) -> StreamingResult<usize> {
        match self {
            Self::Exhausted => Ok(0),
            Self::Failed(err) => Err(err.clone()),
        }
    }
}

/// Records the first terminal outcome and cancels the stream's token.
///
/// Every participant (workers, readers, `close`) reports through [`settle`](Self::settle);
/// only the first report is kept and later ones observe it.
#[derive(Debug)]
pub(crate) struct Controller {
    outcome: OnceLock<Outcome>,
    token: CancelToken,
}

impl Controller {
    pub(crate) fn new(token: CancelToken) -> Self {
        Self {
            outcome: OnceLock::new(),
            token,
        }
    }

    pub(crate) fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Latches `outcome` unless one is already stored, then cancels.
    ///
    /// Returns the outcome that won.
    pub(crate) fn settle(&self, outcome: Outcome) -> &Outcome {
        let stored = self.outcome.get_or_init(|| outcome);
        self.token.cancel();
        stored
    }

    pub(crate) fn fail(&self, err: StreamingError) -> &Outcome {
        self.settle(Outcome::Failed(err))
    }

    pub(crate) fn finish(&self) -> &Outcome {
        self.settle(Outcome::Exhausted)
    }

    /// The latched outcome, if the stream has ended.
    ///
    /// A cancelled token with nothing latched means the parent context was
    /// cancelled; that is latched here as [`StreamingError::Cancelled`].
    pub(crate) fn outcome(&self) -> Option<&Outcome> {
        if let Some(outcome) = self.outcome.get() {
            return Some(outcome);
        }
        if self.token.is_cancelled() {
            return Some(self.fail(StreamingError::Cancelled));
        }
        None
    }

    pub(crate) fn state(&self) -> StreamState {
        match self.outcome() {
            None => StreamState::Active,
            Some(Outcome::Exhausted) => StreamState::Exhausted,
            Some(Outcome::Failed(_)) => StreamState::Errored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_error_wins() {
        let controller = Controller::new(CancelToken::new());
        assert_eq!(controller.state(), StreamState::Active);

        controller.fail(StreamingError::Timeout { timeout_secs: 5 });
        let outcome = controller.fail(StreamingError::ClosedByCaller);

        assert!(matches!(
            outcome,
            Outcome::Failed(StreamingError::Timeout { timeout_secs: 5 })
        ));
        assert!(controller.token().is_cancelled());
        assert_eq!(controller.state(), StreamState::Errored);
    }

    #[test]
    fn exhausted_is_terminal() {
        let controller = Controller::new(CancelToken::new());
        controller.finish();
        controller.fail(StreamingError::ClosedByCaller);

        assert_eq!(controller.state(), StreamState::Exhausted);
        assert_eq!(controller.outcome().unwrap().read_result().unwrap(), 0);
    }

    #[test]
    fn parent_cancellation_latches_cancelled() {
        let parent = CancelToken::new();
        let controller = Controller::new(parent.child_token());

        parent.cancel();

        assert!(matches!(
            controller.outcome(),
            Some(Outcome::Failed(StreamingError::Cancelled))
        ));
    }

    #[test]
    fn concurrent_reports_agree() {
        let controller = Arc::new(Controller::new(CancelToken::new()));
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let controller = Arc::clone(&controller);
                thread::spawn(move || {
                    let outcome = controller.fail(StreamingError::ShortChunk {
                        chunk: i,
                        expected: 1,
                        actual: 0,
                    });
                    match outcome {
                        Outcome::Failed(StreamingError::ShortChunk { chunk, .. }) => *chunk,
                        other => panic!("unexpected outcome {other:?}"),
                    }
                })
            })
            .collect();

        let winners: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(winners.windows(2).all(|w| w[0] == w[1]));
    }
}
