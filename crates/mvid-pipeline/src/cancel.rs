//! Run cancellation signal.

use tokio::sync::watch;

use crate::error::{PipelineError, PipelineResult};

/// Receiving half of a run's cancellation flag.
pub type CancelSignal = watch::Receiver<bool>;

/// Create a cancellation flag, initially lowered.
pub fn cancel_pair() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

pub fn is_cancelled(cancel: Option<&CancelSignal>) -> bool {
    cancel.map(|rx| *rx.borrow()).unwrap_or(false)
}

/// Fail with [`PipelineError::Cancelled`] once the flag is raised.
pub fn ensure_active(cancel: Option<&CancelSignal>) -> PipelineResult<()> {
    if is_cancelled(cancel) {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_flag() {
        let (tx, rx) = cancel_pair();
        assert_ok!(ensure_active(Some(&rx)));
        assert_ok!(ensure_active(None));

        tx.send(true).unwrap();
        assert!(is_cancelled(Some(&rx)));
        assert!(assert_err!(ensure_active(Some(&rx))).is_cancelled());
    }
}
