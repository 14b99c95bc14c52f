//! Retirement notification.
//!
//! A completion report hands the arbiter a single-use callback. The callback runs exactly once,
//! at the instant its ROB slot retires, and callbacks always run in ascending sequence order.
//! Callers that prefer a future can use [`RetireTicket`] instead.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_channel::oneshot;

use crate::error::RetireCanceled;

/// Result delivery hook stored on a ROB slot.
pub type OnRetired = Box<dyn FnOnce() + Send + 'static>;

/// Future resolved when the associated request retires.
///
/// Resolves to [`RetireCanceled`] if the request is cancelled or the arbiter is reset before the
/// slot retires.
#[derive(Debug)]
pub struct RetireTicket {
    rx: oneshot::Receiver<()>,
    retired: bool,
}

impl RetireTicket {
    /// Build a ticket plus the callback that resolves it.
    pub fn pair() -> (Self, OnRetired) {
        let (tx, rx) = oneshot::channel();
        let on_retired: OnRetired = Box::new(move || {
            let _ = tx.send(());
        });
        (
            Self {
                rx,
                retired: false,
            },
            on_retired,
        )
    }

    /// Non-blocking check. `Ok(false)` means the slot has not retired yet.
    pub fn try_retired(&mut self) -> Result<bool, RetireCanceled> {
        if self.retired {
            return Ok(true);
        }
        match self.rx.try_recv() {
            Ok(Some(())) => {
                self.retired = true;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(oneshot::Canceled) => Err(RetireCanceled),
        }
    }
}

impl Future for RetireTicket {
    type Output = Result<(), RetireCanceled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.retired {
            return Poll::Ready(Ok(()));
        }
        let res = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(res) => res,
            Poll::Pending => return Poll::Pending,
        };
        if res.is_ok() {
            self.retired = true;
        }
        Poll::Ready(res.map_err(|oneshot::Canceled| RetireCanceled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_resolves_when_callback_fires() {
        let (mut ticket, on_retired) = RetireTicket::pair();
        assert_eq!(ticket.try_retired(), Ok(false));
        on_retired();
        assert_eq!(ticket.try_retired(), Ok(true));
        assert_eq!(ticket.try_retired(), Ok(true));
        assert_eq!(pollster::block_on(ticket), Ok(()));
    }

    #[test]
    fn dropped_callback_cancels_ticket() {
        let (ticket, on_retired) = RetireTicket::pair();
        drop(on_retired);
        assert_eq!(pollster::block_on(ticket), Err(RetireCanceled));
    }
}
