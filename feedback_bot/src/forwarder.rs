//! Forwarding stored feedback to a review chat, one message at a time.

use std::{future::Future, time::Duration};

use bot_commons::teloxide_retry;
use teloxide::{
    requests::Requester,
    types::{ChatId, MessageId},
    Bot, RequestError,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Pause between two forwards, to stay clear of Telegram's flood limits.
pub const FORWARD_DELAY: Duration = Duration::from_secs(3);

/// A message to forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardJob {
    pub to: ChatId,
    pub from: ChatId,
    pub message_id: MessageId,
}

/// Handle to the forwarding queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Forwarder {
    sender: UnboundedSender<ForwardJob>,
}

impl Forwarder {
    /// Starts the forwarding task and returns a handle to feed it.
    #[must_use]
    pub fn spawn(bot: Bot, delay: Duration) -> Forwarder {
        let (sender, receiver) = unbounded_channel();

        tokio::spawn(forward_spinloop(receiver, delay, move |job| {
            let bot = bot.clone();
            async move { forward(&bot, job).await }
        }));

        Forwarder { sender }
    }

    /// A handle whose jobs end up in the returned receiver instead of Telegram.
    #[cfg(test)]
    pub fn detached() -> (Forwarder, UnboundedReceiver<ForwardJob>) {
        let (sender, receiver) = unbounded_channel();
        (Forwarder { sender }, receiver)
    }

    /// Puts a job at the end of the queue.
    pub fn enqueue(&self, job: ForwardJob) {
        if self.sender.send(job).is_err() {
            log::error!("Forwarding queue is gone, dropping {job:?}");
        }
    }
}

async fn forward(bot: &Bot, job: ForwardJob) -> Result<(), RequestError> {
    teloxide_retry!(bot.forward_message(job.to, job.from, job.message_id).await)?;
    Ok(())
}

/// Takes jobs off the queue in order and hands them to `send`, waiting `delay` before each.
/// Failed jobs are logged and dropped. Ends when every [`Forwarder`] handle is gone.
async fn forward_spinloop<F, Fut>(
    mut receiver: UnboundedReceiver<ForwardJob>,
    delay: Duration,
    mut send: F,
) where
    F: FnMut(ForwardJob) -> Fut,
    Fut: Future<Output = Result<(), RequestError>>,
{
    while let Some(job) = receiver.recv().await {
        tokio::time::sleep(delay).await;

        match send(job).await {
            Ok(()) => log::debug!(
                "Forwarded message {} from {} to {}",
                job.message_id.0,
                job.from,
                job.to
            ),
            Err(e) => log::warn!(
                "Failed to forward message {} from {} to {}: {e}",
                job.message_id.0,
                job.from,
                job.to
            ),
        }
    }

    log::info!("Forwarding queue closed.");
}
