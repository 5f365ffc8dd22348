use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

/// Quiet period before a search term is forwarded.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Forward only the last value of each burst.
///
/// A value is emitted once `quiet` has passed without a newer one. When the
/// input closes, a pending value is flushed before the output closes.
#[must_use]
pub fn debounce<T: Send + 'static>(
    mut input: mpsc::Receiver<T>,
    quiet: Duration,
) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let mut pending: Option<(T, Instant)> = None;
        loop {
            let deadline = pending.as_ref().map(|(_, at)| *at);
            tokio::select! {
                received = input.recv() => match received {
                    Some(value) => pending = Some((value, Instant::now() + quiet)),
                    None => {
                        if let Some((value, _)) = pending.take() {
                            let _ = tx.send(value).await;
                        }
                        return;
                    }
                },
                () = async {
                    match deadline {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if let Some((value, _)) = pending.take() {
                        if tx.send(value).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_to_last_value() {
        let (tx, rx) = mpsc::channel(8);
        let mut out = debounce(rx, SEARCH_DEBOUNCE);

        for term in ["a", "ad", "ada"] {
            tx.send(term).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(SEARCH_DEBOUNCE).await;
        assert_eq!(out.recv().await, Some("ada"));

        tx.send("bob").await.unwrap();
        drop(tx);
        assert_eq!(out.recv().await, Some("bob"));
        assert_eq!(out.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_values_all_pass() {
        let (tx, rx) = mpsc::channel(8);
        let mut out = debounce(rx, SEARCH_DEBOUNCE);

        tx.send(1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        tx.send(2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        drop(tx);

        assert_eq!(out.recv().await, Some(1));
        assert_eq!(out.recv().await, Some(2));
        assert_eq!(out.recv().await, None);
    }
}
