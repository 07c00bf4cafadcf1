//! Terminal progress view fed by tracker snapshots.

use std::collections::HashMap;
use std::future::Future;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::watch;

use crate::event::{ItemId, UploadStatus};
use crate::tracker::{TrackerSummary, UploadItem};
use crate::{Result, VaultError};

/// Format a byte count for humans (binary units).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// The "N files uploading" indicator text.
pub fn remaining_label(remaining: usize) -> String {
    match remaining {
        0 => "All uploads finished".to_string(),
        1 => "1 file uploading".to_string(),
        n => format!("{n} files uploading"),
    }
}

/// One-line outcome summary printed when the command ends.
pub fn summary_line(summary: &TrackerSummary) -> String {
    format!(
        "{} done, {} failed, {} aborted ({} total)",
        summary.done, summary.error, summary.abort, summary.total
    )
}

/// One bar per upload item plus a header line with the remaining count.
pub struct ProgressView {
    mp: MultiProgress,
    header: ProgressBar,
    style: ProgressStyle,
    bars: HashMap<ItemId, ProgressBar>,
}

impl ProgressView {
    /// Create a view drawing to stderr.
    pub fn new() -> Result<Self> {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Create a view that draws nothing.
    pub fn hidden() -> Result<Self> {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {percent:>3}% {msg}")
            .map_err(|e| VaultError::Config(format!("progress template: {e}")))?
            .progress_chars("#>-");

        let mp = MultiProgress::with_draw_target(target);
        let header = mp.add(ProgressBar::new_spinner());

        Ok(Self {
            mp,
            header,
            style,
            bars: HashMap::new(),
        })
    }

    /// Bring the bars in line with a tracker snapshot.
    pub fn render(&mut self, items: &[UploadItem]) {
        let remaining = items.iter().filter(|i| !i.status.is_terminal()).count();
        self.header.set_message(remaining_label(remaining));

        for item in items {
            let bar = self.bars.entry(item.id).or_insert_with(|| {
                let bar = self.mp.add(ProgressBar::new(100));
                bar.set_style(self.style.clone());
                bar
            });
            if bar.is_finished() {
                continue;
            }

            bar.set_position(item.progress.round() as u64);
            let message = format!("{} ({}) {}", item.name, format_size(item.size), item.status);
            match item.status {
                UploadStatus::Done => bar.finish_with_message(message),
                UploadStatus::Error => {
                    let reason = item.error.as_deref().unwrap_or("unknown error");
                    bar.abandon_with_message(format!("{message}: {reason}"));
                }
                UploadStatus::Abort => bar.abandon_with_message(message),
                UploadStatus::Pending | UploadStatus::Uploading => bar.set_message(message),
            }
        }
    }

    /// Number of bars drawn so far.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Stop drawing the header.
    pub fn finish(&self) {
        self.header.finish_and_clear();
    }
}

/// How a followed upload ended.
#[derive(Debug, PartialEq)]
pub enum FollowOutcome<T> {
    Finished(T),
    Interrupted,
}

/// Render tracker snapshots until `finished` resolves or `interrupt` fires.
///
/// Both futures live across loop iterations, so an interrupt that arrives
/// while a frame is being drawn is still observed.
pub async fn follow<T, F, I>(
    view: &mut ProgressView,
    snapshots: &mut watch::Receiver<Vec<UploadItem>>,
    finished: F,
    interrupt: I,
) -> FollowOutcome<T>
where
    F: Future<Output = T>,
    I: Future,
{
    let mut finished = std::pin::pin!(finished);
    let mut interrupt = std::pin::pin!(interrupt);

    loop {
        tokio::select! {
            biased;
            _ = &mut interrupt => return FollowOutcome::Interrupted,
            outcome = &mut finished => return FollowOutcome::Finished(outcome),
            Ok(()) = snapshots.changed() => {
                let items = snapshots.borrow_and_update().clone();
                view.render(&items);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TransferTracker;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1073741824), "1.0 GB");
    }

    #[test]
    fn test_remaining_label() {
        assert_eq!(remaining_label(0), "All uploads finished");
        assert_eq!(remaining_label(1), "1 file uploading");
        assert_eq!(remaining_label(4), "4 files uploading");
    }

    #[test]
    fn test_summary_line() {
        let summary = TrackerSummary {
            total: 6,
            done: 3,
            error: 2,
            abort: 1,
            ..Default::default()
        };
        assert_eq!(summary_line(&summary), "3 done, 2 failed, 1 aborted (6 total)");
    }

    #[test]
    fn test_render_tracks_items() {
        let mut view = ProgressView::hidden().unwrap();
        let first = ItemId::new();
        let second = ItemId::new();

        let mut items = vec![
            UploadItem::pending(first, "a.txt", 10, None),
            UploadItem::pending(second, "b.txt", 20, None),
        ];
        view.render(&items);
        assert_eq!(view.len(), 2);

        items[0].status = UploadStatus::Uploading;
        items[0].progress = 42.4;
        items[1].status = UploadStatus::Done;
        items[1].progress = 100.0;
        view.render(&items);

        assert_eq!(view.bars[&first].position(), 42);
        assert!(!view.bars[&first].is_finished());
        assert!(view.bars[&second].is_finished());
        assert_eq!(view.len(), 2);
        view.finish();
    }

    #[tokio::test]
    async fn test_follow_returns_outcome() {
        let tracker = TransferTracker::new();
        let mut view = ProgressView::hidden().unwrap();
        let mut snapshots = tracker.subscribe();

        let outcome = follow(
            &mut view,
            &mut snapshots,
            async { 7 },
            std::future::pending::<()>(),
        )
        .await;
        assert_eq!(outcome, FollowOutcome::Finished(7));
    }

    #[tokio::test]
    async fn test_follow_sees_interrupt_between_snapshots() {
        let tracker = TransferTracker::new();
        let mut view = ProgressView::hidden().unwrap();
        let mut snapshots = tracker.subscribe();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let producer = tracker.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                producer.add([UploadItem::pending(ItemId::new(), format!("f{i}"), 1, None)]);
                tokio::task::yield_now().await;
            }
            let _ = tx.send(());
            // Keep producing after the interrupt.
            for i in 20..40 {
                producer.add([UploadItem::pending(ItemId::new(), format!("f{i}"), 1, None)]);
                tokio::task::yield_now().await;
            }
        });

        let outcome: FollowOutcome<()> = follow(
            &mut view,
            &mut snapshots,
            std::future::pending::<()>(),
            rx,
        )
        .await;
        assert_eq!(outcome, FollowOutcome::Interrupted);
        assert!(!view.is_empty());
    }
}
