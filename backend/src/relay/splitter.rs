//! Stream splitter
//!
//! Duplicates one upstream byte stream into two branches that are consumed
//! independently. A pump task reads the source once and pushes every chunk into
//! one unbounded queue per branch, so neither branch waits on the other.
//!
//! Resource note: a branch's queue grows only while that branch is alive but
//! reading slower than the source produces. Dropping a branch closes its queue
//! and frees what it held; the pump keeps feeding the other branch and stops
//! reading the source once both branches are gone.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

/// A read error from the source, delivered to both branches
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("source stream failed: {0}")]
pub struct SplitError(pub String);

/// One consumer of a split stream
pub type Branch = UnboundedReceiverStream<Result<Bytes, SplitError>>;

/// Split `source` into two branches that each see every chunk in source order
///
/// Must be called from within a tokio runtime. A source error is forwarded to
/// both branches and ends the split.
pub fn split_stream<S, E>(source: S) -> (Branch, Branch)
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut source = Box::pin(source);
        let mut left = Some(left_tx);
        let mut right = Some(right_tx);
        let mut chunks = 0usize;

        while left.is_some() || right.is_some() {
            let Some(item) = source.next().await else {
                break;
            };
            let item = item.map_err(|e| SplitError(e.to_string()));
            let failed = item.is_err();

            forward(&mut left, &item, "left");
            forward(&mut right, &item, "right");
            chunks += 1;

            if failed {
                warn!(chunks, "Source stream failed while splitting");
                break;
            }
        }

        debug!(chunks, "Splitter finished");
    });

    (
        UnboundedReceiverStream::new(left_rx),
        UnboundedReceiverStream::new(right_rx),
    )
}

fn forward(
    branch: &mut Option<mpsc::UnboundedSender<Result<Bytes, SplitError>>>,
    item: &Result<Bytes, SplitError>,
    name: &'static str,
) {
    if let Some(tx) = branch {
        if tx.send(item.clone()).is_err() {
            debug!(branch = name, "Branch dropped, no longer forwarding to it");
            *branch = None;
        }
    }
}
