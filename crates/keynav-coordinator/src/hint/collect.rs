//! Recursive hint collection across the frame tree.

use futures::future::{BoxFuture, FutureExt, join_all};
use keynav_core::FrameId;
use keynav_core::messages::{CollectReply, CoordinatorToFrame};
use tracing::{debug, warn};

use crate::errors::CoordinatorError;
use crate::tab::TabContext;

/// Frames nested deeper than this are not collected.
const MAX_FRAME_DEPTH: usize = 32;

/// Candidate counts per frame, frames in depth-first pre-order.
///
/// Every child request is issued before any is awaited; each child's list
/// is spliced after its parent's own entry in the parent's document order,
/// whatever order the replies arrive in. A failing child contributes
/// nothing. Only a failure of `frame_id` itself is returned.
pub(crate) fn collect_tree<'a>(
    tab: &'a TabContext,
    frame_id: FrameId,
    message: &'a CoordinatorToFrame,
    path: Vec<FrameId>,
) -> BoxFuture<'a, Result<Vec<(FrameId, usize)>, CoordinatorError>> {
    async move {
        let reply: CollectReply = tab.request(frame_id, message).await?;
        let mut out = vec![(frame_id, reply.count)];

        if path.len() >= MAX_FRAME_DEPTH {
            warn!(%frame_id, depth = path.len(), "frame tree too deep, not descending");
            return Ok(out);
        }

        let mut path = path;
        path.push(frame_id);
        let children: Vec<FrameId> = reply
            .children
            .iter()
            .filter_map(|identity| {
                let child = tab.frame_for_identity(*identity);
                if child.is_none() {
                    debug!(%frame_id, %identity, "child frame has no channel yet, skipping");
                }
                child
            })
            .filter(|child| !path.contains(child))
            .collect();

        let replies = join_all(
            children
                .iter()
                .map(|child| collect_tree(tab, *child, message, path.clone())),
        )
        .await;

        for (child, result) in children.iter().zip(replies) {
            match result {
                Ok(list) => out.extend(list),
                Err(e) => warn!(parent = %frame_id, frame_id = %child, error = %e, "child frame contributed no hints"),
            }
        }
        Ok(out)
    }
    .boxed()
}
