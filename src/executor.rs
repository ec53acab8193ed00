//! Runs a command against a render sink

use crate::ui::RenderSink;
use crate::view::{project, Output, View};
use anyhow::Result;
use std::future::Future;
use std::time::Instant;

/// Await the command, project its output and render it
///
/// Elapsed time is reported only when the view is not an error. The view is
/// returned so the caller can pick an exit status.
pub async fn execute<F>(sink: &mut dyn RenderSink, command: F) -> Result<View>
where
    F: Future<Output = Output>,
{
    let started = Instant::now();
    let output = command.await;
    let view = project(&output);

    sink.render(&view)?;
    if view.is_error() {
        tracing::warn!("command finished with an error view");
    } else {
        sink.finish(started.elapsed())?;
    }
    Ok(view)
}
