//! Line-based progress display for installs

use anyhow::Result;
use std::io::Write;

use vpkg_core::installer::{InstallHandle, InstallStep, ProgressEvent};
use vpkg_core::InstallOutcome;

/// Print events as they arrive, then wait for the install to finish
pub async fn follow(mut handle: InstallHandle) -> Result<InstallOutcome> {
    let mut stderr = std::io::stderr();

    while let Some(event) = handle.events.recv().await {
        let _ = writeln!(stderr, "{}", format_event(&event));
    }

    Ok(handle.wait().await?)
}

fn format_event(event: &ProgressEvent) -> String {
    let step = format!(
        "[{}/{}] {}",
        event.step.index() + 1,
        InstallStep::ALL.len(),
        event.step.label()
    );

    if let Some(error) = &event.error {
        return format!("{step}: {} ({error})", event.description);
    }

    match event.files {
        Some(counter) => format!(
            "{step} {:>3.0}% ({}/{}) {}",
            event.fraction * 100.0,
            counter.processed,
            counter.total,
            event.description
        ),
        None => format!("{step} {:>3.0}% {}", event.fraction * 100.0, event.description),
    }
}
