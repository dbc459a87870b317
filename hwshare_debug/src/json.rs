// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON-lines export.
//!
//! [`to_json_lines`] writes one JSON object per [`RecordedEvent`], one per
//! line, for grepping or loading into a notebook.

use std::io::{self, Write};

use serde_json::{Value, json};

use hwshare_core::surface::SurfaceId;

use crate::pretty::{path_name, state_name, step_name};
use crate::recorder::RecordedEvent;

fn surface_json(id: SurfaceId) -> Value {
    json!({ "index": id.index(), "generation": id.generation() })
}

/// JSON object for one event.
#[must_use]
pub fn to_json(event: &RecordedEvent) -> Value {
    match event {
        RecordedEvent::SurfaceCreated {
            surface,
            width,
            height,
            depth,
            path,
            fallback,
        } => json!({
            "event": "surface_created",
            "surface": surface_json(*surface),
            "width": width,
            "height": height,
            "depth": depth,
            "path": path_name(*path),
            "fallback": fallback,
        }),
        RecordedEvent::BindState(e) => json!({
            "event": "bind_state",
            "buffer": e.buffer.addr(),
            "from": state_name(e.from),
            "to": state_name(e.to),
        }),
        RecordedEvent::Transport(e) => json!({
            "event": "transport",
            "surface": surface_json(e.surface),
            "buffer": e.buffer.0,
            "created": e.created,
        }),
        RecordedEvent::Teardown(e) => json!({
            "event": "teardown",
            "surface": surface_json(e.surface),
            "step": step_name(e.step),
        }),
    }
}

/// Writes `events` as JSON lines.
///
/// # Errors
///
/// Returns the writer's I/O error.
pub fn to_json_lines(events: &[RecordedEvent], writer: &mut dyn Write) -> io::Result<()> {
    for event in events {
        serde_json::to_writer(&mut *writer, &to_json(event))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}
