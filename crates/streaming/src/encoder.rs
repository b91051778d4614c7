//! Event → SSE frame encoding
//!
//! axum's `sse::Event` builder panics on input it cannot frame, so every
//! field is checked here first and a bad event becomes an [`EncodeError`].

use std::borrow::Cow;

use axum::response::sse::Event as SseEvent;
use contracts::Event;

use crate::error::EncodeError;

fn has_line_break_or_nul(value: &str) -> bool {
    value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0'))
}

/// Check an event can be framed, returning its data with CRLF normalised to LF
pub fn validate(event: &Event) -> Result<Cow<'_, str>, EncodeError> {
    if has_line_break_or_nul(&event.id) {
        return Err(EncodeError::InvalidId(event.id.clone()));
    }
    if let Some(name) = &event.event {
        if has_line_break_or_nul(name) {
            return Err(EncodeError::InvalidEventName(name.clone()));
        }
    }

    if !event.data.contains('\r') {
        return Ok(Cow::Borrowed(&event.data));
    }
    let data = event.data.replace("\r\n", "\n");
    if data.contains('\r') {
        return Err(EncodeError::BareCarriageReturn);
    }
    Ok(Cow::Owned(data))
}

/// Encode one event as an SSE frame
///
/// Field order is `id`, `event`, `data`; multi-line data becomes one `data:`
/// line per line. An empty id is omitted rather than resetting the client's
/// last seen id.
pub fn encode(event: &Event) -> Result<SseEvent, EncodeError> {
    let data = validate(event)?;

    let mut frame = SseEvent::default();
    if !event.id.is_empty() {
        frame = frame.id(&event.id);
    }
    if let Some(name) = &event.event {
        frame = frame.event(name);
    }
    Ok(frame.data(data))
}
