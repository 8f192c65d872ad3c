use axum::response::sse::Event;
use tracing::error;

use crate::streaming::EventFormatter;
use crate::translator::WireFrame;

/// Formats each frame as a bare `data: <json>` event
pub struct ChatFormatter;

impl EventFormatter for ChatFormatter {
    fn format_frame(&self, frame: &WireFrame) -> Option<Event> {
        match Event::default().json_data(frame) {
            Ok(event) => Some(event),
            Err(e) => {
                error!("Failed to serialize frame {:?}: {}", frame, e);
                None
            }
        }
    }
}
