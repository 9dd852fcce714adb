//! Stroke capture and replication for the shared canvas
//!
//! [`DrawingSyncEngine`] turns pointer input into stroke segments: each
//! segment is drawn on the local surface immediately (the author never waits
//! on the network) and transmitted fire-and-forget in surface-local logical
//! coordinates. Segments received from other participants are replayed onto
//! the same surface; the pixel-ratio transform lives in the surface and is
//! applied identically at both ends.

use crate::canvas::CanvasSurface;
use crate::connection::EventSender;
use log::debug;
use shared::{ClientEvent, Point, Segment};

pub struct DrawingSyncEngine<S: CanvasSurface> {
    surface: S,
    anchor: Option<Point>,
    outbound: EventSender,
}

impl<S: CanvasSurface> DrawingSyncEngine<S> {
    pub fn new(surface: S, outbound: EventSender) -> Self {
        DrawingSyncEngine {
            surface,
            anchor: None,
            outbound,
        }
    }

    /// Records the stroke anchor. No network effect.
    pub fn begin_stroke(&mut self, point: Point) {
        self.anchor = Some(point);
    }

    /// Draws and transmits the segment from the anchor to `point`, then
    /// advances the anchor. No-op if no stroke is active, which guards
    /// against spurious move events.
    pub fn continue_stroke(&mut self, point: Point) {
        if let Some(anchor) = self.anchor {
            let segment = Segment::new(anchor, point);
            self.surface.draw_segment(&segment);
            self.outbound.send(ClientEvent::Draw { segment });
            self.anchor = Some(point);
        }
    }

    /// Clears the stroke anchor. Idempotent.
    pub fn end_stroke(&mut self) {
        self.anchor = None;
    }

    pub fn stroke_active(&self) -> bool {
        self.anchor.is_some()
    }

    /// Replays a segment received from another participant at the
    /// coordinates given; no transform beyond the surface's own pixel-ratio
    /// scaling.
    pub fn on_remote_segment(&mut self, segment: &Segment) {
        self.surface.draw_segment(segment);
    }

    /// Wipes the local surface. Clearing is not replicated: only strokes
    /// and final submissions cross the wire.
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    /// Recreates the surface at the new size. Strokes drawn before the
    /// resize are lost locally and are not retransmitted.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.anchor = None;
        self.surface.resize(width, height);
    }

    /// Captures the surface as an encoded image blob and transmits it as
    /// the final submission.
    pub fn submit(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let image_data = self.surface.capture()?;
        debug!("Submitting drawing ({} bytes)", image_data.len());
        self.outbound.send(ClientEvent::SubmitDrawing { image_data });
        Ok(())
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{command_channel, Command};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingCanvas {
        segments: Vec<Segment>,
        clears: u32,
        resizes: Vec<(f32, f32)>,
        capture_bytes: Vec<u8>,
    }

    impl CanvasSurface for RecordingCanvas {
        fn draw_segment(&mut self, segment: &Segment) {
            self.segments.push(*segment);
        }

        fn clear(&mut self) {
            self.clears += 1;
        }

        fn resize(&mut self, width: f32, height: f32) {
            self.resizes.push((width, height));
            self.segments.clear();
        }

        fn capture(&mut self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
            Ok(self.capture_bytes.clone())
        }

        fn scale_factor(&self) -> f32 {
            1.0
        }
    }

    fn test_engine() -> (
        DrawingSyncEngine<RecordingCanvas>,
        mpsc::UnboundedReceiver<Command>,
    ) {
        let (sender, receiver) = command_channel();
        (
            DrawingSyncEngine::new(RecordingCanvas::default(), sender),
            receiver,
        )
    }

    fn sent_events(receiver: &mut mpsc::UnboundedReceiver<Command>) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(Command::Send(event)) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_local_draw_is_immediate_and_exact() {
        let (mut engine, mut receiver) = test_engine();

        engine.begin_stroke(Point::new(10.0, 10.0));
        engine.continue_stroke(Point::new(20.0, 20.0));

        let expected = Segment::new(Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        assert_eq!(engine.surface().segments, vec![expected]);

        // Transmitted with the exact payload, no transform at send time.
        match sent_events(&mut receiver).as_slice() {
            [ClientEvent::Draw { segment }] => assert_eq!(*segment, expected),
            other => panic!("Expected one draw event, got {:?}", other),
        }
    }

    #[test]
    fn test_anchor_advances_along_stroke() {
        let (mut engine, mut receiver) = test_engine();

        engine.begin_stroke(Point::new(0.0, 0.0));
        engine.continue_stroke(Point::new(5.0, 0.0));
        engine.continue_stroke(Point::new(5.0, 5.0));

        assert_eq!(
            engine.surface().segments,
            vec![
                Segment::new(Point::new(0.0, 0.0), Point::new(5.0, 0.0)),
                Segment::new(Point::new(5.0, 0.0), Point::new(5.0, 5.0)),
            ]
        );
        assert_eq!(sent_events(&mut receiver).len(), 2);
    }

    #[test]
    fn test_continue_without_begin_is_noop() {
        let (mut engine, mut receiver) = test_engine();

        engine.continue_stroke(Point::new(20.0, 20.0));

        assert!(engine.surface().segments.is_empty());
        assert!(sent_events(&mut receiver).is_empty());
    }

    #[test]
    fn test_end_stroke_is_idempotent() {
        let (mut engine, mut receiver) = test_engine();

        engine.begin_stroke(Point::new(1.0, 1.0));
        engine.end_stroke();
        engine.end_stroke();
        assert!(!engine.stroke_active());

        engine.continue_stroke(Point::new(2.0, 2.0));
        assert!(engine.surface().segments.is_empty());
        assert!(sent_events(&mut receiver).is_empty());
    }

    #[test]
    fn test_remote_segment_is_drawn_not_retransmitted() {
        let (mut engine, mut receiver) = test_engine();

        let segment = Segment::new(Point::new(3.0, 3.0), Point::new(4.0, 4.0));
        engine.on_remote_segment(&segment);

        assert_eq!(engine.surface().segments, vec![segment]);
        assert!(sent_events(&mut receiver).is_empty());
    }

    #[test]
    fn test_clear_is_local_only() {
        let (mut engine, mut receiver) = test_engine();

        engine.begin_stroke(Point::new(0.0, 0.0));
        engine.continue_stroke(Point::new(1.0, 1.0));
        sent_events(&mut receiver);

        engine.clear();

        assert_eq!(engine.surface().clears, 1);
        assert!(sent_events(&mut receiver).is_empty());
    }

    #[test]
    fn test_submit_transmits_captured_image() {
        let (sender, mut receiver) = command_channel();
        let surface = RecordingCanvas {
            capture_bytes: vec![9, 9, 9],
            ..Default::default()
        };
        let mut engine = DrawingSyncEngine::new(surface, sender);

        engine.submit().unwrap();

        match sent_events(&mut receiver).as_slice() {
            [ClientEvent::SubmitDrawing { image_data }] => {
                assert_eq!(*image_data, vec![9, 9, 9]);
            }
            other => panic!("Expected one submission, got {:?}", other),
        }
    }

    #[test]
    fn test_resize_drops_anchor_and_sends_nothing() {
        let (mut engine, mut receiver) = test_engine();

        engine.begin_stroke(Point::new(0.0, 0.0));
        engine.continue_stroke(Point::new(1.0, 1.0));
        sent_events(&mut receiver);

        engine.resize(400.0, 300.0);

        assert_eq!(engine.surface().resizes, vec![(400.0, 300.0)]);
        assert!(engine.surface().segments.is_empty());
        assert!(!engine.stroke_active());
        // Lost strokes stay lost; nothing is retransmitted.
        assert!(sent_events(&mut receiver).is_empty());

        engine.continue_stroke(Point::new(2.0, 2.0));
        assert!(sent_events(&mut receiver).is_empty());
    }
}
