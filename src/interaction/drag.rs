use std::ops::Sub;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

impl Sub for Point {
    type Output = Displacement;

    fn sub(self, rhs: Point) -> Displacement {
        Displacement {
            dx: self.x - rhs.x,
            dy: self.y - rhs.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Displacement {
    pub dx: i32,
    pub dy: i32,
}

/// What sits under the pointer when a press lands on a drag handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// Bare handle surface.
    Handle,
    Button,
    Input,
}

impl HitTarget {
    pub fn is_interactive(&self) -> bool {
        !matches!(self, HitTarget::Handle)
    }
}

/// Window-scope pointer capture. While any guard is alive the host routes
/// every move and release to the drag owner, wherever the pointer is.
#[derive(Debug, Clone, Default)]
pub struct PointerCapture {
    attached: Arc<AtomicUsize>,
}

impl PointerCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> CaptureGuard {
        let count = self.attached.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(attached = count, "pointer capture acquired");
        CaptureGuard {
            attached: Arc::clone(&self.attached),
        }
    }

    pub fn is_captured(&self) -> bool {
        self.attached_count() > 0
    }

    pub fn attached_count(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }
}

/// Detaches its capture on drop.
#[derive(Debug)]
pub struct CaptureGuard {
    attached: Arc<AtomicUsize>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let count = self.attached.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        trace!(attached = count, "pointer capture released");
    }
}

#[derive(Debug)]
struct DragSession {
    last_position: Option<Point>,
    pending_deadline: Option<Instant>,
    capture: Option<CaptureGuard>,
}

impl DragSession {
    fn is_active(&self) -> bool {
        self.capture.is_some()
    }
}

/// Turns a press-and-hold on a handle into relative displacements.
///
/// Time is passed in by the caller so the controller stays independent of
/// any particular event loop. The pending timer is a deadline that fires on
/// the first `tick` (or move) at or after it.
#[derive(Debug)]
pub struct DragController {
    threshold: Duration,
    capture: PointerCapture,
    session: Option<DragSession>,
}

impl DragController {
    pub fn new(threshold: Duration, capture: PointerCapture) -> Self {
        DragController {
            threshold,
            capture,
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(DragSession::is_active)
    }

    pub fn is_pending(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.pending_deadline.is_some())
    }

    /// Returns whether a session was armed.
    pub fn press(&mut self, origin: Point, target: HitTarget, now: Instant) -> bool {
        if target.is_interactive() {
            trace!(?target, "press on interactive control ignored");
            return false;
        }
        // a second press without a release replaces the stale session
        self.release();
        self.session = Some(DragSession {
            last_position: Some(origin),
            pending_deadline: Some(now + self.threshold),
            capture: None,
        });
        debug!(x = origin.x, y = origin.y, "drag armed");
        true
    }

    /// Fires the pending timer once its deadline has passed. Returns whether
    /// the session became active on this call.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.pending_deadline {
            Some(deadline) if now >= deadline => {
                session.pending_deadline = None;
                session.capture = Some(self.capture.acquire());
                debug!("drag active");
                true
            }
            _ => false,
        }
    }

    /// Time left before the pending timer fires, if one is armed.
    pub fn time_to_activation(&self, now: Instant) -> Option<Duration> {
        self.session
            .as_ref()
            .and_then(|s| s.pending_deadline)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn pointer_move(&mut self, position: Point, now: Instant) -> Option<Displacement> {
        self.tick(now);
        let session = self.session.as_mut()?;
        if !session.is_active() {
            return None;
        }
        let last = session.last_position?;
        session.last_position = Some(position);
        let delta = position - last;
        trace!(dx = delta.dx, dy = delta.dy, "drag displacement");
        Some(delta)
    }

    /// Ends any session. Safe to call at any time, any number of times.
    pub fn release(&mut self) {
        if let Some(session) = self.session.take() {
            if session.is_active() {
                debug!("drag released");
            } else if session.pending_deadline.is_some() {
                debug!("drag canceled before activation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_millis(200);

    fn controller() -> (DragController, PointerCapture) {
        let capture = PointerCapture::new();
        (DragController::new(THRESHOLD, capture.clone()), capture)
    }

    #[test]
    fn early_release_emits_nothing_and_leaves_no_capture() {
        let (mut drag, capture) = controller();
        let t0 = Instant::now();
        assert!(drag.press(Point::new(10, 10), HitTarget::Handle, t0));
        assert_eq!(
            drag.pointer_move(Point::new(14, 12), t0 + Duration::from_millis(50)),
            None
        );
        drag.release();
        assert!(!drag.tick(t0 + Duration::from_secs(1)));
        assert_eq!(
            drag.pointer_move(Point::new(30, 30), t0 + Duration::from_secs(1)),
            None
        );
        assert_eq!(capture.attached_count(), 0);
        assert!(!drag.is_pending());
    }

    #[test]
    fn displacements_sum_to_net_motion() {
        for steps in [1, 3, 7, 20] {
            let (mut drag, capture) = controller();
            let t0 = Instant::now();
            let origin = Point::new(5, 40);
            drag.press(origin, HitTarget::Handle, t0);
            let active_at = t0 + THRESHOLD;
            assert!(drag.tick(active_at));
            assert!(capture.is_captured());

            let target = Point::new(47, -3);
            let mut total = Displacement::default();
            for i in 1..=steps {
                let p = Point::new(
                    origin.x + (target.x - origin.x) * i / steps,
                    origin.y + (target.y - origin.y) * i / steps,
                );
                let d = drag.pointer_move(p, active_at).unwrap();
                total.dx += d.dx;
                total.dy += d.dy;
            }
            assert_eq!(total, target - origin, "steps = {steps}");
            drag.release();
            assert_eq!(capture.attached_count(), 0);
        }
    }

    #[test]
    fn first_move_after_threshold_is_measured_from_origin() {
        let (mut drag, _capture) = controller();
        let t0 = Instant::now();
        drag.press(Point::new(0, 0), HitTarget::Handle, t0);
        // moves before activation are not observed
        assert_eq!(drag.pointer_move(Point::new(2, 2), t0), None);
        let d = drag
            .pointer_move(Point::new(3, 1), t0 + THRESHOLD + Duration::from_millis(1))
            .unwrap();
        assert_eq!(d, Displacement { dx: 3, dy: 1 });
    }

    #[test]
    fn press_on_interactive_control_never_activates() {
        let (mut drag, capture) = controller();
        let t0 = Instant::now();
        for target in [HitTarget::Button, HitTarget::Input] {
            assert!(!drag.press(Point::new(1, 1), target, t0));
            assert!(!drag.tick(t0 + THRESHOLD * 3));
            assert!(!drag.is_active());
            assert_eq!(drag.pointer_move(Point::new(9, 9), t0 + THRESHOLD * 3), None);
        }
        assert_eq!(capture.attached_count(), 0);
    }

    #[test]
    fn release_is_idempotent_and_tolerates_no_press() {
        let (mut drag, capture) = controller();
        drag.release();
        let t0 = Instant::now();
        drag.press(Point::new(0, 0), HitTarget::Handle, t0);
        drag.tick(t0 + THRESHOLD);
        drag.release();
        drag.release();
        assert!(!drag.is_active());
        assert_eq!(capture.attached_count(), 0);
    }

    #[test]
    fn dropping_an_active_controller_detaches_capture() {
        let (mut drag, capture) = controller();
        let t0 = Instant::now();
        drag.press(Point::new(0, 0), HitTarget::Handle, t0);
        drag.tick(t0 + THRESHOLD);
        assert_eq!(capture.attached_count(), 1);
        drop(drag);
        assert_eq!(capture.attached_count(), 0);
    }

    #[test]
    fn repeated_press_holds_a_single_capture() {
        let (mut drag, capture) = controller();
        let t0 = Instant::now();
        drag.press(Point::new(0, 0), HitTarget::Handle, t0);
        drag.tick(t0 + THRESHOLD);
        drag.press(Point::new(4, 4), HitTarget::Handle, t0 + THRESHOLD);
        drag.tick(t0 + THRESHOLD * 2);
        assert_eq!(capture.attached_count(), 1);
    }

    #[test]
    fn time_to_activation_counts_down() {
        let (mut drag, _capture) = controller();
        let t0 = Instant::now();
        assert_eq!(drag.time_to_activation(t0), None);
        drag.press(Point::new(0, 0), HitTarget::Handle, t0);
        assert_eq!(
            drag.time_to_activation(t0 + Duration::from_millis(150)),
            Some(Duration::from_millis(50))
        );
        drag.tick(t0 + THRESHOLD);
        assert_eq!(drag.time_to_activation(t0 + THRESHOLD), None);
    }
}
