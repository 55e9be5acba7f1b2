use devconnect_shared::constants::SCROLL_BOTTOM_THRESHOLD_PX;

/// What to do with a message from someone else that just arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingAction {
    /// The viewer is at the bottom: mark the chat read.
    MarkRead,
    /// The viewer is scrolled up: count it and show the banner.
    ShowBanner { count: u32 },
}

/// Scroll position and unread banner state of an open chat.
#[derive(Debug, Clone)]
pub struct ReadTracker {
    distance_from_bottom: f64,
    threshold: f64,
    unread: u32,
    banner_visible: bool,
}

impl Default for ReadTracker {
    fn default() -> Self {
        Self::new(SCROLL_BOTTOM_THRESHOLD_PX)
    }
}

impl ReadTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            distance_from_bottom: 0.0,
            threshold,
            unread: 0,
            banner_visible: false,
        }
    }

    pub fn is_at_bottom(&self) -> bool {
        self.distance_from_bottom <= self.threshold
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    pub fn banner_visible(&self) -> bool {
        self.banner_visible
    }

    /// Record a scroll. Returns true when the viewer reached the bottom with
    /// unread messages pending, i.e. the chat should be marked read.
    pub fn on_scroll(&mut self, distance_from_bottom: f64) -> bool {
        self.distance_from_bottom = distance_from_bottom.max(0.0);
        self.is_at_bottom() && (self.unread > 0 || self.banner_visible)
    }

    pub fn on_incoming(&mut self) -> IncomingAction {
        if self.is_at_bottom() {
            IncomingAction::MarkRead
        } else {
            self.unread += 1;
            self.banner_visible = true;
            IncomingAction::ShowBanner { count: self.unread }
        }
    }

    /// Explicit jump to the newest message.
    pub fn scroll_to_bottom(&mut self) {
        self.distance_from_bottom = 0.0;
    }

    pub fn reset(&mut self) {
        self.unread = 0;
        self.banner_visible = false;
    }
}
