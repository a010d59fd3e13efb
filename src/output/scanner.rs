//! Incremental marker scanner
//!
//! The scanner keeps a rolling buffer of text that has not been classified
//! yet. Each call to [`OutputScanner::feed`] appends a decoded read and emits
//! every event that is unambiguous at that point. A suffix that could still
//! grow into a marker is held back until the next read settles it, so a
//! marker split across reads is neither missed nor leaked as content.
//!
//! The loading marker opens the loading stage. The binary decorates that
//! line (`[ Reading prompt ] ......`), so while the stage lasts progress
//! markers, whitespace and punctuation are dropped. The first newline or
//! other character ends the stage and is content. Decoration between the
//! start of the line and the loading marker is dropped as well, which is why
//! a line that so far holds nothing but decoration is held back too.
//! Ellipses inside a response are plain content.

use super::markers::{MarkerKind, Markers};

/// One classified piece of output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// The loading marker was seen
    LoadingPrompt,
    /// The ready marker was seen
    Ready,
    /// A progress marker was seen and dropped
    Progress,
    /// Text that is not part of any marker
    Content(String),
}

/// Rolling-buffer scanner over decoded stdout text
#[derive(Debug)]
pub struct OutputScanner {
    markers: Markers,
    pending: String,
    loading_stage: bool,
    /// Whether `pending` starts at the beginning of an output line
    at_line_start: bool,
}

impl OutputScanner {
    /// Create a scanner for the given markers
    #[must_use]
    pub fn new(markers: Markers) -> Self {
        Self {
            markers,
            pending: String::new(),
            loading_stage: false,
            at_line_start: true,
        }
    }

    /// Feed the next piece of text and collect the events it settles
    pub fn feed(&mut self, text: &str) -> Vec<ScanEvent> {
        self.pending.push_str(text);

        let mut events = Vec::new();
        self.skip_loading_line(&mut events);

        while let Some((pos, kind)) = self.next_marker() {
            let len = self.markers.get(kind).len();
            match kind {
                MarkerKind::Loading => {
                    let begin = self.decoration_start(pos);
                    self.take_content(begin, &mut events);
                    self.pending.drain(..pos - begin + len);
                    self.loading_stage = true;
                    self.at_line_start = false;
                    events.push(ScanEvent::LoadingPrompt);
                }
                MarkerKind::Ready => {
                    self.take_content(pos, &mut events);
                    self.pending.drain(..len);
                    self.loading_stage = false;
                    self.at_line_start = true;
                    events.push(ScanEvent::Ready);
                }
                // Only consumed by skip_loading_line
                MarkerKind::Progress => {}
            }
            self.skip_loading_line(&mut events);
        }

        let held = self.held_suffix_start();
        self.take_content(held, &mut events);
        events
    }

    /// Flush held text as content at end of stream
    pub fn finish(&mut self) -> Option<ScanEvent> {
        self.loading_stage = false;
        if self.pending.is_empty() {
            None
        } else {
            self.at_line_start = self.pending.ends_with('\n');
            Some(ScanEvent::Content(std::mem::take(&mut self.pending)))
        }
    }

    /// Text currently held back as a possible marker prefix
    #[must_use]
    pub fn held(&self) -> &str {
        &self.pending
    }

    /// Whether the scanner is inside the loading line
    #[must_use]
    pub const fn in_loading_stage(&self) -> bool {
        self.loading_stage
    }

    /// Drop progress markers and decoration at the front of the buffer
    ///
    /// Stops at a marker the main loop must handle, at text that could still
    /// grow into a marker, and at the first character that ends the stage.
    fn skip_loading_line(&mut self, events: &mut Vec<ScanEvent>) {
        while self.loading_stage {
            let Some(c) = self.pending.chars().next() else {
                return;
            };
            let pending = self.pending.as_str();

            if pending.starts_with(self.markers.loading.as_str())
                || pending.starts_with(self.markers.ready.as_str())
            {
                return;
            }
            let progress = self.markers.progress.len();
            if pending.starts_with(self.markers.progress.as_str()) {
                self.pending.drain(..progress);
                events.push(ScanEvent::Progress);
                continue;
            }
            if self.is_marker_prefix(pending) {
                return;
            }
            if !is_decoration(c) {
                self.loading_stage = false;
                return;
            }
            self.pending.drain(..c.len_utf8());
        }
    }

    /// Earliest loading or ready marker; ties go to the loading marker
    fn next_marker(&self) -> Option<(usize, MarkerKind)> {
        let mut best: Option<(usize, MarkerKind)> = None;

        for kind in [MarkerKind::Loading, MarkerKind::Ready] {
            if let Some(pos) = self.pending.find(self.markers.get(kind))
                && best.is_none_or(|(at, _)| pos < at)
            {
                best = Some((pos, kind));
            }
        }
        best
    }

    /// Where the current line begins inside `pending`, if it does
    fn line_start_before(&self, end: usize) -> Option<usize> {
        match self.pending[..end].rfind('\n') {
            Some(i) => Some(i + 1),
            None if self.at_line_start => Some(0),
            None => None,
        }
    }

    /// Start of the decoration leading up to a loading marker at `pos`
    fn decoration_start(&self, pos: usize) -> usize {
        match self.line_start_before(pos) {
            Some(begin) if self.pending[begin..pos].chars().all(is_decoration) => begin,
            _ => pos,
        }
    }

    /// Start of the suffix that must wait for the next read
    fn held_suffix_start(&self) -> usize {
        let marker_start = self.marker_prefix_start();
        match self.line_start_before(self.pending.len()) {
            Some(begin)
                if begin < marker_start
                    && self.pending[begin..marker_start].chars().all(is_decoration) =>
            {
                begin
            }
            _ => marker_start,
        }
    }

    /// Start of the longest suffix that is a proper prefix of an active marker
    fn marker_prefix_start(&self) -> usize {
        let len = self.pending.len();
        let from = len.saturating_sub(self.markers.longest().saturating_sub(1));

        (from..len)
            .filter(|start| self.pending.is_char_boundary(*start))
            .find(|start| self.is_marker_prefix(&self.pending[*start..]))
            .unwrap_or(len)
    }

    /// Whether `text` is a proper prefix of a marker active right now
    fn is_marker_prefix(&self, text: &str) -> bool {
        MarkerKind::PRECEDENCE.iter().any(|kind| {
            if *kind == MarkerKind::Progress && !self.loading_stage {
                return false;
            }
            let marker = self.markers.get(*kind);
            marker.len() > text.len() && marker.starts_with(text)
        })
    }

    fn take_content(&mut self, end: usize, events: &mut Vec<ScanEvent>) {
        if end == 0 {
            return;
        }
        let content: String = self.pending.drain(..end).collect();
        self.loading_stage = false;
        self.at_line_start = content.ends_with('\n');
        events.push(ScanEvent::Content(content));
    }
}

impl Default for OutputScanner {
    fn default() -> Self {
        Self::new(Markers::default())
    }
}

/// Whitespace and punctuation the binary prints around its loading marker
fn is_decoration(c: char) -> bool {
    c != '\n' && (c.is_whitespace() || c.is_ascii_punctuation())
}
