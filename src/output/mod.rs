//! Classification of the inference binary's standard output
//!
//! The binary prints free-form text interleaved with status markers. This
//! module turns the raw byte stream into [`ScanEvent`]s:
//!
//! ```text
//!  stdout bytes ──► Utf8Decoder ──► OutputScanner ──► ScanEvent
//!                   (holds split     (holds partial     LoadingPrompt
//!                    code points)     markers)          Ready
//!                                                       Progress
//!                                                       Content(text)
//! ```
//!
//! Neither stage assumes that read boundaries line up with characters or
//! markers.

mod decoder;
mod markers;
mod scanner;

pub use decoder::Utf8Decoder;
pub use markers::{MarkerKind, Markers};
pub use scanner::{OutputScanner, ScanEvent};
