// Caption layout pipeline: wrap text into lines, measure glyph advances,
// solve one global inter-character spacing shared by every line.
// CPU-bound; callers on the async side go through tokio::task::spawn_blocking.

pub mod font;
pub mod justify;
pub mod wrap;

// Re-export the public API consumed by other modules (compose, service).
pub use font::CaptionFont;
pub use justify::{solve_spacing, MeasuredLine};
pub use wrap::wrap_caption;
