pub mod jsonl;
pub mod progress_bar;
pub mod text;

pub use jsonl::JsonlRendererPlugin;
pub use progress_bar::ProgressBarRendererPlugin;
pub use text::TextRendererPlugin;
