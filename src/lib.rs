pub mod core;
pub mod generator;
pub mod human;
pub mod orchestrator;
pub mod runner;
pub mod store;
pub mod surface;

// --- Primary exports ---
pub use core::types;
pub use core::types::*;
pub use generator::{CommentRequest, ContentGenerator, OpenAiContentGenerator, ReplyRequest};
pub use human::{HumanSimulator, PauseToken, TimingProfile};
pub use orchestrator::{MentionOrchestrator, OrchestratorError, OrchestratorState};
pub use surface::{SurfaceLauncher, UiSurface};
