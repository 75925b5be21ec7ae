pub mod ai;
pub mod config;
pub mod environment;
pub mod error;
pub mod nes;
pub mod vision;

pub use ai::game_state::{FrameInfo, MarioStatus};
pub use ai::policy::DecisionPolicy;
pub use ai::{run_episode, ControlState, Controller, EpisodeReport};
pub use config::AgentConfig;
pub use environment::{Environment, Observation, Step};
pub use error::{AgentError, Result};
pub use nes::input::Action;
pub use vision::locator::{locate_objects, Detection, ObjectLocations};
pub use vision::template::{Catalog, ObjectKind, TemplateManifest, Theme};
