mod codec;
mod engine;
mod error;
mod midi_file;
mod model;
mod util;

pub use codec::*;
pub use engine::*;
pub use error::*;
pub use midi_file::*;
pub use model::config::*;
pub use model::event::*;
pub use model::score::*;
pub use util::*;
