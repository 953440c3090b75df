mod route;
mod settings;

pub use route::*;
pub use settings::*;
