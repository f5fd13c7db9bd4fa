pub mod compositor;
pub mod fetch;
pub mod workdir;

pub use compositor::{
    encoder_args, escape_caption, filter_graph, Compositor, CompositorSettings, RenderError,
    RenderJob,
};
pub use fetch::{FetchError, Fetcher};
pub use workdir::WorkDir;
