pub mod cancel;
pub mod consts;
pub mod error;
pub mod frame;
pub mod io;
pub mod motion;
pub mod peaks;
pub mod pipeline;
pub mod signal;
pub mod stats;
