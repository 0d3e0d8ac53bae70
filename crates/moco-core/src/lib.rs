pub mod consts;
pub mod error;
pub mod volume;
pub mod transform;
pub mod registration;
pub mod template;
pub mod model;
pub mod outlier;
pub mod hmc;
pub mod motion;
pub mod io;
pub mod pipeline;
