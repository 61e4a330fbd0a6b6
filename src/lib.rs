pub mod comm;
pub mod config;
pub mod consts;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod mqtt;
pub mod pins;
