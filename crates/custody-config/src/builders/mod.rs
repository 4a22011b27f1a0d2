/// Builder for [`Config`](crate::Config).
pub mod config;
