//! Service installation

pub mod systemd;

pub use systemd::SystemdService;
