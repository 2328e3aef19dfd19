pub mod clip_service;
pub mod id_service;
pub mod secret_service;
