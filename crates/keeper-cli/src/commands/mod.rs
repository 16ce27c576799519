pub(crate) mod auth;
pub(crate) mod bookmark;
pub(crate) mod settings;
