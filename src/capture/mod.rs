pub(crate) mod chunk;
pub(crate) mod session;
