pub mod cancel;
pub(crate) mod time;
