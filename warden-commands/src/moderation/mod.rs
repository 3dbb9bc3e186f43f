pub mod ban;
pub mod clearwarns;
pub mod kick;
pub mod mute;
pub mod unmute;
pub mod warn;
