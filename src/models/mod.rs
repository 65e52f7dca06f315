mod brewery;
mod prefecture;
mod sake;
mod sake_log;
mod user;

pub use brewery::Brewery;
pub use prefecture::{Prefecture, PrefectureSakeCount};
pub use sake::{FlavorAxis, FlavorProfile, Sake};
pub use sake_log::{LogFields, LogFilter, LogForm, LogPatch, LoggedSake, Rating, SakeLog};
pub use user::{User, UserId};
