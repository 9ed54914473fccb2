//! Interactive oracle sessions
//!
//! Each experience drives an [`Oracle`](crate::Oracle) through one of the
//! classic oracle scripts. Input comes from an
//! [`InputSource`](crate::voice::InputSource) so sessions can be scripted in
//! tests.

mod chat;
mod image;
mod past_life;
mod proverb;
mod telephone;
mod weather;

pub use chat::{ChatSummary, run_chat};
pub use image::{describe_image, sacred_symbol};
pub use past_life::{PastLifeReport, PastLifeSettings, run_past_life};
pub use proverb::proverb;
pub use telephone::{TelephoneReport, run_telephone};
pub use weather::run_weather;

use std::path::Path;

use crate::voice::Player;

/// Play `path` to completion, logging rather than failing on error
pub(crate) async fn play_best_effort(player: Option<&Player>, path: &Path) {
    let Some(player) = player else {
        return;
    };
    let result = match player.play(path) {
        Ok(handle) => handle.wait().await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "playback failed, continuing without audio");
    }
}
