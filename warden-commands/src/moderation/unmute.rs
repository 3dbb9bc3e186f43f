use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Lift an active mute.
#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "Member to unmute"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "unmute", args).await
}
