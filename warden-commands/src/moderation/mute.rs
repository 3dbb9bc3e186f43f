use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Mute a member for a duration such as 10m or 1h.
#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "Member, duration and optional reason"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "mute", args).await
}
