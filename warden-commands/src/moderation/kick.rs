use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Kick a member from the server.
#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member and optional reason"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "kick", args).await
}
