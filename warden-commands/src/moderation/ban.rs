use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Ban a member from the server.
#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member and optional reason"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "ban", args).await
}
