use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Reset a member's warning count.
#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn clearwarns(
    ctx: Context<'_>,
    #[description = "Member and optional reason"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "clearwarns", args).await
}
