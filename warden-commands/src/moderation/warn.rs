use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Warn a member. Repeated warnings escalate to a timeout and then a ban.
#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member and optional reason"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "warn", args).await
}
