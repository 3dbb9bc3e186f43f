use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Show information about a member.
#[poise::command(prefix_command, slash_command, category = "Information")]
pub async fn userinfo(
    ctx: Context<'_>,
    #[description = "Member to inspect, defaults to you"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "userinfo", args).await
}
