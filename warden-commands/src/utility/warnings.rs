use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Show a member's warnings and active sanctions.
#[poise::command(prefix_command, slash_command, category = "Information")]
pub async fn warnings(
    ctx: Context<'_>,
    #[description = "Member to inspect"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "warnings", args).await
}
